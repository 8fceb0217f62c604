use fitalloc::{FitAlloc, FitPolicy};

fn main() {
    // RUST_LOG=debug shows the per-operation trace lines.
    env_logger::init();

    let mut allocator = FitAlloc::init(FitPolicy::FirstFit);
    println!("fresh arena of {} bytes", allocator.capacity());
    println!("{}", allocator.dump());

    let mut blocks = Vec::new();
    for size in [16, 32, 48, 64] {
        let ptr = allocator.allocate(size).expect("arena has plenty of room");
        blocks.push(ptr);
    }
    println!("{}", allocator.dump());

    // Release the two middle blocks and watch coalescing close the gap.
    unsafe {
        allocator.free(blocks[1]);
        allocator.free(blocks[2]);
    }
    println!("{}", allocator.dump());

    let big = allocator.allocate(120).expect("coalesced space fits this");
    println!("footprint of the big block: {}", allocator.query_size(big));
    println!("{}", allocator.dump());
}
