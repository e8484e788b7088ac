//! Allocates and releases twenty 100-byte blocks twice, printing the free
//! lists along the way. Set `SEGALLOC_MAX_PAGES` or
//! `SEGALLOC_STRICT_RELEASE` to change the allocator's configuration.

use segalloc::{Config, SegAlloc};

const BLOCKS: usize = 20;
const BLOCK_SIZE: usize = 100;

fn allocate_all(allocator: &mut SegAlloc) -> [*mut u8; BLOCKS] {
    println!("Available memory before: {}", allocator.available_memory());

    let blocks = std::array::from_fn(|_| allocator.allocate(BLOCK_SIZE));

    print!("{}", allocator.free_lists());
    println!("Available memory after: {}", allocator.available_memory());

    blocks
}

fn main() {
    let mut allocator = SegAlloc::with_config(Config::from_env());

    let blocks = allocate_all(&mut allocator);

    println!("Available memory before: {}", allocator.available_memory());
    for ptr in blocks {
        unsafe { allocator.release(ptr) };
    }
    print!("{}", allocator.free_lists());
    println!("Available memory after: {}", allocator.available_memory());

    allocator.reset();

    let blocks = allocate_all(&mut allocator);

    println!("Available memory before: {}", allocator.available_memory());
    for ptr in blocks[..BLOCKS / 2].iter().rev() {
        unsafe { allocator.release(*ptr) };
    }
    print!("{}", allocator.dump_free_lists());
    println!("Available memory after: {}", allocator.available_memory());
    println!("Pages in use: {}", allocator.page_count());
}
