//! Behaviour of the public allocate / release contract.

use std::ptr;

use segalloc::{
    AllocError, Config, ReleaseError, SegAlloc, SizeClass, HEADER_OVERHEAD, MAX_ALLOCATION,
    NODE_OVERHEAD,
};

/// Free bytes of a freshly formatted page.
fn fresh_page_bytes() -> usize {
    SizeClass::ALL.iter().map(|class| class.capacity()).sum()
}

/// Free bytes plus the metadata of every free node. Splitting and merging
/// move bytes between the two, but the total stays put.
fn free_span(allocator: &SegAlloc) -> usize {
    let nodes: usize = SizeClass::ALL
        .iter()
        .map(|class| allocator.free_node_count(*class))
        .sum();

    allocator.available_memory() + nodes * NODE_OVERHEAD
}

fn assert_fresh(allocator: &SegAlloc) {
    assert_eq!(allocator.page_count(), 1);
    assert_eq!(allocator.available_memory(), fresh_page_bytes());
    for class in SizeClass::ALL {
        assert_eq!(allocator.free_node_count(class), 1, "{class}");
    }
}

// ---------------------------------------------------------------------------
// allocate / release pairs
// ---------------------------------------------------------------------------

#[test]
fn new_allocator_has_one_fresh_page() {
    let allocator = SegAlloc::new();

    assert_fresh(&allocator);
    assert_eq!(allocator.live_allocations(), 0);
}

#[test]
fn single_pair_restores_available_memory() {
    let mut allocator = SegAlloc::new();
    let before = allocator.available_memory();

    for size in [0, 1, 50, 100, 200, 400, 900, 1500, 2000] {
        let ptr = allocator.allocate(size);
        assert!(!ptr.is_null(), "allocate({size})");
        assert_eq!(allocator.available_memory(), before - size - HEADER_OVERHEAD);

        unsafe { allocator.release(ptr) };
        assert_eq!(allocator.available_memory(), before, "release of {size} bytes");
    }

    assert_fresh(&allocator);
}

#[test]
fn pair_restores_available_memory_around_whole_node_sizes() {
    let mut allocator = SegAlloc::new();
    let before = allocator.available_memory();

    // Sizes around the point where a 128-byte node is handed out whole.
    for size in 100..=125 {
        let ptr = allocator.allocate(size);
        assert!(!ptr.is_null(), "allocate({size})");

        unsafe { allocator.release(ptr) };
        assert_eq!(allocator.available_memory(), before, "release of {size} bytes");
    }

    assert_fresh(&allocator);
}

#[test]
fn whole_node_blocks_merge_back_without_loss() {
    let mut allocator = SegAlloc::new();
    let whole = SizeClass::Bytes128.capacity() - HEADER_OVERHEAD;

    let fill = allocator.allocate(whole);
    let x = allocator.allocate(100);
    // Takes the whole remainder x left behind in the 256-byte zone.
    let y = allocator.allocate(110);
    assert_eq!(allocator.free_node_count(SizeClass::Bytes256), 0);

    unsafe {
        allocator.release(y);
        allocator.release(x);
        allocator.release(fill);
    }
    assert_fresh(&allocator);

    for _ in 0..5 {
        let ptr = allocator.allocate(232);
        unsafe { allocator.release(ptr) };
    }
    assert_fresh(&allocator);
}

#[test]
fn blocks_do_not_overlap() {
    let mut allocator = SegAlloc::new();
    let sizes = [100usize, 100, 300, 17, 1000, 60];

    let blocks: Vec<*mut u8> = sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| {
            let ptr = allocator.allocate(size);
            unsafe { ptr::write_bytes(ptr, i as u8 + 1, size) };
            ptr
        })
        .collect();

    for (i, (&ptr, &size)) in blocks.iter().zip(&sizes).enumerate() {
        let bytes = unsafe { std::slice::from_raw_parts(ptr, size) };
        assert!(bytes.iter().all(|b| *b == i as u8 + 1), "block {i} was overwritten");
    }

    for ptr in blocks {
        unsafe { allocator.release(ptr) };
    }
    assert_eq!(allocator.live_allocations(), 0);
}

#[test]
fn repeated_pairs_are_net_neutral() {
    let mut allocator = SegAlloc::new();
    let before = allocator.available_memory();

    for _ in 0..20 {
        let ptr = allocator.allocate(100);
        assert!(!ptr.is_null());
        unsafe { allocator.release(ptr) };
    }

    assert_eq!(allocator.available_memory(), before);
    assert_eq!(allocator.page_count(), 1);
}

#[test]
fn whole_node_allocation_is_reused() {
    let mut allocator = SegAlloc::new();
    let size = SizeClass::Bytes128.capacity() - HEADER_OVERHEAD;

    let first = allocator.allocate(size);
    assert_eq!(allocator.free_node_count(SizeClass::Bytes128), 0);

    unsafe { allocator.release(first) };
    assert_fresh(&allocator);

    let second = allocator.allocate(size);
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// coalescing
// ---------------------------------------------------------------------------

#[test]
fn reverse_order_release_coalesces_every_class() {
    let mut allocator = SegAlloc::new();

    let blocks: Vec<*mut u8> = (0..20).map(|_| allocator.allocate(100)).collect();
    assert!(blocks.iter().all(|p| !p.is_null()));
    assert_eq!(allocator.page_count(), 1);

    for ptr in blocks.into_iter().rev() {
        unsafe { allocator.release(ptr) };
    }

    assert_fresh(&allocator);
}

#[test]
fn forward_order_release_keeps_sizes_consistent() {
    let mut allocator = SegAlloc::new();
    let span = free_span(&allocator);

    let blocks: Vec<*mut u8> = (0..20).map(|_| allocator.allocate(100)).collect();
    for ptr in blocks {
        unsafe { allocator.release(ptr) };
    }

    // No backward merges: only the first block of a class meets its remainder.
    assert_eq!(allocator.free_node_count(SizeClass::Bytes128), 1);
    assert!(allocator.free_node_count(SizeClass::Bytes256) > 1);
    // Forward-only coalescing leaves fragments, so payload bytes stay below a fresh page.
    assert!(allocator.available_memory() < fresh_page_bytes());

    // Nothing was merged twice or lost.
    assert_eq!(free_span(&allocator), span);
    assert_eq!(allocator.live_allocations(), 0);
}

// ---------------------------------------------------------------------------
// limits and growth
// ---------------------------------------------------------------------------

#[test]
fn too_large_returns_null_and_changes_nothing() {
    let mut allocator = SegAlloc::new();
    let before = allocator.available_memory();

    assert!(allocator.allocate(MAX_ALLOCATION + 1).is_null());
    assert!(allocator.allocate(usize::MAX).is_null());

    assert_eq!(allocator.available_memory(), before);
    assert_eq!(allocator.page_count(), 1);
    assert_eq!(allocator.live_allocations(), 0);
}

#[test]
fn max_allocation_is_served() {
    let mut allocator = SegAlloc::new();

    let ptr = allocator.allocate(MAX_ALLOCATION);
    assert!(!ptr.is_null());
    assert_eq!(allocator.free_node_count(SizeClass::Bytes2048), 0);
}

#[test]
fn exhausting_a_page_grows_a_new_one() {
    let mut allocator = SegAlloc::new();

    let first = allocator.allocate(2000);
    let before = allocator.available_memory();
    assert_eq!(allocator.page_count(), 1);

    let second = allocator.allocate(2000);
    assert!(!second.is_null());
    assert_eq!(allocator.page_count(), 2);
    assert_eq!(
        allocator.available_memory(),
        before + fresh_page_bytes() - 2000 - HEADER_OVERHEAD
    );

    unsafe {
        allocator.release(first);
        allocator.release(second);
    }
    assert_eq!(allocator.available_memory(), 2 * fresh_page_bytes());
}

#[test]
fn many_small_blocks_span_several_pages() {
    let mut allocator = SegAlloc::new();

    let blocks: Vec<*mut u8> = (0..100).map(|_| allocator.allocate(100)).collect();
    assert!(blocks.iter().all(|p| !p.is_null()));
    assert!(allocator.page_count() > 1);
    assert_eq!(allocator.live_allocations(), 100);

    let pages = allocator.page_count();
    for ptr in blocks.into_iter().rev() {
        unsafe { allocator.release(ptr) };
    }

    assert_eq!(allocator.available_memory(), pages * fresh_page_bytes());
}

#[test]
fn page_limit_turns_growth_into_null() {
    let mut allocator = SegAlloc::with_config(Config::default().with_max_pages(1));

    assert!(!allocator.allocate(2000).is_null());
    assert!(allocator.allocate(2000).is_null());
    assert_eq!(
        allocator.try_allocate(2000),
        Err(AllocError::PageLimit { limit: 1 })
    );
    assert_eq!(allocator.page_count(), 1);
}

// ---------------------------------------------------------------------------
// reset
// ---------------------------------------------------------------------------

#[test]
fn reset_leaves_one_fresh_page() {
    let mut allocator = SegAlloc::new();
    for _ in 0..60 {
        allocator.allocate(300);
    }
    assert!(allocator.page_count() > 1);

    allocator.reset();

    assert_fresh(&allocator);
    assert_eq!(allocator.live_allocations(), 0);
}

#[test]
fn pointers_from_before_reset_are_ignored() {
    let mut allocator = SegAlloc::new();
    let stale = allocator.allocate(100);

    allocator.reset();
    let result = unsafe { allocator.try_release(stale) };

    assert_eq!(result, Err(ReleaseError::Foreign { addr: stale as usize }));
    assert_fresh(&allocator);
}

// ---------------------------------------------------------------------------
// invalid releases
// ---------------------------------------------------------------------------

#[test]
fn release_null_is_a_no_op() {
    let mut allocator = SegAlloc::new();

    unsafe {
        allocator.release(ptr::null_mut());
        assert_eq!(allocator.try_release(ptr::null_mut()), Ok(()));
    }
    assert_fresh(&allocator);
}

#[test]
fn double_release_is_ignored() {
    let mut allocator = SegAlloc::new();
    let keep = allocator.allocate(10);
    let ptr = allocator.allocate(100);

    unsafe { allocator.release(ptr) };
    let after_first = allocator.available_memory();

    let result = unsafe { allocator.try_release(ptr) };
    assert_eq!(result, Err(ReleaseError::BadTag { addr: ptr as usize }));

    unsafe { allocator.release(ptr) };
    assert_eq!(allocator.available_memory(), after_first);
    assert_eq!(allocator.live_allocations(), 1);

    unsafe { allocator.release(keep) };
}

#[test]
fn foreign_pointer_is_ignored() {
    let mut allocator = SegAlloc::new();
    let mut local = [0u8; 64];
    let foreign = local[32..].as_mut_ptr();

    let result = unsafe { allocator.try_release(foreign) };
    assert_eq!(result, Err(ReleaseError::Foreign { addr: foreign as usize }));

    unsafe { allocator.release(foreign) };
    assert_fresh(&allocator);
}

#[test]
#[should_panic(expected = "invalid release")]
fn strict_release_panics_on_foreign_pointer() {
    let mut allocator = SegAlloc::with_config(Config::default().with_strict_release(true));
    let mut local = [0u8; 64];

    unsafe { allocator.release(local[32..].as_mut_ptr()) };
}

// ---------------------------------------------------------------------------
// introspection
// ---------------------------------------------------------------------------

#[test]
fn dump_shows_split_chain() {
    let mut allocator = SegAlloc::new();
    allocator.allocate(100);

    let dump = allocator.dump_free_lists();
    let remainder = SizeClass::Bytes128.capacity() - HEADER_OVERHEAD - 100;

    assert!(dump.contains(&format!("page 1, 128-byte class: Free({remainder})")));
    assert_eq!(dump, allocator.free_lists().to_string());
}

#[test]
fn dump_marks_empty_chains() {
    let mut allocator = SegAlloc::new();
    allocator.allocate(SizeClass::Bytes128.capacity() - HEADER_OVERHEAD);

    assert!(
        allocator
            .dump_free_lists()
            .contains("page 1, 128-byte class: (empty)")
    );
}
