use std::{
    alloc::{handle_alloc_error, Layout},
    ptr::{self, NonNull},
};

use log::{error, trace, warn};

use crate::{
    config::Config,
    error::{AllocError, ReleaseError},
    freelist::{Fit, FreeList},
    layout::HEADER_OVERHEAD,
    page::PAGE_SIZE,
    size_class::{SizeClass, MAX_ALLOCATION},
    store::{FreeLists, PageStore},
};

/// Segregated free-list allocator over 4 KiB pages.
///
/// Every page is split into five zones, one per [`SizeClass`], and every
/// zone keeps its own chain of free nodes. A request is served from the
/// first page, starting at the smallest class that can hold it, and a new
/// page is mapped when no page can.
///
/// ```text
///                  +-------------------------------+
///  allocate(100) ->| page 0: 128 | 256 | ... | 2KB |--+
///                  +-------------------------------+  |  nothing fits
///                  +-------------------------------+  |
///                  | page 1: 128 | 256 | ... | 2KB |<-+  grow once, retry
///                  +-------------------------------+
/// ```
///
/// The allocator is single threaded: it holds raw page pointers and is
/// neither `Send` nor `Sync`. Independent instances don't share anything.
pub struct SegAlloc {
    store: PageStore,
    config: Config,
    /// Blocks handed out and not yet released.
    live: usize,
}

impl SegAlloc {
    /// Creates an allocator with the default [`Config`] and one page.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an allocator with one page. Aborts the process if the kernel
    /// can't provide it.
    pub fn with_config(config: Config) -> Self {
        match Self::try_with_config(config) {
            Ok(allocator) => allocator,
            Err(err) => fatal(err),
        }
    }

    pub fn try_with_config(config: Config) -> Result<Self, AllocError> {
        let mut store = PageStore::new(config.max_pages);
        store.grow()?;

        Ok(Self {
            store,
            config,
            live: 0,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a pointer to `size` writable bytes, or null if `size` is above
    /// [`MAX_ALLOCATION`] or the page limit is reached. Aborts the process if
    /// the kernel refuses to hand out a page.
    ///
    /// The returned pointer has no alignment guarantee.
    pub fn allocate(&mut self, size: usize) -> *mut u8 {
        match self.try_allocate(size) {
            Ok(ptr) => ptr.as_ptr(),
            Err(err @ AllocError::OutOfMemory { .. }) => fatal(err),
            Err(err) => {
                trace!("allocate({size}) refused: {err}");
                ptr::null_mut()
            }
        }
    }

    /// Same as [`SegAlloc::allocate`] but reports every failure instead of
    /// returning null or aborting.
    pub fn try_allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let (page_index, class, fit) = self.find_free(size)?;

        let page = self.store.page_mut(page_index);
        let header_at = FreeList::new(page, class).carve(fit, size, page_index as u32);
        let ptr = page.payload(header_at);

        self.live += 1;
        trace!("allocate({size}) -> page {page_index}, {class}, offset {header_at}");

        Ok(ptr)
    }

    /// Looks for a free node that can hold `size` bytes: pages in creation
    /// order, classes from the smallest eligible one upwards, first fit
    /// inside a chain. Grows by one page and looks again if nothing fits.
    fn find_free(&mut self, size: usize) -> Result<(usize, SizeClass, Fit), AllocError> {
        let min_class = SizeClass::select(size).ok_or(AllocError::TooLarge {
            requested: size,
            max: MAX_ALLOCATION,
        })?;

        if let Some(found) = self.scan(size, min_class) {
            return Ok(found);
        }

        self.store.grow()?;

        self.scan(size, min_class)
            .ok_or(AllocError::Exhausted { requested: size })
    }

    fn scan(&mut self, size: usize, min_class: SizeClass) -> Option<(usize, SizeClass, Fit)> {
        let store = &mut self.store;

        for page_index in 0..store.len() {
            for class in min_class.and_larger() {
                let list = FreeList::new(store.page_mut(page_index), class);
                if let Some(fit) = list.first_fit(size) {
                    return Some((page_index, class, fit));
                }
            }
        }

        None
    }

    /// Gives a block back. Null is ignored, and so is anything that isn't a
    /// live block of this allocator, unless [`Config::strict_release`] is
    /// set, in which case it panics.
    ///
    /// # Safety
    ///
    /// If `ptr` came from this allocator, the caller must not use the block
    /// afterwards.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        if let Err(err) = unsafe { self.try_release(ptr) } {
            if self.config.strict_release {
                panic!("invalid release: {err}");
            }
            warn!("ignoring release: {err}");
        }
    }

    /// Same as [`SegAlloc::release`] but reports why a pointer was refused.
    /// A null pointer is accepted and does nothing.
    ///
    /// # Safety
    ///
    /// See [`SegAlloc::release`].
    pub unsafe fn try_release(&mut self, ptr: *mut u8) -> Result<(), ReleaseError> {
        let Some(ptr) = NonNull::new(ptr) else {
            return Ok(());
        };
        let addr = ptr.as_ptr() as usize;

        let (page_index, offset) = self
            .store
            .locate(ptr)
            .ok_or(ReleaseError::Foreign { addr })?;

        let page = self.store.page_mut(page_index);
        let header = page.header(offset);

        if !header.is_valid() {
            return Err(ReleaseError::BadTag { addr });
        }

        let class = SizeClass::from_index(header.class as usize)
            .filter(|_| header.page_index as usize == page_index)
            .filter(|_| header.size <= PAGE_SIZE - HEADER_OVERHEAD - offset)
            .ok_or(ReleaseError::Corrupt { addr })?;

        trace!("release({addr:#x}) -> page {page_index}, {class}, offset {offset}");

        FreeList::new(page, class).push(offset, header);
        self.live = self.live.saturating_sub(1);

        Ok(())
    }

    /// Forgets every page and block and starts over with one fresh page.
    /// The forgotten pages stay mapped until the allocator is dropped.
    pub fn reset(&mut self) {
        if let Err(err) = self.store.reset() {
            fatal(err);
        }
        self.live = 0;
    }

    /// Sum of the sizes of every free node, in bytes.
    pub fn available_memory(&self) -> usize {
        self.store.total_free_bytes()
    }

    /// Number of free nodes of `class`, over every page.
    pub fn free_node_count(&self, class: SizeClass) -> usize {
        self.store.free_node_count(class)
    }

    pub fn page_count(&self) -> usize {
        self.store.len()
    }

    pub fn live_allocations(&self) -> usize {
        self.live
    }

    /// Displayable view of every free chain.
    pub fn free_lists(&self) -> FreeLists<'_> {
        FreeLists(&self.store)
    }

    /// Text dump of every free chain. See [`FreeLists`].
    pub fn dump_free_lists(&self) -> String {
        self.free_lists().to_string()
    }
}

impl Default for SegAlloc {
    fn default() -> Self {
        Self::new()
    }
}

/// Nothing can go on without pages.
fn fatal(err: AllocError) -> ! {
    error!("{err}");
    handle_alloc_error(Layout::new::<[u8; PAGE_SIZE]>())
}
