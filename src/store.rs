use std::{fmt, ptr::NonNull};

use log::debug;

use crate::{
    error::AllocError,
    kernel::{request_memory, return_memory},
    page::{Page, PAGE_SIZE},
    size_class::SizeClass,
};

/// Every page the allocator knows about, in creation order. A page is
/// identified by its index here, which is what allocation headers record.
///
/// ```text
/// +-----------------+    +-----------------+    +-----------------+
/// | Page 0          |    | Page 1          |    | Page 2          |
/// | 128|256|...|2KB | -> | 128|256|...|2KB | -> | 128|256|...|2KB |
/// +-----------------+    +-----------------+    +-----------------+
/// ```
///
/// Pages are never handed back to the kernel while the store is alive.
/// [`PageStore::reset`] only forgets them; they are unmapped on drop.
pub(crate) struct PageStore {
    pages: Vec<Page>,
    /// Pages detached by [`PageStore::reset`].
    retired: Vec<NonNull<u8>>,
    max_pages: usize,
}

impl PageStore {
    /// Creates an empty store. `max_pages` is clamped between one page and
    /// what a header can index.
    pub fn new(max_pages: Option<usize>) -> Self {
        let ceiling = u32::MAX as usize;

        Self {
            pages: Vec::new(),
            retired: Vec::new(),
            max_pages: max_pages.map_or(ceiling, |max| max.clamp(1, ceiling)),
        }
    }

    /// Requests a fresh page from the kernel.
    fn acquire_page() -> Result<NonNull<u8>, AllocError> {
        request_memory(PAGE_SIZE).ok_or(AllocError::OutOfMemory { bytes: PAGE_SIZE })
    }

    /// Appends a freshly formatted page and returns its index.
    pub fn grow(&mut self) -> Result<usize, AllocError> {
        if self.pages.len() >= self.max_pages {
            return Err(AllocError::PageLimit {
                limit: self.max_pages,
            });
        }

        let base = Self::acquire_page()?;
        let index = self.pages.len();

        // The kernel gave us PAGE_SIZE fresh bytes nobody else can see.
        self.pages.push(unsafe { Page::format(base) });

        debug!("page {index} acquired at {:p}", base.as_ptr());

        Ok(index)
    }

    /// Forgets every page and starts over with a single fresh one. The old
    /// pages stay mapped until the store is dropped.
    pub fn reset(&mut self) -> Result<(), AllocError> {
        debug!("reset: detaching {} pages", self.pages.len());

        self.retired.extend(self.pages.drain(..).map(|page| page.base()));
        self.grow().map(|_| ())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> impl Iterator<Item = (usize, &Page)> {
        self.pages.iter().enumerate()
    }

    pub fn page_mut(&mut self, index: usize) -> &mut Page {
        &mut self.pages[index]
    }

    /// Finds the live page `ptr` could have been handed out from, together
    /// with the offset of its header.
    pub fn locate(&self, ptr: NonNull<u8>) -> Option<(usize, usize)> {
        self.pages()
            .find_map(|(index, page)| page.header_offset_of(ptr).map(|offset| (index, offset)))
    }

    pub fn total_free_bytes(&self) -> usize {
        self.pages()
            .flat_map(|(_, page)| SizeClass::ALL.into_iter().flat_map(move |class| page.chain(class)))
            .map(|(_, node)| node.size)
            .sum()
    }

    pub fn free_node_count(&self, class: SizeClass) -> usize {
        self.pages().map(|(_, page)| page.chain(class).count()).sum()
    }
}

impl Drop for PageStore {
    fn drop(&mut self) {
        let live = self.pages.drain(..).map(|page| page.base());

        for base in live.chain(self.retired.drain(..)) {
            // Every base came from `acquire_page` and the store is going away.
            unsafe { return_memory(base, PAGE_SIZE) };
        }
    }
}

/// Human readable dump of every chain, one line per page and class.
///
/// ```text
/// page 1, 128-byte class: Free(4)
/// page 1, 256-byte class: Free(108)->Free(108)->Free(8)
/// ```
///
/// Meant for eyes, not for parsing.
pub struct FreeLists<'a>(pub(crate) &'a PageStore);

impl fmt::Display for FreeLists<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, page) in self.0.pages() {
            for class in SizeClass::ALL {
                write!(f, "page {}, {class}: ", index + 1)?;

                let mut nodes = page.chain(class).peekable();
                if nodes.peek().is_none() {
                    write!(f, "(empty)")?;
                }
                while let Some((_, node)) = nodes.next() {
                    write!(f, "Free({})", node.size)?;
                    if nodes.peek().is_some() {
                        write!(f, "->")?;
                    }
                }

                writeln!(f)?;
            }
        }

        Ok(())
    }
}
