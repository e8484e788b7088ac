use std::ptr::NonNull;

use crate::{
    layout::{FreeNode, Header, HEADER_OVERHEAD, NODE_OVERHEAD},
    size_class::SizeClass,
};

/// Size of every page requested from the kernel.
pub const PAGE_SIZE: usize = 4096;

/// Bytes taken by the five zones of a freshly formatted page.
pub(crate) const ZONES_FOOTPRINT: usize = {
    let mut total = 0;
    let mut i = 0;
    while i < SizeClass::COUNT {
        total += SizeClass::ALL[i].capacity() + NODE_OVERHEAD;
        i += 1;
    }
    total
};

const _: () = assert!(ZONES_FOOTPRINT <= PAGE_SIZE);

/// One page of memory plus the heads of its five free chains.
///
/// The page memory is laid out as one zone per [`SizeClass`], and every
/// chain only ever links nodes of its own zone:
///
/// ```text
///  head[0]  head[1]       head[2]            ...
///     |        |             |
/// +---v----+---v---------+---v----------------------+-----
/// | Node   | Node        | Node                     | ...
/// | 128 B  | 256 B       | 512 B                    |
/// +--------+-------------+--------------------------+-----
/// ```
///
/// Nodes are addressed by their byte offset inside the page. Reading and
/// writing the records in page memory only happens through the accessors
/// below, which check that the record fits inside the page.
pub(crate) struct Page {
    base: NonNull<u8>,
    heads: [Option<usize>; SizeClass::COUNT],
}

impl Page {
    /// Lays out the five zones on the page starting at `base`.
    ///
    /// **SAFETY**: `base` must point to [`PAGE_SIZE`] writable bytes owned
    /// exclusively by the new page.
    pub unsafe fn format(base: NonNull<u8>) -> Self {
        let mut page = Self {
            base,
            heads: [None; SizeClass::COUNT],
        };

        let mut offset = 0;
        for class in SizeClass::ALL {
            page.write_node(offset, FreeNode::new(class.capacity(), None));
            page.heads[class.index()] = Some(offset);
            offset += class.capacity() + NODE_OVERHEAD;
        }

        page
    }

    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    #[inline]
    pub fn head(&self, class: SizeClass) -> Option<usize> {
        self.heads[class.index()]
    }

    #[inline]
    pub fn set_head(&mut self, class: SizeClass, head: Option<usize>) {
        self.heads[class.index()] = head;
    }

    pub fn node(&self, offset: usize) -> FreeNode {
        assert!(offset + NODE_OVERHEAD <= PAGE_SIZE, "free node at {offset} overruns its page");
        unsafe { self.base.as_ptr().add(offset).cast::<FreeNode>().read_unaligned() }
    }

    pub fn write_node(&mut self, offset: usize, node: FreeNode) {
        assert!(offset + NODE_OVERHEAD <= PAGE_SIZE, "free node at {offset} overruns its page");
        unsafe {
            self.base
                .as_ptr()
                .add(offset)
                .cast::<FreeNode>()
                .write_unaligned(node)
        }
    }

    pub fn header(&self, offset: usize) -> Header {
        assert!(offset + HEADER_OVERHEAD <= PAGE_SIZE, "header at {offset} overruns its page");
        unsafe { self.base.as_ptr().add(offset).cast::<Header>().read_unaligned() }
    }

    pub fn write_header(&mut self, offset: usize, header: Header) {
        assert!(offset + HEADER_OVERHEAD <= PAGE_SIZE, "header at {offset} overruns its page");
        unsafe {
            self.base
                .as_ptr()
                .add(offset)
                .cast::<Header>()
                .write_unaligned(header)
        }
    }

    /// Address handed to the caller for the header at `offset`.
    pub fn payload(&self, offset: usize) -> NonNull<u8> {
        assert!(offset + HEADER_OVERHEAD <= PAGE_SIZE);
        unsafe { self.base.add(offset + HEADER_OVERHEAD) }
    }

    /// Offset of the header that would precede `ptr` if `ptr` had been
    /// handed out from this page.
    pub fn header_offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let base = self.base.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;

        if addr < base + HEADER_OVERHEAD || addr > base + PAGE_SIZE {
            return None;
        }

        Some(addr - base - HEADER_OVERHEAD)
    }

    /// Walks one chain from its head.
    pub fn chain(&self, class: SizeClass) -> Chain<'_> {
        Chain {
            page: self,
            current: self.head(class),
        }
    }
}

/// Iterator over the `(offset, node)` pairs of one chain.
pub(crate) struct Chain<'a> {
    page: &'a Page,
    current: Option<usize>,
}

impl Iterator for Chain<'_> {
    type Item = (usize, FreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.current?;
        let node = self.page.node(offset);
        self.current = node.next();

        Some((offset, node))
    }
}
