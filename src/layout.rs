use std::mem;

/// Tag written into every [`Header`] at allocation time. A release whose
/// header doesn't carry it is rejected.
pub(crate) const MAGIC: u32 = 0xDEAD_BEEF;

/// Encodes "no next node" inside [`FreeNode::next`].
pub(crate) const NIL: usize = usize::MAX;

/// Metadata overhead of a free node in bytes.
pub const NODE_OVERHEAD: usize = mem::size_of::<FreeNode>();

/// Metadata overhead of an allocated block in bytes.
pub const HEADER_OVERHEAD: usize = mem::size_of::<Header>();

/// A free span of memory. It lives inside the free memory itself, so it
/// costs nothing while the span is handed out to a caller.
///
/// ```text
/// +---------------------+ <------+
/// |        size         |        |
/// +---------------------+        | -> FreeNode
/// |   next (offset)     |        |
/// +---------------------+ <------+
/// |                     |        |
/// |    size bytes of    |        | -> Free payload
/// |    free memory      |        |
/// +---------------------+ <------+
/// ```
///
/// `next` is the byte offset of the next node of the same chain inside the
/// same page, or [`NIL`].
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FreeNode {
    /// Usable bytes after the node metadata.
    pub size: usize,
    /// Offset of the next node in the chain.
    pub next: usize,
}

impl FreeNode {
    pub fn new(size: usize, next: Option<usize>) -> Self {
        Self {
            size,
            next: next.unwrap_or(NIL),
        }
    }

    #[inline]
    pub fn next(&self) -> Option<usize> {
        (self.next != NIL).then_some(self.next)
    }

    #[inline]
    pub fn set_next(&mut self, next: Option<usize>) {
        self.next = next.unwrap_or(NIL);
    }
}

/// Metadata placed right before every pointer handed to a caller.
///
/// ```text
/// +---------------------+ <------+
/// |        size         |        |
/// +---------------------+        |
/// |  magic | page_index |        | -> Header
/// +---------------------+        |
/// |  class | (padding)  |        |
/// +---------------------+ <------+ <- pointer returned to the caller
/// |       Content       |
/// |         ...         |
/// +---------------------+
/// ```
///
/// On release the same bytes are rewritten as a [`FreeNode`]. `magic` sits
/// under [`FreeNode::next`], so that rewrite always wipes the tag and a
/// second release of the same pointer is caught.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    /// Payload in bytes: the request, or the whole node's capacity when
    /// the node was taken without a remainder.
    pub size: usize,
    pub magic: u32,
    pub page_index: u32,
    pub class: u32,
}

impl Header {
    pub fn new(size: usize, page_index: u32, class: u32) -> Self {
        Self {
            size,
            magic: MAGIC,
            page_index,
            class,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    /// The free node this header turns into once released. The span it
    /// covers is exactly the header plus the recorded payload.
    pub fn into_node(self, next: Option<usize>) -> FreeNode {
        FreeNode::new(self.size + (HEADER_OVERHEAD - NODE_OVERHEAD), next)
    }
}

const _: () = assert!(HEADER_OVERHEAD >= NODE_OVERHEAD);
const _: () = assert!(
    mem::offset_of!(Header, magic) >= mem::offset_of!(FreeNode, next)
        && mem::offset_of!(Header, magic) + mem::size_of::<u32>()
            <= mem::offset_of!(FreeNode, next) + mem::size_of::<usize>()
);
