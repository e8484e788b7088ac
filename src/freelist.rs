use log::trace;

use crate::{
    layout::{FreeNode, Header, HEADER_OVERHEAD, NODE_OVERHEAD},
    page::Page,
    size_class::SizeClass,
};

/// A node able to hold a request, with the node linking to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Fit {
    pub offset: usize,
    /// `None` when the node is the head of its chain.
    pub prev: Option<usize>,
}

/// Whether a free node of `size` bytes can hold `requested` bytes plus a header.
#[inline]
pub(crate) fn fits(size: usize, requested: usize) -> bool {
    size + NODE_OVERHEAD >= requested + HEADER_OVERHEAD
}

/// One chain of free nodes: the nodes of a single [`SizeClass`] on a
/// single [`Page`].
///
/// Nodes are stored in the free memory itself, so a chain never allocates.
/// Released blocks are pushed at the head; the chain keeps no address order.
///
/// ```text
///   head
///    |
/// +--v-------+       +----------+       +----------+
/// | Free(4)  | ----> | Free(108)| ----> | Free(8)  | ----> None
/// +----------+       +----------+       +----------+
/// ```
pub(crate) struct FreeList<'a> {
    page: &'a mut Page,
    class: SizeClass,
}

impl<'a> FreeList<'a> {
    pub fn new(page: &'a mut Page, class: SizeClass) -> Self {
        Self { page, class }
    }

    /// Returns the first node of the chain that can hold `requested` bytes.
    ///
    /// This is first-fit inside one chain. Callers get close to best-fit by
    /// asking the classes in ascending order.
    pub fn first_fit(&self, requested: usize) -> Option<Fit> {
        let mut prev = None;

        for (offset, node) in self.page.chain(self.class) {
            if fits(node.size, requested) {
                return Some(Fit { offset, prev });
            }
            prev = Some(offset);
        }

        None
    }

    /// Carves `requested` bytes out of the node found by [`FreeList::first_fit`]
    /// and returns the offset of the header written there.
    ///
    /// If the node is too small to leave a free remainder behind, it is taken
    /// whole and the header records the node's full capacity, so releasing
    /// the block gives every byte of the node back. Otherwise the remainder
    /// starts right after the new block and takes the node's place in the
    /// chain:
    ///
    /// ```text
    /// before:  | node (size)                                  |
    /// after:   | header | requested | node (size - header - requested) |
    /// ```
    pub fn carve(&mut self, fit: Fit, requested: usize, page_index: u32) -> usize {
        let node = self.page.node(fit.offset);
        debug_assert!(fits(node.size, requested));

        let (recorded, successor) = if HEADER_OVERHEAD + requested >= node.size {
            trace!("{}: taking whole node at {} ({} bytes)", self.class, fit.offset, node.size);
            (node.size + NODE_OVERHEAD - HEADER_OVERHEAD, node.next())
        } else {
            let rest = fit.offset + HEADER_OVERHEAD + requested;
            let remainder = FreeNode {
                size: node.size - HEADER_OVERHEAD - requested,
                next: node.next,
            };
            trace!(
                "{}: splitting node at {}, {} bytes left at {}",
                self.class, fit.offset, remainder.size, rest
            );

            self.page.write_node(rest, remainder);
            (requested, Some(rest))
        };

        self.relink(fit.prev, successor);

        self.page.write_header(
            fit.offset,
            Header::new(recorded, page_index, self.class.index() as u32),
        );

        fit.offset
    }

    /// Turns a released block's header into a free node, merges it with the
    /// free nodes physically following it and makes it the new head.
    pub fn push(&mut self, offset: usize, header: Header) {
        let node = header.into_node(self.page.head(self.class));

        self.page.write_node(offset, node);
        self.coalesce(offset);
        self.page.set_head(self.class, Some(offset));
    }

    /// Absorbs `node.next` into the node at `offset` for as long as it
    /// starts right where the node ends.
    ///
    /// Only forward: there are no back links, so a free run ending just
    /// before `offset` stays separate until a release starts its walk
    /// further down.
    pub fn coalesce(&mut self, offset: usize) {
        let mut node = self.page.node(offset);

        while let Some(next) = node.next() {
            if offset + NODE_OVERHEAD + node.size != next {
                break;
            }

            let neighbour = self.page.node(next);
            trace!("{}: merging node at {} into {}", self.class, next, offset);

            node.size += neighbour.size + NODE_OVERHEAD;
            node.next = neighbour.next;
        }

        self.page.write_node(offset, node);
    }

    /// Points `prev` (or the chain head) at `successor`.
    fn relink(&mut self, prev: Option<usize>, successor: Option<usize>) {
        match prev {
            Some(prev) => {
                let mut node = self.page.node(prev);
                node.set_next(successor);
                self.page.write_node(prev, node);
            }
            None => self.page.set_head(self.class, successor),
        }
    }
}
