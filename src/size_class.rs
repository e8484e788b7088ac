use std::fmt;

use crate::layout::{HEADER_OVERHEAD, NODE_OVERHEAD};

/// Size classes of a page. Every page carries one zone per class, each zone
/// starting as a single free node of the class capacity:
///
/// ```text
/// +-----+-----+-----+-----+-----+
/// | 128 | 256 | 512 | 1KB | 2KB |
/// +-----+-----+-----+-----+-----+
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SizeClass {
    Bytes128 = 0,
    Bytes256 = 1,
    Bytes512 = 2,
    Bytes1024 = 3,
    Bytes2048 = 4,
}

/// Exponent of the smallest class capacity.
const MIN_SHIFT: usize = 7;

/// Largest request any class can hold once the header is accounted for.
pub const MAX_ALLOCATION: usize =
    SizeClass::Bytes2048.capacity() + NODE_OVERHEAD - HEADER_OVERHEAD;

impl SizeClass {
    pub const COUNT: usize = 5;

    /// All classes, smallest first.
    pub const ALL: [SizeClass; Self::COUNT] = [
        SizeClass::Bytes128,
        SizeClass::Bytes256,
        SizeClass::Bytes512,
        SizeClass::Bytes1024,
        SizeClass::Bytes2048,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Usable bytes of a fresh zone of this class.
    #[inline]
    pub const fn capacity(self) -> usize {
        1 << (MIN_SHIFT + self.index())
    }

    /// Smallest class able to hold `requested` bytes plus a header, or
    /// `None` if not even the largest one can.
    pub fn select(requested: usize) -> Option<Self> {
        let needed = requested.checked_add(HEADER_OVERHEAD)?;

        Self::ALL
            .into_iter()
            .find(|class| class.capacity() + NODE_OVERHEAD >= needed)
    }

    /// This class followed by every larger one.
    pub fn and_larger(self) -> impl Iterator<Item = SizeClass> {
        Self::ALL.into_iter().skip(self.index())
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-byte class", self.capacity())
    }
}
