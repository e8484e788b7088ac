use thiserror::Error;

/// Why an allocation request could not be served.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    #[error("requested {requested} bytes, the largest supported allocation is {max} bytes")]
    TooLarge { requested: usize, max: usize },
    #[error("the operating system refused a {bytes}-byte page")]
    OutOfMemory { bytes: usize },
    #[error("page limit of {limit} reached")]
    PageLimit { limit: usize },
    #[error("no free block for {requested} bytes even after growing")]
    Exhausted { requested: usize },
}

/// Why a pointer given to release was not taken back.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("{addr:#x} does not belong to any live page")]
    Foreign { addr: usize },
    #[error("no valid header before {addr:#x} (double release or garbage pointer)")]
    BadTag { addr: usize },
    #[error("header before {addr:#x} is inconsistent with its page")]
    Corrupt { addr: usize },
}
