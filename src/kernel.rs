use std::ptr::NonNull;

/// Zero-sized handle to the operating system's virtual memory API.
pub(crate) struct Kernel;

/// This trait provides an abstraction to handle low level memory operations
/// and syscalls. The allocator only ever asks for whole pages and never
/// cares which kernel API hands them out.
trait PlatformMemory {
    /// Request a memory region of size `len`. It returns a pointer to the
    /// given location or None if the underlying syscall fails.
    unsafe fn request_memory(len: usize) -> Option<NonNull<u8>>;

    /// Returns the memory of size `len` starting from `addr` back to the kernel.
    unsafe fn return_memory(addr: NonNull<u8>, len: usize);
}

/// Wrapper to use [`Kernel::request_memory`]. The returned memory is zeroed,
/// readable and writable.
#[inline]
pub(crate) fn request_memory(len: usize) -> Option<NonNull<u8>> {
    unsafe { Kernel::request_memory(len) }
}

/// Wrapper to use [`Kernel::return_memory`].
///
/// **SAFETY**: `addr` must come from [`request_memory`] called with the same
/// `len`, and nothing may touch the region afterwards.
#[inline]
pub(crate) unsafe fn return_memory(addr: NonNull<u8>, len: usize) {
    unsafe { Kernel::return_memory(addr, len) }
}

#[cfg(unix)]
mod unix {
    use super::{Kernel, PlatformMemory};

    use libc::{mmap, munmap, off_t, size_t};

    use std::{
        os::raw::{c_int, c_void},
        ptr::NonNull,
    };

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // mmap parameters.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                match mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET) {
                    libc::MAP_FAILED => None,
                    addr => NonNull::new(addr.cast::<u8>()),
                }
            }
        }

        unsafe fn return_memory(addr: NonNull<u8>, len: usize) {
            unsafe {
                munmap(addr.as_ptr().cast::<c_void>(), len as size_t);
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{os::raw::c_void, ptr::NonNull};

    use super::{Kernel, PlatformMemory};

    use windows::Win32::System::Memory;

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // Read-Write only.
            let protection = Memory::PAGE_READWRITE;

            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);

                NonNull::new(addr.cast())
            }
        }

        unsafe fn return_memory(addr: NonNull<u8>, _len: usize) {
            unsafe {
                let _ = Memory::VirtualFree(addr.as_ptr().cast::<c_void>(), 0, Memory::MEM_RELEASE);
            }
        }
    }
}
