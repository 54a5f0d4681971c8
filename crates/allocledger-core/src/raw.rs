//! Raw allocation primitives consumed by the registry.
//!
//! The registry never allocates on its own: both the tracked blocks and the
//! registry's own record table come from a [`RawAllocator`]. The production
//! implementation forwards to the C heap via `libc`.

use std::ptr::NonNull;

/// Minimum alignment every [`RawAllocator`] must honor.
///
/// Pointer alignment is what the registry's own record table needs; `malloc`
/// always gives at least this much.
pub const RAW_ALIGN: usize = std::mem::align_of::<usize>();

/// The untracked heap the registry sits on top of.
///
/// Implementations must return blocks aligned to at least [`RAW_ALIGN`] and
/// must be callable from any thread.
pub trait RawAllocator: Send + Sync {
    /// Allocate `size` bytes, zero-filled when `zeroed` is set.
    ///
    /// `size` is never zero when called by the registry.
    fn alloc(&self, size: usize, zeroed: bool) -> Option<NonNull<u8>>;

    /// Resize the block at `ptr` to `new_size` bytes, possibly moving it.
    ///
    /// On failure the original block is left intact and `None` is returned.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator and not yet released.
    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>>;

    /// Return the block at `ptr` to the heap.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator and not yet released.
    unsafe fn release(&self, ptr: NonNull<u8>);
}

/// C heap allocator (`malloc`/`calloc`/`realloc`/`free`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl RawAllocator for SystemAllocator {
    fn alloc(&self, size: usize, zeroed: bool) -> Option<NonNull<u8>> {
        // SAFETY: malloc/calloc accept any size; null signals exhaustion.
        let ptr = unsafe {
            if zeroed {
                libc::calloc(1, size)
            } else {
                libc::malloc(size)
            }
        };
        NonNull::new(ptr.cast::<u8>())
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        // SAFETY: caller guarantees `ptr` is a live block from this heap.
        // realloc leaves the original block untouched when it returns null.
        let moved = unsafe { libc::realloc(ptr.as_ptr().cast(), new_size) };
        NonNull::new(moved.cast::<u8>())
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: caller guarantees `ptr` is a live block from this heap.
        unsafe { libc::free(ptr.as_ptr().cast()) };
    }
}

impl<A: RawAllocator + ?Sized> RawAllocator for &A {
    fn alloc(&self, size: usize, zeroed: bool) -> Option<NonNull<u8>> {
        (**self).alloc(size, zeroed)
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        // SAFETY: forwarded contract.
        unsafe { (**self).resize(ptr, new_size) }
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded contract.
        unsafe { (**self).release(ptr) }
    }
}

impl<A: RawAllocator + ?Sized> RawAllocator for std::sync::Arc<A> {
    fn alloc(&self, size: usize, zeroed: bool) -> Option<NonNull<u8>> {
        (**self).alloc(size, zeroed)
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        // SAFETY: forwarded contract.
        unsafe { (**self).resize(ptr, new_size) }
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded contract.
        unsafe { (**self).release(ptr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_alloc_zeroed_is_zero_filled() {
        let heap = SystemAllocator;
        let ptr = heap.alloc(64, true).expect("calloc");
        // SAFETY: 64 bytes were just allocated.
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0));
        // SAFETY: live block from this heap.
        unsafe { heap.release(ptr) };
    }

    #[test]
    fn system_alloc_is_aligned() {
        let heap = SystemAllocator;
        let ptr = heap.alloc(24, false).expect("malloc");
        assert_eq!(ptr.as_ptr() as usize % RAW_ALIGN, 0);
        // SAFETY: live block from this heap.
        unsafe { heap.release(ptr) };
    }

    #[test]
    fn system_resize_preserves_prefix() {
        let heap = SystemAllocator;
        let ptr = heap.alloc(8, false).expect("malloc");
        // SAFETY: 8 bytes are writable.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0xAB, 8) };
        // SAFETY: live block from this heap.
        let grown = unsafe { heap.resize(ptr, 4096) }.expect("realloc");
        // SAFETY: at least 8 bytes are readable after growth.
        let bytes = unsafe { std::slice::from_raw_parts(grown.as_ptr(), 8) };
        assert_eq!(bytes, &[0xAB; 8]);
        // SAFETY: live block from this heap.
        unsafe { heap.release(grown) };
    }
}
