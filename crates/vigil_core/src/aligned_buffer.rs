use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::ops::{Deref, DerefMut};

use crate::error::{Result, ScanError};

/// Page alignment; satisfies the direct I/O requirement of every common
/// logical sector size.
pub const DEFAULT_ALIGNMENT: usize = 4096;

/// A zeroed heap buffer whose start address is aligned for direct I/O.
///
/// Owned by one worker slot for the whole scan and released on drop.
pub struct AlignedBuffer {
    ptr: *mut u8,
    size: usize,
    layout: Layout,
}

impl AlignedBuffer {
    pub fn new(size: usize, alignment: usize) -> Result<Self> {
        let invalid = || ScanError::InvalidBuffer { size, alignment };

        if size == 0 || !alignment.is_power_of_two() {
            return Err(invalid());
        }

        let layout = Layout::from_size_align(size, alignment).map_err(|_| invalid())?;

        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }

        Ok(Self { ptr, size, layout })
    }

    #[inline]
    pub fn with_default_alignment(size: usize) -> Result<Self> {
        Self::new(size, DEFAULT_ALIGNMENT)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `size` initialized bytes for our lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }

    #[inline]
    pub fn is_aligned_to(&self, alignment: usize) -> bool {
        alignment != 0 && (self.ptr as usize).is_multiple_of(alignment)
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with exactly this layout.
        unsafe {
            dealloc(self.ptr, self.layout);
        }
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for AlignedBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

// SAFETY: the buffer exclusively owns its allocation.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}
