// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Host memory backing images, buffers and descriptor sets.
//!
//! Every object that shader code can address lives in a [`HostMemory`] block. Blocks are zeroed
//! on allocation and aligned to [`MIN_ALIGNMENT`] bytes, which is the alignment required of every
//! descriptor record and of every vector load performed by shader code.
//!
//! Memory is not internally synchronized. Shader code writes into images through raw pointers
//! taken from a `HostMemory`, so the caller is responsible for ordering accesses from different
//! threads.

use crate::{DeviceSize, VulkanError};
use std::{
    alloc::{self, Layout},
    fmt::{Debug, Error as FmtError, Formatter},
    ptr::{self, NonNull},
};

/// The largest allocation that can be made, in bytes.
///
/// Shader code addresses memory with signed 32-bit offsets, so every resource must fit well
/// within that range.
pub const MAX_MEMORY_ALLOCATION_SIZE: DeviceSize = 0x4000_0000;

/// The alignment of every host memory block.
pub const MIN_ALIGNMENT: usize = 16;

/// A zeroed, 16-byte aligned block of host memory.
pub struct HostMemory {
    ptr: NonNull<u8>,
    size: usize,
}

// SAFETY: The memory is only a block of bytes. Callers of the `unsafe` accessors uphold the
// aliasing rules.
unsafe impl Send for HostMemory {}
unsafe impl Sync for HostMemory {}

impl HostMemory {
    /// Allocates a new zeroed block of `size` bytes.
    ///
    /// A `size` of zero is valid, and produces a block that can't be read or written.
    pub fn new(size: DeviceSize) -> Result<Self, VulkanError> {
        if size > MAX_MEMORY_ALLOCATION_SIZE {
            return Err(VulkanError::OutOfDeviceMemory);
        }

        let size = size as usize;
        let layout = Self::layout(size)?;
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(VulkanError::OutOfHostMemory)?;

        Ok(HostMemory { ptr, size })
    }

    fn layout(size: usize) -> Result<Layout, VulkanError> {
        // Zero-sized allocations are not allowed by the global allocator.
        Layout::from_size_align(size.max(1), MIN_ALIGNMENT)
            .map_err(|_| VulkanError::OutOfHostMemory)
    }

    /// Returns the size of the block in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns a pointer to the start of the block.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Copies bytes out of the block.
    ///
    /// # Panics
    ///
    /// - Panics if `offset + dst.len()` is greater than the size of the block.
    ///
    /// # Safety
    ///
    /// - No other thread may be writing to the range at the same time.
    pub unsafe fn read(&self, offset: usize, dst: &mut [u8]) {
        assert!(offset + dst.len() <= self.size);

        unsafe { ptr::copy_nonoverlapping(self.as_ptr().add(offset), dst.as_mut_ptr(), dst.len()) };
    }

    /// Copies bytes into the block.
    ///
    /// # Panics
    ///
    /// - Panics if `offset + src.len()` is greater than the size of the block.
    ///
    /// # Safety
    ///
    /// - No other thread may be accessing the range at the same time.
    pub unsafe fn write(&self, offset: usize, src: &[u8]) {
        assert!(offset + src.len() <= self.size);

        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), self.as_ptr().add(offset), src.len()) };
    }

    /// Returns the whole block as a byte slice.
    ///
    /// # Safety
    ///
    /// - No one may write to the block while the slice is alive.
    #[inline]
    pub unsafe fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.size) }
    }

    /// Returns the whole block as a mutable byte slice.
    ///
    /// # Safety
    ///
    /// - No one else may access the block while the slice is alive.
    #[inline]
    pub unsafe fn as_mut_slice(&self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.as_ptr(), self.size) }
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        if let Ok(layout) = Self::layout(self.size) {
            unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

impl Debug for HostMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("HostMemory")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{HostMemory, MAX_MEMORY_ALLOCATION_SIZE, MIN_ALIGNMENT};
    use crate::VulkanError;

    #[test]
    fn zeroed_and_aligned() {
        let memory = HostMemory::new(100).unwrap();
        assert_eq!(memory.as_ptr() as usize % MIN_ALIGNMENT, 0);
        assert!(unsafe { memory.as_slice() }.iter().all(|&b| b == 0));
    }

    #[test]
    fn read_back_written_bytes() {
        let memory = HostMemory::new(32).unwrap();

        unsafe { memory.write(8, &[1, 2, 3, 4]) };

        let mut dst = [0; 6];
        unsafe { memory.read(7, &mut dst) };
        assert_eq!(dst, [0, 1, 2, 3, 4, 0]);
    }

    #[test]
    fn too_large() {
        assert_eq!(
            HostMemory::new(MAX_MEMORY_ALLOCATION_SIZE + 1).unwrap_err(),
            VulkanError::OutOfDeviceMemory,
        );
    }

    #[test]
    fn zero_sized() {
        let memory = HostMemory::new(0).unwrap();
        assert_eq!(memory.size(), 0);
    }

    #[test]
    fn out_of_range_write() {
        let memory = HostMemory::new(4).unwrap();
        assert_should_panic!({
            unsafe { memory.write(2, &[0; 4]) };
        });
    }
}
