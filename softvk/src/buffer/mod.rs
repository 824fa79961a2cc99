// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Location in memory that contains data.
//!
//! A buffer is a linear block of host memory. Shader code reaches it through uniform and storage
//! buffer descriptors, or through [buffer views](view) when the data is to be interpreted as
//! texels.

pub use self::view::{BufferView, BufferViewCreateInfo};
use crate::{
    device::{Device, DeviceOwned},
    memory::HostMemory,
    DeviceSize, Validated, ValidationError, VulkanError,
};
use bytemuck::Pod;
use std::{mem::size_of_val, ops::Range, sync::Arc};

pub mod view;

/// A linear block of host memory.
#[derive(Debug)]
pub struct Buffer {
    device: Arc<Device>,
    memory: HostMemory,
}

impl Buffer {
    /// Creates a new zero-filled `Buffer`.
    pub fn new(
        device: Arc<Device>,
        create_info: BufferCreateInfo,
    ) -> Result<Arc<Buffer>, Validated<VulkanError>> {
        let BufferCreateInfo { size, _ne: _ } = create_info;

        if size == 0 {
            return Err(Box::new(ValidationError {
                context: "create_info.size".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkBufferCreateInfo-size-00912"],
            })
            .into());
        }

        let memory = HostMemory::new(size)?;

        Ok(Arc::new(Buffer { device, memory }))
    }

    /// Creates a new `Buffer` holding a copy of `data`.
    pub fn from_slice<T: Pod>(
        device: Arc<Device>,
        data: &[T],
    ) -> Result<Arc<Buffer>, Validated<VulkanError>> {
        let buffer = Self::new(
            device,
            BufferCreateInfo {
                size: size_of_val(data) as DeviceSize,
                ..Default::default()
            },
        )?;

        // SAFETY: The buffer was just created, so no one else can access it.
        unsafe { buffer.write(0, data) };

        Ok(buffer)
    }

    /// Returns the size of the buffer in bytes.
    #[inline]
    pub fn size(&self) -> DeviceSize {
        self.memory.size() as DeviceSize
    }

    /// Returns a pointer to the first byte of the buffer.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.memory.as_ptr()
    }

    /// Writes `data` into the buffer, starting at `offset` bytes.
    ///
    /// # Panics
    ///
    /// - Panics if the data doesn't fit in the buffer.
    ///
    /// # Safety
    ///
    /// - No shader code may be accessing the range at the same time.
    #[inline]
    pub unsafe fn write<T: Pod>(&self, offset: DeviceSize, data: &[T]) {
        unsafe {
            self.memory
                .write(offset as usize, bytemuck::cast_slice(data))
        };
    }

    /// Reads `dst.len()` elements from the buffer, starting at `offset` bytes.
    ///
    /// # Panics
    ///
    /// - Panics if the range doesn't fit in the buffer.
    ///
    /// # Safety
    ///
    /// - No shader code may be writing to the range at the same time.
    #[inline]
    pub unsafe fn read<T: Pod>(&self, offset: DeviceSize, dst: &mut [T]) {
        unsafe {
            self.memory
                .read(offset as usize, bytemuck::cast_slice_mut(dst))
        };
    }

    pub(crate) fn validate_range(
        &self,
        range: &Range<DeviceSize>,
    ) -> Result<(), Box<ValidationError>> {
        if range.is_empty() || range.end > self.size() {
            return Err(Box::new(ValidationError {
                context: "range".into(),
                problem: "is empty, or is not contained within the buffer".into(),
                vuids: &[
                    "VUID-VkDescriptorBufferInfo-offset-00340",
                    "VUID-VkDescriptorBufferInfo-range-00341",
                ],
            }));
        }

        Ok(())
    }
}

unsafe impl DeviceOwned for Buffer {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

/// Parameters to create a new `Buffer`.
#[derive(Clone, Debug)]
pub struct BufferCreateInfo {
    /// The size in bytes of the buffer.
    ///
    /// The default value is `0`, which must be overridden.
    pub size: DeviceSize,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            size: 0,
            _ne: crate::NonExhaustive(()),
        }
    }
}
