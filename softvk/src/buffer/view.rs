// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! View of a buffer, in order to use it as a uniform texel buffer or storage texel buffer.
//!
//! A buffer view indicates which format the data is in. Buffer views share their identifier
//! space with image views, since both can be the source of a sampling routine.

use super::Buffer;
use crate::{
    device::{Device, DeviceOwned, ImageViewState},
    format::Format,
    image::{ImageAspects, ImageView, ImageViewType, SampleCount},
    DeviceSize, ValidationError,
};
use std::{num::NonZero, ops::Range, sync::Arc};

/// Represents a way for the GPU to interpret buffer data. See the documentation of the
/// `view` module.
#[derive(Debug)]
pub struct BufferView {
    buffer: Arc<Buffer>,
    id: NonZero<u32>,

    format: Format,
    range: Range<DeviceSize>,
}

impl BufferView {
    /// Creates a new `BufferView`.
    pub fn new(
        buffer: Arc<Buffer>,
        create_info: BufferViewCreateInfo,
    ) -> Result<Arc<BufferView>, Box<ValidationError>> {
        create_info
            .validate(&buffer)
            .map_err(|err| err.add_context("create_info"))?;

        let BufferViewCreateInfo {
            format,
            range,
            _ne: _,
        } = create_info;

        let view = BufferView {
            buffer,
            id: ImageView::next_id(),
            format,
            range,
        };

        view.buffer.device().register_image_view(
            view.id.get(),
            ImageViewState {
                view_type: ImageViewType::Dim1d,
                format,
                extent: [view.element_count(), 1, 1],
                mip_levels: 1,
                array_layers: 1,
                samples: SampleCount::Sample1,
            },
        );

        Ok(Arc::new(view))
    }

    /// Returns the unique identifier of the view.
    #[inline]
    pub fn id(&self) -> NonZero<u32> {
        self.id
    }

    /// Returns the buffer associated to this view.
    #[inline]
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    /// Returns the format of this view.
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the byte range of the wrapped buffer that this view exposes.
    #[inline]
    pub fn range(&self) -> Range<DeviceSize> {
        self.range.clone()
    }

    /// Returns the number of texels in the view.
    #[inline]
    pub fn element_count(&self) -> u32 {
        ((self.range.end - self.range.start) / self.format.block_size()) as u32
    }

    /// Returns a pointer to the first texel of the view.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        // SAFETY: The range was checked to be within the buffer.
        unsafe { self.buffer.as_ptr().add(self.range.start as usize) }
    }
}

impl Drop for BufferView {
    fn drop(&mut self) {
        self.buffer.device().unregister_image_view(self.id.get());
    }
}

unsafe impl DeviceOwned for BufferView {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        self.buffer.device()
    }
}

impl PartialEq for BufferView {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BufferView {}

/// Parameters to create a new `BufferView`.
#[derive(Clone, Debug)]
pub struct BufferViewCreateInfo {
    /// The format of the buffer view.
    ///
    /// The default value is `Format::UNDEFINED`, which must be overridden.
    pub format: Format,

    /// The byte range of the buffer to view.
    ///
    /// The default value is empty, which must be overridden.
    pub range: Range<DeviceSize>,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferViewCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            format: Format::UNDEFINED,
            range: 0..0,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl BufferViewCreateInfo {
    pub(crate) fn validate(&self, buffer: &Buffer) -> Result<(), Box<ValidationError>> {
        let Self {
            format,
            range,
            _ne: _,
        } = self;

        if !format.aspects().contains(ImageAspects::COLOR) {
            return Err(Box::new(ValidationError {
                context: "format".into(),
                problem: "is not a color format".into(),
                vuids: &["VUID-VkBufferViewCreateInfo-format-08778"],
            }));
        }

        buffer.validate_range(range)?;

        if (range.end - range.start) % format.block_size() != 0 {
            return Err(Box::new(ValidationError {
                context: "range".into(),
                problem: "is not a multiple of the block size of `format`".into(),
                vuids: &["VUID-VkBufferViewCreateInfo-range-00929"],
            }));
        }

        Ok(())
    }
}
