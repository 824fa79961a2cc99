// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Image views.
//!
//! An image view selects a subresource range of an image, and the way it is interpreted by shader
//! code. Every view is registered with its device, so that sampling routines can be specialized
//! for the view from its identifier alone.

use super::{Image, ImageAspect, ImageSubresourceRange, SampleCount};
use crate::{
    device::{Device, DeviceOwned, ImageViewState},
    format::Format,
    macros::{impl_id_counter, vulkan_enum},
    DeviceSize, ValidationError,
};
use std::{num::NonZero, sync::Arc};

/// A wrapper around an image that makes it available to shaders.
#[derive(Debug)]
pub struct ImageView {
    image: Arc<Image>,
    id: NonZero<u32>,

    view_type: ImageViewType,
    format: Format,
    subresource_range: ImageSubresourceRange,
}

impl ImageView {
    /// Creates a new `ImageView`.
    pub fn new(
        image: Arc<Image>,
        create_info: ImageViewCreateInfo,
    ) -> Result<Arc<ImageView>, Box<ValidationError>> {
        create_info
            .validate(&image)
            .map_err(|err| err.add_context("create_info"))?;

        let ImageViewCreateInfo {
            view_type,
            format,
            subresource_range,
            _ne: _,
        } = create_info;

        let view = ImageView {
            id: Self::next_id(),
            format: format.unwrap_or(image.format()),
            image,
            view_type,
            subresource_range,
        };

        view.image.device().register_image_view(view.id.get(), view.state());

        Ok(Arc::new(view))
    }

    /// Creates a default `ImageView`, covering the whole image.
    #[inline]
    pub fn new_default(image: Arc<Image>) -> Result<Arc<ImageView>, Box<ValidationError>> {
        let create_info = ImageViewCreateInfo::from_image(&image);

        Self::new(image, create_info)
    }

    pub(crate) fn state(&self) -> ImageViewState {
        let [width, height, depth] = self.mip_level_extent(0);

        ImageViewState {
            view_type: self.view_type,
            format: self.format,
            extent: [width, height, depth],
            mip_levels: self.mip_level_count(),
            array_layers: self.layer_count(),
            samples: self.image.samples(),
        }
    }

    /// Returns the wrapped image.
    #[inline]
    pub fn image(&self) -> &Arc<Image> {
        &self.image
    }

    /// Returns the type of the view.
    #[inline]
    pub fn view_type(&self) -> ImageViewType {
        self.view_type
    }

    /// Returns the format of the view.
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the subresource range of the image that the view covers.
    #[inline]
    pub fn subresource_range(&self) -> &ImageSubresourceRange {
        &self.subresource_range
    }

    /// Returns the number of mip levels of the view.
    #[inline]
    pub fn mip_level_count(&self) -> u32 {
        self.subresource_range.mip_levels.len() as u32
    }

    /// Returns the number of array layers of the view.
    #[inline]
    pub fn layer_count(&self) -> u32 {
        self.subresource_range.array_layers.len() as u32
    }

    /// Returns the first aspect covered by the view.
    ///
    /// This is the color aspect for color views, and the depth aspect for views that cover the
    /// depth aspect of a depth/stencil image.
    #[inline]
    pub fn primary_aspect(&self) -> ImageAspect {
        self.subresource_range
            .aspects
            .iter()
            .next()
            .unwrap_or(ImageAspect::Color)
    }

    /// Returns the extent of a mip level, relative to the base mip level of the view.
    #[inline]
    pub fn mip_level_extent(&self, mip_level: u32) -> [u32; 3] {
        self.image
            .mip_level_extent(self.subresource_range.mip_levels.start + mip_level)
    }

    /// Returns a pointer to a texel of the view. `mip_level` and `array_layer` are relative to the
    /// base of the view.
    pub fn texel_pointer(
        &self,
        offset: [u32; 3],
        aspect: ImageAspect,
        mip_level: u32,
        array_layer: u32,
    ) -> *mut u8 {
        self.image.texel_pointer(
            offset,
            aspect,
            self.subresource_range.mip_levels.start + mip_level,
            self.subresource_range.array_layers.start + array_layer,
        )
    }

    /// Returns the number of bytes between two rows of a mip level.
    #[inline]
    pub fn row_pitch_bytes(&self, aspect: ImageAspect, mip_level: u32) -> DeviceSize {
        self.image
            .row_pitch_bytes(aspect, self.subresource_range.mip_levels.start + mip_level)
    }

    /// Returns the number of bytes between two depth slices of a mip level.
    #[inline]
    pub fn slice_pitch_bytes(&self, aspect: ImageAspect, mip_level: u32) -> DeviceSize {
        self.image
            .slice_pitch_bytes(aspect, self.subresource_range.mip_levels.start + mip_level)
    }

    /// Returns the number of bytes between two samples of a mip level.
    #[inline]
    pub fn sample_pitch_bytes(&self, aspect: ImageAspect, mip_level: u32) -> DeviceSize {
        self.image
            .sample_pitch_bytes(aspect, self.subresource_range.mip_levels.start + mip_level)
    }

    /// Returns the number of bytes between two array layers.
    #[inline]
    pub fn layer_pitch_bytes(&self, aspect: ImageAspect) -> DeviceSize {
        self.image.layer_pitch_bytes(aspect)
    }

    /// Returns the number of bytes that shader code may address from the first texel of the
    /// view, for the given aspect.
    #[inline]
    pub fn size_in_bytes(&self, aspect: ImageAspect) -> DeviceSize {
        self.image.size_from_subresource(
            aspect,
            self.subresource_range.mip_levels.start,
            self.subresource_range.array_layers.start,
        )
    }

    /// Returns the number of samples per texel.
    #[inline]
    pub fn samples(&self) -> SampleCount {
        self.image.samples()
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        self.image.device().unregister_image_view(self.id.get());
    }
}

unsafe impl DeviceOwned for ImageView {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        self.image.device()
    }
}

impl_id_counter!(ImageView);

/// Parameters to create a new `ImageView`.
#[derive(Clone, Debug)]
pub struct ImageViewCreateInfo {
    /// The image view type.
    ///
    /// The view type must be compatible with the dimensions of the image and the selected array
    /// layers.
    ///
    /// The default value is [`ImageViewType::Dim2d`].
    pub view_type: ImageViewType,

    /// The format of the view, or `None` to use the format of the image.
    ///
    /// If set, the format must have the same block size as the format of the image.
    ///
    /// The default value is `None`.
    pub format: Option<Format>,

    /// The subresource range of the image that the view covers.
    ///
    /// The default value is empty, which must be overridden.
    pub subresource_range: ImageSubresourceRange,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageViewCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            view_type: ImageViewType::Dim2d,
            format: None,
            subresource_range: ImageSubresourceRange {
                aspects: Default::default(),
                mip_levels: 0..0,
                array_layers: 0..0,
            },
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl ImageViewCreateInfo {
    /// Returns an `ImageViewCreateInfo` with the view type and subresource range derived from
    /// `image`.
    pub fn from_image(image: &Image) -> Self {
        let view_type = match image.image_type() {
            super::ImageType::Dim1d if image.array_layers() == 1 => ImageViewType::Dim1d,
            super::ImageType::Dim1d => ImageViewType::Dim1dArray,
            super::ImageType::Dim2d if image.array_layers() == 1 => ImageViewType::Dim2d,
            super::ImageType::Dim2d => ImageViewType::Dim2dArray,
            super::ImageType::Dim3d => ImageViewType::Dim3d,
        };

        Self {
            view_type,
            subresource_range: ImageSubresourceRange::from_image(image),
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self, image: &Image) -> Result<(), Box<ValidationError>> {
        let &Self {
            view_type,
            format,
            ref subresource_range,
            _ne: _,
        } = self;

        if subresource_range.aspects.is_empty()
            || !image.format().aspects().contains(subresource_range.aspects)
        {
            return Err(Box::new(ValidationError {
                context: "subresource_range.aspects".into(),
                problem: "is empty, or contains aspects that the format of the image does not \
                    have"
                    .into(),
                vuids: &["VUID-VkImageViewCreateInfo-subresourceRange-09594"],
            }));
        }

        if subresource_range.mip_levels.is_empty()
            || subresource_range.mip_levels.end > image.mip_levels()
        {
            return Err(Box::new(ValidationError {
                context: "subresource_range.mip_levels".into(),
                problem: "is empty, or exceeds the mip levels of the image".into(),
                vuids: &["VUID-VkImageViewCreateInfo-subresourceRange-01718"],
            }));
        }

        if subresource_range.array_layers.is_empty()
            || subresource_range.array_layers.end > image.array_layers()
        {
            return Err(Box::new(ValidationError {
                context: "subresource_range.array_layers".into(),
                problem: "is empty, or exceeds the array layers of the image".into(),
                vuids: &["VUID-VkImageViewCreateInfo-image-06724"],
            }));
        }

        if let Some(format) = format {
            let image_format = image.format();

            if format.block_size() != image_format.block_size()
                || format.aspects() != image_format.aspects()
            {
                return Err(Box::new(ValidationError {
                    context: "format".into(),
                    problem: "is not compatible with the format of the image".into(),
                    vuids: &["VUID-VkImageViewCreateInfo-image-01761"],
                }));
            }
        }

        let layer_count = subresource_range.array_layers.len();
        let compatible = match view_type {
            ImageViewType::Dim1d => {
                image.image_type() == super::ImageType::Dim1d && layer_count == 1
            }
            ImageViewType::Dim1dArray => image.image_type() == super::ImageType::Dim1d,
            ImageViewType::Dim2d => {
                image.image_type() == super::ImageType::Dim2d && layer_count == 1
            }
            ImageViewType::Dim2dArray => image.image_type() == super::ImageType::Dim2d,
            ImageViewType::Dim3d => image.image_type() == super::ImageType::Dim3d,
            ImageViewType::Cube => image.cube_compatible() && layer_count == 6,
            ImageViewType::CubeArray => image.cube_compatible() && layer_count % 6 == 0,
        };

        if !compatible {
            return Err(Box::new(ValidationError {
                context: "view_type".into(),
                problem: "is not compatible with the image type or the number of array layers"
                    .into(),
                vuids: &["VUID-VkImageViewCreateInfo-subResourceRange-01021"],
            }));
        }

        Ok(())
    }
}

vulkan_enum! {
    /// The geometry type of an image view.
    ImageViewType
    impl {
        /// Returns whether the type is arrayed.
        #[inline]
        pub fn is_arrayed(self) -> bool {
            match self {
                Self::Dim1d | Self::Dim2d | Self::Dim3d | Self::Cube => false,
                Self::Dim1dArray | Self::Dim2dArray | Self::CubeArray => true,
            }
        }

        /// Returns whether the type is `ImageViewType::Cube` or `ImageViewType::CubeArray`.
        #[inline]
        pub fn is_cube(self) -> bool {
            matches!(self, Self::Cube | Self::CubeArray)
        }
    }
    = ImageViewType(i32);

    Dim1d = TYPE_1D,
    Dim2d = TYPE_2D,
    Dim3d = TYPE_3D,
    Cube = CUBE,
    Dim1dArray = TYPE_1D_ARRAY,
    Dim2dArray = TYPE_2D_ARRAY,
    CubeArray = CUBE_ARRAY,
}

#[cfg(test)]
mod tests {
    use super::{ImageView, ImageViewCreateInfo, ImageViewType};
    use crate::{
        format::Format,
        image::{Image, ImageAspect, ImageCreateInfo, ImageSubresourceRange},
    };

    #[test]
    fn registered_with_device() {
        let device = device!();
        let image = Image::new(
            device.clone(),
            ImageCreateInfo {
                format: Format::R8G8B8A8_UNORM,
                extent: [8, 4, 1],
                mip_levels: 2,
                ..Default::default()
            },
        )
        .unwrap();

        let view = ImageView::new_default(image).unwrap();
        let id = view.id().get();
        let state = device.image_view_state(id).unwrap();
        assert_eq!(state.extent, [8, 4, 1]);
        assert_eq!(state.mip_levels, 2);
        assert_eq!(state.view_type, ImageViewType::Dim2d);

        drop(view);
        assert!(device.image_view_state(id).is_none());
    }

    #[test]
    fn base_relative_addressing() {
        let device = device!();
        let image = Image::new(
            device,
            ImageCreateInfo {
                format: Format::R32_SFLOAT,
                extent: [4, 4, 1],
                mip_levels: 3,
                array_layers: 2,
                ..Default::default()
            },
        )
        .unwrap();

        let view = ImageView::new(
            image.clone(),
            ImageViewCreateInfo {
                view_type: ImageViewType::Dim2d,
                subresource_range: ImageSubresourceRange {
                    aspects: Format::R32_SFLOAT.aspects(),
                    mip_levels: 1..3,
                    array_layers: 1..2,
                },
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(view.mip_level_extent(0), [2, 2, 1]);
        assert_eq!(view.row_pitch_bytes(ImageAspect::Color, 0), 8);
        assert_eq!(
            view.texel_pointer([0, 0, 0], ImageAspect::Color, 0, 0),
            image.texel_pointer([0, 0, 0], ImageAspect::Color, 1, 1),
        );
        // Layer 1 starts at 84 bytes; level 1 of it starts 64 bytes later.
        assert_eq!(view.size_in_bytes(ImageAspect::Color), 2 * 84 - (84 + 64));
    }

    #[test]
    fn cube_requires_six_layers() {
        let device = device!();
        let image = Image::new(
            device,
            ImageCreateInfo {
                format: Format::R8_UNORM,
                extent: [4, 4, 1],
                array_layers: 6,
                cube_compatible: true,
                ..Default::default()
            },
        )
        .unwrap();

        let mut create_info = ImageViewCreateInfo::from_image(&image);
        create_info.view_type = ImageViewType::Cube;
        assert!(ImageView::new(image.clone(), create_info.clone()).is_ok());

        create_info.subresource_range.array_layers = 0..3;
        assert!(ImageView::new(image, create_info).is_err());
    }
}
