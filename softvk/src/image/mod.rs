// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Image storage (1, 2 or 3 dimensions of texels).
//!
//! An image is stored in a single block of host memory. The memory is divided into one plane per
//! aspect (color, or depth followed by stencil). Within a plane, array layers are stored one after
//! the other; within a layer, mip levels are stored one after the other; within a mip level,
//! samples are stored one after the other, each sample being a tightly packed 3D block of texels.
//!
//! Images are accessed by shaders through [image views](view), and sampled with
//! [samplers](sampler).

pub use self::{
    sampler::{Sampler, SamplerCreateInfo},
    view::{ImageView, ImageViewCreateInfo, ImageViewType},
};
use crate::{
    device::{Device, DeviceOwned},
    format::Format,
    macros::vulkan_enum,
    memory::HostMemory,
    DeviceSize, Validated, ValidationError, VulkanError,
};
use std::{
    ops::{BitOr, BitOrAssign, Range},
    sync::Arc,
};

pub mod sampler;
pub mod view;

/// The number of mip levels that a sampled image descriptor can describe.
pub const MIPMAP_LEVELS: usize = 15;

/// A block of texels in host memory, with a format and a number of dimensions.
#[derive(Debug)]
pub struct Image {
    device: Arc<Device>,
    memory: HostMemory,

    image_type: ImageType,
    format: Format,
    extent: [u32; 3],
    mip_levels: u32,
    array_layers: u32,
    samples: SampleCount,
    cube_compatible: bool,
}

impl Image {
    /// Creates a new `Image`, and allocates zeroed memory for it.
    pub fn new(
        device: Arc<Device>,
        create_info: ImageCreateInfo,
    ) -> Result<Arc<Image>, Validated<VulkanError>> {
        create_info
            .validate()
            .map_err(|err| err.add_context("create_info"))?;

        let ImageCreateInfo {
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            cube_compatible,
            _ne: _,
        } = create_info;

        let mut image = Image {
            device,
            memory: HostMemory::new(0)?,
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            cube_compatible,
        };

        let size = image
            .format
            .aspects()
            .iter()
            .map(|aspect| image.aspect_size(aspect))
            .sum();
        image.memory = HostMemory::new(size)?;

        Ok(Arc::new(image))
    }

    /// Returns the type of the image.
    #[inline]
    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    /// Returns the format of the image.
    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the extent of the base mip level.
    #[inline]
    pub fn extent(&self) -> [u32; 3] {
        self.extent
    }

    /// Returns the number of mip levels.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Returns the number of array layers.
    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    /// Returns the number of samples per texel.
    #[inline]
    pub fn samples(&self) -> SampleCount {
        self.samples
    }

    /// Returns whether cube views can be created from the image.
    #[inline]
    pub fn cube_compatible(&self) -> bool {
        self.cube_compatible
    }

    /// Returns the memory that holds the texels of the image.
    #[inline]
    pub fn memory(&self) -> &HostMemory {
        &self.memory
    }

    /// Returns the extent of a mip level.
    #[inline]
    pub fn mip_level_extent(&self, mip_level: u32) -> [u32; 3] {
        self.extent.map(|dim| (dim >> mip_level).max(1))
    }

    /// Returns the number of bytes between two rows of texels of a mip level.
    pub fn row_pitch_bytes(&self, aspect: ImageAspect, mip_level: u32) -> DeviceSize {
        let [width, _, _] = self.mip_level_extent(mip_level);
        width as DeviceSize * self.format.aspect_format(aspect).block_size()
    }

    /// Returns the number of bytes between two depth slices of a mip level.
    pub fn slice_pitch_bytes(&self, aspect: ImageAspect, mip_level: u32) -> DeviceSize {
        let [_, height, _] = self.mip_level_extent(mip_level);
        height as DeviceSize * self.row_pitch_bytes(aspect, mip_level)
    }

    /// Returns the number of bytes between two samples of a texel of a mip level.
    pub fn sample_pitch_bytes(&self, aspect: ImageAspect, mip_level: u32) -> DeviceSize {
        let [_, _, depth] = self.mip_level_extent(mip_level);
        depth as DeviceSize * self.slice_pitch_bytes(aspect, mip_level)
    }

    fn mip_level_size(&self, aspect: ImageAspect, mip_level: u32) -> DeviceSize {
        self.samples as DeviceSize * self.sample_pitch_bytes(aspect, mip_level)
    }

    /// Returns the number of bytes between two array layers.
    pub fn layer_pitch_bytes(&self, aspect: ImageAspect) -> DeviceSize {
        (0..self.mip_levels)
            .map(|mip_level| self.mip_level_size(aspect, mip_level))
            .sum()
    }

    fn aspect_size(&self, aspect: ImageAspect) -> DeviceSize {
        self.array_layers as DeviceSize * self.layer_pitch_bytes(aspect)
    }

    fn aspect_offset(&self, aspect: ImageAspect) -> DeviceSize {
        self.format
            .aspects()
            .iter()
            .take_while(|&other| other != aspect)
            .map(|other| self.aspect_size(other))
            .sum()
    }

    /// Returns the offset in bytes of the first texel of a subresource.
    pub fn subresource_offset(
        &self,
        aspect: ImageAspect,
        mip_level: u32,
        array_layer: u32,
    ) -> DeviceSize {
        assert!(mip_level < self.mip_levels);
        assert!(array_layer < self.array_layers);

        self.aspect_offset(aspect)
            + array_layer as DeviceSize * self.layer_pitch_bytes(aspect)
            + (0..mip_level)
                .map(|level| self.mip_level_size(aspect, level))
                .sum::<DeviceSize>()
    }

    /// Returns the offset in bytes of a texel.
    pub fn texel_offset(
        &self,
        offset: [u32; 3],
        aspect: ImageAspect,
        mip_level: u32,
        array_layer: u32,
    ) -> DeviceSize {
        let [x, y, z] = offset.map(DeviceSize::from);

        self.subresource_offset(aspect, mip_level, array_layer)
            + z * self.slice_pitch_bytes(aspect, mip_level)
            + y * self.row_pitch_bytes(aspect, mip_level)
            + x * self.format.aspect_format(aspect).block_size()
    }

    /// Returns a pointer to a texel.
    #[inline]
    pub fn texel_pointer(
        &self,
        offset: [u32; 3],
        aspect: ImageAspect,
        mip_level: u32,
        array_layer: u32,
    ) -> *mut u8 {
        let offset = self.texel_offset(offset, aspect, mip_level, array_layer);
        debug_assert!(offset <= self.memory.size() as DeviceSize);

        // SAFETY: The offset is within the allocation.
        unsafe { self.memory.as_ptr().add(offset as usize) }
    }

    /// Returns the number of bytes from the first texel of a subresource to the end of the
    /// memory plane of its aspect.
    pub fn size_from_subresource(
        &self,
        aspect: ImageAspect,
        mip_level: u32,
        array_layer: u32,
    ) -> DeviceSize {
        self.aspect_offset(aspect) + self.aspect_size(aspect)
            - self.subresource_offset(aspect, mip_level, array_layer)
    }
}

unsafe impl DeviceOwned for Image {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

/// Parameters to create a new `Image`.
#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    /// The number of dimensions of the image.
    ///
    /// The default value is [`ImageType::Dim2d`].
    pub image_type: ImageType,

    /// The format of the texels.
    ///
    /// The default value is `Format::UNDEFINED`, which must be overridden.
    pub format: Format,

    /// The width, height and depth of the base mip level.
    ///
    /// The default value is `[0; 3]`, which must be overridden.
    pub extent: [u32; 3],

    /// The number of mip levels.
    ///
    /// The default value is `1`.
    pub mip_levels: u32,

    /// The number of array layers.
    ///
    /// The default value is `1`.
    pub array_layers: u32,

    /// The number of samples per texel.
    ///
    /// The default value is [`SampleCount::Sample1`].
    pub samples: SampleCount,

    /// Whether cube image views can be created from the image.
    ///
    /// The default value is `false`.
    pub cube_compatible: bool,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            image_type: ImageType::Dim2d,
            format: Format::UNDEFINED,
            extent: [0; 3],
            mip_levels: 1,
            array_layers: 1,
            samples: SampleCount::Sample1,
            cube_compatible: false,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl ImageCreateInfo {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            image_type,
            format,
            extent,
            mip_levels,
            array_layers,
            samples,
            cube_compatible,
            _ne: _,
        } = self;

        if format == Format::UNDEFINED {
            return Err(Box::new(ValidationError {
                context: "format".into(),
                problem: "is `Format::UNDEFINED`".into(),
                vuids: &["VUID-VkImageCreateInfo-format-00943"],
            }));
        }

        if extent.contains(&0) {
            return Err(Box::new(ValidationError {
                context: "extent".into(),
                problem: "one or more elements are zero".into(),
                vuids: &[
                    "VUID-VkImageCreateInfo-extent-00944",
                    "VUID-VkImageCreateInfo-extent-00945",
                    "VUID-VkImageCreateInfo-extent-00946",
                ],
            }));
        }

        match image_type {
            ImageType::Dim1d if extent[1] != 1 || extent[2] != 1 => {
                return Err(Box::new(ValidationError {
                    problem: "`image_type` is `ImageType::Dim1d`, but `extent[1]` or `extent[2]` \
                        is not 1"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-imageType-00956"],
                    ..Default::default()
                }));
            }
            ImageType::Dim2d if extent[2] != 1 => {
                return Err(Box::new(ValidationError {
                    problem: "`image_type` is `ImageType::Dim2d`, but `extent[2]` is not 1"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-imageType-00957"],
                    ..Default::default()
                }));
            }
            ImageType::Dim3d if array_layers != 1 => {
                return Err(Box::new(ValidationError {
                    problem: "`image_type` is `ImageType::Dim3d`, but `array_layers` is not 1"
                        .into(),
                    vuids: &["VUID-VkImageCreateInfo-imageType-00961"],
                    ..Default::default()
                }));
            }
            _ => (),
        }

        let max_mip_levels = max_mip_levels(extent).min(MIPMAP_LEVELS as u32);

        if mip_levels == 0 || mip_levels > max_mip_levels {
            return Err(Box::new(ValidationError {
                context: "mip_levels".into(),
                problem: format!("is not between 1 and {}", max_mip_levels).into(),
                vuids: &[
                    "VUID-VkImageCreateInfo-mipLevels-00947",
                    "VUID-VkImageCreateInfo-mipLevels-00958",
                ],
            }));
        }

        if array_layers == 0 {
            return Err(Box::new(ValidationError {
                context: "array_layers".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkImageCreateInfo-arrayLayers-00948"],
            }));
        }

        if samples != SampleCount::Sample1 && (image_type != ImageType::Dim2d || mip_levels != 1)
        {
            return Err(Box::new(ValidationError {
                problem: "`samples` is not `SampleCount::Sample1`, but `image_type` is not \
                    `ImageType::Dim2d` or `mip_levels` is not 1"
                    .into(),
                vuids: &["VUID-VkImageCreateInfo-samples-02257"],
                ..Default::default()
            }));
        }

        if cube_compatible
            && (image_type != ImageType::Dim2d || extent[0] != extent[1] || array_layers < 6)
        {
            return Err(Box::new(ValidationError {
                problem: "`cube_compatible` is set, but `image_type` is not `ImageType::Dim2d`, \
                    `extent[0]` does not equal `extent[1]`, or `array_layers` is less than 6"
                    .into(),
                vuids: &[
                    "VUID-VkImageCreateInfo-flags-00949",
                    "VUID-VkImageCreateInfo-imageType-00954",
                ],
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// Returns the maximum number of mip levels for the given extent.
#[inline]
pub fn max_mip_levels(extent: [u32; 3]) -> u32 {
    // This calculates `floor(log2(max(width, height, depth))) + 1` using fast integer operations.
    32 - (extent[0] | extent[1] | extent[2]).leading_zeros()
}

vulkan_enum! {
    /// The basic dimensionality of an image.
    ImageType = ImageType(i32);

    Dim1d = TYPE_1D,
    Dim2d = TYPE_2D,
    Dim3d = TYPE_3D,
}

vulkan_enum! {
    /// The number of samples per texel of an image.
    SampleCount = SampleCountFlags(u32);

    /// 1 sample per texel.
    Sample1 = TYPE_1,

    /// 2 samples per texel.
    Sample2 = TYPE_2,

    /// 4 samples per texel.
    Sample4 = TYPE_4,

    /// 8 samples per texel.
    Sample8 = TYPE_8,

    /// 16 samples per texel.
    Sample16 = TYPE_16,

    /// 32 samples per texel.
    Sample32 = TYPE_32,

    /// 64 samples per texel.
    Sample64 = TYPE_64,
}

vulkan_enum! {
    /// An individual data type within an image.
    ImageAspect = ImageAspectFlags(u32);

    /// The single aspect of images with a color format.
    Color = COLOR,

    /// The depth component of an image with a depth/stencil format.
    Depth = DEPTH,

    /// The stencil component of an image with a depth/stencil format.
    Stencil = STENCIL,
}

/// A set of [`ImageAspect`] values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImageAspects(u32);

impl ImageAspects {
    pub const COLOR: Self = Self(ImageAspect::Color as u32);
    pub const DEPTH: Self = Self(ImageAspect::Depth as u32);
    pub const STENCIL: Self = Self(ImageAspect::Stencil as u32);

    /// Returns an empty set.
    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns whether no aspects are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns whether all aspects in `other` are also in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether any aspect in `other` is also in `self`.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns the aspects in `self`, in the order in which their planes are stored.
    pub fn iter(self) -> impl Iterator<Item = ImageAspect> {
        [ImageAspect::Color, ImageAspect::Depth, ImageAspect::Stencil]
            .into_iter()
            .filter(move |&aspect| self.contains(aspect.into()))
    }
}

impl From<ImageAspect> for ImageAspects {
    #[inline]
    fn from(aspect: ImageAspect) -> Self {
        Self(aspect as u32)
    }
}

impl BitOr for ImageAspects {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ImageAspects {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Describes a range of subresources of an image.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageSubresourceRange {
    /// The aspects that are included in the range.
    pub aspects: ImageAspects,

    /// The range of mip levels that are included.
    pub mip_levels: Range<u32>,

    /// The range of array layers that are included.
    pub array_layers: Range<u32>,
}

impl ImageSubresourceRange {
    /// Returns a range that covers the whole of `image`.
    #[inline]
    pub fn from_image(image: &Image) -> Self {
        Self {
            aspects: image.format().aspects(),
            mip_levels: 0..image.mip_levels(),
            array_layers: 0..image.array_layers(),
        }
    }
}
