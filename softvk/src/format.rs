// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The formats that images and texel buffers can have.
//!
//! A format describes the texel data of an image: how many bytes one texel occupies, which
//! components are present and how many bits each of them has, and how the stored bits are
//! converted to the values seen by shader code.
//!
//! The values of [`Format`] are identical to those of the Vulkan `VkFormat` enumeration, so a
//! format can be converted to and from [`ash::vk::Format`] without a lookup.
//!
//! # Depth/stencil formats
//!
//! Depth/stencil formats can be identified by the `D` and `S` components in their names. The two
//! components are represented as separate *aspects*, which are stored as separate planes of
//! memory. Each aspect behaves like an image of its own format, which can be queried with
//! [`Format::aspect_format`].

use crate::{
    image::{ImageAspect, ImageAspects},
    shader::spirv::ImageFormat,
    DeviceSize,
};

macro_rules! formats {
    (@numeric) => { None };
    (@numeric $ty:ident) => { Some(NumericType::$ty) };

    {
        $(
            $(#[doc = $doc:literal])*
            $name:ident {
                block_size: $block_size:literal,
                components: [$($component:literal),+]
                $(, color: $color:ident)?
                $(, depth: $depth:ident)?
                $(, stencil: $stencil:ident)?
                $(,)?
            },
        )+
    } => {
        /// An enumeration of all the texel formats known to the implementation.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        #[non_exhaustive]
        #[repr(i32)]
        pub enum Format {
            $(
                $(#[doc = $doc])*
                $name = ash::vk::Format::$name.as_raw(),
            )+
        }

        impl Format {
            /// Returns the number of bytes that one texel occupies in memory.
            ///
            /// For depth/stencil formats, this is the sum of the sizes of both aspects. Use
            /// [`aspect_format`](Self::aspect_format) to get the size of one plane.
            #[inline]
            pub fn block_size(self) -> DeviceSize {
                match self {
                    $(Self::$name => $block_size,)+
                }
            }

            /// Returns the number of bits per texel of each component, in the order R, G, B, A.
            /// For depth/stencil formats, the order is depth, stencil.
            ///
            /// Components that are absent have zero bits.
            #[inline]
            pub fn components(self) -> [u8; 4] {
                match self {
                    $(Self::$name => [$($component),+],)+
                }
            }

            /// Returns the numeric type of the color components, if any.
            #[inline]
            pub fn numeric_format_color(self) -> Option<NumericType> {
                match self {
                    $(Self::$name => formats!(@numeric $($color)?),)+
                }
            }

            /// Returns the numeric type of the depth component, if any.
            #[inline]
            pub fn numeric_format_depth(self) -> Option<NumericType> {
                match self {
                    $(Self::$name => formats!(@numeric $($depth)?),)+
                }
            }

            /// Returns the numeric type of the stencil component, if any.
            #[inline]
            pub fn numeric_format_stencil(self) -> Option<NumericType> {
                match self {
                    $(Self::$name => formats!(@numeric $($stencil)?),)+
                }
            }
        }

        impl TryFrom<ash::vk::Format> for Format {
            type Error = ();

            #[inline]
            fn try_from(val: ash::vk::Format) -> Result<Format, ()> {
                Ok(match val {
                    $(ash::vk::Format::$name => Self::$name,)+
                    _ => return Err(()),
                })
            }
        }
    };
}

formats! {
    UNDEFINED { block_size: 0, components: [0, 0, 0, 0] },

    R4G4B4A4_UNORM_PACK16 { block_size: 2, components: [4, 4, 4, 4], color: UNORM },
    B4G4R4A4_UNORM_PACK16 { block_size: 2, components: [4, 4, 4, 4], color: UNORM },
    A4R4G4B4_UNORM_PACK16 { block_size: 2, components: [4, 4, 4, 4], color: UNORM },
    A4B4G4R4_UNORM_PACK16 { block_size: 2, components: [4, 4, 4, 4], color: UNORM },
    R5G6B5_UNORM_PACK16 { block_size: 2, components: [5, 6, 5, 0], color: UNORM },
    B5G6R5_UNORM_PACK16 { block_size: 2, components: [5, 6, 5, 0], color: UNORM },
    R5G5B5A1_UNORM_PACK16 { block_size: 2, components: [5, 5, 5, 1], color: UNORM },
    B5G5R5A1_UNORM_PACK16 { block_size: 2, components: [5, 5, 5, 1], color: UNORM },
    A1R5G5B5_UNORM_PACK16 { block_size: 2, components: [5, 5, 5, 1], color: UNORM },

    R8_UNORM { block_size: 1, components: [8, 0, 0, 0], color: UNORM },
    R8_SNORM { block_size: 1, components: [8, 0, 0, 0], color: SNORM },
    R8_UINT { block_size: 1, components: [8, 0, 0, 0], color: UINT },
    R8_SINT { block_size: 1, components: [8, 0, 0, 0], color: SINT },
    R8_SRGB { block_size: 1, components: [8, 0, 0, 0], color: SRGB },
    R8G8_UNORM { block_size: 2, components: [8, 8, 0, 0], color: UNORM },
    R8G8_SNORM { block_size: 2, components: [8, 8, 0, 0], color: SNORM },
    R8G8_UINT { block_size: 2, components: [8, 8, 0, 0], color: UINT },
    R8G8_SINT { block_size: 2, components: [8, 8, 0, 0], color: SINT },
    R8G8B8A8_UNORM { block_size: 4, components: [8, 8, 8, 8], color: UNORM },
    R8G8B8A8_SNORM { block_size: 4, components: [8, 8, 8, 8], color: SNORM },
    R8G8B8A8_UINT { block_size: 4, components: [8, 8, 8, 8], color: UINT },
    R8G8B8A8_SINT { block_size: 4, components: [8, 8, 8, 8], color: SINT },
    R8G8B8A8_SRGB { block_size: 4, components: [8, 8, 8, 8], color: SRGB },
    B8G8R8A8_UNORM { block_size: 4, components: [8, 8, 8, 8], color: UNORM },
    B8G8R8A8_SRGB { block_size: 4, components: [8, 8, 8, 8], color: SRGB },
    A8B8G8R8_UNORM_PACK32 { block_size: 4, components: [8, 8, 8, 8], color: UNORM },
    A8B8G8R8_SNORM_PACK32 { block_size: 4, components: [8, 8, 8, 8], color: SNORM },
    A8B8G8R8_UINT_PACK32 { block_size: 4, components: [8, 8, 8, 8], color: UINT },
    A8B8G8R8_SINT_PACK32 { block_size: 4, components: [8, 8, 8, 8], color: SINT },
    A8B8G8R8_SRGB_PACK32 { block_size: 4, components: [8, 8, 8, 8], color: SRGB },

    A2R10G10B10_UNORM_PACK32 { block_size: 4, components: [10, 10, 10, 2], color: UNORM },
    A2R10G10B10_UINT_PACK32 { block_size: 4, components: [10, 10, 10, 2], color: UINT },
    A2B10G10R10_UNORM_PACK32 { block_size: 4, components: [10, 10, 10, 2], color: UNORM },
    A2B10G10R10_UINT_PACK32 { block_size: 4, components: [10, 10, 10, 2], color: UINT },

    R16_UNORM { block_size: 2, components: [16, 0, 0, 0], color: UNORM },
    R16_SNORM { block_size: 2, components: [16, 0, 0, 0], color: SNORM },
    R16_UINT { block_size: 2, components: [16, 0, 0, 0], color: UINT },
    R16_SINT { block_size: 2, components: [16, 0, 0, 0], color: SINT },
    R16_SFLOAT { block_size: 2, components: [16, 0, 0, 0], color: SFLOAT },
    R16G16_UNORM { block_size: 4, components: [16, 16, 0, 0], color: UNORM },
    R16G16_SNORM { block_size: 4, components: [16, 16, 0, 0], color: SNORM },
    R16G16_UINT { block_size: 4, components: [16, 16, 0, 0], color: UINT },
    R16G16_SINT { block_size: 4, components: [16, 16, 0, 0], color: SINT },
    R16G16_SFLOAT { block_size: 4, components: [16, 16, 0, 0], color: SFLOAT },
    R16G16B16A16_UNORM { block_size: 8, components: [16, 16, 16, 16], color: UNORM },
    R16G16B16A16_SNORM { block_size: 8, components: [16, 16, 16, 16], color: SNORM },
    R16G16B16A16_UINT { block_size: 8, components: [16, 16, 16, 16], color: UINT },
    R16G16B16A16_SINT { block_size: 8, components: [16, 16, 16, 16], color: SINT },
    R16G16B16A16_SFLOAT { block_size: 8, components: [16, 16, 16, 16], color: SFLOAT },

    R32_UINT { block_size: 4, components: [32, 0, 0, 0], color: UINT },
    R32_SINT { block_size: 4, components: [32, 0, 0, 0], color: SINT },
    R32_SFLOAT { block_size: 4, components: [32, 0, 0, 0], color: SFLOAT },
    R32G32_UINT { block_size: 8, components: [32, 32, 0, 0], color: UINT },
    R32G32_SINT { block_size: 8, components: [32, 32, 0, 0], color: SINT },
    R32G32_SFLOAT { block_size: 8, components: [32, 32, 0, 0], color: SFLOAT },
    R32G32B32A32_UINT { block_size: 16, components: [32, 32, 32, 32], color: UINT },
    R32G32B32A32_SINT { block_size: 16, components: [32, 32, 32, 32], color: SINT },
    R32G32B32A32_SFLOAT { block_size: 16, components: [32, 32, 32, 32], color: SFLOAT },

    R64_UINT { block_size: 8, components: [64, 0, 0, 0], color: UINT },
    R64_SINT { block_size: 8, components: [64, 0, 0, 0], color: SINT },

    B10G11R11_UFLOAT_PACK32 { block_size: 4, components: [11, 11, 10, 0], color: UFLOAT },
    E5B9G9R9_UFLOAT_PACK32 { block_size: 4, components: [9, 9, 9, 0], color: UFLOAT },

    D16_UNORM { block_size: 2, components: [16, 0, 0, 0], depth: UNORM },
    X8_D24_UNORM_PACK32 { block_size: 4, components: [24, 0, 0, 0], depth: UNORM },
    D32_SFLOAT { block_size: 4, components: [32, 0, 0, 0], depth: SFLOAT },
    S8_UINT { block_size: 1, components: [0, 8, 0, 0], stencil: UINT },
    D24_UNORM_S8_UINT { block_size: 4, components: [24, 8, 0, 0], depth: UNORM, stencil: UINT },
    D32_SFLOAT_S8_UINT { block_size: 5, components: [32, 8, 0, 0], depth: SFLOAT, stencil: UINT },
}

impl Format {
    /// Returns the aspects that images of this format have.
    #[inline]
    pub fn aspects(self) -> ImageAspects {
        let mut aspects = ImageAspects::empty();

        if self.numeric_format_color().is_some() {
            aspects |= ImageAspects::COLOR;
        }

        if self.numeric_format_depth().is_some() {
            aspects |= ImageAspects::DEPTH;
        }

        if self.numeric_format_stencil().is_some() {
            aspects |= ImageAspects::STENCIL;
        }

        aspects
    }

    /// Returns the format of a single aspect of this format, as it is stored in its own plane of
    /// memory.
    ///
    /// # Panics
    ///
    /// - Panics if the format does not have `aspect`.
    pub fn aspect_format(self, aspect: ImageAspect) -> Format {
        match (self, aspect) {
            (Format::D24_UNORM_S8_UINT, ImageAspect::Depth) => Format::X8_D24_UNORM_PACK32,
            (Format::D32_SFLOAT_S8_UINT, ImageAspect::Depth) => Format::D32_SFLOAT,
            (Format::D24_UNORM_S8_UINT | Format::D32_SFLOAT_S8_UINT, ImageAspect::Stencil) => {
                Format::S8_UINT
            }
            (format, aspect) => {
                assert!(
                    format.aspects().contains(aspect.into()),
                    "format {:?} has no {:?} aspect",
                    format,
                    aspect,
                );

                format
            }
        }
    }

    /// Returns whether the color components are stored with sRGB encoding.
    #[inline]
    pub fn is_srgb(self) -> bool {
        self.numeric_format_color() == Some(NumericType::SRGB)
    }

    /// Returns whether the texels of this format are read as floating-point values by the
    /// sampler, as opposed to normalized or integer values.
    #[inline]
    pub fn is_float_format(self) -> bool {
        matches!(
            self.numeric_format_color().or(self.numeric_format_depth()),
            Some(NumericType::SFLOAT | NumericType::UFLOAT)
        )
    }

    /// Returns whether shader code sees the components of this format as integers.
    #[inline]
    pub fn is_integer(self) -> bool {
        matches!(
            self.numeric_format_color().or(self.numeric_format_stencil()),
            Some(NumericType::UINT | NumericType::SINT)
        ) && self.numeric_format_depth().is_none()
    }
}

impl From<Format> for ash::vk::Format {
    #[inline]
    fn from(val: Format) -> Self {
        ash::vk::Format::from_raw(val as i32)
    }
}

// https://registry.khronos.org/vulkan/specs/1.3-extensions/html/chap50.html#spirvenv-image-formats
impl From<ImageFormat> for Option<Format> {
    fn from(val: ImageFormat) -> Self {
        match val {
            ImageFormat::Unknown => None,
            ImageFormat::Rgba32f => Some(Format::R32G32B32A32_SFLOAT),
            ImageFormat::Rgba16f => Some(Format::R16G16B16A16_SFLOAT),
            ImageFormat::R32f => Some(Format::R32_SFLOAT),
            ImageFormat::Rgba8 => Some(Format::R8G8B8A8_UNORM),
            ImageFormat::Rgba8Snorm => Some(Format::R8G8B8A8_SNORM),
            ImageFormat::Rg32f => Some(Format::R32G32_SFLOAT),
            ImageFormat::Rg16f => Some(Format::R16G16_SFLOAT),
            ImageFormat::R11fG11fB10f => Some(Format::B10G11R11_UFLOAT_PACK32),
            ImageFormat::R16f => Some(Format::R16_SFLOAT),
            ImageFormat::Rgba16 => Some(Format::R16G16B16A16_UNORM),
            ImageFormat::Rgb10A2 => Some(Format::A2B10G10R10_UNORM_PACK32),
            ImageFormat::Rg16 => Some(Format::R16G16_UNORM),
            ImageFormat::Rg8 => Some(Format::R8G8_UNORM),
            ImageFormat::R16 => Some(Format::R16_UNORM),
            ImageFormat::R8 => Some(Format::R8_UNORM),
            ImageFormat::Rgba16Snorm => Some(Format::R16G16B16A16_SNORM),
            ImageFormat::Rg16Snorm => Some(Format::R16G16_SNORM),
            ImageFormat::Rg8Snorm => Some(Format::R8G8_SNORM),
            ImageFormat::R16Snorm => Some(Format::R16_SNORM),
            ImageFormat::R8Snorm => Some(Format::R8_SNORM),
            ImageFormat::Rgba32i => Some(Format::R32G32B32A32_SINT),
            ImageFormat::Rgba16i => Some(Format::R16G16B16A16_SINT),
            ImageFormat::Rgba8i => Some(Format::R8G8B8A8_SINT),
            ImageFormat::R32i => Some(Format::R32_SINT),
            ImageFormat::Rg32i => Some(Format::R32G32_SINT),
            ImageFormat::Rg16i => Some(Format::R16G16_SINT),
            ImageFormat::Rg8i => Some(Format::R8G8_SINT),
            ImageFormat::R16i => Some(Format::R16_SINT),
            ImageFormat::R8i => Some(Format::R8_SINT),
            ImageFormat::Rgba32ui => Some(Format::R32G32B32A32_UINT),
            ImageFormat::Rgba16ui => Some(Format::R16G16B16A16_UINT),
            ImageFormat::Rgba8ui => Some(Format::R8G8B8A8_UINT),
            ImageFormat::R32ui => Some(Format::R32_UINT),
            ImageFormat::Rgb10a2ui => Some(Format::A2B10G10R10_UINT_PACK32),
            ImageFormat::Rg32ui => Some(Format::R32G32_UINT),
            ImageFormat::Rg16ui => Some(Format::R16G16_UINT),
            ImageFormat::Rg8ui => Some(Format::R8G8_UINT),
            ImageFormat::R16ui => Some(Format::R16_UINT),
            ImageFormat::R8ui => Some(Format::R8_UINT),
            ImageFormat::R64ui => Some(Format::R64_UINT),
            ImageFormat::R64i => Some(Format::R64_SINT),
        }
    }
}

/// The numeric type that represents data of a format in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum NumericType {
    /// Signed floating-point number.
    SFLOAT,
    /// Unsigned floating-point number.
    UFLOAT,
    /// Signed integer.
    SINT,
    /// Unsigned integer.
    UINT,
    /// Signed integer that represents a normalized floating-point value in the range \[-1,1].
    SNORM,
    /// Unsigned integer that represents a normalized floating-point value in the range \[0,1].
    UNORM,
    /// Unsigned integer where R, G, B components represent a normalized floating-point value in the
    /// sRGB color space, while the A component is a simple normalized value as in `UNORM`.
    SRGB,
}
