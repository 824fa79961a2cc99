// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! How to retrieve data from a sampled image within a shader.
//!
//! A sampler only carries parameters. Filtering itself is done by the sampling routines that the
//! device builds for each combination of instruction, sampler and image view.

use crate::{
    device::{Device, DeviceOwned, SamplerState},
    macros::{impl_id_counter, vulkan_enum},
    ValidationError,
};
use std::{num::NonZero, sync::Arc};

/// The highest level of detail that a sampled image descriptor can select.
pub const MAX_TEXTURE_LOD: u32 = 13;

/// Describes how to retrieve data from a sampled image within a shader.
#[derive(Debug)]
pub struct Sampler {
    device: Arc<Device>,
    id: NonZero<u32>,

    mag_filter: Filter,
    min_filter: Filter,
    mipmap_mode: SamplerMipmapMode,
    address_mode: [SamplerAddressMode; 3],
    mip_lod_bias: f32,
    compare: Option<CompareOp>,
    lod: (f32, f32),
    unnormalized_coordinates: bool,
}

impl Sampler {
    /// Creates a new `Sampler`.
    pub fn new(
        device: Arc<Device>,
        create_info: SamplerCreateInfo,
    ) -> Result<Arc<Sampler>, Box<ValidationError>> {
        create_info
            .validate()
            .map_err(|err| err.add_context("create_info"))?;

        let SamplerCreateInfo {
            mag_filter,
            min_filter,
            mipmap_mode,
            address_mode,
            mip_lod_bias,
            compare,
            min_lod,
            max_lod,
            unnormalized_coordinates,
            _ne: _,
        } = create_info;

        let sampler = Sampler {
            device,
            id: Self::next_id(),
            mag_filter,
            min_filter,
            mipmap_mode,
            address_mode,
            mip_lod_bias,
            compare,
            lod: (min_lod, max_lod),
            unnormalized_coordinates,
        };

        sampler
            .device
            .register_sampler(sampler.id.get(), sampler.state());

        Ok(Arc::new(sampler))
    }

    pub(crate) fn state(&self) -> SamplerState {
        SamplerState {
            mag_filter: self.mag_filter,
            min_filter: self.min_filter,
            mipmap_mode: self.mipmap_mode,
            address_mode: self.address_mode,
            mip_lod_bias: self.mip_lod_bias,
            compare: self.compare,
            min_lod: self.lod.0,
            max_lod: self.lod.1,
            unnormalized_coordinates: self.unnormalized_coordinates,
        }
    }

    /// Returns the magnification filter.
    #[inline]
    pub fn mag_filter(&self) -> Filter {
        self.mag_filter
    }

    /// Returns the minification filter.
    #[inline]
    pub fn min_filter(&self) -> Filter {
        self.min_filter
    }

    /// Returns the mipmap mode.
    #[inline]
    pub fn mipmap_mode(&self) -> SamplerMipmapMode {
        self.mipmap_mode
    }

    /// Returns the address modes for the u, v and w coordinates.
    #[inline]
    pub fn address_mode(&self) -> [SamplerAddressMode; 3] {
        self.address_mode
    }

    /// Returns the bias added to the computed level of detail.
    #[inline]
    pub fn mip_lod_bias(&self) -> f32 {
        self.mip_lod_bias
    }

    /// Returns the comparison operation used for depth comparisons, if any.
    #[inline]
    pub fn compare(&self) -> Option<CompareOp> {
        self.compare
    }

    /// Returns the lowest level of detail that can be selected.
    #[inline]
    pub fn min_lod(&self) -> f32 {
        self.lod.0
    }

    /// Returns the highest level of detail that can be selected.
    #[inline]
    pub fn max_lod(&self) -> f32 {
        self.lod.1
    }

    /// Returns whether texel coordinates are unnormalized.
    #[inline]
    pub fn unnormalized_coordinates(&self) -> bool {
        self.unnormalized_coordinates
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.device.unregister_sampler(self.id.get());
    }
}

unsafe impl DeviceOwned for Sampler {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl_id_counter!(Sampler);

/// Parameters to create a new `Sampler`.
#[derive(Clone, Debug)]
pub struct SamplerCreateInfo {
    /// How the sampled value of a single mipmap should be calculated when magnification is
    /// applied (LOD <= 0.0).
    ///
    /// The default value is [`Filter::Nearest`].
    pub mag_filter: Filter,

    /// How the sampled value of a single mipmap should be calculated when minification is
    /// applied (LOD > 0.0).
    ///
    /// The default value is [`Filter::Nearest`].
    pub min_filter: Filter,

    /// How the final sampled value should be calculated from the samples of individual mipmaps.
    ///
    /// The default value is [`SamplerMipmapMode::Nearest`].
    pub mipmap_mode: SamplerMipmapMode,

    /// How out-of-range texture coordinates should be treated, for the `u`, `v` and `w`
    /// texture coordinate indices respectively.
    ///
    /// The default value is [`SamplerAddressMode::ClampToEdge`].
    pub address_mode: [SamplerAddressMode; 3],

    /// The bias value to be added to the base LOD before clamping.
    ///
    /// The default value is `0.0`.
    pub mip_lod_bias: f32,

    /// Sets a comparison operator to apply when sampling depth images.
    ///
    /// The default value is `None`.
    pub compare: Option<CompareOp>,

    /// The lowest LOD value that can be selected.
    ///
    /// The default value is `0.0`.
    pub min_lod: f32,

    /// The highest LOD value that can be selected. Values above [`MAX_TEXTURE_LOD`] are clamped
    /// when the sampler is written to a descriptor set.
    ///
    /// The default value is `1000.0`.
    pub max_lod: f32,

    /// Whether texture coordinates are in texel units rather than in the `0.0..=1.0` range.
    ///
    /// The default value is `false`.
    pub unnormalized_coordinates: bool,

    pub _ne: crate::NonExhaustive,
}

impl Default for SamplerCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            mipmap_mode: SamplerMipmapMode::Nearest,
            address_mode: [SamplerAddressMode::ClampToEdge; 3],
            mip_lod_bias: 0.0,
            compare: None,
            min_lod: 0.0,
            max_lod: 1000.0,
            unnormalized_coordinates: false,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl SamplerCreateInfo {
    /// Shortcut for creating a sampler with linear sampling, linear mipmaps, and with the repeat
    /// mode for borders.
    #[inline]
    pub fn simple_repeat_linear() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: SamplerMipmapMode::Linear,
            address_mode: [SamplerAddressMode::Repeat; 3],
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            mag_filter,
            min_filter,
            mipmap_mode,
            mip_lod_bias,
            min_lod,
            max_lod,
            unnormalized_coordinates,
            ..
        } = self;

        if min_lod.is_nan() || max_lod.is_nan() || mip_lod_bias.is_nan() {
            return Err(Box::new(ValidationError {
                problem: "`min_lod`, `max_lod` or `mip_lod_bias` is NaN".into(),
                ..Default::default()
            }));
        }

        if max_lod < min_lod {
            return Err(Box::new(ValidationError {
                problem: "`max_lod` is less than `min_lod`".into(),
                vuids: &["VUID-VkSamplerCreateInfo-maxLod-01973"],
                ..Default::default()
            }));
        }

        if unnormalized_coordinates {
            if min_filter != mag_filter {
                return Err(Box::new(ValidationError {
                    problem: "`unnormalized_coordinates` is `true`, but `min_filter` and \
                        `mag_filter` are not equal"
                        .into(),
                    vuids: &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01072"],
                    ..Default::default()
                }));
            }

            if mipmap_mode != SamplerMipmapMode::Nearest {
                return Err(Box::new(ValidationError {
                    problem: "`unnormalized_coordinates` is `true`, but `mipmap_mode` is not \
                        `SamplerMipmapMode::Nearest`"
                        .into(),
                    vuids: &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01073"],
                    ..Default::default()
                }));
            }

            if min_lod != 0.0 || max_lod != 0.0 {
                return Err(Box::new(ValidationError {
                    problem: "`unnormalized_coordinates` is `true`, but `min_lod` and `max_lod` \
                        are not both zero"
                        .into(),
                    vuids: &["VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01074"],
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

vulkan_enum! {
    /// Describes how the color of each pixel should be determined.
    Filter = Filter(i32);

    /// The pixel whose center is nearest to the requested coordinates is taken from the source
    /// and its value is returned as-is.
    Nearest = NEAREST,

    /// The 8/4/2 pixels (depending on view dimensionality) whose center surround the requested
    /// coordinates are taken, then their values are combined according to the chosen
    /// `reduction_mode`.
    Linear = LINEAR,
}

vulkan_enum! {
    /// Describes which mipmap from the source to use.
    SamplerMipmapMode = SamplerMipmapMode(i32);

    /// Use the mipmap whose dimensions are the nearest to the dimensions of the destination.
    Nearest = NEAREST,

    /// Take the mipmap whose dimensions are no greater than that of the destination together
    /// with the next higher level mipmap, calculate the value for both, and interpolate them.
    Linear = LINEAR,
}

vulkan_enum! {
    /// How the sampler should behave when it needs to access a pixel that is out of range of the
    /// texture.
    SamplerAddressMode = SamplerAddressMode(i32);

    /// Repeat the texture.
    Repeat = REPEAT,

    /// Repeat the texture but mirror it at every repetition.
    MirroredRepeat = MIRRORED_REPEAT,

    /// The coordinates are clamped to the valid range.
    ClampToEdge = CLAMP_TO_EDGE,

    /// Any texture coordinate that is not in the valid range is placed on the border color.
    ClampToBorder = CLAMP_TO_BORDER,

    /// Just like `MirroredRepeat`, except that it only repeats once.
    MirrorClampToEdge = MIRROR_CLAMP_TO_EDGE,
}

vulkan_enum! {
    /// Specifies how two values should be compared to decide whether a test passes or fails.
    CompareOp = CompareOp(i32);

    /// The test never passes.
    Never = NEVER,

    /// The test passes if `value < reference_value`.
    Less = LESS,

    /// The test passes if `value == reference_value`.
    Equal = EQUAL,

    /// The test passes if `value <= reference_value`.
    LessOrEqual = LESS_OR_EQUAL,

    /// The test passes if `value > reference_value`.
    Greater = GREATER,

    /// The test passes if `value != reference_value`.
    NotEqual = NOT_EQUAL,

    /// The test passes if `value >= reference_value`.
    GreaterOrEqual = GREATER_OR_EQUAL,

    /// The test always passes.
    Always = ALWAYS,
}
