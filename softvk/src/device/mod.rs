// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The object that every other object is created from.
//!
//! A `Device` holds the state that is shared by all shader routines:
//!
//! - Whether image accesses are robust. With robust image access, an out-of-bounds texel
//!   coordinate on any axis makes the access read zero and drop writes. Without it, only accesses
//!   that fall outside of the memory of the image are affected.
//! - The registry of live samplers and image views, by identifier. Sampling routines are
//!   specialized for a sampler and an image view, but shader code only knows their identifiers.
//! - The cache of sampling routines, keyed by the instruction signature and the two identifiers.
//!   Routines are produced on demand by a [`SamplingRoutineBuilder`].
//! - The [`Constants`] tables passed to every sampling routine.

use crate::{
    format::Format,
    image::{
        sampler::{CompareOp, Filter, SamplerAddressMode, SamplerMipmapMode},
        ImageViewType, SampleCount,
    },
    macros::impl_id_counter,
    shader::{image::ImageInstructionSignature, simd::WIDTH, ImageSamplerFn},
};
use foldhash::HashMap;
use log::trace;
use parking_lot::Mutex;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    num::NonZero,
    ops::Deref,
    sync::Arc,
};

/// Represents a software Vulkan device.
pub struct Device {
    id: NonZero<u32>,
    robust_image_access: bool,
    sampling_routine_builder: Option<Arc<dyn SamplingRoutineBuilder>>,

    sampling_routines: Mutex<HashMap<SamplingRoutineKey, ImageSamplerFn>>,
    samplers: Mutex<HashMap<u32, SamplerState>>,
    image_views: Mutex<HashMap<u32, ImageViewState>>,
    constants: Box<Constants>,
}

impl Device {
    /// Creates a new `Device`.
    pub fn new(create_info: DeviceCreateInfo) -> Arc<Device> {
        let DeviceCreateInfo {
            robust_image_access,
            sampling_routine_builder,
            _ne: _,
        } = create_info;

        Arc::new(Device {
            id: Self::next_id(),
            robust_image_access,
            sampling_routine_builder,
            sampling_routines: Mutex::new(HashMap::default()),
            samplers: Mutex::new(HashMap::default()),
            image_views: Mutex::new(HashMap::default()),
            constants: Box::new(Constants::new()),
        })
    }

    /// Returns whether out-of-bounds texel coordinates are detected per axis.
    #[inline]
    pub fn robust_image_access(&self) -> bool {
        self.robust_image_access
    }

    /// Returns the constant tables passed to sampling routines.
    #[inline]
    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    /// Returns the number of sampling routines that have been built so far.
    #[inline]
    pub fn sampling_routine_count(&self) -> usize {
        self.sampling_routines.lock().len()
    }

    pub(crate) fn register_sampler(&self, id: u32, state: SamplerState) {
        self.samplers.lock().insert(id, state);
    }

    pub(crate) fn unregister_sampler(&self, id: u32) {
        self.samplers.lock().remove(&id);
        self.evict_sampling_routines(|key| key.sampler_id == id);
    }

    /// Returns the state of a live sampler.
    #[inline]
    pub fn sampler_state(&self, id: u32) -> Option<SamplerState> {
        self.samplers.lock().get(&id).cloned()
    }

    pub(crate) fn register_image_view(&self, id: u32, state: ImageViewState) {
        self.image_views.lock().insert(id, state);
    }

    pub(crate) fn unregister_image_view(&self, id: u32) {
        self.image_views.lock().remove(&id);
        self.evict_sampling_routines(|key| key.image_view_id == id);
    }

    /// Returns the state of a live image view or buffer view.
    #[inline]
    pub fn image_view_state(&self, id: u32) -> Option<ImageViewState> {
        self.image_views.lock().get(&id).cloned()
    }

    // Identifiers are never reused, so routines built for a destroyed object can never be hit
    // again.
    fn evict_sampling_routines(&self, mut f: impl FnMut(&SamplingRoutineKey) -> bool) {
        let mut sampling_routines = self.sampling_routines.lock();
        let count = sampling_routines.len();
        sampling_routines.retain(|key, _| !f(key));

        if sampling_routines.len() != count {
            trace!(
                "evicted {} sampling routines",
                count - sampling_routines.len(),
            );
        }
    }
}

impl Debug for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("robust_image_access", &self.robust_image_access)
            .finish_non_exhaustive()
    }
}

impl_id_counter!(Device);

/// Parameters to create a new `Device`.
#[derive(Clone)]
pub struct DeviceCreateInfo {
    /// Whether an out-of-bounds texel coordinate on any axis nullifies an image access.
    ///
    /// When `false`, only accesses whose byte offset falls outside of the memory of the image
    /// are nullified, so a coordinate that overflows one axis may alias a texel of another row or
    /// layer.
    ///
    /// The default value is `true`.
    pub robust_image_access: bool,

    /// The builder of native sampling routines.
    ///
    /// Routines that sample images panic if this is `None` when a routine needs to be built.
    ///
    /// The default value is `None`.
    pub sampling_routine_builder: Option<Arc<dyn SamplingRoutineBuilder>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DeviceCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            robust_image_access: true,
            sampling_routine_builder: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl Debug for DeviceCreateInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("DeviceCreateInfo")
            .field("robust_image_access", &self.robust_image_access)
            .field(
                "sampling_routine_builder",
                &self.sampling_routine_builder.is_some(),
            )
            .finish_non_exhaustive()
    }
}

/// Implemented on objects that belong to a device.
///
/// # Safety
///
/// - `device()` must return the correct device.
pub unsafe trait DeviceOwned {
    /// Returns the device that owns `self`.
    fn device(&self) -> &Arc<Device>;
}

unsafe impl<T> DeviceOwned for T
where
    T: Deref,
    T::Target: DeviceOwned,
{
    #[inline]
    fn device(&self) -> &Arc<Device> {
        (**self).device()
    }
}

/// Produces the native function that implements an image instruction for a given sampler and
/// image view.
pub trait SamplingRoutineBuilder: Send + Sync {
    /// Builds a sampling routine.
    ///
    /// `request.sampler` and `request.image_view` are `None` if the corresponding object has been
    /// destroyed, or if the identifier is zero.
    fn build(&self, request: &SamplingRoutineRequest) -> ImageSamplerFn;
}

/// Everything a [`SamplingRoutineBuilder`] may specialize a routine for.
#[derive(Clone, Debug)]
pub struct SamplingRoutineRequest {
    /// Describes the instruction being executed.
    pub signature: ImageInstructionSignature,

    /// The identifier of the sampler, or zero.
    pub sampler_id: u32,

    /// The state of the sampler, if it is alive.
    pub sampler: Option<SamplerState>,

    /// The identifier of the image view or buffer view.
    pub image_view_id: u32,

    /// The state of the image view or buffer view, if it is alive.
    pub image_view: Option<ImageViewState>,
}

/// Resolves the sampling routine of an image instruction.
///
/// Shader routines call this on a miss of their per-call-site cache.
pub trait ImageSamplerResolver: Send + Sync {
    /// Returns the sampling routine for the given instruction, sampler and image view.
    fn image_sampler(
        &self,
        signature: ImageInstructionSignature,
        sampler_id: u32,
        image_view_id: u32,
    ) -> ImageSamplerFn;
}

impl ImageSamplerResolver for Device {
    fn image_sampler(
        &self,
        signature: ImageInstructionSignature,
        sampler_id: u32,
        image_view_id: u32,
    ) -> ImageSamplerFn {
        let key = SamplingRoutineKey {
            signature,
            sampler_id,
            image_view_id,
        };

        if let Some(&function) = self.sampling_routines.lock().get(&key) {
            return function;
        }

        let builder = self
            .sampling_routine_builder
            .as_ref()
            .unwrap_or_else(|| panic!("the device has no sampling routine builder"));

        trace!(
            "building sampling routine for {:?}, sampler {}, image view {}",
            signature,
            sampler_id,
            image_view_id,
        );

        let request = SamplingRoutineRequest {
            signature,
            sampler_id,
            sampler: self.sampler_state(sampler_id),
            image_view_id,
            image_view: self.image_view_state(image_view_id),
        };
        let function = builder.build(&request);

        *self
            .sampling_routines
            .lock()
            .entry(key)
            .or_insert(function)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SamplingRoutineKey {
    signature: ImageInstructionSignature,
    sampler_id: u32,
    image_view_id: u32,
}

/// The parameters of a sampler that a sampling routine may be specialized for.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerState {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: SamplerMipmapMode,
    pub address_mode: [SamplerAddressMode; 3],
    pub mip_lod_bias: f32,
    pub compare: Option<CompareOp>,
    pub min_lod: f32,
    pub max_lod: f32,
    pub unnormalized_coordinates: bool,
}

/// The parameters of an image view or buffer view that a sampling routine may be specialized
/// for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageViewState {
    pub view_type: ImageViewType,
    pub format: Format,
    pub extent: [u32; 3],
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: SampleCount,
}

/// Constant tables shared by the shader routines and sampling routines of a device.
#[derive(Clone, Debug)]
#[repr(C, align(16))]
pub struct Constants {
    /// The linear value of every 8-bit sRGB encoded value.
    pub srgb_to_linear_8: [f32; 256],

    /// For every 4-bit lane mask, the per-lane all-ones/all-zeros mask.
    pub lane_masks: [[i32; WIDTH]; 1 << WIDTH],
}

impl Constants {
    fn new() -> Self {
        let srgb_to_linear_8 =
            std::array::from_fn(|i| crate::shader::codec::srgb_to_linear(i as f32 / 255.0));
        let lane_masks = std::array::from_fn(|mask| {
            std::array::from_fn(|lane| if mask & (1 << lane) != 0 { -1 } else { 0 })
        });

        Constants {
            srgb_to_linear_8,
            lane_masks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Device, DeviceCreateInfo, ImageSamplerResolver};
    use crate::{
        buffer::{
            view::{BufferView, BufferViewCreateInfo},
            Buffer, BufferCreateInfo,
        },
        format::Format,
        image::{
            sampler::{Sampler, SamplerCreateInfo},
            view::ImageView,
            Image, ImageCreateInfo,
        },
        shader::image::{ImageInstructionSignature, SamplerMethod, Variant},
    };

    #[test]
    fn constant_tables() {
        let device = device!();
        let constants = device.constants();
        assert_eq!(constants.srgb_to_linear_8[0], 0.0);
        assert!((constants.srgb_to_linear_8[255] - 1.0).abs() < 1e-6);
        assert_eq!(constants.lane_masks[0b0101], [-1, 0, -1, 0]);
        assert_eq!(constants.lane_masks[0b1111], [-1; 4]);
    }

    #[test]
    fn routines_are_cached() {
        let device = device!();
        let signature = ImageInstructionSignature {
            variant: Variant::None,
            sampler_method: SamplerMethod::Implicit,
            gather_component: 0,
        };

        let a = device.image_sampler(signature, 1, 2);
        let b = device.image_sampler(signature, 1, 2);
        assert_eq!(a as usize, b as usize);
        assert_eq!(device.sampling_routine_count(), 1);

        device.image_sampler(signature, 1, 3);
        assert_eq!(device.sampling_routine_count(), 2);
    }

    #[test]
    fn missing_builder() {
        let device = Device::new(DeviceCreateInfo::default());
        let signature = ImageInstructionSignature {
            variant: Variant::Dref,
            sampler_method: SamplerMethod::Lod,
            gather_component: 0,
        };

        assert_should_panic!("no sampling routine builder", {
            device.image_sampler(signature, 1, 1);
        });
    }

    #[test]
    fn routines_are_evicted_with_their_objects() {
        let device = device!();
        let signature = ImageInstructionSignature {
            variant: Variant::None,
            sampler_method: SamplerMethod::Implicit,
            gather_component: 0,
        };

        let mut kept = Vec::new();

        for i in 0..100 {
            let image = Image::new(
                device.clone(),
                ImageCreateInfo {
                    format: Format::R8G8B8A8_UNORM,
                    extent: [4, 4, 1],
                    ..Default::default()
                },
            )
            .unwrap();
            let view = ImageView::new_default(image).unwrap();
            let sampler = Sampler::new(device.clone(), SamplerCreateInfo::default()).unwrap();
            device.image_sampler(signature, sampler.id().get(), view.id().get());

            if i == 0 {
                kept.push((view, sampler));
            }
        }

        assert_eq!(device.sampling_routine_count(), 1);

        let (view, sampler) = kept.pop().unwrap();
        let view_id = view.id().get();
        device.image_sampler(signature, 0, view_id);
        assert_eq!(device.sampling_routine_count(), 2);

        drop(sampler);
        assert_eq!(device.sampling_routine_count(), 1);
        drop(view);
        assert_eq!(device.sampling_routine_count(), 0);
    }

    #[test]
    fn buffer_view_routines_are_evicted() {
        let device = device!();
        let signature = ImageInstructionSignature {
            variant: Variant::None,
            sampler_method: SamplerMethod::Fetch,
            gather_component: 0,
        };

        let buffer = Buffer::new(
            device.clone(),
            BufferCreateInfo {
                size: 64,
                ..Default::default()
            },
        )
        .unwrap();
        let view = BufferView::new(
            buffer,
            BufferViewCreateInfo {
                format: Format::R32_UINT,
                range: 0..64,
                ..Default::default()
            },
        )
        .unwrap();

        device.image_sampler(signature, 0, view.id().get());
        assert_eq!(device.sampling_routine_count(), 1);

        drop(view);
        assert_eq!(device.sampling_routine_count(), 0);
    }
}
