//! The execution context of a shader.
//!
//! A [`ShaderRoutine`] binds a [`SpirvShader`] to a pipeline layout, descriptor sets and the
//! per-draw state that shader code can observe. It also owns the sampler cache, which remembers
//! the sampling routine last used at every image call site.

use super::{
    image::ImageInstructionSignature,
    simd::{SimdInt, SimdUInt},
    ImageSamplerFn, SpirvShader,
};
use crate::{
    descriptor_set::{descriptor::SampledImageDescriptor, DescriptorSet},
    device::{Device, DeviceOwned, ImageSamplerResolver},
    format::Format,
    pipeline::layout::PipelineLayout,
    ValidationError,
};
use foldhash::HashMap;
use log::trace;
use smallvec::SmallVec;
use std::{ptr, sync::Arc};

/// Executes a shader with a given pipeline layout and bound descriptor sets.
pub struct ShaderRoutine {
    pub(super) shader: Arc<SpirvShader>,
    pub(super) pipeline_layout: Arc<PipelineLayout>,
    pub(super) descriptor_sets: SmallVec<[Option<Arc<DescriptorSet>>; 4]>,
    pub(super) sampler_cache: Vec<SamplerCacheEntry>,
    pub(super) image_sampler_resolver: Arc<dyn ImageSamplerResolver>,

    pub(super) window_space_position: [SimdInt; 2],
    pub(super) view_id: u32,
    pub(super) input_attachment_formats: Vec<Format>,
    pub(super) active_lane_mask: SimdInt,
    pub(super) helper_lane_mask: SimdInt,
}

impl ShaderRoutine {
    /// Creates a new `ShaderRoutine`.
    ///
    /// Every descriptor that `shader` declares must exist in `pipeline_layout`. All lanes start
    /// active and no descriptor set is bound.
    pub fn new(
        shader: Arc<SpirvShader>,
        pipeline_layout: Arc<PipelineLayout>,
        create_info: ShaderRoutineCreateInfo,
    ) -> Result<ShaderRoutine, Box<ValidationError>> {
        Self::validate_new(&shader, &pipeline_layout)?;

        let ShaderRoutineCreateInfo {
            window_space_position,
            view_id,
            input_attachment_formats,
            image_sampler_resolver,
            _ne: _,
        } = create_info;

        let image_sampler_resolver = image_sampler_resolver
            .unwrap_or_else(|| shader.device().clone() as Arc<dyn ImageSamplerResolver>);
        let sampler_cache = vec![SamplerCacheEntry::default(); shader.image_call_site_count()];
        let descriptor_sets = (0..pipeline_layout.set_layouts().len()).map(|_| None).collect();

        Ok(ShaderRoutine {
            shader,
            pipeline_layout,
            descriptor_sets,
            sampler_cache,
            image_sampler_resolver,
            window_space_position,
            view_id,
            input_attachment_formats,
            active_lane_mask: SimdInt::splat(-1),
            helper_lane_mask: SimdInt::splat(0),
        })
    }

    fn validate_new(
        shader: &SpirvShader,
        pipeline_layout: &PipelineLayout,
    ) -> Result<(), Box<ValidationError>> {
        if shader.device() != pipeline_layout.device() {
            return Err(Box::new(ValidationError {
                context: "pipeline_layout".into(),
                problem: "was not created from the same device as the shader".into(),
                ..Default::default()
            }));
        }

        for (set, binding) in shader.descriptor_bindings() {
            let set_layout = pipeline_layout.set_layouts().get(set as usize);
            let is_declared = set_layout.is_some_and(|set_layout| {
                set_layout
                    .bindings()
                    .iter()
                    .any(|layout_binding| layout_binding.binding == binding)
            });

            if !is_declared {
                return Err(Box::new(ValidationError {
                    context: "pipeline_layout".into(),
                    problem: format!(
                        "the shader uses binding {} of descriptor set {}, which the layout does \
                        not declare",
                        binding, set,
                    )
                    .into(),
                    vuids: &["VUID-VkGraphicsPipelineCreateInfo-layout-07988"],
                }));
            }
        }

        Ok(())
    }

    /// Returns the shader that this routine executes.
    #[inline]
    pub fn shader(&self) -> &Arc<SpirvShader> {
        &self.shader
    }

    /// Returns the pipeline layout of the routine.
    #[inline]
    pub fn pipeline_layout(&self) -> &Arc<PipelineLayout> {
        &self.pipeline_layout
    }

    /// Binds a descriptor set to set number `set`.
    ///
    /// The set must have been allocated with the set layout that `set` has in the pipeline
    /// layout.
    pub fn bind_descriptor_set(
        &mut self,
        set: u32,
        descriptor_set: Arc<DescriptorSet>,
    ) -> Result<(), Box<ValidationError>> {
        let Some(set_layout) = self.pipeline_layout.set_layouts().get(set as usize) else {
            return Err(Box::new(ValidationError {
                context: "set".into(),
                problem: "is not less than the number of set layouts of the pipeline layout"
                    .into(),
                vuids: &["VUID-vkCmdBindDescriptorSets-firstSet-00360"],
            }));
        };

        if !Arc::ptr_eq(descriptor_set.layout(), set_layout) {
            return Err(Box::new(ValidationError {
                context: "descriptor_set".into(),
                problem: "was not allocated with the set layout of the pipeline layout".into(),
                vuids: &["VUID-vkCmdBindDescriptorSets-pDescriptorSets-00358"],
            }));
        }

        trace!("binding descriptor set {} to set {}", descriptor_set.id(), set);
        self.descriptor_sets[set as usize] = Some(descriptor_set);

        Ok(())
    }

    /// Sets which lanes execute. An active lane holds all ones.
    #[inline]
    pub fn set_active_lane_mask(&mut self, mask: SimdInt) {
        self.active_lane_mask = mask;
    }

    /// Sets which lanes are helper invocations. A helper lane holds all ones.
    ///
    /// Helper lanes execute so that derivatives can be computed, but their image writes and
    /// atomic operations are dropped. No lane is a helper by default.
    #[inline]
    pub fn set_helper_lane_mask(&mut self, mask: SimdInt) {
        self.helper_lane_mask = mask;
    }

    /// Returns the sampler cache, one entry per image call site.
    #[inline]
    pub fn sampler_cache(&self) -> &[SamplerCacheEntry] {
        &self.sampler_cache
    }

    /// Executes the entry point of the shader once, for all lanes.
    ///
    /// # Panics
    ///
    /// - Panics if the shader accesses a descriptor set that is not bound.
    /// - Panics if the shader executes an instruction that is not supported.
    pub fn run(&mut self, inputs: &InterfaceValues) -> InterfaceValues {
        let shader = self.shader.clone();

        shader.execute(self, inputs)
    }

    /// Returns the sampling routine for a call site, calling the resolver only if the image
    /// descriptor or the sampler differs from the last execution of the call site.
    ///
    /// # Safety
    ///
    /// - `image_descriptor` must point to a sampled image descriptor of a bound set.
    pub(super) unsafe fn image_sampler(
        &mut self,
        call_site: usize,
        signature: ImageInstructionSignature,
        image_descriptor: *const SampledImageDescriptor,
        sampler_id: u32,
    ) -> ImageSamplerFn {
        let entry = &self.sampler_cache[call_site];

        if let Some(function) = entry.function {
            if ptr::eq(entry.image_descriptor, image_descriptor) && entry.sampler_id == sampler_id
            {
                return function;
            }
        }

        let image_view_id = unsafe { (*image_descriptor).image_view_id };

        trace!(
            "sampler cache miss at call site {}: sampler {}, image view {}",
            call_site,
            sampler_id,
            image_view_id,
        );

        let function =
            self.image_sampler_resolver
                .image_sampler(signature, sampler_id, image_view_id);
        self.sampler_cache[call_site] = SamplerCacheEntry {
            image_descriptor,
            sampler_id,
            function: Some(function),
        };

        function
    }

    /// Returns the address of the first descriptor of a binding.
    pub(super) fn descriptor_pointer(&self, set: u32, binding: u32) -> *mut u8 {
        let descriptor_set = self
            .descriptor_sets
            .get(set as usize)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("descriptor set {} is not bound", set));

        descriptor_set
            .data_ptr()
            .wrapping_add(self.pipeline_layout.binding_offset(set, binding))
    }
}

unsafe impl DeviceOwned for ShaderRoutine {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        self.shader.device()
    }
}

impl std::fmt::Debug for ShaderRoutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderRoutine")
            .field("shader", &self.shader.id())
            .field("pipeline_layout", &self.pipeline_layout.id())
            .field("view_id", &self.view_id)
            .field("active_lane_mask", &self.active_lane_mask)
            .field("helper_lane_mask", &self.helper_lane_mask)
            .finish_non_exhaustive()
    }
}

/// Parameters to create a new `ShaderRoutine`.
#[derive(Clone)]
pub struct ShaderRoutineCreateInfo {
    /// The window-space position of every lane, added to the coordinates of subpass data reads.
    ///
    /// The default value is zero for all lanes.
    pub window_space_position: [SimdInt; 2],

    /// The index of the view being rendered. Subpass data reads access this layer.
    ///
    /// The default value is `0`.
    pub view_id: u32,

    /// The formats of the input attachments, by input attachment index.
    ///
    /// The default value is empty.
    pub input_attachment_formats: Vec<Format>,

    /// Resolves the sampling routines of image instructions on a sampler cache miss.
    ///
    /// The default value is `None`, which uses the device of the shader.
    pub image_sampler_resolver: Option<Arc<dyn ImageSamplerResolver>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for ShaderRoutineCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            window_space_position: [SimdInt::splat(0); 2],
            view_id: 0,
            input_attachment_formats: Vec::new(),
            image_sampler_resolver: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// The last sampling routine used at an image call site.
#[derive(Clone, Copy, Debug)]
pub struct SamplerCacheEntry {
    /// The descriptor that was sampled, or null if the call site has not executed yet.
    pub image_descriptor: *const SampledImageDescriptor,

    /// The identifier of the [`Sampler`](crate::image::sampler::Sampler) that was used, or zero
    /// for instructions without one.
    pub sampler_id: u32,

    pub function: Option<ImageSamplerFn>,
}

impl Default for SamplerCacheEntry {
    #[inline]
    fn default() -> Self {
        SamplerCacheEntry {
            image_descriptor: ptr::null(),
            sampler_id: 0,
            function: None,
        }
    }
}

/// The values of `Input` or `Output` variables, by location.
///
/// Every variable holds one lane vector per scalar component, as raw bits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InterfaceValues {
    values: HashMap<u32, Vec<SimdUInt>>,
}

impl InterfaceValues {
    /// Returns an empty set of values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the components of the variable at `location`.
    pub fn set(&mut self, location: u32, components: impl IntoIterator<Item = SimdUInt>) {
        self.values.insert(location, components.into_iter().collect());
    }

    /// Returns the components of the variable at `location`.
    #[inline]
    pub fn get(&self, location: u32) -> Option<&[SimdUInt]> {
        self.values.get(&location).map(Vec::as_slice)
    }
}
