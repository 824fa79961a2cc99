// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Describes the layout of all descriptors within a descriptor set.
//!
//! When creating a new descriptor set, you must provide a *layout* object to create it from.
//!
//! The layout decides the byte offset of every binding within the memory of its descriptor sets.
//! Bindings are laid out in declaration order, each array element taking
//! [`DescriptorSetLayout::descriptor_size`] bytes. Shader code relies on these offsets directly,
//! so they are computed once when the layout is created.

use super::{
    descriptor::{BufferDescriptor, SampledImageDescriptor, StorageImageDescriptor},
    DescriptorSet, DESCRIPTOR_SET_HEADER_SIZE,
};
use crate::{
    device::{Device, DeviceOwned},
    image::sampler::Sampler,
    macros::{impl_id_counter, vulkan_enum},
    ValidationError,
};
use log::debug;
use std::{
    mem::size_of,
    num::NonZero,
    ops::Range,
    sync::Arc,
};

/// Describes to the Vulkan implementation the layout of all descriptors within a descriptor set.
#[derive(Debug)]
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    id: NonZero<u32>,

    bindings: Vec<DescriptorSetLayoutBinding>,
    binding_offsets: Vec<usize>,
    data_size: usize,
}

impl DescriptorSetLayout {
    /// Creates a new `DescriptorSetLayout`.
    ///
    /// # Panics
    ///
    /// - Panics if a binding has a descriptor type that descriptor sets cannot hold.
    pub fn new(
        device: Arc<Device>,
        create_info: DescriptorSetLayoutCreateInfo,
    ) -> Result<Arc<DescriptorSetLayout>, Box<ValidationError>> {
        create_info
            .validate()
            .map_err(|err| err.add_context("create_info"))?;

        let DescriptorSetLayoutCreateInfo { bindings, _ne: _ } = create_info;

        let mut binding_offsets = Vec::with_capacity(bindings.len());
        let mut offset = 0;

        for binding in &bindings {
            binding_offsets.push(offset);
            offset +=
                binding.descriptor_count as usize * Self::descriptor_size(binding.descriptor_type);
        }

        let layout = DescriptorSetLayout {
            device,
            id: Self::next_id(),
            bindings,
            binding_offsets,
            data_size: offset,
        };

        debug!(
            "created descriptor set layout {} with {} bindings, {} bytes of descriptor data",
            layout.id,
            layout.bindings.len(),
            layout.data_size,
        );

        Ok(Arc::new(layout))
    }

    /// Returns the number of bytes that a layout created from `create_info` occupies, including
    /// its copies of the binding list and of the immutable samplers.
    pub fn required_allocation_size(create_info: &DescriptorSetLayoutCreateInfo) -> usize {
        let immutable_sampler_count: usize = create_info
            .bindings
            .iter()
            .filter(|binding| binding.uses_immutable_samplers())
            .map(|binding| binding.descriptor_count as usize)
            .sum();

        size_of::<DescriptorSetLayout>()
            + create_info.bindings.len()
                * (size_of::<DescriptorSetLayoutBinding>() + size_of::<usize>())
            + immutable_sampler_count * size_of::<Arc<Sampler>>()
    }

    /// Returns the number of bytes that one descriptor of the given type occupies in a
    /// descriptor set. This is always a multiple of 16.
    ///
    /// # Panics
    ///
    /// - Panics if `descriptor_type` is [`DescriptorType::InlineUniformBlock`].
    pub const fn descriptor_size(descriptor_type: DescriptorType) -> usize {
        let size = match descriptor_type {
            DescriptorType::Sampler
            | DescriptorType::CombinedImageSampler
            | DescriptorType::SampledImage
            | DescriptorType::UniformTexelBuffer => size_of::<SampledImageDescriptor>(),
            DescriptorType::StorageImage
            | DescriptorType::StorageTexelBuffer
            | DescriptorType::InputAttachment => size_of::<StorageImageDescriptor>(),
            DescriptorType::UniformBuffer
            | DescriptorType::StorageBuffer
            | DescriptorType::UniformBufferDynamic
            | DescriptorType::StorageBufferDynamic => size_of::<BufferDescriptor>(),
            DescriptorType::InlineUniformBlock => {
                panic!("descriptor type `InlineUniformBlock` is not implemented")
            }
        };

        size.next_multiple_of(16)
    }

    /// Returns the number of bytes that a descriptor set with this layout occupies, header
    /// included.
    #[inline]
    pub fn descriptor_set_allocation_size(&self) -> usize {
        DESCRIPTOR_SET_HEADER_SIZE + self.data_size
    }

    /// Returns the number of bytes of descriptor data in a descriptor set with this layout.
    #[inline]
    pub fn descriptor_set_data_size(&self) -> usize {
        self.data_size
    }

    /// Returns the bindings, in declaration order.
    #[inline]
    pub fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Returns the number of bindings.
    #[inline]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Returns the position of binding number `binding` in declaration order.
    ///
    /// # Panics
    ///
    /// - Panics if the layout has no binding with this number.
    pub fn binding_index(&self, binding: u32) -> usize {
        self.bindings
            .iter()
            .position(|b| b.binding == binding)
            .unwrap_or_else(|| panic!("invalid descriptor set layout binding {}", binding))
    }

    /// Returns the declaration of binding number `binding`.
    ///
    /// # Panics
    ///
    /// - Panics if the layout has no binding with this number.
    #[inline]
    pub fn binding(&self, binding: u32) -> &DescriptorSetLayoutBinding {
        &self.bindings[self.binding_index(binding)]
    }

    /// Returns the number of bytes between two array elements of a binding.
    #[inline]
    pub fn binding_stride(&self, binding: u32) -> usize {
        Self::descriptor_size(self.binding(binding).descriptor_type)
    }

    /// Returns the byte offset of an array element of a binding, from the start of the
    /// descriptor data of a set.
    pub fn binding_offset(&self, binding: u32, array_element: u32) -> usize {
        let index = self.binding_index(binding);
        let stride = Self::descriptor_size(self.bindings[index].descriptor_type);

        self.binding_offsets[index] + stride * array_element as usize
    }

    /// Returns the byte range of `count` descriptors of a binding, starting at `array_element`,
    /// within the descriptor data of a set.
    ///
    /// # Panics
    ///
    /// - Panics if the range does not fit in the descriptor data.
    pub(crate) fn data_range(&self, binding: u32, array_element: u32, count: u32) -> Range<usize> {
        let start = self.binding_offset(binding, array_element);
        let end = start + self.binding_stride(binding) * count as usize;
        assert!(
            end <= self.data_size,
            "descriptors {}..{} of binding {} are outside of the descriptor set data",
            array_element,
            array_element + count,
            binding,
        );

        start..end
    }

    /// Returns whether the descriptor type holds a dynamic buffer offset.
    #[inline]
    pub fn is_dynamic(descriptor_type: DescriptorType) -> bool {
        matches!(
            descriptor_type,
            DescriptorType::UniformBufferDynamic | DescriptorType::StorageBufferDynamic
        )
    }

    /// Returns whether binding number `binding` holds dynamic buffer offsets.
    #[inline]
    pub fn is_binding_dynamic(&self, binding: u32) -> bool {
        Self::is_dynamic(self.binding(binding).descriptor_type)
    }

    /// Returns the total number of dynamic descriptors of the layout.
    pub fn dynamic_descriptor_count(&self) -> u32 {
        self.bindings
            .iter()
            .filter(|b| Self::is_dynamic(b.descriptor_type))
            .map(|b| b.descriptor_count)
            .sum()
    }

    /// Returns the index of the first dynamic offset of binding number `binding`, among the
    /// dynamic offsets of the layout in declaration order.
    ///
    /// # Panics
    ///
    /// - Panics if the layout has no binding with this number, or if the binding is not dynamic.
    pub fn dynamic_descriptor_offset(&self, binding: u32) -> u32 {
        let index = self.binding_index(binding);
        assert!(
            Self::is_dynamic(self.bindings[index].descriptor_type),
            "binding {} is not a dynamic buffer binding",
            binding,
        );

        self.bindings[..index]
            .iter()
            .filter(|b| Self::is_dynamic(b.descriptor_type))
            .map(|b| b.descriptor_count)
            .sum()
    }

    /// Writes the header of a freshly allocated set and the descriptors of its immutable
    /// samplers.
    pub(crate) fn initialize(&self, set: &DescriptorSet) {
        // SAFETY: The set was allocated for this layout, and no one else can access it yet.
        unsafe { set.write_header(self) };

        for (binding, &offset) in self.bindings.iter().zip(&self.binding_offsets) {
            if !binding.uses_immutable_samplers() {
                continue;
            }

            let stride = Self::descriptor_size(binding.descriptor_type);

            for (element, sampler) in binding.immutable_samplers.iter().enumerate() {
                // SAFETY: Sampler and combined image sampler bindings hold sampled image
                // records, and the offset is within the set.
                unsafe {
                    set.descriptor_mut::<SampledImageDescriptor>(offset + element * stride)
                        .update_sampler(sampler);
                }
            }
        }
    }
}

unsafe impl DeviceOwned for DescriptorSetLayout {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl_id_counter!(DescriptorSetLayout);

/// Parameters to create a new `DescriptorSetLayout`.
#[derive(Clone, Debug)]
pub struct DescriptorSetLayoutCreateInfo {
    /// The bindings of the descriptor set layout, in the order they are laid out in memory.
    ///
    /// Binding numbers must be unique, but need not be sorted or contiguous.
    ///
    /// The default value is empty.
    pub bindings: Vec<DescriptorSetLayoutBinding>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DescriptorSetLayoutCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl DescriptorSetLayoutCreateInfo {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let Self { bindings, _ne: _ } = self;

        for (index, binding) in bindings.iter().enumerate() {
            binding
                .validate()
                .map_err(|err| err.add_context(format!("bindings[{}]", index)))?;

            if bindings[..index].iter().any(|b| b.binding == binding.binding) {
                return Err(Box::new(ValidationError {
                    context: format!("bindings[{}].binding", index).into(),
                    problem: "is not unique".into(),
                    vuids: &["VUID-VkDescriptorSetLayoutCreateInfo-binding-00279"],
                }));
            }
        }

        Ok(())
    }
}

/// A binding in a descriptor set layout.
#[derive(Clone, Debug)]
pub struct DescriptorSetLayoutBinding {
    /// The binding number, as decorated in shader code.
    pub binding: u32,

    /// The content and layout of each array element of a binding.
    ///
    /// There is no default value.
    pub descriptor_type: DescriptorType,

    /// How many descriptors (array elements) this binding is made of.
    ///
    /// The default value is `1`.
    pub descriptor_count: u32,

    /// Samplers that are included as a fixed part of the descriptor set layout. Once bound, they
    /// do not need to be provided when writing to the descriptor set.
    ///
    /// If not empty, `descriptor_type` must be [`DescriptorType::Sampler`] or
    /// [`DescriptorType::CombinedImageSampler`], and the length must equal
    /// `descriptor_count`.
    ///
    /// The default value is empty.
    pub immutable_samplers: Vec<Arc<Sampler>>,

    pub _ne: crate::NonExhaustive,
}

impl DescriptorSetLayoutBinding {
    /// Returns a `DescriptorSetLayoutBinding` with the given number and type.
    #[inline]
    pub fn new(binding: u32, descriptor_type: DescriptorType) -> Self {
        Self {
            binding,
            descriptor_type,
            descriptor_count: 1,
            immutable_samplers: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }

    /// Returns whether the samplers of the binding are fixed by the layout.
    #[inline]
    pub fn uses_immutable_samplers(&self) -> bool {
        matches!(
            self.descriptor_type,
            DescriptorType::Sampler | DescriptorType::CombinedImageSampler
        ) && !self.immutable_samplers.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            binding: _,
            descriptor_type,
            descriptor_count,
            ref immutable_samplers,
            _ne: _,
        } = self;

        if !immutable_samplers.is_empty() {
            if !matches!(
                descriptor_type,
                DescriptorType::Sampler | DescriptorType::CombinedImageSampler
            ) {
                return Err(Box::new(ValidationError {
                    problem: "`immutable_samplers` is not empty, but `descriptor_type` is not \
                        `DescriptorType::Sampler` or `DescriptorType::CombinedImageSampler`"
                        .into(),
                    ..Default::default()
                }));
            }

            if descriptor_count != immutable_samplers.len() as u32 {
                return Err(Box::new(ValidationError {
                    problem: "`immutable_samplers` is not empty, but its length does not equal \
                        `descriptor_count`"
                        .into(),
                    vuids: &["VUID-VkDescriptorSetLayoutBinding-descriptorType-00282"],
                    ..Default::default()
                }));
            }
        }

        Ok(())
    }
}

vulkan_enum! {
    /// Describes what kind of resource may later be bound to a descriptor.
    DescriptorType = DescriptorType(i32);

    /// Describes how a `SampledImage` descriptor should be read.
    Sampler = SAMPLER,

    /// Combines `SampledImage` and `Sampler` in one descriptor.
    CombinedImageSampler = COMBINED_IMAGE_SAMPLER,

    /// Gives read-only access to an image via a sampler. The image must be combined with a sampler
    /// inside the shader.
    SampledImage = SAMPLED_IMAGE,

    /// Gives read and/or write access to individual pixels in an image. The image cannot be
    /// sampled, so you have exactly specify which pixel to read or write.
    StorageImage = STORAGE_IMAGE,

    /// Gives read-only access to the content of a buffer, interpreted as an array of texel data.
    UniformTexelBuffer = UNIFORM_TEXEL_BUFFER,

    /// Gives read and/or write access to the content of a buffer, interpreted as an array of texel
    /// data. Less restrictive but sometimes slower than a uniform texel buffer.
    StorageTexelBuffer = STORAGE_TEXEL_BUFFER,

    /// Gives read-only access to the content of a buffer, interpreted as a structure.
    UniformBuffer = UNIFORM_BUFFER,

    /// Gives read and/or write access to the content of a buffer, interpreted as a structure. Less
    /// restrictive but sometimes slower than a uniform buffer.
    StorageBuffer = STORAGE_BUFFER,

    /// As `UniformBuffer`, but the offset within the buffer is specified at the time the descriptor
    /// set is bound, rather than when the descriptor set is updated.
    UniformBufferDynamic = UNIFORM_BUFFER_DYNAMIC,

    /// As `StorageBuffer`, but the offset within the buffer is specified at the time the descriptor
    /// set is bound, rather than when the descriptor set is updated.
    StorageBufferDynamic = STORAGE_BUFFER_DYNAMIC,

    /// Gives access to an image inside a fragment shader via a render pass. You can only access the
    /// pixel that is currently being processed by the fragment shader.
    InputAttachment = INPUT_ATTACHMENT,

    /// Very similar to `UniformBuffer`, but the data is written directly into an inline buffer
    /// inside the descriptor set. Not supported: creating a layout with such a binding panics.
    InlineUniformBlock = INLINE_UNIFORM_BLOCK,
}
