// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The layout of descriptor sets used by a pipeline.
//!
//! The layout itself only *describes* the descriptors, and does not contain their content
//! itself. Shader routines use it to find the type and the byte offset of the descriptor behind
//! a `(set, binding)` pair, and to map the dynamic offsets supplied at bind time back to dynamic
//! buffer bindings. Dynamic offsets are numbered across all sets of the layout, in set order,
//! then in binding declaration order within each set.

use crate::{
    descriptor_set::layout::{DescriptorSetLayout, DescriptorType},
    device::{Device, DeviceOwned},
    macros::impl_id_counter,
    ValidationError,
};
use smallvec::SmallVec;
use std::{num::NonZero, sync::Arc};

/// The maximum number of descriptor sets that a pipeline layout can have.
pub const MAX_BOUND_DESCRIPTOR_SETS: u32 = 4;

/// Describes the descriptor sets that are available to the shader routines of a pipeline.
#[derive(Debug)]
pub struct PipelineLayout {
    device: Arc<Device>,
    id: NonZero<u32>,

    set_layouts: Vec<Arc<DescriptorSetLayout>>,
    dynamic_offset_bases: SmallVec<[u32; MAX_BOUND_DESCRIPTOR_SETS as usize]>,
    dynamic_descriptor_count: u32,
}

impl PipelineLayout {
    /// Creates a new `PipelineLayout`.
    pub fn new(
        device: Arc<Device>,
        create_info: PipelineLayoutCreateInfo,
    ) -> Result<Arc<PipelineLayout>, Box<ValidationError>> {
        create_info
            .validate(&device)
            .map_err(|err| err.add_context("create_info"))?;

        let PipelineLayoutCreateInfo {
            set_layouts,
            _ne: _,
        } = create_info;

        let mut dynamic_offset_bases = SmallVec::new();
        let mut dynamic_descriptor_count = 0;

        for set_layout in &set_layouts {
            dynamic_offset_bases.push(dynamic_descriptor_count);
            dynamic_descriptor_count += set_layout.dynamic_descriptor_count();
        }

        Ok(Arc::new(PipelineLayout {
            device,
            id: Self::next_id(),
            set_layouts,
            dynamic_offset_bases,
            dynamic_descriptor_count,
        }))
    }

    /// Returns the descriptor set layouts this pipeline layout was created from.
    #[inline]
    pub fn set_layouts(&self) -> &[Arc<DescriptorSetLayout>] {
        &self.set_layouts
    }

    /// Returns the layout of descriptor set number `set`.
    ///
    /// # Panics
    ///
    /// - Panics if the layout has no set with this number.
    #[inline]
    pub fn set_layout(&self, set: u32) -> &Arc<DescriptorSetLayout> {
        self.set_layouts
            .get(set as usize)
            .unwrap_or_else(|| panic!("invalid descriptor set {}", set))
    }

    /// Returns the descriptor type of a binding.
    ///
    /// # Panics
    ///
    /// - Panics if the layout has no such set or binding.
    #[inline]
    pub fn descriptor_type(&self, set: u32, binding: u32) -> DescriptorType {
        self.set_layout(set).binding(binding).descriptor_type
    }

    /// Returns the byte offset of the first array element of a binding, from the start of the
    /// descriptor data of its set.
    ///
    /// # Panics
    ///
    /// - Panics if the layout has no such set or binding.
    #[inline]
    pub fn binding_offset(&self, set: u32, binding: u32) -> usize {
        self.set_layout(set).binding_offset(binding, 0)
    }

    /// Returns the index of the first dynamic offset of a dynamic buffer binding, among the
    /// dynamic offsets of all sets.
    ///
    /// # Panics
    ///
    /// - Panics if the layout has no such set or binding, or if the binding is not dynamic.
    pub fn dynamic_offset_index(&self, set: u32, binding: u32) -> u32 {
        let set_layout = self.set_layout(set);

        self.dynamic_offset_bases[set as usize] + set_layout.dynamic_descriptor_offset(binding)
    }

    /// Returns the total number of dynamic descriptors of all sets.
    #[inline]
    pub fn dynamic_descriptor_count(&self) -> u32 {
        self.dynamic_descriptor_count
    }
}

unsafe impl DeviceOwned for PipelineLayout {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl_id_counter!(PipelineLayout);

/// Parameters to create a new `PipelineLayout`.
#[derive(Clone, Debug)]
pub struct PipelineLayoutCreateInfo {
    /// The descriptor set layouts that should be part of the pipeline layout.
    ///
    /// They are provided in order of set number.
    ///
    /// The default value is empty.
    pub set_layouts: Vec<Arc<DescriptorSetLayout>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for PipelineLayoutCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            set_layouts: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl PipelineLayoutCreateInfo {
    pub(crate) fn validate(&self, device: &Arc<Device>) -> Result<(), Box<ValidationError>> {
        let Self {
            set_layouts,
            _ne: _,
        } = self;

        if set_layouts.len() > MAX_BOUND_DESCRIPTOR_SETS as usize {
            return Err(Box::new(ValidationError {
                context: "set_layouts".into(),
                problem: "the length exceeds `MAX_BOUND_DESCRIPTOR_SETS`".into(),
                vuids: &["VUID-VkPipelineLayoutCreateInfo-setLayoutCount-00286"],
            }));
        }

        for (index, set_layout) in set_layouts.iter().enumerate() {
            if set_layout.device() != device {
                return Err(Box::new(ValidationError {
                    context: format!("set_layouts[{}]", index).into(),
                    problem: "was not created from the same device as the pipeline layout".into(),
                    vuids: &["VUID-VkPipelineLayoutCreateInfo-commonparent"],
                }));
            }
        }

        Ok(())
    }
}
