// Copyright (c) 2017 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Writes and copies that update the descriptors of a set.
//!
//! A write or a copy targets a run of array elements of a single binding. Runs that would spill
//! past the end of the binding into the next one are rejected.

use super::{
    descriptor::{BufferDescriptor, SampledImageDescriptor, StorageImageDescriptor},
    layout::{DescriptorSetLayout, DescriptorType},
    DescriptorSet,
};
use crate::{
    buffer::{view::BufferView, Buffer},
    image::{sampler::Sampler, view::ImageView},
    DeviceSize, ValidationError,
};
use smallvec::{smallvec, SmallVec};
use std::{ops::Range, ptr, sync::Arc};

/// Represents a single write operation to the binding of a descriptor set.
///
/// `WriteDescriptorSet` specifies the binding number and target array index, and includes one or
/// more resources of a given type that need to be written to that location. Two constructors are
/// provided for each resource type:
/// - The basic constructor variant writes a single element to array index 0. It is intended for
///   non-arrayed bindings, where `descriptor_count` in the descriptor set layout is 1.
/// - The `_array` variant writes several elements and allows specifying the target array index.
#[derive(Clone, Debug)]
pub struct WriteDescriptorSet {
    binding: u32,
    first_array_element: u32,
    elements: WriteDescriptorSetElements,
}

impl WriteDescriptorSet {
    /// Write a single buffer to array element 0, covering the whole buffer.
    #[inline]
    pub fn buffer(binding: u32, buffer: Arc<Buffer>) -> Self {
        let range = 0..buffer.size();
        Self::buffer_with_range(binding, DescriptorBufferInfo { buffer, range })
    }

    /// Write a number of consecutive buffer elements, each covering the whole buffer.
    #[inline]
    pub fn buffer_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = Arc<Buffer>>,
    ) -> Self {
        Self::buffer_with_range_array(
            binding,
            first_array_element,
            elements.into_iter().map(|buffer| {
                let range = 0..buffer.size();
                DescriptorBufferInfo { buffer, range }
            }),
        )
    }

    /// Write a single buffer to array element 0, specifying the range of the buffer to be used.
    #[inline]
    pub fn buffer_with_range(binding: u32, buffer_info: DescriptorBufferInfo) -> Self {
        Self::buffer_with_range_array(binding, 0, [buffer_info])
    }

    /// Write a number of consecutive buffer elements, specifying the ranges of the buffers to be
    /// used.
    pub fn buffer_with_range_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = DescriptorBufferInfo>,
    ) -> Self {
        Self {
            binding,
            first_array_element,
            elements: WriteDescriptorSetElements::Buffer(elements.into_iter().collect()),
        }
    }

    /// Write a single buffer view to array element 0.
    #[inline]
    pub fn buffer_view(binding: u32, buffer_view: Arc<BufferView>) -> Self {
        Self::buffer_view_array(binding, 0, [buffer_view])
    }

    /// Write a number of consecutive buffer view elements.
    pub fn buffer_view_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = Arc<BufferView>>,
    ) -> Self {
        Self {
            binding,
            first_array_element,
            elements: WriteDescriptorSetElements::BufferView(elements.into_iter().collect()),
        }
    }

    /// Write a single image view to array element 0.
    ///
    /// For combined image sampler bindings, the layout must provide immutable samplers.
    #[inline]
    pub fn image_view(binding: u32, image_view: Arc<ImageView>) -> Self {
        Self::image_view_array(binding, 0, [image_view])
    }

    /// Write a number of consecutive image view elements.
    pub fn image_view_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = Arc<ImageView>>,
    ) -> Self {
        Self {
            binding,
            first_array_element,
            elements: WriteDescriptorSetElements::ImageView(elements.into_iter().collect()),
        }
    }

    /// Write a single image view and sampler to array element 0.
    #[inline]
    pub fn image_view_sampler(
        binding: u32,
        image_view: Arc<ImageView>,
        sampler: Arc<Sampler>,
    ) -> Self {
        Self::image_view_sampler_array(binding, 0, [(image_view, sampler)])
    }

    /// Write a number of consecutive image view and sampler elements.
    pub fn image_view_sampler_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = (Arc<ImageView>, Arc<Sampler>)>,
    ) -> Self {
        Self {
            binding,
            first_array_element,
            elements: WriteDescriptorSetElements::ImageViewSampler(elements.into_iter().collect()),
        }
    }

    /// Write a single sampler to array element 0.
    #[inline]
    pub fn sampler(binding: u32, sampler: Arc<Sampler>) -> Self {
        Self::sampler_array(binding, 0, [sampler])
    }

    /// Write a number of consecutive sampler elements.
    pub fn sampler_array(
        binding: u32,
        first_array_element: u32,
        elements: impl IntoIterator<Item = Arc<Sampler>>,
    ) -> Self {
        Self {
            binding,
            first_array_element,
            elements: WriteDescriptorSetElements::Sampler(elements.into_iter().collect()),
        }
    }

    /// Returns the binding number that is updated by this descriptor write.
    #[inline]
    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Returns the first array element in the binding that is updated by this descriptor write.
    #[inline]
    pub fn first_array_element(&self) -> u32 {
        self.first_array_element
    }

    /// Returns a reference to the elements held by this descriptor write.
    #[inline]
    pub fn elements(&self) -> &WriteDescriptorSetElements {
        &self.elements
    }

    pub(crate) fn validate(
        &self,
        layout: &DescriptorSetLayout,
    ) -> Result<(), Box<ValidationError>> {
        let &Self {
            binding,
            first_array_element,
            ref elements,
        } = self;

        let layout_binding = match layout.bindings().iter().find(|b| b.binding == binding) {
            Some(layout_binding) => layout_binding,
            None => {
                return Err(Box::new(ValidationError {
                    context: "binding".into(),
                    problem: "does not exist in the descriptor set layout".into(),
                    vuids: &["VUID-VkWriteDescriptorSet-dstBinding-00315"],
                }));
            }
        };

        let descriptor_type = layout_binding.descriptor_type;
        let has_immutable_samplers = layout_binding.uses_immutable_samplers();

        let compatible = match elements {
            WriteDescriptorSetElements::Buffer(_) => matches!(
                descriptor_type,
                DescriptorType::UniformBuffer
                    | DescriptorType::StorageBuffer
                    | DescriptorType::UniformBufferDynamic
                    | DescriptorType::StorageBufferDynamic
            ),
            WriteDescriptorSetElements::BufferView(_) => matches!(
                descriptor_type,
                DescriptorType::UniformTexelBuffer | DescriptorType::StorageTexelBuffer
            ),
            WriteDescriptorSetElements::ImageView(_) => match descriptor_type {
                DescriptorType::SampledImage
                | DescriptorType::StorageImage
                | DescriptorType::InputAttachment => true,
                DescriptorType::CombinedImageSampler => has_immutable_samplers,
                _ => false,
            },
            WriteDescriptorSetElements::ImageViewSampler(_) => {
                descriptor_type == DescriptorType::CombinedImageSampler && !has_immutable_samplers
            }
            WriteDescriptorSetElements::Sampler(_) => {
                descriptor_type == DescriptorType::Sampler && !has_immutable_samplers
            }
        };

        if !compatible {
            return Err(Box::new(ValidationError {
                context: "elements".into(),
                problem: format!(
                    "cannot be written to a binding of type {:?}{}",
                    descriptor_type,
                    if has_immutable_samplers {
                        " with immutable samplers"
                    } else {
                        ""
                    },
                )
                .into(),
                vuids: &["VUID-VkWriteDescriptorSet-descriptorType-00319"],
            }));
        }

        let end = first_array_element as u64 + elements.len() as u64;

        if end > layout_binding.descriptor_count as u64 {
            return Err(Box::new(ValidationError {
                problem: "`first_array_element` + the number of provided elements is greater \
                    than the number of descriptors in the descriptor set binding"
                    .into(),
                vuids: &["VUID-VkWriteDescriptorSet-dstArrayElement-00321"],
                ..Default::default()
            }));
        }

        if let WriteDescriptorSetElements::Buffer(elements) = elements {
            for (index, buffer_info) in elements.iter().enumerate() {
                buffer_info
                    .buffer
                    .validate_range(&buffer_info.range)
                    .map_err(|err| err.add_context(format!("elements[{}]", index)))?;
            }
        }

        Ok(())
    }

    /// Writes the descriptor records into `set`.
    ///
    /// # Safety
    ///
    /// - The write must have been validated against the layout of `set`.
    /// - No shader routine may be reading the set at the same time.
    pub(crate) unsafe fn apply(&self, set: &DescriptorSet) {
        let layout = set.layout();
        let binding = self.binding;
        let descriptor_type = layout.binding(binding).descriptor_type;
        let range = layout.data_range(binding, self.first_array_element, self.elements.len());
        let stride = layout.binding_stride(binding);
        let offsets = (range.start..range.end).step_by(stride);

        match &self.elements {
            WriteDescriptorSetElements::Buffer(elements) => {
                for (offset, buffer_info) in offsets.zip(elements) {
                    let descriptor = buffer_info.descriptor();
                    unsafe { *set.descriptor_mut::<BufferDescriptor>(offset) = descriptor };
                }
            }
            WriteDescriptorSetElements::BufferView(elements) => {
                for (offset, buffer_view) in offsets.zip(elements) {
                    if descriptor_type == DescriptorType::StorageTexelBuffer {
                        let descriptor = StorageImageDescriptor::from_buffer_view(buffer_view);
                        let record =
                            unsafe { set.descriptor_mut::<StorageImageDescriptor>(offset) };
                        *record = descriptor;
                    } else {
                        let record =
                            unsafe { set.descriptor_mut::<SampledImageDescriptor>(offset) };
                        record.update_buffer_view(buffer_view);
                    }
                }
            }
            WriteDescriptorSetElements::ImageView(elements) => {
                for (offset, image_view) in offsets.zip(elements) {
                    match descriptor_type {
                        DescriptorType::StorageImage | DescriptorType::InputAttachment => {
                            let descriptor = StorageImageDescriptor::from_image_view(image_view);
                            unsafe {
                                *set.descriptor_mut::<StorageImageDescriptor>(offset) = descriptor
                            };
                        }
                        _ => {
                            let record =
                                unsafe { set.descriptor_mut::<SampledImageDescriptor>(offset) };
                            record.update_image_view(image_view);
                        }
                    }
                }
            }
            WriteDescriptorSetElements::ImageViewSampler(elements) => {
                for (offset, (image_view, sampler)) in offsets.zip(elements) {
                    let record = unsafe { set.descriptor_mut::<SampledImageDescriptor>(offset) };
                    record.update_sampler(sampler);
                    record.update_image_view(image_view);
                }
            }
            WriteDescriptorSetElements::Sampler(elements) => {
                for (offset, sampler) in offsets.zip(elements) {
                    let record = unsafe { set.descriptor_mut::<SampledImageDescriptor>(offset) };
                    record.update_sampler(sampler);
                }
            }
        }
    }
}

/// The elements held by a `WriteDescriptorSet`.
#[derive(Clone, Debug)]
pub enum WriteDescriptorSetElements {
    Buffer(SmallVec<[DescriptorBufferInfo; 1]>),
    BufferView(SmallVec<[Arc<BufferView>; 1]>),
    ImageView(SmallVec<[Arc<ImageView>; 1]>),
    ImageViewSampler(SmallVec<[(Arc<ImageView>, Arc<Sampler>); 1]>),
    Sampler(SmallVec<[Arc<Sampler>; 1]>),
}

impl WriteDescriptorSetElements {
    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> u32 {
        match self {
            Self::Buffer(elements) => elements.len() as u32,
            Self::BufferView(elements) => elements.len() as u32,
            Self::ImageView(elements) => elements.len() as u32,
            Self::ImageViewSampler(elements) => elements.len() as u32,
            Self::Sampler(elements) => elements.len() as u32,
        }
    }

    /// Returns the resources that element `index` keeps alive while it is written in a set.
    pub(crate) fn resources(&self, index: usize) -> SmallVec<[DescriptorResource; 2]> {
        match self {
            Self::Buffer(elements) => smallvec![DescriptorResource::Buffer(
                elements[index].buffer.clone()
            )],
            Self::BufferView(elements) => {
                smallvec![DescriptorResource::BufferView(elements[index].clone())]
            }
            Self::ImageView(elements) => {
                smallvec![DescriptorResource::ImageView(elements[index].clone())]
            }
            Self::ImageViewSampler(elements) => {
                let (image_view, sampler) = &elements[index];
                smallvec![
                    DescriptorResource::ImageView(image_view.clone()),
                    DescriptorResource::Sampler(sampler.clone()),
                ]
            }
            Self::Sampler(elements) => {
                smallvec![DescriptorResource::Sampler(elements[index].clone())]
            }
        }
    }
}

/// Parameters to write a buffer reference to a descriptor.
#[derive(Clone, Debug)]
pub struct DescriptorBufferInfo {
    /// The buffer to write to the descriptor.
    pub buffer: Arc<Buffer>,

    /// The slice of bytes in `buffer` that will be made available to the shader.
    /// `range` must not be outside the range `buffer`.
    ///
    /// For dynamic buffer bindings, `range` specifies the slice that is to be bound if the
    /// dynamic offset were zero. When binding the descriptor set, the effective value of `range`
    /// shifts forward by the offset that was provided. For example, if `range` is specified as
    /// `0..8` when writing the descriptor set, and then when binding the descriptor set the
    /// offset `16` is used, then the range of `buffer` that will actually be bound is `16..24`.
    pub range: Range<DeviceSize>,
}

impl DescriptorBufferInfo {
    fn descriptor(&self) -> BufferDescriptor {
        let Range { start, end } = self.range;

        BufferDescriptor {
            // SAFETY: The range was validated to be within the buffer.
            ptr: unsafe { self.buffer.as_ptr().add(start as usize) },
            size_in_bytes: (end - start) as i32,
            robustness_size: (self.buffer.size() - start) as i32,
        }
    }
}

/// A resource that a descriptor set keeps alive because one of its descriptors points into it.
#[derive(Clone, Debug)]
pub(crate) enum DescriptorResource {
    Buffer(Arc<Buffer>),
    BufferView(Arc<BufferView>),
    ImageView(Arc<ImageView>),
    Sampler(Arc<Sampler>),
}

/// Represents a single copy operation to the binding of a descriptor set.
#[derive(Clone, Debug)]
pub struct CopyDescriptorSet {
    /// The source descriptor set to copy from.
    ///
    /// There is no default value.
    pub src_set: Arc<DescriptorSet>,

    /// The binding number in the source descriptor set to copy from.
    ///
    /// The default value is 0.
    pub src_binding: u32,

    /// The first array element in the source descriptor set to copy from.
    ///
    /// The default value is 0.
    pub src_first_array_element: u32,

    /// The binding number in the destination descriptor set to copy into.
    ///
    /// The default value is 0.
    pub dst_binding: u32,

    /// The first array element in the destination descriptor set to copy into.
    pub dst_first_array_element: u32,

    /// The number of descriptors (array elements) to copy.
    ///
    /// The default value is 1.
    pub descriptor_count: u32,

    pub _ne: crate::NonExhaustive,
}

impl CopyDescriptorSet {
    /// Returns a `CopyDescriptorSet` with the specified `src_set`.
    #[inline]
    pub fn new(src_set: Arc<DescriptorSet>) -> Self {
        Self {
            src_set,
            src_binding: 0,
            src_first_array_element: 0,
            dst_binding: 0,
            dst_first_array_element: 0,
            descriptor_count: 1,
            _ne: crate::NonExhaustive(()),
        }
    }

    pub(crate) fn validate(
        &self,
        dst_layout: &DescriptorSetLayout,
    ) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref src_set,
            src_binding,
            src_first_array_element,
            dst_binding,
            dst_first_array_element,
            descriptor_count,
            _ne: _,
        } = self;

        let src_layout = src_set.layout();

        let Some(src_layout_binding) = src_layout
            .bindings()
            .iter()
            .find(|b| b.binding == src_binding)
        else {
            return Err(Box::new(ValidationError {
                context: "src_binding".into(),
                problem: "does not exist in the descriptor set layout of `src_set`".into(),
                vuids: &["VUID-VkCopyDescriptorSet-srcBinding-00345"],
            }));
        };

        if src_first_array_element as u64 + descriptor_count as u64
            > src_layout_binding.descriptor_count as u64
        {
            return Err(Box::new(ValidationError {
                problem: "`src_first_array_element` + `descriptor_count` is greater than the \
                    number of descriptors in the source descriptor set binding"
                    .into(),
                vuids: &["VUID-VkCopyDescriptorSet-srcArrayElement-00346"],
                ..Default::default()
            }));
        }

        let Some(dst_layout_binding) = dst_layout
            .bindings()
            .iter()
            .find(|b| b.binding == dst_binding)
        else {
            return Err(Box::new(ValidationError {
                context: "dst_binding".into(),
                problem: "does not exist in the descriptor set layout of the destination set"
                    .into(),
                vuids: &["VUID-VkCopyDescriptorSet-dstBinding-00347"],
            }));
        };

        if dst_first_array_element as u64 + descriptor_count as u64
            > dst_layout_binding.descriptor_count as u64
        {
            return Err(Box::new(ValidationError {
                problem: "`dst_first_array_element` + `descriptor_count` is greater than the \
                    number of descriptors in the destination descriptor set binding"
                    .into(),
                vuids: &["VUID-VkCopyDescriptorSet-dstArrayElement-00348"],
                ..Default::default()
            }));
        }

        if src_layout_binding.descriptor_type != dst_layout_binding.descriptor_type {
            return Err(Box::new(ValidationError {
                problem: "the descriptor type of the source binding does not equal the \
                    descriptor type of the destination binding"
                    .into(),
                vuids: &["VUID-VkCopyDescriptorSet-dstBinding-02632"],
                ..Default::default()
            }));
        }

        if dst_layout_binding.uses_immutable_samplers()
            && dst_layout_binding.descriptor_type == DescriptorType::Sampler
        {
            return Err(Box::new(ValidationError {
                problem: "the destination binding holds immutable samplers".into(),
                vuids: &["VUID-VkCopyDescriptorSet-dstBinding-02753"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    /// Copies the descriptor records into `dst_set`.
    ///
    /// # Safety
    ///
    /// - The copy must have been validated against the layout of `dst_set`.
    /// - No shader routine may be accessing either set at the same time.
    pub(crate) unsafe fn apply(&self, dst_set: &DescriptorSet) {
        let src_range = self.src_set.layout().data_range(
            self.src_binding,
            self.src_first_array_element,
            self.descriptor_count,
        );
        let dst_range = dst_set.layout().data_range(
            self.dst_binding,
            self.dst_first_array_element,
            self.descriptor_count,
        );
        assert_eq!(src_range.len(), dst_range.len());

        // The source and destination may be the same set, and the ranges may overlap.
        unsafe {
            ptr::copy(
                self.src_set.data_ptr().add(src_range.start),
                dst_set.data_ptr().add(dst_range.start),
                src_range.len(),
            )
        };
    }
}

#[cfg(test)]
mod tests {
    use super::{CopyDescriptorSet, WriteDescriptorSet};
    use crate::{
        buffer::{
            view::{BufferView, BufferViewCreateInfo},
            Buffer,
        },
        descriptor_set::{
            descriptor::{BufferDescriptor, SampledImageDescriptor, StorageImageDescriptor},
            layout::{
                DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
                DescriptorType,
            },
            DescriptorSet,
        },
        format::Format,
        image::{
            sampler::{Sampler, SamplerCreateInfo},
            view::ImageView,
            Image, ImageCreateInfo,
        },
    };
    use std::sync::Arc;

    fn layout(
        device: &Arc<crate::device::Device>,
        bindings: &[(DescriptorType, u32)],
    ) -> Arc<DescriptorSetLayout> {
        DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                bindings: bindings
                    .iter()
                    .enumerate()
                    .map(|(binding, &(ty, count))| DescriptorSetLayoutBinding {
                        descriptor_count: count,
                        ..DescriptorSetLayoutBinding::new(binding as u32, ty)
                    })
                    .collect(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn image_view(device: &Arc<crate::device::Device>) -> Arc<ImageView> {
        let image = Image::new(
            device.clone(),
            ImageCreateInfo {
                format: Format::R8G8B8A8_UNORM,
                extent: [4, 4, 1],
                ..Default::default()
            },
        )
        .unwrap();

        ImageView::new_default(image).unwrap()
    }

    #[test]
    fn write_buffer() {
        let device = device!();
        let layout = layout(&device, &[(DescriptorType::StorageBuffer, 2)]);
        let set = DescriptorSet::new(layout.clone()).unwrap();
        let buffer = Buffer::from_slice(device, &[0u32; 16]).unwrap();

        unsafe {
            set.update(
                &[WriteDescriptorSet::buffer_with_range(
                    0,
                    super::DescriptorBufferInfo {
                        buffer: buffer.clone(),
                        range: 16..48,
                    },
                )],
                &[],
            )
        }
        .unwrap();

        let offset = layout.binding_offset(0, 0);
        let descriptor = unsafe { *set.descriptor_mut::<BufferDescriptor>(offset) };
        assert_eq!(descriptor.ptr, unsafe { buffer.as_ptr().add(16) });
        assert_eq!(descriptor.size_in_bytes, 32);
        assert_eq!(descriptor.robustness_size, 48);
    }

    #[test]
    fn write_combined_image_sampler() {
        let device = device!();
        let layout = layout(&device, &[(DescriptorType::CombinedImageSampler, 1)]);
        let set = DescriptorSet::new(layout).unwrap();
        let view = image_view(&device);
        let sampler = Sampler::new(device, SamplerCreateInfo::default()).unwrap();

        unsafe {
            set.update(
                &[WriteDescriptorSet::image_view_sampler(0, view.clone(), sampler.clone())],
                &[],
            )
        }
        .unwrap();

        let descriptor = unsafe { *set.descriptor_mut::<SampledImageDescriptor>(0) };
        assert_eq!(descriptor.sampler_id, sampler.id().get());
        assert_eq!(descriptor.image_view_id, view.id().get());
        assert_eq!(descriptor.width, 4);
        assert_eq!(descriptor.texture.mipmap[0].pitch_p, [4; 4]);
    }

    #[test]
    fn sampled_image_keeps_sampler() {
        let device = device!();
        let layout = layout(
            &device,
            &[(DescriptorType::Sampler, 1), (DescriptorType::SampledImage, 1)],
        );
        let set = DescriptorSet::new(layout.clone()).unwrap();
        let view = image_view(&device);
        let sampler = Sampler::new(device, SamplerCreateInfo::default()).unwrap();

        unsafe {
            set.update(
                &[
                    WriteDescriptorSet::sampler(0, sampler.clone()),
                    WriteDescriptorSet::image_view(1, view.clone()),
                ],
                &[],
            )
        }
        .unwrap();

        let sampler_descriptor = unsafe { *set.descriptor_mut::<SampledImageDescriptor>(0) };
        assert_eq!(sampler_descriptor.sampler_id, sampler.id().get());
        assert_eq!(sampler_descriptor.image_view_id, 0);

        let image_descriptor =
            unsafe { *set.descriptor_mut::<SampledImageDescriptor>(layout.binding_offset(1, 0)) };
        assert_eq!(image_descriptor.sampler_id, 0);
        assert_eq!(image_descriptor.image_view_id, view.id().get());
    }

    #[test]
    fn write_texel_buffers() {
        let device = device!();
        let layout = layout(
            &device,
            &[
                (DescriptorType::UniformTexelBuffer, 1),
                (DescriptorType::StorageTexelBuffer, 1),
            ],
        );
        let set = DescriptorSet::new(layout.clone()).unwrap();
        let buffer = Buffer::from_slice(device, &[0u32; 8]).unwrap();
        let buffer_view = BufferView::new(
            buffer,
            BufferViewCreateInfo {
                format: Format::R32_UINT,
                range: 0..32,
                ..Default::default()
            },
        )
        .unwrap();

        unsafe {
            set.update(
                &[
                    WriteDescriptorSet::buffer_view(0, buffer_view.clone()),
                    WriteDescriptorSet::buffer_view(1, buffer_view.clone()),
                ],
                &[],
            )
        }
        .unwrap();

        let uniform = unsafe { *set.descriptor_mut::<SampledImageDescriptor>(0) };
        assert_eq!(uniform.width, 8);
        assert_eq!(uniform.image_view_id, buffer_view.id().get());
        assert_eq!(uniform.texture.mipmap[0].buffer[0], buffer_view.as_ptr().cast_const());

        let storage =
            unsafe { *set.descriptor_mut::<StorageImageDescriptor>(layout.binding_offset(1, 0)) };
        assert_eq!(storage.ptr, buffer_view.as_ptr());
        assert_eq!([storage.width, storage.height, storage.depth], [8, 1, 1]);
        assert_eq!(storage.size_in_bytes, 32);
    }

    #[test]
    fn invalid_writes() {
        let device = device!();
        let layout = layout(&device, &[(DescriptorType::StorageImage, 2)]);
        let set = DescriptorSet::new(layout).unwrap();
        let view = image_view(&device);
        let sampler = Sampler::new(device.clone(), SamplerCreateInfo::default()).unwrap();

        // Wrong type.
        assert!(unsafe { set.update(&[WriteDescriptorSet::sampler(0, sampler)], &[]) }.is_err());

        // Spills into the next binding.
        assert!(unsafe {
            set.update(
                &[WriteDescriptorSet::image_view_array(0, 1, [view.clone(), view.clone()])],
                &[],
            )
        }
        .is_err());

        // Unknown binding.
        assert!(unsafe { set.update(&[WriteDescriptorSet::image_view(3, view)], &[]) }.is_err());
    }

    #[test]
    fn copy_between_sets() {
        let device = device!();
        let layout = layout(&device, &[(DescriptorType::UniformBuffer, 2)]);
        let src = DescriptorSet::new(layout.clone()).unwrap();
        let dst = DescriptorSet::new(layout).unwrap();
        let buffer = Buffer::from_slice(device.clone(), &[0u8; 64]).unwrap();

        unsafe {
            src.update(&[WriteDescriptorSet::buffer_array(0, 1, [buffer.clone()])], &[])
        }
        .unwrap();
        unsafe {
            dst.update(
                &[],
                &[CopyDescriptorSet {
                    src_first_array_element: 1,
                    ..CopyDescriptorSet::new(src.clone())
                }],
            )
        }
        .unwrap();

        let copied = unsafe { *dst.descriptor_mut::<BufferDescriptor>(0) };
        assert_eq!(copied.ptr, buffer.as_ptr());
        assert_eq!(copied.size_in_bytes, 64);

        // The types of the bindings differ.
        let other = DescriptorSet::new(
            DescriptorSetLayout::new(
                device,
                DescriptorSetLayoutCreateInfo {
                    bindings: vec![DescriptorSetLayoutBinding::new(
                        0,
                        DescriptorType::StorageBuffer,
                    )],
                    ..Default::default()
                },
            )
            .unwrap(),
        )
        .unwrap();
        assert!(unsafe { dst.update(&[], &[CopyDescriptorSet::new(other)]) }.is_err());
    }
}
