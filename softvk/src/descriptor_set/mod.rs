// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Descriptor sets creation and management.
//!
//! This module is dedicated to managing descriptor sets. There are three concepts in Vulkan
//! related to descriptor sets:
//!
//! - A `DescriptorSetLayout` is a Vulkan object that describes to the Vulkan implementation the
//!   layout of a future descriptor set. When you allocate a descriptor set, you have to pass an
//!   instance of this object. This is represented with the [`DescriptorSetLayout`] type in
//!   vulkano.
//! - A `DescriptorPool` is a Vulkan object that holds the memory of descriptor sets and that can
//!   be used to allocate and free individual descriptor sets. This is represented with the
//!   [`DescriptorPool`] type in vulkano.
//! - A `DescriptorSet` contains the bindings to resources and is allocated from a pool. This is
//!   represented with the [`DescriptorSet`] type in vulkano.
//!
//! # Memory layout
//!
//! The memory of a descriptor set starts with a header of [`DESCRIPTOR_SET_HEADER_SIZE`] bytes,
//! whose first word points to the layout of the set. The descriptor data follows, with every
//! binding at the offset given by [`DescriptorSetLayout::binding_offset`]. Shader routines read
//! descriptor records straight out of this memory.

pub use self::{
    layout::{
        DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
        DescriptorType,
    },
    pool::{DescriptorPool, DescriptorPoolCreateInfo},
    update::{
        CopyDescriptorSet, DescriptorBufferInfo, WriteDescriptorSet, WriteDescriptorSetElements,
    },
};
use self::update::DescriptorResource;
use crate::{
    device::{Device, DeviceOwned},
    macros::impl_id_counter,
    memory::HostMemory,
    DeviceSize, Validated, ValidationError, VulkanError,
};
use foldhash::HashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::{mem::size_of, num::NonZero, ptr, sync::Arc};

pub mod descriptor;
pub mod layout;
pub mod pool;
pub mod update;

/// The number of bytes before the descriptor data of a set.
pub const DESCRIPTOR_SET_HEADER_SIZE: usize = 16;

/// An object that contains the bindings to the resources that shader code accesses.
#[derive(Debug)]
pub struct DescriptorSet {
    layout: Arc<DescriptorSetLayout>,
    id: NonZero<u32>,
    memory: HostMemory,
    allocation: Option<PoolAllocation>,

    // Keeps alive the objects that descriptors point into, by (binding, array element).
    resources: Mutex<HashMap<(u32, u32), SmallVec<[DescriptorResource; 2]>>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PoolAllocation {
    pub(crate) pool_id: NonZero<u32>,
    pub(crate) offset: usize,
}

impl DescriptorSet {
    /// Allocates a new `DescriptorSet` outside of any pool.
    ///
    /// The immutable samplers of the layout are written into the set, every other descriptor is
    /// zeroed.
    #[inline]
    pub fn new(
        layout: Arc<DescriptorSetLayout>,
    ) -> Result<Arc<DescriptorSet>, Validated<VulkanError>> {
        Ok(Self::allocate(layout, None)?)
    }

    pub(crate) fn allocate(
        layout: Arc<DescriptorSetLayout>,
        allocation: Option<PoolAllocation>,
    ) -> Result<Arc<DescriptorSet>, VulkanError> {
        let memory = HostMemory::new(layout.descriptor_set_allocation_size() as DeviceSize)?;

        let set = Arc::new(DescriptorSet {
            layout,
            id: Self::next_id(),
            memory,
            allocation,
            resources: Mutex::new(HashMap::default()),
        });
        set.layout.initialize(&set);

        Ok(set)
    }

    /// Returns the layout of this descriptor set.
    #[inline]
    pub fn layout(&self) -> &Arc<DescriptorSetLayout> {
        &self.layout
    }

    /// Returns a pointer to the header of the set.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.memory.as_ptr()
    }

    /// Returns a pointer to the descriptor data of the set, past the header.
    #[inline]
    pub fn data_ptr(&self) -> *mut u8 {
        // SAFETY: The memory is at least as large as the header.
        unsafe { self.memory.as_ptr().add(DESCRIPTOR_SET_HEADER_SIZE) }
    }

    /// Returns the layout pointer stored in the header of the set.
    #[inline]
    pub fn header_layout(&self) -> *const DescriptorSetLayout {
        // SAFETY: The header is written when the set is allocated and never modified.
        unsafe { self.memory.as_ptr().cast::<*const DescriptorSetLayout>().read() }
    }

    pub(crate) fn allocation(&self) -> Option<PoolAllocation> {
        self.allocation
    }

    pub(crate) unsafe fn write_header(&self, layout: &DescriptorSetLayout) {
        let layout: *const DescriptorSetLayout = layout;
        unsafe {
            self.memory
                .as_ptr()
                .cast::<*const DescriptorSetLayout>()
                .write(layout)
        };
    }

    /// Returns the descriptor record at `offset` bytes into the descriptor data.
    ///
    /// # Panics
    ///
    /// - Panics if the record is not within the descriptor data, or if `offset` is not 16-byte
    ///   aligned.
    ///
    /// # Safety
    ///
    /// - The binding at `offset` must hold records of type `T`.
    /// - No shader routine, and no other reference returned by this function, may be accessing
    ///   the record at the same time.
    pub unsafe fn descriptor_mut<T>(&self, offset: usize) -> &mut T {
        assert!(offset + size_of::<T>() <= self.layout.descriptor_set_data_size());
        assert!(offset % 16 == 0);

        unsafe { &mut *self.data_ptr().add(offset).cast::<T>() }
    }

    /// Applies descriptor writes, then descriptor copies, to the set.
    ///
    /// Every write and copy is validated before any of them is applied.
    ///
    /// # Safety
    ///
    /// - No shader routine may be accessing this set, or the source sets of `descriptor_copies`,
    ///   at the same time.
    pub unsafe fn update(
        &self,
        descriptor_writes: &[WriteDescriptorSet],
        descriptor_copies: &[CopyDescriptorSet],
    ) -> Result<(), Box<ValidationError>> {
        self.validate_update(descriptor_writes, descriptor_copies)?;

        unsafe { self.update_unchecked(descriptor_writes, descriptor_copies) };

        Ok(())
    }

    fn validate_update(
        &self,
        descriptor_writes: &[WriteDescriptorSet],
        descriptor_copies: &[CopyDescriptorSet],
    ) -> Result<(), Box<ValidationError>> {
        for (index, write) in descriptor_writes.iter().enumerate() {
            write
                .validate(&self.layout)
                .map_err(|err| err.add_context(format!("descriptor_writes[{}]", index)))?;
        }

        for (index, copy) in descriptor_copies.iter().enumerate() {
            copy.validate(&self.layout)
                .map_err(|err| err.add_context(format!("descriptor_copies[{}]", index)))?;
        }

        Ok(())
    }

    /// Applies descriptor writes, then descriptor copies, to the set without validating them.
    ///
    /// # Safety
    ///
    /// - The writes and copies must be valid for the layout of the set.
    /// - No shader routine may be accessing this set, or the source sets of `descriptor_copies`,
    ///   at the same time.
    pub unsafe fn update_unchecked(
        &self,
        descriptor_writes: &[WriteDescriptorSet],
        descriptor_copies: &[CopyDescriptorSet],
    ) {
        let mut resources = self.resources.lock();

        for write in descriptor_writes {
            unsafe { write.apply(self) };

            for index in 0..write.elements().len() {
                let key = (write.binding(), write.first_array_element() + index);
                resources.insert(key, write.elements().resources(index as usize));
            }
        }

        for copy in descriptor_copies {
            unsafe { copy.apply(self) };

            let copied: SmallVec<[_; 4]> = {
                // The source may be this set, whose resources are already locked.
                let src_resources = if ptr::eq(Arc::as_ptr(&copy.src_set), self) {
                    None
                } else {
                    Some(copy.src_set.resources.lock())
                };
                let src_resources = src_resources.as_deref().unwrap_or(&*resources);

                (0..copy.descriptor_count)
                    .map(|index| {
                        src_resources
                            .get(&(copy.src_binding, copy.src_first_array_element + index))
                            .cloned()
                    })
                    .collect()
            };

            for (index, src) in copied.into_iter().enumerate() {
                let key = (copy.dst_binding, copy.dst_first_array_element + index as u32);

                match src {
                    Some(src) => resources.insert(key, src),
                    None => resources.remove(&key),
                };
            }
        }
    }
}

unsafe impl DeviceOwned for DescriptorSet {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        self.layout.device()
    }
}

impl_id_counter!(DescriptorSet);
