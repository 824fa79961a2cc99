// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! A pool from which descriptor sets are allocated.
//!
//! The pool has a byte budget computed from its creation parameters: one header per set, plus the
//! descriptors of every type it may hold. Every allocated set takes a contiguous run of
//! [`DescriptorSetLayout::descriptor_set_allocation_size`] bytes of that budget, chosen first-fit.
//! Freeing individual sets can fragment the budget, so that an allocation fails even though
//! enough bytes are free in total.

use super::{
    layout::{DescriptorSetLayout, DescriptorType},
    DescriptorSet, PoolAllocation, DESCRIPTOR_SET_HEADER_SIZE,
};
use crate::{
    device::{Device, DeviceOwned},
    macros::impl_id_counter,
    Validated, ValidationError, VulkanError,
};
use foldhash::HashMap;
use log::debug;
use parking_lot::Mutex;
use std::{collections::BTreeMap, num::NonZero, sync::Arc};

/// Pool that descriptor sets are allocated from.
#[derive(Debug)]
pub struct DescriptorPool {
    device: Arc<Device>,
    id: NonZero<u32>,

    max_sets: u32,
    pool_sizes: HashMap<DescriptorType, u32>,
    size: usize,
    state: Mutex<DescriptorPoolState>,
}

#[derive(Debug, Default)]
struct DescriptorPoolState {
    // Offset to size of every live allocation.
    allocations: BTreeMap<usize, usize>,
    allocated_bytes: usize,
}

impl DescriptorPool {
    /// Creates a new `DescriptorPool`.
    ///
    /// # Panics
    ///
    /// - Panics if `create_info.pool_sizes` contains a descriptor type that descriptor sets cannot
    ///   hold.
    pub fn new(
        device: Arc<Device>,
        create_info: DescriptorPoolCreateInfo,
    ) -> Result<Arc<DescriptorPool>, Box<ValidationError>> {
        create_info
            .validate()
            .map_err(|err| err.add_context("create_info"))?;

        let DescriptorPoolCreateInfo {
            max_sets,
            pool_sizes,
            _ne: _,
        } = create_info;

        let size = max_sets as usize * DESCRIPTOR_SET_HEADER_SIZE
            + pool_sizes
                .iter()
                .map(|(&ty, &count)| count as usize * DescriptorSetLayout::descriptor_size(ty))
                .sum::<usize>();

        let pool = DescriptorPool {
            device,
            id: Self::next_id(),
            max_sets,
            pool_sizes,
            size,
            state: Mutex::new(DescriptorPoolState::default()),
        };

        debug!(
            "created descriptor pool {} for {} sets, {} bytes",
            pool.id, pool.max_sets, pool.size,
        );

        Ok(Arc::new(pool))
    }

    /// Returns the maximum number of sets that can be allocated from the pool.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    /// Returns the number of descriptors of each type that the pool was created for.
    #[inline]
    pub fn pool_sizes(&self) -> &HashMap<DescriptorType, u32> {
        &self.pool_sizes
    }

    /// Returns the byte budget of the pool.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the number of sets currently allocated.
    #[inline]
    pub fn allocated_set_count(&self) -> usize {
        self.state.lock().allocations.len()
    }

    /// Allocates a descriptor set with the given layout.
    ///
    /// Returns [`VulkanError::FragmentedPool`] if enough bytes are free in total but not in one
    /// run, and [`VulkanError::OutOfPoolMemory`] if not enough bytes are free, or if `max_sets`
    /// sets are already allocated.
    pub fn allocate(
        &self,
        layout: Arc<DescriptorSetLayout>,
    ) -> Result<Arc<DescriptorSet>, Validated<VulkanError>> {
        if self.device != *layout.device() {
            return Err(Box::new(ValidationError {
                context: "layout".into(),
                problem: "was not created from the same device as the pool".into(),
                vuids: &["VUID-VkDescriptorSetAllocateInfo-commonparent"],
            })
            .into());
        }

        let size = layout.descriptor_set_allocation_size();
        let mut state = self.state.lock();

        if state.allocations.len() >= self.max_sets as usize {
            return Err(VulkanError::OutOfPoolMemory.into());
        }

        let offset = match self.find_free_range(&state, size) {
            Some(offset) => offset,
            None if self.size - state.allocated_bytes >= size => {
                return Err(VulkanError::FragmentedPool.into());
            }
            None => return Err(VulkanError::OutOfPoolMemory.into()),
        };

        let set = DescriptorSet::allocate(
            layout,
            Some(PoolAllocation {
                pool_id: self.id,
                offset,
            }),
        )?;

        state.allocations.insert(offset, size);
        state.allocated_bytes += size;

        Ok(set)
    }

    fn find_free_range(&self, state: &DescriptorPoolState, size: usize) -> Option<usize> {
        let mut start = 0;

        for (&offset, &allocation_size) in &state.allocations {
            if offset - start >= size {
                return Some(start);
            }

            start = offset + allocation_size;
        }

        (self.size - start >= size).then_some(start)
    }

    /// Returns the budget of a set to the pool.
    ///
    /// # Safety
    ///
    /// - `set` must have been allocated from this pool since it was last reset, and must not have
    ///   been freed already.
    /// - `set` must not be used by shader routines afterwards.
    pub unsafe fn free(&self, set: &DescriptorSet) -> Result<(), Box<ValidationError>> {
        let allocation = match set.allocation() {
            Some(allocation) if allocation.pool_id == self.id => allocation,
            _ => {
                return Err(Box::new(ValidationError {
                    context: "set".into(),
                    problem: "was not allocated from this pool".into(),
                    vuids: &["VUID-vkFreeDescriptorSets-pDescriptorSets-parent"],
                }));
            }
        };

        let mut state = self.state.lock();

        if let Some(size) = state.allocations.remove(&allocation.offset) {
            state.allocated_bytes -= size;
        }

        Ok(())
    }

    /// Returns the budget of every set to the pool.
    ///
    /// # Safety
    ///
    /// - None of the sets allocated from the pool may be used by shader routines afterwards.
    pub unsafe fn reset(&self) {
        let mut state = self.state.lock();
        state.allocations.clear();
        state.allocated_bytes = 0;
    }
}

unsafe impl DeviceOwned for DescriptorPool {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl_id_counter!(DescriptorPool);

/// Parameters to create a new `DescriptorPool`.
#[derive(Clone, Debug)]
pub struct DescriptorPoolCreateInfo {
    /// The maximum number of descriptor sets that can be allocated from the pool.
    ///
    /// The default value is `0`, which must be overridden.
    pub max_sets: u32,

    /// The number of descriptors of each type to allocate for the pool.
    ///
    /// The default value is empty, which must be overridden.
    pub pool_sizes: HashMap<DescriptorType, u32>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DescriptorPoolCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            max_sets: 0,
            pool_sizes: HashMap::default(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl DescriptorPoolCreateInfo {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            max_sets,
            ref pool_sizes,
            _ne: _,
        } = self;

        if max_sets == 0 {
            return Err(Box::new(ValidationError {
                context: "max_sets".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkDescriptorPoolCreateInfo-maxSets-00301"],
            }));
        }

        if pool_sizes.is_empty() {
            return Err(Box::new(ValidationError {
                context: "pool_sizes".into(),
                problem: "is empty".into(),
                ..Default::default()
            }));
        }

        for (&descriptor_type, &pool_size) in pool_sizes.iter() {
            if pool_size == 0 {
                return Err(Box::new(ValidationError {
                    context: format!("pool_sizes[DescriptorType::{:?}]", descriptor_type).into(),
                    problem: "is zero".into(),
                    vuids: &["VUID-VkDescriptorPoolSize-descriptorCount-00302"],
                }));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DescriptorPool, DescriptorPoolCreateInfo};
    use crate::{
        descriptor_set::{
            layout::{
                DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
                DescriptorType,
            },
            DESCRIPTOR_SET_HEADER_SIZE,
        },
        Validated, VulkanError,
    };
    use foldhash::HashMap;
    use std::sync::Arc;

    fn buffer_layout(
        device: &Arc<crate::device::Device>,
        count: u32,
    ) -> Arc<DescriptorSetLayout> {
        DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                bindings: vec![DescriptorSetLayoutBinding {
                    descriptor_count: count,
                    ..DescriptorSetLayoutBinding::new(0, DescriptorType::UniformBuffer)
                }],
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn pool(
        device: &Arc<crate::device::Device>,
        max_sets: u32,
        buffers: u32,
    ) -> Arc<DescriptorPool> {
        DescriptorPool::new(
            device.clone(),
            DescriptorPoolCreateInfo {
                max_sets,
                pool_sizes: HashMap::from_iter([(DescriptorType::UniformBuffer, buffers)]),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn pool_size() {
        let device = device!();
        let pool = pool(&device, 3, 4);
        let buffer_size = DescriptorSetLayout::descriptor_size(DescriptorType::UniformBuffer);
        assert_eq!(pool.size(), 3 * DESCRIPTOR_SET_HEADER_SIZE + 4 * buffer_size);
    }

    #[test]
    fn allocate_and_free() {
        let device = device!();
        let pool = pool(&device, 2, 2);
        let layout = buffer_layout(&device, 1);

        let a = pool.allocate(layout.clone()).unwrap();
        let b = pool.allocate(layout.clone()).unwrap();
        assert_eq!(pool.allocated_set_count(), 2);

        // Only two sets may be allocated.
        assert!(matches!(
            pool.allocate(layout.clone()),
            Err(Validated::Error(VulkanError::OutOfPoolMemory)),
        ));

        unsafe { pool.free(&a) }.unwrap();
        assert_eq!(pool.allocated_set_count(), 1);
        pool.allocate(layout).unwrap();

        unsafe { pool.reset() };
        assert_eq!(pool.allocated_set_count(), 0);
        drop(b);
    }

    #[test]
    fn out_of_pool_memory() {
        let device = device!();
        let pool = pool(&device, 1, 2);

        assert!(matches!(
            pool.allocate(buffer_layout(&device, 3)),
            Err(Validated::Error(VulkanError::OutOfPoolMemory)),
        ));
    }

    #[test]
    fn fragmented_pool() {
        let device = device!();
        let pool = pool(&device, 3, 3);
        let small = buffer_layout(&device, 1);

        // Three sets of one buffer fill the pool. Freeing the first and the last leaves two
        // separate gaps.
        let a = pool.allocate(small.clone()).unwrap();
        let _b = pool.allocate(small.clone()).unwrap();
        let c = pool.allocate(small).unwrap();
        unsafe {
            pool.free(&a).unwrap();
            pool.free(&c).unwrap();
        }

        // One header and two buffers fit in the total free space, but not in either gap.
        assert!(matches!(
            pool.allocate(buffer_layout(&device, 2)),
            Err(Validated::Error(VulkanError::FragmentedPool)),
        ));
    }

    #[test]
    fn free_from_other_pool() {
        let device = device!();
        let layout = buffer_layout(&device, 1);
        let pool_a = pool(&device, 1, 1);
        let pool_b = pool(&device, 1, 1);

        let set = pool_a.allocate(layout).unwrap();
        assert!(unsafe { pool_b.free(&set) }.is_err());
    }

    #[test]
    fn invalid_create_info() {
        let device = device!();
        assert!(DescriptorPool::new(device.clone(), DescriptorPoolCreateInfo::default()).is_err());
        assert!(DescriptorPool::new(
            device,
            DescriptorPoolCreateInfo {
                max_sets: 1,
                pool_sizes: HashMap::from_iter([(DescriptorType::Sampler, 0)]),
                ..Default::default()
            },
        )
        .is_err());
    }
}
