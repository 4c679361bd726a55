use std::{
    ops::{Add, Mul},
    sync::Arc,
};

use ash::{
    prelude::VkResult,
    vk::{
        self, DescriptorPoolCreateFlags, DescriptorPoolSize, DescriptorSetAllocateInfo,
        DescriptorType,
    },
};

use super::{Device, Object};

pub type DescriptorSetLayout = Object<vk::DescriptorSetLayout>;
pub type DescriptorSet = Object<vk::DescriptorSet>;
pub type DescriptorPool = Object<vk::DescriptorPool>;

impl DescriptorPool {
    pub fn allocate(&self, set_layouts: &[&DescriptorSetLayout]) -> VkResult<Vec<DescriptorSet>> {
        let set_layouts: Vec<_> = set_layouts
            .iter()
            .map(|set_layout| set_layout.handle)
            .collect();
        let create_info = DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.handle)
            .set_layouts(&set_layouts);
        Ok(
            unsafe { self.device.inner.allocate_descriptor_sets(&create_info) }?
                .into_iter()
                .map(|handle| DescriptorSet {
                    handle,
                    device: self.device.clone(),
                })
                .collect(),
        )
    }

    pub fn allocate_single(&self, set_layout: &DescriptorSetLayout) -> VkResult<DescriptorSet> {
        Ok(self.allocate(&[set_layout])?.remove(0))
    }

    /// Returns every set allocated from this pool.
    pub fn reset(&self) -> VkResult<()> {
        unsafe {
            self.device
                .inner
                .reset_descriptor_pool(self.handle, vk::DescriptorPoolResetFlags::empty())
        }
    }
}

#[derive(Default, Clone, Copy, Debug)]
pub struct DescriptorPoolSetup {
    pub sampled_images: u32,
    pub storage_images: u32,
    pub uniform_buffers: u32,
    pub storage_buffers: u32,
    pub sets: u32,
}

impl DescriptorPoolSetup {
    pub fn create_pool(&self, device: &Arc<Device>) -> VkResult<DescriptorPool> {
        let pool_sizes: Vec<_> = [
            (DescriptorType::SAMPLED_IMAGE, self.sampled_images),
            (DescriptorType::STORAGE_IMAGE, self.storage_images),
            (DescriptorType::UNIFORM_BUFFER, self.uniform_buffers),
            (DescriptorType::STORAGE_BUFFER, self.storage_buffers),
        ]
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(ty, count)| {
            DescriptorPoolSize::builder()
                .ty(*ty)
                .descriptor_count(*count)
                .build()
        })
        .collect();
        device.create_descriptor_pool(DescriptorPoolCreateFlags::empty(), &pool_sizes, self.sets)
    }
}

impl Add for DescriptorPoolSetup {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            sampled_images: self.sampled_images + rhs.sampled_images,
            storage_images: self.storage_images + rhs.storage_images,
            uniform_buffers: self.uniform_buffers + rhs.uniform_buffers,
            storage_buffers: self.storage_buffers + rhs.storage_buffers,
            sets: self.sets + rhs.sets,
        }
    }
}

impl Mul<u32> for DescriptorPoolSetup {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self::Output {
        Self {
            sampled_images: self.sampled_images * rhs,
            storage_images: self.storage_images * rhs,
            uniform_buffers: self.uniform_buffers * rhs,
            storage_buffers: self.storage_buffers * rhs,
            sets: self.sets * rhs,
        }
    }
}
