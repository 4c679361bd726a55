use std::{ops::Deref, sync::Arc};

use ash::vk::{self, ImageCreateInfo, ImageTiling};
use gpu_allocator::{
    vulkan::{Allocation, AllocationCreateDesc},
    MemoryLocation,
};

use crate::Error;

use super::Device;

pub struct Image {
    pub(super) handle: vk::Image,
    allocation: Option<Allocation>,
    device: Arc<Device>,
}

impl Image {
    pub fn new(
        device: Arc<Device>,
        create_info: &ImageCreateInfo,
        location: MemoryLocation,
        name: &str,
    ) -> Result<Self, Error> {
        let handle = unsafe { device.inner.create_image(create_info, None) }?;
        let requirements = unsafe { device.inner.get_image_memory_requirements(handle) };
        let allocation = device
            .allocator
            .lock()
            .map_err(|_| Error::ApiResult(vk::Result::ERROR_DEVICE_LOST))?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: create_info.tiling == ImageTiling::LINEAR,
            })?;
        unsafe {
            device
                .inner
                .bind_image_memory(handle, allocation.memory(), allocation.offset())
        }?;
        Ok(Self {
            handle,
            allocation: Some(allocation),
            device,
        })
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        if let (Some(allocation), Ok(mut allocator)) =
            (self.allocation.take(), self.device.allocator.lock())
        {
            let _ = allocator.free(allocation);
        }
        unsafe { self.device.inner.destroy_image(self.handle, None) };
    }
}

impl Deref for Image {
    type Target = vk::Image;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}
