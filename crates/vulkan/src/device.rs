use std::{
    ffi::CStr,
    ops::Deref,
    sync::{Arc, Mutex},
};

use ash::{
    prelude::VkResult,
    vk::{
        BufferCreateInfo, CommandPoolCreateFlags, CommandPoolCreateInfo, ComponentMapping,
        CopyDescriptorSet, DescriptorPoolCreateFlags, DescriptorPoolCreateInfo,
        DescriptorPoolSize, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateFlags,
        DescriptorSetLayoutCreateInfo, EventCreateFlags, EventCreateInfo, FenceCreateFlags,
        FenceCreateInfo, Format, ImageCreateInfo, ImageSubresourceRange, ImageViewCreateFlags,
        ImageViewCreateInfo, ImageViewType, MappedMemoryRange, PipelineCacheCreateFlags,
        PipelineCacheCreateInfo, PipelineLayoutCreateFlags, PipelineLayoutCreateInfo,
        PushConstantRange, Queue, RenderPassCreateInfo, ShaderModuleCreateFlags,
        ShaderModuleCreateInfo, SubmitInfo, WriteDescriptorSet,
    },
};

use gpu_allocator::{
    vulkan::{Allocator, AllocatorCreateDesc},
    MemoryLocation,
};

use super::{
    Buffer, CommandPool, DescriptorPool, DescriptorSetLayout, Error, Event, Fence, Handle, Image,
    ImageView, Instance, PhysicalDevice, PhysicalDeviceFeatures, PipelineCache, PipelineLayout,
    RenderPass, ShaderModule,
};

pub struct Device {
    pub(super) main_queue: DeviceQueue,
    pub(super) allocator: Mutex<Allocator>,
    pub(super) inner: OwnedDevice,
    pub(super) non_coherent_atom_size: u64,
    pub(super) instance: Arc<Instance>,
}

impl Device {
    pub(super) fn new(
        physical_device: PhysicalDevice,
        inner: ash::Device,
        configuration: DeviceConfiguration,
    ) -> Result<Self, Error> {
        let main_queue = DeviceQueue {
            handle: unsafe { inner.get_device_queue(configuration.main_queue_family_index, 0) },
            family_index: configuration.main_queue_family_index,
        };
        let inner = OwnedDevice(inner);
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: physical_device.instance.inner.clone(),
            device: inner.0.clone(),
            physical_device: physical_device.handle,
            debug_settings: Default::default(),
            buffer_device_address: false,
        })?;
        let non_coherent_atom_size = physical_device
            .properties()
            .vulkan_10
            .properties
            .limits
            .non_coherent_atom_size;
        Ok(Self {
            main_queue,
            allocator: Mutex::new(allocator),
            inner,
            non_coherent_atom_size,
            instance: physical_device.instance,
        })
    }

    pub(super) fn destroy_handle<T: Handle>(&self, handle: T) {
        unsafe { handle.destroy(&self.inner) }
    }

    pub fn submit(&self, submits: &[SubmitInfo], fence: &Fence) -> VkResult<()> {
        unsafe {
            self.inner
                .queue_submit(self.main_queue.handle, submits, fence.handle)
        }
    }

    pub fn main_queue_family_index(&self) -> u32 {
        self.main_queue.family_index
    }

    pub fn create_command_pool(
        self: &Arc<Self>,
        flags: CommandPoolCreateFlags,
        queue_family_index: u32,
    ) -> VkResult<CommandPool> {
        let create_info = CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(queue_family_index);
        let handle = unsafe { self.inner.create_command_pool(&create_info, None) }?;
        Ok(CommandPool {
            handle,
            device: self.clone(),
        })
    }

    pub fn create_fence(self: &Arc<Self>, flags: FenceCreateFlags) -> VkResult<Fence> {
        let create_info = FenceCreateInfo::builder().flags(flags);
        let handle = unsafe { self.inner.create_fence(&create_info, None) }?;
        Ok(Fence {
            handle,
            device: self.clone(),
        })
    }

    /// Creates an event for split barriers, signaled from the host if `signaled` is set.
    pub fn create_event(self: &Arc<Self>, signaled: bool) -> VkResult<Event> {
        let create_info = EventCreateInfo::builder().flags(EventCreateFlags::empty());
        let handle = unsafe { self.inner.create_event(&create_info, None) }?;
        let event = Event {
            handle,
            device: self.clone(),
        };
        if signaled {
            event.set()?;
        }
        Ok(event)
    }

    pub fn create_descriptor_set_layout(
        self: &Arc<Self>,
        flags: DescriptorSetLayoutCreateFlags,
        bindings: &[DescriptorSetLayoutBinding],
    ) -> VkResult<DescriptorSetLayout> {
        let create_info = DescriptorSetLayoutCreateInfo::builder()
            .flags(flags)
            .bindings(bindings);
        let handle = unsafe { self.inner.create_descriptor_set_layout(&create_info, None) }?;
        Ok(DescriptorSetLayout {
            handle,
            device: self.clone(),
        })
    }

    pub fn create_descriptor_pool(
        self: &Arc<Self>,
        flags: DescriptorPoolCreateFlags,
        pool_sizes: &[DescriptorPoolSize],
        max_sets: u32,
    ) -> VkResult<DescriptorPool> {
        let create_info = DescriptorPoolCreateInfo::builder()
            .flags(flags)
            .pool_sizes(pool_sizes)
            .max_sets(max_sets);
        let handle = unsafe { self.inner.create_descriptor_pool(&create_info, None) }?;
        Ok(DescriptorPool {
            handle,
            device: self.clone(),
        })
    }

    pub fn create_pipeline_layout(
        self: &Arc<Self>,
        flags: PipelineLayoutCreateFlags,
        set_layouts: &[&DescriptorSetLayout],
        push_constant_ranges: &[PushConstantRange],
    ) -> VkResult<PipelineLayout> {
        let set_layouts: Vec<_> = set_layouts
            .iter()
            .map(|set_layout| set_layout.handle)
            .collect();
        let create_info = PipelineLayoutCreateInfo::builder()
            .flags(flags)
            .set_layouts(&set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let handle = unsafe { self.inner.create_pipeline_layout(&create_info, None) }?;
        Ok(PipelineLayout {
            handle,
            device: self.clone(),
        })
    }

    pub fn create_buffer(
        self: &Arc<Self>,
        create_info: &BufferCreateInfo,
        location: MemoryLocation,
        name: &str,
    ) -> Result<Buffer, Error> {
        Buffer::new(self.clone(), create_info, location, name)
    }

    pub fn create_image(
        self: &Arc<Self>,
        create_info: &ImageCreateInfo,
        location: MemoryLocation,
        name: &str,
    ) -> Result<Image, Error> {
        Image::new(self.clone(), create_info, location, name)
    }

    pub fn create_image_view(
        self: &Arc<Self>,
        flags: ImageViewCreateFlags,
        image: &Image,
        view_type: ImageViewType,
        format: Format,
        components: ComponentMapping,
        subresource_range: ImageSubresourceRange,
    ) -> VkResult<ImageView> {
        let create_info = ImageViewCreateInfo::builder()
            .flags(flags)
            .image(image.handle)
            .view_type(view_type)
            .format(format)
            .components(components)
            .subresource_range(subresource_range);
        let handle = unsafe { self.inner.create_image_view(&create_info, None) }?;
        Ok(ImageView {
            handle,
            device: self.clone(),
        })
    }

    pub fn create_render_pass(
        self: &Arc<Self>,
        create_info: &RenderPassCreateInfo,
    ) -> VkResult<RenderPass> {
        let handle = unsafe { self.inner.create_render_pass(create_info, None) }?;
        Ok(RenderPass {
            handle,
            device: self.clone(),
        })
    }

    pub fn create_shader_module(
        self: &Arc<Self>,
        flags: ShaderModuleCreateFlags,
        code: &[u32],
    ) -> VkResult<ShaderModule> {
        let create_info = ShaderModuleCreateInfo::builder().flags(flags).code(code);
        let handle = unsafe { self.inner.create_shader_module(&create_info, None) }?;
        Ok(ShaderModule {
            handle,
            device: self.clone(),
        })
    }

    pub fn create_pipeline_cache(
        self: &Arc<Self>,
        flags: PipelineCacheCreateFlags,
        initial_data: Option<&[u8]>,
    ) -> VkResult<PipelineCache> {
        let create_info = if let Some(initial_data) = initial_data {
            PipelineCacheCreateInfo::builder().initial_data(initial_data)
        } else {
            PipelineCacheCreateInfo::builder()
        }
        .flags(flags);
        let handle = unsafe { self.inner.create_pipeline_cache(&create_info, None) }?;
        Ok(PipelineCache {
            handle,
            device: self.clone(),
        })
    }

    pub fn flush_mapped_memory_ranges(&self, ranges: &[MappedMemoryRange]) -> VkResult<()> {
        unsafe { self.inner.flush_mapped_memory_ranges(ranges) }
    }

    pub fn invalidate_mapped_memory_ranges(&self, ranges: &[MappedMemoryRange]) -> VkResult<()> {
        unsafe { self.inner.invalidate_mapped_memory_ranges(ranges) }
    }

    pub fn update_descriptor_sets(
        &self,
        descriptor_writes: &[WriteDescriptorSet],
        descriptor_copies: &[CopyDescriptorSet],
    ) {
        unsafe {
            self.inner
                .update_descriptor_sets(descriptor_writes, descriptor_copies)
        }
    }

    pub fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.inner.device_wait_idle() }
    }
}

pub struct DeviceConfiguration {
    pub extension_names: Vec<&'static CStr>,
    pub features: PhysicalDeviceFeatures,
    pub main_queue_family_index: u32,
}

pub(super) struct DeviceQueue {
    pub(super) handle: Queue,
    family_index: u32,
}

pub struct OwnedDevice(ash::Device);

impl Deref for OwnedDevice {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Drop for OwnedDevice {
    fn drop(&mut self) {
        unsafe { self.0.destroy_device(None) }
    }
}
