mod buffer;
mod chain;
mod command;
mod descriptor;
mod device;
mod error;
mod handle;
mod image;
mod instance;
mod object;
mod physical_device;

use std::{ffi::CStr, os::raw::c_char};

use ash::vk;

pub use buffer::*;
pub use command::*;
pub use descriptor::*;
pub use device::*;
pub use error::*;
pub use handle::*;
pub use image::*;
pub use instance::*;
pub use object::*;
pub use physical_device::*;

pub use ash::{
    prelude::VkResult,
    vk::{
        AccessFlags, AttachmentDescription, AttachmentLoadOp, AttachmentReference,
        AttachmentStoreOp, BufferCopy, BufferCreateInfo, BufferUsageFlags, ClearColorValue,
        ClearDepthStencilValue, ClearValue, ColorComponentFlags, CommandBufferUsageFlags,
        CommandPoolCreateFlags, CommandPoolResetFlags, CompareOp, ComponentMapping,
        ComputePipelineCreateInfo, CullModeFlags, DependencyFlags, DescriptorBufferInfo,
        DescriptorImageInfo, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateFlags,
        DescriptorType, DispatchIndirectCommand, DrawIndexedIndirectCommand, DynamicState,
        ExtensionProperties, Extent2D, Extent3D, FenceCreateFlags, Format, FormatFeatureFlags,
        FramebufferCreateFlags, FrontFace, GraphicsPipelineCreateInfo, ImageAspectFlags,
        ImageCreateInfo, ImageLayout, ImageMemoryBarrier, ImageSubresourceRange, ImageTiling,
        ImageType, ImageUsageFlags, ImageViewCreateFlags, ImageViewType, IndexType,
        KhrPortabilitySubsetFn, MemoryBarrier, Offset2D, PhysicalDeviceType, PipelineBindPoint,
        PipelineCacheCreateFlags, PipelineColorBlendAttachmentState,
        PipelineColorBlendStateCreateInfo, PipelineDepthStencilStateCreateInfo,
        PipelineDynamicStateCreateInfo, PipelineInputAssemblyStateCreateInfo,
        PipelineLayoutCreateFlags, PipelineMultisampleStateCreateInfo,
        PipelineRasterizationStateCreateInfo, PipelineShaderStageCreateInfo, PipelineStageFlags,
        PipelineVertexInputStateCreateInfo, PipelineViewportStateCreateInfo, PolygonMode,
        PrimitiveTopology, PushConstantRange, QueueFamilyProperties, QueueFlags, Rect2D,
        RenderPassCreateInfo, SampleCountFlags, ShaderModuleCreateFlags, ShaderStageFlags,
        SpecializationInfo, SpecializationMapEntry, SubmitInfo, SubpassContents,
        SubpassDependency, SubpassDescription, Viewport, WriteDescriptorSet, SUBPASS_EXTERNAL,
        WHOLE_SIZE,
    },
};

pub type PhysicalDeviceHandle = vk::PhysicalDevice;

pub use gpu_allocator::MemoryLocation;

pub use bytemuck::{bytes_of, cast_slice, Pod, Zeroable};

pub type ApiResult = vk::Result;

pub fn contains_extension(extensions: &[ExtensionProperties], extension_name: &CStr) -> bool {
    extensions
        .iter()
        .any(|extension| extension_name == unsafe { to_cstr(&extension.extension_name) })
}

unsafe fn to_cstr(data: &[c_char]) -> &CStr {
    CStr::from_ptr(data.as_ptr())
}
