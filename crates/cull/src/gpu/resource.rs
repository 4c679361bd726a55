use std::{mem::size_of, rc::Rc, sync::Arc};

use vulkan::{
    BufferCreateInfo, BufferUsageFlags, ComponentMapping, DescriptorBufferInfo,
    DescriptorImageInfo, DescriptorPool, DescriptorPoolSetup, DescriptorSet, DescriptorType,
    Device, Extent3D, Format, Framebuffer, FramebufferCreateFlags, Image, ImageAspectFlags,
    ImageCreateInfo, ImageLayout, ImageSubresourceRange, ImageTiling, ImageType, ImageUsageFlags,
    ImageView, ImageViewCreateFlags, ImageViewType, MemoryLocation, SampleCountFlags,
    WriteDescriptorSet, WHOLE_SIZE,
};

use crate::{BufferUsage, Extent};

use super::ShaderCache;

pub const COLOR_FORMAT: Format = Format::R8G8B8A8_UNORM;
pub const DEPTH_FORMAT: Format = Format::D32_SFLOAT;
pub const PYRAMID_FORMAT: Format = Format::R32_SFLOAT;

pub struct BufferInner {
    pub(super) buffer: vulkan::Buffer,
    pub(super) usage: BufferUsage,
    pub(super) len: usize,
    pub(super) name: String,
}

/// Device buffer shared between the passes and the descriptor sets that bind it.
#[derive(Clone)]
pub struct GpuBuffer(pub(super) Rc<BufferInner>);

impl GpuBuffer {
    pub(super) fn new<T>(
        device: &Arc<Device>,
        usage: BufferUsage,
        len: usize,
        name: &str,
    ) -> Result<Self, vulkan::Error> {
        let create_info = BufferCreateInfo::builder()
            .size((len * size_of::<T>()) as u64)
            .usage(usage_flags(usage));
        let buffer = device.create_buffer(&create_info, memory_location(usage), name)?;
        Ok(Self(Rc::new(BufferInner {
            buffer,
            usage,
            len,
            name: name.to_owned(),
        })))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn usage(&self) -> BufferUsage {
        self.0.usage
    }

    pub fn len(&self) -> usize {
        self.0.len
    }

    pub fn is_empty(&self) -> bool {
        self.0.len == 0
    }

    pub fn is_host_visible(&self) -> bool {
        self.0.buffer.mapped_ptr().is_some()
    }

    pub fn buffer(&self) -> &vulkan::Buffer {
        &self.0.buffer
    }

    fn info(&self) -> [DescriptorBufferInfo; 1] {
        [DescriptorBufferInfo::builder()
            .buffer(*self.0.buffer)
            .offset(0)
            .range(WHOLE_SIZE)
            .build()]
    }
}

fn usage_flags(usage: BufferUsage) -> BufferUsageFlags {
    let flags = match usage {
        BufferUsage::Constants => BufferUsageFlags::UNIFORM_BUFFER,
        BufferUsage::Scene | BufferUsage::Storage => BufferUsageFlags::STORAGE_BUFFER,
        BufferUsage::Commands => {
            BufferUsageFlags::STORAGE_BUFFER | BufferUsageFlags::INDIRECT_BUFFER
        }
        BufferUsage::Counter => {
            BufferUsageFlags::STORAGE_BUFFER
                | BufferUsageFlags::INDIRECT_BUFFER
                | BufferUsageFlags::TRANSFER_SRC
        }
        BufferUsage::Indices => BufferUsageFlags::STORAGE_BUFFER | BufferUsageFlags::INDEX_BUFFER,
        BufferUsage::ReadBack => BufferUsageFlags::empty(),
    };
    flags | BufferUsageFlags::TRANSFER_DST
}

fn memory_location(usage: BufferUsage) -> MemoryLocation {
    match usage {
        BufferUsage::Constants | BufferUsage::Scene => MemoryLocation::CpuToGpu,
        BufferUsage::ReadBack => MemoryLocation::GpuToCpu,
        BufferUsage::Storage | BufferUsage::Commands | BufferUsage::Counter | BufferUsage::Indices => {
            MemoryLocation::GpuOnly
        }
    }
}

pub struct TargetInner {
    pub(super) extent: Extent,
    pub(super) framebuffer: Framebuffer,
    pub(super) depth_view: ImageView,
    pub(super) color_view: ImageView,
    pub(super) depth: Image,
    pub(super) color: Image,
}

/// Color and depth attachments with a framebuffer compatible with both draw passes.
#[derive(Clone)]
pub struct GpuTarget(pub(super) Rc<TargetInner>);

impl GpuTarget {
    pub(super) fn new(
        device: &Arc<Device>,
        shaders: &ShaderCache,
        extent: Extent,
    ) -> Result<Self, vulkan::Error> {
        let color = create_image(
            device,
            extent,
            1,
            COLOR_FORMAT,
            ImageUsageFlags::COLOR_ATTACHMENT | ImageUsageFlags::TRANSFER_SRC,
            "target color",
        )?;
        let depth = create_image(
            device,
            extent,
            1,
            DEPTH_FORMAT,
            ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | ImageUsageFlags::SAMPLED,
            "target depth",
        )?;
        let color_view = device.create_image_view(
            ImageViewCreateFlags::empty(),
            &color,
            ImageViewType::TYPE_2D,
            COLOR_FORMAT,
            ComponentMapping::default(),
            subresource_range(ImageAspectFlags::COLOR, 0, 1),
        )?;
        let depth_view = device.create_image_view(
            ImageViewCreateFlags::empty(),
            &depth,
            ImageViewType::TYPE_2D,
            DEPTH_FORMAT,
            ComponentMapping::default(),
            subresource_range(ImageAspectFlags::DEPTH, 0, 1),
        )?;
        let framebuffer = shaders.clear_pass.create_framebuffer(
            FramebufferCreateFlags::empty(),
            &[&color_view, &depth_view],
            extent.width,
            extent.height,
        )?;
        Ok(Self(Rc::new(TargetInner {
            extent,
            framebuffer,
            depth_view,
            color_view,
            depth,
            color,
        })))
    }

    pub fn extent(&self) -> Extent {
        self.0.extent
    }

    pub fn color(&self) -> &Image {
        &self.0.color
    }
}

pub struct PyramidInner {
    pub(super) levels: u32,
    /// Sampling set bound while the culling kernels run.
    pub(super) sample_set: DescriptorSet,
    /// One set per level, reading the level above and writing the level itself.
    pub(super) build_sets: Vec<DescriptorSet>,
    pub(super) level_views: Vec<ImageView>,
    pub(super) view: ImageView,
    pub(super) image: Image,
    pub(super) target: GpuTarget,
    _pool: DescriptorPool,
}

/// Min reduced depth pyramid of one target, kept in the general layout.
#[derive(Clone)]
pub struct GpuPyramid(pub(super) Rc<PyramidInner>);

impl GpuPyramid {
    pub(super) fn new(
        device: &Arc<Device>,
        shaders: &ShaderCache,
        target: &GpuTarget,
    ) -> Result<Self, vulkan::Error> {
        let extent = target.extent();
        let levels = extent.pyramid_levels();
        let image = create_image(
            device,
            extent,
            levels,
            PYRAMID_FORMAT,
            ImageUsageFlags::SAMPLED | ImageUsageFlags::STORAGE | ImageUsageFlags::TRANSFER_DST,
            "depth pyramid",
        )?;
        let view = device.create_image_view(
            ImageViewCreateFlags::empty(),
            &image,
            ImageViewType::TYPE_2D,
            PYRAMID_FORMAT,
            ComponentMapping::default(),
            subresource_range(ImageAspectFlags::COLOR, 0, levels),
        )?;
        let level_views = (0..levels)
            .map(|level| {
                device.create_image_view(
                    ImageViewCreateFlags::empty(),
                    &image,
                    ImageViewType::TYPE_2D,
                    PYRAMID_FORMAT,
                    ComponentMapping::default(),
                    subresource_range(ImageAspectFlags::COLOR, level, 1),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pool = (DescriptorPoolSetup {
            sampled_images: 1,
            storage_images: 1,
            uniform_buffers: 0,
            storage_buffers: 0,
            sets: 1,
        } * (levels + 1))
            .create_pool(device)?;
        let sample_set = pool.allocate_single(&shaders.pyramid_layout)?;
        let build_sets = pool.allocate(&vec![&shaders.build_layout; levels as usize])?;
        let sample_info = [DescriptorImageInfo::builder()
            .image_layout(ImageLayout::GENERAL)
            .image_view(*view)
            .build()];
        let image_infos: Vec<_> = (0..levels as usize)
            .map(|level| {
                let source = if level == 0 {
                    *target.0.depth_view
                } else {
                    *level_views[level - 1]
                };
                [
                    DescriptorImageInfo::builder()
                        .image_layout(ImageLayout::GENERAL)
                        .image_view(source)
                        .build(),
                    DescriptorImageInfo::builder()
                        .image_layout(ImageLayout::GENERAL)
                        .image_view(*level_views[level])
                        .build(),
                ]
            })
            .collect();
        let mut descriptor_writes = vec![WriteDescriptorSet::builder()
            .dst_set(*sample_set)
            .dst_binding(0)
            .dst_array_element(0)
            .descriptor_type(DescriptorType::SAMPLED_IMAGE)
            .image_info(&sample_info)
            .build()];
        for (set, infos) in build_sets.iter().zip(image_infos.iter()) {
            descriptor_writes.push(
                WriteDescriptorSet::builder()
                    .dst_set(**set)
                    .dst_binding(0)
                    .dst_array_element(0)
                    .descriptor_type(DescriptorType::SAMPLED_IMAGE)
                    .image_info(&infos[0..1])
                    .build(),
            );
            descriptor_writes.push(
                WriteDescriptorSet::builder()
                    .dst_set(**set)
                    .dst_binding(1)
                    .dst_array_element(0)
                    .descriptor_type(DescriptorType::STORAGE_IMAGE)
                    .image_info(&infos[1..2])
                    .build(),
            );
        }
        device.update_descriptor_sets(&descriptor_writes, &[]);
        Ok(Self(Rc::new(PyramidInner {
            levels,
            sample_set,
            build_sets,
            level_views,
            view,
            image,
            target: target.clone(),
            _pool: pool,
        })))
    }

    pub fn level_count(&self) -> u32 {
        self.0.levels
    }

    pub fn extent(&self) -> Extent {
        self.0.target.extent()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Scene,
    Pass,
    Batch,
}

/// Descriptor set of one binding group, keeping the bound buffers alive.
pub struct GpuBindings {
    pub(super) kind: BindingKind,
    pub(super) set: DescriptorSet,
    pub(super) buffers: Vec<GpuBuffer>,
    _pool: DescriptorPool,
}

impl GpuBindings {
    /// Writes `buffers` to consecutive bindings, the first one being a uniform
    /// buffer for scene bindings.
    pub(super) fn new(
        device: &Arc<Device>,
        shaders: &ShaderCache,
        kind: BindingKind,
        buffers: Vec<GpuBuffer>,
    ) -> Result<Self, vulkan::Error> {
        let uniform_buffers = if kind == BindingKind::Scene { 1 } else { 0 };
        let pool = DescriptorPoolSetup {
            sampled_images: 0,
            storage_images: 0,
            uniform_buffers,
            storage_buffers: buffers.len() as u32 - uniform_buffers,
            sets: 1,
        }
        .create_pool(device)?;
        let set = pool.allocate_single(shaders.set_layout(kind))?;
        let infos: Vec<_> = buffers.iter().map(GpuBuffer::info).collect();
        let descriptor_writes: Vec<_> = infos
            .iter()
            .enumerate()
            .map(|(binding, info)| {
                let descriptor_type = if binding == 0 && kind == BindingKind::Scene {
                    DescriptorType::UNIFORM_BUFFER
                } else {
                    DescriptorType::STORAGE_BUFFER
                };
                WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(binding as u32)
                    .dst_array_element(0)
                    .descriptor_type(descriptor_type)
                    .buffer_info(info)
                    .build()
            })
            .collect();
        device.update_descriptor_sets(&descriptor_writes, &[]);
        Ok(Self {
            kind,
            set,
            buffers,
            _pool: pool,
        })
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    /// Indirect dispatch arguments of a pass.
    pub(super) fn dispatch(&self) -> &GpuBuffer {
        assert_eq!(self.kind, BindingKind::Pass, "expected pass bindings");
        &self.buffers[3]
    }
}

fn create_image(
    device: &Arc<Device>,
    extent: Extent,
    mip_levels: u32,
    format: Format,
    usage: ImageUsageFlags,
    name: &str,
) -> Result<Image, vulkan::Error> {
    let create_info = ImageCreateInfo::builder()
        .extent(Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .tiling(ImageTiling::OPTIMAL)
        .image_type(ImageType::TYPE_2D)
        .usage(usage)
        .initial_layout(ImageLayout::UNDEFINED)
        .mip_levels(mip_levels)
        .array_layers(1)
        .samples(SampleCountFlags::TYPE_1)
        .format(format);
    device.create_image(&create_info, MemoryLocation::GpuOnly, name)
}

pub(super) fn subresource_range(
    aspect_mask: ImageAspectFlags,
    base_mip_level: u32,
    level_count: u32,
) -> ImageSubresourceRange {
    ImageSubresourceRange::builder()
        .aspect_mask(aspect_mask)
        .base_mip_level(base_mip_level)
        .level_count(level_count)
        .base_array_layer(0)
        .layer_count(1)
        .build()
}
