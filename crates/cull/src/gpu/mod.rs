//! Vulkan backend of the culling passes.
//!
//! Every pass records into the command buffer of the current frame slot. The
//! only host synchronization inside a frame is [`CullDevice::read_back`], which
//! submits what was recorded so far, waits for it and continues recording into
//! the same command buffer.

mod shader;
mod resource;

use std::{mem::size_of, rc::Rc, sync::Arc};

use cull_gpu::{
    pyramid_extent, DispatchCommand, DrawCommand, PushConstants, MAX_BATCH_ITERATIONS,
    MESHLET_GROUP_SIZE, MESH_GROUP_SIZE, PREPARE_GROUP_SIZE, PYRAMID_GROUP_SIZE,
};
use eyre::eyre;
use tracing::{debug, trace};
use vulkan::{
    AccessFlags, BufferCopy, BufferCreateInfo, BufferUsageFlags, ClearColorValue,
    ClearDepthStencilValue, ClearValue, CommandBuffer, CommandBufferUsageFlags, CommandPool,
    CommandPoolCreateFlags, CommandPoolResetFlags, DependencyFlags, Device, Event, Extent2D,
    Fence, FenceCreateFlags, Image, ImageAspectFlags, ImageLayout, ImageMemoryBarrier, IndexType,
    MemoryBarrier, MemoryLocation, Offset2D, Pipeline, PipelineBindPoint, PipelineLayout,
    PipelineStageFlags, Pod, Rect2D, ShaderStageFlags, SubmitInfo, SubpassContents, Viewport,
    WHOLE_SIZE,
};

pub use shader::*;
pub use resource::*;

use resource::subresource_range;

use crate::{
    Barrier, BindingGroup, BufferUsage, CullDevice, Extent, KernelBindings, LoadOp,
    FRAMES_IN_FLIGHT,
};

struct FrameSlot {
    command_buffer: CommandBuffer,
    fence: Fence,
    command_pool: CommandPool,
}

impl FrameSlot {
    fn new(device: &Arc<Device>, fence_flags: FenceCreateFlags) -> eyre::Result<Self> {
        let command_pool = device.create_command_pool(
            CommandPoolCreateFlags::TRANSIENT,
            device.main_queue_family_index(),
        )?;
        let command_buffer = command_pool.allocate_single_primary()?;
        let fence = device.create_fence(fence_flags)?;
        Ok(Self {
            command_buffer,
            fence,
            command_pool,
        })
    }

    fn begin(&self) -> eyre::Result<()> {
        self.command_pool.reset(CommandPoolResetFlags::empty())?;
        self.command_buffer
            .begin(CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        Ok(())
    }

    fn submit(&self, device: &Device) -> eyre::Result<()> {
        self.command_buffer.end()?;
        let command_buffers = [*self.command_buffer];
        let submits = [SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .build()];
        device.submit(&submits, &self.fence)?;
        Ok(())
    }

    fn wait(&self) -> eyre::Result<()> {
        self.fence.wait()?;
        self.fence.reset()?;
        Ok(())
    }
}

pub struct GpuDevice {
    frames: Vec<FrameSlot>,
    setup: FrameSlot,
    recording: Option<usize>,
    shaders: ShaderCache,
    device: Arc<Device>,
}

impl GpuDevice {
    /// Creates the kernels from the SPIR-V words of the culling shaders.
    pub fn new(device: Arc<Device>, code: &[u32]) -> eyre::Result<Self> {
        let shaders = ShaderCache::new(&device, code)?;
        let frames = (0..FRAMES_IN_FLIGHT)
            .map(|_| FrameSlot::new(&device, FenceCreateFlags::SIGNALED))
            .collect::<Result<_, _>>()?;
        let setup = FrameSlot::new(&device, FenceCreateFlags::empty())?;
        debug!("created culling kernels");
        Ok(Self {
            frames,
            setup,
            recording: None,
            shaders,
            device,
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn shaders(&self) -> &ShaderCache {
        &self.shaders
    }

    pub fn wait_idle(&self) -> eyre::Result<()> {
        Ok(self.device.wait_idle()?)
    }

    /// Records `f` into a separate command buffer and waits for it to finish.
    fn immediate(&self, f: impl FnOnce(&CommandBuffer)) -> eyre::Result<()> {
        self.setup.begin()?;
        f(&self.setup.command_buffer);
        self.setup.submit(&self.device)?;
        self.setup.wait()
    }

    fn command_buffer(&self) -> &CommandBuffer {
        match self.recording {
            Some(slot) => &self.frames[slot].command_buffer,
            None => panic!("commands recorded outside of a frame"),
        }
    }

    fn bind_kernel(
        &self,
        pipeline: &Pipeline,
        bindings: &KernelBindings<'_, Self>,
        batch: Option<&GpuBindings>,
    ) {
        let command_buffer = self.command_buffer();
        let layout = &self.shaders.cull_layout;
        command_buffer.bind_pipeline(PipelineBindPoint::COMPUTE, pipeline);
        command_buffer.bind_descriptor_sets(
            PipelineBindPoint::COMPUTE,
            layout,
            0,
            &[&bindings.scene.set, &bindings.pass.set],
            &[],
        );
        if let Some(batch) = batch {
            command_buffer.bind_descriptor_sets(
                PipelineBindPoint::COMPUTE,
                layout,
                2,
                &[&batch.set],
                &[],
            );
        }
        command_buffer.bind_descriptor_sets(
            PipelineBindPoint::COMPUTE,
            layout,
            3,
            &[&bindings.pyramid.0.sample_set],
            &[],
        );
    }

    fn push_constants(&self, layout: &PipelineLayout, constants: PushConstants) {
        self.command_buffer()
            .push_constants(layout, ShaderStageFlags::COMPUTE, 0, &constants);
    }

    fn begin_draw(&self, target: &GpuTarget, load: LoadOp, scene: &GpuBindings) {
        let (render_pass, color) = match load {
            LoadOp::Clear(color) => (&self.shaders.clear_pass, color),
            LoadOp::Load => (&self.shaders.load_pass, [0.0; 4]),
        };
        let extent = Extent2D {
            width: target.extent().width,
            height: target.extent().height,
        };
        let clear_values = [
            ClearValue {
                color: ClearColorValue { float32: color },
            },
            ClearValue {
                depth_stencil: ClearDepthStencilValue {
                    depth: 0.0,
                    stencil: 0,
                },
            },
        ];
        let command_buffer = self.command_buffer();
        command_buffer.begin_render_pass(
            render_pass,
            &target.0.framebuffer,
            Rect2D {
                offset: Offset2D::default(),
                extent,
            },
            &clear_values,
            SubpassContents::INLINE,
        );
        command_buffer.bind_pipeline(PipelineBindPoint::GRAPHICS, &self.shaders.draw);
        command_buffer.set_viewport(
            0,
            &[Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        command_buffer.set_scissor(
            0,
            &[Rect2D {
                offset: Offset2D::default(),
                extent,
            }],
        );
        command_buffer.bind_descriptor_sets(
            PipelineBindPoint::GRAPHICS,
            &self.shaders.draw_layout,
            0,
            &[&scene.set],
            &[],
        );
    }

    fn memory_barrier(
        &self,
        src_stage_mask: PipelineStageFlags,
        dst_stage_mask: PipelineStageFlags,
        src_access_mask: AccessFlags,
        dst_access_mask: AccessFlags,
    ) {
        let memory_barriers = [MemoryBarrier::builder()
            .src_access_mask(src_access_mask)
            .dst_access_mask(dst_access_mask)
            .build()];
        self.command_buffer().pipeline_barrier(
            src_stage_mask,
            dst_stage_mask,
            DependencyFlags::empty(),
            &memory_barriers,
            &[],
            &[],
        );
    }
}

impl Drop for GpuDevice {
    fn drop(&mut self) {
        let _ = self.device.wait_idle();
    }
}

/// Stages that consume a batch, after which its ring slot may be refilled.
fn draw_stages() -> PipelineStageFlags {
    PipelineStageFlags::DRAW_INDIRECT | PipelineStageFlags::VERTEX_INPUT
}

fn barrier_masks(
    barrier: Barrier,
) -> (PipelineStageFlags, PipelineStageFlags, AccessFlags, AccessFlags) {
    match barrier {
        Barrier::TransferToCompute => (
            PipelineStageFlags::TRANSFER,
            PipelineStageFlags::COMPUTE_SHADER,
            AccessFlags::TRANSFER_WRITE,
            AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE,
        ),
        Barrier::ComputeToCompute | Barrier::PyramidToCompute => (
            PipelineStageFlags::COMPUTE_SHADER,
            PipelineStageFlags::COMPUTE_SHADER,
            AccessFlags::SHADER_WRITE,
            AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE,
        ),
        Barrier::ComputeToIndirect => (
            PipelineStageFlags::COMPUTE_SHADER,
            PipelineStageFlags::DRAW_INDIRECT | PipelineStageFlags::TRANSFER,
            AccessFlags::SHADER_WRITE,
            AccessFlags::INDIRECT_COMMAND_READ | AccessFlags::TRANSFER_READ,
        ),
        Barrier::ComputeToDraw => (
            PipelineStageFlags::COMPUTE_SHADER,
            PipelineStageFlags::DRAW_INDIRECT
                | PipelineStageFlags::VERTEX_INPUT
                | PipelineStageFlags::VERTEX_SHADER,
            AccessFlags::SHADER_WRITE,
            AccessFlags::INDIRECT_COMMAND_READ | AccessFlags::INDEX_READ | AccessFlags::SHADER_READ,
        ),
        Barrier::DrawToCompute => (
            PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | PipelineStageFlags::LATE_FRAGMENT_TESTS
                | PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            PipelineStageFlags::COMPUTE_SHADER,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE | AccessFlags::COLOR_ATTACHMENT_WRITE,
            AccessFlags::SHADER_READ,
        ),
    }
}

fn group_count(count: u32, group_size: u32) -> u32 {
    (count + group_size - 1) / group_size
}

/// Moves every subresource of `image` from the undefined to the general layout.
fn to_general(
    command_buffer: &CommandBuffer,
    image: &Image,
    aspect_mask: ImageAspectFlags,
    level_count: u32,
) {
    let image_memory_barriers = [ImageMemoryBarrier::builder()
        .image(**image)
        .src_access_mask(AccessFlags::empty())
        .dst_access_mask(AccessFlags::TRANSFER_WRITE | AccessFlags::SHADER_READ)
        .old_layout(ImageLayout::UNDEFINED)
        .new_layout(ImageLayout::GENERAL)
        .subresource_range(subresource_range(aspect_mask, 0, level_count))
        .build()];
    command_buffer.pipeline_barrier(
        PipelineStageFlags::TOP_OF_PIPE,
        PipelineStageFlags::TRANSFER | PipelineStageFlags::COMPUTE_SHADER,
        DependencyFlags::empty(),
        &[],
        &[],
        &image_memory_barriers,
    );
}

impl CullDevice for GpuDevice {
    type Buffer = GpuBuffer;
    type Target = GpuTarget;
    type Pyramid = GpuPyramid;
    type Event = Event;
    type Bindings = GpuBindings;

    fn create_buffer<T: Pod>(
        &mut self,
        usage: BufferUsage,
        len: usize,
        name: &str,
    ) -> eyre::Result<GpuBuffer> {
        let buffer = GpuBuffer::new::<T>(&self.device, usage, len, name)?;
        self.immediate(|command_buffer| {
            command_buffer.fill_buffer(buffer.buffer(), 0, WHOLE_SIZE, 0)
        })?;
        Ok(buffer)
    }

    /// Host visible buffers are written in place, the others through a staging
    /// copy that is submitted immediately.
    fn write_buffer<T: Pod>(&mut self, buffer: &GpuBuffer, data: &[T]) -> eyre::Result<()> {
        if data.len() > buffer.len() {
            eyre::bail!(
                "{} elements do not fit into buffer {} of {}",
                data.len(),
                buffer.name(),
                buffer.len()
            );
        }
        if data.is_empty() {
            return Ok(());
        }
        if buffer.is_host_visible() {
            buffer.buffer().write(data)?;
            return Ok(());
        }
        let size = (data.len() * size_of::<T>()) as u64;
        let create_info = BufferCreateInfo::builder()
            .size(size)
            .usage(BufferUsageFlags::TRANSFER_SRC);
        let staging = self.device.create_buffer(
            &create_info,
            MemoryLocation::CpuToGpu,
            &format!("{} staging", buffer.name()),
        )?;
        staging.write(data)?;
        self.immediate(|command_buffer| {
            command_buffer.copy_buffer(
                &staging,
                buffer.buffer(),
                &[BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size,
                }],
            )
        })
    }

    fn create_target(&mut self, extent: Extent) -> eyre::Result<GpuTarget> {
        self.device.wait_idle()?;
        let target = GpuTarget::new(&self.device, &self.shaders, extent)?;
        self.immediate(|command_buffer| {
            to_general(command_buffer, &target.0.color, ImageAspectFlags::COLOR, 1);
            to_general(command_buffer, &target.0.depth, ImageAspectFlags::DEPTH, 1);
        })?;
        Ok(target)
    }

    fn create_pyramid(&mut self, target: &GpuTarget) -> eyre::Result<GpuPyramid> {
        let pyramid = GpuPyramid::new(&self.device, &self.shaders, target)?;
        let levels = pyramid.level_count();
        self.immediate(|command_buffer| {
            to_general(command_buffer, &pyramid.0.image, ImageAspectFlags::COLOR, levels);
            command_buffer.clear_color_image(
                &pyramid.0.image,
                ImageLayout::GENERAL,
                &ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 0.0],
                },
                &[subresource_range(ImageAspectFlags::COLOR, 0, levels)],
            );
        })?;
        Ok(pyramid)
    }

    fn create_event(&mut self) -> eyre::Result<Event> {
        Ok(self.device.create_event(true)?)
    }

    fn create_bindings(&mut self, group: BindingGroup<'_, Self>) -> eyre::Result<GpuBindings> {
        let (kind, buffers) = match group {
            BindingGroup::Scene {
                constants,
                objects,
                meshlets,
                vertices,
                triangles,
                object_visibility,
                meshlet_visibility,
                triangle_visibility,
            } => (
                BindingKind::Scene,
                vec![
                    constants,
                    objects,
                    meshlets,
                    vertices,
                    triangles,
                    object_visibility,
                    meshlet_visibility,
                    triangle_visibility,
                ],
            ),
            BindingGroup::Pass {
                commands,
                counter,
                flags,
                dispatch,
            } => (BindingKind::Pass, vec![commands, counter, flags, dispatch]),
            BindingGroup::Batch {
                indices,
                triangles,
                draw,
            } => (BindingKind::Batch, vec![indices, triangles, draw]),
        };
        let buffers = buffers.into_iter().cloned().collect();
        Ok(GpuBindings::new(&self.device, &self.shaders, kind, buffers)?)
    }

    fn begin_frame(&mut self, frame: usize) -> eyre::Result<()> {
        if let Some(current) = self.recording {
            eyre::bail!("frame {} begun while slot {} is recorded", frame, current);
        }
        let slot = frame % FRAMES_IN_FLIGHT;
        let frame_slot = &self.frames[slot];
        frame_slot.wait()?;
        frame_slot.begin()?;
        self.recording = Some(slot);
        Ok(())
    }

    fn end_frame(&mut self) -> eyre::Result<()> {
        let slot = self
            .recording
            .take()
            .ok_or_else(|| eyre!("no frame is recorded"))?;
        self.frames[slot].submit(&self.device)
    }

    fn fill_buffer(&mut self, buffer: &GpuBuffer, value: u32) {
        self.command_buffer()
            .fill_buffer(buffer.buffer(), 0, WHOLE_SIZE, value);
    }

    fn barrier(&mut self, barrier: Barrier) {
        let (src_stage_mask, dst_stage_mask, src_access_mask, dst_access_mask) =
            barrier_masks(barrier);
        self.memory_barrier(
            src_stage_mask,
            dst_stage_mask,
            src_access_mask,
            dst_access_mask,
        );
    }

    fn dispatch_mesh_cull(&mut self, bindings: &KernelBindings<'_, Self>, first: u32, count: u32) {
        if count == 0 {
            return;
        }
        self.bind_kernel(&self.shaders.mesh[bindings.variant], bindings, None);
        self.push_constants(
            &self.shaders.cull_layout,
            PushConstants {
                first,
                count,
                ..Default::default()
            },
        );
        self.command_buffer()
            .dispatch(group_count(count, MESH_GROUP_SIZE), 1, 1);
    }

    fn dispatch_meshlet_cull(
        &mut self,
        bindings: &KernelBindings<'_, Self>,
        first: u32,
        count: u32,
    ) {
        if count == 0 {
            return;
        }
        self.bind_kernel(&self.shaders.meshlet[bindings.variant], bindings, None);
        self.push_constants(
            &self.shaders.cull_layout,
            PushConstants {
                first,
                count,
                ..Default::default()
            },
        );
        self.command_buffer()
            .dispatch(group_count(count, MESHLET_GROUP_SIZE), 1, 1);
    }

    fn dispatch_prepare_dispatch(&mut self, pass: &GpuBindings) {
        let command_buffer = self.command_buffer();
        command_buffer.bind_pipeline(PipelineBindPoint::COMPUTE, &self.shaders.prepare_dispatch);
        command_buffer.bind_descriptor_sets(
            PipelineBindPoint::COMPUTE,
            &self.shaders.cull_layout,
            1,
            &[&pass.set],
            &[],
        );
        command_buffer.dispatch(group_count(MAX_BATCH_ITERATIONS, PREPARE_GROUP_SIZE), 1, 1);
    }

    fn read_back(&mut self, counter: &GpuBuffer, staging: &GpuBuffer) -> eyre::Result<u32> {
        let slot = self
            .recording
            .ok_or_else(|| eyre!("read back outside of a frame"))?;
        self.memory_barrier(
            PipelineStageFlags::COMPUTE_SHADER,
            PipelineStageFlags::TRANSFER,
            AccessFlags::SHADER_WRITE,
            AccessFlags::TRANSFER_READ,
        );
        self.command_buffer().copy_buffer(
            counter.buffer(),
            staging.buffer(),
            &[BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: size_of::<u32>() as u64,
            }],
        );
        self.memory_barrier(
            PipelineStageFlags::TRANSFER,
            PipelineStageFlags::HOST,
            AccessFlags::TRANSFER_WRITE,
            AccessFlags::HOST_READ,
        );
        let frame_slot = &self.frames[slot];
        frame_slot.submit(&self.device)?;
        frame_slot.wait()?;
        frame_slot.begin()?;
        let count = staging.buffer().read::<u32>(1)?[0];
        trace!(buffer = counter.name(), count, "read back");
        Ok(count)
    }

    fn dispatch_triangle_cull(
        &mut self,
        bindings: &KernelBindings<'_, Self>,
        batch: &GpuBindings,
        iteration: u32,
    ) {
        self.bind_kernel(
            &self.shaders.triangle[bindings.variant],
            bindings,
            Some(batch),
        );
        self.push_constants(
            &self.shaders.cull_layout,
            PushConstants {
                iteration,
                ..Default::default()
            },
        );
        self.command_buffer().dispatch_indirect(
            bindings.pass.dispatch().buffer(),
            (iteration as usize * size_of::<DispatchCommand>()) as u64,
        );
    }

    fn dispatch_prepare_draw(&mut self, batch: &GpuBindings) {
        let command_buffer = self.command_buffer();
        command_buffer.bind_pipeline(PipelineBindPoint::COMPUTE, &self.shaders.prepare_draw);
        command_buffer.bind_descriptor_sets(
            PipelineBindPoint::COMPUTE,
            &self.shaders.cull_layout,
            2,
            &[&batch.set],
            &[],
        );
        command_buffer.dispatch(1, 1, 1);
    }

    fn wait_event(&mut self, event: &Event) {
        let memory_barriers = [MemoryBarrier::builder()
            .src_access_mask(AccessFlags::INDIRECT_COMMAND_READ | AccessFlags::INDEX_READ)
            .dst_access_mask(AccessFlags::TRANSFER_WRITE | AccessFlags::SHADER_WRITE)
            .build()];
        self.command_buffer().wait_events(
            &[event],
            PipelineStageFlags::HOST | draw_stages(),
            PipelineStageFlags::TRANSFER | PipelineStageFlags::COMPUTE_SHADER,
            &memory_barriers,
        );
    }

    fn reset_event(&mut self, event: &Event) {
        self.command_buffer().reset_event(event, draw_stages());
    }

    fn signal_event(&mut self, event: &Event) {
        self.command_buffer().set_event(event, draw_stages());
    }

    fn draw_batch(
        &mut self,
        target: &GpuTarget,
        load: LoadOp,
        scene: &GpuBindings,
        indices: &GpuBuffer,
        draw: &GpuBuffer,
    ) {
        self.begin_draw(target, load, scene);
        let command_buffer = self.command_buffer();
        command_buffer.bind_index_buffer(indices.buffer(), 0, IndexType::UINT32);
        command_buffer.draw_indexed_indirect(
            draw.buffer(),
            0,
            1,
            size_of::<DrawCommand>() as u32,
        );
        command_buffer.end_render_pass();
    }

    fn draw_meshlets(
        &mut self,
        target: &GpuTarget,
        load: LoadOp,
        scene: &GpuBindings,
        indices: &GpuBuffer,
        commands: &GpuBuffer,
        counter: &GpuBuffer,
        max_draws: u32,
    ) {
        self.begin_draw(target, load, scene);
        let command_buffer = self.command_buffer();
        command_buffer.bind_index_buffer(indices.buffer(), 0, IndexType::UINT32);
        command_buffer.draw_indexed_indirect_count(
            commands.buffer(),
            0,
            counter.buffer(),
            0,
            max_draws,
            size_of::<DrawCommand>() as u32,
        );
        command_buffer.end_render_pass();
    }

    fn clear_target(&mut self, target: &GpuTarget, color: [f32; 4]) {
        let extent = target.extent();
        let clear_values = [
            ClearValue {
                color: ClearColorValue { float32: color },
            },
            ClearValue {
                depth_stencil: ClearDepthStencilValue {
                    depth: 0.0,
                    stencil: 0,
                },
            },
        ];
        let command_buffer = self.command_buffer();
        command_buffer.begin_render_pass(
            &self.shaders.clear_pass,
            &target.0.framebuffer,
            Rect2D {
                offset: Offset2D::default(),
                extent: Extent2D {
                    width: extent.width,
                    height: extent.height,
                },
            },
            &clear_values,
            SubpassContents::INLINE,
        );
        command_buffer.end_render_pass();
    }

    fn build_pyramid(&mut self, target: &GpuTarget, pyramid: &GpuPyramid) {
        assert!(
            Rc::ptr_eq(&target.0, &pyramid.0.target.0),
            "pyramid built from a target it was not created for"
        );
        let extent = target.extent();
        self.command_buffer()
            .bind_pipeline(PipelineBindPoint::COMPUTE, &self.shaders.depth_pyramid);
        for level in 0..pyramid.level_count() {
            if level > 0 {
                self.memory_barrier(
                    PipelineStageFlags::COMPUTE_SHADER,
                    PipelineStageFlags::COMPUTE_SHADER,
                    AccessFlags::SHADER_WRITE,
                    AccessFlags::SHADER_READ,
                );
            }
            self.command_buffer().bind_descriptor_sets(
                PipelineBindPoint::COMPUTE,
                &self.shaders.pyramid_build_layout,
                0,
                &[&pyramid.0.build_sets[level as usize]],
                &[],
            );
            self.push_constants(
                &self.shaders.pyramid_build_layout,
                PushConstants {
                    level,
                    ..Default::default()
                },
            );
            let (width, height) = pyramid_extent(extent.width, extent.height, level);
            self.command_buffer().dispatch(
                group_count(width, PYRAMID_GROUP_SIZE),
                group_count(height, PYRAMID_GROUP_SIZE),
                1,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_count_rounds_up() {
        assert_eq!(group_count(0, 64), 0);
        assert_eq!(group_count(1, 64), 1);
        assert_eq!(group_count(64, 64), 1);
        assert_eq!(group_count(65, 64), 2);
    }

    #[test]
    fn barriers_order_writes_before_reads() {
        for barrier in [
            Barrier::TransferToCompute,
            Barrier::ComputeToCompute,
            Barrier::ComputeToIndirect,
            Barrier::ComputeToDraw,
            Barrier::DrawToCompute,
            Barrier::PyramidToCompute,
        ]
        .iter()
        {
            let (src_stage_mask, dst_stage_mask, src_access_mask, dst_access_mask) =
                barrier_masks(*barrier);
            assert!(!src_stage_mask.is_empty(), "{:?}", barrier);
            assert!(!dst_stage_mask.is_empty(), "{:?}", barrier);
            assert!(!src_access_mask.is_empty(), "{:?}", barrier);
            assert!(!dst_access_mask.is_empty(), "{:?}", barrier);
        }
        let (_, dst_stage_mask, _, dst_access_mask) = barrier_masks(Barrier::ComputeToIndirect);
        assert!(dst_stage_mask.contains(PipelineStageFlags::DRAW_INDIRECT));
        assert!(dst_access_mask.contains(AccessFlags::INDIRECT_COMMAND_READ));
    }
}
