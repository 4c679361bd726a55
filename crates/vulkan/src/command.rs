use ash::{
    prelude::VkResult,
    vk::{
        self, BufferCopy, BufferMemoryBarrier, ClearColorValue, ClearValue,
        CommandBufferAllocateInfo, CommandBufferBeginInfo, CommandBufferLevel,
        CommandBufferUsageFlags, CommandPoolResetFlags, DependencyFlags, ImageLayout,
        ImageMemoryBarrier, ImageSubresourceRange, IndexType, MemoryBarrier, PipelineBindPoint,
        PipelineStageFlags, Rect2D, RenderPassBeginInfo, ShaderStageFlags, SubpassContents,
        Viewport,
    },
};
use bytemuck::{bytes_of, Pod};

use super::{
    Buffer, DescriptorSet, Event, Framebuffer, Image, Object, Pipeline, PipelineLayout,
    RenderPass,
};

pub type CommandPool = Object<vk::CommandPool>;
pub type CommandBuffer = Object<vk::CommandBuffer>;

impl CommandPool {
    pub fn allocate(&self, level: CommandBufferLevel, count: u32) -> VkResult<Vec<CommandBuffer>> {
        let create_info = CommandBufferAllocateInfo::builder()
            .command_pool(self.handle)
            .level(level)
            .command_buffer_count(count);
        Ok(
            unsafe { self.device.inner.allocate_command_buffers(&create_info) }?
                .into_iter()
                .map(|handle| CommandBuffer {
                    handle,
                    device: self.device.clone(),
                })
                .collect(),
        )
    }

    pub fn allocate_single_primary(&self) -> VkResult<CommandBuffer> {
        Ok(self.allocate(CommandBufferLevel::PRIMARY, 1)?.remove(0))
    }

    pub fn reset(&self, flags: CommandPoolResetFlags) -> VkResult<()> {
        unsafe { self.device.inner.reset_command_pool(self.handle, flags) }
    }
}

impl CommandBuffer {
    pub fn begin(&self, flags: CommandBufferUsageFlags) -> VkResult<()> {
        let begin_info = CommandBufferBeginInfo::builder().flags(flags);
        unsafe {
            self.device
                .inner
                .begin_command_buffer(self.handle, &begin_info)
        }
    }

    pub fn end(&self) -> VkResult<()> {
        unsafe { self.device.inner.end_command_buffer(self.handle) }
    }

    pub fn begin_render_pass(
        &self,
        render_pass: &RenderPass,
        framebuffer: &Framebuffer,
        render_area: Rect2D,
        clear_values: &[ClearValue],
        contents: SubpassContents,
    ) {
        let create_info = RenderPassBeginInfo::builder()
            .render_pass(render_pass.handle)
            .framebuffer(framebuffer.handle)
            .render_area(render_area)
            .clear_values(clear_values);
        unsafe {
            self.device
                .inner
                .cmd_begin_render_pass(self.handle, &create_info, contents)
        }
    }

    pub fn end_render_pass(&self) {
        unsafe { self.device.inner.cmd_end_render_pass(self.handle) }
    }

    pub fn clear_color_image(
        &self,
        image: &Image,
        image_layout: ImageLayout,
        clear_color_value: &ClearColorValue,
        ranges: &[ImageSubresourceRange],
    ) {
        unsafe {
            self.device.inner.cmd_clear_color_image(
                self.handle,
                image.handle,
                image_layout,
                clear_color_value,
                ranges,
            )
        }
    }

    pub fn fill_buffer(&self, buffer: &Buffer, offset: u64, size: u64, data: u32) {
        unsafe {
            self.device
                .inner
                .cmd_fill_buffer(self.handle, buffer.handle, offset, size, data)
        }
    }

    pub fn copy_buffer(&self, src_buffer: &Buffer, dst_buffer: &Buffer, regions: &[BufferCopy]) {
        unsafe {
            self.device.inner.cmd_copy_buffer(
                self.handle,
                src_buffer.handle,
                dst_buffer.handle,
                regions,
            )
        }
    }

    pub fn dispatch(&self, group_count_x: u32, group_count_y: u32, group_count_z: u32) {
        unsafe {
            self.device
                .inner
                .cmd_dispatch(self.handle, group_count_x, group_count_y, group_count_z)
        }
    }

    pub fn dispatch_indirect(&self, buffer: &Buffer, offset: u64) {
        unsafe {
            self.device
                .inner
                .cmd_dispatch_indirect(self.handle, buffer.handle, offset)
        }
    }

    pub fn draw_indexed_indirect(
        &self,
        buffer: &Buffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) {
        unsafe {
            self.device.inner.cmd_draw_indexed_indirect(
                self.handle,
                buffer.handle,
                offset,
                draw_count,
                stride,
            )
        }
    }

    pub fn draw_indexed_indirect_count(
        &self,
        buffer: &Buffer,
        offset: u64,
        count_buffer: &Buffer,
        count_buffer_offset: u64,
        max_draw_count: u32,
        stride: u32,
    ) {
        unsafe {
            self.device.inner.cmd_draw_indexed_indirect_count(
                self.handle,
                buffer.handle,
                offset,
                count_buffer.handle,
                count_buffer_offset,
                max_draw_count,
                stride,
            )
        }
    }

    pub fn bind_index_buffer(&self, buffer: &Buffer, offset: u64, index_type: IndexType) {
        unsafe {
            self.device
                .inner
                .cmd_bind_index_buffer(self.handle, buffer.handle, offset, index_type)
        }
    }

    pub fn push_constants<T: Pod>(
        &self,
        layout: &PipelineLayout,
        stage_flags: ShaderStageFlags,
        offset: u32,
        constant: &T,
    ) {
        unsafe {
            self.device.inner.cmd_push_constants(
                self.handle,
                layout.handle,
                stage_flags,
                offset,
                bytes_of(constant),
            )
        }
    }

    pub fn bind_descriptor_sets(
        &self,
        pipeline_bind_point: PipelineBindPoint,
        layout: &PipelineLayout,
        first_set: u32,
        descriptor_sets: &[&DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        let descriptor_sets: Vec<_> = descriptor_sets
            .iter()
            .map(|descriptor_set| descriptor_set.handle)
            .collect();
        unsafe {
            self.device.inner.cmd_bind_descriptor_sets(
                self.handle,
                pipeline_bind_point,
                layout.handle,
                first_set,
                &descriptor_sets,
                dynamic_offsets,
            )
        }
    }

    pub fn bind_pipeline(&self, binding_point: PipelineBindPoint, pipeline: &Pipeline) {
        unsafe {
            self.device
                .inner
                .cmd_bind_pipeline(self.handle, binding_point, pipeline.handle)
        }
    }

    pub fn set_viewport(&self, first_viewport: u32, viewports: &[Viewport]) {
        unsafe {
            self.device
                .inner
                .cmd_set_viewport(self.handle, first_viewport, viewports)
        }
    }

    pub fn set_scissor(&self, first_scissor: u32, scissors: &[Rect2D]) {
        unsafe {
            self.device
                .inner
                .cmd_set_scissor(self.handle, first_scissor, scissors)
        }
    }

    pub fn pipeline_barrier(
        &self,
        src_stage_mask: PipelineStageFlags,
        dst_stage_mask: PipelineStageFlags,
        dependency_flags: DependencyFlags,
        memory_barriers: &[MemoryBarrier],
        buffer_memory_barriers: &[BufferMemoryBarrier],
        image_memory_barriers: &[ImageMemoryBarrier],
    ) {
        unsafe {
            self.device.inner.cmd_pipeline_barrier(
                self.handle,
                src_stage_mask,
                dst_stage_mask,
                dependency_flags,
                memory_barriers,
                buffer_memory_barriers,
                image_memory_barriers,
            )
        }
    }

    pub fn set_event(&self, event: &Event, stage_mask: PipelineStageFlags) {
        unsafe {
            self.device
                .inner
                .cmd_set_event(self.handle, event.handle, stage_mask)
        }
    }

    pub fn reset_event(&self, event: &Event, stage_mask: PipelineStageFlags) {
        unsafe {
            self.device
                .inner
                .cmd_reset_event(self.handle, event.handle, stage_mask)
        }
    }

    pub fn wait_events(
        &self,
        events: &[&Event],
        src_stage_mask: PipelineStageFlags,
        dst_stage_mask: PipelineStageFlags,
        memory_barriers: &[MemoryBarrier],
    ) {
        let events: Vec<_> = events.iter().map(|event| event.handle).collect();
        unsafe {
            self.device.inner.cmd_wait_events(
                self.handle,
                &events,
                src_stage_mask,
                dst_stage_mask,
                memory_barriers,
                &[],
                &[],
            )
        }
    }
}
