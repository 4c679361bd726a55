use std::{fmt::Debug, ops::Deref, sync::Arc};

use ash::{
    prelude::VkResult,
    vk::{self, ComputePipelineCreateInfo, FramebufferCreateFlags, FramebufferCreateInfo},
};

use super::{DerefHandle, Device, Handle, HandleWrapper};

pub struct Object<T: Handle> {
    pub(super) device: Arc<Device>,
    pub(super) handle: T,
}

impl<T: Handle + Debug> Debug for Object<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.handle)
    }
}

impl<T: Handle> HandleWrapper for Object<T> {
    type Handle = T;
}

impl<T: Handle> Drop for Object<T> {
    fn drop(&mut self) {
        self.device.destroy_handle(self.handle)
    }
}

impl<T: DerefHandle> Deref for Object<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

pub type Fence = Object<vk::Fence>;
pub type Event = Object<vk::Event>;
pub type ImageView = Object<vk::ImageView>;
pub type RenderPass = Object<vk::RenderPass>;
pub type ShaderModule = Object<vk::ShaderModule>;
pub type PipelineCache = Object<vk::PipelineCache>;
pub type Pipeline = Object<vk::Pipeline>;
pub type PipelineLayout = Object<vk::PipelineLayout>;
pub type Framebuffer = Object<vk::Framebuffer>;

impl Fence {
    pub fn wait(&self) -> VkResult<()> {
        unsafe {
            self.device
                .inner
                .wait_for_fences(&[self.handle], false, u64::MAX)
        }
    }

    pub fn reset(&self) -> VkResult<()> {
        unsafe { self.device.inner.reset_fences(&[self.handle]) }
    }
}

impl Event {
    /// Signals the event from the host.
    pub fn set(&self) -> VkResult<()> {
        unsafe { self.device.inner.set_event(self.handle) }
    }

    pub fn reset(&self) -> VkResult<()> {
        unsafe { self.device.inner.reset_event(self.handle) }
    }
}

impl PipelineCache {
    pub fn create_graphics(
        &self,
        create_infos: &[vk::GraphicsPipelineCreateInfo],
    ) -> VkResult<Vec<Pipeline>> {
        let handles = match unsafe {
            self.device
                .inner
                .create_graphics_pipelines(self.handle, create_infos, None)
        } {
            Ok(inner) => inner,
            Err((pipelines, err)) => {
                self.destroy_partial(pipelines);
                return Err(err);
            }
        };
        Ok(self.wrap(handles))
    }

    pub fn create_compute(
        &self,
        create_infos: &[ComputePipelineCreateInfo],
    ) -> VkResult<Vec<Pipeline>> {
        let handles = match unsafe {
            self.device
                .inner
                .create_compute_pipelines(self.handle, create_infos, None)
        } {
            Ok(inner) => inner,
            Err((pipelines, err)) => {
                self.destroy_partial(pipelines);
                return Err(err);
            }
        };
        Ok(self.wrap(handles))
    }

    fn destroy_partial(&self, pipelines: Vec<vk::Pipeline>) {
        for pipeline in pipelines {
            if pipeline != vk::Pipeline::null() {
                unsafe { self.device.inner.destroy_pipeline(pipeline, None) };
            }
        }
    }

    fn wrap(&self, handles: Vec<vk::Pipeline>) -> Vec<Pipeline> {
        handles
            .into_iter()
            .map(|handle| Pipeline {
                handle,
                device: self.device.clone(),
            })
            .collect()
    }
}

impl RenderPass {
    pub fn create_framebuffer(
        &self,
        flags: FramebufferCreateFlags,
        attachments: &[&ImageView],
        width: u32,
        height: u32,
    ) -> VkResult<Framebuffer> {
        let attachments: Vec<_> = attachments
            .iter()
            .map(|attachment| attachment.handle)
            .collect();
        let create_info = FramebufferCreateInfo::builder()
            .flags(flags)
            .render_pass(self.handle)
            .attachments(&attachments)
            .width(width)
            .height(height)
            .layers(1);
        let handle = unsafe { self.device.inner.create_framebuffer(&create_info, None) }?;
        Ok(Framebuffer {
            handle,
            device: self.device.clone(),
        })
    }
}
