pub mod error;
pub mod scene;
pub mod vulkan;

use cull::{gpu::GpuDevice, reference::ReferenceDevice, CullDevice};

/// Backend the headless driver can render with.
pub trait HeadlessDevice: CullDevice {
    /// Waits until no recorded work still uses resources about to be dropped.
    fn finish(&mut self) -> eyre::Result<()>;

    /// Number of target texels covered by geometry, if the backend can inspect them.
    fn coverage(&self, target: &Self::Target) -> Option<usize>;
}

impl HeadlessDevice for ReferenceDevice {
    fn finish(&mut self) -> eyre::Result<()> {
        Ok(())
    }

    fn coverage(&self, target: &Self::Target) -> Option<usize> {
        Some(target.covered())
    }
}

impl HeadlessDevice for GpuDevice {
    fn finish(&mut self) -> eyre::Result<()> {
        self.wait_idle()
    }

    fn coverage(&self, _: &Self::Target) -> Option<usize> {
        None
    }
}
