use tracing::info;

use crate::{previous_frame, Barrier, Cache, CullDevice, Extent, PerFrame};

/// Which of the two pyramids of a frame slot is rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PyramidKind {
    /// Built from the depth of the first cull phase, tested by the triangle reocclusion.
    Main,
    /// Built from the final depth of a frame, tested by the next frame and the mesh reocclusion.
    Reocclusion,
}

/// Render target and depth pyramids of one frame slot.
pub struct Surfaces<D: CullDevice> {
    pub target: D::Target,
    pub main: D::Pyramid,
    pub reocclusion: D::Pyramid,
}

impl<D: CullDevice> Surfaces<D> {
    pub fn pyramid(&self, kind: PyramidKind) -> &D::Pyramid {
        match kind {
            PyramidKind::Main => &self.main,
            PyramidKind::Reocclusion => &self.reocclusion,
        }
    }
}

/// Hierarchical depth of every frame slot, recreated when the render extent changes.
pub struct HiZ<D: CullDevice> {
    surfaces: Cache<Extent, PerFrame<Surfaces<D>>>,
}

impl<D: CullDevice> HiZ<D> {
    pub fn new() -> Self {
        Self {
            surfaces: Cache::default(),
        }
    }

    pub fn prepare(&mut self, device: &mut D, extent: Extent) -> eyre::Result<()> {
        self.surfaces.try_get(extent, || {
            info!(
                width = extent.width,
                height = extent.height,
                levels = extent.pyramid_levels(),
                "creating render targets and depth pyramids"
            );
            PerFrame::new(|_| {
                let target = device.create_target(extent)?;
                let main = device.create_pyramid(&target)?;
                let reocclusion = device.create_pyramid(&target)?;
                Ok::<_, eyre::Report>(Surfaces {
                    target,
                    main,
                    reocclusion,
                })
            })
        })?;
        Ok(())
    }

    pub fn surfaces(&self, frame: usize) -> &Surfaces<D> {
        match self.surfaces.current() {
            Some(surfaces) => &surfaces[frame],
            None => panic!("depth pyramids used before they were prepared"),
        }
    }

    /// Pyramid left behind by the frame before `frame`.
    pub fn previous(&self, frame: usize) -> &D::Pyramid {
        &self.surfaces(previous_frame(frame)).reocclusion
    }

    /// Pyramid holding the final depth of `frame` once it is recorded.
    pub fn resource(&self, frame: usize) -> &D::Pyramid {
        &self.surfaces(frame).reocclusion
    }

    pub fn rebuild(&self, device: &mut D, frame: usize, kind: PyramidKind) {
        let surfaces = self.surfaces(frame);
        device.barrier(Barrier::DrawToCompute);
        device.build_pyramid(&surfaces.target, surfaces.pyramid(kind));
        device.barrier(Barrier::PyramidToCompute);
    }
}

impl<D: CullDevice> Default for HiZ<D> {
    fn default() -> Self {
        Self::new()
    }
}
