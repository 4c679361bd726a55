use std::{ffi::CString, fs::File, path::PathBuf, str::FromStr, sync::Arc};

use ::vulkan::Instance;
use cull::{
    gpu::GpuDevice, reference::ReferenceDevice, CullConfiguration, CullPipeline, Extent,
    FrameInput, SceneData,
};
use cull_headless::{
    error::Error,
    scene::{occluder_scene, orbit_camera},
    vulkan::best_candidate,
    HeadlessDevice,
};
use eyre::WrapErr;
use semver::Version;
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

#[derive(Clone, Copy, Debug)]
enum Backend {
    Reference,
    Vulkan,
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reference" => Ok(Self::Reference),
            "vulkan" => Ok(Self::Vulkan),
            _ => Err(Error::UnknownBackend(s.to_owned())),
        }
    }
}

fn parse_resolution(s: &str) -> Result<Extent, Error> {
    let invalid = || Error::InvalidResolution(s.to_owned());
    let (width, height) = s.split_once('x').ok_or_else(invalid)?;
    let width: u32 = width.parse().map_err(|_| invalid())?;
    let height: u32 = height.parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok(Extent::new(width, height))
}

#[derive(StructOpt)]
#[structopt(name = "cull-headless")]
struct Options {
    /// Either reference or vulkan.
    #[structopt(long, short, default_value = "reference")]
    backend: Backend,
    #[structopt(long, short, default_value = "8")]
    frames: usize,
    #[structopt(long, short, default_value = "256x192", parse(try_from_str = parse_resolution))]
    resolution: Extent,
    /// Objects per row and column behind the occluding wall.
    #[structopt(long, short, default_value = "8")]
    grid: u32,
    /// SPIR-V module of the culling shaders, required by the vulkan backend.
    #[structopt(long, env("CULL_SHADER"))]
    shader: Option<PathBuf>,
    /// JSON culling configuration.
    #[structopt(long, short)]
    config: Option<PathBuf>,
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,
    /// Enables the Khronos validation layer.
    #[structopt(long)]
    validation: bool,
}

impl Options {
    fn run(self) -> eyre::Result<()> {
        let configuration = match &self.config {
            Some(path) => CullConfiguration::load(path)?,
            None => CullConfiguration::default(),
        };
        let scene = occluder_scene(self.grid);
        info!(
            objects = scene.objects.len(),
            meshlets = scene.meshlets.len(),
            triangles = scene.triangle_count(),
            backend = ?self.backend,
            "built scene"
        );
        match self.backend {
            Backend::Reference => {
                let mut device = ReferenceDevice::new();
                self.render(&mut device, &scene, configuration)
            }
            Backend::Vulkan => {
                let shader = self.shader.as_ref().ok_or(Error::MissingShader)?;
                let code = ash::util::read_spv(
                    &mut File::open(shader)
                        .wrap_err_with(|| format!("could not open {}", shader.display()))?,
                )
                .wrap_err("could not read shader module")?;
                let version = Version::parse(env!("CARGO_PKG_VERSION"))?;
                let instance = Arc::new(Instance::new(
                    &CString::new("cull-headless")?,
                    version,
                    self.validation,
                )?);
                let candidate =
                    best_candidate(instance.physical_devices()?)?.ok_or(Error::NoSuitableDeviceFound)?;
                info!(device = %candidate.name(), "selected device");
                let mut device = GpuDevice::new(Arc::new(candidate.create()?), &code)?;
                self.render(&mut device, &scene, configuration)
            }
        }
    }

    fn render<D: HeadlessDevice>(
        &self,
        device: &mut D,
        scene: &SceneData,
        configuration: CullConfiguration,
    ) -> eyre::Result<()> {
        let mut pipeline = CullPipeline::new(device, scene, configuration)?;
        for frame in 0..self.frames {
            let output = pipeline.render(
                device,
                &FrameInput {
                    camera: orbit_camera(frame),
                    extent: self.resolution,
                },
            )?;
            let statistics = output.statistics;
            let coverage = device
                .coverage(&output.target)
                .map(|covered| covered.to_string())
                .unwrap_or_else(|| "-".to_owned());
            println!(
                "frame {:>4}  compacted {:>6}  iterations {:>3}  reocclusion {:>3}  batch draws {:>4}  meshlet draws {}  covered {}",
                frame,
                statistics.compacted,
                statistics.iterations,
                statistics.reocclusion_iterations,
                statistics.batch_draws,
                statistics.meshlet_draws,
                coverage,
            );
        }
        device.finish()
    }
}

fn main() -> eyre::Result<()> {
    stable_eyre::install()?;
    let options = Options::from_args();
    tracing_subscriber::fmt()
        .with_max_level(options.log_level)
        .init();
    options.run()
}
