use cull::{
    glam::{Mat4, Vec3},
    reference::{Command, Pyramid, ReferenceDevice, Target},
    Barrier, Camera, CullConfiguration, CullPipeline, CullVariant, Extent, FrameInput,
    FrameStatistics, LoadOp, MeshData, Mode, SceneBuilder, SceneData, DRAW_PASS, HIZ_PASS,
    STATISTICS_PASS,
};
use cull_gpu::{iteration_count, BATCH_COMMAND_CAPACITY, MAX_INDICES, TRUE};
use rand::{rngs::StdRng, Rng, SeedableRng};

const EXTENT: Extent = Extent {
    width: 64,
    height: 64,
};

fn input() -> FrameInput {
    FrameInput {
        camera: Camera::looking_down_z(Vec3::ZERO),
        extent: EXTENT,
    }
}

fn two_phase() -> CullConfiguration {
    CullConfiguration::default()
}

fn single() -> CullConfiguration {
    CullConfiguration {
        mode: Mode::Single,
        ..CullConfiguration::default()
    }
}

fn quad_scene() -> SceneData {
    let mut builder = SceneBuilder::new();
    let quad = builder.add_mesh(&MeshData::quad(1.0));
    builder.add_object(quad, Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));
    builder.build()
}

/// A wall at distance 5 hiding a sphere at distance 20.
fn occluded_scene() -> SceneData {
    let mut builder = SceneBuilder::new();
    let wall = builder.add_mesh(&MeshData::quad(3.0));
    let sphere = builder.add_mesh(&MeshData::uv_sphere(1.0, 16, 8));
    builder.add_object(wall, Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));
    builder.add_object(sphere, Mat4::from_translation(Vec3::new(0.0, 0.0, -20.0)));
    builder.build()
}

fn quad_grid(columns: u32, rows: u32) -> SceneData {
    let mut builder = SceneBuilder::new();
    let quad = builder.add_mesh(&MeshData::quad(0.2));
    for row in 0..rows {
        for column in 0..columns {
            let x = (column as f32 - (columns - 1) as f32 / 2.0) * 0.9;
            let y = (row as f32 - (rows - 1) as f32 / 2.0) * 0.9;
            builder.add_object(quad, Mat4::from_translation(Vec3::new(x, y, -10.0)));
        }
    }
    builder.build()
}

fn random_scene(rng: &mut StdRng, objects: usize) -> SceneData {
    let mut builder = SceneBuilder::new();
    let meshes = [
        builder.add_mesh(&MeshData::cube(0.5)),
        builder.add_mesh(&MeshData::uv_sphere(0.5, 12, 6)),
        builder.add_mesh(&MeshData::quad(0.75)),
    ];
    for _ in 0..objects {
        let mesh = meshes[rng.gen_range(0..meshes.len())];
        let translation = Vec3::new(
            rng.gen_range(-15.0..15.0),
            rng.gen_range(-15.0..15.0),
            rng.gen_range(-40.0..5.0),
        );
        let transform = Mat4::from_translation(translation)
            * Mat4::from_rotation_y(rng.gen_range(0.0..6.28))
            * Mat4::from_scale(Vec3::splat(rng.gen_range(0.5..2.0)));
        builder.add_object(mesh, transform);
    }
    builder.build()
}

fn visibility(device: &ReferenceDevice, pipeline: &CullPipeline<ReferenceDevice>) -> Vec<u32> {
    device.read_buffer(pipeline.mesh().visibility.buffer())
}

/// Commands recorded before the first pyramid build of a frame.
fn first_phase(commands: &[Command]) -> &[Command] {
    let end = commands
        .iter()
        .position(|command| *command == Command::BuildPyramid)
        .unwrap_or(commands.len());
    &commands[..end]
}

#[test]
fn unoccluded_quad_is_drawn_by_one_batch() {
    let mut device = ReferenceDevice::new();
    let scene = quad_scene();
    assert_eq!(scene.meshlets.len(), 1);
    let mut pipeline = CullPipeline::new(&mut device, &scene, two_phase()).unwrap();
    device.take_commands();
    let output = pipeline.render(&mut device, &input()).unwrap();
    assert_eq!(output.statistics.compacted, 1);
    assert_eq!(output.statistics.iterations, 1);

    let commands = device.take_commands();
    let first = first_phase(&commands);
    assert!(first.contains(&Command::ReadBack { count: 1 }));
    assert!(first.contains(&Command::PrepareDraw { triangles: 2 }));
    let draws: Vec<_> = first
        .iter()
        .filter_map(|command| match command {
            Command::DrawBatch { load, index_count } => Some((*load, *index_count)),
            _ => None,
        })
        .collect();
    assert_eq!(draws, vec![(LoadOp::Clear([0.0, 0.0, 0.0, 1.0]), 6)]);

    let triangles = device.read_buffer::<u32>(pipeline.triangle().visibility.buffer());
    assert_eq!(triangles, vec![TRUE, TRUE]);
    assert_eq!(visibility(&device, &pipeline), vec![TRUE]);
    assert!(output.target.covered() > 0);
    assert_eq!(device.drawn_triangles(0), 2);
}

#[test]
fn occluded_object_is_never_drawn_after_the_first_frame() {
    let mut device = ReferenceDevice::new();
    let scene = occluded_scene();
    let mut pipeline = CullPipeline::new(&mut device, &scene, two_phase()).unwrap();

    pipeline.render(&mut device, &input()).unwrap();
    assert!(device.drawn_triangles(1) > 0);

    device.reset_statistics();
    device.take_commands();
    let output = pipeline.render(&mut device, &input()).unwrap();
    assert_eq!(visibility(&device, &pipeline), vec![TRUE, 0]);
    assert_eq!(device.drawn_triangles(1), 0);
    assert!(device.drawn_triangles(0) > 0);
    assert_eq!(output.statistics.compacted, 1);

    let commands = device.take_commands();
    let reocclusion_draws: Vec<_> = commands
        .iter()
        .filter_map(|command| match command {
            Command::DrawMeshlets { draws, .. } => Some(*draws),
            _ => None,
        })
        .collect();
    assert_eq!(reocclusion_draws, vec![0]);
}

#[test]
fn occluded_object_stays_hidden_in_single_mode() {
    let mut device = ReferenceDevice::new();
    let scene = occluded_scene();
    let mut pipeline = CullPipeline::new(&mut device, &scene, single()).unwrap();
    for _ in 0..2 {
        pipeline.render(&mut device, &input()).unwrap();
    }
    device.reset_statistics();
    let output = pipeline.render(&mut device, &input()).unwrap();
    assert_eq!(device.drawn_triangles(1), 0);
    assert_eq!(output.statistics.reocclusion_iterations, 0);
    let variants: Vec<_> = device
        .commands()
        .iter()
        .filter_map(|command| match command {
            Command::MeshCull { variant, .. } | Command::MeshletCull { variant, .. } => {
                Some(*variant)
            }
            _ => None,
        })
        .collect();
    assert!(variants.iter().all(|variant| *variant == CullVariant::Single));
}

#[test]
fn nothing_visible_clears_without_drawing() {
    let mut device = ReferenceDevice::new();
    let scene = occluded_scene();
    let mut pipeline = CullPipeline::new(&mut device, &scene, single()).unwrap();
    let mut camera = Camera::looking_down_z(Vec3::ZERO);
    camera.yaw = std::f32::consts::PI;
    device.take_commands();
    let output = pipeline
        .render(
            &mut device,
            &FrameInput {
                camera,
                extent: EXTENT,
            },
        )
        .unwrap();
    assert_eq!(
        output.statistics,
        FrameStatistics {
            frame: 0,
            compacted: 0,
            iterations: 0,
            reocclusion_iterations: 0,
            batch_draws: 0,
            meshlet_draws: 0,
        }
    );
    let commands = device.take_commands();
    assert!(commands.contains(&Command::ClearTarget));
    assert!(!commands.iter().any(|command| matches!(
        command,
        Command::DrawBatch { .. } | Command::TriangleCull { .. }
    )));
    assert_eq!(output.target.covered(), 0);
    assert_eq!(output.target.color(0, 0), [0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn nothing_visible_in_two_phase_mode_loads_an_empty_meshlet_draw() {
    let mut device = ReferenceDevice::new();
    let scene = occluded_scene();
    let mut pipeline = CullPipeline::new(&mut device, &scene, two_phase()).unwrap();
    let mut camera = Camera::looking_down_z(Vec3::ZERO);
    camera.yaw = std::f32::consts::PI;
    device.take_commands();
    let output = pipeline
        .render(
            &mut device,
            &FrameInput {
                camera,
                extent: EXTENT,
            },
        )
        .unwrap();
    assert_eq!(
        output.statistics,
        FrameStatistics {
            frame: 0,
            compacted: 0,
            iterations: 0,
            reocclusion_iterations: 0,
            batch_draws: 0,
            meshlet_draws: 1,
        }
    );
    let commands = device.take_commands();
    let clears = commands
        .iter()
        .filter(|command| **command == Command::ClearTarget)
        .count();
    assert_eq!(clears, 1);
    assert!(!commands.iter().any(|command| matches!(
        command,
        Command::DrawBatch { .. } | Command::TriangleCull { .. }
    )));
    let final_draws: Vec<_> = commands
        .iter()
        .filter(|command| matches!(command, Command::DrawMeshlets { .. }))
        .cloned()
        .collect();
    assert_eq!(
        final_draws,
        vec![Command::DrawMeshlets {
            load: LoadOp::Load,
            draws: 0
        }]
    );
    assert_eq!(output.target.covered(), 0);
    assert_eq!(output.target.color(0, 0), [0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn object_revealed_by_camera_motion_is_drawn_in_the_same_frame() {
    let mut device = ReferenceDevice::new();
    let mut builder = SceneBuilder::new();
    let wall = builder.add_mesh(&MeshData::quad(3.0));
    let sphere = builder.add_mesh(&MeshData::uv_sphere(1.0, 16, 8));
    builder.add_object(wall, Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)));
    builder.add_object(sphere, Mat4::from_translation(Vec3::new(8.0, 0.0, -20.0)));
    let scene = builder.build();
    let mut pipeline = CullPipeline::new(&mut device, &scene, two_phase()).unwrap();
    for _ in 0..3 {
        pipeline.render(&mut device, &input()).unwrap();
    }
    assert_eq!(visibility(&device, &pipeline), vec![TRUE, 0]);

    // The previous pyramid still has the wall in the center of the view.
    device.reset_statistics();
    device.take_commands();
    let moved = FrameInput {
        camera: Camera::looking_down_z(Vec3::new(8.0, 0.0, 0.0)),
        extent: EXTENT,
    };
    let output = pipeline.render(&mut device, &moved).unwrap();
    assert_eq!(output.statistics.compacted, 1);
    assert_eq!(output.statistics.meshlet_draws, 1);
    assert!(device.drawn_triangles(1) > 0);
    assert_eq!(visibility(&device, &pipeline), vec![TRUE, TRUE]);

    let commands = device.take_commands();
    let final_draws: Vec<_> = commands
        .iter()
        .filter_map(|command| match command {
            Command::DrawMeshlets { load, draws } => Some((*load, *draws)),
            _ => None,
        })
        .collect();
    assert_eq!(final_draws.len(), 1);
    assert_eq!(final_draws[0].0, LoadOp::Load);
    assert!(final_draws[0].1 > 0);
}

#[test]
fn two_phase_frame_runs_passes_in_order() {
    let mut device = ReferenceDevice::new();
    let scene = occluded_scene();
    let mut pipeline = CullPipeline::new(&mut device, &scene, two_phase()).unwrap();
    device.take_commands();
    let output = pipeline.render(&mut device, &input()).unwrap();
    let commands = device.take_commands();
    let milestones: Vec<_> = commands
        .iter()
        .filter(|command| {
            matches!(
                command,
                Command::MeshCull { .. }
                    | Command::MeshletCull { .. }
                    | Command::ReadBack { .. }
                    | Command::BuildPyramid
                    | Command::DrawMeshlets { .. }
            )
        })
        .cloned()
        .collect();
    assert_eq!(
        milestones,
        vec![
            Command::MeshCull {
                variant: CullVariant::Cull,
                first: 0,
                count: 2
            },
            Command::MeshletCull {
                variant: CullVariant::Cull,
                first: 0,
                count: scene.meshlets.len() as u32
            },
            Command::ReadBack {
                count: output.statistics.compacted
            },
            Command::BuildPyramid,
            Command::BuildPyramid,
            Command::MeshCull {
                variant: CullVariant::Reocclusion,
                first: 0,
                count: 2
            },
            Command::MeshletCull {
                variant: CullVariant::Reocclusion,
                first: 0,
                count: scene.meshlets.len() as u32
            },
            Command::DrawMeshlets {
                load: LoadOp::Load,
                draws: 0
            },
        ]
    );
    let second_build = commands
        .iter()
        .rposition(|command| *command == Command::BuildPyramid)
        .unwrap();
    assert!(commands[..second_build].iter().any(|command| matches!(
        command,
        Command::TriangleCull {
            variant: CullVariant::Reocclusion,
            ..
        }
    )));
    assert_eq!(commands[second_build + 1], Command::Barrier(Barrier::PyramidToCompute));
}

#[test]
fn batches_wrap_around_the_ring() {
    let mut device = ReferenceDevice::new();
    let scene = quad_grid(20, 15);
    assert_eq!(scene.meshlets.len(), 300);
    let configuration = CullConfiguration {
        occlusion: false,
        ..CullConfiguration::default()
    };
    let mut pipeline = CullPipeline::new(&mut device, &scene, configuration).unwrap();
    device.take_commands();
    let output = pipeline.render(&mut device, &input()).unwrap();
    assert_eq!(output.statistics.compacted, 300);
    assert_eq!(output.statistics.iterations, 3);
    assert_eq!(output.statistics.reocclusion_iterations, 3);

    let commands = device.take_commands();
    let first = first_phase(&commands);
    let waits: Vec<_> = first
        .iter()
        .filter_map(|command| match command {
            Command::WaitEvent(id) => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(waits, vec![0, 1, 0]);
    let groups: Vec<_> = first
        .iter()
        .filter_map(|command| match command {
            Command::TriangleCull { meshlets, .. } => Some(*meshlets),
            _ => None,
        })
        .collect();
    assert_eq!(groups, vec![128, 128, 44]);
    let loads: Vec<_> = first
        .iter()
        .filter_map(|command| match command {
            Command::DrawBatch { load, .. } => Some(*load),
            _ => None,
        })
        .collect();
    assert_eq!(
        loads,
        vec![
            LoadOp::Clear([0.0, 0.0, 0.0, 1.0]),
            LoadOp::Load,
            LoadOp::Load
        ]
    );
}

#[test]
fn compaction_never_grows() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..4 {
        let objects = rng.gen_range(1..60);
        let scene = random_scene(&mut rng, objects);
        let mut device = ReferenceDevice::new();
        let mut pipeline = CullPipeline::new(&mut device, &scene, two_phase()).unwrap();
        for frame in 0..3 {
            let mut camera = Camera::looking_down_z(Vec3::new(0.0, 0.0, frame as f32));
            camera.yaw = rng.gen_range(-0.5..0.5);
            let output = pipeline
                .render(
                    &mut device,
                    &FrameInput {
                        camera,
                        extent: EXTENT,
                    },
                )
                .unwrap();
            let statistics = output.statistics;
            assert!(statistics.compacted <= scene.meshlets.len() as u32);
            assert_eq!(statistics.iterations, iteration_count(statistics.compacted));
            assert_eq!(statistics.reocclusion_iterations, statistics.iterations);
            for command in device.take_commands() {
                match command {
                    Command::PrepareDispatch { count } | Command::ReadBack { count } => {
                        assert!(count <= scene.meshlets.len() as u32)
                    }
                    Command::DrawMeshlets { draws, .. } => {
                        assert!(draws <= scene.meshlets.len() as u32)
                    }
                    Command::TriangleCull { meshlets, .. } => {
                        assert!(meshlets <= BATCH_COMMAND_CAPACITY)
                    }
                    Command::PrepareDraw { triangles } => assert!(triangles * 3 <= MAX_INDICES),
                    _ => {}
                }
            }
        }
        assert_eq!(pipeline.mesh().visibility.len(), scene.objects.len());
        assert_eq!(pipeline.meshlet().visibility.len(), scene.meshlets.len());
        assert_eq!(
            pipeline.triangle().visibility.len(),
            scene.triangle_count() as usize
        );
    }
}

#[test]
fn mesh_cull_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(11);
    let scene = random_scene(&mut rng, 40);
    let run = || {
        let mut device = ReferenceDevice::new();
        let mut pipeline = CullPipeline::new(&mut device, &scene, two_phase()).unwrap();
        (0..3)
            .map(|_| {
                let output = pipeline.render(&mut device, &input()).unwrap();
                (output.statistics, visibility(&device, &pipeline))
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn outputs_are_published_on_the_blackboard() {
    let mut device = ReferenceDevice::new();
    let scene = quad_scene();
    let mut pipeline = CullPipeline::new(&mut device, &scene, two_phase()).unwrap();
    assert!(!pipeline.blackboard().contains(DRAW_PASS));
    let output = pipeline.render(&mut device, &input()).unwrap();
    let blackboard = pipeline.blackboard();
    assert!(blackboard.get::<Target>(DRAW_PASS).is_some());
    let hiz = blackboard.get::<Pyramid>(HIZ_PASS).unwrap();
    assert_eq!(hiz.level_count(), EXTENT.pyramid_levels());
    assert!(hiz.load(0, 32, 32) > 0.0);
    assert_eq!(
        blackboard.get::<FrameStatistics>(STATISTICS_PASS),
        Some(&output.statistics)
    );
    assert_eq!(pipeline.frame(), 1);
}

#[test]
fn resizing_recreates_the_pyramids() {
    let mut device = ReferenceDevice::new();
    let scene = quad_scene();
    let mut pipeline = CullPipeline::new(&mut device, &scene, two_phase()).unwrap();
    let output = pipeline.render(&mut device, &input()).unwrap();
    assert_eq!(output.target.extent(), EXTENT);
    let resized = FrameInput {
        extent: Extent::new(32, 16),
        ..input()
    };
    let output = pipeline.render(&mut device, &resized).unwrap();
    assert_eq!(output.target.extent(), Extent::new(32, 16));
    assert_eq!(output.hiz.level_count(), 6);
    assert_eq!(output.statistics.compacted, 1);
}
