use cull::{
    glam::{Mat4, Vec3},
    Camera, MeshData, SceneBuilder, SceneData,
};

/// Distance of the occluding wall from the camera start position.
pub const WALL_DISTANCE: f32 = 6.0;
const GRID_DISTANCE: f32 = 20.0;
const GRID_SPACING: f32 = 2.5;

/// A wall in front of a `grid` by `grid` field of spheres and cubes.
///
/// The wall hides the center of the field, the outer objects peek out on the
/// sides and are revealed as the camera orbits.
pub fn occluder_scene(grid: u32) -> SceneData {
    let mut builder = SceneBuilder::new();
    let wall = builder.add_mesh(&MeshData::quad(4.0));
    let sphere = builder.add_mesh(&MeshData::uv_sphere(0.8, 12, 6));
    let cube = builder.add_mesh(&MeshData::cube(0.7));
    builder.add_object(
        wall,
        Mat4::from_translation(Vec3::new(0.0, 0.0, -WALL_DISTANCE)),
    );
    let half = (grid.max(1) - 1) as f32 / 2.0;
    for row in 0..grid {
        for column in 0..grid {
            let mesh = if (row + column) % 2 == 0 { sphere } else { cube };
            let position = Vec3::new(
                (column as f32 - half) * GRID_SPACING,
                (row as f32 - half) * GRID_SPACING,
                -GRID_DISTANCE,
            );
            builder.add_object(mesh, Mat4::from_translation(position));
        }
    }
    builder.build()
}

/// Camera of `frame`, swinging around the start position so objects move in and out of cover.
pub fn orbit_camera(frame: usize) -> Camera {
    let mut camera = Camera::looking_down_z(Vec3::ZERO);
    camera.yaw = (frame as f32 * 0.15).sin() * 0.4;
    camera
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_holds_wall_and_grid() {
        let scene = occluder_scene(3);
        assert_eq!(scene.objects.len(), 1 + 3 * 3);
        assert!(scene.meshlets.len() >= scene.objects.len());
    }

    #[test]
    fn empty_grid_keeps_the_wall() {
        let scene = occluder_scene(0);
        assert_eq!(scene.objects.len(), 1);
    }

    #[test]
    fn orbit_starts_straight_ahead() {
        assert_eq!(orbit_camera(0).yaw, 0.0);
        assert!(orbit_camera(5).yaw.abs() <= 0.4);
    }
}
