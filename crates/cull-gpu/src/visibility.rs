#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use glam::{Vec3, Vec4};

use crate::{pyramid_extent, Constants, DepthPyramid, Meshlet, Object, Vertex, FALSE};

/// Reversed depth of a point `distance` units in front of the camera.
pub fn depth(distance: f32, constants: &Constants) -> f32 {
    constants.znear * (constants.zfar - distance)
        / ((constants.zfar - constants.znear) * distance)
}

/// View space center and radius of a model space sphere placed by `object`.
pub fn view_sphere(bounds: Vec4, object: &Object, constants: &Constants) -> (Vec3, f32) {
    let world = object.transform * bounds.truncate().extend(1.0);
    let view = constants.view * world;
    (view.truncate(), bounds.w * object.scale)
}

pub fn frustum_visible(center: Vec3, radius: f32, constants: &Constants) -> bool {
    let distance = -center.z;
    let frustum = constants.frustum;
    distance * frustum.y - center.x.abs() * frustum.x > -radius
        && distance * frustum.w - center.y.abs() * frustum.z > -radius
        && distance + radius > constants.znear
        && distance - radius < constants.zfar
}

/// Screen rectangle `(min u, min v, max u, max v)` of a view space sphere.
///
/// Uses the tangent lines of the sphere per axis, so the rectangle is tight.
/// Returns `None` when the sphere reaches the near plane.
pub fn project_sphere(center: Vec3, radius: f32, constants: &Constants) -> Option<Vec4> {
    let distance = -center.z;
    if distance - radius <= constants.znear {
        return None;
    }
    let squared = distance * distance - radius * radius;
    let vx = (center.x * center.x + squared).sqrt();
    let min_x = (vx * center.x - radius * distance) / (vx * distance + radius * center.x);
    let max_x = (vx * center.x + radius * distance) / (vx * distance - radius * center.x);
    let vy = (center.y * center.y + squared).sqrt();
    let min_y = (vy * center.y - radius * distance) / (vy * distance + radius * center.y);
    let max_y = (vy * center.y + radius * distance) / (vy * distance - radius * center.y);
    Some(Vec4::new(
        min_x * constants.p00 * 0.5 + 0.5,
        0.5 - max_y * constants.p11 * 0.5,
        max_x * constants.p00 * 0.5 + 0.5,
        0.5 - min_y * constants.p11 * 0.5,
    ))
}

/// Tests a screen rectangle with nearest depth `depth` against the depth pyramid.
///
/// The level is chosen so the rectangle spans at most two texels per axis; the
/// test reads the farthest depth of every texel it touches.
pub fn rect_visible<P: DepthPyramid>(
    rect: Vec4,
    depth: f32,
    constants: &Constants,
    pyramid: &P,
) -> bool {
    if constants.pyramid_levels == 0 {
        return true;
    }
    let width = constants.pyramid_width;
    let height = constants.pyramid_height;
    let u0 = rect.x.max(0.0);
    let v0 = rect.y.max(0.0);
    let u1 = rect.z.min(1.0);
    let v1 = rect.w.min(1.0);
    if u0 > u1 || v0 > v1 {
        return true;
    }
    let extent = ((u1 - u0) * width as f32).max((v1 - v0) * height as f32);
    let level = if extent <= 1.0 {
        0
    } else {
        (extent.log2().ceil() as u32).min(constants.pyramid_levels - 1)
    };
    let (level_width, level_height) = pyramid_extent(width, height, level);
    let x0 = (((u0 * width as f32) as u32).min(width - 1) >> level).min(level_width - 1);
    let y0 = (((v0 * height as f32) as u32).min(height - 1) >> level).min(level_height - 1);
    let x1 = (((u1 * width as f32) as u32).min(width - 1) >> level).min(level_width - 1);
    let y1 = (((v1 * height as f32) as u32).min(height - 1) >> level).min(level_height - 1);
    let mut farthest = 1.0f32;
    let mut y = y0;
    while y <= y1 {
        let mut x = x0;
        while x <= x1 {
            farthest = farthest.min(pyramid.load(level, x, y));
            x += 1;
        }
        y += 1;
    }
    depth >= farthest
}

pub fn sphere_occlusion_visible<P: DepthPyramid>(
    center: Vec3,
    radius: f32,
    constants: &Constants,
    pyramid: &P,
) -> bool {
    match project_sphere(center, radius, constants) {
        Some(rect) => rect_visible(rect, depth(-center.z - radius, constants), constants, pyramid),
        None => true,
    }
}

/// Rejects clusters whose every triangle faces away from `camera`.
pub fn cone_visible(center: Vec3, radius: f32, axis: Vec3, cutoff: f32, camera: Vec3) -> bool {
    if cutoff >= 1.0 {
        return true;
    }
    let view = center - camera;
    view.dot(axis) < cutoff * view.length() + radius
}

pub fn mesh_visible<P: DepthPyramid>(object: &Object, constants: &Constants, pyramid: &P) -> bool {
    let (center, radius) = view_sphere(object.bounds, object, constants);
    frustum_visible(center, radius, constants)
        && (constants.occlusion == FALSE
            || sphere_occlusion_visible(center, radius, constants, pyramid))
}

pub fn meshlet_visible<P: DepthPyramid>(
    meshlet: &Meshlet,
    object: &Object,
    constants: &Constants,
    pyramid: &P,
) -> bool {
    let (center, radius) = view_sphere(meshlet.bounds, object, constants);
    if !frustum_visible(center, radius, constants) {
        return false;
    }
    let world_center = (object.transform * meshlet.bounds.truncate().extend(1.0)).truncate();
    let axis = (object.transform * meshlet.cone.truncate().extend(0.0))
        .truncate()
        .normalize_or_zero();
    if !cone_visible(
        world_center,
        radius,
        axis,
        meshlet.cone.w,
        constants.camera_position.truncate(),
    ) {
        return false;
    }
    constants.occlusion == FALSE || sphere_occlusion_visible(center, radius, constants, pyramid)
}

pub fn vertex_clip(vertex: &Vertex, object: &Object, constants: &Constants) -> Vec4 {
    constants.view_projection * (object.transform * vertex.position.truncate().extend(1.0))
}

/// Tests a clip space triangle, counter-clockwise front faces, y pointing down in NDC.
pub fn triangle_visible<P: DepthPyramid>(
    clip: [Vec4; 3],
    constants: &Constants,
    pyramid: &P,
) -> bool {
    if clip[0].w <= 0.0 || clip[1].w <= 0.0 || clip[2].w <= 0.0 {
        return true;
    }
    let a = clip[0].truncate() / clip[0].w;
    let b = clip[1].truncate() / clip[1].w;
    let c = clip[2].truncate() / clip[2].w;
    let area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    if area >= 0.0 {
        return false;
    }
    let min = a.min(b).min(c);
    let max = a.max(b).max(c);
    if max.x < -1.0 || min.x > 1.0 || max.y < -1.0 || min.y > 1.0 {
        return false;
    }
    if constants.occlusion == FALSE {
        return true;
    }
    let rect = Vec4::new(
        min.x * 0.5 + 0.5,
        min.y * 0.5 + 0.5,
        max.x * 0.5 + 0.5,
        max.y * 0.5 + 0.5,
    );
    rect_visible(rect, max.z, constants, pyramid)
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;
    use crate::TRUE;

    struct Flat(f32);

    impl DepthPyramid for Flat {
        fn load(&self, _level: u32, _x: u32, _y: u32) -> f32 {
            self.0
        }
    }

    fn camera_constants(occlusion: bool) -> Constants {
        let (znear, zfar) = (0.1, 100.0);
        let projection = Mat4::from_cols(
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, -1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, znear / (zfar - znear), -1.0),
            Vec4::new(0.0, 0.0, znear * zfar / (zfar - znear), 0.0),
        );
        let side = 1.0 / 2.0f32.sqrt();
        Constants {
            view: Mat4::IDENTITY,
            view_projection: projection,
            camera_position: Vec4::W,
            frustum: Vec4::new(side, side, side, side),
            viewport: Vec4::new(64.0, 64.0, 1.0 / 64.0, 1.0 / 64.0),
            p00: 1.0,
            p11: 1.0,
            znear,
            zfar,
            pyramid_width: 64,
            pyramid_height: 64,
            pyramid_levels: 7,
            occlusion: if occlusion { TRUE } else { FALSE },
            ..Default::default()
        }
    }

    fn object_at(translation: Vec3, radius: f32) -> Object {
        Object {
            transform: Mat4::from_translation(translation),
            bounds: Vec3::ZERO.extend(radius),
            scale: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn depth_is_reversed() {
        let constants = camera_constants(true);
        assert!((depth(constants.znear, &constants) - 1.0).abs() < 1e-6);
        assert!(depth(constants.zfar, &constants).abs() < 1e-6);
        assert!(depth(5.0, &constants) > depth(20.0, &constants));
    }

    #[test]
    fn frustum_rejects_spheres_outside() {
        let constants = camera_constants(false);
        assert!(frustum_visible(Vec3::new(0.0, 0.0, -5.0), 1.0, &constants));
        assert!(frustum_visible(Vec3::new(5.5, 0.0, -5.0), 1.0, &constants));
        assert!(!frustum_visible(Vec3::new(20.0, 0.0, -5.0), 1.0, &constants));
        assert!(!frustum_visible(Vec3::new(0.0, 0.0, 5.0), 1.0, &constants));
        assert!(!frustum_visible(Vec3::new(0.0, 0.0, -200.0), 1.0, &constants));
    }

    #[test]
    fn projected_sphere_is_centered() {
        let constants = camera_constants(true);
        let rect = project_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0, &constants).unwrap();
        assert!((rect.x + rect.z - 1.0).abs() < 1e-5);
        assert!((rect.y + rect.w - 1.0).abs() < 1e-5);
        assert!(rect.x < 0.5 && rect.z > 0.5);
        assert!(project_sphere(Vec3::new(0.0, 0.0, -0.5), 1.0, &constants).is_none());
    }

    #[test]
    fn projected_sphere_follows_vulkan_y() {
        let constants = camera_constants(true);
        let rect = project_sphere(Vec3::new(0.0, 2.0, -5.0), 0.5, &constants).unwrap();
        assert!(rect.w < 0.5);
    }

    #[test]
    fn rect_compares_against_farthest_depth() {
        let constants = camera_constants(true);
        let rect = Vec4::new(0.4, 0.4, 0.6, 0.6);
        assert!(rect_visible(rect, 0.5, &constants, &Flat(0.4)));
        assert!(!rect_visible(rect, 0.5, &constants, &Flat(0.6)));
        let empty = Constants {
            pyramid_levels: 0,
            ..constants
        };
        assert!(rect_visible(rect, 0.5, &empty, &Flat(0.6)));
    }

    #[test]
    fn cleared_pyramid_hides_nothing() {
        let constants = camera_constants(true);
        let object = object_at(Vec3::new(0.0, 0.0, -50.0), 1.0);
        assert!(mesh_visible(&object, &constants, &Flat(0.0)));
    }

    #[test]
    fn occluder_in_front_hides_object() {
        let constants = camera_constants(true);
        let wall = Flat(depth(5.0, &constants));
        let hidden = object_at(Vec3::new(0.0, 0.0, -20.0), 1.0);
        let front = object_at(Vec3::new(0.0, 0.0, -3.0), 1.0);
        assert!(!mesh_visible(&hidden, &constants, &wall));
        assert!(mesh_visible(&front, &constants, &wall));
        let unoccluded = camera_constants(false);
        assert!(mesh_visible(&hidden, &unoccluded, &wall));
    }

    #[test]
    fn near_plane_spheres_are_visible() {
        let constants = camera_constants(true);
        let object = object_at(Vec3::new(0.0, 0.0, -0.5), 1.0);
        assert!(mesh_visible(&object, &constants, &Flat(1.0)));
    }

    #[test]
    fn cone_rejects_back_facing_clusters() {
        let camera = Vec3::ZERO;
        let center = Vec3::new(0.0, 0.0, -5.0);
        assert!(cone_visible(center, 1.0, Vec3::Z, 0.0, camera));
        assert!(!cone_visible(center, 1.0, -Vec3::Z, 0.0, camera));
        assert!(cone_visible(center, 1.0, -Vec3::Z, 1.0, camera));
    }

    #[test]
    fn triangle_winding_and_bounds() {
        let constants = camera_constants(false);
        let clip = |x: f32, y: f32| {
            constants.view_projection * Vec4::new(x, y, -5.0, 1.0)
        };
        let front = [clip(-1.0, -1.0), clip(1.0, -1.0), clip(1.0, 1.0)];
        let back = [front[0], front[2], front[1]];
        let outside = [clip(10.0, -1.0), clip(12.0, -1.0), clip(12.0, 1.0)];
        assert!(triangle_visible(front, &constants, &Flat(0.0)));
        assert!(!triangle_visible(back, &constants, &Flat(0.0)));
        assert!(!triangle_visible(outside, &constants, &Flat(0.0)));
    }

    #[test]
    fn triangle_behind_occluder() {
        let constants = camera_constants(true);
        let clip = |x: f32, y: f32| {
            constants.view_projection * Vec4::new(x, y, -20.0, 1.0)
        };
        let triangle = [clip(-1.0, -1.0), clip(1.0, -1.0), clip(1.0, 1.0)];
        assert!(!triangle_visible(
            triangle,
            &constants,
            &Flat(depth(5.0, &constants))
        ));
        assert!(triangle_visible(triangle, &constants, &Flat(0.0)));
    }
}
