use cull_gpu::{
    glam::{mat4, vec4, EulerRot, Mat4, Quat, Vec3, Vec4},
    Constants, FALSE, TRUE,
};

use crate::Extent;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub translation: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn looking_down_z(translation: Vec3) -> Self {
        Self {
            translation,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            fovy: std::f32::consts::FRAC_PI_2,
            znear: 0.1,
            zfar: 100.0,
        }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, self.roll)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_quat(self.rotation().inverse()) * Mat4::from_translation(-self.translation)
    }

    /// Half extents of the view frustum at unit distance.
    fn half_extents(&self, aspect: f32) -> (f32, f32) {
        let h = (self.fovy / 2.0).tan();
        (h * aspect, h)
    }

    /// Reversed depth projection with y pointing down in clip space.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        let (w, h) = self.half_extents(aspect);
        mat4(
            vec4(1.0 / w, 0.0, 0.0, 0.0),
            vec4(0.0, -1.0 / h, 0.0, 0.0),
            vec4(0.0, 0.0, self.znear / (self.zfar - self.znear), -1.0),
            vec4(
                0.0,
                0.0,
                self.znear * self.zfar / (self.zfar - self.znear),
                0.0,
            ),
        )
    }

    pub fn constants(&self, extent: Extent, scene: SceneCounts, occlusion: bool) -> Constants {
        let aspect = extent.width as f32 / extent.height as f32;
        let (w, h) = self.half_extents(aspect);
        let view = self.view();
        let sw = (1.0 + w * w).sqrt();
        let sh = (1.0 + h * h).sqrt();
        Constants {
            view,
            view_projection: self.projection(aspect) * view,
            camera_position: self.translation.extend(1.0),
            frustum: Vec4::new(1.0 / sw, w / sw, 1.0 / sh, h / sh),
            viewport: Vec4::new(
                extent.width as f32,
                extent.height as f32,
                1.0 / extent.width as f32,
                1.0 / extent.height as f32,
            ),
            p00: 1.0 / w,
            p11: 1.0 / h,
            znear: self.znear,
            zfar: self.zfar,
            pyramid_width: extent.width,
            pyramid_height: extent.height,
            pyramid_levels: extent.pyramid_levels(),
            object_count: scene.objects,
            meshlet_count: scene.meshlets,
            occlusion: if occlusion { TRUE } else { FALSE },
            pad: [0; 2],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneCounts {
    pub objects: u32,
    pub meshlets: u32,
}

#[cfg(test)]
mod tests {
    use cull_gpu::{depth, frustum_visible};

    use super::*;

    #[test]
    fn projection_matches_reversed_depth() {
        let camera = Camera::looking_down_z(Vec3::ZERO);
        let constants = camera.constants(
            Extent::new(64, 64),
            SceneCounts::default(),
            true,
        );
        let clip = constants.view_projection * Vec4::new(0.0, 0.0, -5.0, 1.0);
        assert!((clip.z / clip.w - depth(5.0, &constants)).abs() < 1e-6);
    }

    #[test]
    fn view_follows_translation_and_yaw() {
        let mut camera = Camera::looking_down_z(Vec3::new(0.0, 0.0, 10.0));
        let view = camera.view();
        let point = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((point.z + 10.0).abs() < 1e-5);
        camera.yaw = std::f32::consts::PI;
        let constants = camera.constants(
            Extent::new(64, 64),
            SceneCounts::default(),
            true,
        );
        let behind = (constants.view * Vec4::new(0.0, 0.0, 0.0, 1.0)).truncate();
        assert!(!frustum_visible(behind, 1.0, &constants));
    }

    #[test]
    fn wide_targets_widen_the_frustum() {
        let camera = Camera::looking_down_z(Vec3::ZERO);
        let square = camera.constants(Extent::new(64, 64), SceneCounts::default(), true);
        let wide = camera.constants(Extent::new(128, 64), SceneCounts::default(), true);
        let center = Vec3::new(7.0, 0.0, -5.0);
        assert!(!frustum_visible(center, 1.0, &square));
        assert!(frustum_visible(center, 1.0, &wide));
    }
}
