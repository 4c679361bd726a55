use std::{cell::RefCell, rc::Rc};

use cull_gpu::{
    glam::{Vec2, Vec4},
    pyramid_extent, reduce_texel, DepthPyramid,
};

use crate::Extent;

/// Color and depth attachments in host memory.
pub struct Surface {
    extent: Extent,
    color: Vec<[f32; 4]>,
    depth: Vec<f32>,
}

impl Surface {
    fn new(extent: Extent) -> Self {
        let len = (extent.width * extent.height) as usize;
        Self {
            extent,
            color: vec![[0.0; 4]; len],
            depth: vec![0.0; len],
        }
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn color(&self, x: u32, y: u32) -> [f32; 4] {
        self.color[self.texel(x, y)]
    }

    pub fn depth(&self, x: u32, y: u32) -> f32 {
        self.depth[self.texel(x, y)]
    }

    fn texel(&self, x: u32, y: u32) -> usize {
        (y * self.extent.width + x) as usize
    }

    pub(super) fn clear(&mut self, color: [f32; 4]) {
        self.color.iter_mut().for_each(|texel| *texel = color);
        self.depth.iter_mut().for_each(|texel| *texel = 0.0);
    }

    /// Rasterizes one triangle with a greater depth test and back faces culled.
    ///
    /// Returns the number of fragments that passed the depth test.
    pub(super) fn rasterize(&mut self, clip: [Vec4; 3], color: [f32; 4]) -> usize {
        if clip.iter().any(|position| position.w <= 0.0) {
            return 0;
        }
        let size = Vec2::new(self.extent.width as f32, self.extent.height as f32);
        let screen = |position: Vec4| {
            let ndc = position.truncate() / position.w;
            ((ndc.truncate() * 0.5 + Vec2::splat(0.5)) * size, ndc.z)
        };
        let (a, za) = screen(clip[0]);
        let (b, zb) = screen(clip[1]);
        let (c, zc) = screen(clip[2]);
        let area = edge(a, b, c);
        if area >= 0.0 {
            return 0;
        }
        let min = a.min(b).min(c).max(Vec2::ZERO);
        let max = a.max(b).max(c).min(size);
        let mut fragments = 0;
        for y in min.y.floor() as u32..max.y.ceil() as u32 {
            for x in min.x.floor() as u32..max.x.ceil() as u32 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let wa = edge(b, c, p) / area;
                let wb = edge(c, a, p) / area;
                let wc = edge(a, b, p) / area;
                if wa < 0.0 || wb < 0.0 || wc < 0.0 {
                    continue;
                }
                let depth = wa * za + wb * zb + wc * zc;
                if !(0.0..=1.0).contains(&depth) {
                    continue;
                }
                let texel = self.texel(x, y);
                if depth > self.depth[texel] {
                    self.depth[texel] = depth;
                    self.color[texel] = color;
                    fragments += 1;
                }
            }
        }
        fragments
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

#[derive(Clone)]
pub struct Target(pub(super) Rc<RefCell<Surface>>);

impl Target {
    pub(super) fn new(extent: Extent) -> Self {
        Self(Rc::new(RefCell::new(Surface::new(extent))))
    }

    pub fn extent(&self) -> Extent {
        self.0.borrow().extent
    }

    pub fn color(&self, x: u32, y: u32) -> [f32; 4] {
        self.0.borrow().color(x, y)
    }

    pub fn depth(&self, x: u32, y: u32) -> f32 {
        self.0.borrow().depth(x, y)
    }

    /// Number of texels that were written since the last clear.
    pub fn covered(&self) -> usize {
        self.0
            .borrow()
            .depth
            .iter()
            .filter(|depth| **depth > 0.0)
            .count()
    }
}

/// Min reduced depth levels, level 0 at the extent of the target.
pub struct Levels {
    width: u32,
    height: u32,
    levels: Vec<Vec<f32>>,
}

impl Levels {
    fn new(extent: Extent) -> Self {
        let levels = (0..extent.pyramid_levels())
            .map(|level| {
                let (width, height) = pyramid_extent(extent.width, extent.height, level);
                vec![0.0; (width * height) as usize]
            })
            .collect();
        Self {
            width: extent.width,
            height: extent.height,
            levels,
        }
    }

    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub(super) fn build(&mut self, surface: &Surface) {
        assert_eq!(
            surface.extent,
            Extent::new(self.width, self.height),
            "pyramid built from a target of another extent"
        );
        self.levels[0].copy_from_slice(&surface.depth);
        for level in 1..self.level_count() {
            let (width, height) = pyramid_extent(self.width, self.height, level);
            let mut texels = Vec::with_capacity((width * height) as usize);
            for y in 0..height {
                for x in 0..width {
                    texels.push(reduce_texel(&*self, self.width, self.height, level, x, y));
                }
            }
            self.levels[level as usize] = texels;
        }
    }
}

impl DepthPyramid for Levels {
    fn load(&self, level: u32, x: u32, y: u32) -> f32 {
        let (width, _) = pyramid_extent(self.width, self.height, level);
        self.levels[level as usize][(y * width + x) as usize]
    }
}

#[derive(Clone)]
pub struct Pyramid(pub(super) Rc<RefCell<Levels>>);

impl Pyramid {
    pub(super) fn new(extent: Extent) -> Self {
        Self(Rc::new(RefCell::new(Levels::new(extent))))
    }

    pub fn level_count(&self) -> u32 {
        self.0.borrow().level_count()
    }

    pub fn load(&self, level: u32, x: u32, y: u32) -> f32 {
        self.0.borrow().load(level, x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [f32; 4] = [1.0; 4];

    fn front_facing(z: f32) -> [Vec4; 3] {
        [
            Vec4::new(-1.0, 1.0, z, 1.0),
            Vec4::new(1.0, 1.0, z, 1.0),
            Vec4::new(0.0, -1.0, z, 1.0),
        ]
    }

    #[test]
    fn front_faces_are_drawn() {
        let mut surface = Surface::new(Extent::new(8, 8));
        assert!(surface.rasterize(front_facing(0.5), WHITE) > 0);
        assert_eq!(surface.depth(4, 4), 0.5);
        assert_eq!(surface.color(4, 4), WHITE);
    }

    #[test]
    fn back_faces_are_culled() {
        let mut surface = Surface::new(Extent::new(8, 8));
        let [a, b, c] = front_facing(0.5);
        assert_eq!(surface.rasterize([a, c, b], WHITE), 0);
    }

    #[test]
    fn nearer_fragments_win() {
        let mut surface = Surface::new(Extent::new(8, 8));
        surface.rasterize(front_facing(0.5), WHITE);
        assert_eq!(surface.rasterize(front_facing(0.25), [0.0; 4]), 0);
        assert!(surface.rasterize(front_facing(0.75), [0.0; 4]) > 0);
        assert_eq!(surface.depth(4, 4), 0.75);
    }

    #[test]
    fn pyramid_keeps_farthest_depth() {
        let extent = Extent::new(8, 8);
        let mut surface = Surface::new(extent);
        surface.clear([0.0; 4]);
        surface.rasterize(front_facing(0.5), WHITE);
        let mut levels = Levels::new(extent);
        levels.build(&surface);
        assert_eq!(levels.level_count(), 4);
        assert_eq!(levels.load(0, 4, 4), 0.5);
        assert_eq!(levels.load(3, 0, 0), 0.0);
        let full = [
            Vec4::new(-1.0, -1.0, 0.5, 1.0),
            Vec4::new(-1.0, 3.0, 0.5, 1.0),
            Vec4::new(3.0, -1.0, 0.5, 1.0),
        ];
        surface.clear([0.0; 4]);
        surface.rasterize(full, WHITE);
        levels.build(&surface);
        assert!((levels.load(3, 0, 0) - 0.5).abs() < 1e-6);
    }
}
