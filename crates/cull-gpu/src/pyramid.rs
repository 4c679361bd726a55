use crate::MAX_PYRAMID_LEVELS;

/// Read access to a depth pyramid, level 0 having the render resolution.
pub trait DepthPyramid {
    fn load(&self, level: u32, x: u32, y: u32) -> f32;
}

pub fn pyramid_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

pub fn pyramid_levels(width: u32, height: u32) -> u32 {
    (32 - width.max(height).leading_zeros()).clamp(1, MAX_PYRAMID_LEVELS)
}

/// Inclusive source texel range reduced into texel `(x, y)` of the next level.
///
/// The last texel of an odd sized source row or column is folded into the last
/// destination texel, so every source texel is covered.
pub fn reduction_footprint(
    x: u32,
    y: u32,
    source: (u32, u32),
    destination: (u32, u32),
) -> (u32, u32, u32, u32) {
    let x0 = (2 * x).min(source.0 - 1);
    let y0 = (2 * y).min(source.1 - 1);
    let x1 = if x + 1 == destination.0 {
        source.0 - 1
    } else {
        (2 * x + 1).min(source.0 - 1)
    };
    let y1 = if y + 1 == destination.1 {
        source.1 - 1
    } else {
        (2 * y + 1).min(source.1 - 1)
    };
    (x0, y0, x1, y1)
}

/// Minimum of the footprint of texel `(x, y)` at `level`, read from `level - 1`.
pub fn reduce_texel<P: DepthPyramid>(
    pyramid: &P,
    width: u32,
    height: u32,
    level: u32,
    x: u32,
    y: u32,
) -> f32 {
    let source = pyramid_extent(width, height, level - 1);
    let destination = pyramid_extent(width, height, level);
    let (x0, y0, x1, y1) = reduction_footprint(x, y, source, destination);
    let mut depth = 1.0f32;
    let mut sy = y0;
    while sy <= y1 {
        let mut sx = x0;
        while sx <= x1 {
            depth = depth.min(pyramid.load(level - 1, sx, sy));
            sx += 1;
        }
        sy += 1;
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extents_halve_down_to_one() {
        assert_eq!(pyramid_extent(64, 48, 0), (64, 48));
        assert_eq!(pyramid_extent(64, 48, 3), (8, 6));
        assert_eq!(pyramid_extent(64, 48, 6), (1, 1));
        assert_eq!(pyramid_extent(5, 3, 2), (1, 1));
    }

    #[test]
    fn level_count_covers_longest_edge() {
        assert_eq!(pyramid_levels(1, 1), 1);
        assert_eq!(pyramid_levels(64, 64), 7);
        assert_eq!(pyramid_levels(65, 3), 7);
        assert_eq!(pyramid_levels(1 << 20, 1), MAX_PYRAMID_LEVELS);
    }

    #[test]
    fn odd_edges_fold_into_last_texel() {
        assert_eq!(reduction_footprint(0, 0, (5, 4), (2, 2)), (0, 0, 1, 1));
        assert_eq!(reduction_footprint(1, 1, (5, 4), (2, 2)), (2, 2, 4, 3));
        assert_eq!(reduction_footprint(0, 0, (3, 1), (1, 1)), (0, 0, 2, 0));
    }

    struct Levels(Vec<(u32, Vec<f32>)>);

    impl DepthPyramid for Levels {
        fn load(&self, level: u32, x: u32, y: u32) -> f32 {
            let (width, texels) = &self.0[level as usize];
            texels[(y * width + x) as usize]
        }
    }

    #[test]
    fn reduction_keeps_farthest_depth() {
        let base = vec![
            0.9, 0.8, 0.7, //
            0.6, 0.5, 0.1, //
            0.9, 0.9, 0.9,
        ];
        let pyramid = Levels(vec![(3, base)]);
        assert_eq!(reduce_texel(&pyramid, 3, 3, 1, 0, 0), 0.1);
    }
}
