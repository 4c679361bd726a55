use glam::Vec4;

use crate::{
    mesh_visible, meshlet_visible, triangle_visible, DepthPyramid, DispatchCommand, DrawCommand,
    Constants, Meshlet, Object, BATCH_COMMAND_CAPACITY, COMMAND_CULLED, COMMAND_EMITTED,
    COMMAND_HANDLED, FALSE, MESHLET_VERTEX_BITS, TRUE, VARIANT_REOCCLUSION, VARIANT_SINGLE,
};

/// Outcome of the meshlet kernel for one meshlet instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshletDecision {
    pub visible: bool,
    /// Append a draw command for this meshlet to the compact buffer.
    pub emit: bool,
    /// Command flag, only stored by the reocclusion variant.
    pub flag: u32,
}

/// Outcome of the triangle kernel for one triangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriangleDecision {
    /// Append the triangle to the batch index buffer.
    pub emit: bool,
    /// Store `emit` into the triangle visibility buffer.
    pub write_visibility: bool,
}

pub fn mesh_cull<P: DepthPyramid>(
    variant: u32,
    previous: u32,
    object: &Object,
    constants: &Constants,
    pyramid: &P,
) -> u32 {
    if variant == VARIANT_REOCCLUSION && previous != FALSE {
        return TRUE;
    }
    if mesh_visible(object, constants, pyramid) {
        TRUE
    } else {
        FALSE
    }
}

pub fn meshlet_cull<P: DepthPyramid>(
    variant: u32,
    object_visible: u32,
    previous: u32,
    meshlet: &Meshlet,
    object: &Object,
    constants: &Constants,
    pyramid: &P,
) -> MeshletDecision {
    if object_visible == FALSE {
        return MeshletDecision {
            visible: false,
            emit: false,
            flag: COMMAND_CULLED,
        };
    }
    if variant == VARIANT_REOCCLUSION && previous != FALSE {
        return MeshletDecision {
            visible: true,
            emit: false,
            flag: COMMAND_HANDLED,
        };
    }
    let visible = meshlet_visible(meshlet, object, constants, pyramid);
    MeshletDecision {
        visible,
        emit: visible,
        flag: if visible {
            COMMAND_EMITTED
        } else {
            COMMAND_CULLED
        },
    }
}

pub fn triangle_cull<P: DepthPyramid>(
    variant: u32,
    previous: u32,
    clip: [Vec4; 3],
    constants: &Constants,
    pyramid: &P,
) -> TriangleDecision {
    if variant == VARIANT_REOCCLUSION && previous != FALSE {
        return TriangleDecision {
            emit: false,
            write_visibility: false,
        };
    }
    TriangleDecision {
        emit: triangle_visible(clip, constants, pyramid),
        write_visibility: variant != VARIANT_SINGLE,
    }
}

/// Number of triangle batches needed to consume `count` compacted meshlet commands.
pub fn iteration_count(count: u32) -> u32 {
    (count + BATCH_COMMAND_CAPACITY - 1) / BATCH_COMMAND_CAPACITY
}

/// Workgroups of the triangle dispatch of `iteration`, one per meshlet command.
pub fn batch_dispatch(count: u32, iteration: u32) -> DispatchCommand {
    let first = iteration * BATCH_COMMAND_CAPACITY;
    let x = if count > first {
        (count - first).min(BATCH_COMMAND_CAPACITY)
    } else {
        0
    };
    DispatchCommand { x, y: 1, z: 1 }
}

pub fn batch_draw(triangles: u32) -> DrawCommand {
    DrawCommand {
        index_count: triangles * 3,
        instance_count: if triangles > 0 { 1 } else { 0 },
        first_index: 0,
        vertex_offset: 0,
        first_instance: 0,
    }
}

/// Draw command of a whole meshlet instance in the global index buffer.
pub fn meshlet_command(index: u32, meshlet: &Meshlet) -> DrawCommand {
    DrawCommand {
        index_count: meshlet.triangle_count * 3,
        instance_count: 1,
        first_index: meshlet.instance_offset * 3,
        vertex_offset: 0,
        first_instance: index,
    }
}

pub fn encode_vertex(meshlet: u32, local: u32) -> u32 {
    (meshlet << MESHLET_VERTEX_BITS) | local
}

pub fn decode_vertex(encoded: u32) -> (u32, u32) {
    (
        encoded >> MESHLET_VERTEX_BITS,
        encoded & ((1 << MESHLET_VERTEX_BITS) - 1),
    )
}

pub fn pack_triangle(a: u32, b: u32, c: u32) -> u32 {
    a | b << 8 | c << 16
}

pub fn unpack_triangle(packed: u32) -> [u32; 3] {
    [packed & 0xff, (packed >> 8) & 0xff, (packed >> 16) & 0xff]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MAX_BATCH_ITERATIONS, MAX_COMPACTED_MESHLETS, VARIANT_CULL};

    struct Cleared;

    impl DepthPyramid for Cleared {
        fn load(&self, _level: u32, _x: u32, _y: u32) -> f32 {
            0.0
        }
    }

    #[test]
    fn iteration_count_rounds_up() {
        assert_eq!(iteration_count(0), 0);
        assert_eq!(iteration_count(1), 1);
        assert_eq!(iteration_count(BATCH_COMMAND_CAPACITY), 1);
        assert_eq!(iteration_count(BATCH_COMMAND_CAPACITY + 1), 2);
        assert_eq!(
            iteration_count(MAX_COMPACTED_MESHLETS),
            MAX_BATCH_ITERATIONS
        );
    }

    #[test]
    fn batch_dispatch_covers_count_exactly() {
        let count = 300;
        let groups: Vec<_> = (0..4).map(|i| batch_dispatch(count, i).x).collect();
        assert_eq!(groups, vec![128, 128, 44, 0]);
        assert_eq!(groups.iter().sum::<u32>(), count);
        assert_eq!(batch_dispatch(0, 0).x, 0);
    }

    #[test]
    fn empty_batch_draws_no_instances() {
        assert_eq!(batch_draw(0).instance_count, 0);
        let draw = batch_draw(2);
        assert_eq!((draw.index_count, draw.instance_count), (6, 1));
    }

    #[test]
    fn meshlet_command_points_into_global_indices() {
        let meshlet = Meshlet {
            triangle_count: 12,
            instance_offset: 40,
            ..Default::default()
        };
        let command = meshlet_command(7, &meshlet);
        assert_eq!(command.index_count, 36);
        assert_eq!(command.first_index, 120);
        assert_eq!(command.first_instance, 7);
    }

    #[test]
    fn vertex_and_triangle_packing() {
        assert_eq!(decode_vertex(encode_vertex(1234, 63)), (1234, 63));
        assert_eq!(unpack_triangle(pack_triangle(3, 200, 17)), [3, 200, 17]);
    }

    #[test]
    fn invisible_object_culls_its_meshlets() {
        let decision = meshlet_cull(
            VARIANT_REOCCLUSION,
            FALSE,
            TRUE,
            &Meshlet::default(),
            &Object::default(),
            &Constants::default(),
            &Cleared,
        );
        assert!(!decision.visible && !decision.emit);
        assert_eq!(decision.flag, COMMAND_CULLED);
    }

    #[test]
    fn reocclusion_does_not_emit_handled_meshlets() {
        let decision = meshlet_cull(
            VARIANT_REOCCLUSION,
            TRUE,
            TRUE,
            &Meshlet::default(),
            &Object::default(),
            &Constants::default(),
            &Cleared,
        );
        assert!(decision.visible && !decision.emit);
        assert_eq!(decision.flag, COMMAND_HANDLED);
    }

    #[test]
    fn reocclusion_keeps_visible_objects() {
        let object = Object::default();
        let constants = Constants::default();
        assert_eq!(
            mesh_cull(VARIANT_REOCCLUSION, TRUE, &object, &constants, &Cleared),
            TRUE
        );
    }

    #[test]
    fn reocclusion_skips_drawn_triangles() {
        let clip = [Vec4::ZERO; 3];
        let constants = Constants::default();
        let decision = triangle_cull(VARIANT_REOCCLUSION, TRUE, clip, &constants, &Cleared);
        assert!(!decision.emit && !decision.write_visibility);
        let single = triangle_cull(VARIANT_SINGLE, TRUE, clip, &constants, &Cleared);
        assert!(!single.write_visibility);
        let cull = triangle_cull(VARIANT_CULL, TRUE, clip, &constants, &Cleared);
        assert!(cull.write_visibility);
    }
}
