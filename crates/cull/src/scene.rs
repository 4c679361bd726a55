use std::{f32::consts::PI, ops::Range};

use cull_gpu::{
    encode_vertex,
    glam::{Mat4, Vec3, Vec4},
    pack_triangle, unpack_triangle, Meshlet, Object, Vertex, MAX_COMPACTED_MESHLETS,
    MAX_MESHLET_TRIANGLES, MAX_MESHLET_VERTICES,
};

use crate::SceneCounts;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Indexed triangle list with counter-clockwise front faces.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Square in the xy plane facing +z.
    pub fn quad(half_size: f32) -> Self {
        let normal = Vec3::Z;
        let vertices = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .iter()
            .map(|(x, y)| MeshVertex {
                position: Vec3::new(x * half_size, y * half_size, 0.0),
                normal,
            })
            .collect();
        Self {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    pub fn cube(half_size: f32) -> Self {
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (-Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (-Vec3::Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, Vec3::Y, Vec3::X),
        ];
        let mut mesh = Self::default();
        for (normal, u, v) in faces.iter() {
            let base = mesh.vertices.len() as u32;
            for (a, b) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)].iter() {
                mesh.vertices.push(MeshVertex {
                    position: (*normal + *u * *a + *v * *b) * half_size,
                    normal: *normal,
                });
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let mut mesh = Self::default();
        for ring in 0..=rings {
            let theta = PI * ring as f32 / rings as f32;
            for segment in 0..=segments {
                let phi = 2.0 * PI * segment as f32 / segments as f32;
                let normal = Vec3::new(
                    theta.sin() * phi.sin(),
                    theta.cos(),
                    theta.sin() * phi.cos(),
                );
                mesh.vertices.push(MeshVertex {
                    position: normal * radius,
                    normal,
                });
            }
        }
        let stride = segments + 1;
        for ring in 0..rings {
            for segment in 0..segments {
                let a = ring * stride + segment;
                let b = a + stride;
                let c = b + 1;
                let d = a + 1;
                if ring + 1 < rings {
                    mesh.indices.extend_from_slice(&[a, b, c]);
                }
                if ring > 0 {
                    mesh.indices.extend_from_slice(&[a, c, d]);
                }
            }
        }
        mesh
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshId(usize);

struct Mesh {
    bounds: Vec4,
    meshlets: Range<usize>,
    triangles: u32,
}

/// Splits meshes into meshlets and instantiates them per object.
#[derive(Default)]
pub struct SceneBuilder {
    meshes: Vec<Mesh>,
    templates: Vec<Meshlet>,
    vertices: Vec<Vertex>,
    triangles: Vec<u32>,
    objects: Vec<Object>,
    meshlets: Vec<Meshlet>,
    triangle_count: u32,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: &MeshData) -> MeshId {
        let first = self.templates.len();
        for cluster in build_clusters(mesh) {
            let positions: Vec<_> = cluster
                .vertices
                .iter()
                .map(|index| mesh.vertices[*index as usize].position)
                .collect();
            let (axis, cutoff) = normal_cone(&positions, &cluster.triangles);
            self.templates.push(Meshlet {
                bounds: bounding_sphere(&positions),
                cone: axis.extend(cutoff),
                vertex_offset: self.vertices.len() as u32,
                vertex_count: positions.len() as u32,
                triangle_offset: self.triangles.len() as u32,
                triangle_count: cluster.triangles.len() as u32,
                ..Default::default()
            });
            self.vertices
                .extend(cluster.vertices.iter().map(|index| {
                    let vertex = mesh.vertices[*index as usize];
                    Vertex {
                        position: vertex.position.extend(1.0),
                        normal: vertex.normal.extend(0.0),
                    }
                }));
            self.triangles.extend(
                cluster
                    .triangles
                    .iter()
                    .map(|[a, b, c]| pack_triangle(*a, *b, *c)),
            );
        }
        let positions: Vec<_> = mesh.vertices.iter().map(|vertex| vertex.position).collect();
        self.meshes.push(Mesh {
            bounds: bounding_sphere(&positions),
            meshlets: first..self.templates.len(),
            triangles: mesh.triangle_count() as u32,
        });
        MeshId(self.meshes.len() - 1)
    }

    /// Places an instance of `mesh` and returns its object index.
    pub fn add_object(&mut self, mesh: MeshId, transform: Mat4) -> u32 {
        let mesh = &self.meshes[mesh.0];
        let index = self.objects.len() as u32;
        assert!(
            self.meshlets.len() + mesh.meshlets.len() <= MAX_COMPACTED_MESHLETS as usize,
            "scene exceeds {} meshlets",
            MAX_COMPACTED_MESHLETS
        );
        self.objects.push(Object {
            transform,
            bounds: mesh.bounds,
            first_meshlet: self.meshlets.len() as u32,
            meshlet_count: mesh.meshlets.len() as u32,
            scale: max_scale(&transform),
            pad: 0,
        });
        for template in &self.templates[mesh.meshlets.clone()] {
            self.meshlets.push(Meshlet {
                object: index,
                instance_offset: self.triangle_count,
                ..*template
            });
            self.triangle_count += template.triangle_count;
        }
        debug_assert_eq!(
            self.meshlets[self.meshlets.len() - mesh.meshlets.len()..]
                .iter()
                .map(|meshlet| meshlet.triangle_count)
                .sum::<u32>(),
            mesh.triangles
        );
        index
    }

    pub fn build(self) -> SceneData {
        let mut indices = Vec::with_capacity(self.triangle_count as usize * 3);
        for (index, meshlet) in self.meshlets.iter().enumerate() {
            let triangles = meshlet.triangle_offset as usize
                ..(meshlet.triangle_offset + meshlet.triangle_count) as usize;
            for packed in &self.triangles[triangles] {
                indices.extend(
                    unpack_triangle(*packed)
                        .iter()
                        .map(|local| encode_vertex(index as u32, *local)),
                );
            }
        }
        SceneData {
            objects: self.objects,
            meshlets: self.meshlets,
            vertices: self.vertices,
            triangles: self.triangles,
            indices,
        }
    }
}

/// Geometry of a scene in the layout the culling kernels read.
#[derive(Clone, Debug, Default)]
pub struct SceneData {
    pub objects: Vec<Object>,
    /// Meshlet instances, grouped by object.
    pub meshlets: Vec<Meshlet>,
    /// Meshlet local vertices.
    pub vertices: Vec<Vertex>,
    /// Packed meshlet local triangles.
    pub triangles: Vec<u32>,
    /// Encoded vertices of every meshlet instance triangle, in instance order.
    pub indices: Vec<u32>,
}

impl SceneData {
    pub fn counts(&self) -> SceneCounts {
        SceneCounts {
            objects: self.objects.len() as u32,
            meshlets: self.meshlets.len() as u32,
        }
    }

    pub fn triangle_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }
}

struct Cluster {
    vertices: Vec<u32>,
    triangles: Vec<[u32; 3]>,
}

fn build_clusters(mesh: &MeshData) -> Vec<Cluster> {
    let mut clusters = Vec::new();
    let mut current = Cluster {
        vertices: Vec::new(),
        triangles: Vec::new(),
    };
    for triangle in mesh.indices.chunks_exact(3) {
        let new_vertices = triangle
            .iter()
            .enumerate()
            .filter(|&(i, index)| {
                !current.vertices.contains(index) && !triangle[..i].contains(index)
            })
            .count();
        if current.vertices.len() + new_vertices > MAX_MESHLET_VERTICES as usize
            || current.triangles.len() + 1 > MAX_MESHLET_TRIANGLES as usize
        {
            clusters.push(std::mem::replace(
                &mut current,
                Cluster {
                    vertices: Vec::new(),
                    triangles: Vec::new(),
                },
            ));
        }
        let mut local = [0; 3];
        for (slot, index) in local.iter_mut().zip(triangle) {
            *slot = match current.vertices.iter().position(|vertex| vertex == index) {
                Some(position) => position as u32,
                None => {
                    current.vertices.push(*index);
                    current.vertices.len() as u32 - 1
                }
            };
        }
        current.triangles.push(local);
    }
    if !current.triangles.is_empty() {
        clusters.push(current);
    }
    clusters
}

/// Sphere around the bounding box center, radius in `w`.
fn bounding_sphere(positions: &[Vec3]) -> Vec4 {
    let (min, max) = positions.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), position| (min.min(*position), max.max(*position)),
    );
    if positions.is_empty() {
        return Vec4::ZERO;
    }
    let center = (min + max) * 0.5;
    let radius = positions
        .iter()
        .map(|position| position.distance(center))
        .fold(0.0, f32::max);
    center.extend(radius)
}

/// Average face normal and cone cutoff, or a cutoff of 1 when no cone bounds the normals.
fn normal_cone(positions: &[Vec3], triangles: &[[u32; 3]]) -> (Vec3, f32) {
    let normals: Vec<_> = triangles
        .iter()
        .filter_map(|[a, b, c]| {
            let a = positions[*a as usize];
            let b = positions[*b as usize];
            let c = positions[*c as usize];
            let normal = (b - a).cross(c - a);
            if normal.length_squared() > 0.0 {
                Some(normal.normalize())
            } else {
                None
            }
        })
        .collect();
    let axis = normals.iter().fold(Vec3::ZERO, |sum, normal| sum + *normal);
    if normals.is_empty() || axis.length_squared() == 0.0 {
        return (Vec3::Z, 1.0);
    }
    let axis = axis.normalize();
    let min_dot = normals
        .iter()
        .map(|normal| normal.dot(axis))
        .fold(1.0, f32::min);
    if min_dot <= 0.0 {
        (axis, 1.0)
    } else {
        (axis, (1.0 - min_dot * min_dot).sqrt())
    }
}

fn max_scale(transform: &Mat4) -> f32 {
    transform
        .x_axis
        .truncate()
        .length()
        .max(transform.y_axis.truncate().length())
        .max(transform.z_axis.truncate().length())
}

#[cfg(test)]
mod tests {
    use cull_gpu::{decode_vertex, MAX_MESHLET_VERTICES};

    use super::*;

    #[test]
    fn quad_is_one_meshlet() {
        let mut builder = SceneBuilder::new();
        let quad = builder.add_mesh(&MeshData::quad(1.0));
        builder.add_object(quad, Mat4::IDENTITY);
        let scene = builder.build();
        assert_eq!(scene.meshlets.len(), 1);
        let meshlet = scene.meshlets[0];
        assert_eq!((meshlet.vertex_count, meshlet.triangle_count), (4, 2));
        assert_eq!(meshlet.cone, Vec4::new(0.0, 0.0, 1.0, 0.0));
        assert_eq!(scene.triangle_count(), 2);
        assert_eq!(scene.indices.len(), 6);
    }

    #[test]
    fn cube_normals_do_not_form_a_cone() {
        let mut builder = SceneBuilder::new();
        let cube = builder.add_mesh(&MeshData::cube(1.0));
        builder.add_object(cube, Mat4::IDENTITY);
        let scene = builder.build();
        assert_eq!(scene.meshlets.len(), 1);
        assert_eq!(scene.meshlets[0].cone.w, 1.0);
        assert!((scene.objects[0].bounds.w - 3.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn large_meshes_respect_meshlet_limits() {
        let sphere = MeshData::uv_sphere(1.0, 32, 16);
        let mut builder = SceneBuilder::new();
        let mesh = builder.add_mesh(&sphere);
        builder.add_object(mesh, Mat4::IDENTITY);
        let scene = builder.build();
        assert!(scene.meshlets.len() > 1);
        for meshlet in &scene.meshlets {
            assert!(meshlet.vertex_count <= MAX_MESHLET_VERTICES);
            assert!(meshlet.triangle_count <= MAX_MESHLET_TRIANGLES);
        }
        let total: u32 = scene.meshlets.iter().map(|m| m.triangle_count).sum();
        assert_eq!(total as usize, sphere.triangle_count());
    }

    #[test]
    fn instances_share_geometry() {
        let mut builder = SceneBuilder::new();
        let quad = builder.add_mesh(&MeshData::quad(1.0));
        builder.add_object(quad, Mat4::IDENTITY);
        builder.add_object(quad, Mat4::from_scale(Vec3::splat(3.0)));
        let scene = builder.build();
        assert_eq!(scene.vertices.len(), 4);
        assert_eq!(scene.meshlets[1].object, 1);
        assert_eq!(scene.meshlets[1].instance_offset, 2);
        assert_eq!(scene.objects[1].first_meshlet, 1);
        assert_eq!(scene.objects[1].scale, 3.0);
        assert_eq!(decode_vertex(scene.indices[6]).0, 1);
    }

    #[test]
    fn sphere_faces_outward() {
        let sphere = MeshData::uv_sphere(1.0, 8, 4);
        for triangle in sphere.indices.chunks_exact(3) {
            let a = sphere.vertices[triangle[0] as usize].position;
            let b = sphere.vertices[triangle[1] as usize].position;
            let c = sphere.vertices[triangle[2] as usize].position;
            let normal = (b - a).cross(c - a);
            assert!(normal.dot(a + b + c) > 0.0);
        }
    }
}
