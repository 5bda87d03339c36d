//! Mesh faces to exported triangles.

use super::geometry::{BoneWeight, Triangle, Vertex};
use crate::scene::{MeshData, SceneNode};
use glam::Vec3;

/// Corner order of the triangles emitted for a face.
const FIRST_TRIANGLE: [usize; 3] = [0, 1, 2];
const SECOND_TRIANGLE: [usize; 3] = [0, 2, 3];

/// Triangulate one mesh node.
///
/// `slot_materials` maps material slot index to exported material index;
/// faces whose slot has no exported material are skipped. `weights` holds the
/// bone weights per mesh vertex and may be empty.
pub fn triangulate(
    node: &SceneNode,
    mesh: &MeshData,
    slot_materials: &[Option<usize>],
    weights: &[Vec<BoneWeight>],
) -> Vec<Triangle> {
    let adjacency = if mesh.auto_smooth {
        mesh.vertex_faces()
    } else {
        Vec::new()
    };
    let builder = VertexBuilder {
        node,
        mesh,
        adjacency,
        weights,
    };

    let mut triangles = Vec::with_capacity(mesh.faces.len() * 2);
    for (face_index, face) in mesh.faces.iter().enumerate() {
        if face.vertices.len() < 3 {
            continue;
        }
        let Some(material) = slot_materials.get(face.material_slot).copied().flatten() else {
            continue;
        };
        triangles.extend(builder.triangle(face_index, material, FIRST_TRIANGLE));
        if face.vertices.len() == 4 {
            triangles.extend(builder.triangle(face_index, material, SECOND_TRIANGLE));
        }
    }
    tracing::debug!("{} triangles from \"{}\"", triangles.len(), node.name);
    triangles
}

struct VertexBuilder<'a> {
    node: &'a SceneNode,
    mesh: &'a MeshData,
    adjacency: Vec<Vec<usize>>,
    weights: &'a [Vec<BoneWeight>],
}

impl VertexBuilder<'_> {
    /// `None` when a corner references a vertex the mesh does not have.
    fn triangle(
        &self,
        face_index: usize,
        material: usize,
        corners: [usize; 3],
    ) -> Option<Triangle> {
        let [a, b, c] = corners;
        Some(Triangle {
            material,
            vertices: [
                self.vertex(face_index, a)?,
                self.vertex(face_index, b)?,
                self.vertex(face_index, c)?,
            ],
        })
    }

    fn vertex(&self, face_index: usize, corner: usize) -> Option<Vertex> {
        let face = self.mesh.faces.get(face_index)?;
        let vi = *face.vertices.get(corner)? as usize;
        let source = self.mesh.vertices.get(vi)?;
        let transform = &self.node.world;

        let position = transform.transform_point(Vec3::from(source.position));
        let normal = transform.rotate_vector(self.normal(face_index, vi));
        let uv = self
            .mesh
            .active_uv_layer()
            .and_then(|layer| layer.faces.get(face_index))
            .and_then(|uvs| uvs.get(corner))
            .map(|&[u, v]| [u, 1.0 - v])
            .unwrap_or([0.0, 0.0]);

        Some(
            Vertex::new(position.to_array(), normal.to_array(), uv)
                .with_weights(self.weights.get(vi).cloned().unwrap_or_default()),
        )
    }

    /// Face normal, vertex normal or autosmoothed normal depending on shading.
    fn normal(&self, face_index: usize, vi: usize) -> Vec3 {
        let face = &self.mesh.faces[face_index];
        let face_normal = Vec3::from(face.normal);
        let vertex_normal = Vec3::from(self.mesh.vertices[vi].normal);

        if !face.smooth {
            return face_normal;
        }
        if !self.mesh.auto_smooth {
            return vertex_normal;
        }
        if face.is_degenerate() {
            return face_normal;
        }

        // First neighbour within the smoothing angle decides.
        let neighbours = self.adjacency.get(vi).map(Vec::as_slice).unwrap_or(&[]);
        let smoothed = neighbours.iter().any(|&other| {
            if other == face_index {
                return false;
            }
            let neighbour = &self.mesh.faces[other];
            if neighbour.is_degenerate() {
                return false;
            }
            let angle = face_normal
                .angle_between(Vec3::from(neighbour.normal))
                .to_degrees()
                .round();
            angle <= self.mesh.auto_smooth_angle
        });

        if smoothed {
            vertex_normal
        } else {
            face_normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{fixtures, Face, MeshVertex, NodeKind};
    use crate::types::{NodeId, Transform};
    use glam::Quat;

    fn node_for(mesh: &MeshData) -> SceneNode {
        SceneNode::new(NodeId(0), mesh.name.clone(), NodeKind::Empty)
    }

    #[test]
    fn test_quad_splits_on_diagonal_0_2() {
        let mesh = fixtures::quad("q", None);
        let node = node_for(&mesh);
        let triangles = triangulate(&node, &mesh, &[Some(0)], &[]);

        assert_eq!(triangles.len(), 2);
        let first: Vec<[f32; 3]> = triangles[0].vertices.iter().map(|v| v.position).collect();
        let second: Vec<[f32; 3]> = triangles[1].vertices.iter().map(|v| v.position).collect();
        assert_eq!(first, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]);
        assert_eq!(second, vec![[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_uv_v_is_flipped() {
        let mesh = fixtures::quad("q", None);
        let node = node_for(&mesh);
        let triangles = triangulate(&node, &mesh, &[Some(0)], &[]);
        assert_eq!(triangles[0].vertices[0].uv, [0.0, 1.0]);
        assert_eq!(triangles[0].vertices[2].uv, [1.0, 0.0]);
    }

    #[test]
    fn test_missing_uv_layer_gives_origin() {
        let mut mesh = fixtures::quad("q", None);
        mesh.uv_layers.clear();
        let node = node_for(&mesh);
        let triangles = triangulate(&node, &mesh, &[Some(0)], &[]);
        assert!(triangles.iter().flat_map(|t| t.vertices.iter()).all(|v| v.uv == [0.0, 0.0]));
    }

    #[test]
    fn test_object_transform_applied() {
        let mesh = fixtures::quad("q", None);
        let mut node = node_for(&mesh);
        node.world = Transform::new(
            Vec3::new(0.0, 0.0, 3.0),
            Quat::from_rotation_x(std::f32::consts::PI),
            Vec3::splat(2.0),
        );
        let triangles = triangulate(&node, &mesh, &[Some(0)], &[]);
        let corner = Vec3::from(triangles[0].vertices[2].position);
        assert!((corner - Vec3::new(2.0, -2.0, 3.0)).length() < 1e-4);
        let normal = Vec3::from(triangles[0].vertices[0].normal);
        assert!((normal - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
    }

    #[test]
    fn test_faces_without_material_or_area_are_skipped() {
        let mut mesh = fixtures::quad("q", None);
        mesh.faces.push(fixtures::face(&[0, 1], 0));
        mesh.faces.push(fixtures::face(&[0, 1, 2], 1));
        let node = node_for(&mesh);
        let triangles = triangulate(&node, &mesh, &[Some(0), None], &[]);
        assert_eq!(triangles.len(), 2);
    }

    #[test]
    fn test_face_with_missing_vertex_is_dropped() {
        let mut mesh = fixtures::quad("q", None);
        mesh.faces.push(fixtures::face(&[0, 1, 9], 0));
        let node = node_for(&mesh);
        assert_eq!(triangulate(&node, &mesh, &[Some(0)], &[]).len(), 2);
    }

    #[test]
    fn test_ngon_emits_first_triangle_only() {
        let mut mesh = fixtures::quad("q", None);
        mesh.vertices.push(MeshVertex::new([0.5, 2.0, 0.0], [0.0, 0.0, 1.0]));
        mesh.faces[0].vertices = vec![0, 1, 2, 4, 3];
        let node = node_for(&mesh);
        assert_eq!(triangulate(&node, &mesh, &[Some(0)], &[]).len(), 1);
    }

    #[test]
    fn test_weights_follow_source_vertex() {
        let mesh = fixtures::quad("q", None);
        let node = node_for(&mesh);
        let weights: Vec<Vec<BoneWeight>> = (0..4)
            .map(|i| vec![BoneWeight { bone: i, weight: 1.0 }])
            .collect();
        let triangles = triangulate(&node, &mesh, &[Some(0)], &weights);
        let bones: Vec<usize> = triangles[1].vertices.iter().map(|v| v.weights[0].bone).collect();
        assert_eq!(bones, vec![0, 2, 3]);
    }

    /// Two faces meet at vertex 1; the third shares it with a steep angle.
    fn folded_mesh(auto_smooth: bool) -> MeshData {
        let mut mesh = MeshData::new("fold");
        mesh.auto_smooth = auto_smooth;
        mesh.auto_smooth_angle = 30.0;
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]] {
            mesh.vertices.push(MeshVertex::new(p, [0.0, 0.6, 0.8]));
        }
        let tilted = Vec3::new(0.0, 0.5, 1.0).normalize().to_array();
        let steep = Vec3::new(0.0, 1.0, 0.0).to_array();
        mesh.faces = vec![
            Face { vertices: vec![0, 1, 2], material_slot: 0, normal: [0.0, 0.0, 1.0], smooth: true },
            Face { vertices: vec![1, 3, 2], material_slot: 0, normal: steep, smooth: true },
            Face { vertices: vec![1, 3, 0], material_slot: 0, normal: tilted, smooth: true },
        ];
        mesh
    }

    #[test]
    fn test_autosmooth_uses_vertex_normal_when_any_neighbour_is_within_angle() {
        let mesh = folded_mesh(true);
        let node = node_for(&mesh);
        let triangles = triangulate(&node, &mesh, &[Some(0)], &[]);
        // Neighbour 1 is 90 degrees off; neighbour 2 (about 27 degrees) qualifies.
        assert_eq!(triangles[0].vertices[1].normal, [0.0, 0.6, 0.8]);
    }

    #[test]
    fn test_autosmooth_keeps_face_normal_without_close_neighbour() {
        let mut mesh = folded_mesh(true);
        mesh.auto_smooth_angle = 20.0;
        let node = node_for(&mesh);
        let triangles = triangulate(&node, &mesh, &[Some(0)], &[]);
        assert_eq!(triangles[0].vertices[1].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_smooth_without_autosmooth_and_flat() {
        let mut mesh = folded_mesh(false);
        let node = node_for(&mesh);
        let triangles = triangulate(&node, &mesh, &[Some(0)], &[]);
        assert_eq!(triangles[0].vertices[0].normal, [0.0, 0.6, 0.8]);

        mesh.faces[0].smooth = false;
        let triangles = triangulate(&node, &mesh, &[Some(0)], &[]);
        assert_eq!(triangles[0].vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_degenerate_face_skips_autosmooth() {
        let mut mesh = folded_mesh(true);
        mesh.faces[0].normal = [0.0, 0.0, 0.0];
        let node = node_for(&mesh);
        let triangles = triangulate(&node, &mesh, &[Some(0)], &[]);
        assert_eq!(triangles[0].vertices[1].normal, [0.0, 0.0, 0.0]);
    }
}
