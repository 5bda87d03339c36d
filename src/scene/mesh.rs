//! Mesh data as provided by the scene collaborator.

use crate::types::MaterialId;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Weight of one vertex in one vertex group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupInfluence {
    /// Index into [`MeshData::vertex_groups`].
    pub group: usize,
    pub weight: f32,
}

/// A mesh-space vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshVertex {
    pub position: [f32; 3],
    /// Smoothed vertex normal.
    pub normal: [f32; 3],
    #[serde(default)]
    pub groups: Vec<GroupInfluence>,
    #[serde(default)]
    pub selected: bool,
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self {
            position,
            normal,
            groups: Vec::new(),
            selected: false,
        }
    }
}

/// A polygon of the mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    /// Vertex indices in winding order.
    pub vertices: Vec<u32>,
    /// Index into [`MeshData::material_slots`].
    #[serde(default)]
    pub material_slot: usize,
    pub normal: [f32; 3],
    #[serde(default)]
    pub smooth: bool,
}

impl Face {
    /// Faces without area carry a zero-length normal.
    pub fn is_degenerate(&self) -> bool {
        Vec3::from(self.normal).length() <= f32::EPSILON
    }
}

/// Per-face texture coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvLayer {
    pub name: String,
    /// The layer used for rendering; only this one is exported.
    #[serde(default)]
    pub active_render: bool,
    /// One entry per face, one coordinate per face vertex.
    pub faces: Vec<Vec<[f32; 2]>>,
}

/// Geometry of a mesh node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    #[serde(default)]
    pub name: String,
    pub vertices: Vec<MeshVertex>,
    pub faces: Vec<Face>,
    #[serde(default)]
    pub vertex_groups: Vec<String>,
    #[serde(default)]
    pub uv_layers: Vec<UvLayer>,
    /// `None` marks an empty slot.
    #[serde(default)]
    pub material_slots: Vec<Option<MaterialId>>,
    #[serde(default)]
    pub double_sided: bool,
    #[serde(default)]
    pub auto_smooth: bool,
    /// Autosmooth threshold in degrees.
    #[serde(default = "default_auto_smooth_angle")]
    pub auto_smooth_angle: f32,
}

fn default_auto_smooth_angle() -> f32 {
    30.0
}

impl MeshData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auto_smooth_angle: default_auto_smooth_angle(),
            ..Default::default()
        }
    }

    pub fn active_uv_layer(&self) -> Option<&UvLayer> {
        self.uv_layers.iter().find(|layer| layer.active_render)
    }

    /// For every vertex, the indices of the faces using it.
    pub fn vertex_faces(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.vertices.len()];
        for (face_index, face) in self.faces.iter().enumerate() {
            for &vi in &face.vertices {
                if let Some(faces) = adjacency.get_mut(vi as usize) {
                    faces.push(face_index);
                }
            }
        }
        adjacency
    }

    pub fn vertex_group_index(&self, name: &str) -> Option<usize> {
        self.vertex_groups.iter().position(|g| g == name)
    }

    /// Delete a vertex group and every influence referencing it.
    ///
    /// Returns false if no group of that name existed.
    pub fn remove_vertex_group(&mut self, name: &str) -> bool {
        let Some(removed) = self.vertex_group_index(name) else {
            return false;
        };
        self.vertex_groups.remove(removed);
        for vertex in &mut self.vertices {
            vertex.groups.retain(|g| g.group != removed);
            for influence in &mut vertex.groups {
                if influence.group > removed {
                    influence.group -= 1;
                }
            }
        }
        true
    }

    /// Add vertices to a group (created on demand) with weight 0.
    pub fn add_to_vertex_group(&mut self, name: &str, vertices: impl IntoIterator<Item = u32>) {
        let group = match self.vertex_group_index(name) {
            Some(index) => index,
            None => {
                self.vertex_groups.push(name.to_string());
                self.vertex_groups.len() - 1
            }
        };
        for vi in vertices {
            if let Some(vertex) = self.vertices.get_mut(vi as usize) {
                if !vertex.groups.iter().any(|g| g.group == group) {
                    vertex.groups.push(GroupInfluence { group, weight: 0.0 });
                }
            }
        }
    }

    /// Vertex indices belonging to the named group, ascending.
    pub fn vertex_group_members(&self, name: &str) -> Vec<u32> {
        let Some(group) = self.vertex_group_index(name) else {
            return Vec::new();
        };
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.groups.iter().any(|g| g.group == group))
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Positions of the currently selected vertices.
    pub fn selected_positions(&self) -> Vec<Vec3> {
        self.vertices
            .iter()
            .filter(|v| v.selected)
            .map(|v| Vec3::from(v.position))
            .collect()
    }

    pub fn deselect_all(&mut self) {
        for vertex in &mut self.vertices {
            vertex.selected = false;
        }
    }

    /// Merge selected vertices lying within `distance` of each other.
    ///
    /// Faces left with fewer than three distinct vertices are removed, together
    /// with their UV entries. Merged vertices are deleted. Returns the number of
    /// vertices removed.
    pub fn weld_selected(&mut self, distance: f32) -> usize {
        let count = self.vertices.len();
        let mut target: Vec<usize> = (0..count).collect();
        let selected: Vec<usize> = (0..count).filter(|&i| self.vertices[i].selected).collect();

        for (n, &i) in selected.iter().enumerate() {
            let pi = Vec3::from(self.vertices[i].position);
            for &j in &selected[..n] {
                if target[j] == j && Vec3::from(self.vertices[j].position).distance(pi) <= distance {
                    target[i] = j;
                    break;
                }
            }
        }

        let mut new_index = vec![0u32; count];
        let mut next = 0u32;
        for i in 0..count {
            if target[i] == i {
                new_index[i] = next;
                next += 1;
            }
        }
        let removed = count - next as usize;
        if removed == 0 {
            return 0;
        }

        let mut keep_face = Vec::with_capacity(self.faces.len());
        let mut kept_corners: Vec<Vec<usize>> = Vec::with_capacity(self.faces.len());
        for face in &mut self.faces {
            let mut remapped: Vec<u32> = Vec::with_capacity(face.vertices.len());
            let mut corners = Vec::with_capacity(face.vertices.len());
            for (corner, &vi) in face.vertices.iter().enumerate() {
                let Some(&kept) = target.get(vi as usize) else {
                    continue;
                };
                let mapped = new_index[kept];
                if !remapped.contains(&mapped) {
                    remapped.push(mapped);
                    corners.push(corner);
                }
            }
            keep_face.push(remapped.len() >= 3);
            face.vertices = remapped;
            kept_corners.push(corners);
        }

        for layer in &mut self.uv_layers {
            let mut faces = Vec::with_capacity(layer.faces.len());
            for (face_index, uvs) in layer.faces.drain(..).enumerate() {
                if !keep_face.get(face_index).copied().unwrap_or(false) {
                    continue;
                }
                let corners = &kept_corners[face_index];
                faces.push(corners.iter().filter_map(|&c| uvs.get(c).copied()).collect());
            }
            layer.faces = faces;
        }

        let mut face_index = 0;
        self.faces.retain(|_| {
            let keep = keep_face[face_index];
            face_index += 1;
            keep
        });

        let mut vertex_index = 0;
        self.vertices.retain(|_| {
            let keep = target[vertex_index] == vertex_index;
            vertex_index += 1;
            keep
        });

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_with_collapsed_triangle() -> MeshData {
        let mut mesh = MeshData::new("m");
        for p in [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.00001, 0.0],
        ] {
            mesh.vertices.push(MeshVertex::new(p, [0.0, 0.0, 1.0]));
        }
        mesh.faces.push(Face {
            vertices: vec![0, 1, 2, 3],
            material_slot: 0,
            normal: [0.0, 0.0, 1.0],
            smooth: false,
        });
        mesh.faces.push(Face {
            vertices: vec![1, 2, 4],
            material_slot: 0,
            normal: [0.0, 0.0, 0.0],
            smooth: false,
        });
        mesh.uv_layers.push(UvLayer {
            name: "uv".into(),
            active_render: true,
            faces: vec![
                vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
                vec![[1.0, 0.0], [1.0, 1.0], [1.0, 1.0]],
            ],
        });
        mesh
    }

    #[test]
    fn test_vertex_group_add_and_remove() {
        let mut mesh = quad_with_collapsed_triangle();
        mesh.vertex_groups.push("b.r.body".into());
        mesh.vertices[0].groups.push(GroupInfluence { group: 0, weight: 1.0 });

        mesh.add_to_vertex_group("ERROR_x", [1, 2, 2]);
        assert_eq!(mesh.vertex_group_members("ERROR_x"), vec![1, 2]);

        mesh.add_to_vertex_group("WARNING_y", [0]);
        assert!(mesh.remove_vertex_group("ERROR_x"));
        assert!(!mesh.remove_vertex_group("ERROR_x"));

        assert_eq!(mesh.vertex_groups, vec!["b.r.body", "WARNING_y"]);
        assert_eq!(mesh.vertex_group_members("WARNING_y"), vec![0]);
        assert_eq!(mesh.vertex_group_members("b.r.body"), vec![0]);
        assert!(mesh.vertices[1].groups.is_empty());
    }

    #[test]
    fn test_weld_selected_removes_collapsed_face() {
        let mut mesh = quad_with_collapsed_triangle();
        for vi in [1, 2, 4] {
            mesh.vertices[vi].selected = true;
        }

        let removed = mesh.weld_selected(1e-4);

        assert_eq!(removed, 1);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.faces[0].vertices, vec![0, 1, 2, 3]);
        assert_eq!(mesh.uv_layers[0].faces.len(), 1);
    }

    #[test]
    fn test_weld_drops_corners_of_missing_vertices() {
        let mut mesh = quad_with_collapsed_triangle();
        mesh.faces.push(Face {
            vertices: vec![0, 1, 9],
            material_slot: 0,
            normal: [0.0, 0.0, 1.0],
            smooth: false,
        });
        for vi in [1, 2, 4] {
            mesh.vertices[vi].selected = true;
        }

        assert_eq!(mesh.weld_selected(1e-4), 1);
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.faces[0].vertices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_weld_ignores_unselected_vertices() {
        let mut mesh = quad_with_collapsed_triangle();
        assert_eq!(mesh.weld_selected(1e-4), 0);
        assert_eq!(mesh.faces.len(), 2);
    }

    #[test]
    fn test_degenerate_face() {
        let mesh = quad_with_collapsed_triangle();
        assert!(!mesh.faces[0].is_degenerate());
        assert!(mesh.faces[1].is_degenerate());
    }

    #[test]
    fn test_vertex_faces() {
        let mesh = quad_with_collapsed_triangle();
        let adjacency = mesh.vertex_faces();
        assert_eq!(adjacency[0], vec![0]);
        assert_eq!(adjacency[2], vec![0, 1]);
        assert_eq!(adjacency[4], vec![1]);
    }
}
