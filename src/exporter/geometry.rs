//! Exported geometry types.

use glam::{Quat, Vec3};

/// Influence of one bone on a vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneWeight {
    /// Index into the exported bone list.
    pub bone: usize,
    pub weight: f32,
}

/// A vertex in the output mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Position in world space.
    pub position: [f32; 3],
    /// Normal vector.
    pub normal: [f32; 3],
    /// Texture coordinates, V already flipped.
    pub uv: [f32; 2],
    /// Bone influences, one output stream each.
    pub weights: Vec<BoneWeight>,
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            weights: Vec::new(),
        }
    }

    pub fn with_weights(mut self, weights: Vec<BoneWeight>) -> Self {
        self.weights = weights;
        self
    }

    /// Sum of all bone weights; 1.0 for skinned vertices.
    pub fn weight_sum(&self) -> f32 {
        self.weights.iter().map(|w| w.weight).sum()
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [0.0, 0.0],
            weights: Vec::new(),
        }
    }
}

/// A triangle with its exported material index.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub material: usize,
    pub vertices: [Vertex; 3],
}

/// A named attachment point.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Lowercased node name.
    pub name: String,
    pub position: Vec3,
    pub orientation: Quat,
}

/// A bone of the exported skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Name of the nearest Trainz bone above this one; empty for the root.
    pub parent_name: String,
    pub position: Vec3,
    pub orientation: Quat,
}
