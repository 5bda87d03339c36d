//! The scene collaborator interface.
//!
//! The exporter never talks to a host application directly. Everything it
//! needs is pulled through [`SceneSource`]: the flat node list, materials,
//! text blocks, transforms sampled at a frame, and the few edit operations
//! used to mark or repair faulty geometry.
//!
//! [`Scene`] is an in-memory snapshot implementing the trait, loadable from
//! JSON.

pub mod material;
pub mod mesh;
mod snapshot;

#[cfg(test)]
pub(crate) mod fixtures;

pub use material::{
    ExtensionMode, ImageRef, MapTarget, MappingMode, MaterialData, SlotInfluence, TextureKind,
    TextureSlot,
};
pub use mesh::{Face, GroupInfluence, MeshData, MeshVertex, UvLayer};
pub use snapshot::Scene;

use crate::error::{ExportError, Result};
use crate::types::{Color, MaterialId, NodeId, Transform};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a scene node is, with the data relevant to that kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Mesh(MeshData),
    Empty,
    Lattice,
    Armature,
    /// A bone nested inside an armature.
    PoseBone {
        armature: NodeId,
        /// Rest transform in armature space.
        #[serde(default)]
        rest: Transform,
    },
    /// Cameras, lights and anything else the exporter ignores.
    Other,
}

impl NodeKind {
    /// Human readable kind, used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Mesh(_) => "Mesh",
            NodeKind::Empty => "Empty",
            NodeKind::Lattice => "Lattice",
            NodeKind::Armature => "Armature",
            NodeKind::PoseBone { .. } => "Bone",
            NodeKind::Other => "Object",
        }
    }
}

/// A transform sampled at a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformKey {
    pub frame: i32,
    pub transform: Transform,
}

/// Animation data attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAnimation {
    /// World transforms for objects, pose (basis) transforms for pose bones.
    #[serde(default)]
    pub keys: Vec<TransformKey>,
    /// Number of drivers attached to the node.
    #[serde(default)]
    pub drivers: u32,
}

impl NodeAnimation {
    /// True if the node has at least one keyframe or driver.
    pub fn is_animated(&self) -> bool {
        !self.keys.is_empty() || self.drivers > 0
    }
}

/// A node of the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// World transform at the current frame (unused for pose bones).
    #[serde(default)]
    pub world: Transform,
    /// Parent node. For pose bones, the parent bone inside the same armature.
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub animation: NodeAnimation,
}

fn visible_by_default() -> bool {
    true
}

impl SceneNode {
    pub fn new(id: NodeId, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            world: Transform::IDENTITY,
            parent: None,
            visible: true,
            selected: false,
            animation: NodeAnimation::default(),
        }
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// The owning armature of a pose bone.
    pub fn armature(&self) -> Option<NodeId> {
        match self.kind {
            NodeKind::PoseBone { armature, .. } => Some(armature),
            _ => None,
        }
    }
}

/// Scene wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSettings {
    /// File the scene was loaded from; the exported mesh is named after it.
    #[serde(default)]
    pub file_name: String,
    #[serde(default = "default_frame_start")]
    pub frame_start: i32,
    #[serde(default = "default_frame_end")]
    pub frame_end: i32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub world_ambient: Color,
}

fn default_frame_start() -> i32 {
    1
}

fn default_frame_end() -> i32 {
    250
}

fn default_fps() -> u32 {
    30
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            file_name: String::new(),
            frame_start: default_frame_start(),
            frame_end: default_frame_end(),
            fps: default_fps(),
            world_ambient: [0.0, 0.0, 0.0],
        }
    }
}

/// A named free text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub name: String,
    pub body: String,
}

/// Everything the exporter reads from (and the little it writes to) a scene.
///
/// Node ids are indices into [`nodes`](SceneSource::nodes).
pub trait SceneSource {
    fn settings(&self) -> &SceneSettings;

    fn nodes(&self) -> &[SceneNode];

    fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes().get(id.index())
    }

    fn material(&self, id: MaterialId) -> Option<&MaterialData>;

    fn text_blocks(&self) -> &[TextBlock];

    /// World transform of an object node at `frame`.
    fn world_transform_at(&self, id: NodeId, frame: i32) -> Transform;

    /// Armature-space transform of a posed bone at `frame`.
    fn pose_transform_at(&self, id: NodeId, frame: i32) -> Transform;

    /// Mutable mesh access for marker groups, selection and welding.
    fn mesh_mut(&mut self, id: NodeId) -> Option<&mut MeshData>;

    /// Merge selected vertices of a mesh closer than `distance`.
    fn weld_selected(&mut self, id: NodeId, distance: f32) -> Result<usize> {
        let mesh = self
            .mesh_mut(id)
            .ok_or_else(|| ExportError::SceneEdit(format!("node {} is not a mesh", id.0)))?;
        Ok(mesh.weld_selected(distance))
    }

    fn image_exists(&self, image: &ImageRef) -> bool {
        Path::new(&image.path).exists()
    }

    /// Whether the image carries an alpha plane; `None` if it cannot be told.
    fn image_has_alpha_plane(&self, image: &ImageRef) -> Option<bool> {
        match image.depth {
            Some(depth) => Some(!matches!(depth, 8 | 24 | 48 | 96)),
            None => probe_alpha_plane(Path::new(&image.path)),
        }
    }
}

/// Decode an image file and report whether its color type has alpha.
pub fn probe_alpha_plane(path: &Path) -> Option<bool> {
    let reader = image::ImageReader::open(path).ok()?.with_guessed_format().ok()?;
    let decoded = reader.decode().ok()?;
    Some(decoded.color().has_alpha())
}
