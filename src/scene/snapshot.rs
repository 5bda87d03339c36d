//! In-memory scene snapshot.

use super::{
    MaterialData, MeshData, NodeKind, SceneNode, SceneSettings, SceneSource, TextBlock,
    TransformKey,
};
use crate::error::{ExportError, Result};
use crate::types::{MaterialId, NodeId, Transform};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A complete scene held in memory.
///
/// This is the form in which a host hands a scene to the exporter without
/// being linked against it: a JSON document with the node list, materials
/// and text blocks. Edits made by the exporter (marker vertex groups, welds)
/// are applied to the snapshot and can be written back with [`Scene::to_json`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub settings: SceneSettings,
    pub nodes: Vec<SceneNode>,
    #[serde(default)]
    pub materials: Vec<MaterialData>,
    #[serde(default)]
    pub texts: Vec<TextBlock>,
}

impl Scene {
    pub fn new(settings: SceneSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Parse a snapshot and check its references.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut scene: Scene = serde_json::from_str(json)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Append a node and return its id.
    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId::from(self.nodes.len());
        self.nodes.push(SceneNode::new(id, name, kind));
        id
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.index())
    }

    pub fn add_material(&mut self, material: MaterialData) -> MaterialId {
        let id = material.id;
        self.materials.push(material);
        id
    }

    fn validate(&mut self) -> Result<()> {
        let count = self.nodes.len();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.index() != index {
                return Err(ExportError::InvalidScene(format!(
                    "node \"{}\" at position {} has id {}",
                    node.name, index, node.id.0
                )));
            }
            if let Some(parent) = node.parent {
                if parent.index() >= count || parent == node.id {
                    return Err(ExportError::InvalidScene(format!(
                        "node \"{}\" has invalid parent {}",
                        node.name, parent.0
                    )));
                }
            }
            if let Some(armature) = node.armature() {
                let owner = self.nodes.get(armature.index()).map(|n| &n.kind);
                if !matches!(owner, Some(NodeKind::Armature)) {
                    return Err(ExportError::InvalidScene(format!(
                        "bone \"{}\" references {} which is not an armature",
                        node.name, armature.0
                    )));
                }
            }
            if let Some(mesh) = node.mesh() {
                check_faces(&node.name, mesh)?;
            }
        }
        for node in &mut self.nodes {
            node.animation.keys.sort_by_key(|k| k.frame);
        }
        Ok(())
    }

    fn nearest_keyed_ancestor(&self, id: NodeId) -> Option<&SceneNode> {
        let mut current = self.node(id)?.parent;
        let mut depth = 0;
        while let Some(parent_id) = current {
            if depth > self.nodes.len() {
                return None;
            }
            let parent = self.node(parent_id)?;
            if !parent.animation.keys.is_empty() {
                return Some(parent);
            }
            current = parent.parent;
            depth += 1;
        }
        None
    }

    fn pose_at(&self, id: NodeId, frame: i32, depth: usize) -> Transform {
        let Some(node) = self.node(id) else {
            return Transform::IDENTITY;
        };
        let NodeKind::PoseBone { rest, .. } = &node.kind else {
            return Transform::IDENTITY;
        };
        let basis = sample_keys(&node.animation.keys, frame).unwrap_or(Transform::IDENTITY);
        let local = rest.mul_transform(&basis);

        let parent_bone = node
            .parent
            .and_then(|p| self.node(p))
            .and_then(|p| match &p.kind {
                NodeKind::PoseBone { rest, .. } => Some((p.id, *rest)),
                _ => None,
            });
        match parent_bone {
            Some((parent_id, parent_rest)) if depth < self.nodes.len() => {
                let parent_pose = self.pose_at(parent_id, frame, depth + 1);
                parent_pose
                    .mul_transform(&parent_rest.inverse())
                    .mul_transform(&local)
            }
            _ => local,
        }
    }
}

/// Sample sorted keys at `frame`; ends are held, in between is interpolated.
fn sample_keys(keys: &[TransformKey], frame: i32) -> Option<Transform> {
    let first = keys.first()?;
    let last = keys.last()?;
    if frame <= first.frame {
        return Some(first.transform);
    }
    if frame >= last.frame {
        return Some(last.transform);
    }
    let window = keys.windows(2).find(|w| w[0].frame <= frame && frame < w[1].frame)?;
    let (a, b) = (&window[0], &window[1]);
    let t = (frame - a.frame) as f32 / (b.frame - a.frame) as f32;
    Some(a.transform.interpolate(&b.transform, t))
}

impl SceneSource for Scene {
    fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    fn material(&self, id: MaterialId) -> Option<&MaterialData> {
        self.materials.iter().find(|m| m.id == id)
    }

    fn text_blocks(&self) -> &[TextBlock] {
        &self.texts
    }

    /// Keyed nodes are sampled; unkeyed nodes follow their nearest keyed
    /// ancestor, keeping their rest offset to it.
    fn world_transform_at(&self, id: NodeId, frame: i32) -> Transform {
        let Some(node) = self.node(id) else {
            return Transform::IDENTITY;
        };
        if let Some(sampled) = sample_keys(&node.animation.keys, frame) {
            return sampled;
        }
        match self.nearest_keyed_ancestor(id) {
            Some(ancestor) => {
                let ancestor_at = sample_keys(&ancestor.animation.keys, frame)
                    .unwrap_or(ancestor.world);
                ancestor_at
                    .mul_transform(&ancestor.world.inverse())
                    .mul_transform(&node.world)
            }
            None => node.world,
        }
    }

    fn pose_transform_at(&self, id: NodeId, frame: i32) -> Transform {
        self.pose_at(id, frame, 0)
    }

    fn mesh_mut(&mut self, id: NodeId) -> Option<&mut MeshData> {
        match &mut self.nodes.get_mut(id.index())?.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// Faces must reference existing vertices. A mesh without material slots may
/// still use slot 0, which then counts as unassigned.
fn check_faces(node: &str, mesh: &MeshData) -> Result<()> {
    let vertex_count = mesh.vertices.len();
    let slot_count = mesh.material_slots.len().max(1);
    for (index, face) in mesh.faces.iter().enumerate() {
        if let Some(&vi) = face.vertices.iter().find(|&&vi| vi as usize >= vertex_count) {
            return Err(ExportError::InvalidScene(format!(
                "face {} of \"{}\" references vertex {} of {}",
                index, node, vi, vertex_count
            )));
        }
        if face.material_slot >= slot_count {
            return Err(ExportError::InvalidScene(format!(
                "face {} of \"{}\" uses material slot {} of {}",
                index,
                node,
                face.material_slot,
                mesh.material_slots.len()
            )));
        }
    }
    Ok(())
}
