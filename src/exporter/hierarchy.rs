//! Trainz bone collection and hierarchy resolution.
//!
//! Bones are recognized by name (see [`crate::naming`]). Lattices and
//! armatures can be bones themselves; pose bones are nested inside an
//! armature. The exported skeleton is flat: each bone only records the
//! nearest Trainz bone above it, which may sit several unrelated nodes up
//! the chain and may be reached through a pose bone's owning armature.

use super::geometry::Bone;
use super::ExportConfig;
use crate::diagnostics::Diagnostics;
use crate::naming::is_bone_candidate;
use crate::scene::{NodeKind, SceneSource};
use crate::types::{NodeId, Transform};
use std::collections::HashMap;

/// A bone node together with the armature containing it, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrainzBone {
    /// Owning armature for pose bones; `None` for lattices and armatures.
    pub container: Option<NodeId>,
    pub node: NodeId,
}

/// The flat list of Trainz bones of a scene.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<TrainzBone>,
    by_node: HashMap<NodeId, usize>,
    root: Option<usize>,
}

impl Skeleton {
    /// Collect the bones of every included lattice and armature.
    ///
    /// Lattices come first, then for each armature the armature itself and
    /// its pose bones, all in scene order.
    pub fn collect<S: SceneSource + ?Sized>(scene: &S, config: &ExportConfig) -> Self {
        let mut skeleton = Skeleton::default();
        let nodes = scene.nodes();

        for node in nodes {
            if matches!(node.kind, NodeKind::Lattice)
                && config.includes(node)
                && is_bone_candidate(&node.name)
            {
                skeleton.push(TrainzBone {
                    container: None,
                    node: node.id,
                });
            }
        }

        for armature in nodes {
            if !matches!(armature.kind, NodeKind::Armature) || !config.includes(armature) {
                continue;
            }
            if is_bone_candidate(&armature.name) {
                skeleton.push(TrainzBone {
                    container: None,
                    node: armature.id,
                });
            }
            for bone in nodes {
                if bone.armature() == Some(armature.id) && is_bone_candidate(&bone.name) {
                    skeleton.push(TrainzBone {
                        container: Some(armature.id),
                        node: bone.id,
                    });
                }
            }
        }

        tracing::debug!("collected {} Trainz bones", skeleton.bones.len());
        skeleton
    }

    fn push(&mut self, bone: TrainzBone) {
        self.by_node.entry(bone.node).or_insert(self.bones.len());
        self.bones.push(bone);
    }

    pub fn bones(&self) -> &[TrainzBone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Index of the bone whose node is `node`.
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.by_node.get(&node).copied()
    }

    /// The unique root found by [`resolve_root`](Self::resolve_root).
    pub fn root(&self) -> Option<usize> {
        self.root
    }

    /// Nearest Trainz bone at or above `start`.
    ///
    /// Follows parent links; a pose bone without further parent continues at
    /// its armature. A cycle yields `None`.
    pub fn nearest_bone_from<S: SceneSource + ?Sized>(
        &self,
        scene: &S,
        start: Option<NodeId>,
    ) -> Option<usize> {
        let mut current = start;
        let mut steps = 0;
        while let Some(id) = current {
            if steps > scene.nodes().len() {
                return None;
            }
            if let Some(index) = self.index_of(id) {
                return Some(index);
            }
            let node = scene.node(id)?;
            current = node.parent.or_else(|| node.armature());
            steps += 1;
        }
        None
    }

    /// Nearest Trainz bone strictly above the bone at `index`.
    pub fn resolve_parent<S: SceneSource + ?Sized>(&self, scene: &S, index: usize) -> Option<usize> {
        let bone = self.bones.get(index)?;
        let node = scene.node(bone.node)?;
        let start = match node.parent {
            Some(parent) => Some(parent),
            None => bone.container,
        };
        self.nearest_bone_from(scene, start)
    }

    /// Find the single bone without Trainz ancestor.
    ///
    /// More than one candidate is an error naming all of them.
    pub fn resolve_root<S: SceneSource + ?Sized>(
        &mut self,
        scene: &S,
        diagnostics: &mut Diagnostics,
    ) -> Option<usize> {
        let roots: Vec<usize> = (0..self.bones.len())
            .filter(|&i| self.resolve_parent(scene, i).is_none())
            .collect();

        self.root = match roots.as_slice() {
            [root] => Some(*root),
            [] => {
                if !self.bones.is_empty() {
                    diagnostics.warning(
                        "no Trainz Root Bone found, the bone hierarchy contains a cycle",
                    );
                }
                None
            }
            _ => {
                let names: Vec<String> = roots.iter().map(|&i| self.describe(scene, i)).collect();
                diagnostics.error(format!(
                    "found more than one Trainz Root Bone: {}",
                    names.join(", ")
                ));
                None
            }
        };

        if let Some(root) = self.root {
            self.check_root_placement(scene, root, diagnostics);
        }
        self.root
    }

    fn check_root_placement<S: SceneSource + ?Sized>(
        &self,
        scene: &S,
        root: usize,
        diagnostics: &mut Diagnostics,
    ) {
        let transform = self.rest_transform(scene, root);
        if transform.is_translated() && transform.is_rotated() {
            let bone = self.bones[root];
            let mut name = node_name(scene, bone.node);
            if let Some(container) = bone.container {
                name = format!("{}->{}", node_name(scene, container), name);
            }
            diagnostics.warning(format!(
                "The Trainz Root Bone \"{}\" is rotated and not located at the point of origin. \
                 In Trainz your Object might not appear where you expect them.",
                name
            ));
        }
    }

    /// Message label of a bone, e.g. `Armature "rig" Bone "b.r.arm"`.
    pub fn describe<S: SceneSource + ?Sized>(&self, scene: &S, index: usize) -> String {
        let Some(bone) = self.bones.get(index) else {
            return String::new();
        };
        let kind = scene.node(bone.node).map(|n| n.kind.label()).unwrap_or("Object");
        match bone.container {
            None => format!("{} \"{}\"", kind, node_name(scene, bone.node)),
            Some(container) => format!(
                "Armature \"{}\" Bone \"{}\"",
                node_name(scene, container),
                node_name(scene, bone.node)
            ),
        }
    }

    pub fn name<S: SceneSource + ?Sized>(&self, scene: &S, index: usize) -> String {
        self.bones
            .get(index)
            .map(|b| node_name(scene, b.node))
            .unwrap_or_default()
    }

    /// Bone transform in skeleton space, without animation applied.
    pub fn rest_transform<S: SceneSource + ?Sized>(&self, scene: &S, index: usize) -> Transform {
        let Some(bone) = self.bones.get(index) else {
            return Transform::IDENTITY;
        };
        let Some(node) = scene.node(bone.node) else {
            return Transform::IDENTITY;
        };
        match (bone.container, &node.kind) {
            (Some(container), NodeKind::PoseBone { rest, .. }) => {
                let container_world = scene
                    .node(container)
                    .map(|c| c.world)
                    .unwrap_or(Transform::IDENTITY);
                container_world.mul_transform(rest)
            }
            _ => node.world,
        }
    }

    /// The exported bone list.
    pub fn output_bones<S: SceneSource + ?Sized>(&self, scene: &S) -> Vec<Bone> {
        (0..self.bones.len())
            .map(|i| {
                let transform = self.rest_transform(scene, i);
                Bone {
                    name: self.name(scene, i),
                    parent_name: self
                        .resolve_parent(scene, i)
                        .map(|p| self.name(scene, p))
                        .unwrap_or_default(),
                    position: transform.translation,
                    orientation: transform.rotation,
                }
            })
            .collect()
    }
}

fn node_name<S: SceneSource + ?Sized>(scene: &S, id: NodeId) -> String {
    scene.node(id).map(|n| n.name.clone()).unwrap_or_default()
}
