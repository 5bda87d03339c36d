//! Per-vertex bone weights.
//!
//! A vertex group drives a bone when its name equals the bone's name.
//! Vertices without any such group are bound rigidly to the nearest Trainz
//! bone above their mesh.

use super::geometry::BoneWeight;
use super::hierarchy::Skeleton;
use crate::scene::{MeshData, SceneNode, SceneSource};

/// Maximum number of bone streams per vertex Trainz accepts.
pub const MAX_INFLUENCES: usize = 4;

/// For each vertex group of `mesh`, the bone it drives.
///
/// The first bone in skeleton order with a matching name wins.
pub fn group_bones<S: SceneSource + ?Sized>(
    scene: &S,
    mesh: &MeshData,
    skeleton: &Skeleton,
) -> Vec<Option<usize>> {
    mesh.vertex_groups
        .iter()
        .map(|group| (0..skeleton.len()).find(|&i| skeleton.name(scene, i) == *group))
        .collect()
}

/// Normalized bone weights for every vertex of a mesh node.
///
/// Returns an empty list when the scene has no Trainz bones.
pub fn vertex_weights<S: SceneSource + ?Sized>(
    scene: &S,
    node: &SceneNode,
    mesh: &MeshData,
    skeleton: &Skeleton,
) -> Vec<Vec<BoneWeight>> {
    if skeleton.is_empty() {
        return Vec::new();
    }
    let group_bone = group_bones(scene, mesh, skeleton);
    let rigid = skeleton.nearest_bone_from(scene, node.parent);

    mesh.vertices
        .iter()
        .map(|vertex| {
            let matched: Vec<BoneWeight> = vertex
                .groups
                .iter()
                .filter_map(|influence| {
                    let bone = group_bone.get(influence.group).copied().flatten()?;
                    Some(BoneWeight {
                        bone,
                        weight: influence.weight,
                    })
                })
                .collect();

            if matched.is_empty() {
                return rigid
                    .map(|bone| vec![BoneWeight { bone, weight: 1.0 }])
                    .unwrap_or_default();
            }

            let sum: f32 = matched.iter().map(|w| w.weight).sum();
            let factor = if sum > 0.0 { 1.0 / sum } else { 1.0 };
            matched
                .into_iter()
                .map(|w| BoneWeight {
                    bone: w.bone,
                    weight: w.weight * factor,
                })
                .collect()
        })
        .collect()
}
