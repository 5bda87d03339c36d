//! Synthetic scenes for unit tests.

use super::{
    Face, MapTarget, MaterialData, MeshData, MeshVertex, NodeKind, Scene, SceneSettings,
    TextureSlot, UvLayer,
};
use crate::types::{MaterialId, NodeId, Transform};

pub fn scene() -> Scene {
    Scene::new(SceneSettings {
        file_name: "/work/test loco.blend".to_string(),
        frame_start: 0,
        frame_end: 100,
        ..Default::default()
    })
}

pub fn face(vertices: &[u32], material_slot: usize) -> Face {
    Face {
        vertices: vertices.to_vec(),
        material_slot,
        normal: [0.0, 0.0, 1.0],
        smooth: false,
    }
}

/// Unit quad in the XY plane with one UV layer and one material slot.
pub fn quad(name: &str, material: Option<MaterialId>) -> MeshData {
    let mut mesh = MeshData::new(name);
    for p in [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ] {
        mesh.vertices.push(MeshVertex::new(p, [0.0, 0.0, 1.0]));
    }
    mesh.faces.push(face(&[0, 1, 2, 3], 0));
    mesh.uv_layers.push(UvLayer {
        name: "UVMap".to_string(),
        active_render: true,
        faces: vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]],
    });
    mesh.material_slots.push(material);
    mesh
}

pub fn plain_material(id: u32, name: &str) -> MaterialData {
    MaterialData::new(MaterialId(id), name)
}

/// Material with a single UV-mapped diffuse image.
pub fn textured_material(id: u32, name: &str, path: &str) -> MaterialData {
    MaterialData::new(MaterialId(id), name)
        .with_slot(TextureSlot::image("diffuse", path).with_influence(MapTarget::DiffuseColor, 1.0))
}

pub fn add_mesh(scene: &mut Scene, mesh: MeshData) -> NodeId {
    let name = mesh.name.clone();
    scene.add_node(name, NodeKind::Mesh(mesh))
}

pub fn add_child(scene: &mut Scene, parent: NodeId, name: &str, kind: NodeKind) -> NodeId {
    let id = scene.add_node(name, kind);
    if let Some(node) = scene.node_mut(id) {
        node.parent = Some(parent);
    }
    id
}

pub fn add_pose_bone(
    scene: &mut Scene,
    armature: NodeId,
    parent: Option<NodeId>,
    name: &str,
    rest: Transform,
) -> NodeId {
    let id = scene.add_node(name, NodeKind::PoseBone { armature, rest });
    if let Some(node) = scene.node_mut(id) {
        node.parent = parent;
    }
    id
}

pub fn set_parent(scene: &mut Scene, child: NodeId, parent: NodeId) {
    if let Some(node) = scene.node_mut(child) {
        node.parent = Some(parent);
    }
}
