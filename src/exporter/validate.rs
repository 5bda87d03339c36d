//! Scene checks run during collection.
//!
//! Checks only record diagnostics; none of them aborts the run. Faulty
//! vertices are gathered in marker vertex groups so they can be found in the
//! scene, and those groups are recreated on every run.

use super::animation::Event;
use super::hierarchy::Skeleton;
use super::materials::MaterialSet;
use super::skinning::{group_bones, MAX_INFLUENCES};
use super::{ErrorHandling, SelectionMethod};
use crate::diagnostics::Diagnostics;
use crate::naming::unrecommended_chars;
use crate::scene::{MapTarget, MappingMode, MaterialData, SceneSource, TextureKind};
use crate::types::{approx_eq, MaterialId, NodeId, WELD_DISTANCE};
use glam::Vec3;

pub const SURFACELESS_GROUP: &str = "ERROR_surfaceless_Polygons";
pub const NO_MATERIAL_GROUP: &str = "ERROR_no_Material_assigned";
pub const TOO_MANY_INFLUENCES_GROUP: &str = "WARNING_to_much_Influences";

/// Marker groups removed before each run.
pub const MARKER_GROUPS: [&str; 3] = [
    SURFACELESS_GROUP,
    NO_MATERIAL_GROUP,
    TOO_MANY_INFLUENCES_GROUP,
];

/// Clears the vertex selection of a mesh and restores it when dropped.
///
/// The selection is restored by vertex position, so it survives edits that
/// renumber vertices.
pub struct SelectionScope<'a, S: SceneSource + ?Sized> {
    scene: &'a mut S,
    mesh: NodeId,
    saved: Vec<Vec3>,
}

impl<'a, S: SceneSource + ?Sized> SelectionScope<'a, S> {
    pub fn new(scene: &'a mut S, mesh: NodeId) -> Self {
        let saved = match scene.mesh_mut(mesh) {
            Some(data) => {
                let saved = data.selected_positions();
                data.deselect_all();
                saved
            }
            None => Vec::new(),
        };
        Self { scene, mesh, saved }
    }

    pub fn scene(&mut self) -> &mut S {
        &mut *self.scene
    }
}

impl<S: SceneSource + ?Sized> Drop for SelectionScope<'_, S> {
    fn drop(&mut self) {
        let Some(mesh) = self.scene.mesh_mut(self.mesh) else {
            return;
        };
        for vertex in &mut mesh.vertices {
            let position = Vec3::from(vertex.position);
            vertex.selected = self.saved.iter().any(|saved| {
                approx_eq(saved.x, position.x)
                    && approx_eq(saved.y, position.y)
                    && approx_eq(saved.z, position.z)
            });
        }
    }
}

/// Remove stale marker groups and deal with surfaceless faces.
pub fn prepare_meshes<S: SceneSource + ?Sized>(
    scene: &mut S,
    meshes: &[NodeId],
    policy: ErrorHandling,
    diagnostics: &mut Diagnostics,
) {
    for &id in meshes {
        let Some(mesh) = scene.mesh_mut(id) else {
            continue;
        };
        for group in MARKER_GROUPS {
            mesh.remove_vertex_group(group);
        }

        let mut vertices: Vec<u32> = mesh
            .faces
            .iter()
            .filter(|f| f.is_degenerate())
            .flat_map(|f| f.vertices.iter().copied())
            .collect();
        if vertices.is_empty() {
            continue;
        }
        vertices.sort_unstable();
        vertices.dedup();
        let mesh_name = mesh.name.clone();
        let object = scene.node(id).map(|n| n.name.clone()).unwrap_or_default();

        diagnostics.warning(format!(
            "surfaceless Polygon(s) in Object \"{}\", Mesh \"{}\" detected",
            object, mesh_name
        ));
        match policy {
            ErrorHandling::None => {}
            ErrorHandling::Collect => {
                if let Some(mesh) = scene.mesh_mut(id) {
                    mesh.add_to_vertex_group(SURFACELESS_GROUP, vertices);
                }
                diagnostics.info(format!(
                    "Vertices of surfaceless Polygon(s) gathered in Vertex Group \"{}\"",
                    SURFACELESS_GROUP
                ));
            }
            ErrorHandling::Correct => {
                let mut scope = SelectionScope::new(&mut *scene, id);
                if let Some(mesh) = scope.scene().mesh_mut(id) {
                    for &vi in &vertices {
                        if let Some(vertex) = mesh.vertices.get_mut(vi as usize) {
                            vertex.selected = true;
                        }
                    }
                }
                match scope.scene().weld_selected(id, WELD_DISTANCE) {
                    Ok(removed) => {
                        tracing::debug!("welded {} vertices in \"{}\"", removed, object);
                        diagnostics.info("surfaceless Polygon(s) removed");
                    }
                    Err(e) => diagnostics.warning(format!(
                        "surfaceless Polygon(s) in Object \"{}\", Mesh \"{}\" could not be removed: {}",
                        object, mesh_name, e
                    )),
                }
            }
        }
    }
}

/// What was collected for the run, as needed by the checks.
#[derive(Debug, Clone, Copy)]
pub struct Collected<'a> {
    pub selection: SelectionMethod,
    pub meshes: &'a [NodeId],
    pub attachments: &'a [NodeId],
    pub skeleton: &'a Skeleton,
    pub materials: &'a MaterialSet,
    pub events: &'a [Event],
}

/// Run every check over the collected scene content.
pub fn validate<S: SceneSource + ?Sized>(
    scene: &mut S,
    collected: &Collected<'_>,
    diagnostics: &mut Diagnostics,
) {
    if collected.meshes.is_empty() {
        diagnostics.error(format!(
            "no Mesh {} - nothing to export",
            collected.selection
        ));
    }
    check_mesh_surfaces(&*scene, collected, diagnostics);
    check_hierarchy(&*scene, collected, diagnostics);
    check_materials(&*scene, collected, diagnostics);
    check_influences(scene, collected, diagnostics);
    check_names(&*scene, collected, diagnostics);
}

/// Exported materials of a mesh, in slot order.
fn mesh_materials<'s, S: SceneSource + ?Sized>(
    scene: &'s S,
    slots: &'s [Option<MaterialId>],
    exported: &'s MaterialSet,
) -> impl Iterator<Item = &'s MaterialData> + 's {
    slots
        .iter()
        .flatten()
        .filter(|&&m| exported.exports(m))
        .filter_map(|&m| scene.material(m))
}

fn check_mesh_surfaces<S: SceneSource + ?Sized>(
    scene: &S,
    collected: &Collected<'_>,
    diagnostics: &mut Diagnostics,
) {
    for &id in collected.meshes {
        let Some(node) = scene.node(id) else {
            continue;
        };
        let Some(mesh) = node.mesh() else {
            continue;
        };

        if mesh.active_uv_layer().is_none() {
            let uv_mapped = mesh_materials(scene, &mesh.material_slots, collected.materials)
                .any(|m| {
                    m.enabled_slots()
                        .any(|s| s.is_image() && s.mapping == MappingMode::Uv)
                });
            if uv_mapped {
                diagnostics.error(format!(
                    "no UV-Layer for UV-Mapped Object \"{}\", Mesh \"{}\"",
                    node.name, mesh.name
                ));
            }
        }

        if mesh.double_sided
            && mesh_materials(scene, &mesh.material_slots, collected.materials)
                .next()
                .is_some()
        {
            diagnostics.info(format!(
                "Object \"{}\" will be exported with Double Sided Faces",
                node.name
            ));
        }
    }
}

fn check_hierarchy<S: SceneSource + ?Sized>(
    scene: &S,
    collected: &Collected<'_>,
    diagnostics: &mut Diagnostics,
) {
    if collected.skeleton.root().is_none() {
        return;
    }
    for &id in collected.meshes {
        let Some(node) = scene.node(id) else {
            continue;
        };
        match node.parent {
            None => diagnostics.error(format!(
                "if Trainz Bones shall be exported, Object \"{}\" must have a parent",
                node.name
            )),
            Some(parent) => {
                if collected
                    .skeleton
                    .nearest_bone_from(scene, Some(parent))
                    .is_none()
                {
                    diagnostics.error(format!(
                        "the parent list for Mesh \"{}\" must include at least one Trainz Bone",
                        node.name
                    ));
                }
            }
        }
    }
}

fn quoted(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("\"{}\"", n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_materials<S: SceneSource + ?Sized>(
    scene: &S,
    collected: &Collected<'_>,
    diagnostics: &mut Diagnostics,
) {
    let mut ids: Vec<MaterialId> = Vec::new();
    for key in collected.materials.keys() {
        if !ids.contains(&key.material) {
            ids.push(key.material);
        }
    }
    let materials: Vec<&MaterialData> = ids.iter().filter_map(|&id| scene.material(id)).collect();

    for (i, a) in materials.iter().enumerate() {
        for b in &materials[i + 1..] {
            if a.name.to_lowercase() == b.name.to_lowercase() {
                diagnostics.error(format!(
                    "Material names \"{}\" and \"{}\" are identical if compared case-insensitive",
                    a.name, b.name
                ));
            }
        }
    }

    for material in &materials {
        check_sidedness(scene, collected, material, diagnostics);
        check_texture_slots(scene, material, diagnostics);
    }
}

fn check_sidedness<S: SceneSource + ?Sized>(
    scene: &S,
    collected: &Collected<'_>,
    material: &MaterialData,
    diagnostics: &mut Diagnostics,
) {
    let mut single: Vec<&str> = Vec::new();
    let mut double: Vec<&str> = Vec::new();
    for &id in collected.meshes {
        let Some(node) = scene.node(id) else {
            continue;
        };
        let Some(mesh) = node.mesh() else {
            continue;
        };
        if !mesh.material_slots.contains(&Some(material.id)) {
            continue;
        }
        if mesh.double_sided {
            double.push(&node.name);
        } else {
            single.push(&node.name);
        }
    }
    if !single.is_empty() && !double.is_empty() {
        diagnostics.error(format!(
            "Material \"{}\" is used for Single AND Double Sided Objects; \
             Single Sided: {}, Double Sided: {}",
            material.name,
            quoted(&single),
            quoted(&double)
        ));
    }
}

fn check_texture_slots<S: SceneSource + ?Sized>(
    scene: &S,
    material: &MaterialData,
    diagnostics: &mut Diagnostics,
) {
    let mut procedural: Vec<&str> = Vec::new();
    let mut missing: Vec<&str> = Vec::new();
    let mut no_alpha: Vec<&str> = Vec::new();
    let mut needs_uv: Vec<&str> = Vec::new();
    let mut needs_uv_or_reflection: Vec<&str> = Vec::new();

    for slot in material.enabled_slots() {
        match &slot.kind {
            TextureKind::Procedural(_) => {
                procedural.push(&slot.texture);
                continue;
            }
            TextureKind::None => continue,
            TextureKind::Image => {}
        }

        if let Some(image) = &slot.image {
            if !scene.image_exists(image) {
                missing.push(&slot.texture);
            } else if image.use_alpha && scene.image_has_alpha_plane(image) == Some(false) {
                no_alpha.push(&slot.texture);
            }
        }

        let uv_only = [
            MapTarget::Alpha,
            MapTarget::SpecularColor,
            MapTarget::Specular,
            MapTarget::Normal,
        ];
        if slot.mapping != MappingMode::Uv && uv_only.iter().any(|&t| slot.maps(t)) {
            needs_uv.push(&slot.texture);
        }
        if !matches!(slot.mapping, MappingMode::Uv | MappingMode::Reflection)
            && slot.maps(MapTarget::DiffuseColor)
        {
            needs_uv_or_reflection.push(&slot.texture);
        }
    }

    if !procedural.is_empty() {
        diagnostics.error(format!(
            "procedural texture(s) assigned to Material \"{}\", Texture(s) {}",
            material.name,
            quoted(&procedural)
        ));
    }
    if !missing.is_empty() {
        diagnostics.error(format!(
            "image file(s) not found for Material \"{}\", Texture(s) {}",
            material.name,
            quoted(&missing)
        ));
    }
    if !no_alpha.is_empty() {
        diagnostics.warning(format!(
            "no alpha plane in image(s) for Material \"{}\", Texture(s) {}",
            material.name,
            quoted(&no_alpha)
        ));
    }
    if !needs_uv.is_empty() {
        diagnostics.error(format!(
            "UV mapping needed for Material \"{}\", Texture(s) {}",
            material.name,
            quoted(&needs_uv)
        ));
    }
    if !needs_uv_or_reflection.is_empty() {
        diagnostics.error(format!(
            "UV or Reflection Mapping needed for Material \"{}\", Texture(s) {}",
            material.name,
            quoted(&needs_uv_or_reflection)
        ));
    }
}

/// Tag vertices driven by more than [`MAX_INFLUENCES`] bones.
fn check_influences<S: SceneSource + ?Sized>(
    scene: &mut S,
    collected: &Collected<'_>,
    diagnostics: &mut Diagnostics,
) {
    if collected.skeleton.is_empty() {
        return;
    }
    for &id in collected.meshes {
        let Some(node) = scene.node(id) else {
            continue;
        };
        let Some(mesh) = node.mesh() else {
            continue;
        };
        let group_bone = group_bones(&*scene, mesh, collected.skeleton);

        let mut tagged: Vec<u32> = Vec::new();
        for (index, vertex) in mesh.vertices.iter().enumerate() {
            let groups: Vec<&str> = vertex
                .groups
                .iter()
                .filter(|g| group_bone.get(g.group).copied().flatten().is_some())
                .filter_map(|g| mesh.vertex_groups.get(g.group).map(String::as_str))
                .collect();
            if groups.len() > MAX_INFLUENCES {
                diagnostics.warning(format!(
                    "Vertex {} in Mesh \"{}\" is influenced by more than {} vertex groups: \
                     Object \"{}\", Vertex Group {}",
                    index,
                    mesh.name,
                    MAX_INFLUENCES,
                    node.name,
                    quoted(&groups)
                ));
                tagged.push(index as u32);
            }
        }
        if tagged.is_empty() {
            continue;
        }

        diagnostics.info(format!(
            "Vertices with too many influences gathered in Vertex Group \"{}\" \
             of Object \"{}\", Mesh \"{}\"",
            TOO_MANY_INFLUENCES_GROUP, node.name, mesh.name
        ));
        if let Some(mesh) = scene.mesh_mut(id) {
            mesh.add_to_vertex_group(TOO_MANY_INFLUENCES_GROUP, tagged);
        }
    }
}

fn report_chars(diagnostics: &mut Diagnostics, label: String, text: &str) {
    let chars = unrecommended_chars(text);
    if !chars.is_empty() {
        diagnostics.info(format!(
            "{} contains unrecommended characters: {}",
            label, chars
        ));
    }
}

fn check_names<S: SceneSource + ?Sized>(
    scene: &S,
    collected: &Collected<'_>,
    diagnostics: &mut Diagnostics,
) {
    for &id in collected.attachments {
        let Some(node) = scene.node(id) else {
            continue;
        };
        report_chars(diagnostics, format!("Empty \"{}\"", node.name), &node.name);
        let lowered = node.name.to_lowercase();
        if lowered != node.name {
            diagnostics.warning(format!(
                "Empty \"{}\" exported as \"{}\"",
                node.name, lowered
            ));
        }
    }

    let mut seen: Vec<MaterialId> = Vec::new();
    for key in collected.materials.keys() {
        if seen.contains(&key.material) {
            continue;
        }
        seen.push(key.material);
        let Some(material) = scene.material(key.material) else {
            continue;
        };
        report_chars(
            diagnostics,
            format!("Material \"{}\"", material.name),
            &material.name,
        );
        for slot in material.enabled_slots().filter(|s| s.is_image()) {
            if let Some(image) = &slot.image {
                report_chars(
                    diagnostics,
                    format!("texture path \"{}\"", image.path),
                    &image.path,
                );
            }
        }
    }

    let skeleton = collected.skeleton;
    for (index, bone) in skeleton.bones().iter().enumerate() {
        let name = skeleton.name(scene, index);
        let label = match bone.container {
            None => skeleton.describe(scene, index),
            Some(container) => format!(
                "Bone \"{}\" in Armature \"{}\"",
                name,
                scene.node(container).map(|n| n.name.as_str()).unwrap_or_default()
            ),
        };
        report_chars(diagnostics, label, &name);
    }

    for event in collected.events {
        report_chars(
            diagnostics,
            format!("Event trigger \"{}\"", event.trigger),
            &event.trigger,
        );
    }
}
