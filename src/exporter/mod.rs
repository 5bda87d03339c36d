//! Scene to Trainz asset conversion.
//!
//! [`Exporter::collect`] walks a [`SceneSource`] once and builds an
//! [`AssetModel`] together with the [`Diagnostics`] of the run. The model is
//! only written when no error was recorded.

pub mod animation;
pub mod geometry;
pub mod hierarchy;
pub mod materials;
pub mod skinning;
pub mod triangulate;
pub mod validate;

pub use animation::{Animation, AnimationTrack, Event, EventKind, KeyFrame};
pub use geometry::{Attachment, Bone, BoneWeight, Triangle, Vertex};
pub use hierarchy::Skeleton;
pub use materials::{ChannelKind, DecorationTag, Material, TextureChannel};

use crate::diagnostics::{Diagnostics, ExportStatus};
use crate::error::Result;
use crate::naming::{is_attachment, sanitize_mesh_name};
use crate::scene::{NodeKind, SceneNode, SceneSource};
use crate::types::NodeId;
use materials::MaterialSet;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use validate::Collected;

/// Which nodes take part in the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SelectionMethod {
    #[default]
    Visible,
    Selected,
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMethod::Visible => f.write_str("visible"),
            SelectionMethod::Selected => f.write_str("selected"),
        }
    }
}

/// What to do about faces without surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ErrorHandling {
    /// Report only.
    None,
    /// Gather their vertices in a marker vertex group.
    #[default]
    Collect,
    /// Weld their vertices in the scene.
    Correct,
}

/// Export configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub selection: SelectionMethod,
    /// Bake the frame range into an animation section.
    pub export_animation: bool,
    /// Use the diffuse colour as ambient colour instead of the world ambient.
    pub diffuse_as_ambient: bool,
    /// Use the mirror colour as emissive colour instead of the diffuse colour.
    pub mirror_as_emit: bool,
    pub error_handling: ErrorHandling,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            selection: SelectionMethod::Visible,
            export_animation: false,
            diffuse_as_ambient: true,
            mirror_as_emit: false,
            error_handling: ErrorHandling::Collect,
        }
    }
}

impl ExportConfig {
    pub fn with_selection(mut self, selection: SelectionMethod) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_animation(mut self, export_animation: bool) -> Self {
        self.export_animation = export_animation;
        self
    }

    pub fn with_diffuse_as_ambient(mut self, diffuse_as_ambient: bool) -> Self {
        self.diffuse_as_ambient = diffuse_as_ambient;
        self
    }

    pub fn with_mirror_as_emit(mut self, mirror_as_emit: bool) -> Self {
        self.mirror_as_emit = mirror_as_emit;
        self
    }

    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = error_handling;
        self
    }

    /// Whether `node` passes the selection method.
    pub fn includes(&self, node: &SceneNode) -> bool {
        match self.selection {
            SelectionMethod::Visible => node.visible,
            SelectionMethod::Selected => node.selected,
        }
    }
}

/// Meshes and attachment empties taking part in the export, in scene order.
pub fn exported_nodes<S: SceneSource + ?Sized>(
    scene: &S,
    config: &ExportConfig,
) -> (Vec<NodeId>, Vec<NodeId>) {
    let mut meshes = Vec::new();
    let mut attachments = Vec::new();
    for node in scene.nodes().iter().filter(|n| config.includes(n)) {
        match node.kind {
            NodeKind::Mesh(_) => meshes.push(node.id),
            NodeKind::Empty if is_attachment(&node.name) => attachments.push(node.id),
            _ => {}
        }
    }
    (meshes, attachments)
}

/// The converted asset, ready to be serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetModel {
    pub mesh_name: String,
    pub triangles: Vec<Triangle>,
    pub attachments: Vec<Attachment>,
    pub bones: Vec<Bone>,
    pub materials: Vec<Material>,
    pub animation: Option<Animation>,
}

/// Result of collecting a scene.
#[derive(Debug, Clone)]
pub struct ExportRun {
    pub model: AssetModel,
    pub diagnostics: Diagnostics,
}

impl ExportRun {
    pub fn status(&self) -> ExportStatus {
        self.diagnostics.status()
    }

    /// Serialize the model, regardless of status.
    pub fn write_to<W: Write>(&self, out: W) -> Result<()> {
        crate::export::write_document(&self.model, out)
    }
}

/// The scene exporter.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    config: ExportConfig,
}

impl Exporter {
    /// Create an exporter with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Convert the scene and run every check.
    ///
    /// The scene is only touched to refresh marker vertex groups and, with
    /// [`ErrorHandling::Correct`], to weld surfaceless faces.
    pub fn collect<S: SceneSource + ?Sized>(&self, scene: &mut S) -> ExportRun {
        let mut diagnostics = Diagnostics::new();
        let mesh_name = sanitize_mesh_name(&scene.settings().file_name);
        tracing::info!("collecting \"{}\"", mesh_name);

        let (meshes, attachment_nodes) = exported_nodes(&*scene, &self.config);
        tracing::debug!(
            "{} meshes, {} attachments",
            meshes.len(),
            attachment_nodes.len()
        );

        let mut skeleton = Skeleton::collect(&*scene, &self.config);
        skeleton.resolve_root(&*scene, &mut diagnostics);

        validate::prepare_meshes(scene, &meshes, self.config.error_handling, &mut diagnostics);
        let material_set = MaterialSet::collect(scene, &meshes, &mut diagnostics);

        let mut triangles = Vec::new();
        for &id in &meshes {
            let Some(node) = scene.node(id) else {
                continue;
            };
            let Some(mesh) = node.mesh() else {
                continue;
            };
            let weights = skinning::vertex_weights(&*scene, node, mesh, &skeleton);
            let slots = material_set.slot_indices(&mesh.material_slots, mesh.double_sided);
            triangles.extend(triangulate::triangulate(node, mesh, &slots, &weights));
        }

        let world_ambient = scene.settings().world_ambient;
        let materials: Vec<Material> = material_set
            .keys()
            .iter()
            .filter_map(|key| {
                let data = scene.material(key.material)?;
                Some(Material::build(
                    data,
                    key.two_sided,
                    &self.config,
                    world_ambient,
                    &mut diagnostics,
                ))
            })
            .collect();

        let attachments: Vec<Attachment> = attachment_nodes
            .iter()
            .filter_map(|&id| scene.node(id))
            .map(|node| Attachment {
                name: node.name.to_lowercase(),
                position: node.world.translation,
                orientation: node.world.rotation,
            })
            .collect();

        let bones = skeleton.output_bones(&*scene);
        let animation = if self.config.export_animation {
            animation::bake(&*scene, &skeleton, &mut diagnostics)
        } else {
            None
        };

        let events = animation.as_ref().map(|a| a.events.as_slice()).unwrap_or(&[]);
        let collected = Collected {
            selection: self.config.selection,
            meshes: &meshes,
            attachments: &attachment_nodes,
            skeleton: &skeleton,
            materials: &material_set,
            events,
        };
        validate::validate(scene, &collected, &mut diagnostics);

        tracing::info!(
            "collected {} triangles, {} materials, {} bones: {}",
            triangles.len(),
            materials.len(),
            bones.len(),
            diagnostics.status()
        );

        ExportRun {
            model: AssetModel {
                mesh_name,
                triangles,
                attachments,
                bones,
                materials,
                animation,
            },
            diagnostics,
        }
    }

    /// Collect the scene and write the document to `out` unless the run
    /// failed.
    pub fn export<S: SceneSource + ?Sized, W: Write>(
        &self,
        scene: &mut S,
        out: W,
    ) -> Result<ExportRun> {
        let run = self.collect(scene);
        if run.status().allows_output() {
            run.write_to(out)?;
        }
        Ok(run)
    }

    /// Like [`export`](Self::export), writing to a file.
    ///
    /// The file is not created when the run failed.
    pub fn export_to_path<S: SceneSource + ?Sized>(
        &self,
        scene: &mut S,
        path: impl AsRef<Path>,
    ) -> Result<ExportRun> {
        let run = self.collect(scene);
        if run.status().allows_output() {
            let mut writer = BufWriter::new(File::create(path.as_ref())?);
            run.write_to(&mut writer)?;
            writer.flush()?;
            tracing::info!("wrote {}", path.as_ref().display());
        } else {
            tracing::warn!("export failed, nothing written");
        }
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::scene::{fixtures, Scene, TextBlock, TransformKey};
    use crate::types::{MaterialId, Transform};
    use glam::Vec3;

    /// A door panel hanging below a body bone, with a texture on disk.
    fn loco(dir: &Path) -> Scene {
        let texture = dir.join("wood.png");
        image::RgbImage::new(2, 2).save(&texture).unwrap();

        let mut scene = fixtures::scene();
        scene.settings.frame_end = 2;
        scene.add_material(fixtures::textured_material(
            0,
            "Wood",
            &texture.to_string_lossy(),
        ));
        let body = scene.add_node("b.r.body", NodeKind::Lattice);
        scene.node_mut(body).unwrap().animation.keys = vec![
            TransformKey {
                frame: 0,
                transform: Transform::IDENTITY,
            },
            TransformKey {
                frame: 2,
                transform: Transform::from_translation(Vec3::new(0.0, 0.0, 1.0)),
            },
        ];
        let panel = fixtures::add_mesh(&mut scene, fixtures::quad("panel", Some(MaterialId(0))));
        fixtures::set_parent(&mut scene, panel, body);
        let light = fixtures::add_child(&mut scene, body, "a.light", NodeKind::Empty);
        scene.node_mut(light).unwrap().world = Transform::from_translation(Vec3::new(0.0, 2.0, 0.0));
        scene.texts.push(TextBlock {
            name: "events".into(),
            body: "1 sound_horn toot".into(),
        });
        scene
    }

    #[test]
    fn test_collect_builds_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = loco(dir.path());
        let exporter = Exporter::with_config(ExportConfig::default().with_animation(true));
        let run = exporter.collect(&mut scene);

        assert_eq!(run.status(), ExportStatus::Ok, "{:?}", run.diagnostics);
        let model = &run.model;
        assert_eq!(model.mesh_name, "testloco");
        assert_eq!(model.triangles.len(), 2);
        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.materials[0].name, "wood.m.onetex");
        assert_eq!(model.bones.len(), 1);
        assert_eq!(model.attachments[0].name, "a.light");
        let animation = model.animation.as_ref().unwrap();
        assert_eq!(animation.tracks[0].keys.len(), 3);
        assert_eq!(animation.events.len(), 1);

        let vertex = &model.triangles[0].vertices[0];
        assert_eq!(vertex.weights, vec![BoneWeight { bone: 0, weight: 1.0 }]);
    }

    #[test]
    fn test_export_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = loco(dir.path());
        let mut out = Vec::new();
        let run = Exporter::new().export(&mut scene, &mut out).unwrap();

        assert!(run.status().allows_output());
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.starts_with("<trainzImport>\n"));
        assert!(xml.contains("<name>testloco</name>"));
        assert!(xml.contains("<name>wood.m.onetex</name>"));
        assert!(!xml.contains("<animations>"));
    }

    #[test]
    fn test_failed_run_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = fixtures::scene();
        let path = dir.path().join("out.xml");
        let run = Exporter::new().export_to_path(&mut scene, &path).unwrap();

        assert_eq!(run.status(), ExportStatus::Error);
        assert!(run
            .diagnostics
            .contains(Severity::Error, "no Mesh visible - nothing to export"));
        assert!(!path.exists());
    }

    #[test]
    fn test_export_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = loco(dir.path());
        let path = dir.path().join("loco.xml");
        Exporter::new().export_to_path(&mut scene, &path).unwrap();
        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.ends_with("</trainzImport>\n"));
    }

    #[test]
    fn test_selected_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = loco(dir.path());
        let exporter =
            Exporter::with_config(ExportConfig::default().with_selection(SelectionMethod::Selected));
        let run = exporter.collect(&mut scene);
        assert!(run
            .diagnostics
            .contains(Severity::Error, "no Mesh selected - nothing to export"));
    }

    #[test]
    fn test_attachment_prefix_is_case_sensitive() {
        let mut scene = fixtures::scene();
        let panel = fixtures::add_mesh(&mut scene, fixtures::quad("panel", None));
        let lamp = scene.add_node("a.Lamp", NodeKind::Empty);
        scene.add_node("A.horn", NodeKind::Empty);

        let (meshes, attachments) = exported_nodes(&scene, &ExportConfig::default());
        assert_eq!(meshes, vec![panel]);
        assert_eq!(attachments, vec![lamp]);
    }

    #[test]
    fn test_rerun_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = loco(dir.path());
        let exporter = Exporter::with_config(ExportConfig::default().with_animation(true));
        let first = exporter.collect(&mut scene);
        let second = exporter.collect(&mut scene);
        assert_eq!(first.model, second.model);
    }
}
