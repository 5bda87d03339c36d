//! # Trainz Exporter
//!
//! A Rust library for converting 3D scenes into the Trainz import XML format.
//!
//! ## Overview
//!
//! The library reads a scene (meshes, bone hierarchy, materials, keyframes)
//! through the [`SceneSource`] trait, converts it into an [`AssetModel`] and
//! writes the `<trainzImport>` document consumed by the Trainz mesh importer.
//! Problems found along the way are reported as [`Diagnostics`]; a run with
//! an error diagnostic produces no output.
//!
//! ## Quick Start
//!
//! ```ignore
//! use trainz_exporter::{ExportConfig, Exporter, Scene};
//!
//! // Load a scene snapshot
//! let mut scene = Scene::from_path("loco.json")?;
//!
//! // Export with animation
//! let exporter = Exporter::with_config(ExportConfig::default().with_animation(true));
//! let run = exporter.export_to_path(&mut scene, "loco.xml")?;
//!
//! for diagnostic in &run.diagnostics {
//!     println!("{}", diagnostic);
//! }
//! ```
//!
//! ## Library Integration
//!
//! To export straight from a host application, implement [`SceneSource`] for
//! the host's scene and pass it to [`Exporter::collect`] or
//! [`Exporter::export`].

pub mod diagnostics;
pub mod error;
pub mod export;
pub mod exporter;
pub mod naming;
pub mod scene;
pub mod types;

// Re-export main types for convenience
pub use diagnostics::{Diagnostic, Diagnostics, ExportStatus, Severity};
pub use error::{ExportError, Result};
pub use export::write_document;
pub use exporter::{
    AssetModel, ErrorHandling, ExportConfig, ExportRun, Exporter, SelectionMethod,
};
pub use scene::{NodeKind, Scene, SceneNode, SceneSource};
pub use types::{MaterialId, NodeId, Transform};

/// Load a JSON scene snapshot and export it to `output` with `config`.
pub fn export_scene<P: AsRef<std::path::Path>, Q: AsRef<std::path::Path>>(
    scene_path: P,
    output: Q,
    config: ExportConfig,
) -> Result<ExportRun> {
    let mut scene = Scene::from_path(scene_path)?;
    Exporter::with_config(config).export_to_path(&mut scene, output)
}
