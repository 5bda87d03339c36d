//! Trainz Exporter CLI
//!
//! Convert JSON scene snapshots into Trainz import XML.

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use trainz_exporter::scene::NodeKind;
use trainz_exporter::{
    Diagnostics, ErrorHandling, ExportConfig, ExportStatus, Exporter, Scene, SceneSource,
    SelectionMethod,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "trainz-exporter")]
#[command(author, version, about = "Convert 3D scene snapshots into Trainz import XML", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene snapshot to a Trainz import document
    Export {
        /// Input JSON scene snapshot
        #[arg(short, long)]
        scene: PathBuf,

        /// Output XML file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        options: ExportOptions,

        /// Also write the diagnostics to <output>.log
        #[arg(long)]
        write_log: bool,

        /// Write the scene snapshot back here, with marker groups and welds applied
        #[arg(long)]
        update_scene: Option<PathBuf>,
    },

    /// Run all checks without writing any output
    Check {
        /// Input JSON scene snapshot
        #[arg(short, long)]
        scene: PathBuf,

        #[command(flatten)]
        options: ExportOptions,
    },

    /// Show information about a scene snapshot
    Info {
        /// Input JSON scene snapshot
        #[arg(short, long)]
        scene: PathBuf,
    },
}

#[derive(Args)]
struct ExportOptions {
    /// Which nodes are exported
    #[arg(long, value_enum, default_value = "visible")]
    selection: SelectionMethod,

    /// Bake the scene frame range into an animation
    #[arg(long)]
    animation: bool,

    /// Use the world ambient colour instead of the diffuse colour as ambient
    #[arg(long)]
    world_ambient: bool,

    /// Use the mirror colour as emissive colour
    #[arg(long)]
    mirror_as_emit: bool,

    /// What to do about faces without surface
    #[arg(long, value_enum, default_value = "collect")]
    error_handling: ErrorHandling,
}

impl ExportOptions {
    fn config(&self) -> ExportConfig {
        ExportConfig::default()
            .with_selection(self.selection)
            .with_animation(self.animation)
            .with_diffuse_as_ambient(!self.world_ambient)
            .with_mirror_as_emit(self.mirror_as_emit)
            .with_error_handling(self.error_handling)
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn,trainz_exporter=info",
        1 => "warn,trainz_exporter=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Export {
            scene,
            output,
            options,
            write_log,
            update_scene,
        } => export(&scene, &output, &options, write_log, update_scene.as_deref()),
        Commands::Check { scene, options } => check(&scene, &options),
        Commands::Info { scene } => show_scene_info(&scene).map(|()| ExportStatus::Ok),
    };

    match result {
        Ok(ExportStatus::Error) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn export(
    scene_path: &Path,
    output_path: &Path,
    options: &ExportOptions,
    write_log: bool,
    update_scene: Option<&Path>,
) -> Result<ExportStatus, Box<dyn std::error::Error>> {
    println!("Loading scene from {:?}...", scene_path);
    let mut scene = Scene::from_path(scene_path)?;
    println!("  Loaded {} nodes", scene.nodes().len());

    let exporter = Exporter::with_config(options.config());
    let run = exporter.export_to_path(&mut scene, output_path)?;

    print_diagnostics(&run.diagnostics);
    if run.status().allows_output() {
        println!(
            "Exported {} triangles, {} materials, {} bones to {:?}",
            run.model.triangles.len(),
            run.model.materials.len(),
            run.model.bones.len(),
            output_path
        );
    }

    if write_log {
        let mut log_path = output_path.as_os_str().to_owned();
        log_path.push(".log");
        let log: String = run
            .diagnostics
            .iter()
            .map(|d| format!("{}\n", d))
            .collect();
        fs::write(&log_path, log)?;
        println!("  Log: {:?}", log_path);
    }

    if let Some(path) = update_scene {
        fs::write(path, scene.to_json()?)?;
        println!("  Updated scene: {:?}", path);
    }

    println!("Status: {}", run.status());
    Ok(run.status())
}

fn check(
    scene_path: &Path,
    options: &ExportOptions,
) -> Result<ExportStatus, Box<dyn std::error::Error>> {
    let mut scene = Scene::from_path(scene_path)?;
    let run = Exporter::with_config(options.config()).collect(&mut scene);
    print_diagnostics(&run.diagnostics);
    println!("Status: {}", run.status());
    Ok(run.status())
}

fn show_scene_info(scene_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading scene from {:?}...", scene_path);
    let scene = Scene::from_path(scene_path)?;
    let count = |f: fn(&NodeKind) -> bool| scene.nodes().iter().filter(|n| f(&n.kind)).count();
    let settings = scene.settings();

    println!("\nScene Info:");
    println!("  File: {}", settings.file_name);
    println!("  Nodes: {}", scene.nodes().len());
    println!("  Meshes: {}", count(|k| matches!(k, NodeKind::Mesh(_))));
    println!("  Lattices: {}", count(|k| matches!(k, NodeKind::Lattice)));
    println!("  Armatures: {}", count(|k| matches!(k, NodeKind::Armature)));
    println!("  Bones: {}", count(|k| matches!(k, NodeKind::PoseBone { .. })));
    println!("  Materials: {}", scene.materials.len());
    println!(
        "  Frames: {}..={} at {} fps",
        settings.frame_start, settings.frame_end, settings.fps
    );

    Ok(())
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics {
        println!("{}", diagnostic);
    }
}
