//! Yolobox: draw labeled boxes on images, export a YOLO dataset.
//!
//! A workspace holds imported images, one annotation record per image and
//! an ordered label registry. Submitted boxes are normalized against the
//! image they belong to before they are stored, and an export packs every
//! image, its YOLO label lines, `classes.txt` and `data.yaml` into one zip.
//!
//! # Modules
//!
//! - [`ir`]: Core types (ImageId, ClassId, BBoxXYWH, LabeledBox, Annotation)
//! - [`labels`]: Label registry
//! - [`normalize`]: Box sanitization against image bounds
//! - [`store`]: Annotation persistence
//! - [`thumbnail`]: Preview projection and image listing
//! - [`yolo`]: YOLO label line encoding
//! - [`export`]: Dataset archive export
//! - [`images`]: Image store
//! - [`config`]: Workspace layout
//! - [`error`]: Error types for yolobox operations

pub mod config;
pub mod error;
pub mod export;
pub mod images;
pub mod ir;
pub mod labels;
pub mod normalize;
pub mod store;
pub mod thumbnail;
pub mod yolo;

#[cfg(test)]
mod test_support;

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};

pub use error::YoloboxError;

use config::Workspace;
use images::ImportReport;
use ir::ImageId;

/// The yolobox CLI application.
#[derive(Parser)]
#[command(name = "yolobox")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Workspace directory holding images, annotations and labels.
    #[arg(long, global = true, env = config::ROOT_ENV, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Import image files into the workspace.
    Import(ImportArgs),

    /// Import every image found in a zip archive.
    ImportZip(ImportZipArgs),

    /// List images, newest first, with their preview boxes.
    List(ListArgs),

    /// Show or register labels.
    #[command(subcommand)]
    Labels(LabelsCommand),

    /// Read or replace the boxes of one image.
    #[command(subcommand)]
    Annotation(AnnotationCommand),

    /// Export the workspace as a zipped YOLO dataset.
    Export(ExportArgs),
}

#[derive(clap::Args)]
struct ImportArgs {
    /// Image files to import.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(clap::Args)]
struct ImportZipArgs {
    /// Zip archive to extract images from.
    archive: PathBuf,
}

#[derive(clap::Args)]
struct ListArgs {
    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum LabelsCommand {
    /// Print every label with its class id.
    List(ListArgs),

    /// Register a label, or report the id it already has.
    Add {
        /// Label name; surrounding whitespace is ignored.
        name: String,
    },
}

#[derive(Subcommand)]
enum AnnotationCommand {
    /// Print the annotation of an image as JSON.
    Get {
        /// Image id as shown by `list`.
        image_id: String,
    },

    /// Replace the boxes of an image.
    ///
    /// The body is a JSON object `{"boxes": [{"classId", "x", "y", "width",
    /// "height"}, ...]}` read from `--file` or standard input.
    Put {
        /// Image id as shown by `list`.
        image_id: String,

        /// File holding the request body (default: standard input).
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Where to write the archive (default: <root>/exports/yolo_dataset.zip).
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Run the yolobox CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), YoloboxError> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("yolobox {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Annotate images with labeled boxes and export YOLO datasets.");
        println!();
        println!("Run 'yolobox --help' for usage information.");
        return Ok(());
    };

    let workspace = Workspace::open(&cli.root)?;
    match command {
        Commands::Import(args) => {
            let report = workspace.image_store().import_files(&args.files);
            print_import_report(&report)
        }
        Commands::ImportZip(args) => {
            let file = File::open(&args.archive)?;
            let report = workspace.image_store().import_zip(io::BufReader::new(file))?;
            print_import_report(&report)
        }
        Commands::List(args) => run_list(&workspace, args),
        Commands::Labels(command) => run_labels(&workspace, command),
        Commands::Annotation(command) => run_annotation(&workspace, command),
        Commands::Export(args) => run_export(&workspace, args),
    }
}

fn print_import_report(report: &ImportReport) -> Result<(), YoloboxError> {
    print_json(&json!({
        "saved": report.saved,
        "total": report.saved.len(),
        "skipped": report.skipped,
    }))
}

fn run_list(workspace: &Workspace, args: ListArgs) -> Result<(), YoloboxError> {
    let summaries = thumbnail::list_images(&workspace.annotation_store())?;

    match args.output {
        OutputFormat::Json => print_json(&json!({ "images": summaries })),
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!("No images.");
            }
            for summary in &summaries {
                let status = if summary.has_annotations {
                    format!("{} box(es) shown", summary.thumb_boxes.len())
                } else {
                    "not annotated".to_string()
                };
                println!(
                    "{}  {}x{}  {}",
                    summary.id, summary.width, summary.height, status
                );
            }
            Ok(())
        }
    }
}

fn run_labels(workspace: &Workspace, command: LabelsCommand) -> Result<(), YoloboxError> {
    let registry = workspace.label_registry();

    match command {
        LabelsCommand::List(args) => {
            let labels = registry.list()?;
            match args.output {
                OutputFormat::Json => print_json(&json!({ "labels": labels })),
                OutputFormat::Text => {
                    for label in &labels {
                        println!("{}\t{}", label.id, label.name);
                    }
                    Ok(())
                }
            }
        }
        LabelsCommand::Add { name } => {
            let added = registry.add(&name)?;
            print_json(&added)
        }
    }
}

fn run_annotation(workspace: &Workspace, command: AnnotationCommand) -> Result<(), YoloboxError> {
    let store = workspace.annotation_store();

    match command {
        AnnotationCommand::Get { image_id } => {
            let annotation = store.get(&ImageId::new(image_id))?;
            print_json(&annotation)
        }
        AnnotationCommand::Put { image_id, file } => {
            let body = match file {
                Some(path) => fs::read_to_string(path)?,
                None => {
                    let mut body = String::new();
                    io::stdin().read_to_string(&mut body)?;
                    body
                }
            };
            let payload: Value = serde_json::from_str(&body).map_err(|err| {
                YoloboxError::Validation(format!("request body is not valid JSON: {err}"))
            })?;

            let count = store.put(&ImageId::new(image_id), &payload)?;
            print_json(&json!({ "ok": true, "count": count }))
        }
    }
}

fn run_export(workspace: &Workspace, args: ExportArgs) -> Result<(), YoloboxError> {
    let output = args
        .output
        .unwrap_or_else(|| workspace.exports_dir().join(export::DEFAULT_ARCHIVE_NAME));

    let summary = export::export_to_path(
        &workspace.annotation_store(),
        &workspace.label_registry(),
        &workspace.exports_dir(),
        &output,
    )?;

    print!("{}", summary);
    println!("Archive written to {}", output.display());
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), YoloboxError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| YoloboxError::JsonWrite {
        path: PathBuf::from("<stdout>"),
        source,
    })?;
    println!("{}", text);
    Ok(())
}
