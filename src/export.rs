//! Dataset export: every image and its boxes as a zipped YOLO dataset.
//!
//! The archive holds:
//!
//! - `images/<id>` for every stored image
//! - `labels/<stem>.txt` for every image with at least one box
//! - `classes.txt`, one label name per line in class order
//! - `data.yaml` with `nc`, `names`, `train` and `val`
//!
//! Images without boxes get no label file; they stay in the dataset as
//! negative examples. Label files are named by image stem, so of several
//! images sharing a stem only the first listed (the newest) is exported. There is no train/val split: `train` and `val` both
//! point at the images directory.
//!
//! The tree is assembled in a scratch directory that is removed whether or
//! not the export succeeds. Nothing is locked during the scan, so writes
//! that land mid-export may or may not show up in the archive.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::YoloboxError;
use crate::images::ImageStore;
use crate::ir::ImageId;
use crate::labels::LabelRegistry;
use crate::store::AnnotationStore;
use crate::yolo::{encode_line, LABEL_EXTENSION};

/// File name used when the caller does not pick one.
pub const DEFAULT_ARCHIVE_NAME: &str = "yolo_dataset.zip";

const IMAGES_DIR: &str = "images";
const LABELS_DIR: &str = "labels";
const CLASSES_FILE: &str = "classes.txt";
const DATA_YAML_FILE: &str = "data.yaml";

/// Tally of one export.
#[derive(Clone, Debug, Default)]
pub struct ExportSummary {
    /// Images written under `images/`.
    pub images: usize,
    /// Label files written under `labels/`.
    pub label_files: usize,
    /// YOLO lines written across all label files.
    pub boxes: usize,
    /// Entries in `classes.txt`.
    pub classes: usize,
    /// Images left out because their bytes or annotation could not be read,
    /// or because an exported image already claimed their label file name.
    pub skipped_images: Vec<ImageId>,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Exported {} image(s), {} label file(s), {} box(es), {} class(es)",
            self.images, self.label_files, self.boxes, self.classes
        )?;
        if !self.skipped_images.is_empty() {
            writeln!(f, "Skipped {} image(s):", self.skipped_images.len())?;
            for id in &self.skipped_images {
                writeln!(f, "  - {}", id)?;
            }
        }
        Ok(())
    }
}

/// Builds the dataset and writes it as a zip archive to `writer`.
///
/// `scratch_dir` is where the intermediate tree is assembled; it is created
/// if missing and the tree inside it is always removed afterwards.
pub fn export_dataset<S, W>(
    annotations: &AnnotationStore<S>,
    labels: &LabelRegistry,
    scratch_dir: &Path,
    writer: W,
) -> Result<ExportSummary, YoloboxError>
where
    S: ImageStore,
    W: Write + Seek,
{
    fs::create_dir_all(scratch_dir)?;
    let tree = tempfile::Builder::new()
        .prefix("export_")
        .tempdir_in(scratch_dir)?;

    let summary = build_tree(annotations, labels, tree.path())?;
    write_archive(tree.path(), writer)?;

    if let Err(err) = tree.close() {
        warn!("failed to remove export scratch tree: {}", err);
    }

    info!(
        "exported {} image(s) with {} label file(s)",
        summary.images, summary.label_files
    );
    Ok(summary)
}

/// Exports to a file, replacing `output` only once the archive is complete.
pub fn export_to_path<S: ImageStore>(
    annotations: &AnnotationStore<S>,
    labels: &LabelRegistry,
    scratch_dir: &Path,
    output: &Path,
) -> Result<ExportSummary, YoloboxError> {
    let output_dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(output_dir)?;

    let mut archive = NamedTempFile::new_in(output_dir)?;
    let summary = export_dataset(annotations, labels, scratch_dir, archive.as_file_mut())?;
    archive.as_file().sync_all()?;
    archive
        .persist(output)
        .map_err(|err| YoloboxError::Io(err.error))?;

    Ok(summary)
}

fn build_tree<S: ImageStore>(
    annotations: &AnnotationStore<S>,
    labels: &LabelRegistry,
    root: &Path,
) -> Result<ExportSummary, YoloboxError> {
    let images_dir = root.join(IMAGES_DIR);
    let labels_dir = root.join(LABELS_DIR);
    fs::create_dir_all(&images_dir)?;
    fs::create_dir_all(&labels_dir)?;

    let names = labels.names()?;
    let records = annotations.images().list()?;
    let mut summary = ExportSummary {
        classes: names.len(),
        ..Default::default()
    };

    let mut stems: HashSet<String> = HashSet::new();
    for record in records {
        if stems.contains(record.id.stem()) {
            warn!(
                "skipping {} in export: label file {} is taken by another image",
                record.id,
                archive_label_path(&record.id).display()
            );
            summary.skipped_images.push(record.id);
            continue;
        }

        let bytes = match annotations.images().read_bytes(&record.id) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("skipping {} in export: {}", record.id, err);
                summary.skipped_images.push(record.id);
                continue;
            }
        };
        let annotation = match annotations.get(&record.id) {
            Ok(annotation) => annotation,
            Err(err) => {
                warn!("skipping {} in export: {}", record.id, err);
                summary.skipped_images.push(record.id);
                continue;
            }
        };

        fs::write(images_dir.join(record.id.as_str()), bytes)?;
        stems.insert(record.id.stem().to_string());
        summary.images += 1;

        if !annotation.has_boxes() {
            continue;
        }

        let label_path = root.join(archive_label_path(&record.id));
        let mut label_file = BufWriter::new(File::create(&label_path)?);
        for labeled in &annotation.boxes {
            writeln!(
                label_file,
                "{}",
                encode_line(labeled, annotation.image_width, annotation.image_height)
            )?;
        }
        label_file.flush()?;

        summary.label_files += 1;
        summary.boxes += annotation.boxes.len();
    }

    write_classes_txt(root, &names)?;
    write_data_yaml(root, &names, &fs::canonicalize(&images_dir)?)?;

    Ok(summary)
}

fn write_classes_txt(root: &Path, names: &[String]) -> Result<(), YoloboxError> {
    let mut content = String::new();
    for name in names {
        content.push_str(name);
        content.push('\n');
    }
    fs::write(root.join(CLASSES_FILE), content).map_err(YoloboxError::Io)
}

fn write_data_yaml(root: &Path, names: &[String], images_dir: &Path) -> Result<(), YoloboxError> {
    let quoted: Vec<String> = names.iter().map(|name| yaml_single_quoted(name)).collect();
    let images_dir = images_dir.display();

    let yaml = format!(
        "# Auto-generated YOLO dataset config\n\
         nc: {}\n\
         names: [{}]\n\
         train: {}\n\
         val: {}\n",
        names.len(),
        quoted.join(", "),
        images_dir,
        images_dir
    );

    fs::write(root.join(DATA_YAML_FILE), yaml).map_err(YoloboxError::Io)
}

fn yaml_single_quoted(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

fn write_archive<W: Write + Seek>(root: &Path, writer: W) -> Result<(), YoloboxError> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| YoloboxError::WalkDir {
            path: root.to_path_buf(),
            message: source.to_string(),
        })?;
        let rel = rel_string(root, entry.path());

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{rel}/"), options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(rel, options)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut zip)?;
        }
    }

    zip.finish()?;
    Ok(())
}

fn rel_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

/// Path of an image's label file relative to the dataset root.
pub fn archive_label_path(image_id: &ImageId) -> PathBuf {
    Path::new(LABELS_DIR).join(format!("{}.{}", image_id.stem(), LABEL_EXTENSION))
}
