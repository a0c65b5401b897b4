//! Workspace layout.
//!
//! A [`Workspace`] is the explicit handle to every directory yolobox reads
//! or writes. Components are built from it; nothing resolves paths on its
//! own.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::YoloboxError;
use crate::images::DirImageStore;
use crate::labels::LabelRegistry;
use crate::store::AnnotationStore;

/// Environment variable consulted by the CLI for the workspace root.
pub const ROOT_ENV: &str = "YOLOBOX_ROOT";

/// Image file extensions accepted on import, lower-case.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

const UPLOADS_DIR: &str = "uploads";
const ANNOTATIONS_DIR: &str = "annotations";
const DATA_DIR: &str = "data";
const EXPORTS_DIR: &str = "exports";
const LABELS_FILE: &str = "labels.json";

/// Directory layout of a yolobox workspace.
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Opens the workspace at `root`, creating any missing directories.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, YoloboxError> {
        let workspace = Self { root: root.into() };
        for dir in [
            workspace.uploads_dir(),
            workspace.annotations_dir(),
            workspace.data_dir(),
            workspace.exports_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where imported images live.
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    /// Where one JSON record per annotated image lives.
    pub fn annotations_dir(&self) -> PathBuf {
        self.root.join(ANNOTATIONS_DIR)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    /// Default destination for export archives.
    pub fn exports_dir(&self) -> PathBuf {
        self.root.join(EXPORTS_DIR)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.data_dir().join(LABELS_FILE)
    }

    pub fn image_store(&self) -> DirImageStore {
        DirImageStore::new(self.uploads_dir())
    }

    pub fn label_registry(&self) -> LabelRegistry {
        LabelRegistry::new(self.labels_path())
    }

    pub fn annotation_store(&self) -> AnnotationStore<DirImageStore> {
        AnnotationStore::new(self.annotations_dir(), self.image_store())
    }
}

/// Returns true if `file_name` carries one of [`IMAGE_EXTENSIONS`],
/// compared case-insensitively.
pub fn is_image_file_name(file_name: &str) -> bool {
    image_extension(file_name).is_some()
}

/// Returns the lower-cased extension of `file_name` if it is an accepted
/// image extension.
pub fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}
