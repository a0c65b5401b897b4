//! Image store: imported image files and their dimensions.
//!
//! The rest of the crate talks to images through the [`ImageStore`] trait.
//! [`DirImageStore`] is the filesystem implementation, one file per image in
//! a flat directory, named `<uuid>.<ext>`.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::{image_extension, is_image_file_name};
use crate::error::YoloboxError;
use crate::ir::{ImageId, ImageRecord};

/// What the annotation pipeline needs from wherever images are kept.
pub trait ImageStore {
    /// Returns true if an image with this id is stored.
    fn exists(&self, id: &ImageId) -> bool;

    /// Reads `(width, height)` in pixels from the image header.
    fn read_dimensions(&self, id: &ImageId) -> Result<(u32, u32), YoloboxError>;

    /// Reads the raw image bytes.
    fn read_bytes(&self, id: &ImageId) -> Result<Vec<u8>, YoloboxError>;

    /// Lists stored images, newest import first. Images whose dimensions
    /// cannot be read are left out.
    fn list(&self) -> Result<Vec<ImageRecord>, YoloboxError>;
}

/// Outcome of a batch import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub saved: Vec<ImageRecord>,
    /// Inputs that were not image files or could not be decoded.
    pub skipped: Vec<String>,
}

/// Images kept as files in one directory.
#[derive(Clone, Debug)]
pub struct DirImageStore {
    dir: PathBuf,
}

impl DirImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an image id resolves to. Ids are plain file names.
    pub fn path_of(&self, id: &ImageId) -> PathBuf {
        self.dir.join(id.as_str())
    }

    /// Copies an image file into the store under a fresh id.
    ///
    /// Fails with [`YoloboxError::UnsupportedImage`] for file names without
    /// an accepted extension and with [`YoloboxError::Unreadable`] when the
    /// copied file is not a decodable image; nothing is kept in either case.
    pub fn import_file(&self, source: &Path) -> Result<ImageRecord, YoloboxError> {
        let file_name = source
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let ext = image_extension(file_name)
            .ok_or_else(|| YoloboxError::UnsupportedImage(source.display().to_string()))?;

        let mut input = File::open(source)?;
        self.store_new(&ext, &mut input)
    }

    /// Imports every file in `paths`, skipping the ones that fail.
    pub fn import_files(&self, paths: &[PathBuf]) -> ImportReport {
        let mut report = ImportReport::default();
        for path in paths {
            match self.import_file(path) {
                Ok(record) => report.saved.push(record),
                Err(err) => {
                    warn!("skipping {}: {}", path.display(), err);
                    report.skipped.push(path.display().to_string());
                }
            }
        }
        report
    }

    /// Extracts every image entry of a zip archive into the store.
    ///
    /// Directories and entries without an image extension are ignored;
    /// entries that turn out not to be decodable are skipped. A reader that
    /// is not a zip archive fails the whole import.
    pub fn import_zip<R: Read + Seek>(&self, reader: R) -> Result<ImportReport, YoloboxError> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut report = ImportReport::default();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }

            let entry_name = entry.name().to_string();
            let base_name = entry_name
                .rsplit(|c| c == '/' || c == '\\')
                .next()
                .unwrap_or_default()
                .to_string();
            let Some(ext) = image_extension(&base_name) else {
                debug!("ignoring non-image zip entry {}", entry_name);
                continue;
            };

            match self.store_new(&ext, &mut entry) {
                Ok(record) => report.saved.push(record),
                Err(err) => {
                    warn!("skipping zip entry {}: {}", entry_name, err);
                    report.skipped.push(entry_name);
                }
            }
        }

        info!(
            "imported {} image(s) from archive, skipped {}",
            report.saved.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn store_new(&self, ext: &str, input: &mut dyn Read) -> Result<ImageRecord, YoloboxError> {
        fs::create_dir_all(&self.dir)?;
        let id = ImageId::new(format!("{}.{}", Uuid::new_v4().simple(), ext));
        let path = self.path_of(&id);

        let written = File::create(&path).and_then(|mut output| {
            io::copy(input, &mut output)?;
            output.set_modified(SystemTime::now())?;
            Ok(())
        });
        if let Err(err) = written {
            let _ = fs::remove_file(&path);
            return Err(YoloboxError::Io(err));
        }

        match read_image_dimensions(&path) {
            Ok((width, height)) => Ok(ImageRecord {
                id,
                width,
                height,
                imported_at: modified_time(&path),
            }),
            Err(err) => {
                let _ = fs::remove_file(&path);
                Err(err)
            }
        }
    }
}

impl ImageStore for DirImageStore {
    fn exists(&self, id: &ImageId) -> bool {
        id.is_plain_file_name() && self.path_of(id).is_file()
    }

    fn read_dimensions(&self, id: &ImageId) -> Result<(u32, u32), YoloboxError> {
        if !self.exists(id) {
            return Err(YoloboxError::image_not_found(id.as_str()));
        }
        read_image_dimensions(&self.path_of(id))
    }

    fn read_bytes(&self, id: &ImageId) -> Result<Vec<u8>, YoloboxError> {
        if !self.exists(id) {
            return Err(YoloboxError::image_not_found(id.as_str()));
        }
        Ok(fs::read(self.path_of(id))?)
    }

    fn list(&self) -> Result<Vec<ImageRecord>, YoloboxError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(YoloboxError::Io(err)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_image_file_name(&file_name) {
                continue;
            }

            let path = entry.path();
            match read_image_dimensions(&path) {
                Ok((width, height)) => records.push(ImageRecord {
                    id: ImageId::new(file_name),
                    width,
                    height,
                    imported_at: modified_time(&path),
                }),
                Err(err) => debug!("leaving {} out of listing: {}", path.display(), err),
            }
        }

        records.sort_by(|a, b| b.imported_at.cmp(&a.imported_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }
}

fn modified_time(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn read_image_dimensions(path: &Path) -> Result<(u32, u32), YoloboxError> {
    let size = imagesize::size(path).map_err(|source| YoloboxError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let width = u32::try_from(size.width).map_err(|_| {
        YoloboxError::UnsupportedImage(format!(
            "{}: width {} does not fit in u32",
            path.display(),
            size.width
        ))
    })?;
    let height = u32::try_from(size.height).map_err(|_| {
        YoloboxError::UnsupportedImage(format!(
            "{}: height {} does not fit in u32",
            path.display(),
            size.height
        ))
    })?;

    Ok((width, height))
}
