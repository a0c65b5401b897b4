//! Annotation store: one JSON record per image.
//!
//! Records are only ever replaced whole. Every write goes to a temporary
//! file in the destination directory and is renamed over the old record,
//! so a crash leaves either the old record or the new one.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::YoloboxError;
use crate::images::ImageStore;
use crate::ir::{Annotation, ImageId};
use crate::normalize::{boxes_from_payload, normalize_boxes};

const RECORD_EXTENSION: &str = "json";

/// Reads and parses a JSON file, returning `None` if it does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, YoloboxError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(YoloboxError::Io(err)),
    };

    serde_json::from_str(&data)
        .map(Some)
        .map_err(|source| YoloboxError::JsonParse {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes `value` as pretty-printed JSON, replacing `path` atomically.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), YoloboxError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| {
            YoloboxError::JsonWrite {
                path: path.to_path_buf(),
                source,
            }
        })?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    temp.persist(path)
        .map_err(|err| YoloboxError::Io(err.error))?;
    Ok(())
}

/// Persists and retrieves the annotation of each image.
#[derive(Clone, Debug)]
pub struct AnnotationStore<S> {
    dir: PathBuf,
    images: S,
}

impl<S: ImageStore> AnnotationStore<S> {
    pub fn new(dir: impl Into<PathBuf>, images: S) -> Self {
        Self {
            dir: dir.into(),
            images,
        }
    }

    /// The image store this annotation store resolves images against.
    pub fn images(&self) -> &S {
        &self.images
    }

    /// Path of the record for `image_id`: the full id plus `.json`.
    pub fn record_path(&self, image_id: &ImageId) -> PathBuf {
        self.dir
            .join(format!("{}.{}", image_id.as_str(), RECORD_EXTENSION))
    }

    /// Returns the annotation for an image.
    ///
    /// Stored dimensions are replaced with the image's current dimensions
    /// when those can be read. An image that was never annotated yields an
    /// empty annotation, which is not persisted.
    pub fn get(&self, image_id: &ImageId) -> Result<Annotation, YoloboxError> {
        if !self.images.exists(image_id) {
            return Err(YoloboxError::image_not_found(image_id.as_str()));
        }

        let live = self.images.read_dimensions(image_id);
        if let Err(err) = &live {
            debug!("using fallback dimensions for {}: {}", image_id, err);
        }

        match self.read_stored(image_id)? {
            Some(mut annotation) => {
                if let Ok((width, height)) = live {
                    annotation.image_width = width;
                    annotation.image_height = height;
                }
                Ok(annotation)
            }
            None => {
                let (width, height) = live.unwrap_or((0, 0));
                Ok(Annotation::empty(image_id.clone(), width, height))
            }
        }
    }

    /// Returns the persisted record exactly as stored, if there is one.
    pub fn read_stored(&self, image_id: &ImageId) -> Result<Option<Annotation>, YoloboxError> {
        if !image_id.is_plain_file_name() {
            return Ok(None);
        }
        read_json(&self.record_path(image_id))
    }

    /// Replaces the annotation of an image with the boxes in `payload`.
    ///
    /// `payload` is the request body, an object with a `boxes` array. The
    /// boxes are normalized against the image's current dimensions, falling
    /// back to 1x1 when the image cannot be decoded. Returns how many boxes
    /// survived normalization.
    pub fn put(&self, image_id: &ImageId, payload: &Value) -> Result<usize, YoloboxError> {
        if !self.images.exists(image_id) {
            return Err(YoloboxError::image_not_found(image_id.as_str()));
        }
        let raw_boxes = boxes_from_payload(payload)?;

        let (width, height) = self.images.read_dimensions(image_id).unwrap_or((1, 1));
        let width = width.max(1);
        let height = height.max(1);

        let boxes = normalize_boxes(raw_boxes, width, height);
        let dropped = raw_boxes.len() - boxes.len();
        if dropped > 0 {
            debug!("dropped {} malformed box(es) for {}", dropped, image_id);
        }

        let annotation = Annotation {
            image_id: image_id.clone(),
            image_width: width,
            image_height: height,
            boxes,
        };
        write_json_atomic(&self.record_path(image_id), &annotation)?;

        info!(
            "saved {} box(es) for {}",
            annotation.boxes.len(),
            image_id
        );
        Ok(annotation.boxes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::DirImageStore;
    use crate::ir::{BBoxXYWH, ClassId, LabeledBox};
    use crate::test_support::bmp_bytes;
    use serde_json::json;

    fn setup(width: u32, height: u32) -> (tempfile::TempDir, AnnotationStore<DirImageStore>) {
        let temp = tempfile::tempdir().expect("create temp dir");
        let uploads = temp.path().join("uploads");
        let annotations = temp.path().join("annotations");
        fs::create_dir_all(&uploads).expect("create uploads");
        fs::create_dir_all(&annotations).expect("create annotations");
        fs::write(uploads.join("img.bmp"), bmp_bytes(width, height)).expect("write bmp");

        let store = AnnotationStore::new(annotations, DirImageStore::new(uploads));
        (temp, store)
    }

    #[test]
    fn get_synthesizes_empty_annotation_without_writing() {
        let (_temp, store) = setup(200, 100);
        let id = ImageId::new("img.bmp");

        let annotation = store.get(&id).expect("get");
        assert_eq!(annotation.image_width, 200);
        assert_eq!(annotation.image_height, 100);
        assert!(annotation.boxes.is_empty());
        assert!(!store.record_path(&id).exists());
    }

    #[test]
    fn put_normalizes_and_persists() {
        let (_temp, store) = setup(200, 100);
        let id = ImageId::new("img.bmp");

        let payload = json!({
            "boxes": [
                {"classId": 2, "x": -10, "y": 5, "width": -30, "height": 20},
                {"classId": 1, "x": "oops", "y": 0, "width": 1, "height": 1}
            ]
        });
        let count = store.put(&id, &payload).expect("put");
        assert_eq!(count, 1);

        let stored = store.read_stored(&id).expect("read").expect("record exists");
        assert_eq!(stored.image_width, 200);
        assert_eq!(stored.image_height, 100);
        assert_eq!(
            stored.boxes,
            vec![LabeledBox::new(
                ClassId(2),
                BBoxXYWH::new(0.0, 5.0, 30.0, 20.0)
            )]
        );
    }

    #[test]
    fn put_replaces_previous_record() {
        let (_temp, store) = setup(50, 50);
        let id = ImageId::new("img.bmp");

        let three = json!({"boxes": [
            {"x": 1, "y": 1, "width": 2, "height": 2},
            {"x": 3, "y": 3, "width": 2, "height": 2},
            {"x": 5, "y": 5, "width": 2, "height": 2}
        ]});
        assert_eq!(store.put(&id, &three).expect("first put"), 3);
        assert_eq!(store.put(&id, &json!({"boxes": []})).expect("second put"), 0);
        assert!(store.get(&id).expect("get").boxes.is_empty());
    }

    #[test]
    fn put_rejects_non_list_boxes_without_writing() {
        let (_temp, store) = setup(10, 10);
        let id = ImageId::new("img.bmp");

        let err = store
            .put(&id, &json!({"boxes": {"x": 1, "y": 1, "width": 1, "height": 1}}))
            .unwrap_err();
        assert!(matches!(err, YoloboxError::Validation(_)));
        assert!(!store.record_path(&id).exists());
    }

    #[test]
    fn missing_image_is_not_found() {
        let (_temp, store) = setup(10, 10);
        let id = ImageId::new("missing.png");

        assert!(matches!(
            store.get(&id).unwrap_err(),
            YoloboxError::NotFound { .. }
        ));
        assert!(matches!(
            store.put(&id, &json!({"boxes": []})).unwrap_err(),
            YoloboxError::NotFound { .. }
        ));
    }

    #[test]
    fn get_overrides_stored_dimensions_with_live_ones() {
        let (_temp, store) = setup(64, 32);
        let id = ImageId::new("img.bmp");
        let record = json!({
            "imageId": "img.bmp",
            "imageWidth": 10,
            "imageHeight": 10,
            "boxes": [{"classId": 0, "x": 1.0, "y": 1.0, "width": 2.0, "height": 2.0}]
        });
        fs::write(store.record_path(&id), record.to_string()).expect("write record");

        let annotation = store.get(&id).expect("get");
        assert_eq!((annotation.image_width, annotation.image_height), (64, 32));
        assert_eq!(annotation.boxes.len(), 1);

        let stored = store.read_stored(&id).expect("read").expect("exists");
        assert_eq!((stored.image_width, stored.image_height), (10, 10));
    }

    #[test]
    fn unreadable_image_uses_fallback_dimensions() {
        let (temp, store) = setup(10, 10);
        fs::write(temp.path().join("uploads/broken.png"), b"not an image").expect("write");
        let id = ImageId::new("broken.png");

        let annotation = store.get(&id).expect("get");
        assert_eq!((annotation.image_width, annotation.image_height), (0, 0));

        let payload = json!({"boxes": [{"x": 0.5, "y": 0.5, "width": 9, "height": 9}]});
        assert_eq!(store.put(&id, &payload).expect("put"), 1);
        let stored = store.read_stored(&id).expect("read").expect("exists");
        assert_eq!((stored.image_width, stored.image_height), (1, 1));
        assert_eq!(stored.boxes[0].bbox, BBoxXYWH::new(0.5, 0.5, 0.5, 0.5));
    }

    #[test]
    fn records_are_keyed_by_full_image_id() {
        let (temp, store) = setup(10, 10);
        fs::write(temp.path().join("uploads/img.png"), bmp_bytes(10, 10)).expect("write");

        store
            .put(&ImageId::new("img.bmp"), &json!({"boxes": [{"x": 1, "y": 1, "width": 1, "height": 1}]}))
            .expect("put bmp");
        store
            .put(&ImageId::new("img.png"), &json!({"boxes": []}))
            .expect("put png");

        assert_eq!(store.get(&ImageId::new("img.bmp")).expect("get").boxes.len(), 1);
        assert!(store.get(&ImageId::new("img.png")).expect("get").boxes.is_empty());
    }
}
