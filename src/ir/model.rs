//! Core records: images, labeled boxes, per-image annotations, labels.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use super::bbox::BBoxXYWH;
use super::ids::{ClassId, ImageId};
use super::space::Pixel;

/// An image held by the image store.
#[derive(Clone, Debug, Serialize)]
pub struct ImageRecord {
    /// Stored file name.
    pub id: ImageId,

    /// Width of the image in pixels.
    pub width: u32,

    /// Height of the image in pixels.
    pub height: u32,

    /// When the image was imported; listing and export order by this,
    /// newest first.
    #[serde(skip)]
    pub imported_at: SystemTime,
}

/// A bounding box tagged with the class it depicts.
///
/// Serializes flat, as `{"classId", "x", "y", "width", "height"}`, which is
/// both the request shape and the persisted shape.
#[derive(Clone, Copy, PartialEq)]
pub struct LabeledBox<TSpace> {
    pub class_id: ClassId,
    pub bbox: BBoxXYWH<TSpace>,
}

impl<TSpace> LabeledBox<TSpace> {
    /// Creates a new labeled box.
    pub fn new(class_id: impl Into<ClassId>, bbox: BBoxXYWH<TSpace>) -> Self {
        Self {
            class_id: class_id.into(),
            bbox,
        }
    }
}

impl<TSpace> std::fmt::Debug for LabeledBox<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabeledBox")
            .field("class_id", &self.class_id)
            .field("x", &self.bbox.x)
            .field("y", &self.bbox.y)
            .field("width", &self.bbox.width)
            .field("height", &self.bbox.height)
            .finish()
    }
}

impl<TSpace> Serialize for LabeledBox<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("LabeledBox", 5)?;
        state.serialize_field("classId", &self.class_id)?;
        state.serialize_field("x", &self.bbox.x)?;
        state.serialize_field("y", &self.bbox.y)?;
        state.serialize_field("width", &self.bbox.width)?;
        state.serialize_field("height", &self.bbox.height)?;
        state.end()
    }
}

impl<'de, TSpace> Deserialize<'de> for LabeledBox<TSpace> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LabeledBoxData {
            #[serde(default)]
            class_id: ClassId,
            x: f64,
            y: f64,
            width: f64,
            height: f64,
        }
        let data = LabeledBoxData::deserialize(deserializer)?;
        Ok(LabeledBox::new(
            data.class_id,
            BBoxXYWH::new(data.x, data.y, data.width, data.height),
        ))
    }
}

/// All boxes recorded for one image, with the dimensions they were
/// normalized against.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub image_id: ImageId,
    pub image_width: u32,
    pub image_height: u32,
    pub boxes: Vec<LabeledBox<Pixel>>,
}

impl Annotation {
    /// Creates an annotation with no boxes.
    pub fn empty(image_id: ImageId, image_width: u32, image_height: u32) -> Self {
        Self {
            image_id,
            image_width,
            image_height,
            boxes: Vec::new(),
        }
    }

    /// Returns true if the annotation holds at least one box.
    pub fn has_boxes(&self) -> bool {
        !self.boxes.is_empty()
    }
}

/// A registered label name and its class index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: ClassId,
    pub name: String,
}
