//! Gallery previews: fractional boxes for drawing over thumbnails.

use log::warn;
use serde::Serialize;

use crate::error::YoloboxError;
use crate::images::ImageStore;
use crate::ir::{Annotation, ImageId, LabeledBox, Normalized};
use crate::store::AnnotationStore;

/// Most boxes shown on one thumbnail.
pub const THUMBNAIL_BOX_LIMIT: usize = 20;

/// Projects the first [`THUMBNAIL_BOX_LIMIT`] boxes of an annotation into
/// fractions of the dimensions stored with it.
pub fn project(annotation: &Annotation) -> Vec<LabeledBox<Normalized>> {
    let width = f64::from(annotation.image_width.max(1));
    let height = f64::from(annotation.image_height.max(1));

    annotation
        .boxes
        .iter()
        .take(THUMBNAIL_BOX_LIMIT)
        .map(|labeled| LabeledBox::new(labeled.class_id, labeled.bbox.to_normalized(width, height)))
        .collect()
}

/// One row of the image listing.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub id: ImageId,
    pub width: u32,
    pub height: u32,
    pub has_annotations: bool,
    pub thumb_boxes: Vec<LabeledBox<Normalized>>,
}

/// Lists every stored image, newest import first, with preview boxes.
///
/// An image whose annotation record is unreadable is listed as not
/// annotated; the listing itself does not fail.
pub fn list_images<S: ImageStore>(
    annotations: &AnnotationStore<S>,
) -> Result<Vec<ImageSummary>, YoloboxError> {
    let records = annotations.images().list()?;

    Ok(records
        .into_iter()
        .map(|record| {
            let stored = match annotations.read_stored(&record.id) {
                Ok(stored) => stored,
                Err(err) => {
                    warn!("ignoring unreadable annotation for {}: {}", record.id, err);
                    None
                }
            };

            let (has_annotations, thumb_boxes) = match stored {
                Some(annotation) => (true, project(&annotation)),
                None => (false, Vec::new()),
            };

            ImageSummary {
                id: record.id,
                width: record.width,
                height: record.height,
                has_annotations,
                thumb_boxes,
            }
        })
        .collect())
}
