//! Core data model for yolobox.
//!
//! # Design Principles
//!
//! 1. **Typed coordinate spaces**: boxes carry a marker type so that pixel
//!    boxes (what the store persists) and normalized boxes (what previews
//!    and YOLO lines use) cannot be mixed.
//!
//! 2. **One canonical box form**: top-left XYWH in pixels, non-negative
//!    extent, clamped to the image once [`crate::normalize`] has run.
//!
//! 3. **Permissive construction**: the types themselves accept inverted or
//!    out-of-range values so raw input can be represented before it is
//!    sanitized.
//!
//! # Example
//!
//! ```
//! use yolobox::ir::{Annotation, BBoxXYWH, ImageId, LabeledBox, Pixel};
//!
//! let annotation = Annotation {
//!     image_id: ImageId::new("image.jpg"),
//!     image_width: 640,
//!     image_height: 480,
//!     boxes: vec![LabeledBox::<Pixel>::new(0u64, BBoxXYWH::new(10.0, 20.0, 90.0, 180.0))],
//! };
//! assert!(annotation.has_boxes());
//! ```

mod bbox;
mod ids;
mod model;
mod space;

pub use bbox::BBoxXYWH;
pub use ids::{ClassId, ImageId};
pub use model::{Annotation, ImageRecord, Label, LabeledBox};
pub use space::{Normalized, Pixel};
