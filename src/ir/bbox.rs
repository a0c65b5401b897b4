//! Bounding box geometry in top-left XYWH form.

use serde::Serialize;
use std::marker::PhantomData;

use super::{Normalized, Pixel};

/// An axis-aligned box given by its top-left corner and its extent.
///
/// The `TSpace` parameter should be either [`Pixel`] or [`Normalized`].
///
/// Note: the constructor does not enforce a non-negative extent. Raw user
/// input is allowed to be inverted; [`crate::normalize`] is where boxes
/// become canonical.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYWH<TSpace> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYWH<TSpace> {
    /// Creates a new box from its top-left corner and extent.
    #[inline]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            _space: PhantomData,
        }
    }

    /// Creates a box from its center point and extent.
    #[inline]
    pub fn from_cxcywh(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// Returns the right edge.
    #[inline]
    pub fn xmax(&self) -> f64 {
        self.x + self.width
    }

    /// Returns the bottom edge.
    #[inline]
    pub fn ymax(&self) -> f64 {
        self.y + self.height
    }

    /// Returns the center point as `(cx, cy)`.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Returns `(cx, cy, width, height)`.
    #[inline]
    pub fn to_cxcywh(&self) -> (f64, f64, f64, f64) {
        let (cx, cy) = self.center();
        (cx, cy, self.width, self.height)
    }

    /// Returns true if all four values are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

impl BBoxXYWH<Pixel> {
    /// Converts pixel coordinates to fractions of the image size.
    ///
    /// Callers are expected to pass dimensions already floored to 1.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> BBoxXYWH<Normalized> {
        BBoxXYWH::new(
            self.x / image_width,
            self.y / image_height,
            self.width / image_width,
            self.height / image_height,
        )
    }
}

impl BBoxXYWH<Normalized> {
    /// Converts fractional coordinates back to pixels.
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> BBoxXYWH<Pixel> {
        BBoxXYWH::new(
            self.x * image_width,
            self.y * image_height,
            self.width * image_width,
            self.height * image_height,
        )
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYWH<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYWH")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

// Custom Serialize impl to avoid a TSpace: Serialize bound
impl<TSpace> Serialize for BBoxXYWH<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BBoxXYWH", 4)?;
        state.serialize_field("x", &self.x)?;
        state.serialize_field("y", &self.y)?;
        state.serialize_field("width", &self.width)?;
        state.serialize_field("height", &self.height)?;
        state.end()
    }
}
