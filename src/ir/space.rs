//! Coordinate space markers.
//!
//! Boxes carry their space as a type parameter: pixel boxes are what the
//! annotation store persists, normalized boxes are what thumbnails and YOLO
//! label lines are built from.

use std::fmt;

/// Absolute pixel coordinates, origin at the image's top-left corner.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Fractions of the image size, nominally within `[0, 1]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalized {}

impl fmt::Debug for Pixel {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl fmt::Debug for Normalized {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}
