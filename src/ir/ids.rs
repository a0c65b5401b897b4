//! Newtype IDs for images and label classes.
//!
//! An image is identified by the file name it was stored under; a class by
//! its position in the label registry. Keeping them as distinct types stops
//! a label index from being passed where a file name is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The stored file name of an image, e.g. `3f2a...c9.png`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Creates a new ImageId.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying file name.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the file name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.0)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.0)
    }

    /// Returns true if the id is a plain file name that cannot escape the
    /// directory it is resolved against.
    pub fn is_plain_file_name(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && !self.0.contains(['/', '\\'])
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageId({})", self.0)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(id: &str) -> Self {
        ImageId::new(id)
    }
}

impl From<String> for ImageId {
    fn from(id: String) -> Self {
        ImageId(id)
    }
}

/// Index of a label in the registry.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u64);

impl ClassId {
    /// Creates a new ClassId.
    #[inline]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClassId {
    fn from(id: u64) -> Self {
        ClassId::new(id)
    }
}
