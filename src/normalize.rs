//! Box normalizer.
//!
//! Turns loosely-typed, user-submitted boxes into canonical pixel boxes:
//! non-negative extent, origin inside the image, and no edge past the image
//! border. This is a best-effort sanitization pass. A record whose fields
//! cannot be coerced is dropped on its own; nothing in here fails the batch.

use serde_json::Value;

use crate::error::YoloboxError;
use crate::ir::{BBoxXYWH, ClassId, LabeledBox, Pixel};

/// One submitted box after field coercion, before any geometry fixes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawBox {
    pub class_id: ClassId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RawBox {
    /// Coerces a JSON value into a raw box.
    ///
    /// Absent fields default to `0`. A field that is present but cannot be
    /// read as a number (or, for `classId`, as a non-negative integer)
    /// returns `None`, as does any value that is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;

        let class_id = match record.get("classId") {
            None => 0,
            Some(raw) => coerce_class_id(raw)?,
        };
        let field = |name: &str| match record.get(name) {
            None => Some(0.0),
            Some(raw) => coerce_f64(raw),
        };

        Some(Self {
            class_id: ClassId::new(class_id),
            x: field("x")?,
            y: field("y")?,
            width: field("width")?,
            height: field("height")?,
        })
    }
}

fn coerce_class_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => {
            if let Some(id) = number.as_u64() {
                Some(id)
            } else if number.is_i64() {
                None
            } else {
                let truncated = number.as_f64()?.trunc();
                (truncated.is_finite() && truncated >= 0.0 && truncated <= u64::MAX as f64)
                    .then_some(truncated as u64)
            }
        }
        Value::Bool(flag) => Some(u64::from(*flag)),
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64()?,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::String(raw) => raw.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

/// Extracts the box list from an annotation request body.
///
/// The body must be an object whose `boxes` member is an array.
pub fn boxes_from_payload(payload: &Value) -> Result<&[Value], YoloboxError> {
    let body = payload.as_object().ok_or_else(|| {
        YoloboxError::Validation("request body must be a JSON object".to_string())
    })?;

    body.get("boxes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| YoloboxError::Validation("boxes must be a list".to_string()))
}

/// Normalizes every coercible record in `raw_boxes`, keeping input order.
///
/// Image dimensions below 1 are treated as 1.
pub fn normalize_boxes(
    raw_boxes: &[Value],
    image_width: u32,
    image_height: u32,
) -> Vec<LabeledBox<Pixel>> {
    raw_boxes
        .iter()
        .filter_map(RawBox::from_value)
        .map(|raw| normalize_box(&raw, image_width, image_height))
        .collect()
}

/// Normalizes one coerced box against the image bounds.
pub fn normalize_box(raw: &RawBox, image_width: u32, image_height: u32) -> LabeledBox<Pixel> {
    let bbox = BBoxXYWH::new(raw.x, raw.y, raw.width, raw.height);
    LabeledBox::new(raw.class_id, canonicalize(bbox, image_width, image_height))
}

/// Flips inverted extents, then clamps the box into `[0, W] x [0, H]`.
pub fn canonicalize(
    bbox: BBoxXYWH<Pixel>,
    image_width: u32,
    image_height: u32,
) -> BBoxXYWH<Pixel> {
    let image_width = f64::from(image_width.max(1));
    let image_height = f64::from(image_height.max(1));

    let BBoxXYWH {
        mut x,
        mut y,
        mut width,
        mut height,
        ..
    } = bbox;

    if width < 0.0 {
        x += width;
        width = -width;
    }
    if height < 0.0 {
        y += height;
        height = -height;
    }

    let x = x.clamp(0.0, image_width);
    let y = y.clamp(0.0, image_height);
    let width = width.clamp(0.0, image_width - x);
    let height = height.clamp(0.0, image_height - y);

    BBoxXYWH::new(x, y, width, height)
}
