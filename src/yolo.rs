//! YOLO label lines.
//!
//! One line per box: `<class> <cx> <cy> <w> <h>`, with the center and extent
//! given as fractions of the image size to six decimal places.

use crate::error::YoloboxError;
use crate::ir::{BBoxXYWH, ClassId, LabeledBox, Normalized, Pixel};

/// Extension of per-image label files.
pub const LABEL_EXTENSION: &str = "txt";

/// Renders a pixel box as a YOLO label line.
///
/// Image dimensions below 1 are treated as 1.
pub fn encode_line(labeled: &LabeledBox<Pixel>, image_width: u32, image_height: u32) -> String {
    let image_width = f64::from(image_width.max(1));
    let image_height = f64::from(image_height.max(1));
    let (cx, cy, w, h) = labeled.bbox.to_cxcywh();

    format!(
        "{} {:.6} {:.6} {:.6} {:.6}",
        labeled.class_id,
        cx / image_width,
        cy / image_height,
        w / image_width,
        h / image_height
    )
}

/// A parsed YOLO label line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YoloLine {
    pub class_id: ClassId,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl YoloLine {
    /// Projects the line back onto an image of the given size.
    pub fn to_pixel_box(&self, image_width: u32, image_height: u32) -> LabeledBox<Pixel> {
        let bbox = BBoxXYWH::<Normalized>::from_cxcywh(self.cx, self.cy, self.w, self.h);
        LabeledBox::new(
            self.class_id,
            bbox.to_pixel(
                f64::from(image_width.max(1)),
                f64::from(image_height.max(1)),
            ),
        )
    }
}

/// Parses one label line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<YoloLine>, YoloboxError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Take at most 6 tokens so pathological inputs do not allocate unbounded memory.
    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();
    if tokens.len() != 5 {
        return Err(line_error(
            line,
            if tokens.len() < 5 {
                format!("expected 5 tokens, found {}", tokens.len())
            } else {
                "expected 5 tokens, found more".to_string()
            },
        ));
    }

    let class_id = tokens[0].parse::<u64>().map_err(|_| {
        line_error(
            line,
            format!(
                "invalid class_id '{}'; expected non-negative integer",
                tokens[0]
            ),
        )
    })?;

    let parse = |raw: &str, field_name: &str| {
        raw.parse::<f64>().map_err(|_| {
            line_error(
                line,
                format!("invalid {field_name} '{raw}'; expected floating-point number"),
            )
        })
    };

    Ok(Some(YoloLine {
        class_id: ClassId::new(class_id),
        cx: parse(tokens[1], "x_center")?,
        cy: parse(tokens[2], "y_center")?,
        w: parse(tokens[3], "width")?,
        h: parse(tokens[4], "height")?,
    }))
}

/// Fuzz-only entrypoint for YOLO single-line parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_line(input: &str) -> Result<(), YoloboxError> {
    let _ = parse_line(input)?;
    Ok(())
}

fn line_error(line: &str, message: String) -> YoloboxError {
    YoloboxError::YoloLineParse {
        line: line.to_string(),
        message,
    }
}
