//! Runs arbitrary annotation request bodies through box normalization.
//!
//! The first four bytes pick the image size; the rest is the JSON body.
//! Every surviving box must be finite and lie inside the image.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yolobox::normalize::{boxes_from_payload, normalize_boxes};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 || data.len() > 1024 * 1024 {
        return;
    }

    let width = u32::from(u16::from_le_bytes([data[0], data[1]]));
    let height = u32::from(u16::from_le_bytes([data[2], data[3]]));

    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(&data[4..]) else {
        return;
    };
    let Ok(raw_boxes) = boxes_from_payload(&payload) else {
        return;
    };

    let (w, h) = (f64::from(width.max(1)), f64::from(height.max(1)));
    for labeled in normalize_boxes(raw_boxes, width, height) {
        let bbox = labeled.bbox;
        assert!(bbox.is_finite());
        assert!(bbox.x >= 0.0 && bbox.y >= 0.0);
        assert!(bbox.width >= 0.0 && bbox.height >= 0.0);
        assert!(bbox.xmax() <= w * (1.0 + 1e-12));
        assert!(bbox.ymax() <= h * (1.0 + 1e-12));
    }
});
