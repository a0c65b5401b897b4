#![allow(dead_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use serde_json::{json, Value};

/// Allowed drift after a YOLO round trip, in pixels: six decimals of the
/// larger image side.
pub fn eps_yolo(image_w: u32, image_h: u32) -> f64 {
    image_w.max(image_h) as f64 * 1e-6
}

/// Slack for float sums that should land exactly on an image edge.
pub fn eps_edge(image_w: u32, image_h: u32) -> f64 {
    image_w.max(image_h) as f64 * 1e-12
}

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_image_dims() -> impl Strategy<Value = (u32, u32)> {
    (1u32..=4096, 1u32..=4096)
}

/// A well-formed box request that may be inverted or out of bounds.
pub fn arb_box_value() -> impl Strategy<Value = Value> {
    (
        0u64..80,
        -5000.0f64..5000.0,
        -5000.0f64..5000.0,
        -5000.0f64..5000.0,
        -5000.0f64..5000.0,
    )
        .prop_map(|(class_id, x, y, width, height)| {
            json!({
                "classId": class_id,
                "x": x,
                "y": y,
                "width": width,
                "height": height,
            })
        })
}

/// A box that already lies inside a `w` x `h` image, as `(x, y, width, height)`.
pub fn arb_box_inside(w: u32, h: u32) -> impl Strategy<Value = (f64, f64, f64, f64)> {
    let (w, h) = (w as f64, h as f64);
    (0.0..=1.0f64, 0.0..=1.0f64, 0.0..=1.0f64, 0.0..=1.0f64).prop_map(move |(fx, fy, fw, fh)| {
        let x = fx * w;
        let y = fy * h;
        (x, y, fw * (w - x), fh * (h - y))
    })
}

/// Loosely-typed field values, most of which the normalizer must cope with.
pub fn arb_loose_field() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1.0e4f64..1.0e4).prop_map(|v| json!(v)),
        (-100i64..100).prop_map(|v| json!(v)),
        any::<bool>().prop_map(|v| json!(v)),
        "[ 0-9.eE+-]{0,8}".prop_map(Value::String),
        Just(Value::Null),
        Just(json!([1, 2])),
        Just(json!({"nested": true})),
    ]
}

pub fn arb_loose_box_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => (
            proptest::option::of(arb_loose_field()),
            proptest::option::of(arb_loose_field()),
            proptest::option::of(arb_loose_field()),
            proptest::option::of(arb_loose_field()),
            proptest::option::of(arb_loose_field()),
        )
            .prop_map(|(class_id, x, y, width, height)| {
                let mut record = serde_json::Map::new();
                for (key, value) in [
                    ("classId", class_id),
                    ("x", x),
                    ("y", y),
                    ("width", width),
                    ("height", height),
                ] {
                    if let Some(value) = value {
                        record.insert(key.to_string(), value);
                    }
                }
                Value::Object(record)
            }),
        1 => arb_loose_field(),
    ]
}
