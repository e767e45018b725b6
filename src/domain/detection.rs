use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One recognized object, as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in pixels of the original image.
    pub bbox: [f32; 4],
    #[serde(skip)]
    pub class_id: usize,
}

/// A decoded model candidate, already mapped back to original-image pixels
/// but not yet clamped or labelled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: usize,
}

impl Detection {
    /// Builds a client-facing detection from a raw candidate.
    ///
    /// Corners are ordered and clamped to `[0, width] x [0, height]`, the score
    /// is clamped to `[0, 1]` (NaN becomes 0) and the class index is resolved
    /// through `labels`, falling back to `class_<id>`.
    pub fn from_raw(raw: &RawDetection, labels: &[String], width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        let [ax, ay, bx, by] = raw.bbox;

        let x1 = clamp_coord(ax.min(bx), w);
        let y1 = clamp_coord(ay.min(by), h);
        let x2 = clamp_coord(ax.max(bx), w).max(x1);
        let y2 = clamp_coord(ay.max(by), h).max(y1);

        let confidence = if raw.score.is_nan() { 0.0 } else { raw.score.clamp(0.0, 1.0) };

        let class_name = labels
            .get(raw.class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", raw.class_id));

        Self { class_name, confidence, bbox: [x1, y1, x2, y2], class_id: raw.class_id }
    }
}

fn clamp_coord(v: f32, max: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, max)
    }
}

/// "2 person, 1 dog" style summary for logs.
pub fn summarize_detections(detections: &[Detection]) -> String {
    let mut counts = BTreeMap::new();
    for det in detections {
        *counts.entry(det.class_name.as_str()).or_insert(0) += 1;
    }
    counts
        .iter()
        .map(|(label, count)| format!("{} {}", count, label))
        .collect::<Vec<_>>()
        .join(", ")
}
