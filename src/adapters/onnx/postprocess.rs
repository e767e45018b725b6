use ndarray::{s, ArrayView2};

use crate::domain::{detection::RawDetection, model::YoloParams};

/// True when a `[rows, cols]` prediction matrix is laid out as
/// `[4 + nc, candidates]` (Ultralytics v8/v11 export) rather than transposed.
pub fn is_channels_first(shape: &[usize], num_classes: usize) -> bool {
    let channels = num_classes + 4;
    if shape[0] == channels {
        true
    } else if shape[1] == channels {
        false
    } else {
        shape[0] < shape[1]
    }
}

/// Decodes a `[4 + nc, candidates]` matrix of `cx, cy, w, h, class scores...`
/// into thresholded, suppressed candidates in model input space.
pub fn decode_predictions(view: ArrayView2<'_, f32>, params: &YoloParams) -> Vec<RawDetection> {
    if view.shape()[0] <= 4 {
        return Vec::new();
    }
    let num_candidates = view.shape()[1];
    let mut candidates = Vec::new();

    for i in 0..num_candidates {
        let scores = view.slice(s![4.., i]);
        let best = scores.indexed_iter().fold(None, |best: Option<(usize, f32)>, (c, &score)| {
            if score.is_nan() {
                return best;
            }
            match best {
                Some((_, top)) if top >= score => best,
                _ => Some((c, score)),
            }
        });
        let Some((class_id, score)) = best else { continue };
        if score <= params.conf_threshold {
            continue;
        }

        let cx = view[[0, i]];
        let cy = view[[1, i]];
        let w = view[[2, i]];
        let h = view[[3, i]];

        candidates.push(RawDetection {
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            score,
            class_id,
        });
    }

    non_max_suppression(candidates, params.iou_threshold, params.max_detections)
}

/// Class-aware greedy NMS. Output is sorted by descending score and capped at
/// `max_detections`.
pub fn non_max_suppression(
    mut candidates: Vec<RawDetection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<RawDetection> = Vec::new();
    for cand in candidates {
        if keep.len() >= max_detections {
            break;
        }
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == cand.class_id && iou(&k.bbox, &cand.bbox) > iou_threshold);
        if !suppressed {
            keep.push(cand);
        }
    }
    keep
}

/// Intersection over union of two `[x1, y1, x2, y2]` boxes.
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter_area = inter_w * inter_h;

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union_area = area_a + area_b - inter_area;

    if union_area <= 0.0 { 0.0 } else { inter_area / union_area }
}
