use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;

/// COCO class names in Ultralytics index order.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

pub fn coco_labels() -> Vec<String> {
    COCO_CLASSES.iter().map(|s| s.to_string()).collect()
}

/// One label per line, line number is the class index. Blank lines inside the
/// list are kept as placeholders so indices stay aligned; trailing ones are
/// dropped.
pub fn load_labels_file(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading labels file {}", path.display()))?;
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    let labels: Vec<String> = lines
        .into_iter()
        .enumerate()
        .map(|(id, line)| match line.trim() {
            "" => format!("class_{}", id),
            name => name.to_string(),
        })
        .collect();
    anyhow::ensure!(!labels.is_empty(), "labels file {} is empty", path.display());
    Ok(labels)
}

/// Parses the `names` metadata Ultralytics writes into ONNX exports, a Python
/// dict literal such as `{0: 'person', 1: "bus"}`.
pub fn parse_names_metadata(raw: &str) -> Option<Vec<String>> {
    let re = Regex::new(r#"(\d+)\s*:\s*(?:'([^']*)'|"([^"]*)")"#).ok()?;

    let mut pairs = Vec::new();
    for cap in re.captures_iter(raw) {
        let idx: usize = cap.get(1)?.as_str().parse().ok()?;
        let name = cap.get(2).or_else(|| cap.get(3))?.as_str().to_string();
        pairs.push((idx, name));
    }
    let max = pairs.iter().map(|(i, _)| *i).max()?;

    let mut labels: Vec<String> = (0..=max).map(|i| format!("class_{}", i)).collect();
    for (idx, name) in pairs {
        labels[idx] = name;
    }
    Some(labels)
}

/// Parses the `imgsz` metadata (`[640, 640]`, height first) into `(width, height)`.
pub fn parse_imgsz_metadata(raw: &str) -> Option<(u32, u32)> {
    let re = Regex::new(r"\d+").ok()?;
    let dims: Vec<u32> = re
        .find_iter(raw)
        .filter_map(|m| m.as_str().parse().ok())
        .filter(|&v| v > 0)
        .collect();
    match dims.as_slice() {
        [side] => Some((*side, *side)),
        [h, w, ..] => Some((*w, *h)),
        [] => None,
    }
}
