use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{codecs::jpeg::JpegEncoder, Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use std::path::Path;
use tracing::{info, warn};

use crate::application::ports::AnnotatorPort;
use crate::domain::{
    detection::Detection,
    errors::{DomainError, DomainResult},
};

const JPEG_QUALITY: u8 = 95;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Ultralytics plotting palette, indexed by class id.
const PALETTE: [[u8; 3]; 20] = [
    [0xFF, 0x38, 0x38], [0xFF, 0x9D, 0x97], [0xFF, 0x70, 0x1F], [0xFF, 0xB2, 0x1D],
    [0xCF, 0xD2, 0x31], [0x48, 0xF9, 0x0A], [0x92, 0xCC, 0x17], [0x3D, 0xDB, 0x86],
    [0x1A, 0x93, 0x34], [0x00, 0xD4, 0xBB], [0x2C, 0x99, 0xA8], [0x00, 0xC2, 0xFF],
    [0x34, 0x45, 0x93], [0x64, 0x73, 0xFF], [0x00, 0x18, 0xEC], [0x84, 0x38, 0xFF],
    [0x52, 0x00, 0x85], [0xCB, 0x38, 0xFF], [0xFF, 0x95, 0xC8], [0xFF, 0x37, 0xC7],
];

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Burns boxes and `label confidence` tabs into a copy of the image.
pub struct ImageAnnotator {
    font: Option<FontVec>,
    jpeg_quality: u8,
}

impl ImageAnnotator {
    /// Uses `font_path` when given, otherwise the first system font found.
    pub fn new(font_path: Option<&Path>) -> Self {
        let font = match font_path {
            Some(path) => load_font(path)
                .map_err(|e| warn!("Could not load font {}: {:#}", path.display(), e))
                .ok(),
            None => FONT_CANDIDATES
                .iter()
                .find_map(|candidate| load_font(Path::new(candidate)).ok()),
        };
        match &font {
            Some(_) => info!("Annotator ready with TrueType labels"),
            None => warn!("No TrueType font available, label tabs will be drawn without text"),
        }
        Self { font, jpeg_quality: JPEG_QUALITY }
    }

    #[cfg(test)]
    pub fn without_font() -> Self {
        Self { font: None, jpeg_quality: JPEG_QUALITY }
    }

    pub fn render(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.clone();
        let (w, h) = canvas.dimensions();
        let thickness = line_width(w, h);
        let scale = PxScale::from((thickness as f32 * 6.0).max(12.0));

        for det in detections {
            let color = Rgb(PALETTE[det.class_id % PALETTE.len()]);
            let [x1, y1, x2, y2] = det.bbox.map(|v| v.round() as i32);

            for t in 0..thickness as i32 {
                let bw = x2 - x1 - 2 * t;
                let bh = y2 - y1 - 2 * t;
                if bw <= 0 || bh <= 0 {
                    break;
                }
                draw_hollow_rect_mut(
                    &mut canvas,
                    Rect::at(x1 + t, y1 + t).of_size(bw as u32, bh as u32),
                    color,
                );
            }

            self.draw_label(&mut canvas, det, (x1, y1), color, scale, thickness);
        }
        canvas
    }

    fn draw_label(
        &self,
        canvas: &mut RgbImage,
        det: &Detection,
        (x, y): (i32, i32),
        color: Rgb<u8>,
        scale: PxScale,
        pad: u32,
    ) {
        let text = format!("{} {:.2}", det.class_name, det.confidence);
        let (text_w, text_h) = match &self.font {
            Some(font) => text_size(scale, font, &text),
            None => (pad * 8, pad * 4),
        };
        let tab_w = text_w + 2 * pad;
        let tab_h = text_h + 2 * pad;

        // Above the box when there is room, inside it otherwise.
        let tab_y = if y >= tab_h as i32 { y - tab_h as i32 } else { y };
        draw_filled_rect_mut(canvas, Rect::at(x, tab_y).of_size(tab_w, tab_h), color);

        if let Some(font) = &self.font {
            draw_text_mut(canvas, TEXT_COLOR, x + pad as i32, tab_y + pad as i32, scale, font, &text);
        }
    }
}

impl AnnotatorPort for ImageAnnotator {
    fn annotate(&self, image: &RgbImage, detections: &[Detection]) -> DomainResult<Vec<u8>> {
        let rendered = self.render(image, detections);
        encode_jpeg(&rendered, self.jpeg_quality)
            .map_err(|e| DomainError::OperationFailed(format!("encoding annotated image: {:#}", e)))
    }
}

fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("parsing {}", path.display()))
}

fn line_width(width: u32, height: u32) -> u32 {
    let lw = ((width + height) as f32 / 2.0 * 0.003).round() as u32;
    lw.max(2)
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(image)?;
    Ok(buf)
}
