use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use ndarray::Array4;

const PAD_VALUE: u8 = 114;

/// Geometry of an aspect-preserving resize into a padded model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub gain: f32,
    pub new_w: u32,
    pub new_h: u32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    pub fn compute(width: u32, height: u32, target_w: u32, target_h: u32) -> Self {
        let gain = (target_w as f32 / width as f32).min(target_h as f32 / height as f32);
        let new_w = ((width as f32 * gain).round() as u32).clamp(1, target_w);
        let new_h = ((height as f32 * gain).round() as u32).clamp(1, target_h);

        // Centered, rounding half the slack down like the reference letterbox.
        let pad_x = ((target_w - new_w) as f32 / 2.0 - 0.1).round().max(0.0) as u32;
        let pad_y = ((target_h - new_h) as f32 / 2.0 - 0.1).round().max(0.0) as u32;

        Self { gain, new_w, new_h, pad_x, pad_y }
    }

    /// Maps an `[x1, y1, x2, y2]` box from model input space back to the
    /// original image.
    pub fn unmap(&self, bbox: [f32; 4]) -> [f32; 4] {
        let px = self.pad_x as f32;
        let py = self.pad_y as f32;
        [
            (bbox[0] - px) / self.gain,
            (bbox[1] - py) / self.gain,
            (bbox[2] - px) / self.gain,
            (bbox[3] - py) / self.gain,
        ]
    }
}

/// Letterboxes `image` into a `target_w x target_h` NCHW tensor scaled to [0, 1].
pub fn letterbox_tensor(image: &RgbImage, target_w: u32, target_h: u32) -> (Array4<f32>, Letterbox) {
    let lb = Letterbox::compute(image.width(), image.height(), target_w, target_h);

    let resized = imageops::resize(image, lb.new_w, lb.new_h, FilterType::Triangle);
    let mut padded = RgbImage::from_pixel(target_w, target_h, Rgb([PAD_VALUE; 3]));
    imageops::overlay(&mut padded, &resized, lb.pad_x as i64, lb.pad_y as i64);

    let mut input = Array4::<f32>::zeros((1, 3, target_h as usize, target_w as usize));
    for (x, y, pixel) in padded.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
    }

    (input, lb)
}
