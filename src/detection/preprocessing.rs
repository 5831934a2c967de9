use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};

use crate::models::RawBox;

/// Grey level used for letterbox padding
pub const PAD_VALUE: u8 = 114;

/// Geometry of a letterbox resize, used to map boxes back to the source image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Map a box from model input space back to source image space
    pub fn unmap(&self, raw: RawBox) -> RawBox {
        RawBox {
            x1: (raw.x1 - self.pad_x as f32) / self.scale,
            y1: (raw.y1 - self.pad_y as f32) / self.scale,
            x2: (raw.x2 - self.pad_x as f32) / self.scale,
            y2: (raw.y2 - self.pad_y as f32) / self.scale,
        }
    }
}

/// Resize keeping the aspect ratio, centred on a `size`×`size` padded canvas
pub fn letterbox(img: &DynamicImage, size: u32) -> (RgbImage, Letterbox) {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let scale = (size as f32 / width.max(1) as f32).min(size as f32 / height.max(1) as f32);
    let scaled_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let scaled_h = ((height as f32 * scale).round() as u32).clamp(1, size);

    let resized = image::imageops::resize(&rgb, scaled_w, scaled_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    let pad_x = (size - scaled_w) / 2;
    let pad_y = (size - scaled_h) / 2;
    image::imageops::overlay(&mut canvas, &resized, pad_x.into(), pad_y.into());

    (canvas, Letterbox { scale, pad_x, pad_y })
}

/// Planar CHW floats in [0, 1], the layout YOLO models take
pub fn to_chw(img: &RgbImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; plane * 3];

    for (x, y, pixel) in img.enumerate_pixels() {
        let offset = (y * width + x) as usize;
        for channel in 0..3 {
            data[channel * plane + offset] = pixel[channel] as f32 / 255.0;
        }
    }
    data
}
