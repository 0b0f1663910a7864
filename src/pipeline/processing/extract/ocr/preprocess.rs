use image::{DynamicImage, GrayImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::median_filter;
use tracing::{debug, warn};

use crate::pipeline::processing::extract::PixelRegion;

/// Crop, grayscale, denoise and binarize an image before recognition
pub fn prepare(image: &DynamicImage, region: Option<PixelRegion>, denoise_radius: u32) -> GrayImage {
    let gray = match region.and_then(|r| clamp_region(r, image.width(), image.height())) {
        Some(r) => image.crop_imm(r.x1, r.y1, r.width(), r.height()).to_luma8(),
        None => {
            if let Some(r) = region {
                warn!(
                    "OCR region {:?} lies outside the {}x{} image, using the whole image",
                    r,
                    image.width(),
                    image.height()
                );
            }
            image.to_luma8()
        }
    };

    let denoised = if denoise_radius > 0 {
        median_filter(&gray, denoise_radius, denoise_radius)
    } else {
        gray
    };

    let level = otsu_level(&denoised);
    debug!("OCR preprocess: otsu level={}", level);
    threshold(&denoised, level, ThresholdType::Binary)
}

fn clamp_region(region: PixelRegion, width: u32, height: u32) -> Option<PixelRegion> {
    let clamped = PixelRegion::new(
        region.x1.min(width),
        region.y1.min(height),
        region.x2.min(width),
        region.y2.min(height),
    );
    if clamped.width() == 0 || clamped.height() == 0 {
        None
    } else {
        Some(clamped)
    }
}
