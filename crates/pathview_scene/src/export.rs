//! Writing the accumulated frame to an image file.

use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};
use pathview_math::Vec4;

use crate::backend::OutputView;
use crate::error::{Result, SceneError};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
    Bmp,
    Gif,
}

impl ExportFormat {
    /// Pick a format from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "bmp" => Some(ExportFormat::Bmp),
            "gif" => Some(ExportFormat::Gif),
            _ => None,
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            ExportFormat::Png => ImageFormat::Png,
            ExportFormat::Jpeg => ImageFormat::Jpeg,
            ExportFormat::Bmp => ImageFormat::Bmp,
            ExportFormat::Gif => ImageFormat::Gif,
        }
    }
}

/// A copy of the output buffer, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec4>,
}

impl FrameImage {
    /// Copy an output buffer, flipping it so row 0 is the top of the image.
    pub fn from_output(output: &OutputView<'_>) -> Self {
        let width = output.width as usize;
        let pixels = if width == 0 {
            Vec::new()
        } else {
            output
                .pixels
                .chunks_exact(width)
                .rev()
                .flatten()
                .copied()
                .collect()
        };
        Self {
            width: output.width,
            height: output.height,
            pixels,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[(y * self.width + x) as usize]
    }

    /// 8-bit RGBA bytes with every channel clamped to [0, 1].
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for p in &self.pixels {
            let c = p.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
            bytes.extend_from_slice(&[c.x as u8, c.y as u8, c.z as u8, c.w as u8]);
        }
        bytes
    }

    pub fn save(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let export_error = |message: String| SceneError::Export {
            path: path.to_path_buf(),
            message,
        };

        let rgba = RgbaImage::from_raw(self.width, self.height, self.to_rgba8())
            .ok_or_else(|| export_error("pixel buffer does not match frame size".to_string()))?;
        let image = match format {
            // no alpha channel in JPEG
            ExportFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8()),
            _ => DynamicImage::ImageRgba8(rgba),
        };

        image
            .save_with_format(path, format.image_format())
            .map_err(|e| export_error(e.to_string()))?;
        log::info!(
            "Saved {}x{} frame to {}",
            self.width,
            self.height,
            path.display()
        );
        Ok(())
    }
}
