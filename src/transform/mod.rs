//! Image transform chain -- the [`Transform`] seam and the fixed filter pipeline.
//!
//! [`ImageChain`] applies, in order: decode, RGB normalize, gaussian blur,
//! contrast enhance, edge enhance, invert, gaussian blur, upscale by the
//! configured factor, downscale back to the original size, encode. Both resize
//! steps use the Lanczos3 kernel; the round trip is a deliberate smoothing pass.

mod filters;

use crate::config::TransformParams;
use crate::error::TransformError;
use crate::utils;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;

/// A file-to-file transformation run inside a CPU-bound worker
pub trait Transform: Send + Sync {
    /// Read `input`, transform it, and write the result to `output`
    ///
    /// On error nothing is written to `output`.
    fn apply(&self, input: &Path, output: &Path) -> Result<(), TransformError>;
}

/// The fixed image filter chain
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageChain {
    params: TransformParams,
}

impl ImageChain {
    /// Create a chain with the given parameters
    pub fn new(params: TransformParams) -> Self {
        Self { params }
    }

    /// Parameters in use
    pub fn params(&self) -> &TransformParams {
        &self.params
    }

    /// Apply every pixel operation of the chain to an already decoded image
    pub fn render(&self, img: &RgbImage) -> RgbImage {
        let p = &self.params;
        let (width, height) = img.dimensions();

        let img = imageops::blur(img, p.blur_radius_pre);
        let img = filters::contrast(&img, p.contrast_factor);
        let mut img = filters::convolve3x3(&img, &filters::EDGE_ENHANCE_MORE);
        imageops::invert(&mut img);
        let img = imageops::blur(&img, p.blur_radius_post);

        let factor = p.upscale_factor.max(1);
        let up = imageops::resize(
            &img,
            width.saturating_mul(factor),
            height.saturating_mul(factor),
            FilterType::Lanczos3,
        );
        imageops::resize(&up, width, height, FilterType::Lanczos3)
    }

    fn encode(&self, img: &RgbImage, output: &Path) -> Result<Vec<u8>, TransformError> {
        let encode_err = |source| TransformError::Encode {
            path: output.to_path_buf(),
            source,
        };
        let format = ImageFormat::from_path(output).unwrap_or(ImageFormat::Png);

        let mut buf = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.params.save_quality);
                encoder.encode_image(img).map_err(encode_err)?;
            }
            ImageFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut buf,
                    CompressionType::Best,
                    PngFilterType::Adaptive,
                );
                img.write_with_encoder(encoder).map_err(encode_err)?;
            }
            other => {
                img.write_to(&mut Cursor::new(&mut buf), other)
                    .map_err(encode_err)?;
            }
        }
        Ok(buf)
    }
}

impl Transform for ImageChain {
    fn apply(&self, input: &Path, output: &Path) -> Result<(), TransformError> {
        let bytes = std::fs::read(input).map_err(|source| TransformError::Io {
            path: input.to_path_buf(),
            source,
        })?;

        let decoded = image::load_from_memory(&bytes).map_err(|source| TransformError::Decode {
            path: input.to_path_buf(),
            source,
        })?;

        let rendered = self.render(&decoded.to_rgb8());
        let encoded = self.encode(&rendered, output)?;

        utils::write_atomic_blocking(output, &encoded).map_err(|source| TransformError::Io {
            path: output.to_path_buf(),
            source,
        })
    }
}
