//! Pixel filters the `image` crate does not provide with the needed semantics.

use image::{Rgb, RgbImage};

/// 3x3 kernel that strongly sharpens edges (weights sum to 1)
pub(super) const EDGE_ENHANCE_MORE: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// Scale each channel's distance from the image's mean luminance by `factor`
///
/// A factor of 1.0 returns the image unchanged, 0.0 a flat gray image.
pub(super) fn contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let pixels = u64::from(img.width()) * u64::from(img.height());
    if pixels == 0 {
        return img.clone();
    }

    let luma_sum: f64 = img
        .pixels()
        .map(|Rgb([r, g, b])| {
            (f64::from(*r) * 299.0 + f64::from(*g) * 587.0 + f64::from(*b) * 114.0) / 1000.0
        })
        .sum();
    let mean = (luma_sum / pixels as f64).round() as f32;

    let mut out = img.clone();
    for px in out.pixels_mut() {
        for channel in px.0.iter_mut() {
            let v = mean + factor * (f32::from(*channel) - mean);
            *channel = clamp_u8(v);
        }
    }
    out
}

/// Convolve with a 3x3 kernel, replicating edge pixels at the border
pub(super) fn convolve3x3(img: &RgbImage, kernel: &[f32; 9]) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut out = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }

    let sum: f32 = kernel.iter().sum();
    let scale = if sum == 0.0 { 1.0 } else { sum };
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    for y in 0..height {
        for x in 0..width {
            let mut acc = [0f32; 3];
            for (k, weight) in kernel.iter().enumerate() {
                let dx = (k % 3) as i64 - 1;
                let dy = (k / 3) as i64 - 1;
                let sx = (x as i64 + dx).clamp(0, max_x) as u32;
                let sy = (y as i64 + dy).clamp(0, max_y) as u32;
                let Rgb(src) = img.get_pixel(sx, sy);
                for c in 0..3 {
                    acc[c] += f32::from(src[c]) * weight;
                }
            }
            out.put_pixel(
                x,
                y,
                Rgb([
                    clamp_u8(acc[0] / scale),
                    clamp_u8(acc[1] / scale),
                    clamp_u8(acc[2] / scale),
                ]),
            );
        }
    }
    out
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contrast_identity_and_flatten() {
        let img = RgbImage::from_fn(4, 4, |x, y| Rgb([(x * 40) as u8, (y * 40) as u8, 100]));
        assert_eq!(contrast(&img, 1.0), img);

        let flat = contrast(&img, 0.0);
        let first = *flat.get_pixel(0, 0);
        assert!(flat.pixels().all(|p| *p == first), "factor 0 must give a flat image");
    }

    #[test]
    fn contrast_pushes_values_away_from_mean() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([100; 3]) } else { Rgb([150; 3]) });
        let out = contrast(&img, 2.0);
        // mean luma is 125
        assert_eq!(out.get_pixel(0, 0).0, [75; 3]);
        assert_eq!(out.get_pixel(1, 0).0, [175; 3]);
    }

    #[test]
    fn edge_kernel_keeps_flat_regions() {
        let img = RgbImage::from_pixel(5, 5, Rgb([80, 90, 100]));
        assert_eq!(convolve3x3(&img, &EDGE_ENHANCE_MORE), img);
    }

    #[test]
    fn edge_kernel_amplifies_a_spike() {
        let mut img = RgbImage::from_pixel(3, 3, Rgb([10; 3]));
        img.put_pixel(1, 1, Rgb([20; 3]));
        let out = convolve3x3(&img, &EDGE_ENHANCE_MORE);
        // 9*20 - 8*10 = 100
        assert_eq!(out.get_pixel(1, 1).0, [100; 3]);
    }

    #[test]
    fn convolve_handles_single_pixel_image() {
        let img = RgbImage::from_pixel(1, 1, Rgb([5, 6, 7]));
        assert_eq!(convolve3x3(&img, &EDGE_ENHANCE_MORE), img);
    }
}
