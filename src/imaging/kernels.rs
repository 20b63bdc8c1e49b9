//! Filter pipeline executor.
//!
//! Applies a resolved [`FilterPipeline`] to one decoded image. Every kernel
//! works on an RGBA8 canvas so rotation can leave transparent corners and
//! later filters see a single pixel layout.
//!
//! ## Kernel mapping
//!
//! | Filter | Implementation |
//! |---|---|
//! | Resize | `image::imageops::resize`, Lanczos3 |
//! | CropToSize | `image::imageops::crop_imm`, left anchor |
//! | Rotate | `rotate90/180/270` for quarter turns, bilinear resample otherwise |
//! | Brightness | `image::imageops::brighten` (percent of 255) |
//! | Contrast | `image::imageops::contrast` |
//! | Saturation | per-pixel lerp away from luma |
//! | GaussianBlur | `image::imageops::blur` |
//! | Pixelate | block average |
//! | Grayscale | `DynamicImage::grayscale` (alpha kept) |
//! | Invert | `image::imageops::invert` |

use super::calculations::{
    crop_dimensions, crop_origin, normalize_degrees, quarter_turns, resize_dimensions,
    rotated_dimensions,
};
use crate::filters::{FilterPipeline, ResolvedFilter};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use thiserror::Error;

/// Largest side any filter may produce. JPEG cannot encode beyond it.
pub const MAX_CANVAS_SIDE: u32 = u16::MAX as u32;
/// Largest pixel count any filter may produce (256 MiB of RGBA).
pub const MAX_CANVAS_PIXELS: u64 = 64 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("{filter} produced an empty canvas")]
    EmptyCanvas { filter: &'static str },
    #[error("{filter} would produce a {width}x{height} canvas")]
    CanvasTooLarge {
        filter: &'static str,
        width: u32,
        height: u32,
    },
    #[error("filter kernel panicked: {0}")]
    KernelPanicked(String),
}

/// Apply every filter of the pipeline, in order, to `image`.
pub fn apply(image: DynamicImage, pipeline: &FilterPipeline) -> Result<DynamicImage, FilterError> {
    let mut canvas = image.into_rgba8();
    for filter in pipeline.filters() {
        // Checked before the kernel allocates anything
        let (width, height) = filter.output_bounds(canvas.dimensions());
        if width > MAX_CANVAS_SIDE
            || height > MAX_CANVAS_SIDE
            || u64::from(width) * u64::from(height) > MAX_CANVAS_PIXELS
        {
            return Err(FilterError::CanvasTooLarge {
                filter: filter.kind().name(),
                width,
                height,
            });
        }
        canvas = apply_filter(canvas, filter);
        if canvas.width() == 0 || canvas.height() == 0 {
            return Err(FilterError::EmptyCanvas {
                filter: filter.kind().name(),
            });
        }
    }
    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Apply one filter to an RGBA canvas.
pub fn apply_filter(canvas: RgbaImage, filter: &ResolvedFilter) -> RgbaImage {
    let bounds = canvas.dimensions();
    match *filter {
        ResolvedFilter::Resize { width, height } => {
            let (w, h) = resize_dimensions(bounds, (width, height));
            if (w, h) == bounds {
                canvas
            } else {
                imageops::resize(&canvas, w, h, FilterType::Lanczos3)
            }
        }
        ResolvedFilter::CropToSize { width, height } => {
            let (w, h) = crop_dimensions(bounds, (width, height));
            let (x, y) = crop_origin(bounds, (w, h));
            imageops::crop_imm(&canvas, x, y, w, h).to_image()
        }
        ResolvedFilter::Rotate { degrees } => rotate(canvas, degrees),
        ResolvedFilter::BrightnessAdjust { percent } => {
            let delta = (percent * 2.55).round() as i32;
            imageops::brighten(&canvas, delta)
        }
        ResolvedFilter::ContrastAdjust { percent } => imageops::contrast(&canvas, percent),
        ResolvedFilter::SaturationAdjust { percent } => saturate(canvas, percent),
        ResolvedFilter::GaussianBlur { sigma } => imageops::blur(&canvas, sigma),
        ResolvedFilter::Pixelate { size } => pixelate(canvas, size),
        ResolvedFilter::Grayscale => DynamicImage::ImageRgba8(canvas).grayscale().into_rgba8(),
        ResolvedFilter::Invert => {
            let mut canvas = canvas;
            imageops::invert(&mut canvas);
            canvas
        }
    }
}

/// Counter-clockwise rotation. Quarter turns are lossless.
fn rotate(canvas: RgbaImage, degrees: f32) -> RgbaImage {
    match quarter_turns(degrees) {
        Some(0) => canvas,
        // imageops rotates clockwise
        Some(1) => imageops::rotate270(&canvas),
        Some(2) => imageops::rotate180(&canvas),
        Some(_) => imageops::rotate90(&canvas),
        None => rotate_bilinear(&canvas, degrees),
    }
}

/// Rotate by an arbitrary angle onto a transparent canvas that fits the
/// rotated bounds, sampling the source bilinearly.
fn rotate_bilinear(src: &RgbaImage, degrees: f32) -> RgbaImage {
    let (dst_w, dst_h) = rotated_dimensions(src.dimensions(), degrees);
    let radians = normalize_degrees(degrees).to_radians();
    let (sin, cos) = radians.sin_cos();
    let (src_cx, src_cy) = (src.width() as f32 / 2.0, src.height() as f32 / 2.0);
    let (dst_cx, dst_cy) = (dst_w as f32 / 2.0, dst_h as f32 / 2.0);

    RgbaImage::from_fn(dst_w, dst_h, |x, y| {
        let dx = x as f32 + 0.5 - dst_cx;
        let dy = y as f32 + 0.5 - dst_cy;
        // Inverse mapping: y axis points down, so counter-clockwise on screen
        let sx = dx * cos - dy * sin + src_cx - 0.5;
        let sy = dx * sin + dy * cos + src_cy - 0.5;
        sample_bilinear(src, sx, sy)
    })
}

fn sample_bilinear(src: &RgbaImage, fx: f32, fy: f32) -> Rgba<u8> {
    let x0 = fx.floor();
    let y0 = fy.floor();
    let (tx, ty) = (fx - x0, fy - y0);
    let texel = |x: f32, y: f32| -> [f32; 4] {
        if x < 0.0 || y < 0.0 || x >= src.width() as f32 || y >= src.height() as f32 {
            [0.0; 4]
        } else {
            let p = src.get_pixel(x as u32, y as u32).0;
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        }
    };
    let (a, b) = (texel(x0, y0), texel(x0 + 1.0, y0));
    let (c, d) = (texel(x0, y0 + 1.0), texel(x0 + 1.0, y0 + 1.0));
    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = a[i] + (b[i] - a[i]) * tx;
        let bottom = c[i] + (d[i] - c[i]) * tx;
        out[i] = (top + (bottom - top) * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Scale each pixel's distance from its luma by `1 + percent / 100`.
fn saturate(mut canvas: RgbaImage, percent: f32) -> RgbaImage {
    let factor = 1.0 + percent / 100.0;
    for pixel in canvas.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        let adjust = |c: u8| (luma + (c as f32 - luma) * factor).round().clamp(0.0, 255.0) as u8;
        *pixel = Rgba([adjust(r), adjust(g), adjust(b), a]);
    }
    canvas
}

/// Replace each `size`×`size` block with its average colour.
fn pixelate(mut canvas: RgbaImage, size: u32) -> RgbaImage {
    if size <= 1 {
        return canvas;
    }
    let (w, h) = canvas.dimensions();
    for by in (0..h).step_by(size as usize) {
        for bx in (0..w).step_by(size as usize) {
            let (bw, bh) = (size.min(w - bx), size.min(h - by));
            let mut sum = [0u64; 4];
            for y in by..by + bh {
                for x in bx..bx + bw {
                    for (acc, channel) in sum.iter_mut().zip(canvas.get_pixel(x, y).0) {
                        *acc += channel as u64;
                    }
                }
            }
            let count = (bw * bh) as u64;
            let avg = Rgba(sum.map(|s| ((s + count / 2) / count) as u8));
            for y in by..by + bh {
                for x in bx..bx + bw {
                    canvas.put_pixel(x, y, avg);
                }
            }
        }
    }
    canvas
}
