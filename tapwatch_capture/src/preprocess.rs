//! Frame clean-up before OCR.
//!
//! Game counters are usually light glyphs on a textured background. Frames
//! are converted to grayscale, split at the Otsu level, flipped to dark text
//! on white when needed, and closed with a 3x3 kernel to heal broken strokes.
use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbaImage};
use tapwatch_traits::Frame;

use crate::error::{BackendError, Result};

/// Interpret an RGBA8 frame as an image.
pub fn to_rgba(frame: &Frame) -> Result<RgbaImage> {
    RgbaImage::from_raw(frame.width, frame.height, frame.bytes.clone()).ok_or_else(|| {
        BackendError::Image(format!(
            "frame of {} bytes is not {}x{} RGBA",
            frame.bytes.len(),
            frame.width,
            frame.height
        ))
    })
}

/// Threshold that maximizes between-class variance of the histogram.
pub fn otsu_level(img: &GrayImage) -> u8 {
    let mut hist = [0u64; 256];
    for p in img.pixels() {
        hist[usize::from(p.0[0])] += 1;
    }
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 127;
    }
    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut w_b = 0u64;
    let mut sum_b = 0.0;
    let mut best = -1.0;
    let mut level = 0usize;
    for (i, &c) in hist.iter().enumerate() {
        w_b += c;
        if w_b == 0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0 {
            break;
        }
        sum_b += i as f64 * c as f64;
        let m_b = sum_b / w_b as f64;
        let m_f = (sum_all - sum_b) / w_f as f64;
        let between = w_b as f64 * w_f as f64 * (m_b - m_f).powi(2);
        if between > best {
            best = between;
            level = i;
        }
    }
    u8::try_from(level).unwrap_or(u8::MAX)
}

/// Black/white split at the Otsu level with the minority class as ink.
pub fn binarize(img: &GrayImage) -> GrayImage {
    let level = otsu_level(img);
    let mut out = GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y).0[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let dark = out.pixels().filter(|p| p.0[0] == 0).count();
    let pixels = (out.width() as usize) * (out.height() as usize);
    if dark * 2 > pixels {
        image::imageops::invert(&mut out);
    }
    out
}

fn filter3x3(img: &GrayImage, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut acc = img.get_pixel(x, y).0[0];
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                acc = pick(acc, img.get_pixel(nx, ny).0[0]);
            }
        }
        Luma([acc])
    })
}

/// Morphological close of dark ink: grow ink, then shrink it back.
pub fn close_ink(img: &GrayImage) -> GrayImage {
    if img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    let grown = filter3x3(img, std::cmp::min);
    filter3x3(&grown, std::cmp::max)
}

/// Encode a frame as PNG, optionally cleaned up for OCR.
pub fn encode_png(frame: &Frame, clean: bool) -> Result<Vec<u8>> {
    let rgba = to_rgba(frame)?;
    let gray = image::imageops::grayscale(&rgba);
    let out = if clean { close_ink(&binarize(&gray)) } else { gray };
    let mut buffer = Vec::new();
    DynamicImage::ImageLuma8(out).write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(w: u32, h: u32, f: impl Fn(u32, u32) -> u8) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([f(x, y)]))
    }

    #[test]
    fn otsu_splits_bimodal_histogram() {
        let img = gray(10, 10, |x, _| if x < 3 { 200 } else { 40 });
        let level = otsu_level(&img);
        assert!((40..200).contains(&level), "level {level}");
    }

    #[test]
    fn light_text_on_dark_background_becomes_dark_ink() {
        // 3 bright columns on a dark field
        let img = gray(10, 4, |x, _| if (4..7).contains(&x) { 230 } else { 20 });
        let bin = binarize(&img);
        assert_eq!(bin.get_pixel(5, 1).0[0], 0, "glyph is ink");
        assert_eq!(bin.get_pixel(0, 1).0[0], 255, "background is paper");
    }

    #[test]
    fn close_heals_single_pixel_gap() {
        let mut img = gray(9, 5, |_, _| 255);
        for x in [2, 3, 5, 6] {
            img.put_pixel(x, 2, Luma([0]));
        }
        let closed = close_ink(&img);
        assert_eq!(closed.get_pixel(4, 2).0[0], 0);
        assert_eq!(closed.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn encode_rejects_short_buffer() {
        let frame = Frame {
            width: 4,
            height: 4,
            bytes: vec![0; 10],
        };
        assert!(matches!(encode_png(&frame, true), Err(BackendError::Image(_))));
    }

    #[test]
    fn encode_produces_png() {
        let frame = Frame {
            width: 2,
            height: 2,
            bytes: vec![255; 16],
        };
        let png = encode_png(&frame, true).expect("encode");
        assert_eq!(&png[..4], b"\x89PNG");
    }
}
