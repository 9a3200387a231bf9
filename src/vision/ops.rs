//! Single-plane image operations used by the line detector.
//!
//! All operations work on `ndarray::Array2<u8>` planes indexed (row, col).

use crate::vision::Frame;
use ndarray::Array2;

/// Extract rows `y0..y1` (full width) as a luminance plane.
///
/// BT.601 weights in 8.8 fixed point: 77/256, 150/256, 29/256 (sums to
/// exactly 256, so a flat gray frame stays flat).
pub fn luminance(frame: &Frame, y0: usize, y1: usize) -> Array2<u8> {
    let width = frame.width as usize;
    let mut plane = Array2::zeros((y1 - y0, width));
    for (row, y) in (y0..y1).enumerate() {
        for x in 0..width {
            let [r, g, b] = frame.pixel(x as u32, y as u32);
            let luma = (77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8;
            plane[(row, x)] = luma as u8;
        }
    }
    plane
}

/// Reflect-101 border index (mirror without repeating the edge sample).
#[inline]
fn reflect_101(mut i: isize, n: isize) -> usize {
    if n == 1 {
        return 0;
    }
    while i < 0 || i >= n {
        if i < 0 {
            i = -i;
        } else {
            i = 2 * n - 2 - i;
        }
    }
    i as usize
}

/// 5x5 Gaussian smoothing with the fixed binomial kernel 1-4-6-4-1
/// (separable, /256 with rounding, reflect-101 borders).
pub fn gaussian_blur_5(src: &Array2<u8>) -> Array2<u8> {
    const KERNEL: [u32; 5] = [1, 4, 6, 4, 1];
    let (rows, cols) = src.dim();
    if rows == 0 || cols == 0 {
        return src.clone();
    }

    // Horizontal pass, keeping 16-bit partial sums
    let mut horizontal: Array2<u16> = Array2::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0u32;
            for (k, &w) in KERNEL.iter().enumerate() {
                let cc = reflect_101(c as isize + k as isize - 2, cols as isize);
                acc += w * src[(r, cc)] as u32;
            }
            horizontal[(r, c)] = acc as u16;
        }
    }

    // Vertical pass, normalizing by 256 with rounding
    let mut out: Array2<u8> = Array2::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0u32;
            for (k, &w) in KERNEL.iter().enumerate() {
                let rr = reflect_101(r as isize + k as isize - 2, rows as isize);
                acc += w * horizontal[(rr, c)] as u32;
            }
            out[(r, c)] = ((acc + 128) >> 8) as u8;
        }
    }
    out
}

/// Binarize a plane to {0, 255}.
///
/// `invert = false`: 255 where `px > threshold` (line lighter than
/// background). `invert = true`: the complement, 255 where
/// `px <= threshold` (line darker than background).
pub fn threshold(src: &Array2<u8>, threshold: u8, invert: bool) -> Array2<u8> {
    src.map(|&px| {
        let above = px > threshold;
        if above != invert {
            255
        } else {
            0
        }
    })
}

/// Erosion with a full 5x5 structuring element: window minimum, windows
/// clamped at the borders (equivalent to +inf constant padding).
pub fn erode_5(src: &Array2<u8>) -> Array2<u8> {
    window_reduce(src, |acc, v| acc.min(v), u8::MAX)
}

/// Dilation with a full 5x5 structuring element: window maximum.
pub fn dilate_5(src: &Array2<u8>) -> Array2<u8> {
    window_reduce(src, |acc, v| acc.max(v), u8::MIN)
}

/// Morphological opening (erode then dilate): removes isolated noise.
pub fn open_5(src: &Array2<u8>) -> Array2<u8> {
    dilate_5(&erode_5(src))
}

/// Morphological closing (dilate then erode): fills small gaps.
pub fn close_5(src: &Array2<u8>) -> Array2<u8> {
    erode_5(&dilate_5(src))
}

fn window_reduce(src: &Array2<u8>, f: impl Fn(u8, u8) -> u8, init: u8) -> Array2<u8> {
    let (rows, cols) = src.dim();
    let mut out: Array2<u8> = Array2::zeros((rows, cols));
    for r in 0..rows {
        let r0 = r.saturating_sub(2);
        let r1 = (r + 2).min(rows.saturating_sub(1));
        for c in 0..cols {
            let c0 = c.saturating_sub(2);
            let c1 = (c + 2).min(cols.saturating_sub(1));
            let mut acc = init;
            for rr in r0..=r1 {
                for cc in c0..=c1 {
                    acc = f(acc, src[(rr, cc)]);
                }
            }
            out[(r, c)] = acc;
        }
    }
    out
}

/// Raw image moments of a mask: total mass and first moments.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    /// Zeroth moment, the sum of sample values
    pub m00: f64,
    /// x-weighted sum
    pub m10: f64,
    /// y-weighted sum
    pub m01: f64,
}

pub fn moments(mask: &Array2<u8>) -> Moments {
    let mut m = Moments::default();
    for ((row, col), &v) in mask.indexed_iter() {
        if v > 0 {
            let v = v as f64;
            m.m00 += v;
            m.m10 += col as f64 * v;
            m.m01 += row as f64 * v;
        }
    }
    m
}
