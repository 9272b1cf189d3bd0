//! Colour segmentation and luma sampling on RGB frames.

use std::collections::VecDeque;

use image::{Rgb, RgbImage};

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersection with the `width` x `height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Rect {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }
}

/// Inclusive per-channel bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub min: [u8; 3],
    pub max: [u8; 3],
}

impl ColorRange {
    pub const RED: ColorRange = ColorRange {
        min: [150, 0, 0],
        max: [255, 100, 100],
    };

    pub const GREEN: ColorRange = ColorRange {
        min: [0, 150, 0],
        max: [100, 255, 100],
    };

    #[inline(always)]
    pub fn contains(&self, px: &Rgb<u8>) -> bool {
        px.0.iter()
            .zip(self.min.iter().zip(&self.max))
            .all(|(&c, (&lo, &hi))| c >= lo && c <= hi)
    }
}

/// A 4-connected component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub area: usize,
    pub cx: f64,
    pub cy: f64,
    pub bounds: Rect,
}

impl Blob {
    /// Side of the square with the blob's area.
    pub fn side(&self) -> f64 {
        (self.area as f64).sqrt()
    }

    pub fn left(&self) -> f64 {
        self.cx - self.side() / 2.0
    }

    pub fn right(&self) -> f64 {
        self.cx + self.side() / 2.0
    }

    pub fn top(&self) -> f64 {
        self.cy - self.side() / 2.0
    }
}

/// Finds the largest 4-connected component of `range` pixels inside `region`.
pub fn find_blob(img: &RgbImage, region: Rect, range: &ColorRange) -> Option<Blob> {
    let region = region.clamp_to(img.width(), img.height());
    if region.is_empty() {
        return None;
    }

    let (w, h) = (region.width as usize, region.height as usize);
    let mut mask: Vec<bool> = Vec::with_capacity(w * h);
    for y in 0..region.height {
        for x in 0..region.width {
            mask.push(range.contains(img.get_pixel(region.x + x, region.y + y)));
        }
    }

    let mut seen = vec![false; w * h];
    let mut queue = VecDeque::new();
    let mut best: Option<Blob> = None;

    for start in 0..w * h {
        if !mask[start] || seen[start] {
            continue;
        }

        seen[start] = true;
        queue.push_back(start);

        let (mut area, mut sx, mut sy) = (0usize, 0usize, 0usize);
        let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0usize, 0usize);

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % w, idx / w);
            area += 1;
            sx += x;
            sy += y;
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);

            let mut visit = |n: usize| {
                if mask[n] && !seen[n] {
                    seen[n] = true;
                    queue.push_back(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < w {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - w);
            }
            if y + 1 < h {
                visit(idx + w);
            }
        }

        if best.is_none_or(|b| area > b.area) {
            // pixel centres sit at +0.5
            best = Some(Blob {
                area,
                cx: region.x as f64 + sx as f64 / area as f64 + 0.5,
                cy: region.y as f64 + sy as f64 / area as f64 + 0.5,
                bounds: Rect::new(
                    region.x + x0 as u32,
                    region.y + y0 as u32,
                    (x1 - x0 + 1) as u32,
                    (y1 - y0 + 1) as u32,
                ),
            });
        }
    }

    best
}

/// BT.601 luma of one pixel.
#[inline(always)]
pub fn luma(px: &Rgb<u8>) -> f64 {
    0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64
}

/// Mean luma over `region`, zero for an empty region.
pub fn mean_luma(img: &RgbImage, region: Rect) -> f64 {
    let region = region.clamp_to(img.width(), img.height());
    if region.is_empty() {
        return 0.0;
    }

    let mut sum = 0.0;
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            sum += luma(img.get_pixel(x, y));
        }
    }
    sum / (region.width as f64 * region.height as f64)
}
