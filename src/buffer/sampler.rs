//! Pixel sampling policies over a [`MemoryBuffer`].
//!
//! Coordinates are absolute pixel coordinates; pixel `(i, j)` is sampled exactly at `(i, j)`.
//! All policies read through [`MemoryBuffer::fetch`], so the buffer's extend rule decides what
//! lies outside its rectangle.

use crate::{
    buffer::memory_buffer::{ExtendMode, MemoryBuffer},
    foundation::core::Color,
    foundation::error::{CompositorError, CompositorResult},
    foundation::math::catmull_rom,
};

/// Largest EWA semi-axis in pixels. Bounds per-sample cost.
pub const MAX_EWA_RADIUS: f32 = 16.0;

const MIN_EWA_RADIUS: f32 = 0.5;

/// How an operation reads its input at a (possibly fractional) coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelSampler {
    /// Nearest pixel.
    #[default]
    Nearest,
    /// 2x2 linear interpolation.
    Bilinear,
    /// 4x4 cubic interpolation.
    Bicubic,
    /// Elliptical weighted average; `dx`, `dy` are the footprint extents in pixels.
    Ewa {
        /// Horizontal footprint extent.
        dx: f32,
        /// Vertical footprint extent.
        dy: f32,
    },
}

impl PixelSampler {
    /// Reject non-finite EWA derivatives.
    pub fn validate(self) -> CompositorResult<()> {
        if let Self::Ewa { dx, dy } = self
            && !(dx.is_finite() && dy.is_finite())
        {
            return Err(CompositorError::validation(
                "ewa sampler derivatives must be finite",
            ));
        }
        Ok(())
    }

    /// Sample `buf` at `(x, y)` with this policy.
    pub fn sample(self, buf: &MemoryBuffer, x: f32, y: f32, extend: ExtendMode) -> Color {
        match self {
            Self::Nearest => sample_nearest(buf, x, y, extend),
            Self::Bilinear => sample_bilinear(buf, x, y, extend),
            Self::Bicubic => sample_bicubic(buf, x, y, extend),
            Self::Ewa { dx, dy } => sample_ewa(buf, x, y, dx, dy, extend),
        }
    }
}

fn to_index(v: f32) -> i32 {
    if v.is_finite() {
        // Saturating float-to-int cast.
        v.floor() as i32
    } else {
        0
    }
}

fn mix(acc: &mut Color, c: Color, w: f32) {
    for i in 0..4 {
        acc[i] += c[i] * w;
    }
}

/// Nearest-pixel lookup.
pub fn sample_nearest(buf: &MemoryBuffer, x: f32, y: f32, extend: ExtendMode) -> Color {
    buf.fetch(to_index(x), to_index(y), extend)
}

/// Bilinear interpolation between the four surrounding pixels.
pub fn sample_bilinear(buf: &MemoryBuffer, x: f32, y: f32, extend: ExtendMode) -> Color {
    if !(x.is_finite() && y.is_finite()) {
        return sample_nearest(buf, x, y, extend);
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (ix, iy) = (x0 as i32, y0 as i32);

    let mut out = [0.0f32; 4];
    mix(&mut out, buf.fetch(ix, iy, extend), (1.0 - fx) * (1.0 - fy));
    let (ix1, iy1) = (ix.saturating_add(1), iy.saturating_add(1));
    mix(&mut out, buf.fetch(ix1, iy, extend), fx * (1.0 - fy));
    mix(&mut out, buf.fetch(ix, iy1, extend), (1.0 - fx) * fy);
    mix(&mut out, buf.fetch(ix1, iy1, extend), fx * fy);
    out
}

/// Catmull-Rom interpolation over the surrounding 4x4 pixels.
pub fn sample_bicubic(buf: &MemoryBuffer, x: f32, y: f32, extend: ExtendMode) -> Color {
    if !(x.is_finite() && y.is_finite()) {
        return sample_nearest(buf, x, y, extend);
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (ix, iy) = (x0 as i32, y0 as i32);

    let mut wx = [0.0f32; 4];
    let mut wy = [0.0f32; 4];
    for k in 0..4 {
        let d = k as f32 - 1.0;
        wx[k] = catmull_rom(d - fx);
        wy[k] = catmull_rom(d - fy);
    }

    let mut out = [0.0f32; 4];
    let mut wsum = 0.0f32;
    for (ky, &w_row) in wy.iter().enumerate() {
        for (kx, &w_col) in wx.iter().enumerate() {
            let w = w_row * w_col;
            let c = buf.fetch(
                ix.saturating_add(kx as i32 - 1),
                iy.saturating_add(ky as i32 - 1),
                extend,
            );
            mix(&mut out, c, w);
            wsum += w;
        }
    }
    if wsum.abs() <= f32::EPSILON {
        return sample_nearest(buf, x, y, extend);
    }
    out.map(|v| v / wsum)
}

/// Axis-aligned elliptical weighted average.
///
/// The ellipse semi-axes are `|dx|` and `|dy|`, clamped to
/// `[0.5, MAX_EWA_RADIUS]`; weights follow a gaussian of the normalized elliptical distance.
pub fn sample_ewa(
    buf: &MemoryBuffer,
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
    extend: ExtendMode,
) -> Color {
    if !(x.is_finite() && y.is_finite()) {
        return sample_nearest(buf, x, y, extend);
    }
    let ra = clamp_axis(dx);
    let rb = clamp_axis(dy);

    let x_lo = (x - ra).ceil() as i32;
    let x_hi = (x + ra).floor() as i32;
    let y_lo = (y - rb).ceil() as i32;
    let y_hi = (y + rb).floor() as i32;

    let mut out = [0.0f32; 4];
    let mut wsum = 0.0f32;
    for py in y_lo..=y_hi {
        let v = (py as f32 - y) / rb;
        for px in x_lo..=x_hi {
            let u = (px as f32 - x) / ra;
            let q = u * u + v * v;
            if q >= 1.0 {
                continue;
            }
            let w = (-2.0 * q).exp();
            mix(&mut out, buf.fetch(px, py, extend), w);
            wsum += w;
        }
    }
    if wsum <= 0.0 {
        return sample_nearest(buf, x, y, extend);
    }
    out.map(|v| v / wsum)
}

fn clamp_axis(d: f32) -> f32 {
    if d.is_finite() {
        d.abs().clamp(MIN_EWA_RADIUS, MAX_EWA_RADIUS)
    } else {
        MIN_EWA_RADIUS
    }
}

#[cfg(test)]
#[path = "../../tests/unit/buffer/sampler.rs"]
mod tests;
