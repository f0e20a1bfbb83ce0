use crate::foundation::core::Color;

/// Reconstruction filter shapes used to build blur kernels.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Flat weights inside the radius.
    Box,
    /// Linear falloff.
    Tent,
    /// Quadratic B-spline.
    Quadratic,
    /// Cubic B-spline.
    Cubic,
    /// Catmull-Rom spline.
    CatRom,
    /// Truncated gaussian.
    #[default]
    Gauss,
    /// Mitchell-Netravali (B = C = 1/3).
    Mitchell,
}

impl FilterType {
    /// Parse a user-facing filter name; `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "box" | "flat" => Some(Self::Box),
            "tent" => Some(Self::Tent),
            "quad" | "quadratic" => Some(Self::Quadratic),
            "cubic" => Some(Self::Cubic),
            "catrom" | "catmull_rom" | "catmull-rom" => Some(Self::CatRom),
            "gauss" | "gaussian" => Some(Self::Gauss),
            "mitch" | "mitchell" => Some(Self::Mitchell),
            _ => None,
        }
    }
}

const GAUSS_FAC: f32 = 1.6;

/// Filter weight at normalized distance `x` (1.0 == kernel radius).
pub fn filter_value(filter: FilterType, x: f32) -> f32 {
    let x = x.abs();
    match filter {
        FilterType::Box => {
            if x > 1.0 {
                0.0
            } else {
                1.0
            }
        }
        FilterType::Tent => {
            if x > 1.0 {
                0.0
            } else {
                1.0 - x
            }
        }
        FilterType::Gauss => {
            let x = x * GAUSS_FAC;
            // Offset so the weight reaches zero just outside the radius.
            (1.0 / (x * x).exp() - 1.0 / (GAUSS_FAC * GAUSS_FAC * 2.25).exp()).max(0.0)
        }
        FilterType::Mitchell => mitchell(x * GAUSS_FAC),
        FilterType::Quadratic => quadratic(x * GAUSS_FAC),
        FilterType::Cubic => cubic_bspline(x * GAUSS_FAC),
        FilterType::CatRom => catmull_rom(x * GAUSS_FAC),
    }
}

fn quadratic(x: f32) -> f32 {
    if x < 0.5 {
        0.75 - x * x
    } else if x < 1.5 {
        0.5 * (x - 1.5) * (x - 1.5)
    } else {
        0.0
    }
}

fn cubic_bspline(x: f32) -> f32 {
    let x = x.abs();
    let x2 = x * x;
    if x < 1.0 {
        0.5 * x * x2 - x2 + 2.0 / 3.0
    } else if x < 2.0 {
        let t = 2.0 - x;
        t * t * t / 6.0
    } else {
        0.0
    }
}

/// Catmull-Rom weight; interpolating, so also used by bicubic sampling.
pub(crate) fn catmull_rom(x: f32) -> f32 {
    let x = x.abs();
    let x2 = x * x;
    if x < 1.0 {
        1.5 * x2 * x - 2.5 * x2 + 1.0
    } else if x < 2.0 {
        -0.5 * x2 * x + 2.5 * x2 - 4.0 * x + 2.0
    } else {
        0.0
    }
}

fn mitchell(x: f32) -> f32 {
    const B: f32 = 1.0 / 3.0;
    const C: f32 = 1.0 / 3.0;
    let p0 = (6.0 - 2.0 * B) / 6.0;
    let p2 = (-18.0 + 12.0 * B + 6.0 * C) / 6.0;
    let p3 = (12.0 - 9.0 * B - 6.0 * C) / 6.0;
    let q0 = (8.0 * B + 24.0 * C) / 6.0;
    let q1 = (-12.0 * B - 48.0 * C) / 6.0;
    let q2 = (6.0 * B + 30.0 * C) / 6.0;
    let q3 = (-B - 6.0 * C) / 6.0;

    if x < 1.0 {
        p0 + x * x * (p2 + x * p3)
    } else if x < 2.0 {
        q0 + x * (q1 + x * (q2 + x * q3))
    } else {
        0.0
    }
}

/// Replace NaN and infinite channels with zero.
pub fn sanitize(c: Color) -> Color {
    c.map(|v| if v.is_finite() { v } else { 0.0 })
}

/// Luminance-like grey value of a color.
pub fn rgb_to_bw(c: Color) -> f32 {
    0.35 * c[0] + 0.45 * c[1] + 0.2 * c[2]
}

/// RGB to YUV (BT.601 analog coefficients). Alpha passes through.
pub fn rgb_to_yuv(c: Color) -> Color {
    let [r, g, b, a] = c;
    [
        0.299 * r + 0.587 * g + 0.114 * b,
        -0.147 * r - 0.289 * g + 0.436 * b,
        0.615 * r - 0.515 * g - 0.100 * b,
        a,
    ]
}

/// Inverse of [`rgb_to_yuv`].
pub fn yuv_to_rgb(c: Color) -> Color {
    let [y, u, v, a] = c;
    [
        y + 1.140 * v,
        y - 0.394 * u - 0.581 * v,
        y + 2.032 * u,
        a,
    ]
}

/// Premultiplied to straight ("key") alpha. Zero alpha yields black.
pub fn premul_to_key(c: Color) -> Color {
    let a = c[3];
    if a == 0.0 {
        return [0.0, 0.0, 0.0, 0.0];
    }
    [c[0] / a, c[1] / a, c[2] / a, a]
}

/// Straight ("key") alpha to premultiplied.
pub fn key_to_premul(c: Color) -> Color {
    let a = c[3];
    [c[0] * a, c[1] * a, c[2] * a, a]
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
