//! Gaussian blurs with a lazily built, shared kernel.
//!
//! Both blur operations take the image on input 0 and a size factor on input 1. The size may be
//! a constant, in which case the kernel is built during initialization and the area of interest
//! is the output rectangle dilated by the radius, or an image, in which case the kernel is built
//! from the size at pixel `(0, 0)` on the first chunk and the whole input frame is requested.

use smallvec::smallvec;

use crate::{
    buffer::{memory_buffer::ExtendMode, memory_buffer::MemoryBuffer, sampler::PixelSampler},
    foundation::core::{Color, Rect},
    foundation::math::FilterType,
    operation::{AoiContext, AoiRequests, ExecContext},
};

pub mod gaussian_axis;
pub mod gaussian_bokeh;
pub mod kernel;

pub use gaussian_axis::{BlurAxis, GaussianAxisBlurOperation};
pub use gaussian_bokeh::GaussianBokehBlurOperation;
pub use kernel::{BokehKernel, GaussTable, KernelCell};

pub(crate) const IMAGE_INPUT: usize = 0;
pub(crate) const SIZE_INPUT: usize = 1;

/// Region of the size input inspected to decide whether it depends on a read-buffer.
pub const SIZE_PROBE: Rect = Rect::new(0, 0, 5, 5);

/// Static blur parameters.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BlurSettings {
    /// Kernel shape.
    pub filter: FilterType,
    /// Horizontal radius in pixels at size factor 1.
    pub size_x: f32,
    /// Vertical radius in pixels at size factor 1.
    pub size_y: f32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            filter: FilterType::Gauss,
            size_x: 0.0,
            size_y: 0.0,
        }
    }
}

impl BlurSettings {
    /// Same radius on both axes.
    pub fn uniform(filter: FilterType, size: f32) -> Self {
        Self {
            filter,
            size_x: size,
            size_y: size,
        }
    }
}

/// Clamp a radius to `[1, limit]`. Non-finite radii become 1.
pub(crate) fn clamp_radius(radius: f32, limit: f32) -> f32 {
    if !radius.is_finite() {
        return 1.0;
    }
    radius.clamp(1.0, limit.max(1.0))
}

/// Shared area-of-interest rule of the blurs.
///
/// `taps` maps a constant size factor to the dilation along x and y.
pub(crate) fn blur_area_of_interest(
    ctx: &AoiContext<'_>,
    output: Rect,
    taps: impl FnOnce(f32) -> (i32, i32),
) -> AoiRequests {
    let image = match (
        ctx.probe(SIZE_INPUT, SIZE_PROBE),
        ctx.input_constant(SIZE_INPUT),
    ) {
        (None, Some(size)) => {
            let (dx, dy) = taps(size[0]);
            output.dilate(dx, dy)
        }
        _ => ctx.resolution().to_rect(),
    };
    smallvec![(IMAGE_INPUT, image), (SIZE_INPUT, SIZE_PROBE)]
}

/// Size factor read lazily when no constant was available at initialization.
pub(crate) fn read_size(ctx: &ExecContext<'_>) -> f32 {
    ctx.read_input(SIZE_INPUT, 0.0, 0.0, PixelSampler::Nearest)[0]
}

/// Pixels under a blur window.
///
/// Normally the image input is a read-buffer and taps come straight from its memory buffer;
/// otherwise each tap evaluates the input.
pub(crate) struct BlurSource<'a> {
    ctx: ExecContext<'a>,
    buffer: Option<&'a MemoryBuffer>,
    bounds: Rect,
}

impl<'a> BlurSource<'a> {
    pub(crate) fn new(ctx: &ExecContext<'a>) -> Self {
        let buffer = ctx.input_buffer(IMAGE_INPUT);
        let bounds = buffer.map_or_else(|| ctx.resolution().to_rect(), |b| b.rect());
        Self {
            ctx: *ctx,
            buffer,
            bounds,
        }
    }

    pub(crate) fn bounds(&self) -> Rect {
        self.bounds
    }

    pub(crate) fn fetch(&self, x: i32, y: i32) -> Color {
        match self.buffer {
            Some(b) => b.fetch(x, y, ExtendMode::Extend),
            None => self
                .ctx
                .read_input(IMAGE_INPUT, x as f32, y as f32, PixelSampler::Nearest),
        }
    }
}

/// Weighted color sum normalized by the weight actually accumulated.
#[derive(Default)]
pub(crate) struct WeightedSum {
    acc: Color,
    weight: f32,
}

impl WeightedSum {
    pub(crate) fn add(&mut self, c: Color, w: f32) {
        for (a, v) in self.acc.iter_mut().zip(c) {
            *a += v * w;
        }
        self.weight += w;
    }

    /// The average, or `fallback` when nothing was accumulated.
    pub(crate) fn finish(self, fallback: impl FnOnce() -> Color) -> Color {
        if self.weight > 0.0 {
            self.acc.map(|a| a / self.weight)
        } else {
            fallback()
        }
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/operation/blur/mod.rs"]
mod tests;
