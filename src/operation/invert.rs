use crate::{
    buffer::sampler::PixelSampler,
    foundation::core::{Color, DataType},
    operation::{ExecContext, NodeOperation},
};

const FACTOR: usize = 0;
const COLOR: usize = 1;

/// Blends a color toward its inverse by a factor.
///
/// Input 0 is the factor, input 1 the color. With factor `f` a channel `c` becomes
/// `(1 - c) * f + c * (1 - f)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvertOperation {
    color: bool,
    alpha: bool,
}

impl Default for InvertOperation {
    fn default() -> Self {
        Self {
            color: true,
            alpha: false,
        }
    }
}

impl InvertOperation {
    /// Invert the RGB channels when `color`, the alpha channel when `alpha`.
    pub fn new(color: bool, alpha: bool) -> Self {
        Self { color, alpha }
    }
}

impl NodeOperation for InvertOperation {
    fn name(&self) -> &'static str {
        "Invert"
    }

    fn inputs(&self) -> &'static [DataType] {
        &[DataType::Value, DataType::Color]
    }

    fn output(&self) -> Option<DataType> {
        Some(DataType::Color)
    }

    fn default_input(&self, index: usize) -> Color {
        match index {
            FACTOR => [1.0, 0.0, 0.0, 0.0],
            _ => DataType::Color.neutral(),
        }
    }

    fn resolution_input(&self) -> usize {
        COLOR
    }

    fn execute_pixel(&self, ctx: &ExecContext<'_>, x: f32, y: f32, sampler: PixelSampler) -> Color {
        let f = ctx.read_input(FACTOR, x, y, sampler)[0];
        let c = ctx.read_input(COLOR, x, y, sampler);
        let inv = |v: f32| (1.0 - v) * f + v * (1.0 - f);

        let mut out = c;
        if self.color {
            for ch in &mut out[..3] {
                *ch = inv(*ch);
            }
        }
        if self.alpha {
            out[3] = inv(c[3]);
        }
        out
    }
}
