use std::sync::{Arc, atomic::AtomicUsize};

use crate::{
    buffer::sampler::PixelSampler,
    foundation::core::{Color, DataType, Rect, Resolution},
    foundation::error::CompositorResult,
    operation::{
        AoiContext, AoiRequests, ExecContext, InitContext, NodeOperation, TileData,
        blur::{
            BlurSettings, BlurSource, GaussTable, IMAGE_INPUT, KernelCell, SIZE_INPUT,
            WeightedSum, blur_area_of_interest, clamp_radius, read_size,
        },
    },
};

/// Direction of a separable blur pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlurAxis {
    /// Horizontal pass.
    X,
    /// Vertical pass.
    Y,
}

/// One pass of a separable gaussian blur.
///
/// Two passes, X then Y, make the fast blur mode.
#[derive(Debug)]
pub struct GaussianAxisBlurOperation {
    axis: BlurAxis,
    settings: BlurSettings,
    kernel: KernelCell<GaussTable>,
}

impl GaussianAxisBlurOperation {
    /// Blur along `axis`.
    pub fn new(axis: BlurAxis, settings: BlurSettings) -> Self {
        Self {
            axis,
            settings,
            kernel: KernelCell::new(),
        }
    }

    /// The pass direction.
    pub fn axis(&self) -> BlurAxis {
        self.axis
    }

    /// Counter of kernel builds, shared with the operation.
    pub fn kernel_builds(&self) -> Arc<AtomicUsize> {
        self.kernel.build_counter()
    }

    fn radius(&self, size: f32, res: Resolution) -> f32 {
        let (scale, extent) = match self.axis {
            BlurAxis::X => (self.settings.size_x, res.width),
            BlurAxis::Y => (self.settings.size_y, res.height),
        };
        clamp_radius(size * scale, extent as f32)
    }

    fn build(&self, size: f32, res: Resolution) -> CompositorResult<GaussTable> {
        let radius = self.radius(size, res);
        tracing::debug!(axis = ?self.axis, radius, "building gaussian table");
        GaussTable::build(self.settings.filter, radius)
    }
}

impl NodeOperation for GaussianAxisBlurOperation {
    fn name(&self) -> &'static str {
        match self.axis {
            BlurAxis::X => "GaussianXBlur",
            BlurAxis::Y => "GaussianYBlur",
        }
    }

    fn inputs(&self) -> &'static [DataType] {
        &[DataType::Color, DataType::Value]
    }

    fn output(&self) -> Option<DataType> {
        Some(DataType::Color)
    }

    fn default_input(&self, index: usize) -> Color {
        match index {
            SIZE_INPUT => [1.0, 0.0, 0.0, 0.0],
            _ => DataType::Color.neutral(),
        }
    }

    fn is_complex(&self) -> bool {
        true
    }

    fn init_execution(&mut self, ctx: &InitContext<'_>) -> CompositorResult<()> {
        self.kernel.reset();
        if let Some(size) = ctx.input_constant(SIZE_INPUT) {
            self.kernel
                .get_or_build(|| self.build(size[0], ctx.resolution()))?;
        }
        Ok(())
    }

    fn initialize_tile_data(
        &self,
        ctx: &ExecContext<'_>,
        _rect: Rect,
    ) -> CompositorResult<Option<TileData>> {
        let kernel: TileData = self
            .kernel
            .get_or_build(|| self.build(read_size(ctx), ctx.resolution()))?;
        Ok(Some(kernel))
    }

    fn execute_pixel(&self, ctx: &ExecContext<'_>, x: f32, y: f32, sampler: PixelSampler) -> Color {
        let Some(kernel) = ctx.tile_data::<GaussTable>() else {
            return ctx.read_input(IMAGE_INPUT, x, y, sampler);
        };
        let src = BlurSource::new(ctx);
        let bounds = src.bounds();
        let (px, py) = (x.floor() as i32, y.floor() as i32);
        let taps = kernel.taps();

        let mut sum = WeightedSum::default();
        match self.axis {
            BlurAxis::X => {
                let lo = (px - taps).max(bounds.xmin);
                let hi = (px + taps).min(bounds.xmax - 1);
                for sx in lo..=hi {
                    sum.add(src.fetch(sx, py), kernel.weight(sx - px));
                }
            }
            BlurAxis::Y => {
                let lo = (py - taps).max(bounds.ymin);
                let hi = (py + taps).min(bounds.ymax - 1);
                for sy in lo..=hi {
                    sum.add(src.fetch(px, sy), kernel.weight(sy - py));
                }
            }
        }
        sum.finish(|| src.fetch(px, py))
    }

    fn area_of_interest(&self, ctx: &AoiContext<'_>, output: Rect) -> AoiRequests {
        let res = ctx.resolution();
        blur_area_of_interest(ctx, output, |size| {
            let taps = self.radius(size, res).ceil() as i32;
            match self.axis {
                BlurAxis::X => (taps, 0),
                BlurAxis::Y => (0, taps),
            }
        })
    }

    fn deinit_execution(&mut self) {
        self.kernel.reset();
    }
}
