use std::sync::{Arc, atomic::AtomicUsize};

use crate::{
    buffer::sampler::PixelSampler,
    foundation::core::{Color, DataType, Rect, Resolution},
    foundation::error::CompositorResult,
    operation::{
        AoiContext, AoiRequests, ExecContext, InitContext, NodeOperation, TileData,
        blur::{
            BlurSettings, BlurSource, BokehKernel, IMAGE_INPUT, KernelCell, SIZE_INPUT,
            WeightedSum, blur_area_of_interest, clamp_radius, read_size,
        },
    },
};

/// Single-pass 2-D gaussian blur over an elliptical disc.
///
/// Radii are clamped to half the frame.
#[derive(Debug)]
pub struct GaussianBokehBlurOperation {
    settings: BlurSettings,
    kernel: KernelCell<BokehKernel>,
}

impl GaussianBokehBlurOperation {
    /// Create the blur.
    pub fn new(settings: BlurSettings) -> Self {
        Self {
            settings,
            kernel: KernelCell::new(),
        }
    }

    /// Counter of kernel builds, shared with the operation.
    pub fn kernel_builds(&self) -> Arc<AtomicUsize> {
        self.kernel.build_counter()
    }

    fn radii(&self, size: f32, res: Resolution) -> (f32, f32) {
        (
            clamp_radius(size * self.settings.size_x, res.width as f32 / 2.0),
            clamp_radius(size * self.settings.size_y, res.height as f32 / 2.0),
        )
    }

    fn build(&self, size: f32, res: Resolution) -> CompositorResult<BokehKernel> {
        let (rx, ry) = self.radii(size, res);
        tracing::debug!(radius_x = rx, radius_y = ry, "building bokeh kernel");
        BokehKernel::build(self.settings.filter, rx, ry)
    }
}

impl NodeOperation for GaussianBokehBlurOperation {
    fn name(&self) -> &'static str {
        "GaussianBokehBlur"
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
        let Some(kernel) = ctx.tile_data::<BokehKernel>() else {
            return ctx.read_input(IMAGE_INPUT, x, y, sampler);
        };
        let src = BlurSource::new(ctx);
        let bounds = src.bounds();
        let (px, py) = (x.floor() as i32, y.floor() as i32);

        let xlo = (px - kernel.taps_x()).max(bounds.xmin);
        let xhi = (px + kernel.taps_x()).min(bounds.xmax - 1);
        let ylo = (py - kernel.taps_y()).max(bounds.ymin);
        let yhi = (py + kernel.taps_y()).min(bounds.ymax - 1);

        let mut sum = WeightedSum::default();
        for sy in ylo..=yhi {
            for sx in xlo..=xhi {
                sum.add(src.fetch(sx, sy), kernel.weight(sx - px, sy - py));
            }
        }
        sum.finish(|| src.fetch(px, py))
    }

    fn area_of_interest(&self, ctx: &AoiContext<'_>, output: Rect) -> AoiRequests {
        let res = ctx.resolution();
        blur_area_of_interest(ctx, output, |size| {
            let (rx, ry) = self.radii(size, res);
            (rx.ceil() as i32, ry.ceil() as i32)
        })
    }

    fn deinit_execution(&mut self) {
        self.kernel.reset();
    }
}
