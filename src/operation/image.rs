use std::sync::Arc;

use crate::{
    buffer::{
        memory_buffer::{ExtendMode, MemoryBuffer},
        sampler::PixelSampler,
    },
    foundation::core::{Color, DataType, Resolution},
    operation::{ExecContext, NodeOperation},
};

/// Samples a caller-provided image.
///
/// The image is positioned at the origin and sets the operation's resolution.
#[derive(Clone, Debug)]
pub struct ImageSourceOperation {
    name: String,
    image: Arc<MemoryBuffer>,
    extend: ExtendMode,
}

impl ImageSourceOperation {
    /// Sample `image`, applying `extend` outside its rectangle.
    pub fn new(name: impl Into<String>, image: Arc<MemoryBuffer>, extend: ExtendMode) -> Self {
        Self {
            name: name.into(),
            image,
            extend,
        }
    }

    /// Name the image was registered under.
    pub fn image_name(&self) -> &str {
        &self.name
    }
}

impl NodeOperation for ImageSourceOperation {
    fn name(&self) -> &'static str {
        "ImageSource"
    }

    fn inputs(&self) -> &'static [DataType] {
        &[]
    }

    fn output(&self) -> Option<DataType> {
        Some(DataType::Color)
    }

    fn determine_resolution(&self, _inputs: &[Option<Resolution>], _pref: Resolution) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    fn execute_pixel(&self, _ctx: &ExecContext<'_>, x: f32, y: f32, sampler: PixelSampler) -> Color {
        sampler.sample(&self.image, x, y, self.extend)
    }
}
