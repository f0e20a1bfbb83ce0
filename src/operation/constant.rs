use crate::{
    buffer::sampler::PixelSampler,
    foundation::core::{Color, DataType},
    operation::{ExecContext, NodeOperation},
};

/// Emits the same value for every pixel.
///
/// Constants are never buffered: a constant with several consumers is duplicated instead, and
/// consumers may read [`NodeOperation::constant_value`] during initialization.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantOperation {
    data_type: DataType,
    value: Color,
}

impl ConstantOperation {
    /// Constant of any kind.
    pub fn new(data_type: DataType, value: Color) -> Self {
        Self { data_type, value }
    }

    /// Scalar constant.
    pub fn value(v: f32) -> Self {
        Self::new(DataType::Value, [v, 0.0, 0.0, 0.0])
    }

    /// Vector constant.
    pub fn vector(v: [f32; 3]) -> Self {
        Self::new(DataType::Vector, [v[0], v[1], v[2], 0.0])
    }

    /// Color constant.
    pub fn color(c: Color) -> Self {
        Self::new(DataType::Color, c)
    }
}

impl NodeOperation for ConstantOperation {
    fn name(&self) -> &'static str {
        match self.data_type {
            DataType::Value => "SetValue",
            DataType::Vector => "SetVector",
            DataType::Color => "SetColor",
        }
    }

    fn inputs(&self) -> &'static [DataType] {
        &[]
    }

    fn output(&self) -> Option<DataType> {
        Some(self.data_type)
    }

    fn constant_value(&self) -> Option<Color> {
        Some(self.value)
    }

    fn execute_pixel(&self, _ctx: &ExecContext<'_>, _x: f32, _y: f32, _s: PixelSampler) -> Color {
        self.value
    }
}
