use crate::{
    buffer::sampler::PixelSampler,
    foundation::core::{Color, DataType},
    foundation::math,
    operation::{ExecContext, NodeOperation},
};

/// Per-pixel data kind or color model conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvertKind {
    /// Color passed through unchanged.
    Identity,
    /// `v` to opaque grey `(v, v, v, 1)`.
    ValueToColor,
    /// Mean of the RGB channels.
    ColorToValue,
    /// Weighted luminance of the RGB channels.
    RgbToBw,
    /// `v` to `(v, v, v)`.
    ValueToVector,
    /// Mean of the three components.
    VectorToValue,
    /// RGB as a vector, alpha dropped.
    ColorToVector,
    /// Vector as an opaque color.
    VectorToColor,
    /// RGB to YUV, alpha kept.
    RgbToYuv,
    /// YUV to RGB, alpha kept.
    YuvToRgb,
    /// Premultiplied to straight alpha.
    PremulToKey,
    /// Straight to premultiplied alpha.
    KeyToPremul,
}

impl ConvertKind {
    /// Implicit conversion inserted on a link from `from` to `to`; `None` when the kinds match.
    pub fn between(from: DataType, to: DataType) -> Option<Self> {
        match (from, to) {
            (DataType::Value, DataType::Color) => Some(Self::ValueToColor),
            (DataType::Color, DataType::Value) => Some(Self::ColorToValue),
            (DataType::Value, DataType::Vector) => Some(Self::ValueToVector),
            (DataType::Vector, DataType::Value) => Some(Self::VectorToValue),
            (DataType::Color, DataType::Vector) => Some(Self::ColorToVector),
            (DataType::Vector, DataType::Color) => Some(Self::VectorToColor),
            _ => None,
        }
    }

    /// Parse a user-facing conversion name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "identity" => Some(Self::Identity),
            "value_to_color" => Some(Self::ValueToColor),
            "color_to_value" => Some(Self::ColorToValue),
            "rgb_to_bw" | "bw" => Some(Self::RgbToBw),
            "value_to_vector" => Some(Self::ValueToVector),
            "vector_to_value" => Some(Self::VectorToValue),
            "color_to_vector" => Some(Self::ColorToVector),
            "vector_to_color" => Some(Self::VectorToColor),
            "rgb_to_yuv" => Some(Self::RgbToYuv),
            "yuv_to_rgb" => Some(Self::YuvToRgb),
            "premul_to_key" | "unpremultiply" => Some(Self::PremulToKey),
            "key_to_premul" | "premultiply" => Some(Self::KeyToPremul),
            _ => None,
        }
    }

    fn input(self) -> &'static [DataType] {
        match self {
            Self::ValueToColor | Self::ValueToVector => &[DataType::Value],
            Self::VectorToValue | Self::VectorToColor => &[DataType::Vector],
            _ => &[DataType::Color],
        }
    }

    fn output(self) -> DataType {
        match self {
            Self::ColorToValue | Self::RgbToBw | Self::VectorToValue => DataType::Value,
            Self::ValueToVector | Self::ColorToVector => DataType::Vector,
            _ => DataType::Color,
        }
    }

    /// Apply the conversion to one pixel.
    pub fn apply(self, c: Color) -> Color {
        match self {
            Self::Identity => c,
            Self::ValueToColor => [c[0], c[0], c[0], 1.0],
            Self::ColorToValue => [(c[0] + c[1] + c[2]) / 3.0, 0.0, 0.0, 0.0],
            Self::RgbToBw => [math::rgb_to_bw(c), 0.0, 0.0, 0.0],
            Self::ValueToVector => [c[0], c[0], c[0], 0.0],
            Self::VectorToValue => [(c[0] + c[1] + c[2]) / 3.0, 0.0, 0.0, 0.0],
            Self::ColorToVector => [c[0], c[1], c[2], 0.0],
            Self::VectorToColor => [c[0], c[1], c[2], 1.0],
            Self::RgbToYuv => math::rgb_to_yuv(c),
            Self::YuvToRgb => math::yuv_to_rgb(c),
            Self::PremulToKey => math::premul_to_key(c),
            Self::KeyToPremul => math::key_to_premul(c),
        }
    }
}

/// Applies a [`ConvertKind`] to its single input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvertOperation {
    kind: ConvertKind,
}

impl ConvertOperation {
    /// Create a converter.
    pub fn new(kind: ConvertKind) -> Self {
        Self { kind }
    }

    /// The conversion applied.
    pub fn kind(&self) -> ConvertKind {
        self.kind
    }
}

impl NodeOperation for ConvertOperation {
    fn name(&self) -> &'static str {
        "Convert"
    }

    fn inputs(&self) -> &'static [DataType] {
        self.kind.input()
    }

    fn output(&self) -> Option<DataType> {
        Some(self.kind.output())
    }

    fn execute_pixel(&self, ctx: &ExecContext<'_>, x: f32, y: f32, sampler: PixelSampler) -> Color {
        self.kind.apply(ctx.read_input(0, x, y, sampler))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/convert.rs"]
mod tests;
