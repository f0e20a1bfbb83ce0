use crate::{
    buffer::sampler::PixelSampler,
    foundation::core::Resolution,
    foundation::error::{CompositorError, CompositorResult},
};

/// Default chunk edge length in pixels.
pub const DEFAULT_CHUNK_SIZE: u32 = 32;

/// Which blur kernel policy `blur` nodes are converted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurQuality {
    /// Separable 1-D tables, X pass then Y pass.
    Fast,
    /// Full 2-D weighted disc.
    #[default]
    Quality,
}

/// Order in which a group's chunks are handed to workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkOrder {
    /// Top-left to bottom-right, row by row.
    RowMajor,
    /// Nearest-to-center first, for interactive previews.
    #[default]
    CenterOut,
}

/// Execution options. Every field has a default so partial JSON documents load.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Chunk edge length. Affects granularity only, never results.
    pub chunk_size: u32,
    /// Sampler used when evaluating group terminals.
    pub sampler: PixelSampler,
    /// Kernel policy for blur nodes.
    pub blur_quality: BlurQuality,
    /// Chunk scheduling order.
    pub chunk_order: ChunkOrder,
    /// Preferred resolution for operations without an intrinsic size.
    pub resolution: Resolution,
    /// Forces the resolution of output operations.
    pub output_resolution: Option<Resolution>,
    /// Worker thread count. `None` uses rayon defaults.
    pub threads: Option<usize>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            sampler: PixelSampler::Nearest,
            blur_quality: BlurQuality::Quality,
            chunk_order: ChunkOrder::CenterOut,
            resolution: Resolution::new(256, 256),
            output_resolution: None,
            threads: None,
        }
    }
}

impl CompositorConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> CompositorResult<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> CompositorResult<()> {
        if self.chunk_size == 0 {
            return Err(CompositorError::validation("chunk_size must be >= 1"));
        }
        Resolution::validated(self.resolution.width, self.resolution.height)?;
        if let Some(r) = self.output_resolution
            && r.is_empty()
        {
            return Err(CompositorError::validation(
                "output_resolution width and height must be > 0",
            ));
        }
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(CompositorError::validation("threads must be >= 1 when set"));
        }
        self.sampler.validate()
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
