//! The per-pixel operation contract and the operation implementations.
//!
//! An operation is a node of the [`OperationGraph`]. Its lifecycle within one execution run:
//!
//! 1. [`NodeOperation::determine_resolution`], once, driven by the graph in dependency order
//! 2. [`NodeOperation::init_execution`], once
//! 3. per chunk: [`NodeOperation::initialize_tile_data`], then [`NodeOperation::execute_pixel`]
//!    for every pixel of the chunk, possibly on many worker threads at once
//! 4. [`NodeOperation::deinit_execution`], once, even when the run fails or is cancelled
//!
//! `execute_pixel` takes `&self`: the only mutable state an operation may share between
//! concurrent pixels is what it guards itself, like the blur kernels in [`blur`].

use std::{any::Any, fmt, sync::Arc};

use smallvec::SmallVec;

use crate::{
    buffer::{memory_buffer::MemoryBuffer, proxy::MemoryProxy, sampler::PixelSampler},
    foundation::core::{Color, DataType, Rect, Resolution},
    foundation::error::CompositorResult,
};

pub mod blur;
pub mod buffer_ops;
pub mod constant;
pub mod convert;
pub mod graph;
pub mod image;
pub mod invert;

pub use graph::{OperationGraph, TileDataSet};

/// Index of an operation inside its [`OperationGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(pub u32);

impl OpId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-chunk state produced by [`NodeOperation::initialize_tile_data`].
pub type TileData = Arc<dyn Any + Send + Sync>;

/// Input rectangles an operation needs, as `(input socket, rect)` pairs.
pub type AoiRequests = SmallVec<[(usize, Rect); 4]>;

/// Scheduling priority of an output.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Final render outputs.
    High,
    /// Previews.
    Medium,
    /// Everything else.
    Low,
}

impl Priority {
    /// Parse a user-facing priority name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Group-boundary role of an operation.
#[derive(Clone, Copy, Debug)]
pub enum BufferRole<'a> {
    /// Leaf of a group, reading another group's published buffer.
    Read(&'a Arc<MemoryProxy>),
    /// Terminal of a group, publishing into a proxy.
    Write(&'a Arc<MemoryProxy>),
    /// Terminal of a group, publishing a named result.
    Output {
        /// Output identifier, e.g. `primary`.
        name: &'a str,
        /// Scheduling priority.
        priority: Priority,
    },
}

/// What an operation may look at during [`NodeOperation::init_execution`].
#[derive(Debug)]
pub struct InitContext<'a> {
    pub(crate) resolution: Resolution,
    pub(crate) input_constants: &'a [Option<Color>],
}

impl InitContext<'_> {
    /// Resolved output resolution of the operation.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Value of input `index` when it is known without evaluating any pixel: the input is a
    /// constant operation, or disconnected and taking its default.
    pub fn input_constant(&self, index: usize) -> Option<Color> {
        self.input_constants.get(index).copied().flatten()
    }
}

/// Per-pixel view of the graph handed to [`NodeOperation::execute_pixel`] and
/// [`NodeOperation::initialize_tile_data`].
#[derive(Clone, Copy)]
pub struct ExecContext<'a> {
    pub(crate) graph: &'a OperationGraph,
    pub(crate) op: OpId,
    pub(crate) tiles: &'a TileDataSet,
}

impl fmt::Debug for ExecContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecContext").field("op", &self.op).finish()
    }
}

impl<'a> ExecContext<'a> {
    /// Operation being evaluated.
    pub fn op(&self) -> OpId {
        self.op
    }

    /// Resolution of the operation being evaluated.
    pub fn resolution(&self) -> Resolution {
        self.graph.resolution(self.op)
    }

    /// Evaluate input `index` at `(x, y)`. Disconnected inputs yield their default.
    pub fn read_input(&self, index: usize, x: f32, y: f32, sampler: PixelSampler) -> Color {
        match self.graph.input(self.op, index) {
            Some(src) => self.graph.evaluate(src, x, y, sampler, self.tiles),
            None => self.graph.operation(self.op).default_input(index),
        }
    }

    /// This operation's tile data, if it produced some of type `T`.
    pub fn tile_data<T: Any>(&self) -> Option<&'a T> {
        self.tiles.get(self.op)?.downcast_ref::<T>()
    }

    /// Tile data of the operation connected to input `index`.
    pub fn input_tile_data<T: Any>(&self, index: usize) -> Option<&'a T> {
        let src = self.graph.input(self.op, index)?;
        self.tiles.get(src)?.downcast_ref::<T>()
    }

    /// The memory buffer behind input `index`, when that input reads a published buffer.
    pub fn input_buffer(&self, index: usize) -> Option<&'a MemoryBuffer> {
        self.input_tile_data::<MemoryBuffer>(index)
    }
}

/// View of the graph handed to [`NodeOperation::area_of_interest`].
#[derive(Clone, Copy)]
pub struct AoiContext<'a> {
    pub(crate) graph: &'a OperationGraph,
    pub(crate) op: OpId,
    pub(crate) target: OpId,
}

impl fmt::Debug for AoiContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AoiContext")
            .field("op", &self.op)
            .field("target", &self.target)
            .finish()
    }
}

impl AoiContext<'_> {
    /// Resolution of the queried operation.
    pub fn resolution(&self) -> Resolution {
        self.graph.resolution(self.op)
    }

    /// Run the area-of-interest query for the current target through input `index` alone.
    ///
    /// `Some` means the input's value depends on the target read-buffer.
    pub fn probe(&self, index: usize, rect: Rect) -> Option<Rect> {
        let src = self.graph.input(self.op, index)?;
        self.graph.area_of_interest(src, rect, self.target)
    }

    /// Same as [`InitContext::input_constant`].
    pub fn input_constant(&self, index: usize) -> Option<Color> {
        self.graph.input_constant(self.op, index)
    }
}

/// A unit of per-pixel computation.
pub trait NodeOperation: Send + Sync + fmt::Debug {
    /// Short type name used in logs.
    fn name(&self) -> &'static str;

    /// Data kinds of the input sockets, in socket order.
    fn inputs(&self) -> &'static [DataType];

    /// Data kind of the output socket; `None` for group terminals.
    fn output(&self) -> Option<DataType>;

    /// Value used for input `index` when nothing is connected.
    fn default_input(&self, index: usize) -> Color {
        self.inputs()
            .get(index)
            .map_or(DataType::Color.neutral(), |dt| dt.neutral())
    }

    /// Whether this operation must sit in its own group behind buffered inputs.
    fn is_complex(&self) -> bool {
        false
    }

    /// Input socket whose resolution this operation adopts.
    fn resolution_input(&self) -> usize {
        0
    }

    /// Pick the output resolution from the inputs' resolutions and the preferred one.
    fn determine_resolution(
        &self,
        inputs: &[Option<Resolution>],
        preferred: Resolution,
    ) -> Resolution {
        inputs
            .get(self.resolution_input())
            .copied()
            .flatten()
            .unwrap_or(preferred)
    }

    /// The output value when it is the same for every pixel.
    fn constant_value(&self) -> Option<Color> {
        None
    }

    /// Group-boundary role, `None` for ordinary operations.
    fn buffer_role(&self) -> Option<BufferRole<'_>> {
        None
    }

    /// Acquire per-run resources.
    fn init_execution(&mut self, _ctx: &InitContext<'_>) -> CompositorResult<()> {
        Ok(())
    }

    /// Prepare state for one chunk. Called before any pixel of `rect` is evaluated, with the
    /// tile data of every upstream operation of the group already in place.
    fn initialize_tile_data(
        &self,
        _ctx: &ExecContext<'_>,
        _rect: Rect,
    ) -> CompositorResult<Option<TileData>> {
        Ok(None)
    }

    /// Compute the output color at absolute pixel coordinate `(x, y)`.
    fn execute_pixel(&self, ctx: &ExecContext<'_>, x: f32, y: f32, sampler: PixelSampler)
    -> Color;

    /// Input rectangles needed to produce `output`. Defaults to the same rectangle on every
    /// input.
    fn area_of_interest(&self, _ctx: &AoiContext<'_>, output: Rect) -> AoiRequests {
        (0..self.inputs().len()).map(|i| (i, output)).collect()
    }

    /// Release per-run resources. Must tolerate `init_execution` never having run.
    fn deinit_execution(&mut self) {}
}
