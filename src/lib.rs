//! Tile-based dataflow execution engine for node-graph image compositing.
//!
//! A [`NodeTree`] is converted into an [`OperationGraph`] of per-pixel operations, split into
//! execution groups at buffer boundaries, and evaluated chunk by chunk on a worker pool by the
//! [`ExecutionSystem`]. Only the chunks some output actually depends on are computed.
//!
//! ```no_run
//! use tessera::{CancellationToken, CompositorConfig, ExecutionSystem, ImageInputs, NodeTree};
//!
//! # fn main() -> tessera::CompositorResult<()> {
//! let tree = NodeTree::from_json(r#"{
//!     "nodes": [
//!         { "id": "c", "kind": "rgb", "params": { "color": [1, 0, 0, 1] } },
//!         { "id": "out", "kind": "composite" }
//!     ],
//!     "links": [ { "from": "c", "to": "out", "to_socket": 0 } ]
//! }"#)?;
//! let mut system = ExecutionSystem::new(&tree, &ImageInputs::new(), CompositorConfig::default())?;
//! let outcome = system.execute(&CancellationToken::new())?;
//! let primary = outcome.outputs().and_then(|o| o.get("primary"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod execution;
pub mod foundation;
pub mod node_tree;
pub mod operation;

pub use buffer::memory_buffer::{ExtendMode, MemoryBuffer};
pub use buffer::proxy::{MemoryProxy, ProxyId};
pub use buffer::sampler::PixelSampler;
pub use config::{BlurQuality, ChunkOrder, CompositorConfig};
pub use execution::{
    CancellationToken, ExecutionGroup, ExecutionOutcome, ExecutionSystem, GroupId, RenderOutputs,
    RunStats,
};
pub use foundation::core::{Color, DataType, Rect, Resolution};
pub use foundation::error::{CompositorError, CompositorResult};
pub use foundation::math::FilterType;
pub use node_tree::{GraphDiagnostic, ImageInputs, Link, Node, NodeTree};
pub use operation::{
    AoiContext, AoiRequests, BufferRole, ExecContext, InitContext, NodeOperation, OpId,
    OperationGraph, Priority, TileData,
};
