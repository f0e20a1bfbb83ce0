//! Group boundaries: write-buffer and output terminals, read-buffer leaves.

use std::sync::Arc;

use crate::{
    buffer::{
        memory_buffer::{ExtendMode, MemoryBuffer},
        proxy::MemoryProxy,
        sampler::PixelSampler,
    },
    foundation::core::{Color, DataType, Rect, TRANSPARENT},
    foundation::error::{CompositorError, CompositorResult},
    operation::{BufferRole, ExecContext, NodeOperation, Priority, TileData},
};

fn single(data_type: DataType) -> &'static [DataType] {
    match data_type {
        DataType::Value => &[DataType::Value],
        DataType::Vector => &[DataType::Vector],
        DataType::Color => &[DataType::Color],
    }
}

/// Terminal of a group whose result other groups read through a [`MemoryProxy`].
#[derive(Debug)]
pub struct WriteBufferOperation {
    proxy: Arc<MemoryProxy>,
    data_type: DataType,
}

impl WriteBufferOperation {
    /// Write into `proxy` a result of kind `data_type`.
    pub fn new(proxy: Arc<MemoryProxy>, data_type: DataType) -> Self {
        Self { proxy, data_type }
    }

    /// The proxy this operation publishes into.
    pub fn proxy(&self) -> &Arc<MemoryProxy> {
        &self.proxy
    }
}

impl NodeOperation for WriteBufferOperation {
    fn name(&self) -> &'static str {
        "WriteBuffer"
    }

    fn inputs(&self) -> &'static [DataType] {
        single(self.data_type)
    }

    fn output(&self) -> Option<DataType> {
        None
    }

    fn buffer_role(&self) -> Option<BufferRole<'_>> {
        Some(BufferRole::Write(&self.proxy))
    }

    fn execute_pixel(&self, ctx: &ExecContext<'_>, x: f32, y: f32, sampler: PixelSampler) -> Color {
        ctx.read_input(0, x, y, sampler)
    }
}

/// Leaf of a group that reads another group's published result.
///
/// The published buffer is handed to consumers as tile data, so complex operations can read
/// arbitrary pixels of it through [`ExecContext::input_buffer`].
#[derive(Debug)]
pub struct ReadBufferOperation {
    proxy: Arc<MemoryProxy>,
    data_type: DataType,
}

impl ReadBufferOperation {
    /// Read `proxy`, producing values of kind `data_type`.
    pub fn new(proxy: Arc<MemoryProxy>, data_type: DataType) -> Self {
        Self { proxy, data_type }
    }

    /// The proxy this operation reads.
    pub fn proxy(&self) -> &Arc<MemoryProxy> {
        &self.proxy
    }
}

impl NodeOperation for ReadBufferOperation {
    fn name(&self) -> &'static str {
        "ReadBuffer"
    }

    fn inputs(&self) -> &'static [DataType] {
        &[]
    }

    fn output(&self) -> Option<DataType> {
        Some(self.data_type)
    }

    fn buffer_role(&self) -> Option<BufferRole<'_>> {
        Some(BufferRole::Read(&self.proxy))
    }

    fn initialize_tile_data(
        &self,
        _ctx: &ExecContext<'_>,
        _rect: Rect,
    ) -> CompositorResult<Option<TileData>> {
        let buffer: TileData = self.proxy.buffer().ok_or_else(|| {
            CompositorError::evaluation(format!(
                "memory proxy {} read before it was published",
                self.proxy.id().0
            ))
        })?;
        Ok(Some(buffer))
    }

    fn execute_pixel(&self, ctx: &ExecContext<'_>, x: f32, y: f32, sampler: PixelSampler) -> Color {
        match ctx.tile_data::<MemoryBuffer>() {
            Some(buf) => sampler.sample(buf, x, y, ExtendMode::Extend),
            None => TRANSPARENT,
        }
    }
}

/// Terminal of a group that publishes a named result of the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputOperation {
    name: String,
    priority: Priority,
}

impl OutputOperation {
    /// Publish input 0 as output `name`.
    pub fn new(name: impl Into<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }
}

impl NodeOperation for OutputOperation {
    fn name(&self) -> &'static str {
        "Output"
    }

    fn inputs(&self) -> &'static [DataType] {
        &[DataType::Color]
    }

    fn output(&self) -> Option<DataType> {
        None
    }

    fn buffer_role(&self) -> Option<BufferRole<'_>> {
        Some(BufferRole::Output {
            name: &self.name,
            priority: self.priority,
        })
    }

    fn execute_pixel(&self, ctx: &ExecContext<'_>, x: f32, y: f32, sampler: PixelSampler) -> Color {
        ctx.read_input(0, x, y, sampler)
    }
}
