use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    buffer::{memory_buffer::MemoryBuffer, sampler::PixelSampler},
    config::ChunkOrder,
    execution::cancel::CancellationToken,
    foundation::core::{Rect, Resolution},
    foundation::error::{CompositorError, CompositorResult},
    foundation::math::sanitize,
    operation::{BufferRole, ExecContext, OpId, OperationGraph, Priority, TileDataSet},
};

/// Index of an [`ExecutionGroup`] within its execution system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

/// Result of running one group.
#[derive(Debug)]
pub enum GroupOutcome {
    /// Every demanded chunk finished; the assembled result.
    Completed(Arc<MemoryBuffer>),
    /// Cancellation was observed. Nothing was published.
    Cancelled,
}

/// Operations evaluated together, chunk by chunk, ending in one terminal.
///
/// The terminal is a write-buffer or output operation. Leaves are constants, image sources and
/// read-buffer operations. Every member shares the group's chunk grid.
#[derive(Clone, Debug)]
pub struct ExecutionGroup {
    id: GroupId,
    terminal: OpId,
    members: Vec<OpId>,
    reads: Vec<OpId>,
    resolution: Resolution,
    chunks: Vec<Rect>,
    demand: Option<Rect>,
    complete: bool,
}

impl ExecutionGroup {
    /// Collect the group ending at `terminal`, walking inputs up to read-buffer operations.
    ///
    /// `topo_pos[op]` is the position of `op` in the graph's topological order; members are
    /// kept in that order so tile data is always initialized upstream first.
    pub(crate) fn collect(
        graph: &OperationGraph,
        id: GroupId,
        terminal: OpId,
        topo_pos: &[usize],
    ) -> Self {
        let mut seen = vec![false; graph.len()];
        let mut members = Vec::new();
        let mut stack = vec![terminal];
        while let Some(op) = stack.pop() {
            if std::mem::replace(&mut seen[op.index()], true) {
                continue;
            }
            members.push(op);
            if matches!(graph.operation(op).buffer_role(), Some(BufferRole::Read(_))) {
                continue;
            }
            stack.extend(graph.inputs(op).iter().flatten().copied());
        }
        members.sort_by_key(|op| topo_pos[op.index()]);

        let reads = members
            .iter()
            .copied()
            .filter(|op| matches!(graph.operation(*op).buffer_role(), Some(BufferRole::Read(_))))
            .collect();

        Self {
            id,
            terminal,
            members,
            reads,
            resolution: Resolution::new(0, 0),
            chunks: Vec::new(),
            demand: None,
            complete: false,
        }
    }

    /// This group's id.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// The write-buffer or output operation the group ends in.
    pub fn terminal(&self) -> OpId {
        self.terminal
    }

    /// Member operations, upstream first.
    pub fn members(&self) -> &[OpId] {
        &self.members
    }

    /// Member read-buffer operations.
    pub fn reads(&self) -> &[OpId] {
        &self.reads
    }

    /// Resolution of the terminal.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Every chunk, in scheduling order.
    pub fn chunks(&self) -> &[Rect] {
        &self.chunks
    }

    /// Region downstream groups need, `None` when nobody asked for anything.
    pub fn demand(&self) -> Option<Rect> {
        self.demand
    }

    /// Return `true` once the group ran to completion in the current run.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Output name and priority when the terminal is an output operation.
    pub fn output(&self, graph: &OperationGraph) -> Option<(String, Priority)> {
        match graph.operation(self.terminal).buffer_role() {
            Some(BufferRole::Output { name, priority }) => Some((name.to_owned(), priority)),
            _ => None,
        }
    }

    /// Adopt the terminal's resolution and split it into chunks.
    pub(crate) fn determine_chunks(
        &mut self,
        graph: &OperationGraph,
        chunk_size: u32,
        order: ChunkOrder,
    ) {
        self.resolution = graph.resolution(self.terminal);
        self.chunks = split_chunks(self.resolution.to_rect(), chunk_size, order);
        tracing::debug!(
            group = self.id.0,
            members = self.members.len(),
            chunks = self.chunks.len(),
            "group chunked"
        );
    }

    /// Forget demand and completion from a previous run.
    pub(crate) fn reset(&mut self) {
        self.demand = None;
        self.complete = false;
    }

    /// Grow the demanded region by `rect`, clipped to the group's frame.
    pub(crate) fn add_demand(&mut self, rect: Rect) {
        let Some(rect) = rect.intersect(self.resolution.to_rect()) else {
            return;
        };
        self.demand = Some(self.demand.map_or(rect, |d| d.union(rect)));
    }

    /// Chunks intersecting the demanded region, in scheduling order.
    pub fn demanded_chunks(&self) -> Vec<Rect> {
        let Some(demand) = self.demand else {
            return Vec::new();
        };
        self.chunks
            .iter()
            .copied()
            .filter(|c| c.intersect(demand).is_some())
            .collect()
    }

    /// Region of each member read-buffer needed by the demanded chunks.
    pub(crate) fn input_demands(&self, graph: &OperationGraph) -> Vec<(OpId, Rect)> {
        let chunks = self.demanded_chunks();
        self.reads
            .iter()
            .filter_map(|&read| {
                chunks
                    .iter()
                    .filter_map(|c| graph.area_of_interest(self.terminal, *c, read))
                    .reduce(Rect::union)
                    .map(|area| (read, area))
            })
            .collect()
    }

    /// Evaluate every demanded chunk on `pool` and publish the assembled result.
    ///
    /// Chunks skipped by demand stay zero in the published buffer.
    #[tracing::instrument(skip_all, fields(group = self.id.0))]
    pub(crate) fn execute(
        &mut self,
        graph: &OperationGraph,
        pool: &rayon::ThreadPool,
        sampler: PixelSampler,
        cancel: &CancellationToken,
    ) -> CompositorResult<GroupOutcome> {
        for &read in &self.reads {
            if let Some(BufferRole::Read(proxy)) = graph.operation(read).buffer_role()
                && !proxy.is_complete()
            {
                return Err(CompositorError::evaluation(format!(
                    "group {} reads buffer {} before it was published",
                    self.id.0,
                    proxy.id().0
                )));
            }
        }

        let chunks = self.demanded_chunks();
        let this = &*self;
        let rendered = pool.install(|| {
            chunks
                .par_iter()
                .map(|rect| -> CompositorResult<Option<MemoryBuffer>> {
                    if cancel.is_cancelled() {
                        return Ok(None);
                    }
                    this.execute_chunk(graph, *rect, sampler).map(Some)
                })
                .collect::<Vec<_>>()
        });

        let mut tiles = Vec::with_capacity(rendered.len());
        for item in rendered {
            match item? {
                Some(tile) => tiles.push(tile),
                None => return Ok(GroupOutcome::Cancelled),
            }
        }
        if cancel.is_cancelled() {
            return Ok(GroupOutcome::Cancelled);
        }

        let mut out = MemoryBuffer::new(self.resolution.to_rect())?;
        for tile in &tiles {
            out.copy_from(tile);
        }
        let out = match graph.operation(self.terminal).buffer_role() {
            Some(BufferRole::Write(proxy)) => proxy.publish(out)?,
            Some(BufferRole::Output { .. }) => Arc::new(out),
            _ => {
                return Err(CompositorError::evaluation(format!(
                    "group {} ends in op {} which is not a terminal",
                    self.id.0, self.terminal.0
                )));
            }
        };

        self.complete = true;
        tracing::debug!(chunks = chunks.len(), "group complete");
        Ok(GroupOutcome::Completed(out))
    }

    fn execute_chunk(
        &self,
        graph: &OperationGraph,
        rect: Rect,
        sampler: PixelSampler,
    ) -> CompositorResult<MemoryBuffer> {
        let mut tiles = TileDataSet::new(graph.len());
        for &op in &self.members {
            let ctx = ExecContext {
                graph,
                op,
                tiles: &tiles,
            };
            if let Some(data) = graph.operation(op).initialize_tile_data(&ctx, rect)? {
                tiles.set(op, data);
            }
        }

        let mut tile = MemoryBuffer::new(rect)?;
        for y in rect.ymin..rect.ymax {
            for x in rect.xmin..rect.xmax {
                let c = graph.evaluate(self.terminal, x as f32, y as f32, sampler, &tiles);
                tile.write_pixel(x, y, sanitize(c));
            }
        }
        Ok(tile)
    }
}

/// Split `frame` into chunks of at most `chunk_size` pixels per side.
pub fn split_chunks(frame: Rect, chunk_size: u32, order: ChunkOrder) -> Vec<Rect> {
    if frame.is_empty() {
        return Vec::new();
    }
    let step = i32::try_from(chunk_size.max(1)).unwrap_or(i32::MAX);
    let mut chunks = Vec::new();
    let mut y = frame.ymin;
    while y < frame.ymax {
        let mut x = frame.xmin;
        let ymax = y.saturating_add(step).min(frame.ymax);
        while x < frame.xmax {
            let xmax = x.saturating_add(step).min(frame.xmax);
            chunks.push(Rect::new(x, y, xmax, ymax));
            x = xmax;
        }
        y = ymax;
    }

    if order == ChunkOrder::CenterOut {
        // Doubled coordinates keep the centers integral.
        let cx = i64::from(frame.xmin) + i64::from(frame.xmax);
        let cy = i64::from(frame.ymin) + i64::from(frame.ymax);
        chunks.sort_by_key(|c| {
            let dx = i64::from(c.xmin) + i64::from(c.xmax) - cx;
            let dy = i64::from(c.ymin) + i64::from(c.ymax) - cy;
            dx * dx + dy * dy
        });
    }
    chunks
}

#[cfg(test)]
#[path = "../../tests/unit/execution/group.rs"]
mod tests;
