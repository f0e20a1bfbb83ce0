use std::{
    any::Any,
    cmp::Reverse,
    collections::{BinaryHeap, HashSet},
};

use smallvec::{SmallVec, smallvec};

use crate::{
    buffer::sampler::PixelSampler,
    foundation::core::{Color, Rect, Resolution},
    foundation::error::{CompositorError, CompositorResult},
    operation::{
        AoiContext, BufferRole, ExecContext, InitContext, NodeOperation, OpId, TileData,
    },
};

#[derive(Debug)]
struct OperationNode {
    op: Box<dyn NodeOperation>,
    inputs: SmallVec<[Option<OpId>; 2]>,
    resolution: Option<Resolution>,
}

/// Arena of operations and the links between them.
///
/// Every operation is addressed by its [`OpId`], the index it was added at. Links are stored on
/// the consumer side: input socket `i` of an operation names the producing operation, if any.
/// A read-buffer operation additionally depends on the write-buffer operation of its proxy.
#[derive(Debug, Default)]
pub struct OperationGraph {
    nodes: Vec<OperationNode>,
}

impl OperationGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation with every input disconnected.
    pub fn add(&mut self, op: impl NodeOperation + 'static) -> OpId {
        self.add_boxed(Box::new(op))
    }

    /// Same as [`OperationGraph::add`] for an already boxed operation.
    pub fn add_boxed(&mut self, op: Box<dyn NodeOperation>) -> OpId {
        let id = self.next_id();
        let inputs = smallvec![None; op.inputs().len()];
        self.nodes.push(OperationNode {
            op,
            inputs,
            resolution: None,
        });
        id
    }

    /// Id the next added operation will get.
    pub fn next_id(&self) -> OpId {
        OpId(self.nodes.len() as u32)
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Return `true` when the graph holds no operation.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over every operation id in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = OpId> + '_ {
        (0..self.nodes.len()).map(|i| OpId(i as u32))
    }

    /// Return `true` when `id` belongs to this graph.
    pub fn contains(&self, id: OpId) -> bool {
        id.index() < self.nodes.len()
    }

    /// The operation behind `id`.
    ///
    /// # Panics
    ///
    /// Panics when `id` was not produced by this graph.
    pub fn operation(&self, id: OpId) -> &dyn NodeOperation {
        self.nodes[id.index()].op.as_ref()
    }

    /// Mutable access to the operation behind `id`.
    ///
    /// # Panics
    ///
    /// Panics when `id` was not produced by this graph.
    pub fn operation_mut(&mut self, id: OpId) -> &mut dyn NodeOperation {
        self.nodes[id.index()].op.as_mut()
    }

    /// Connect the output of `from` to input `socket` of `to`, replacing any previous link.
    pub fn connect(&mut self, from: OpId, to: OpId, socket: usize) -> CompositorResult<()> {
        if !self.contains(from) {
            return Err(CompositorError::graph(format!(
                "link source op {} does not exist",
                from.0
            )));
        }
        if self.operation(from).output().is_none() {
            return Err(CompositorError::graph(format!(
                "op {} ({}) has no output socket",
                from.0,
                self.operation(from).name()
            )));
        }
        self.set_input(to, socket, Some(from))
    }

    /// Point input `socket` of `to` at `from`, or disconnect it with `None`.
    pub fn set_input(
        &mut self,
        to: OpId,
        socket: usize,
        from: Option<OpId>,
    ) -> CompositorResult<()> {
        let node = self.nodes.get_mut(to.index()).ok_or_else(|| {
            CompositorError::graph(format!("link target op {} does not exist", to.0))
        })?;
        let slot = node.inputs.get_mut(socket).ok_or_else(|| {
            CompositorError::graph(format!(
                "op {} ({}) has no input socket {socket}",
                to.0,
                node.op.name()
            ))
        })?;
        *slot = from;
        Ok(())
    }

    /// Producer connected to input `socket` of `op`.
    pub fn input(&self, op: OpId, socket: usize) -> Option<OpId> {
        self.nodes.get(op.index())?.inputs.get(socket).copied().flatten()
    }

    /// All input links of `op`, indexed by socket.
    pub fn inputs(&self, op: OpId) -> &[Option<OpId>] {
        self.nodes.get(op.index()).map_or(&[], |n| n.inputs.as_slice())
    }

    /// Every `(consumer, socket)` reading the output of `op`, in id order.
    pub fn consumers(&self, op: OpId) -> Vec<(OpId, usize)> {
        let mut out = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            for (socket, src) in node.inputs.iter().enumerate() {
                if *src == Some(op) {
                    out.push((OpId(i as u32), socket));
                }
            }
        }
        out
    }

    /// Operations that must be resolved before `op`: its connected inputs plus, for a
    /// read-buffer operation, the writer of its proxy.
    pub fn dependencies(&self, op: OpId) -> SmallVec<[OpId; 4]> {
        let node = &self.nodes[op.index()];
        let mut deps: SmallVec<[OpId; 4]> = node.inputs.iter().flatten().copied().collect();
        if let Some(BufferRole::Read(proxy)) = node.op.buffer_role()
            && self.contains(proxy.writer())
        {
            deps.push(proxy.writer());
        }
        deps
    }

    /// Return `true` when `upstream` is reachable from `op` by following dependencies.
    pub fn depends_on(&self, op: OpId, upstream: OpId) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![op];
        while let Some(cur) = stack.pop() {
            if cur == upstream {
                return true;
            }
            if std::mem::replace(&mut seen[cur.index()], true) {
                continue;
            }
            stack.extend(self.dependencies(cur));
        }
        false
    }

    /// Every operation, dependencies first. Ties resolve to the smallest id.
    pub fn topological_order(&self) -> CompositorResult<Vec<OpId>> {
        let n = self.nodes.len();
        let mut indeg = vec![0u32; n];
        let mut dependents = vec![Vec::<OpId>::new(); n];
        for id in self.ids() {
            for dep in self.dependencies(id) {
                dependents[dep.index()].push(id);
                indeg[id.index()] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<u32>> = indeg
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i as u32))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(OpId(i));
            for &dep in &dependents[i as usize] {
                let d = &mut indeg[dep.index()];
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse(dep.0));
                }
            }
        }

        if order.len() != n {
            return Err(CompositorError::graph(format!(
                "operation graph has a cycle ({} of {n} ops unreachable in dependency order)",
                n - order.len()
            )));
        }
        Ok(order)
    }

    /// Resolve every operation's resolution, dependencies first.
    ///
    /// Output operations take `output_override` when given.
    pub fn determine_resolutions(
        &mut self,
        preferred: Resolution,
        output_override: Option<Resolution>,
    ) -> CompositorResult<()> {
        for id in self.topological_order()? {
            let node = &self.nodes[id.index()];
            let res = match (node.op.buffer_role(), output_override) {
                (Some(BufferRole::Read(proxy)), _) => self
                    .nodes
                    .get(proxy.writer().index())
                    .and_then(|w| w.resolution)
                    .unwrap_or(preferred),
                (Some(BufferRole::Output { .. }), Some(fixed)) => fixed,
                _ => {
                    let inputs: SmallVec<[Option<Resolution>; 4]> = node
                        .inputs
                        .iter()
                        .map(|src| src.and_then(|s| self.nodes[s.index()].resolution))
                        .collect();
                    node.op.determine_resolution(&inputs, preferred)
                }
            };
            self.nodes[id.index()].resolution = Some(res);
        }
        Ok(())
    }

    /// Resolution of `op`, zero until [`OperationGraph::determine_resolutions`] ran.
    pub fn resolution(&self, op: OpId) -> Resolution {
        self.nodes
            .get(op.index())
            .and_then(|n| n.resolution)
            .unwrap_or(Resolution::new(0, 0))
    }

    /// Value of input `index` of `op` when known without evaluation.
    pub fn input_constant(&self, op: OpId, index: usize) -> Option<Color> {
        match self.input(op, index) {
            Some(src) => self.operation(src).constant_value(),
            None => {
                let node = self.nodes.get(op.index())?;
                (index < node.inputs.len()).then(|| node.op.default_input(index))
            }
        }
    }

    /// Call `init_execution` on every operation, dependencies first.
    pub fn init_execution(&mut self) -> CompositorResult<()> {
        for id in self.topological_order()? {
            let constants: SmallVec<[Option<Color>; 4]> = (0..self.nodes[id.index()].inputs.len())
                .map(|i| self.input_constant(id, i))
                .collect();
            let ctx = InitContext {
                resolution: self.resolution(id),
                input_constants: &constants,
            };
            self.nodes[id.index()].op.init_execution(&ctx)?;
        }
        Ok(())
    }

    /// Call `deinit_execution` on every operation.
    pub fn deinit_execution(&mut self) {
        for node in &mut self.nodes {
            node.op.deinit_execution();
        }
    }

    /// Region of `target` needed to produce `rect` of `from`, or `None` when `from` does not
    /// depend on `target`.
    ///
    /// The walk keeps its own stack, so arbitrarily deep chains cannot exhaust the call stack.
    pub fn area_of_interest(&self, from: OpId, rect: Rect, target: OpId) -> Option<Rect> {
        let mut hit = false;
        let mut area = Rect::new(0, 0, 0, 0);
        let mut seen = HashSet::<(OpId, Rect)>::new();
        let mut stack = vec![(from, rect)];

        while let Some((op, r)) = stack.pop() {
            if !self.contains(op) || !seen.insert((op, r)) {
                continue;
            }
            if op == target {
                hit = true;
                area = area.union(r);
                continue;
            }
            let ctx = AoiContext {
                graph: self,
                op,
                target,
            };
            for (socket, needed) in self.operation(op).area_of_interest(&ctx, r) {
                if let Some(src) = self.input(op, socket) {
                    stack.push((src, needed));
                }
            }
        }

        hit.then_some(area)
    }

    /// Evaluate `op` at `(x, y)` with the chunk's tile data.
    pub fn evaluate(
        &self,
        op: OpId,
        x: f32,
        y: f32,
        sampler: PixelSampler,
        tiles: &TileDataSet,
    ) -> Color {
        let ctx = ExecContext {
            graph: self,
            op,
            tiles,
        };
        self.operation(op).execute_pixel(&ctx, x, y, sampler)
    }
}

/// Tile data of every operation for one chunk, indexed by [`OpId`].
#[derive(Debug, Default)]
pub struct TileDataSet {
    slots: Vec<Option<TileData>>,
}

impl TileDataSet {
    /// Empty slots for a graph of `len` operations.
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Tile data of `op`.
    pub fn get(&self, op: OpId) -> Option<&(dyn Any + Send + Sync)> {
        self.slots.get(op.index())?.as_deref()
    }

    /// Store the tile data of `op`.
    pub fn set(&mut self, op: OpId, data: TileData) {
        if let Some(slot) = self.slots.get_mut(op.index()) {
            *slot = Some(data);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/graph.rs"]
mod tests;
