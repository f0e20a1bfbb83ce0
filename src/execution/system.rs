use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
    sync::Arc,
    time::Instant,
};

use crate::{
    buffer::{
        memory_buffer::MemoryBuffer,
        proxy::{MemoryProxy, ProxyId},
    },
    config::CompositorConfig,
    execution::{
        cancel::CancellationToken,
        group::{ExecutionGroup, GroupId, GroupOutcome},
    },
    foundation::error::{CompositorError, CompositorResult},
    node_tree::{ConvertedGraph, GraphDiagnostic, ImageInputs, NodeTree, convert_to_operations},
    operation::{
        BufferRole, OpId, OperationGraph, Priority,
        buffer_ops::{ReadBufferOperation, WriteBufferOperation},
        constant::ConstantOperation,
    },
};

/// Counters of one execution run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Groups that ran to completion.
    pub groups_executed: usize,
    /// Chunks evaluated across all groups.
    pub chunks_evaluated: usize,
    /// Chunks skipped because nothing downstream needed them.
    pub chunks_skipped: usize,
}

/// Named results of a completed run.
#[derive(Clone, Debug, Default)]
pub struct RenderOutputs {
    buffers: BTreeMap<String, Arc<MemoryBuffer>>,
    stats: RunStats,
}

impl RenderOutputs {
    /// Output buffer by name, e.g. `primary`.
    pub fn get(&self, name: &str) -> Option<&Arc<MemoryBuffer>> {
        self.buffers.get(name)
    }

    /// Names of every published output.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Run counters.
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Take ownership of the buffers.
    pub fn into_buffers(self) -> BTreeMap<String, Arc<MemoryBuffer>> {
        self.buffers
    }
}

/// How an execution run ended when it did not fail.
#[derive(Clone, Debug)]
pub enum ExecutionOutcome {
    /// Every output was produced.
    Completed(RenderOutputs),
    /// The run observed its cancellation token and published nothing.
    Cancelled,
}

impl ExecutionOutcome {
    /// Return `true` for [`ExecutionOutcome::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The outputs of a completed run.
    pub fn outputs(&self) -> Option<&RenderOutputs> {
        match self {
            Self::Completed(o) => Some(o),
            Self::Cancelled => None,
        }
    }
}

/// Converts a graph into execution groups and runs them.
///
/// Construction inserts buffer boundaries and forms groups once. Every call to
/// [`ExecutionSystem::execute`] is an independent run: operations are initialized, groups needed
/// by outputs run in priority order, and every operation is deinitialized before returning.
#[derive(Debug)]
pub struct ExecutionSystem {
    config: CompositorConfig,
    graph: OperationGraph,
    groups: Vec<ExecutionGroup>,
    proxies: Vec<Arc<MemoryProxy>>,
    diagnostics: Vec<GraphDiagnostic>,
    pool: rayon::ThreadPool,
}

impl ExecutionSystem {
    /// Convert `tree` with the given external images and prepare it for execution.
    ///
    /// Recoverable graph problems become [`ExecutionSystem::diagnostics`]. The config is
    /// validated by [`ExecutionSystem::from_graph`].
    #[tracing::instrument(skip_all, fields(nodes = tree.nodes.len(), links = tree.links.len()))]
    pub fn new(
        tree: &NodeTree,
        inputs: &ImageInputs,
        config: CompositorConfig,
    ) -> CompositorResult<Self> {
        let ConvertedGraph { graph, diagnostics } = convert_to_operations(tree, inputs, &config);
        let mut system = Self::from_graph(graph, config)?;
        system.diagnostics = diagnostics;
        Ok(system)
    }

    /// Prepare an already built operation graph for execution.
    pub fn from_graph(mut graph: OperationGraph, config: CompositorConfig) -> CompositorResult<Self> {
        config.validate()?;
        graph.topological_order()?;
        duplicate_constants(&mut graph)?;
        let proxies = insert_buffers(&mut graph)?;
        graph.determine_resolutions(config.resolution, config.output_resolution)?;

        let order = graph.topological_order()?;
        let mut topo_pos = vec![0usize; graph.len()];
        for (pos, op) in order.iter().enumerate() {
            topo_pos[op.index()] = pos;
        }

        let mut owner: Vec<Option<GroupId>> = vec![None; graph.len()];
        let mut groups = Vec::new();
        for &op in &order {
            if !is_terminal(&graph, op) {
                continue;
            }
            let id = GroupId(groups.len() as u32);
            let mut group = ExecutionGroup::collect(&graph, id, op, &topo_pos);
            for &m in group.members() {
                if let Some(prev) = owner[m.index()].replace(id) {
                    return Err(CompositorError::evaluation(format!(
                        "op {} ({}) belongs to groups {} and {}",
                        m.0,
                        graph.operation(m).name(),
                        prev.0,
                        id.0
                    )));
                }
            }
            group.determine_chunks(&graph, config.chunk_size, config.chunk_order);
            groups.push(group);
        }

        let pool = build_thread_pool(config.threads)?;
        tracing::debug!(
            ops = graph.len(),
            groups = groups.len(),
            buffers = proxies.len(),
            "execution system ready"
        );
        Ok(Self {
            config,
            graph,
            groups,
            proxies,
            diagnostics: Vec::new(),
            pool,
        })
    }

    /// The execution options.
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// The operation graph, with buffer operations inserted.
    pub fn graph(&self) -> &OperationGraph {
        &self.graph
    }

    /// Execution groups in formation order.
    pub fn groups(&self) -> &[ExecutionGroup] {
        &self.groups
    }

    /// Memory proxies between groups.
    pub fn proxies(&self) -> &[Arc<MemoryProxy>] {
        &self.proxies
    }

    /// Graph problems recovered from during conversion.
    pub fn diagnostics(&self) -> &[GraphDiagnostic] {
        &self.diagnostics
    }

    /// Run every output to completion, or until `cancel` triggers.
    ///
    /// Every operation is deinitialized exactly once before this returns, whatever the outcome.
    /// Intermediate buffers are released at the end of the run; output buffers are handed over
    /// in the outcome.
    #[tracing::instrument(skip_all)]
    pub fn execute(&mut self, cancel: &CancellationToken) -> CompositorResult<ExecutionOutcome> {
        let started = Instant::now();
        for g in &mut self.groups {
            g.reset();
        }
        for p in &self.proxies {
            p.reset();
        }

        let result = match self.graph.init_execution() {
            Ok(()) => self.run(cancel),
            Err(e) => Err(e),
        };
        self.graph.deinit_execution();
        for p in &self.proxies {
            p.reset();
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(ExecutionOutcome::Completed(out)) => tracing::info!(
                outputs = out.buffers.len(),
                groups = out.stats.groups_executed,
                chunks = out.stats.chunks_evaluated,
                skipped = out.stats.chunks_skipped,
                elapsed_ms,
                "execution completed"
            ),
            Ok(ExecutionOutcome::Cancelled) => {
                tracing::info!(elapsed_ms, "execution cancelled")
            }
            Err(e) => tracing::warn!(error = %e, elapsed_ms, "execution failed"),
        }
        result
    }

    fn run(&mut self, cancel: &CancellationToken) -> CompositorResult<ExecutionOutcome> {
        let deps = self.group_dependencies();
        let order = group_order(&deps);

        let mut outputs: Vec<(usize, String, Priority)> = self
            .groups
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.output(&self.graph).map(|(name, p)| (i, name, p)))
            .collect();
        outputs.sort_by_key(|(i, _, p)| (*p, *i));

        for (i, _, _) in &outputs {
            let full = self.groups[*i].resolution().to_rect();
            self.groups[*i].add_demand(full);
        }
        for &g in order.iter().rev() {
            for (read, rect) in self.groups[g].input_demands(&self.graph) {
                if let Some(producer) = self.producer_of(read) {
                    self.groups[producer].add_demand(rect);
                }
            }
        }

        let mut stats = RunStats::default();
        let mut buffers = BTreeMap::new();
        for (out, name, _) in &outputs {
            let needed = upstream_closure(*out, &deps);
            for &g in order.iter().filter(|g| needed[**g]) {
                if self.groups[g].is_complete() {
                    continue;
                }
                let total = self.groups[g].chunks().len();
                let demanded = self.groups[g].demanded_chunks().len();
                let outcome = self.groups[g].execute(
                    &self.graph,
                    &self.pool,
                    self.config.sampler,
                    cancel,
                )?;
                match outcome {
                    GroupOutcome::Cancelled => return Ok(ExecutionOutcome::Cancelled),
                    GroupOutcome::Completed(buf) => {
                        stats.groups_executed += 1;
                        stats.chunks_evaluated += demanded;
                        stats.chunks_skipped += total - demanded;
                        if g == *out {
                            buffers.entry(name.clone()).or_insert(buf);
                        }
                    }
                }
            }
        }

        Ok(ExecutionOutcome::Completed(RenderOutputs { buffers, stats }))
    }

    /// Group whose terminal writes the proxy `read` reads.
    fn producer_of(&self, read: OpId) -> Option<usize> {
        let Some(BufferRole::Read(proxy)) = self.graph.operation(read).buffer_role() else {
            return None;
        };
        self.groups
            .iter()
            .position(|g| g.terminal() == proxy.writer())
    }

    fn group_dependencies(&self) -> Vec<Vec<usize>> {
        self.groups
            .iter()
            .map(|g| {
                let mut deps: Vec<usize> = g
                    .reads()
                    .iter()
                    .filter_map(|r| self.producer_of(*r))
                    .collect();
                deps.sort_unstable();
                deps.dedup();
                deps
            })
            .collect()
    }
}

/// Groups upstream first, ties by index.
fn group_order(deps: &[Vec<usize>]) -> Vec<usize> {
    let mut indeg: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut dependents = vec![Vec::new(); deps.len()];
    for (g, ds) in deps.iter().enumerate() {
        for &d in ds {
            dependents[d].push(g);
        }
    }
    let mut ready: BinaryHeap<Reverse<usize>> = indeg
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();
    let mut order = Vec::with_capacity(deps.len());
    while let Some(Reverse(g)) = ready.pop() {
        order.push(g);
        for &next in &dependents[g] {
            indeg[next] -= 1;
            if indeg[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    order
}

fn upstream_closure(root: usize, deps: &[Vec<usize>]) -> Vec<bool> {
    let mut needed = vec![false; deps.len()];
    let mut stack = vec![root];
    while let Some(g) = stack.pop() {
        if std::mem::replace(&mut needed[g], true) {
            continue;
        }
        stack.extend(deps[g].iter().copied());
    }
    needed
}

fn is_terminal(graph: &OperationGraph, op: OpId) -> bool {
    matches!(
        graph.operation(op).buffer_role(),
        Some(BufferRole::Write(_) | BufferRole::Output { .. })
    )
}

/// Give every consumer of a constant its own copy, so constants never need a buffer.
fn duplicate_constants(graph: &mut OperationGraph) -> CompositorResult<()> {
    let ids: Vec<OpId> = graph.ids().collect();
    for op in ids {
        let (Some(value), Some(data_type)) = (
            graph.operation(op).constant_value(),
            graph.operation(op).output(),
        ) else {
            continue;
        };
        for (consumer, socket) in graph.consumers(op).into_iter().skip(1) {
            let copy = graph.add(ConstantOperation::new(data_type, value));
            graph.set_input(consumer, socket, Some(copy))?;
        }
    }
    Ok(())
}

/// Insert a write/read pair wherever a group boundary is needed: around complex operations
/// and after every non-constant operation read by more than one consumer.
fn insert_buffers(graph: &mut OperationGraph) -> CompositorResult<Vec<Arc<MemoryProxy>>> {
    let order = graph.topological_order()?;
    let mut consumers = vec![Vec::<(OpId, usize)>::new(); graph.len()];
    for id in graph.ids() {
        for (socket, src) in graph.inputs(id).iter().enumerate() {
            if let Some(src) = src {
                consumers[src.index()].push((id, socket));
            }
        }
    }
    let mut boundary = vec![false; graph.len()];
    for &op in &order {
        let cons = &consumers[op.index()];
        if graph.operation(op).is_complex() {
            for src in graph.inputs(op).iter().flatten() {
                boundary[src.index()] = true;
            }
            let only_terminal = cons.len() == 1 && is_terminal(graph, cons[0].0);
            boundary[op.index()] |= !only_terminal;
        }
        let mut distinct: Vec<OpId> = cons.iter().map(|(c, _)| *c).collect();
        distinct.dedup();
        if distinct.len() > 1 {
            boundary[op.index()] = true;
        }
    }

    let mut proxies = Vec::new();
    for &op in &order {
        let producer = graph.operation(op);
        let cons = &consumers[op.index()];
        if !boundary[op.index()]
            || cons.is_empty()
            || producer.constant_value().is_some()
            || producer.buffer_role().is_some()
        {
            continue;
        }
        let Some(data_type) = producer.output() else {
            continue;
        };

        let proxy = Arc::new(MemoryProxy::new(
            ProxyId(proxies.len() as u32),
            graph.next_id(),
        ));
        let writer = graph.add(WriteBufferOperation::new(proxy.clone(), data_type));
        graph.connect(op, writer, 0)?;
        for &(consumer, socket) in cons {
            let reader = graph.add(ReadBufferOperation::new(proxy.clone(), data_type));
            graph.set_input(consumer, socket, Some(reader))?;
        }
        tracing::debug!(
            op = op.0,
            name = graph.operation(op).name(),
            readers = cons.len(),
            proxy = proxy.id().0,
            "buffer inserted"
        );
        proxies.push(proxy);
    }
    Ok(proxies)
}

fn build_thread_pool(threads: Option<usize>) -> CompositorResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(CompositorError::validation(
            "execution 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| CompositorError::evaluation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/execution/system.rs"]
mod tests;
