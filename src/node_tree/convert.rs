use std::collections::{HashMap, HashSet};

use smallvec::{SmallVec, smallvec};

use crate::{
    buffer::memory_buffer::ExtendMode,
    config::{BlurQuality, CompositorConfig},
    foundation::core::{Color, DataType},
    foundation::math::FilterType,
    node_tree::{GraphDiagnostic, ImageInputs, Link, Node, NodeTree},
    operation::{
        NodeOperation, OpId, OperationGraph, Priority,
        blur::{BlurAxis, BlurSettings, GaussianAxisBlurOperation, GaussianBokehBlurOperation},
        buffer_ops::OutputOperation,
        constant::ConstantOperation,
        convert::{ConvertKind, ConvertOperation},
        image::ImageSourceOperation,
        invert::InvertOperation,
    },
};

/// Operations built from a node tree, plus the problems recovered from on the way.
#[derive(Debug)]
pub struct ConvertedGraph {
    /// The operation graph, before grouping.
    pub graph: OperationGraph,
    /// One entry per recovered graph error.
    pub diagnostics: Vec<GraphDiagnostic>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeKind {
    Image,
    Value,
    Rgb,
    Vector,
    Invert,
    Blur,
    Convert,
    Composite,
    Viewer,
    Output,
    Unknown,
}

impl NodeKind {
    fn parse(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "value" => Self::Value,
            "rgb" | "color" => Self::Rgb,
            "vector" => Self::Vector,
            "invert" => Self::Invert,
            "blur" => Self::Blur,
            "convert" => Self::Convert,
            "composite" => Self::Composite,
            "viewer" => Self::Viewer,
            "output" => Self::Output,
            _ => Self::Unknown,
        }
    }

    fn input_count(self) -> usize {
        match self {
            Self::Image | Self::Value | Self::Rgb | Self::Vector => 0,
            Self::Convert | Self::Viewer | Self::Output | Self::Unknown => 1,
            Self::Invert | Self::Blur | Self::Composite => 2,
        }
    }

    fn has_output(self) -> bool {
        !matches!(self, Self::Composite | Self::Viewer | Self::Output)
    }
}

const BLACK: Color = [0.0, 0.0, 0.0, 1.0];
const ONE: Color = [1.0, 0.0, 0.0, 0.0];

/// A node input and the operation sockets it feeds.
struct Socket {
    data_type: DataType,
    default: Color,
    targets: SmallVec<[(OpId, usize); 2]>,
}

impl Socket {
    fn new(data_type: DataType, default: Color, targets: &[(OpId, usize)]) -> Self {
        Self {
            data_type,
            default,
            targets: SmallVec::from_slice(targets),
        }
    }
}

struct BuiltNode {
    sockets: Vec<Socket>,
    output: Option<(OpId, DataType)>,
}

impl BuiltNode {
    fn source(op: OpId, data_type: DataType) -> Self {
        Self {
            sockets: Vec::new(),
            output: Some((op, data_type)),
        }
    }
}

struct Converter<'a> {
    graph: OperationGraph,
    diagnostics: Vec<GraphDiagnostic>,
    config: &'a CompositorConfig,
    images: &'a ImageInputs,
}

/// Build the operation graph for `tree`.
///
/// Never fails. Problems are recovered from and reported as diagnostics:
///
/// - unknown node kinds pass input 0 through, or emit black when nothing feeds it
/// - links naming unknown nodes or sockets, links that would close a cycle, and second links
///   into an already linked input are dropped
/// - image nodes naming a missing input emit black
/// - invalid parameters fall back to their defaults
///
/// Disconnected inputs get a constant holding their socket's default, and links between
/// sockets of different data kinds get a conversion operation.
pub fn convert_to_operations(
    tree: &NodeTree,
    inputs: &ImageInputs,
    config: &CompositorConfig,
) -> ConvertedGraph {
    let mut cx = Converter {
        graph: OperationGraph::new(),
        diagnostics: Vec::new(),
        config,
        images: inputs,
    };

    let mut kinds = HashMap::<&str, NodeKind>::new();
    let mut nodes = Vec::<&Node>::new();
    for node in &tree.nodes {
        if kinds.contains_key(node.id.as_str()) {
            cx.warn(Some(node.id.as_str()), "duplicate node id; later node ignored".into());
            continue;
        }
        kinds.insert(&node.id, NodeKind::parse(&node.kind));
        nodes.push(node);
    }

    let mut accepted = Vec::<&Link>::new();
    let mut linked = HashSet::<(&str, usize)>::new();
    for link in &tree.links {
        if let Some(problem) = link_problem(&kinds, link) {
            cx.warn(
                Some(link.to.as_str()),
                format!("link from '{}' dropped: {problem}", link.from),
            );
            continue;
        }
        if !linked.insert((link.to.as_str(), link.to_socket)) {
            cx.warn(
                Some(link.to.as_str()),
                format!(
                    "input {} already linked; link from '{}' dropped",
                    link.to_socket, link.from
                ),
            );
            continue;
        }
        accepted.push(link);
    }

    let mut built = HashMap::<&str, BuiltNode>::new();
    for node in &nodes {
        let kind = kinds[node.id.as_str()];
        let node_linked: Vec<bool> = (0..kind.input_count())
            .map(|s| linked.contains(&(node.id.as_str(), s)))
            .collect();
        let b = cx.build_node(node, kind, &node_linked);
        built.insert(&node.id, b);
    }

    let mut connected = HashSet::<(&str, usize)>::new();
    for link in accepted {
        if cx.connect(&built, link) {
            connected.insert((link.to.as_str(), link.to_socket));
        }
    }

    for node in &nodes {
        let Some(b) = built.get(node.id.as_str()) else {
            continue;
        };
        for (i, socket) in b.sockets.iter().enumerate() {
            if connected.contains(&(node.id.as_str(), i)) {
                continue;
            }
            for &(op, s) in &socket.targets {
                let c = cx
                    .graph
                    .add(ConstantOperation::new(socket.data_type, socket.default));
                cx.link_ops(&node.id, c, op, s);
            }
        }
    }

    tracing::debug!(
        nodes = nodes.len(),
        ops = cx.graph.len(),
        diagnostics = cx.diagnostics.len(),
        "node tree converted"
    );
    ConvertedGraph {
        graph: cx.graph,
        diagnostics: cx.diagnostics,
    }
}

fn link_problem(kinds: &HashMap<&str, NodeKind>, link: &Link) -> Option<String> {
    let Some(from) = kinds.get(link.from.as_str()) else {
        return Some("unknown source node".into());
    };
    let Some(to) = kinds.get(link.to.as_str()) else {
        return Some(format!("unknown target node '{}'", link.to));
    };
    if !from.has_output() {
        return Some("source node has no output".into());
    }
    if link.from_socket != 0 {
        return Some(format!("source has no output socket {}", link.from_socket));
    }
    if link.to_socket >= to.input_count() {
        return Some(format!("target has no input socket {}", link.to_socket));
    }
    None
}

impl Converter<'_> {
    fn warn(&mut self, node: Option<&str>, message: String) {
        tracing::warn!(node, %message, "graph error recovered");
        self.diagnostics.push(GraphDiagnostic {
            node: node.map(str::to_owned),
            message,
        });
    }

    fn link_ops(&mut self, node: &str, from: OpId, to: OpId, socket: usize) -> bool {
        match self.graph.connect(from, to, socket) {
            Ok(()) => true,
            Err(e) => {
                self.warn(Some(node), e.to_string());
                false
            }
        }
    }

    fn connect(&mut self, built: &HashMap<&str, BuiltNode>, link: &Link) -> bool {
        let (Some(src), Some(dst)) = (built.get(link.from.as_str()), built.get(link.to.as_str()))
        else {
            return false;
        };
        let (Some((src_op, src_type)), Some(socket)) = (src.output, dst.sockets.get(link.to_socket))
        else {
            return false;
        };

        if socket
            .targets
            .iter()
            .any(|(t, _)| self.graph.depends_on(src_op, *t))
        {
            self.warn(
                Some(link.to.as_str()),
                format!("link from '{}' would close a cycle; dropped", link.from),
            );
            return false;
        }

        let mut source = src_op;
        if let Some(kind) = ConvertKind::between(src_type, socket.data_type) {
            let conv = self.graph.add(ConvertOperation::new(kind));
            if !self.link_ops(&link.to, src_op, conv, 0) {
                return false;
            }
            source = conv;
        }
        socket
            .targets
            .iter()
            .all(|&(op, s)| self.link_ops(&link.to, source, op, s))
    }

    fn build_node(&mut self, node: &Node, kind: NodeKind, linked: &[bool]) -> BuiltNode {
        match kind {
            NodeKind::Image => self.build_image(node),
            NodeKind::Value => {
                let v = self.param_f32(node, "value", 0.5);
                let op = self.graph.add(ConstantOperation::value(v));
                BuiltNode::source(op, DataType::Value)
            }
            NodeKind::Rgb => {
                let c = self.param_floats(node, "color", [0.5, 0.5, 0.5, 1.0]);
                let op = self.graph.add(ConstantOperation::color(c));
                BuiltNode::source(op, DataType::Color)
            }
            NodeKind::Vector => {
                let v = self.param_floats(node, "vector", [0.0; 3]);
                let op = self.graph.add(ConstantOperation::vector(v));
                BuiltNode::source(op, DataType::Vector)
            }
            NodeKind::Invert => {
                let color = self.param_bool(node, "color", true);
                let alpha = self.param_bool(node, "alpha", false);
                let op = self.graph.add(InvertOperation::new(color, alpha));
                BuiltNode {
                    sockets: vec![
                        Socket::new(DataType::Value, ONE, &[(op, 0)]),
                        Socket::new(DataType::Color, BLACK, &[(op, 1)]),
                    ],
                    output: Some((op, DataType::Color)),
                }
            }
            NodeKind::Blur => self.build_blur(node),
            NodeKind::Convert => {
                let mode = self.param_str(node, "mode");
                let kind = match mode.map(|m| (m, ConvertKind::parse(m))) {
                    Some((_, Some(kind))) => kind,
                    Some((m, None)) => {
                        self.warn(
                            Some(node.id.as_str()),
                            format!("unknown convert mode '{m}'; passing input through"),
                        );
                        ConvertKind::Identity
                    }
                    None => ConvertKind::Identity,
                };
                let conv = ConvertOperation::new(kind);
                let (input, output) = (conv.inputs()[0], conv.output());
                let op = self.graph.add(conv);
                BuiltNode {
                    sockets: vec![Socket::new(input, input.neutral(), &[(op, 0)])],
                    output: output.map(|dt| (op, dt)),
                }
            }
            NodeKind::Composite => {
                let out = self.graph.add(OutputOperation::new("primary", Priority::High));
                let mut sockets = vec![Socket::new(DataType::Color, BLACK, &[(out, 0)])];
                if linked.get(1).copied().unwrap_or(false) {
                    let conv = self
                        .graph
                        .add(ConvertOperation::new(ConvertKind::ValueToColor));
                    let alpha = self.graph.add(OutputOperation::new("alpha", Priority::High));
                    self.link_ops(&node.id, conv, alpha, 0);
                    sockets.push(Socket::new(DataType::Value, ONE, &[(conv, 0)]));
                } else {
                    sockets.push(Socket::new(DataType::Value, ONE, &[]));
                }
                BuiltNode {
                    sockets,
                    output: None,
                }
            }
            NodeKind::Viewer => {
                let out = self.graph.add(OutputOperation::new("viewer", Priority::Medium));
                BuiltNode {
                    sockets: vec![Socket::new(DataType::Color, BLACK, &[(out, 0)])],
                    output: None,
                }
            }
            NodeKind::Output => {
                let name = self.param_str(node, "name").unwrap_or(&node.id).to_owned();
                let priority = match self.param_str(node, "priority") {
                    Some(p) => Priority::parse(p).unwrap_or_else(|| {
                        self.warn(
                            Some(node.id.as_str()),
                            format!("unknown priority '{p}'; using low"),
                        );
                        Priority::Low
                    }),
                    None => Priority::Low,
                };
                let out = self.graph.add(OutputOperation::new(name, priority));
                BuiltNode {
                    sockets: vec![Socket::new(DataType::Color, BLACK, &[(out, 0)])],
                    output: None,
                }
            }
            NodeKind::Unknown => {
                self.warn(
                    Some(node.id.as_str()),
                    format!("unknown node kind '{}'; passing input 0 through", node.kind),
                );
                let op = self.graph.add(ConvertOperation::new(ConvertKind::Identity));
                BuiltNode {
                    sockets: vec![Socket::new(DataType::Color, BLACK, &[(op, 0)])],
                    output: Some((op, DataType::Color)),
                }
            }
        }
    }

    fn build_image(&mut self, node: &Node) -> BuiltNode {
        let name = self.param_str(node, "name").unwrap_or(&node.id).to_owned();
        let extend = match self.param_str(node, "extend") {
            Some(e) => ExtendMode::parse(e).unwrap_or_else(|| {
                self.warn(
                    Some(node.id.as_str()),
                    format!("unknown extend mode '{e}'; using extend"),
                );
                ExtendMode::Extend
            }),
            None => ExtendMode::Extend,
        };
        let op = match self.images.get(&name) {
            Some(image) => self
                .graph
                .add(ImageSourceOperation::new(&name, image.clone(), extend)),
            None => {
                self.warn(
                    Some(node.id.as_str()),
                    format!("image input '{name}' was not provided; using black"),
                );
                self.graph.add(ConstantOperation::color(BLACK))
            }
        };
        BuiltNode::source(op, DataType::Color)
    }

    fn build_blur(&mut self, node: &Node) -> BuiltNode {
        let filter = match self.param_str(node, "filter") {
            Some(f) => FilterType::parse(f).unwrap_or_else(|| {
                self.warn(
                    Some(node.id.as_str()),
                    format!("unknown blur filter '{f}'; using gauss"),
                );
                FilterType::Gauss
            }),
            None => FilterType::Gauss,
        };
        let settings = BlurSettings {
            filter,
            size_x: self.param_f32(node, "size_x", 0.0),
            size_y: self.param_f32(node, "size_y", 0.0),
        };

        match self.config.blur_quality {
            BlurQuality::Quality => {
                let op = self.graph.add(GaussianBokehBlurOperation::new(settings));
                BuiltNode {
                    sockets: vec![
                        Socket::new(DataType::Color, BLACK, &[(op, 0)]),
                        Socket::new(DataType::Value, ONE, &[(op, 1)]),
                    ],
                    output: Some((op, DataType::Color)),
                }
            }
            BlurQuality::Fast => {
                let x = self
                    .graph
                    .add(GaussianAxisBlurOperation::new(BlurAxis::X, settings));
                let y = self
                    .graph
                    .add(GaussianAxisBlurOperation::new(BlurAxis::Y, settings));
                self.link_ops(&node.id, x, y, 0);
                BuiltNode {
                    sockets: vec![
                        Socket::new(DataType::Color, BLACK, &[(x, 0)]),
                        Socket {
                            data_type: DataType::Value,
                            default: ONE,
                            targets: smallvec![(x, 1), (y, 1)],
                        },
                    ],
                    output: Some((y, DataType::Color)),
                }
            }
        }
    }

    fn param_f32(&mut self, node: &Node, key: &str, default: f32) -> f32 {
        let Some(v) = node.params.get(key) else {
            return default;
        };
        match v.as_f64().map(|n| n as f32) {
            Some(n) if n.is_finite() => n,
            _ => {
                self.warn(
                    Some(node.id.as_str()),
                    format!("param '{key}' must be a finite number; using {default}"),
                );
                default
            }
        }
    }

    fn param_bool(&mut self, node: &Node, key: &str, default: bool) -> bool {
        let Some(v) = node.params.get(key) else {
            return default;
        };
        v.as_bool().unwrap_or_else(|| {
            self.warn(
                Some(node.id.as_str()),
                format!("param '{key}' must be a boolean; using {default}"),
            );
            default
        })
    }

    fn param_floats<const N: usize>(&mut self, node: &Node, key: &str, default: [f32; N]) -> [f32; N] {
        let Some(v) = node.params.get(key) else {
            return default;
        };
        let parsed: Option<Vec<f32>> = v.as_array().and_then(|items| {
            items
                .iter()
                .map(|i| i.as_f64().map(|n| n as f32).filter(|n| n.is_finite()))
                .collect()
        });
        match parsed.and_then(|p| <[f32; N]>::try_from(p).ok()) {
            Some(arr) => arr,
            None => {
                self.warn(
                    Some(node.id.as_str()),
                    format!("param '{key}' must be an array of {N} finite numbers; using default"),
                );
                default
            }
        }
    }

    fn param_str<'n>(&mut self, node: &'n Node, key: &str) -> Option<&'n str> {
        let v = node.params.get(key)?;
        let s = v.as_str();
        if s.is_none() {
            self.warn(Some(node.id.as_str()), format!("param '{key}' must be a string"));
        }
        s
    }
}

#[cfg(test)]
#[path = "../../tests/unit/node_tree/convert.rs"]
mod tests;
