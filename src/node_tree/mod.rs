//! User-facing node tree and its conversion into operations.
//!
//! A node tree is what an editor saves: nodes with a kind and parameters, and links between
//! their sockets. It may be broken in ways the engine recovers from; see
//! [`convert_to_operations`].

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{buffer::memory_buffer::MemoryBuffer, foundation::error::CompositorResult};

mod convert;

pub use convert::{ConvertedGraph, convert_to_operations};

/// External images by the name `image` nodes refer to them with.
pub type ImageInputs = BTreeMap<String, Arc<MemoryBuffer>>;

/// A node graph as authored.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeTree {
    /// Nodes; ids must be unique.
    pub nodes: Vec<Node>,
    /// Links from node outputs to node inputs.
    #[serde(default)]
    pub links: Vec<Link>,
}

impl NodeTree {
    /// Parse a node tree from JSON.
    pub fn from_json(json: &str) -> CompositorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One node of a [`NodeTree`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    /// Unique id, referenced by links.
    pub id: String,
    /// Node kind, e.g. `blur`.
    pub kind: String,
    /// Kind-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Node {
    /// Create a node without parameters.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            params: serde_json::Value::Null,
        }
    }

    /// Attach parameters.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// Connection from the output of one node to an input of another.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Link {
    /// Source node id.
    pub from: String,
    /// Source output socket; nodes have a single output, socket 0.
    #[serde(default)]
    pub from_socket: usize,
    /// Target node id.
    pub to: String,
    /// Target input socket.
    #[serde(default)]
    pub to_socket: usize,
}

impl Link {
    /// Link output 0 of `from` to input `to_socket` of `to`.
    pub fn new(from: impl Into<String>, to: impl Into<String>, to_socket: usize) -> Self {
        Self {
            from: from.into(),
            from_socket: 0,
            to: to.into(),
            to_socket,
        }
    }
}

/// A graph problem that conversion recovered from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphDiagnostic {
    /// Node the problem was found on, if any.
    pub node: Option<String>,
    /// What was wrong and what was substituted.
    pub message: String,
}

impl fmt::Display for GraphDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "node '{node}': {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}
