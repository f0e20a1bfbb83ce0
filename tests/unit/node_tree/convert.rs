use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::{buffer::memory_buffer::MemoryBuffer, foundation::core::Rect, operation::BufferRole};

fn names(graph: &OperationGraph) -> Vec<&'static str> {
    graph.ids().map(|op| graph.operation(op).name()).collect()
}

fn count(graph: &OperationGraph, name: &str) -> usize {
    names(graph).iter().filter(|n| **n == name).count()
}

fn convert(tree: &NodeTree) -> ConvertedGraph {
    convert_to_operations(tree, &ImageInputs::new(), &CompositorConfig::default())
}

fn find(graph: &OperationGraph, name: &str) -> OpId {
    graph
        .ids()
        .find(|op| graph.operation(*op).name() == name)
        .unwrap()
}

#[test]
fn simple_tree_converts_cleanly() {
    let tree = NodeTree {
        nodes: vec![
            Node::new("c", "rgb").with_params(json!({ "color": [1, 0, 0, 1] })),
            Node::new("out", "composite"),
        ],
        links: vec![Link::new("c", "out", 0)],
    };
    let ConvertedGraph { graph, diagnostics } = convert(&tree);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert_eq!(names(&graph), vec!["SetColor", "Output"]);
    let out = find(&graph, "Output");
    assert_eq!(graph.input_constant(out, 0), Some([1.0, 0.0, 0.0, 1.0]));
}

#[test]
fn unlinked_inputs_get_their_defaults() {
    let tree = NodeTree {
        nodes: vec![Node::new("inv", "invert"), Node::new("out", "viewer")],
        links: vec![Link::new("inv", "out", 0)],
    };
    let ConvertedGraph { graph, diagnostics } = convert(&tree);
    assert!(diagnostics.is_empty());
    let inv = find(&graph, "Invert");
    assert_eq!(graph.input_constant(inv, 0), Some([1.0, 0.0, 0.0, 0.0]));
    assert_eq!(graph.input_constant(inv, 1), Some([0.0, 0.0, 0.0, 1.0]));
}

#[test]
fn mismatched_links_get_a_conversion() {
    let tree = NodeTree {
        nodes: vec![
            Node::new("v", "value").with_params(json!({ "value": 0.25 })),
            Node::new("out", "composite"),
        ],
        links: vec![Link::new("v", "out", 0)],
    };
    let graph = convert(&tree).graph;
    let out = find(&graph, "Output");
    let conv = graph.input(out, 0).unwrap();
    assert_eq!(graph.operation(conv).name(), "Convert");
    assert_eq!(graph.input_constant(conv, 0), Some([0.25, 0.0, 0.0, 0.0]));
}

#[test]
fn unknown_kind_passes_through_with_a_diagnostic() {
    let tree = NodeTree {
        nodes: vec![
            Node::new("c", "rgb"),
            Node::new("x", "glare"),
            Node::new("out", "composite"),
        ],
        links: vec![Link::new("c", "x", 0), Link::new("x", "out", 0)],
    };
    let ConvertedGraph { graph, diagnostics } = convert(&tree);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].node.as_deref(), Some("x"));
    assert!(diagnostics[0].message.contains("glare"));
    assert_eq!(count(&graph, "Convert"), 1);
}

#[test]
fn bad_links_are_dropped() {
    let tree = NodeTree {
        nodes: vec![
            Node::new("a", "rgb"),
            Node::new("b", "rgb"),
            Node::new("out", "composite"),
        ],
        links: vec![
            Link::new("ghost", "out", 0),
            Link::new("a", "out", 5),
            Link::new("out", "a", 0),
            Link::new("a", "out", 0),
            Link::new("b", "out", 0),
        ],
    };
    let ConvertedGraph { graph, diagnostics } = convert(&tree);
    assert_eq!(diagnostics.len(), 4, "{diagnostics:?}");
    assert!(diagnostics[3].message.contains("already linked"));
    let out = find(&graph, "Output");
    assert_eq!(graph.input_constant(out, 0), Some([0.5, 0.5, 0.5, 1.0]));
}

#[test]
fn cycles_are_broken() {
    let tree = NodeTree {
        nodes: vec![
            Node::new("a", "invert"),
            Node::new("b", "invert"),
            Node::new("out", "composite"),
        ],
        links: vec![
            Link::new("a", "b", 1),
            Link::new("b", "a", 1),
            Link::new("b", "out", 0),
        ],
    };
    let ConvertedGraph { graph, diagnostics } = convert(&tree);
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.contains("cycle"));
    assert!(graph.topological_order().is_ok());
}

#[test]
fn missing_image_becomes_black() {
    let tree = NodeTree {
        nodes: vec![
            Node::new("img", "image").with_params(json!({ "name": "plate" })),
            Node::new("out", "composite"),
        ],
        links: vec![Link::new("img", "out", 0)],
    };
    let ConvertedGraph { graph, diagnostics } = convert(&tree);
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.contains("plate"));
    let out = find(&graph, "Output");
    assert_eq!(graph.input_constant(out, 0), Some([0.0, 0.0, 0.0, 1.0]));
}

#[test]
fn provided_image_is_sampled() {
    let buf = MemoryBuffer::filled(Rect::new(0, 0, 3, 2), [1.0; 4]).unwrap();
    let mut inputs = ImageInputs::new();
    inputs.insert("plate".into(), Arc::new(buf));
    let tree = NodeTree {
        nodes: vec![
            Node::new("img", "image").with_params(json!({ "name": "plate", "extend": "clip" })),
            Node::new("out", "composite"),
        ],
        links: vec![Link::new("img", "out", 0)],
    };
    let converted = convert_to_operations(&tree, &inputs, &CompositorConfig::default());
    assert!(converted.diagnostics.is_empty());
    assert_eq!(count(&converted.graph, "ImageSource"), 1);
}

#[test]
fn invalid_params_fall_back() {
    let tree = NodeTree {
        nodes: vec![
            Node::new("v", "value").with_params(json!({ "value": "lots" })),
            Node::new("c", "rgb").with_params(json!({ "color": [1, 2] })),
            Node::new("b", "blur").with_params(json!({ "filter": "sinc" })),
        ],
        links: vec![],
    };
    let ConvertedGraph { graph, diagnostics } = convert(&tree);
    assert_eq!(diagnostics.len(), 3);
    let v = find(&graph, "SetValue");
    assert_eq!(graph.operation(v).constant_value(), Some([0.5, 0.0, 0.0, 0.0]));
    let c = find(&graph, "SetColor");
    assert_eq!(graph.operation(c).constant_value(), Some([0.5, 0.5, 0.5, 1.0]));
}

#[test]
fn blur_follows_quality_setting() {
    let tree = NodeTree {
        nodes: vec![
            Node::new("s", "value").with_params(json!({ "value": 2.0 })),
            Node::new("b", "blur").with_params(json!({ "size_x": 3, "size_y": 3 })),
        ],
        links: vec![Link::new("s", "b", 1)],
    };
    let quality = convert(&tree).graph;
    assert_eq!(count(&quality, "GaussianBokehBlur"), 1);

    let fast = CompositorConfig {
        blur_quality: BlurQuality::Fast,
        ..CompositorConfig::default()
    };
    let graph = convert_to_operations(&tree, &ImageInputs::new(), &fast).graph;
    let x = find(&graph, "GaussianXBlur");
    let y = find(&graph, "GaussianYBlur");
    assert_eq!(graph.input(y, 0), Some(x));
    assert_eq!(graph.input(x, 1), graph.input(y, 1));
    assert_eq!(graph.input_constant(y, 1), Some([2.0, 0.0, 0.0, 0.0]));
}

#[test]
fn composite_alpha_output_only_when_linked() {
    let plain = NodeTree {
        nodes: vec![Node::new("out", "composite")],
        links: vec![],
    };
    assert_eq!(count(&convert(&plain).graph, "Output"), 1);

    let with_alpha = NodeTree {
        nodes: vec![Node::new("a", "value"), Node::new("out", "composite")],
        links: vec![Link::new("a", "out", 1)],
    };
    let graph = convert(&with_alpha).graph;
    let outputs: Vec<_> = graph
        .ids()
        .filter_map(|op| match graph.operation(op).buffer_role() {
            Some(BufferRole::Output { name, priority }) => Some((name.to_owned(), priority)),
            _ => None,
        })
        .collect();
    assert_eq!(
        outputs,
        vec![
            ("primary".to_owned(), Priority::High),
            ("alpha".to_owned(), Priority::High)
        ]
    );
}

#[test]
fn output_node_name_and_priority() {
    let tree = NodeTree {
        nodes: vec![
            Node::new("o1", "output").with_params(json!({ "priority": "medium" })),
            Node::new("o2", "output").with_params(json!({ "name": "mask", "priority": "urgent" })),
        ],
        links: vec![],
    };
    let ConvertedGraph { graph, diagnostics } = convert(&tree);
    assert_eq!(diagnostics.len(), 1);
    let roles: Vec<_> = graph
        .ids()
        .filter_map(|op| match graph.operation(op).buffer_role() {
            Some(BufferRole::Output { name, priority }) => Some((name.to_owned(), priority)),
            _ => None,
        })
        .collect();
    assert_eq!(
        roles,
        vec![
            ("o1".to_owned(), Priority::Medium),
            ("mask".to_owned(), Priority::Low)
        ]
    );
}

#[test]
fn duplicate_ids_keep_the_first_node() {
    let tree = NodeTree {
        nodes: vec![Node::new("n", "value"), Node::new("n", "rgb")],
        links: vec![],
    };
    let ConvertedGraph { graph, diagnostics } = convert(&tree);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(names(&graph), vec!["SetValue"]);
}
