use std::sync::Arc;

use super::*;
use crate::{
    buffer::memory_buffer::{ExtendMode, MemoryBuffer},
    foundation::core::{Rect, Resolution},
    foundation::math::FilterType,
    operation::{
        blur::{BlurSettings, GaussianBokehBlurOperation},
        buffer_ops::OutputOperation,
        image::ImageSourceOperation,
        invert::InvertOperation,
    },
};

fn image(w: u32, h: u32) -> ImageSourceOperation {
    let buf = MemoryBuffer::filled(Rect::from_origin_size(0, 0, w, h), [0.5, 0.5, 0.5, 1.0])
        .unwrap();
    ImageSourceOperation::new("img", Arc::new(buf), ExtendMode::Extend)
}

fn config() -> CompositorConfig {
    CompositorConfig {
        chunk_size: 8,
        resolution: Resolution::new(16, 16),
        threads: Some(2),
        ..CompositorConfig::default()
    }
}

fn count(graph: &OperationGraph, name: &str) -> usize {
    graph
        .ids()
        .filter(|op| graph.operation(*op).name() == name)
        .count()
}

#[test]
fn group_order_is_upstream_first() {
    let deps = vec![vec![2], vec![], vec![1], vec![0, 1]];
    assert_eq!(group_order(&deps), vec![1, 2, 0, 3]);
}

#[test]
fn upstream_closure_follows_dependencies() {
    let deps = vec![vec![], vec![0], vec![], vec![1]];
    assert_eq!(upstream_closure(3, &deps), vec![true, true, false, true]);
    assert_eq!(upstream_closure(2, &deps), vec![false, false, true, false]);
}

#[test]
fn constants_are_duplicated_per_consumer() {
    let mut g = OperationGraph::new();
    let c = g.add(ConstantOperation::value(0.5));
    let a = g.add(InvertOperation::default());
    let b = g.add(InvertOperation::default());
    g.connect(c, a, 0).unwrap();
    g.connect(c, b, 0).unwrap();

    duplicate_constants(&mut g).unwrap();
    assert_eq!(g.consumers(c), vec![(a, 0)]);
    let copy = g.input(b, 0).unwrap();
    assert_ne!(copy, c);
    assert_eq!(g.operation(copy).constant_value(), Some([0.5, 0.0, 0.0, 0.0]));
}

#[test]
fn fan_out_gets_a_buffer() {
    let mut g = OperationGraph::new();
    let img = g.add(image(16, 16));
    let a = g.add(InvertOperation::default());
    let b = g.add(InvertOperation::default());
    let oa = g.add(OutputOperation::new("a", Priority::High));
    let ob = g.add(OutputOperation::new("b", Priority::Low));
    g.connect(img, a, 1).unwrap();
    g.connect(img, b, 1).unwrap();
    g.connect(a, oa, 0).unwrap();
    g.connect(b, ob, 0).unwrap();

    let proxies = insert_buffers(&mut g).unwrap();
    assert_eq!(proxies.len(), 1);
    assert_eq!(count(&g, "WriteBuffer"), 1);
    assert_eq!(count(&g, "ReadBuffer"), 2);
    assert_eq!(g.input(proxies[0].writer(), 0), Some(img));
    assert_ne!(g.input(a, 1), Some(img));
    assert_ne!(g.input(a, 1), g.input(b, 1));
}

#[test]
fn same_consumer_twice_is_not_fan_out() {
    let mut g = OperationGraph::new();
    let img = g.add(image(16, 16));
    let inv = g.add(InvertOperation::default());
    let out = g.add(OutputOperation::new("primary", Priority::High));
    g.connect(img, inv, 0).unwrap();
    g.connect(img, inv, 1).unwrap();
    g.connect(inv, out, 0).unwrap();

    assert!(insert_buffers(&mut g).unwrap().is_empty());
    assert_eq!(g.input(inv, 0), Some(img));
}

#[test]
fn complex_operations_are_isolated() {
    let mut g = OperationGraph::new();
    let img = g.add(image(16, 16));
    let blur = g.add(GaussianBokehBlurOperation::new(BlurSettings::uniform(
        FilterType::Gauss,
        2.0,
    )));
    let inv = g.add(InvertOperation::default());
    let out = g.add(OutputOperation::new("primary", Priority::High));
    g.connect(img, blur, 0).unwrap();
    g.connect(blur, inv, 1).unwrap();
    g.connect(inv, out, 0).unwrap();

    let proxies = insert_buffers(&mut g).unwrap();
    assert_eq!(proxies.len(), 2, "one before and one after the blur");
    assert!(matches!(
        g.operation(g.input(blur, 0).unwrap()).buffer_role(),
        Some(BufferRole::Read(_))
    ));
    assert!(matches!(
        g.operation(g.input(inv, 1).unwrap()).buffer_role(),
        Some(BufferRole::Read(_))
    ));
}

#[test]
fn complex_operation_feeding_a_terminal_needs_no_output_buffer() {
    let mut g = OperationGraph::new();
    let img = g.add(image(16, 16));
    let blur = g.add(GaussianBokehBlurOperation::new(BlurSettings::uniform(
        FilterType::Gauss,
        2.0,
    )));
    let out = g.add(OutputOperation::new("primary", Priority::High));
    g.connect(img, blur, 0).unwrap();
    g.connect(blur, out, 0).unwrap();

    assert_eq!(insert_buffers(&mut g).unwrap().len(), 1);
    assert_eq!(g.input(out, 0), Some(blur));
}

#[test]
fn groups_partition_the_graph() {
    let mut g = OperationGraph::new();
    let img = g.add(image(16, 16));
    let blur = g.add(GaussianBokehBlurOperation::new(BlurSettings::uniform(
        FilterType::Gauss,
        2.0,
    )));
    let size = g.add(ConstantOperation::value(1.0));
    let inv = g.add(InvertOperation::default());
    let out = g.add(OutputOperation::new("primary", Priority::High));
    g.connect(img, blur, 0).unwrap();
    g.connect(size, blur, 1).unwrap();
    g.connect(blur, inv, 1).unwrap();
    g.connect(inv, out, 0).unwrap();

    let system = ExecutionSystem::from_graph(g, config()).unwrap();
    assert_eq!(system.groups().len(), 3);
    assert_eq!(system.proxies().len(), 2);

    let mut owners = vec![0usize; system.graph().len()];
    for group in system.groups() {
        for m in group.members() {
            owners[m.index()] += 1;
        }
        assert_eq!(group.resolution(), Resolution::new(16, 16));
        assert_eq!(group.chunks().len(), 4);
    }
    assert!(owners.iter().all(|n| *n == 1), "{owners:?}");
}

#[test]
fn cycles_fail_construction() {
    let mut g = OperationGraph::new();
    let a = g.add(InvertOperation::default());
    let b = g.add(InvertOperation::default());
    g.connect(a, b, 1).unwrap();
    g.connect(b, a, 1).unwrap();
    let err = ExecutionSystem::from_graph(g, config()).unwrap_err();
    assert!(err.to_string().starts_with("graph error:"));
}

#[test]
fn invalid_config_is_rejected() {
    let cfg = CompositorConfig {
        chunk_size: 0,
        ..config()
    };
    assert!(ExecutionSystem::from_graph(OperationGraph::new(), cfg).is_err());
    assert!(build_thread_pool(Some(0)).is_err());
    assert!(build_thread_pool(Some(1)).is_ok());
}

#[test]
fn empty_graph_completes_without_outputs() {
    let mut system = ExecutionSystem::from_graph(OperationGraph::new(), config()).unwrap();
    let outcome = system.execute(&CancellationToken::new()).unwrap();
    let outputs = outcome.outputs().unwrap();
    assert_eq!(outputs.names().count(), 0);
    assert_eq!(outputs.stats(), RunStats::default());
}
