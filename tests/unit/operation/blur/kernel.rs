use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Barrier,
    thread,
};

use super::*;

#[test]
fn gauss_table_is_normalized_and_symmetric() {
    let t = GaussTable::build(FilterType::Gauss, 2.5).unwrap();
    assert_eq!(t.taps(), 3);
    let sum: f32 = (-3..=3).map(|i| t.weight(i)).sum();
    assert!((sum - 1.0).abs() < 1e-5);
    for i in 1..=3 {
        assert_eq!(t.weight(i), t.weight(-i));
    }
    assert!(t.weight(0) > t.weight(2));
    assert_eq!(t.weight(4), 0.0);
}

#[test]
fn box_table_is_flat() {
    let t = GaussTable::build(FilterType::Box, 2.0).unwrap();
    for i in -2..=2 {
        assert!((t.weight(i) - 0.2).abs() < 1e-6);
    }
}

#[test]
fn bokeh_kernel_is_normalized_and_elliptic() {
    let k = BokehKernel::build(FilterType::Gauss, 3.0, 1.0).unwrap();
    assert_eq!((k.taps_x(), k.taps_y()), (3, 1));
    let mut sum = 0.0;
    for dy in -1..=1 {
        for dx in -3..=3 {
            sum += k.weight(dx, dy);
        }
    }
    assert!((sum - 1.0).abs() < 1e-5);
    assert_eq!(k.weight(2, 1), k.weight(-2, -1));
    assert!(k.weight(1, 0) > k.weight(0, 1));
    assert_eq!(k.weight(0, 2), 0.0);
}

#[test]
fn cell_builds_once_across_threads() {
    let cell = KernelCell::<u32>::new();
    let calls = AtomicUsize::new(0);
    let barrier = Barrier::new(8);
    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                barrier.wait();
                let k = cell
                    .get_or_build(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(5));
                        Ok(42)
                    })
                    .unwrap();
                assert_eq!(*k, 42);
            });
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cell.build_count(), 1);
}

#[test]
fn failed_build_leaves_cell_unbuilt() {
    let cell = KernelCell::<u32>::new();
    let err = cell
        .get_or_build(|| Err(CompositorError::resource("no memory")))
        .unwrap_err();
    assert!(err.to_string().starts_with("resource error:"));
    assert!(cell.get().is_none());
    assert_eq!(*cell.get_or_build(|| Ok(3)).unwrap(), 3);
    assert_eq!(cell.build_count(), 1);
}

#[test]
fn panicking_build_leaves_cell_unbuilt() {
    let cell = KernelCell::<u32>::new();
    let result = catch_unwind(AssertUnwindSafe(|| {
        let _ = cell.get_or_build(|| panic!("kernel build exploded"));
    }));
    assert!(result.is_err());
    assert!(cell.get().is_none());
    assert_eq!(*cell.get_or_build(|| Ok(5)).unwrap(), 5);
}

#[test]
fn reset_forces_a_rebuild() {
    let cell = KernelCell::<u32>::new();
    let counter = cell.build_counter();
    cell.get_or_build(|| Ok(1)).unwrap();
    cell.get_or_build(|| Ok(2)).unwrap();
    assert_eq!(*cell.get().unwrap(), 1);

    cell.reset();
    assert!(cell.get().is_none());
    assert_eq!(*cell.get_or_build(|| Ok(2)).unwrap(), 2);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
