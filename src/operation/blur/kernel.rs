use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    foundation::error::{CompositorError, CompositorResult},
    foundation::math::{FilterType, filter_value},
};

#[derive(Debug)]
enum KernelState<T> {
    Unbuilt,
    Building,
    Ready(Arc<T>),
}

/// Build-once slot for a blur kernel shared by every worker thread of a run.
///
/// The first caller of [`KernelCell::get_or_build`] builds the kernel. Concurrent callers block
/// until it is ready and then share it, so the kernel is built exactly once per run. A failed or
/// panicking build leaves the cell unbuilt for the next caller.
#[derive(Debug)]
pub struct KernelCell<T> {
    state: Mutex<KernelState<T>>,
    ready: Condvar,
    builds: Arc<AtomicUsize>,
}

impl<T> Default for KernelCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct BuildGuard<'a, T> {
    cell: &'a KernelCell<T>,
    armed: bool,
}

impl<T> Drop for BuildGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            *self.cell.lock() = KernelState::Unbuilt;
            self.cell.ready.notify_all();
        }
    }
}

impl<T> KernelCell<T> {
    /// Create an unbuilt cell.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KernelState::Unbuilt),
            ready: Condvar::new(),
            builds: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, KernelState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared counter of successful builds, readable after the owner moved into a graph.
    pub fn build_counter(&self) -> Arc<AtomicUsize> {
        self.builds.clone()
    }

    /// Number of successful builds so far.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Acquire)
    }

    /// The kernel, if built.
    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.lock() {
            KernelState::Ready(k) => Some(k.clone()),
            _ => None,
        }
    }

    /// Return the kernel, building it with `build` if nobody has yet.
    ///
    /// `build` runs without the lock held; other callers wait for its result.
    pub fn get_or_build(
        &self,
        build: impl FnOnce() -> CompositorResult<T>,
    ) -> CompositorResult<Arc<T>> {
        let mut state = self.lock();
        loop {
            match &*state {
                KernelState::Ready(k) => return Ok(k.clone()),
                KernelState::Unbuilt => break,
                KernelState::Building => {}
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state = KernelState::Building;
        drop(state);

        let mut guard = BuildGuard {
            cell: self,
            armed: true,
        };
        let kernel = Arc::new(build()?);
        guard.armed = false;

        *self.lock() = KernelState::Ready(kernel.clone());
        self.builds.fetch_add(1, Ordering::AcqRel);
        self.ready.notify_all();
        Ok(kernel)
    }

    /// Drop the kernel so the next run rebuilds it.
    pub fn reset(&self) {
        *self.lock() = KernelState::Unbuilt;
    }
}

fn weight_vec(len: usize) -> CompositorResult<Vec<f32>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|e| CompositorError::resource(format!("cannot allocate blur kernel: {e}")))?;
    Ok(v)
}

fn normalize(weights: &mut [f32]) {
    let sum: f32 = weights.iter().sum();
    if sum > 0.0 {
        for w in weights {
            *w /= sum;
        }
    }
}

/// Normalized 1-D weights for offsets `-taps..=taps`.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussTable {
    taps: i32,
    weights: Vec<f32>,
}

impl GaussTable {
    /// Sample `filter` over `radius` pixels.
    pub fn build(filter: FilterType, radius: f32) -> CompositorResult<Self> {
        let taps = radius.ceil().max(0.0) as i32;
        let fac = if radius > 0.0 { 1.0 / radius } else { 0.0 };
        let mut weights = weight_vec((2 * taps + 1) as usize)?;
        for i in -taps..=taps {
            weights.push(filter_value(filter, i as f32 * fac));
        }
        normalize(&mut weights);
        Ok(Self { taps, weights })
    }

    /// Reach of the kernel on either side of the center.
    pub fn taps(&self) -> i32 {
        self.taps
    }

    /// Weight at `offset` from the center, zero outside the kernel.
    pub fn weight(&self, offset: i32) -> f32 {
        if offset.abs() > self.taps {
            return 0.0;
        }
        self.weights[(offset + self.taps) as usize]
    }
}

/// Normalized 2-D disc weights for offsets `-taps_x..=taps_x` by `-taps_y..=taps_y`.
#[derive(Clone, Debug, PartialEq)]
pub struct BokehKernel {
    taps_x: i32,
    taps_y: i32,
    weights: Vec<f32>,
}

impl BokehKernel {
    /// Sample `filter` over the ellipse with radii `radius_x`, `radius_y`.
    pub fn build(filter: FilterType, radius_x: f32, radius_y: f32) -> CompositorResult<Self> {
        let taps_x = radius_x.ceil().max(0.0) as i32;
        let taps_y = radius_y.ceil().max(0.0) as i32;
        let fac_x = if radius_x > 0.0 { 1.0 / radius_x } else { 0.0 };
        let fac_y = if radius_y > 0.0 { 1.0 / radius_y } else { 0.0 };

        let len = (2 * taps_x + 1) as usize * (2 * taps_y + 1) as usize;
        let mut weights = weight_vec(len)?;
        for j in -taps_y..=taps_y {
            for i in -taps_x..=taps_x {
                let fi = i as f32 * fac_x;
                let fj = j as f32 * fac_y;
                weights.push(filter_value(filter, (fi * fi + fj * fj).sqrt()));
            }
        }
        normalize(&mut weights);
        Ok(Self {
            taps_x,
            taps_y,
            weights,
        })
    }

    /// Horizontal reach.
    pub fn taps_x(&self) -> i32 {
        self.taps_x
    }

    /// Vertical reach.
    pub fn taps_y(&self) -> i32 {
        self.taps_y
    }

    /// Weight at `(dx, dy)` from the center, zero outside the kernel.
    pub fn weight(&self, dx: i32, dy: i32) -> f32 {
        if dx.abs() > self.taps_x || dy.abs() > self.taps_y {
            return 0.0;
        }
        let row = (dy + self.taps_y) as usize * (2 * self.taps_x + 1) as usize;
        self.weights[row + (dx + self.taps_x) as usize]
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/operation/blur/kernel.rs"]
mod tests;
