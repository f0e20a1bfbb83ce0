use std::sync::{Arc, PoisonError, RwLock};

use crate::{
    buffer::memory_buffer::MemoryBuffer,
    foundation::error::{CompositorError, CompositorResult},
    operation::OpId,
};

/// Identifier of a [`MemoryProxy`] within one execution system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProxyId(pub u32);

#[derive(Debug, Default)]
enum ProxyState {
    #[default]
    Pending,
    Complete(Arc<MemoryBuffer>),
}

/// Link between the one write-buffer operation producing an intermediate result and the
/// read-buffer operations consuming it.
///
/// The buffer becomes visible to readers only once the producing group has finished every
/// chunk it was asked for. A pending proxy never exposes partial data.
#[derive(Debug)]
pub struct MemoryProxy {
    id: ProxyId,
    writer: OpId,
    state: RwLock<ProxyState>,
}

impl MemoryProxy {
    /// Create a pending proxy fed by `writer`.
    pub fn new(id: ProxyId, writer: OpId) -> Self {
        Self {
            id,
            writer,
            state: RwLock::new(ProxyState::Pending),
        }
    }

    /// This proxy's id.
    pub fn id(&self) -> ProxyId {
        self.id
    }

    /// The write-buffer operation that fills this proxy.
    pub fn writer(&self) -> OpId {
        self.writer
    }

    /// Mark the result complete. Publishing twice in one run is an error.
    pub fn publish(&self, buffer: MemoryBuffer) -> CompositorResult<Arc<MemoryBuffer>> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, ProxyState::Complete(_)) {
            return Err(CompositorError::evaluation(format!(
                "memory proxy {} published twice",
                self.id.0
            )));
        }
        let buffer = Arc::new(buffer);
        *state = ProxyState::Complete(buffer.clone());
        Ok(buffer)
    }

    /// The finished buffer, `None` while pending.
    pub fn buffer(&self) -> Option<Arc<MemoryBuffer>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            ProxyState::Pending => None,
            ProxyState::Complete(b) => Some(b.clone()),
        }
    }

    /// Return `true` once published.
    pub fn is_complete(&self) -> bool {
        matches!(
            *self.state.read().unwrap_or_else(PoisonError::into_inner),
            ProxyState::Complete(_)
        )
    }

    /// Drop the published buffer and return to pending.
    pub fn reset(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = ProxyState::Pending;
    }
}
