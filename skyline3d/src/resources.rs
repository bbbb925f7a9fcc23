use crate::SkylineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Geometry,
    Material,
    Renderer,
}

#[derive(Clone, Debug)]
struct Entry {
    kind: ResourceKind,
    label: &'static str,
    dispose_count: u32,
}

/// Bookkeeping for every geometry/material handle the skyline creates, so that teardown can
/// release each of them exactly once.
#[derive(Clone, Debug, Default)]
pub struct ResourceLedger {
    entries: Vec<Entry>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ResourceKind, label: &'static str) -> ResourceId {
        self.entries.push(Entry {
            kind,
            label,
            dispose_count: 0,
        });
        ResourceId(self.entries.len() - 1)
    }

    pub fn dispose(&mut self, id: ResourceId) -> Result<(), SkylineError> {
        let entry = self
            .entries
            .get_mut(id.0)
            .ok_or(SkylineError::UnknownResource(id))?;
        if entry.dispose_count > 0 {
            return Err(SkylineError::AlreadyDisposed(id));
        }
        entry.dispose_count += 1;
        Ok(())
    }

    /// Disposes every live handle and returns how many were released. Already-disposed
    /// handles are skipped, so calling this twice is harmless.
    pub fn dispose_all(&mut self) -> usize {
        let mut released = 0;
        for entry in self.entries.iter_mut().filter(|e| e.dispose_count == 0) {
            tracing::trace!(kind = ?entry.kind, label = entry.label, "disposing");
            entry.dispose_count = 1;
            released += 1;
        }
        released
    }

    pub fn is_disposed(&self, id: ResourceId) -> bool {
        self.entries
            .get(id.0)
            .map(|e| e.dispose_count > 0)
            .unwrap_or(false)
    }

    pub fn dispose_count(&self, id: ResourceId) -> u32 {
        self.entries.get(id.0).map(|e| e.dispose_count).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| e.dispose_count == 0).count()
    }

    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        (0..self.entries.len()).map(ResourceId)
    }
}
