use crate::domain::OrderId;
use std::collections::HashSet;

/// Order ids already surfaced as new
///
/// Lives as long as its store; never persisted, so a restart alerts again.
#[derive(Debug, Default, Clone)]
pub struct SeenOrderSet {
    ids: HashSet<OrderId>,
}

impl SeenOrderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id`; true only the first time
    pub fn mark_seen(&mut self, id: OrderId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
