use archlens_core::{Component, ComponentId, ComponentStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Thread-safe keyed store of discovered components.
///
/// Every mutation bumps [`generation`](Self::generation), which lets callers
/// holding a derived snapshot (such as a built graph) detect staleness
/// without diffing the component set.
#[derive(Default)]
pub struct ComponentRegistry {
    components: RwLock<HashMap<ComponentId, Component>>,
    generation: AtomicU64,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert by id. The last writer wins.
    pub fn register(&self, component: Component) {
        let mut components = self.components.write();
        trace!(id = %component.id, category = %component.category, "registering component");
        components.insert(component.id.clone(), component);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn register_all<I>(&self, components: I) -> usize
    where
        I: IntoIterator<Item = Component>,
    {
        let mut store = self.components.write();
        let mut count = 0;
        for component in components {
            store.insert(component.id.clone(), component);
            count += 1;
        }
        if count > 0 {
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        count
    }

    pub fn get(&self, id: &str) -> Option<Component> {
        self.components.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.read().contains_key(id)
    }

    /// Snapshot of every component, ordered by id.
    pub fn get_all(&self) -> Vec<Component> {
        let mut all: Vec<Component> = self.components.read().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn clear(&self) {
        let mut components = self.components.write();
        let removed = components.len();
        components.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!(removed, "component registry cleared");
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl ComponentStore for ComponentRegistry {
    fn register(&self, component: Component) {
        ComponentRegistry::register(self, component)
    }

    fn get(&self, id: &str) -> Option<Component> {
        ComponentRegistry::get(self, id)
    }

    fn get_all(&self) -> Vec<Component> {
        ComponentRegistry::get_all(self)
    }

    fn clear(&self) {
        ComponentRegistry::clear(self)
    }

    fn len(&self) -> usize {
        ComponentRegistry::len(self)
    }
}
