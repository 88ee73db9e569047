use crate::{Component, Result};
use async_trait::async_trait;

/// Keyed store of discovered components.
///
/// Implementations serialize every mutation and snapshot read through a
/// single lock; none of the operations can fail.
pub trait ComponentStore: Send + Sync {
    fn register(&self, component: Component);
    fn get(&self, id: &str) -> Option<Component>;
    fn get_all(&self) -> Vec<Component>;
    fn clear(&self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of the current component set, invoked once per discovery pass.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn discover(&self) -> Result<Vec<Component>>;
}

/// Adapts a plain closure into a [`DiscoverySource`].
pub struct FnDiscovery<F>(pub F);

#[async_trait]
impl<F> DiscoverySource for FnDiscovery<F>
where
    F: Fn() -> Vec<Component> + Send + Sync,
{
    async fn discover(&self) -> Result<Vec<Component>> {
        Ok((self.0)())
    }
}

/// Fixed component list, mostly useful in tests and demos.
pub struct StaticDiscovery {
    components: Vec<Component>,
}

impl StaticDiscovery {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }
}

#[async_trait]
impl DiscoverySource for StaticDiscovery {
    async fn discover(&self) -> Result<Vec<Component>> {
        Ok(self.components.clone())
    }
}
