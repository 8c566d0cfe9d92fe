//! Proxy pool with uniform random selection

use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

use crate::models::Proxy;

/// Proxies available to the dispatcher for the whole run
///
/// The pool is fixed once dispatch begins. Selection takes the random source
/// as an argument so runs can be made reproducible.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    proxies: Vec<Arc<Proxy>>,
}

impl ProxyPool {
    pub fn new(proxies: Vec<Proxy>) -> Self {
        Self {
            proxies: proxies.into_iter().map(Arc::new).collect(),
        }
    }

    /// Select a proxy uniformly at random, `None` when the pool is empty
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Arc<Proxy>> {
        self.proxies.choose(rng).cloned()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proxy> {
        self.proxies.iter().map(|p| p.as_ref())
    }
}
