use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Coalesces bursts of triggers per key: only the last trigger within the
/// quiet period runs.
#[derive(Clone)]
pub struct Debouncer<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    delay: Duration,
    generations: Arc<DashMap<K, u64>>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generations: Arc::new(DashMap::new()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `action` for `key` after the delay, superseding any earlier
    /// pending action for the same key. The handle resolves to whether this
    /// action ran.
    pub fn trigger<F>(&self, key: K, action: F) -> JoinHandle<bool>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = {
            let mut entry = self.generations.entry(key.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let generations = Arc::clone(&self.generations);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generations
                .remove_if(&key, |_, current| *current == generation)
                .is_none()
            {
                return false;
            }
            action.await;
            true
        })
    }

    /// Keys with an action still waiting.
    pub fn pending(&self) -> usize {
        self.generations.len()
    }
}
