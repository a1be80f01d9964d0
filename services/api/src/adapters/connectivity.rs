//! services/api/src/adapters/connectivity.rs
//!
//! Implements the `ConnectivitySignal` port by periodically probing the
//! repository and publishing Online/Offline transitions.

use futures::stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vocab_progress_core::domain::ConnectivityEvent;
use vocab_progress_core::ports::{ConnectivitySignal, ConnectivityStream, ProgressRepository};

pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self { state }
    }

    /// Publishes a new state. Subscribers only hear about actual transitions.
    pub fn set_online(&self, online: bool) {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                info!("Remote store reachable again");
            } else {
                warn!("Remote store unreachable, writes will be queued");
            }
        }
    }

    /// Pings `repository` every `every` and publishes the outcome.
    pub fn spawn_probe(
        self: &Arc<Self>,
        repository: Arc<dyn ProgressRepository>,
        every: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let online = repository.ping().await.is_ok();
                monitor.set_online(online);
            }
        })
    }
}

impl ConnectivitySignal for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> ConnectivityStream {
        let rx = self.state.subscribe();
        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let event = if *rx.borrow_and_update() {
                ConnectivityEvent::Online
            } else {
                ConnectivityEvent::Offline
            };
            Some((event, rx))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryProgressRepository;
    use futures::StreamExt;

    #[tokio::test]
    async fn subscribers_see_transitions_only() {
        let monitor = ConnectivityMonitor::new(true);
        let mut events = monitor.subscribe();

        monitor.set_online(true);
        monitor.set_online(false);
        assert_eq!(events.next().await, Some(ConnectivityEvent::Offline));

        monitor.set_online(true);
        assert_eq!(events.next().await, Some(ConnectivityEvent::Online));
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn probe_follows_repository_reachability() {
        let repository = Arc::new(MemoryProgressRepository::new());
        repository.set_available(false);
        let monitor = Arc::new(ConnectivityMonitor::new(true));
        let mut events = monitor.subscribe();

        let probe = monitor.spawn_probe(repository.clone(), Duration::from_millis(5));
        assert_eq!(events.next().await, Some(ConnectivityEvent::Offline));

        repository.set_available(true);
        assert_eq!(events.next().await, Some(ConnectivityEvent::Online));
        probe.abort();
    }
}
