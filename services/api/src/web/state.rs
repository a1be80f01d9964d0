//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-user coordinator registry.

use crate::adapters::ConnectivityMonitor;
use crate::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use vocab_progress_core::coordinator::ProgressCoordinator;
use vocab_progress_core::ports::{ConnectivitySignal, ProgressRepository};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// A live coordinator together with the task that forwards connectivity changes to it.
struct Registered {
    coordinator: Arc<ProgressCoordinator>,
    watcher: JoinHandle<()>,
}

type Registry = Arc<Mutex<HashMap<Uuid, Registered>>>;

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub repository: Arc<dyn ProgressRepository>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub config: Arc<Config>,
    coordinators: Registry,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn ProgressRepository>,
        connectivity: Arc<ConnectivityMonitor>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            repository,
            connectivity,
            config,
            coordinators: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the coordinator of `user_id`, creating it on first use.
    ///
    /// A coordinator still delivering writes after a sign-out is taken over again.
    /// Loading happens outside the registry lock, so a slow store only delays the
    /// requests of the user being loaded.
    pub async fn coordinator_for(&self, user_id: Uuid) -> Arc<ProgressCoordinator> {
        let coordinator = {
            let mut coordinators = self.coordinators.lock().await;
            match coordinators.get(&user_id) {
                Some(registered) => {
                    registered.coordinator.resume();
                    registered.coordinator.clone()
                }
                None => {
                    let coordinator = Arc::new(ProgressCoordinator::new(
                        user_id,
                        self.repository.clone(),
                        self.connectivity.clone(),
                    ));
                    let watcher = coordinator.watch_connectivity();
                    info!(%user_id, "Progress coordinator created");
                    coordinators.insert(
                        user_id,
                        Registered {
                            coordinator: coordinator.clone(),
                            watcher,
                        },
                    );
                    coordinator
                }
            }
        };

        coordinator.ensure_loaded().await;
        coordinator
    }

    /// Signs `user_id` out. Returns whether a signed-in coordinator was registered.
    ///
    /// A coordinator whose writes cannot all be delivered right away stays
    /// registered, signed out, and is retried every probe interval until its queue
    /// is empty.
    pub async fn sign_out(&self, user_id: Uuid) -> bool {
        let coordinator = {
            let coordinators = self.coordinators.lock().await;
            match coordinators.get(&user_id) {
                Some(registered) if !registered.coordinator.is_signed_out() => {
                    registered.coordinator.sign_out();
                    registered.coordinator.clone()
                }
                _ => return false,
            }
        };

        coordinator.retry_sync().await;
        let undelivered = coordinator.pending_writes();
        if undelivered == 0 && release_if_drained(&self.coordinators, user_id).await {
            return true;
        }

        warn!(%user_id, undelivered, "Signed out with undelivered writes, retrying in the background");
        self.spawn_drain(user_id, coordinator);
        true
    }

    fn spawn_drain(&self, user_id: Uuid, coordinator: Arc<ProgressCoordinator>) {
        let coordinators = Arc::clone(&self.coordinators);
        let connectivity = self.connectivity.clone();
        let every = self.config.probe_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !coordinator.is_signed_out() {
                    break;
                }
                if coordinator.pending_writes() > 0 && connectivity.is_online() {
                    coordinator.retry_sync().await;
                }
                if release_if_drained(&coordinators, user_id).await {
                    info!(%user_id, "Undelivered writes delivered after sign-out");
                    break;
                }
            }
        });
    }

    pub async fn active_users(&self) -> usize {
        self.coordinators.lock().await.len()
    }
}

/// Drops the coordinator of `user_id` if it is signed out with nothing left to deliver.
async fn release_if_drained(coordinators: &Registry, user_id: Uuid) -> bool {
    let mut coordinators = coordinators.lock().await;
    let drained = coordinators.get(&user_id).is_some_and(|registered| {
        registered.coordinator.is_signed_out() && registered.coordinator.pending_writes() == 0
    });
    if !drained {
        return false;
    }
    if let Some(registered) = coordinators.remove(&user_id) {
        registered.watcher.abort();
    }
    true
}
