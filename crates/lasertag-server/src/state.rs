use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::registry::SessionRegistry;

pub type SharedRegistry = Arc<RwLock<SessionRegistry>>;

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let registry =
            SessionRegistry::new(config.combat.clone(), config.sessions.cleanup_delay());
        Self {
            registry: Arc::new(RwLock::new(registry)),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// RAII guard for the global WebSocket connection counter.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_tracks_connection_count() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _a = ConnectionGuard::new(Arc::clone(&count));
            let _b = ConnectionGuard::new(Arc::clone(&count));
            assert_eq!(count.load(Ordering::Relaxed), 2);
        }
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }
}
