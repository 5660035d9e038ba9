//! UI port registry.
//!
//! The side-panel UI unloads on tab switch and reconnects under the new
//! tab's port name, so the background holds all state and routes streams
//! by tab id. A reconnect replaces the prior port outright.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use pagehands_protocols::fabric::{sidebar_port_name, StreamEvent};
use pagehands_protocols::types::TabId;

struct UiPort {
    name: String,
    tx: mpsc::UnboundedSender<StreamEvent>,
}

#[derive(Default)]
pub struct PortRegistry {
    ports: DashMap<TabId, UiPort>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a UI for a tab, replacing any prior port.
    pub fn connect(&self, tab_id: TabId) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let name = sidebar_port_name(tab_id);
        debug!(%name, "ui port connected");
        self.ports.insert(tab_id, UiPort { name, tx });
        rx
    }

    pub fn disconnect(&self, tab_id: TabId) {
        if let Some((_, port)) = self.ports.remove(&tab_id) {
            debug!(name = %port.name, "ui port disconnected");
        }
    }

    /// Post an event to a tab's UI. Returns false when no UI is attached
    /// (events are fire-and-forget; a detached UI re-reads state on
    /// reconnect).
    pub fn send(&self, tab_id: TabId, event: StreamEvent) -> bool {
        match self.ports.get(&tab_id) {
            Some(port) => port.tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Post an event to every connected UI.
    pub fn broadcast(&self, event: StreamEvent) {
        for port in self.ports.iter() {
            let _ = port.tx.send(event.clone());
        }
    }

    pub fn port_name(&self, tab_id: TabId) -> Option<String> {
        self.ports.get(&tab_id).map(|p| p.name.clone())
    }

    pub fn connected(&self) -> usize {
        self.ports.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_names_port_after_tab() {
        let registry = PortRegistry::new();
        let _rx = registry.connect(12);
        assert_eq!(registry.port_name(12).as_deref(), Some("sidebar:tab:12"));
        assert_eq!(registry.connected(), 1);
    }

    #[tokio::test]
    async fn reconnect_replaces_prior_port() {
        let registry = PortRegistry::new();
        let mut old_rx = registry.connect(1);
        let mut new_rx = registry.connect(1);
        assert_eq!(registry.connected(), 1);

        assert!(registry.send(1, StreamEvent::AgentDone { tab_id: 1 }));
        // The replaced port's stream is closed; only the new one sees events.
        assert!(old_rx.recv().await.is_none());
        assert!(matches!(
            new_rx.recv().await,
            Some(StreamEvent::AgentDone { tab_id: 1 })
        ));
    }

    #[tokio::test]
    async fn send_without_port_is_false() {
        let registry = PortRegistry::new();
        assert!(!registry.send(9, StreamEvent::AgentDone { tab_id: 9 }));
    }

    #[tokio::test]
    async fn broadcast_reaches_all_ports() {
        let registry = PortRegistry::new();
        let mut rx1 = registry.connect(1);
        let mut rx2 = registry.connect(2);
        registry.broadcast(StreamEvent::VfsStorageChanged {
            key: "vfs:x.test".to_string(),
        });
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn disconnect_removes_port() {
        let registry = PortRegistry::new();
        let _rx = registry.connect(3);
        registry.disconnect(3);
        assert_eq!(registry.connected(), 0);
    }
}
