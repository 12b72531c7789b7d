//! Open pages and which cache generation controls them

use parking_lot::RwLock;
use std::collections::BTreeMap;

/// The set of open pages (clients) in the controller's scope.
///
/// A page opened while a generation is active is controlled by it right away;
/// pages opened earlier stay uncontrolled until [`Clients::claim`].
#[derive(Debug, Default)]
pub struct Clients {
    inner: RwLock<ClientsInner>,
}

#[derive(Debug, Default)]
struct ClientsInner {
    active: Option<String>,
    clients: BTreeMap<String, Option<String>>,
}

impl Clients {
    /// Create an empty client set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open page
    pub fn open(&self, client_id: impl Into<String>) {
        let mut inner = self.inner.write();
        let controller = inner.active.clone();
        inner.clients.insert(client_id.into(), controller);
    }

    /// Forget a closed page. Returns whether it was open.
    pub fn close(&self, client_id: &str) -> bool {
        self.inner.write().clients.remove(client_id).is_some()
    }

    /// Version controlling `client_id`, if any
    pub fn controller_of(&self, client_id: &str) -> Option<String> {
        self.inner.read().clients.get(client_id).cloned().flatten()
    }

    /// Number of open pages
    pub fn len(&self) -> usize {
        self.inner.read().clients.len()
    }

    /// Whether no page is open
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take control of every open page for `version_id`.
    /// Returns the number of pages whose controller changed.
    pub fn claim(&self, version_id: &str) -> usize {
        let mut inner = self.inner.write();
        inner.active = Some(version_id.to_string());
        let mut changed = 0;
        for controller in inner.clients.values_mut() {
            if controller.as_deref() != Some(version_id) {
                *controller = Some(version_id.to_string());
                changed += 1;
            }
        }
        changed
    }
}
