//! Identity collaborators: read-only client and supplier lookups.
//!
//! The core never owns this data; the surrounding CRM keeps it. Only the
//! fields the core consumes are modeled here.

use std::collections::HashMap;
use std::sync::RwLock;

use frigoerp_core::{ClientId, SupplierId};

/// A buyer, as the credit evaluator and sale settlement see one.
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub credit_limit: f64,
    pub phone: Option<String>,
}

/// A cattle supplier. `prefix` seeds the human-readable batch ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub prefix: String,
    pub phone: Option<String>,
}

/// Read-only client lookup.
pub trait ClientRegistry: Send + Sync {
    fn client(&self, id: ClientId) -> Option<Client>;
}

/// Read-only supplier lookup.
pub trait SupplierRegistry: Send + Sync {
    fn supplier(&self, id: SupplierId) -> Option<Supplier>;
}

/// In-memory registry for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    clients: RwLock<HashMap<ClientId, Client>>,
    suppliers: RwLock<HashMap<SupplierId, Supplier>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&self, client: Client) {
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(client.id, client);
        }
    }

    pub fn add_supplier(&self, supplier: Supplier) {
        if let Ok(mut suppliers) = self.suppliers.write() {
            suppliers.insert(supplier.id, supplier);
        }
    }
}

impl ClientRegistry for InMemoryRegistry {
    fn client(&self, id: ClientId) -> Option<Client> {
        self.clients.read().ok()?.get(&id).cloned()
    }
}

impl SupplierRegistry for InMemoryRegistry {
    fn supplier(&self, id: SupplierId) -> Option<Supplier> {
        self.suppliers.read().ok()?.get(&id).cloned()
    }
}
