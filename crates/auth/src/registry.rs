//! Per-client-id instance registry
//!
//! At most one [`AuthorizationClient`] exists per client identifier within a
//! registry. The first request for an identifier creates the client and
//! schedules its bootstrap; later requests return the same instance and
//! ignore the options they pass.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::client::AuthorizationClient;
use crate::config::ClientOptions;
use crate::error::AuthError;

#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<DashMap<String, AuthorizationClient>>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Client for `client_id`, created on first use
    ///
    /// A newly created client has its bootstrap spawned on the ambient tokio
    /// runtime (see [`AuthorizationClient::schedule_bootstrap`]).
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] if a new client cannot be built from
    /// `options`
    pub fn get(
        &self,
        client_id: &str,
        options: ClientOptions,
    ) -> Result<AuthorizationClient, AuthError> {
        let created = match self.clients.entry(client_id.to_string()) {
            Entry::Occupied(existing) => {
                debug!(client_id, "reusing client, options ignored");
                return Ok(existing.get().clone());
            }
            Entry::Vacant(slot) => {
                let client = AuthorizationClient::new(client_id, options)?;
                slot.insert(client.clone());
                client
            }
        };

        debug!(client_id, instance_id = created.instance_id(), "client created");
        created.schedule_bootstrap();
        Ok(created)
    }

    /// Existing client for `client_id`, if any
    #[must_use]
    pub fn lookup(&self, client_id: &str) -> Option<AuthorizationClient> {
        self.clients.get(client_id).map(|client| client.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
