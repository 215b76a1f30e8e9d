//! Registry of configured download client adapters
//!
//! Built once from configuration; hands out adapters by id or protocol.
//! New backend kinds plug in by implementing [`DownloadClient`] and adding
//! a construction arm here.

use crate::clients::nzbget::NzbgetClient;
use crate::clients::sabnzbd::SabnzbdClient;
use crate::clients::{DownloadClient, DownloadProtocol};
use crate::config::{ClientKind, Config};
use crate::error::Error;
use crate::matcher::ReleaseMatcher;
use crate::types::ClientId;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// The set of configured download clients
pub struct ClientRegistry {
    clients: Vec<Arc<dyn DownloadClient>>,
}

impl ClientRegistry {
    /// Build adapters for every configured client
    ///
    /// # Errors
    ///
    /// Returns a configuration error for duplicate client ids or an
    /// incomplete client definition.
    pub fn from_config(config: &Config, matcher: Arc<dyn ReleaseMatcher>) -> crate::Result<Self> {
        let mut clients: Vec<Arc<dyn DownloadClient>> = Vec::with_capacity(config.clients.len());
        let mut seen_ids = HashSet::new();

        for client_config in &config.clients {
            if !seen_ids.insert(client_config.id) {
                return Err(Error::Config {
                    message: format!(
                        "duplicate download client id {} (\"{}\")",
                        client_config.id, client_config.name
                    ),
                    key: Some(format!("clients.{}.id", client_config.name)),
                });
            }

            let timeout = config.tracking.poll_timeout;
            let client: Arc<dyn DownloadClient> = match client_config.kind {
                ClientKind::Sabnzbd => Arc::new(SabnzbdClient::from_config(
                    client_config,
                    matcher.clone(),
                    timeout,
                )?),
                ClientKind::Nzbget => Arc::new(NzbgetClient::from_config(
                    client_config,
                    matcher.clone(),
                    timeout,
                )?),
            };

            info!(
                client = %client_config.name,
                kind = %client_config.kind,
                enabled = client_config.enable,
                "configured download client"
            );
            clients.push(client);
        }

        Ok(Self { clients })
    }

    /// Build a registry from pre-built adapters
    ///
    /// Ids must be unique; [`from_config`](Self::from_config) enforces this
    /// for configured clients.
    pub fn new(clients: Vec<Arc<dyn DownloadClient>>) -> Self {
        Self { clients }
    }

    /// All configured clients, in configuration order
    pub fn all(&self) -> &[Arc<dyn DownloadClient>] {
        &self.clients
    }

    /// Clients that participate in grabbing and tracking
    pub fn enabled(&self) -> impl Iterator<Item = &Arc<dyn DownloadClient>> {
        self.clients
            .iter()
            .filter(|client| client.definition().enable)
    }

    /// Look up a client by definition id
    pub fn get(&self, id: ClientId) -> Option<&Arc<dyn DownloadClient>> {
        self.clients
            .iter()
            .find(|client| client.definition().id == id)
    }

    /// First enabled client speaking the given protocol (grab target)
    pub fn first_for_protocol(
        &self,
        protocol: DownloadProtocol,
    ) -> Option<&Arc<dyn DownloadClient>> {
        self.enabled().find(|client| client.protocol() == protocol)
    }

    /// Number of configured clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no clients are configured
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
