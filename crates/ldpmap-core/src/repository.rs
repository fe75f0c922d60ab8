use std::sync::Arc;

use ldpmap_transport::{HttpTransport, InMemoryLdpServer, LdpTransport};
use ldpmap_types::ResourceUri;
use tracing::info;
use uuid::Uuid;

use crate::config::RepositoryConfig;
use crate::error::CoreResult;

/// Connection context shared by every object and file.
///
/// Cheap to clone. Carries the configuration and transport explicitly so
/// nothing in the mapping layer reads process-wide state.
#[derive(Clone)]
pub struct Repository {
    config: Arc<RepositoryConfig>,
    base_uri: ResourceUri,
    transport: Arc<dyn LdpTransport>,
}

impl Repository {
    pub fn new(config: RepositoryConfig, transport: Arc<dyn LdpTransport>) -> CoreResult<Self> {
        let base_uri = config.base_uri()?;
        Ok(Self {
            config: Arc::new(config),
            base_uri,
            transport,
        })
    }

    /// Talk to a live server over HTTP.
    pub fn connect(config: RepositoryConfig) -> CoreResult<Self> {
        let transport = HttpTransport::new(config.request_timeout())?;
        let repo = Self::new(config, Arc::new(transport))?;
        info!(base_uri = %repo.base_uri, "connected to repository");
        Ok(repo)
    }

    /// Back the repository with a fresh [`InMemoryLdpServer`], returned
    /// alongside so callers can inspect what was written.
    pub fn in_memory(config: RepositoryConfig) -> CoreResult<(Self, Arc<InMemoryLdpServer>)> {
        let server = Arc::new(InMemoryLdpServer::new());
        let repo = Self::new(config, server.clone())?;
        Ok((repo, server))
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn base_uri(&self) -> &ResourceUri {
        &self.base_uri
    }

    pub fn transport(&self) -> &dyn LdpTransport {
        self.transport.as_ref()
    }

    /// URI of the object with the given id.
    pub fn uri_for_id(&self, id: &str) -> ResourceUri {
        self.base_uri.join(id)
    }

    /// A fresh, unused URI directly below the base.
    pub fn mint_uri(&self) -> ResourceUri {
        self.uri_for_id(&Uuid::new_v4().to_string())
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("base_uri", &self.base_uri)
            .finish()
    }
}
