//! Bucket client registry
//!
//! Maps bucket names to clients. Clients are built on first use through a
//! [`ClientFactory`] and cached for the life of the registry.
//!
//! Each name owns a `OnceCell`. The map lock is held only long enough to find
//! or insert that cell, so building one bucket's client never blocks calls
//! for another, and concurrent first calls for the same bucket build exactly
//! one client. A failed build leaves the cell empty for a later retry.

use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::protocol::s3::{ObjectStore, S3Client, S3Config, S3Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

/// Builds the client for one bucket's credentials
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    type Client: ObjectStore;

    async fn create(&self, config: &S3Config) -> S3Result<Self::Client>;
}

/// Factory for AWS SDK backed clients
#[derive(Debug, Clone, Copy, Default)]
pub struct S3ClientFactory;

#[async_trait]
impl ClientFactory for S3ClientFactory {
    type Client = S3Client;

    async fn create(&self, config: &S3Config) -> S3Result<S3Client> {
        S3Client::new(config.clone()).await
    }
}

type Slot<C> = Arc<OnceCell<Arc<C>>>;

/// Registry of per-bucket clients
///
/// # Example
///
/// ```no_run
/// use bucket_hub::config::HubConfig;
/// use bucket_hub::registry::ClientRegistry;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = HubConfig::from_json(r#"{"bucket":"logs","region":"us-east-1"}"#)?;
///     let registry = ClientRegistry::new(config)?;
///
///     let client = registry.resolve(None).await?;
///     let again = registry.resolve(Some("logs")).await?;
///     assert!(std::sync::Arc::ptr_eq(&client, &again));
///     Ok(())
/// }
/// ```
pub struct ClientRegistry<F: ClientFactory = S3ClientFactory> {
    config: HubConfig,
    factory: F,
    clients: Mutex<HashMap<String, Slot<F::Client>>>,
}

impl ClientRegistry<S3ClientFactory> {
    /// Create a registry building AWS SDK clients
    pub fn new(config: HubConfig) -> Result<Self> {
        Self::with_factory(config, S3ClientFactory)
    }
}

impl<F: ClientFactory> ClientRegistry<F> {
    /// Create a registry with a custom client factory
    pub fn with_factory(config: HubConfig, factory: F) -> Result<Self> {
        let config = config.normalized();
        config.validate()?;

        Ok(Self {
            config,
            factory,
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// The configuration the registry serves
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Bucket used when a call names none
    pub fn default_bucket(&self) -> Option<&str> {
        self.config.default_bucket()
    }

    /// All bucket names a client can be resolved for
    pub fn configured_buckets(&self) -> Vec<String> {
        self.config.configured_buckets()
    }

    /// Bucket names whose client has been built, sorted
    pub async fn cached_buckets(&self) -> Vec<String> {
        let clients = self.clients.lock().await;
        let mut names: Vec<String> = clients
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Client for `bucket`, or for the default bucket when `bucket` is absent
    /// or empty
    ///
    /// Fails with `NoDefaultBucket` or `UnknownBucket` before any request is
    /// sent, and with `ClientInit` when the client cannot be built.
    pub async fn resolve(&self, bucket: Option<&str>) -> Result<Arc<F::Client>> {
        let name = match bucket.filter(|b| !b.is_empty()) {
            Some(name) => name,
            None => self
                .config
                .default_bucket()
                .ok_or(HubError::NoDefaultBucket)?,
        };

        let credentials = self
            .config
            .credentials_for(name)
            .ok_or_else(|| HubError::UnknownBucket(name.to_string()))?;

        let slot = {
            let mut clients = self.clients.lock().await;
            clients.entry(name.to_string()).or_default().clone()
        };

        slot.get_or_try_init(|| async {
            debug!(bucket = name, "building storage client");
            let client = self
                .factory
                .create(credentials)
                .await
                .map_err(|source| HubError::ClientInit {
                    bucket: name.to_string(),
                    source,
                })?;
            info!(bucket = name, target_bucket = %credentials.bucket, "storage client ready");
            Ok::<_, HubError>(Arc::new(client))
        })
        .await
        .cloned()
    }

    /// Build the default bucket's client now, if there is a default
    pub async fn warm_default(&self) -> Result<Option<Arc<F::Client>>> {
        match self.config.default_bucket() {
            Some(_) => self.resolve(None).await.map(Some),
            None => Ok(None),
        }
    }
}

impl<F: ClientFactory> fmt::Debug for ClientRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("buckets", &self.config.configured_buckets())
            .field("default_bucket", &self.config.default_bucket())
            .finish_non_exhaustive()
    }
}
