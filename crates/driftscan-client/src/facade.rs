//! The resource client consumed by the scan orchestrator.
//!
//! [`ResourceClient`] wraps a [`Transport`] with the namespace cache,
//! one-time discovery, empty-result memoization, pagination, and the retry
//! policy. The orchestrator only sees the [`ClusterClient`] capability.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use driftscan_core::{ClusterInfo, RawObject, ResourceTypeSettings, RetryConfig};
use futures::stream::{self, StreamExt};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::{EmptyResultCache, NamespaceCache, DEFAULT_NAMESPACE_TTL};
use crate::error::{ClientError, Result};
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::transport::{ApiResourceInfo, PageRequest, Transport};

/// Objects requested per list page.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Which resource types to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceScope {
    /// Only namespaced resource types.
    Namespaced,
    /// Namespaced and cluster-scoped resource types.
    All,
}

/// The capability surface the scan orchestrator depends on.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// The kubeconfig context and cluster of this client.
    fn current_context(&self) -> ClusterInfo;

    /// List all namespace names.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace list cannot be retrieved.
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// List the resource types to scan, as `name` or `name.group`.
    ///
    /// # Errors
    ///
    /// Returns an error if resource discovery fails.
    async fn resource_types(&self, scope: ResourceScope) -> Result<Vec<String>>;

    /// Fetch every object of `types` in `namespace`.
    ///
    /// Individual type failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if resource discovery fails.
    async fn fetch_resources_batch(&self, types: &[String], namespace: &str)
        -> Result<Vec<RawObject>>;

    /// Check which of `names` exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace list cannot be retrieved.
    async fn validate_namespaces(&self, names: &[String]) -> Result<BTreeMap<String, bool>>;
}

/// A cached, retrying, paginating resource client.
pub struct ResourceClient<T> {
    transport: T,
    settings: ResourceTypeSettings,
    retry: RetryPolicy,
    page_size: u32,
    namespaces: NamespaceCache,
    empty_results: EmptyResultCache,
    discovery: OnceCell<Vec<ApiResourceInfo>>,
    namespaced_types: OnceCell<Vec<String>>,
    all_types: OnceCell<Vec<String>>,
}

impl<T: Transport> ResourceClient<T> {
    /// Create a client over `transport`.
    #[must_use]
    pub fn new(transport: T, settings: ResourceTypeSettings, retry: RetryConfig) -> Self {
        Self {
            transport,
            settings,
            retry: RetryPolicy::new(retry),
            page_size: DEFAULT_PAGE_SIZE,
            namespaces: NamespaceCache::new(DEFAULT_NAMESPACE_TTL),
            empty_results: EmptyResultCache::new(),
            discovery: OnceCell::new(),
            namespaced_types: OnceCell::new(),
            all_types: OnceCell::new(),
        }
    }

    /// Override the namespace cache time-to-live.
    #[must_use]
    pub fn with_namespace_ttl(mut self, ttl: Duration) -> Self {
        self.namespaces = NamespaceCache::new(ttl);
        self
    }

    /// Override the list page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The wrapped transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run API discovery once and reuse the result.
    ///
    /// A failed discovery leaves the cell empty so a later call can try again.
    async fn discovered(&self) -> Result<&[ApiResourceInfo]> {
        let resources = self
            .discovery
            .get_or_try_init(|| async {
                info!("Discovering API resources");
                let resources = self
                    .transport
                    .discover_resources()
                    .await
                    .map_err(ClientError::Discovery)?;
                info!(count = resources.len(), "API discovery complete");
                Ok::<_, ClientError>(resources)
            })
            .await?;
        Ok(resources.as_slice())
    }

    fn filter_types(&self, discovered: &[ApiResourceInfo], scope: ResourceScope) -> Vec<String> {
        let mut types: Vec<String> = discovered
            .iter()
            .filter(|r| !r.name.contains('/'))
            .filter(|r| r.supports_list())
            .filter(|r| scope == ResourceScope::All || r.namespaced)
            .filter(|r| !self.settings.is_skipped(&r.name, &r.group))
            .map(ApiResourceInfo::qualified_name)
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Fetch every object of one resource type in `namespace`.
    ///
    /// A pair that returned nothing before is answered from memory. Unknown
    /// types and fetches that stay transiently failing after every retry
    /// yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or the fetch fails permanently.
    pub async fn fetch_resources(
        &self,
        resource_type: &str,
        namespace: &str,
    ) -> Result<Vec<RawObject>> {
        if self.empty_results.is_empty_result(namespace, resource_type) {
            debug!(namespace = %namespace, resource_type = %resource_type, "Known empty, skipping");
            return Ok(Vec::new());
        }

        let discovered = self.discovered().await?;
        let Some(resource) = discovered.iter().find(|r| r.matches(resource_type)) else {
            debug!(resource_type = %resource_type, "Resource type not served by cluster");
            return Ok(Vec::new());
        };

        let label = format!("{namespace}:{resource_type}");
        match self
            .retry
            .execute(&label, || self.list_all(resource, namespace))
            .await
        {
            RetryOutcome::Success(items) => {
                if items.is_empty() {
                    self.empty_results.mark_empty(namespace, resource_type);
                }
                Ok(items)
            }
            RetryOutcome::Exhausted(err) => {
                warn!(
                    namespace = %namespace,
                    resource_type = %resource_type,
                    error = %err,
                    "Retries exhausted, treating as empty"
                );
                Ok(Vec::new())
            }
            RetryOutcome::Failed(err) => Err(err.into()),
        }
    }

    /// Follow continuation tokens until the list is complete.
    async fn list_all(
        &self,
        resource: &ApiResourceInfo,
        namespace: &str,
    ) -> std::result::Result<Vec<RawObject>, crate::TransportError> {
        let mut items = Vec::new();
        let mut request = PageRequest {
            limit: self.page_size,
            continue_token: None,
        };

        loop {
            let page = self.transport.list_page(resource, namespace, &request).await?;
            items.extend(page.items);

            match page.continue_token {
                Some(token) if !token.is_empty() => {
                    debug!(
                        namespace = %namespace,
                        resource = %resource.qualified_name(),
                        fetched = items.len(),
                        "Fetching next page"
                    );
                    request.continue_token = Some(token);
                }
                _ => return Ok(items),
            }
        }
    }
}

/// Parallel fetches for a batch of `type_count` resource types.
fn batch_workers(type_count: usize) -> usize {
    if type_count < 10 {
        type_count.max(1)
    } else if type_count > 50 {
        10
    } else {
        type_count.min(20)
    }
}

#[async_trait]
impl<T: Transport> ClusterClient for ResourceClient<T> {
    fn current_context(&self) -> ClusterInfo {
        self.transport.current_context()
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        if let Some(names) = self.namespaces.get() {
            return Ok(names);
        }

        let names = self.transport.list_namespaces().await?;
        debug!(count = names.len(), "Namespace list refreshed");
        self.namespaces.store(names.clone());
        Ok(names)
    }

    async fn resource_types(&self, scope: ResourceScope) -> Result<Vec<String>> {
        if let Some(important) = self.settings.important() {
            return Ok(important.to_vec());
        }

        let cell = match scope {
            ResourceScope::Namespaced => &self.namespaced_types,
            ResourceScope::All => &self.all_types,
        };

        let types = cell
            .get_or_try_init(|| async {
                let discovered = self.discovered().await?;
                Ok::<_, ClientError>(self.filter_types(discovered, scope))
            })
            .await?;
        Ok(types.clone())
    }

    async fn fetch_resources_batch(
        &self,
        types: &[String],
        namespace: &str,
    ) -> Result<Vec<RawObject>> {
        if types.is_empty() {
            return Ok(Vec::new());
        }

        // Discovery failure is fatal for the batch; everything after it is
        // best-effort per type.
        self.discovered().await?;

        let results: Vec<_> = stream::iter(types.iter().cloned())
            .map(|resource_type| async move {
                let result = self.fetch_resources(&resource_type, namespace).await;
                (resource_type, result)
            })
            .buffered(batch_workers(types.len()))
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut objects = Vec::new();
        for (resource_type, result) in results {
            match result {
                Ok(items) => {
                    for item in items {
                        let first_sighting = match item.uid() {
                            Some(uid) => seen.insert(uid.to_string()),
                            None => true,
                        };
                        if first_sighting {
                            objects.push(item);
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        namespace = %namespace,
                        resource_type = %resource_type,
                        error = %err,
                        "Skipping resource type"
                    );
                }
            }
        }

        Ok(objects)
    }

    async fn validate_namespaces(&self, names: &[String]) -> Result<BTreeMap<String, bool>> {
        let existing: HashSet<String> = self.list_namespaces().await?.into_iter().collect();
        Ok(names
            .iter()
            .map(|name| (name.clone(), existing.contains(name)))
            .collect())
    }
}
