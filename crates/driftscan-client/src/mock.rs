//! A mock transport for testing without a real Kubernetes cluster.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use driftscan_core::{ClusterInfo, RawObject};
use parking_lot::Mutex;

use crate::error::TransportError;
use crate::transport::{ApiResourceInfo, PageRequest, ResourcePage, Transport};

type Key = (String, String);

fn key(namespace: &str, resource_type: &str) -> Key {
    (namespace.to_string(), resource_type.to_string())
}

/// A transport that serves namespaces, discovery entries and objects from
/// memory.
///
/// Objects are registered per `(namespace, qualified resource name)`, e.g.
/// `("shop", "deployments.apps")`. Failures can be scripted per pair and are
/// returned before any objects are served, either on the next call or on the
/// next call that continues a paginated list.
#[derive(Default)]
pub struct MockTransport {
    context: ClusterInfo,
    namespaces: Mutex<Vec<String>>,
    resources: Mutex<Vec<ApiResourceInfo>>,
    objects: Mutex<HashMap<Key, Vec<RawObject>>>,
    failures: Mutex<HashMap<Key, VecDeque<TransportError>>>,
    continue_failures: Mutex<HashMap<Key, VecDeque<TransportError>>>,
    discovery_failures: Mutex<VecDeque<TransportError>>,
    namespace_failures: Mutex<VecDeque<TransportError>>,
    list_calls: Mutex<HashMap<Key, usize>>,
    namespace_calls: AtomicUsize,
    discovery_calls: AtomicUsize,
}

impl MockTransport {
    /// Create an empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock transport reporting the given cluster identity.
    #[must_use]
    pub fn with_context(context: ClusterInfo) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    /// Add a namespace.
    pub fn add_namespace(&self, namespace: &str) {
        self.namespaces.lock().push(namespace.to_string());
    }

    /// Add a discovery entry.
    pub fn add_resource(&self, resource: ApiResourceInfo) {
        self.resources.lock().push(resource);
    }

    /// Add an object of `resource_type` to `namespace`.
    pub fn add_object(&self, namespace: &str, resource_type: &str, object: RawObject) {
        self.objects
            .lock()
            .entry(key(namespace, resource_type))
            .or_default()
            .push(object);
    }

    /// Make the next list call for the pair fail with `error`.
    ///
    /// Calls queue up: scripting two failures fails the next two calls.
    pub fn fail_next(&self, namespace: &str, resource_type: &str, error: TransportError) {
        self.failures
            .lock()
            .entry(key(namespace, resource_type))
            .or_default()
            .push_back(error);
    }

    /// Make the next list call for the pair that carries a continue token
    /// fail with `error`. First-page calls are served normally.
    pub fn fail_on_continue(&self, namespace: &str, resource_type: &str, error: TransportError) {
        self.continue_failures
            .lock()
            .entry(key(namespace, resource_type))
            .or_default()
            .push_back(error);
    }

    /// Make the next discovery call fail with `error`.
    pub fn fail_discovery(&self, error: TransportError) {
        self.discovery_failures.lock().push_back(error);
    }

    /// Make the next namespace list call fail with `error`.
    pub fn fail_namespaces(&self, error: TransportError) {
        self.namespace_failures.lock().push_back(error);
    }

    /// Number of list calls made for the pair.
    #[must_use]
    pub fn list_calls(&self, namespace: &str, resource_type: &str) -> usize {
        self.list_calls
            .lock()
            .get(&key(namespace, resource_type))
            .copied()
            .unwrap_or(0)
    }

    /// Number of list calls made for any pair.
    #[must_use]
    pub fn total_list_calls(&self) -> usize {
        self.list_calls.lock().values().sum()
    }

    /// Number of namespace list calls.
    #[must_use]
    pub fn namespace_calls(&self) -> usize {
        self.namespace_calls.load(Ordering::SeqCst)
    }

    /// Number of discovery calls.
    #[must_use]
    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn current_context(&self) -> ClusterInfo {
        self.context.clone()
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, TransportError> {
        self.namespace_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.namespace_failures.lock().pop_front() {
            return Err(err);
        }
        Ok(self.namespaces.lock().clone())
    }

    async fn discover_resources(&self) -> Result<Vec<ApiResourceInfo>, TransportError> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.discovery_failures.lock().pop_front() {
            return Err(err);
        }
        Ok(self.resources.lock().clone())
    }

    async fn list_page(
        &self,
        resource: &ApiResourceInfo,
        namespace: &str,
        page: &PageRequest,
    ) -> Result<ResourcePage, TransportError> {
        let pair = key(namespace, &resource.qualified_name());
        *self.list_calls.lock().entry(pair.clone()).or_default() += 1;

        if let Some(err) = self
            .failures
            .lock()
            .get_mut(&pair)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        if page.continue_token.is_some() {
            if let Some(err) = self
                .continue_failures
                .lock()
                .get_mut(&pair)
                .and_then(VecDeque::pop_front)
            {
                return Err(err);
            }
        }

        let objects = self.objects.lock();
        let all = objects.get(&pair).map(Vec::as_slice).unwrap_or_default();

        let start = match &page.continue_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| TransportError::Api {
                    code: 410,
                    message: format!("invalid continue token {token}"),
                })?,
            None => 0,
        };
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX).max(1);
        let end = start.saturating_add(limit).min(all.len());
        let start = start.min(end);

        Ok(ResourcePage {
            items: all[start..end].to_vec(),
            continue_token: (end < all.len()).then(|| end.to_string()),
        })
    }
}
