//! Transport over a live cluster connection.
//!
//! [`KubeTransport`] talks to a real API server through `kube`. Objects are
//! listed as [`DynamicObject`]s and handed back as [`RawObject`]s.

use std::time::Duration;

use async_trait::async_trait;
use driftscan_core::{ClusterInfo, RawObject};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::GroupVersionKind;
use kube::discovery::{ApiResource, Discovery, Scope};
use kube::{Client, Config};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ClientError, Result, TransportError};
use crate::transport::{ApiResourceInfo, PageRequest, ResourcePage, Transport};

/// Read timeout applied to every API request.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for listing namespaces.
const NAMESPACE_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// A [`Transport`] backed by a `kube` client.
#[derive(Clone)]
pub struct KubeTransport {
    client: Client,
    info: ClusterInfo,
}

impl std::fmt::Debug for KubeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeTransport")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl KubeTransport {
    /// Connect using the kubeconfig, optionally selecting a context.
    ///
    /// Without an explicit context, the kubeconfig's current context is
    /// used, falling back to in-cluster configuration when no kubeconfig
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the context does not exist or no client
    /// configuration can be built.
    pub async fn connect(context: Option<&str>) -> Result<Self> {
        let (mut config, info) = match Kubeconfig::read() {
            Ok(kubeconfig) => {
                let context_name = context
                    .map(ToString::to_string)
                    .or_else(|| kubeconfig.current_context.clone())
                    .unwrap_or_default();

                let named = kubeconfig.contexts.iter().find(|c| c.name == context_name);
                if context.is_some() && named.is_none() {
                    return Err(ClientError::ContextNotFound(context_name));
                }
                let cluster = named
                    .and_then(|c| c.context.as_ref())
                    .map(|c| c.cluster.clone())
                    .unwrap_or_default();

                let config = Config::from_custom_kubeconfig(
                    kubeconfig,
                    &KubeConfigOptions {
                        context: context.map(ToString::to_string),
                        ..Default::default()
                    },
                )
                .await?;

                (config, ClusterInfo::new(context_name, cluster))
            }
            Err(err) if context.is_none() => {
                debug!(error = %err, "No kubeconfig, trying in-cluster configuration");
                let config = Config::infer().await?;
                (config, ClusterInfo::new("in-cluster", ""))
            }
            Err(err) => return Err(err.into()),
        };

        config.read_timeout = Some(READ_TIMEOUT);
        let client = Client::try_from(config)?;

        info!(context = %info.context, cluster = %info.cluster, "Connected to cluster");
        Ok(Self { client, info })
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn with_client(client: Client, info: ClusterInfo) -> Self {
        Self { client, info }
    }

    fn api_for(&self, resource: &ApiResourceInfo, namespace: &str) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind);
        let api_resource = ApiResource::from_gvk_with_plural(&gvk, &resource.name);
        if resource.namespaced {
            Api::namespaced_with(self.client.clone(), namespace, &api_resource)
        } else {
            Api::all_with(self.client.clone(), &api_resource)
        }
    }
}

/// Serialize a listed object, restoring `apiVersion` and `kind` that list
/// responses omit on items.
fn to_raw(
    object: &DynamicObject,
    resource: &ApiResourceInfo,
) -> std::result::Result<RawObject, TransportError> {
    let mut value =
        serde_json::to_value(object).map_err(|e| TransportError::Other(e.to_string()))?;
    if let Value::Object(map) = &mut value {
        map.entry("apiVersion")
            .or_insert_with(|| Value::String(resource.api_version()));
        map.entry("kind")
            .or_insert_with(|| Value::String(resource.kind.clone()));
    }
    RawObject::from_value(value).map_err(|e| TransportError::Other(e.to_string()))
}

#[async_trait]
impl Transport for KubeTransport {
    fn current_context(&self) -> ClusterInfo {
        self.info.clone()
    }

    async fn list_namespaces(&self) -> std::result::Result<Vec<String>, TransportError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = tokio::time::timeout(NAMESPACE_LIST_TIMEOUT, api.list(&ListParams::default()))
            .await
            .map_err(|_| TransportError::Timeout(NAMESPACE_LIST_TIMEOUT))??;

        Ok(list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    async fn discover_resources(
        &self,
    ) -> std::result::Result<Vec<ApiResourceInfo>, TransportError> {
        let discovery = Discovery::new(self.client.clone()).run().await?;

        let mut resources = Vec::new();
        for group in discovery.groups() {
            for (api_resource, caps) in group.recommended_resources() {
                resources.push(ApiResourceInfo {
                    name: api_resource.plural,
                    group: api_resource.group,
                    version: api_resource.version,
                    kind: api_resource.kind,
                    namespaced: matches!(caps.scope, Scope::Namespaced),
                    verbs: caps.operations,
                });
            }
        }

        debug!(count = resources.len(), "Discovered API resources");
        Ok(resources)
    }

    async fn list_page(
        &self,
        resource: &ApiResourceInfo,
        namespace: &str,
        page: &PageRequest,
    ) -> std::result::Result<ResourcePage, TransportError> {
        let api = self.api_for(resource, namespace);

        let mut params = ListParams::default().limit(page.limit);
        if let Some(token) = &page.continue_token {
            params = params.continue_token(token);
        }

        let list = api.list(&params).await?;
        let items = list
            .items
            .iter()
            .map(|object| to_raw(object, resource))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ResourcePage {
            items,
            continue_token: list.metadata.continue_.filter(|token| !token.is_empty()),
        })
    }
}
