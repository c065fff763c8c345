//! Client-side service lookup through the control plane.
//!
//! A plugin that calls another service asks the registry for its instances,
//! lets the router narrow them down, and optionally fetches the TLS root it
//! should trust from the service's configuration group.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::app::control_plane::{ControlPlane, ServiceInstance};
use crate::config::ConfigError;

/// Document fetched from the service's group when TLS is requested.
pub const TLS_ROOT_DOCUMENT: &str = "tls-root.toml";

/// Trust anchor for a subscribed service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TlsRoot {
    /// PEM-encoded root certificate.
    pub root_ca: String,
    /// Name to verify the server certificate against; the service name when
    /// omitted.
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Routable endpoints for one service.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub service: String,
    pub instances: Vec<ServiceInstance>,
    pub tls: Option<TlsRoot>,
}

impl Subscription {
    /// Every endpoint of every selected instance, in instance order.
    pub fn endpoints(&self) -> Vec<Url> {
        self.instances
            .iter()
            .flat_map(|instance| instance.endpoints.iter().cloned())
            .collect()
    }

    /// Name the client should verify server certificates against.
    pub fn server_name(&self) -> &str {
        self.tls
            .as_ref()
            .and_then(|tls| tls.server_name.as_deref())
            .unwrap_or(&self.service)
    }
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("no routable instance of service '{0}'")]
    NoInstances(String),

    #[error("TLS root for service '{service}': {source}")]
    Tls {
        service: String,
        #[source]
        source: ConfigError,
    },
}

/// Resolve `service` to routable instances, with its TLS root when `tls` is
/// set.
pub fn subscribe(control_plane: &dyn ControlPlane, service: &str, tls: bool) -> Result<Subscription, SubscribeError> {
    let discovered = control_plane.discover(service);
    let total = discovered.len();
    let instances = control_plane.select(service, discovered);
    if instances.iter().all(|instance| instance.endpoints.is_empty()) {
        tracing::warn!(service, discovered = total, "No routable instance");
        return Err(SubscribeError::NoInstances(service.to_string()));
    }

    let tls = if tls {
        let root = control_plane
            .fetch(TLS_ROOT_DOCUMENT, service)
            .and_then(|document| document.scan::<TlsRoot>())
            .map_err(|source| SubscribeError::Tls {
                service: service.to_string(),
                source,
            })?;
        Some(root)
    } else {
        None
    };

    tracing::debug!(service, discovered = total, selected = instances.len(), tls = tls.is_some(), "Subscribed");
    Ok(Subscription {
        service: service.to_string(),
        instances,
        tls,
    })
}
