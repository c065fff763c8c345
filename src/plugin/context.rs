//! What a plugin can see while it loads.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::app::control_plane::ControlPlane;
use crate::config::ConfigValue;

/// Read-only identity and shared facilities of the host process.
#[derive(Clone, Serialize)]
pub struct HostInfo {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Host name the process runs on.
    pub host: String,
    /// Unique id of this process instance.
    pub instance_id: Uuid,
    #[serde(skip)]
    control_plane: Option<Arc<dyn ControlPlane>>,
}

impl HostInfo {
    /// Identity with a fresh instance id and no control plane.
    pub fn new(name: impl Into<String>, version: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            host: host.into(),
            instance_id: Uuid::new_v4(),
            control_plane: None,
        }
    }

    /// Attach a control plane.
    pub fn with_control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(control_plane);
        self
    }

    /// The control plane, if the host has one.
    pub fn control_plane(&self) -> Option<&Arc<dyn ControlPlane>> {
        self.control_plane.as_ref()
    }
}

impl Default for HostInfo {
    fn default() -> Self {
        Self::new("plughost", env!("CARGO_PKG_VERSION"), "localhost")
    }
}

impl std::fmt::Debug for HostInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostInfo")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("host", &self.host)
            .field("instance_id", &self.instance_id)
            .field("control_plane", &self.control_plane.is_some())
            .finish()
    }
}

/// Argument to [`Plugin::load`](crate::plugin::Plugin::load).
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    config: &'a ConfigValue,
    host: &'a HostInfo,
}

impl<'a> LoadContext<'a> {
    pub fn new(config: &'a ConfigValue, host: &'a HostInfo) -> Self {
        Self { config, host }
    }

    /// This plugin's configuration subtree. May be absent.
    pub fn config(&self) -> &'a ConfigValue {
        self.config
    }

    /// Host identity.
    pub fn host(&self) -> &'a HostInfo {
        self.host
    }

    /// Shortcut for `host().control_plane()`.
    pub fn control_plane(&self) -> Option<&'a Arc<dyn ControlPlane>> {
        self.host.control_plane()
    }
}
