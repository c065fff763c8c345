//! The capability contract every plugin implements.

use std::any::Any;
use std::sync::Arc;

use crate::plugin::context::LoadContext;
use crate::plugin::error::{BoxError, PluginError, PluginResult};

/// Type-erasure hooks used by typed accessors. Implemented for every sized
/// `'static` type, so plugins never write it by hand.
pub trait AsAny: Any + Send + Sync {
    /// Borrow as `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared handle into a shared `Any`.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// An optional, independently loadable subsystem.
///
/// Instances are shared (`Arc<dyn Plugin>`), so `load` and `unload` take
/// `&self` and implementations keep their resources behind interior
/// mutability.
pub trait Plugin: AsAny {
    /// Stable identifier, unique within the process.
    fn name(&self) -> &str;

    /// Load priority. Higher loads earlier.
    fn weight(&self) -> i32;

    /// Acquire resources using this plugin's configuration subtree.
    ///
    /// Never called twice without an `unload` in between.
    fn load(&self, ctx: &LoadContext<'_>) -> Result<(), BoxError>;

    /// Release everything `load` acquired.
    ///
    /// Must tolerate a `load` that failed halfway or never ran.
    fn unload(&self) -> Result<(), BoxError>;
}

impl std::fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name())
            .field("weight", &self.weight())
            .finish_non_exhaustive()
    }
}

/// Borrow `plugin` as its concrete type `T`.
pub fn downcast<T: Plugin>(plugin: &dyn Plugin) -> PluginResult<&T> {
    plugin
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| kind_mismatch::<T>(plugin))
}

/// Convert a shared handle into a shared handle of its concrete type `T`.
pub fn downcast_arc<T: Plugin>(plugin: Arc<dyn Plugin>) -> PluginResult<Arc<T>> {
    let err = kind_mismatch::<T>(plugin.as_ref());
    plugin.into_any_arc().downcast::<T>().map_err(|_| err)
}

fn kind_mismatch<T: Plugin>(plugin: &dyn Plugin) -> PluginError {
    PluginError::KindMismatch {
        name: plugin.name().to_string(),
        expected: std::any::type_name::<T>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::testing::Probe;

    struct Other;

    impl Plugin for Other {
        fn name(&self) -> &str {
            "other"
        }
        fn weight(&self) -> i32 {
            0
        }
        fn load(&self, _ctx: &LoadContext<'_>) -> Result<(), BoxError> {
            Ok(())
        }
        fn unload(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_downcast_matching_kind() {
        let plugin: Arc<dyn Plugin> = Arc::new(Probe::new("a", 10));
        let probe = downcast::<Probe>(plugin.as_ref()).unwrap();
        assert_eq!(probe.name(), "a");

        let typed = downcast_arc::<Probe>(plugin).unwrap();
        assert_eq!(typed.weight(), 10);
    }

    #[test]
    fn test_downcast_other_kind() {
        let plugin: Arc<dyn Plugin> = Arc::new(Other);
        let err = downcast::<Probe>(plugin.as_ref()).unwrap_err();
        assert!(matches!(err, PluginError::KindMismatch { ref name, .. } if name == "other"));

        assert!(downcast_arc::<Probe>(plugin).is_err());
    }
}
