//! Built-in plugins.
//!
//! | Plugin    | Section     | Weight |
//! |-----------|-------------|--------|
//! | `metrics` | `[metrics]` | 700    |
//! | `http`    | `[http]`    | 500    |
//! | `cache`   | `[cache]`   | 300    |

pub mod cache;
pub mod http;
pub mod metrics;

use crate::plugin::PluginFactory;

/// Register every built-in plugin and bind it to its section.
pub fn register_builtin(factory: &mut PluginFactory) {
    factory.register_for_section(metrics::SECTION, metrics::NAME, || Box::new(metrics::MetricsPlugin::new()));
    factory.register_for_section(http::SECTION, http::NAME, || Box::new(http::HttpPlugin::new()));
    factory.register_for_section(cache::SECTION, cache::NAME, || Box::new(cache::CachePlugin::new()));
}

/// A factory holding only the built-in plugins.
pub fn builtin_factory() -> PluginFactory {
    let mut factory = PluginFactory::new();
    register_builtin(&mut factory);
    factory
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registration() {
        let factory = builtin_factory();
        assert_eq!(factory.names(), vec!["cache", "http", "metrics"]);

        for name in ["cache", "http", "metrics"] {
            let plugin = factory.create(name).unwrap();
            assert_eq!(plugin.name(), name);
        }
        assert_eq!(
            factory.registration_table().iter().map(|(s, _)| s).collect::<Vec<_>>(),
            vec!["metrics", "http", "cache"]
        );
    }
}
