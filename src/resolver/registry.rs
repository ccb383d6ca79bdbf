//! The bundle registry built from parsed configs.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::bundle::Bundle;
use crate::compress::Compressors;
use crate::config::{Config, ConfigError, ResolverOptions, is_reserved};

/// Bundles of every config source, in declaration order.
#[derive(Debug, Default)]
pub struct Registry {
    bundles: Vec<Arc<Bundle>>,
    index: FxHashMap<String, usize>,
}

impl Registry {
    /// Build bundles for `configs`.
    ///
    /// Names must be unique across all configs and not reserved. A bundle
    /// whose settings are unchanged from `previous` is seeded with that
    /// bundle's current collections, except those of an origin whose
    /// settings changed.
    pub fn build(
        configs: Vec<Config>,
        options: &ResolverOptions,
        compressors: Option<&Compressors>,
        previous: Option<&Registry>,
    ) -> Result<Self, ConfigError> {
        let mut bundles = Vec::new();
        let mut index = FxHashMap::default();
        let mut sources: FxHashMap<String, String> = FxHashMap::default();

        for config in configs {
            let source = config.source.full_path();
            for bundle in config.bundles {
                if is_reserved(&bundle.name) {
                    return Err(ConfigError::Validation(format!(
                        "bundle name `{}` in `{}` is reserved",
                        bundle.name, source
                    )));
                }
                if let Some(first) = sources.get(&bundle.name) {
                    return Err(ConfigError::DuplicateBundle {
                        name: bundle.name,
                        first: first.clone(),
                        second: source,
                    });
                }
                sources.insert(bundle.name.clone(), source.clone());
                index.insert(bundle.name.clone(), bundles.len());

                let mut built = Bundle::new(bundle, options);
                if let Some(compressors) = compressors {
                    built = built.with_compressors(compressors.clone());
                }
                bundles.push(Arc::new(built));
            }
        }

        let registry = Self { bundles, index };
        if let Some(previous) = previous {
            registry.carry_over(previous);
        }
        Ok(registry)
    }

    fn carry_over(&self, previous: &Registry) {
        let unchanged: FxHashSet<&str> = self
            .bundles
            .iter()
            .filter(|b| {
                previous
                    .get(b.name())
                    .is_some_and(|old| old.config().same_settings(b.config()))
            })
            .map(|b| b.name())
            .collect();

        for bundle in &self.bundles {
            if !unchanged.contains(bundle.name()) {
                continue;
            }
            let Some(mut retired) = previous.get(bundle.name()).and_then(|old| old.snapshot())
            else {
                continue;
            };
            retired.retain_origins(|origin| unchanged.contains(origin));
            if !retired.is_empty() {
                bundle.seed(retired);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Bundle>> {
        self.index.get(name).map(|&i| &self.bundles[i])
    }

    pub fn bundles(&self) -> &[Arc<Bundle>] {
        &self.bundles
    }

    /// The bundle owning `path` (`<name>/...`), scanning in declaration
    /// order.
    pub fn route(&self, path: &str) -> Option<&Arc<Bundle>> {
        self.bundles.iter().find(|b| {
            path.strip_prefix(b.name())
                .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BundleConfig;
    use crate::resource::{ByteResource, ResourceRef};

    fn config(source: &str, names: &[&str]) -> Config {
        let source: ResourceRef = Arc::new(ByteResource::new("", source, Vec::new(), 1));
        Config {
            bundles: names
                .iter()
                .map(|n| BundleConfig::new(*n, "/site", source.clone()))
                .collect(),
            source,
        }
    }

    #[test]
    fn test_routes_by_name_prefix() {
        let registry = Registry::build(
            vec![config("a.toml", &["core", "core2"])],
            &ResolverOptions::default(),
            None,
            None,
        )
        .unwrap();

        assert_eq!(registry.route("core/a.js").unwrap().name(), "core");
        assert_eq!(registry.route("core2/a.js").unwrap().name(), "core2");
        assert!(registry.route("core").is_none());
        assert!(registry.route("corex/a.js").is_none());
        assert!(registry.get("core2").is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_across_configs_names_both() {
        let err = Registry::build(
            vec![config("a.toml", &["core"]), config("b.json", &["core"])],
            &ResolverOptions::default(),
            None,
            None,
        )
        .unwrap_err();
        match err {
            ConfigError::DuplicateBundle { name, first, second } => {
                assert_eq!(name, "core");
                assert_eq!(first, "a.toml");
                assert_eq!(second, "b.json");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_reserved_rejected() {
        let err = Registry::build(
            vec![config("a.toml", &["True"])],
            &ResolverOptions::default(),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
