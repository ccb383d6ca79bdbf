//! Top-level path resolution across every configured bundle.
//!
//! The [`Resolver`] owns the config sources and an atomically swapped
//! [`Registry`] of bundles built from them. Components that need to
//! resolve further paths (bundle builds, the requires graph) receive it as
//! a `&dyn Resolve`.
//!
//! # Reloading
//!
//! The registry is loaded on first use. [`Resolver::poll`] checks the
//! config sources and reloads when one changed; a failed reload keeps the
//! previous registry serving and is retried on the next poll.

mod registry;

pub use registry::Registry;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::bundle::Bundle;
use crate::collection::CollectionSummary;
use crate::compress::Compressors;
use crate::config::{Config, ConfigError, ResolverOptions};
use crate::error::{BundleError, Result};
use crate::resource::{FileResource, MISSING, Resource, ResourceRef};
use crate::utils::path::logical;
use crate::{debug, log};

/// Path → resource lookup.
pub trait Resolve: Sync {
    /// Resolve a root-relative path.
    ///
    /// `Ok(None)` means no bundle serves the path. Malformed paths are
    /// [`BundleError::InvalidPath`].
    fn resolve(&self, path: &str) -> Result<Option<ResourceRef>>;
}

#[derive(Debug)]
enum Sources {
    /// Config files, re-parsed on change.
    Files(Vec<Arc<FileResource>>),
    /// Already parsed configs.
    Parsed(Vec<Config>),
}

/// Result of one [`Resolver::poll`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// The registry was rebuilt from changed config sources.
    pub reloaded: bool,
    /// Bundles whose collections were invalidated.
    pub modified: Vec<String>,
}

impl PollOutcome {
    pub fn is_empty(&self) -> bool {
        !self.reloaded && self.modified.is_empty()
    }
}

/// Registry of all bundles, reloaded from its config sources.
#[derive(Debug)]
pub struct Resolver {
    sources: Sources,
    options: ResolverOptions,
    compressors: Option<Compressors>,
    registry: ArcSwapOption<Registry>,
    stale: AtomicBool,
    reload_lock: Mutex<()>,
}

impl Resolver {
    /// A resolver over config files.
    pub fn new(files: Vec<PathBuf>, options: ResolverOptions) -> Self {
        let sources = files
            .iter()
            .map(|file| Arc::new(FileResource::at(file)))
            .collect();
        Self::with_sources(Sources::Files(sources), options)
    }

    /// A resolver over already parsed configs.
    pub fn with_configs(configs: Vec<Config>, options: ResolverOptions) -> Self {
        Self::with_sources(Sources::Parsed(configs), options)
    }

    fn with_sources(sources: Sources, options: ResolverOptions) -> Self {
        Self {
            sources,
            options,
            compressors: None,
            registry: ArcSwapOption::empty(),
            stale: AtomicBool::new(true),
            reload_lock: Mutex::new(()),
        }
    }

    /// Use `compressors` for every bundle instead of the minifiers.
    pub fn with_compressors(mut self, compressors: Compressors) -> Self {
        self.compressors = Some(compressors);
        self
    }

    pub const fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// The current registry, loading it on first use.
    pub fn registry(&self) -> Result<Arc<Registry>> {
        if let Some(registry) = self.registry.load_full() {
            return Ok(registry);
        }
        self.reload(false)
    }

    /// Rebuild the registry if it is missing or marked stale (or `force`).
    ///
    /// On failure the previous registry, if any, stays in place.
    fn reload(&self, force: bool) -> Result<Arc<Registry>> {
        let _guard = self.reload_lock.lock();
        let previous = self.registry.load_full();
        if let Some(current) = &previous
            && !force
            && !self.stale.load(Ordering::Acquire)
        {
            return Ok(Arc::clone(current));
        }

        let built = self.load_configs().and_then(|configs| {
            Registry::build(
                configs,
                &self.options,
                self.compressors.as_ref(),
                previous.as_deref(),
            )
        });
        match built {
            Ok(registry) => {
                let registry = Arc::new(registry);
                self.registry.store(Some(Arc::clone(&registry)));
                self.stale.store(false, Ordering::Release);
                debug!("config"; "registry loaded: {} bundle(s)", registry.len());
                Ok(registry)
            }
            Err(e) => {
                self.stale.store(true, Ordering::Release);
                Err(e.into())
            }
        }
    }

    fn load_configs(&self) -> Result<Vec<Config>, ConfigError> {
        let files = match &self.sources {
            Sources::Parsed(configs) => return Ok(configs.clone()),
            Sources::Files(files) => files,
        };

        let mut configs = Vec::with_capacity(files.len());
        for file in files {
            if !file.exists() {
                log!("config"; "config file {} not found, skipping", file.file_path().display());
                continue;
            }
            let source: ResourceRef = file.clone();
            configs.push(Config::parse(source, &file.file_path(), &file.bytes())?);
        }
        if configs.is_empty() {
            return Err(ConfigError::Validation("no config file found".into()));
        }
        Ok(configs)
    }

    /// Poll every config source, without short-circuit. Marks the
    /// registry stale on change.
    pub fn check_config(&self) -> bool {
        let mut modified = false;
        match &self.sources {
            Sources::Files(files) => {
                for file in files {
                    modified |= file.check_modified();
                }
            }
            Sources::Parsed(configs) => {
                for config in configs {
                    modified |= config.source.check_modified();
                }
            }
        }
        if modified {
            self.stale.store(true, Ordering::Release);
        }
        modified
    }

    /// One freshness round: reload changed configs, then poll every bundle
    /// configured with `checkModified`.
    ///
    /// While some bundle has resolved paths but no built generation (its
    /// last build failed, or it was only used for plain lookups), every
    /// resolved resource is polled first, so the next build of that bundle
    /// reads current content.
    pub fn poll(&self) -> Result<PollOutcome> {
        let mut outcome = PollOutcome::default();
        if self.check_config() || self.stale.load(Ordering::Acquire) {
            self.reload(true)?;
            outcome.reloaded = true;
        }

        let registry = self.registry()?;
        if registry
            .bundles()
            .iter()
            .any(|b| !b.is_built() && b.cached_paths() > 0)
        {
            for bundle in registry.bundles() {
                bundle.refresh_resolved();
            }
        }

        for bundle in registry.bundles() {
            if bundle.config().check_modified && bundle.check_modified() {
                outcome.modified.push(bundle.name().to_string());
            }
        }
        Ok(outcome)
    }

    pub fn bundle(&self, name: &str) -> Result<Option<Arc<Bundle>>> {
        Ok(self.registry()?.get(name).cloned())
    }

    pub fn bundles(&self) -> Result<Vec<Arc<Bundle>>> {
        Ok(self.registry()?.bundles().to_vec())
    }

    /// Summaries of every bundle's collections, in registry order.
    pub fn summaries(&self) -> Result<Vec<CollectionSummary>> {
        let mut summaries = Vec::new();
        for bundle in self.registry()?.bundles() {
            summaries.extend(bundle.summaries(self)?);
        }
        Ok(summaries)
    }

    /// Newest timestamp over every bundle.
    pub fn last_modified(&self) -> Result<i64> {
        let mut newest = MISSING;
        for bundle in self.registry()?.bundles() {
            newest = newest.max(bundle.last_modified(self)?);
        }
        Ok(newest)
    }
}

impl Resolve for Resolver {
    fn resolve(&self, path: &str) -> Result<Option<ResourceRef>> {
        let normalized = logical::normalize(path)
            .map_err(|rejection| BundleError::invalid_path(path, rejection.reason()))?;
        let registry = self.registry()?;
        match registry.route(&normalized) {
            Some(bundle) => bundle.resolve(&normalized, self),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::Compressor;
    use crate::compress::tests::{StripWhitespace, stripping};
    use crate::resource::touch;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[app]
files = ["app/main.js", "app/style.css"]

[lib]
files = ["lib/dom.js"]
"#;

    const MAIN_JS: &str = "// @requires lib/dom.js\nmain();\n";

    fn write(root: &Path, path: &str, content: &str) {
        let file = root.join(path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, content).unwrap();
    }

    fn site(config: &str) -> (TempDir, Resolver) {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sheaf.toml", config);
        write(dir.path(), "app/main.js", MAIN_JS);
        write(dir.path(), "app/style.css", "body { color: red; }\n");
        write(dir.path(), "lib/dom.js", "dom();\n");
        let resolver = Resolver::new(vec![dir.path().join("sheaf.toml")], ResolverOptions::default())
            .with_compressors(stripping());
        (dir, resolver)
    }

    fn strip(text: &str) -> Vec<u8> {
        StripWhitespace.compress(text.as_bytes()).unwrap()
    }

    fn collections(resolver: &Resolver, bundle: &str) -> Vec<Arc<crate::collection::ResourceCollection>> {
        let bundle = resolver.bundle(bundle).unwrap().unwrap();
        bundle.resource_collections(resolver).unwrap().collections().to_vec()
    }

    #[test]
    fn test_resolve_plain_paths() {
        let (_dir, resolver) = site(CONFIG);

        let main = resolver.resolve("app/main.js").unwrap().unwrap();
        assert_eq!(&*main.bytes(), MAIN_JS.as_bytes());
        assert_eq!(main.full_path(), "app/main.js");
        assert_eq!(main.origin(), Some("app"));

        let same = resolver.resolve("app/./x/../main.js").unwrap().unwrap();
        assert!(Arc::ptr_eq(&main, &same));

        assert!(resolver.resolve("other/main.js").unwrap().is_none());
        assert!(!resolver.resolve("app/missing.js").unwrap().unwrap().exists());
    }

    #[test]
    fn test_resolve_rejects_malformed_paths() {
        let (_dir, resolver) = site(CONFIG);
        for path in ["", "/app/main.js", "app/", "app/../../x.js", "app/.."] {
            let err = resolver.resolve(path).unwrap_err();
            assert!(matches!(err, BundleError::InvalidPath { .. }), "{path}");
        }
    }

    #[test]
    fn test_collections_partitioned_by_origin() {
        let (_dir, resolver) = site(CONFIG);
        let collections = collections(&resolver, "app");

        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].origin(), Some("lib"));
        assert_eq!(collections[1].origin(), Some("app"));
        assert_eq!(&*collections[0].script_bytes(), b"dom();\n");
        assert_eq!(&*collections[1].script_bytes(), MAIN_JS.as_bytes());
        assert_eq!(&*collections[1].style_bytes(), b"body { color: red; }\n");
        assert!(collections.iter().all(|c| c.owner() == "app"));
    }

    #[test]
    fn test_resolve_compressed_artifacts() {
        let (_dir, resolver) = site(CONFIG);
        let collections = collections(&resolver, "app");
        let own = &collections[1];

        let js = resolver
            .resolve(&format!("app/{}.js", own.path()))
            .unwrap()
            .unwrap();
        assert_eq!(&*js.bytes(), strip(MAIN_JS).as_slice());
        assert!(js.exists());

        let css = resolver
            .resolve(&format!("app/{}.css", own.path()))
            .unwrap()
            .unwrap();
        assert_eq!(&*css.bytes(), b"body{color:red;}");

        let foreign = resolver
            .resolve(&format!("app/{}.js", collections[0].path()))
            .unwrap()
            .unwrap();
        assert_eq!(&*foreign.bytes(), b"dom();");
    }

    #[test]
    fn test_unknown_fingerprint_falls_through() {
        let (_dir, resolver) = site(CONFIG);
        let path = format!("app/app-{}.js", "0".repeat(32));
        let resource = resolver.resolve(&path).unwrap().unwrap();
        assert_eq!(resource.full_path(), path);
        assert!(!resource.exists());

        let resource = resolver.resolve("app/deadbeef123.js").unwrap().unwrap();
        assert!(!resource.exists());
    }

    /// Run `f` on another thread, failing if it does not finish in time.
    fn within<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        let (tx, rx) = crossbeam::channel::bounded(1);
        std::thread::spawn(move || {
            let _ = tx.send(f());
        });
        rx.recv_timeout(std::time::Duration::from_secs(10))
            .expect("build did not finish")
    }

    #[test]
    fn test_own_artifact_path_during_build_falls_through() {
        let artifact = format!("app/app-{}.js", "0".repeat(32));
        let config = CONFIG.replace(
            r#"files = ["app/main.js", "app/style.css"]"#,
            &format!(r#"files = ["app/main.js", "{artifact}"]"#),
        );
        let (dir, resolver) = site(&config);
        write(dir.path(), "app/main.js", &format!("// @requires {artifact}\nmain();\n"));
        let resolver = Arc::new(resolver);

        let app = within({
            let resolver = Arc::clone(&resolver);
            move || collections(&resolver, "app")
        });
        assert_eq!(app.len(), 1);
        let members: Vec<String> = app[0].aggregates().iter().map(|m| m.full_path()).collect();
        assert_eq!(members, ["app/main.js".to_string(), artifact]);
    }

    #[test]
    fn test_bundles_requiring_each_others_artifacts() {
        let (dir, resolver) = site(CONFIG);
        let fp = "0123456789abcdef0123456789abcdef";
        write(dir.path(), "app/main.js", &format!("// @requires lib/lib-{fp}.js\nmain();\n"));
        write(dir.path(), "lib/dom.js", &format!("// @requires app/app-{fp}.js\ndom();\n"));
        let resolver = Arc::new(resolver);

        let handles: Vec<_> = ["app", "lib", "app", "lib"]
            .into_iter()
            .map(|name| {
                let resolver = Arc::clone(&resolver);
                std::thread::spawn(move || collections(&resolver, name).len())
            })
            .collect();
        let counts = within(move || {
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });
        assert_eq!(counts, [1, 1, 1, 1]);
    }

    #[test]
    fn test_concurrent_artifact_lookups_share_one_build() {
        let (dir, resolver) = site(CONFIG);
        let reference = Resolver::new(vec![dir.path().join("sheaf.toml")], ResolverOptions::default())
            .with_compressors(stripping());
        let path = format!("app/{}.js", collections(&reference, "app")[1].path());

        let app = resolver.bundle("app").unwrap().unwrap();
        assert!(!app.is_built());

        let resolved: Vec<ResourceRef> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| resolver.resolve(&path).unwrap().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(resolved.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(resolved[0].full_path(), path);
        assert_eq!(&*resolved[0].bytes(), strip(MAIN_JS).as_slice());

        let generation = app.resource_collections(&resolver).unwrap();
        let own = generation.collections()[1].compressed_script().unwrap();
        assert!(Arc::ptr_eq(&(own as ResourceRef), &resolved[0]));
    }

    #[test]
    fn test_poll_detects_shared_member_change() {
        let (dir, resolver) = site(CONFIG);
        let before = collections(&resolver, "app");
        let before_path = before[0].path();
        collections(&resolver, "lib");
        assert!(resolver.poll().unwrap().is_empty());

        write(dir.path(), "lib/dom.js", "dom2();\n");
        touch(&dir.path().join("lib/dom.js"), 10);

        let outcome = resolver.poll().unwrap();
        assert!(!outcome.reloaded);
        assert_eq!(outcome.modified, ["app", "lib"]);

        let after = collections(&resolver, "app");
        assert!(!Arc::ptr_eq(&before[0], &after[0]));
        assert_ne!(before_path, after[0].path());
        assert_eq!(&*after[0].script_bytes(), b"dom2();\n");
        assert_eq!(&*collections(&resolver, "lib")[0].script_bytes(), b"dom2();\n");
    }

    #[test]
    fn test_rebuild_reuses_unchanged_collections() {
        let (dir, resolver) = site(CONFIG);
        let before = collections(&resolver, "app");
        let compressed = before[0].compressed_script().unwrap();

        write(dir.path(), "app/style.css", "body { color: blue; }\n");
        touch(&dir.path().join("app/style.css"), 10);
        assert_eq!(resolver.poll().unwrap().modified, ["app"]);

        let after = collections(&resolver, "app");
        assert!(Arc::ptr_eq(&before[0], &after[0]));
        assert!(Arc::ptr_eq(&compressed, &after[0].compressed_script().unwrap()));
        assert!(!Arc::ptr_eq(&before[1], &after[1]));
        assert_eq!(&*after[1].style_bytes(), b"body { color: blue; }\n");
    }

    #[test]
    fn test_file_created_after_build() {
        let config = CONFIG.replace(
            r#"files = ["app/main.js", "app/style.css"]"#,
            r#"files = ["app/main.js", "app/late.js", "app/style.css"]"#,
        );
        let (dir, resolver) = site(&config);
        let before = collections(&resolver, "app");
        assert_eq!(before[1].aggregates().len(), 3);
        assert_eq!(&*before[1].script_bytes(), MAIN_JS.as_bytes());

        write(dir.path(), "app/late.js", "late();\n");
        touch(&dir.path().join("app/late.js"), 10);
        assert_eq!(resolver.poll().unwrap().modified, ["app"]);

        let after = collections(&resolver, "app");
        assert_eq!(
            &*after[1].script_bytes(),
            format!("{MAIN_JS}late();\n").as_bytes()
        );
    }

    #[test]
    fn test_check_modified_disabled() {
        let config = CONFIG.replace("[lib]\n", "[lib]\ncheckModified = false\n");
        let (dir, resolver) = site(&config);
        collections(&resolver, "lib");

        write(dir.path(), "lib/dom.js", "dom2();\n");
        touch(&dir.path().join("lib/dom.js"), 10);
        assert!(resolver.poll().unwrap().modified.is_empty());
    }

    #[test]
    fn test_config_reload() {
        let (dir, resolver) = site(CONFIG);
        collections(&resolver, "app");
        assert!(resolver.bundle("extra").unwrap().is_none());

        write(dir.path(), "sheaf.toml", &format!("{CONFIG}\n[extra]\nfiles = []\n"));
        touch(&dir.path().join("sheaf.toml"), 10);

        let outcome = resolver.poll().unwrap();
        assert!(outcome.reloaded);
        assert!(resolver.bundle("extra").unwrap().is_some());
        assert_eq!(resolver.bundles().unwrap().len(), 3);
    }

    #[test]
    fn test_reload_carries_unchanged_collections() {
        let (dir, resolver) = site(CONFIG);
        let before = collections(&resolver, "app");

        write(dir.path(), "sheaf.toml", &format!("{CONFIG}\n[extra]\nfiles = []\n"));
        touch(&dir.path().join("sheaf.toml"), 10);
        resolver.poll().unwrap();

        let after = collections(&resolver, "app");
        assert!(Arc::ptr_eq(&before[0], &after[0]));
        assert!(Arc::ptr_eq(&before[1], &after[1]));
    }

    #[test]
    fn test_failed_reload_keeps_serving() {
        let (dir, resolver) = site(CONFIG);
        assert!(resolver.resolve("app/main.js").unwrap().is_some());

        write(dir.path(), "sheaf.toml", "[all]\nfiles = []\n");
        touch(&dir.path().join("sheaf.toml"), 10);
        assert!(resolver.poll().is_err());

        assert!(resolver.resolve("app/main.js").unwrap().is_some());
        assert!(resolver.poll().is_err());

        write(dir.path(), "sheaf.toml", CONFIG);
        touch(&dir.path().join("sheaf.toml"), 20);
        assert!(resolver.poll().unwrap().reloaded);
    }

    #[test]
    fn test_duplicate_names_across_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.toml", "[core]\nfiles = []\n");
        write(dir.path(), "b.json", r#"{ "core": { "files": [] } }"#);
        let resolver = Resolver::new(
            vec![dir.path().join("a.toml"), dir.path().join("b.json")],
            ResolverOptions::default(),
        );

        let err = resolver.registry().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("a.toml"));
        assert!(message.contains("b.json"));
    }

    #[test]
    fn test_missing_config_file_skipped() {
        let (dir, _) = site(CONFIG);
        let resolver = Resolver::new(
            vec![dir.path().join("nope.toml"), dir.path().join("sheaf.toml")],
            ResolverOptions::default(),
        );
        assert_eq!(resolver.bundles().unwrap().len(), 2);
    }

    #[test]
    fn test_capacity_error() {
        let (dir, _) = site(CONFIG);
        let resolver = Resolver::new(
            vec![dir.path().join("sheaf.toml")],
            ResolverOptions { max_cached_paths: 2 },
        );
        resolver.resolve("app/a.js").unwrap();
        resolver.resolve("app/b.js").unwrap();
        resolver.resolve("app/a.js").unwrap();
        let err = resolver.resolve("app/c.js").unwrap_err();
        assert!(matches!(err, BundleError::Capacity { limit: 2, .. }));
    }

    #[test]
    fn test_cycle_aborts_build() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sheaf.toml", "[app]\nfiles = [\"app/a.js\"]\n");
        write(dir.path(), "app/a.js", "// @requires ./b.js\n");
        write(dir.path(), "app/b.js", "// @requires ./a.js\n");
        let resolver = Resolver::new(vec![dir.path().join("sheaf.toml")], ResolverOptions::default());

        let bundle = resolver.bundle("app").unwrap().unwrap();
        let err = bundle.resource_collections(&resolver).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("app/a.js"));
        assert!(message.contains("app/b.js"));
        assert!(!bundle.check_modified());
    }

    #[test]
    fn test_summaries_and_last_modified() {
        let (_dir, resolver) = site(CONFIG);
        let summaries = resolver.summaries().unwrap();
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["lib", "app", "lib"]);
        assert!(summaries[1].style.is_some());
        assert!(summaries[0].style.is_none());
        assert_eq!(summaries[1].files.len(), 2);

        let main = resolver.resolve("app/main.js").unwrap().unwrap();
        assert!(resolver.last_modified().unwrap() >= main.last_modified());
    }

    #[test]
    fn test_parsed_configs() {
        let (dir, _) = site(CONFIG);
        let source: ResourceRef = Arc::new(FileResource::at(&dir.path().join("sheaf.toml")));
        let config = Config::parse(source.clone(), &dir.path().join("sheaf.toml"), &source.bytes()).unwrap();
        let resolver = Resolver::with_configs(vec![config], ResolverOptions::default())
            .with_compressors(stripping());
        assert_eq!(collections(&resolver, "app").len(), 2);
    }
}
