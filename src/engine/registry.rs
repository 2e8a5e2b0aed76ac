//! Process registry of primitive assets, compiled modules and shared engines
//!
//! Compilation happens at most once per asset name and registry, no matter
//! how many tasks ask for the asset at the same time. Different assets
//! compile independently. One-shot calls go through a shared engine per
//! `(asset, digest length)` whose FIFO lock serializes its users.

use super::primitive::PrimitiveEngine;
use crate::config::{RuntimeConfig, SCRATCH_CAPACITY};
use crate::error::{HashError, Result};
use crate::sandbox::{builtin_assets, CompiledModule, NativeSandbox, PrimitiveAsset, Sandbox};
use crate::sync::AsyncMutex;
use futures::FutureExt;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type ModuleSlot = Arc<AsyncMutex<Option<Arc<CompiledModule>>>>;
type EngineSlot = Arc<AsyncMutex<Option<PrimitiveEngine>>>;

static GLOBAL: OnceCell<Registry> = OnceCell::new();

/// Registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Successful module compilations
    pub compilations: usize,
    /// Instances created
    pub instances: usize,
    /// Shared engines slots in use
    pub shared_engines: usize,
}

/// Explicit, cloneable handle on a set of assets and their caches
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

struct Inner {
    config: RuntimeConfig,
    sandbox: Arc<dyn Sandbox>,
    assets: RwLock<HashMap<String, PrimitiveAsset>>,
    modules: Mutex<HashMap<String, ModuleSlot>>,
    shared: Mutex<HashMap<(String, usize), EngineSlot>>,
    compilations: AtomicUsize,
    instances: AtomicUsize,
}

impl Registry {
    /// Registry running the native sandbox
    pub fn new(config: RuntimeConfig) -> Self {
        let sandbox = Arc::new(NativeSandbox::new(&config));
        Self::with_sandbox(config, sandbox)
    }

    /// Registry running `sandbox`, preloaded with the built-in assets
    pub fn with_sandbox(config: RuntimeConfig, sandbox: Arc<dyn Sandbox>) -> Self {
        let assets = builtin_assets()
            .iter()
            .map(|asset| (asset.name().to_string(), asset.clone()))
            .collect();

        Self {
            inner: Arc::new(Inner {
                config,
                sandbox,
                assets: RwLock::new(assets),
                modules: Mutex::new(HashMap::new()),
                shared: Mutex::new(HashMap::new()),
                compilations: AtomicUsize::new(0),
                instances: AtomicUsize::new(0),
            }),
        }
    }

    /// Process-wide registry, created on first use from the environment.
    ///
    /// An invalid `HASHBRIDGE_*` value fails the call with a configuration
    /// error, and later calls read the environment again until one succeeds.
    pub fn global() -> Result<&'static Registry> {
        GLOBAL.get_or_try_init(|| Self::from_lookup(|key| std::env::var(key).ok()))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RuntimeConfig::default();
        if let Err(e) = config.apply_overrides(lookup) {
            tracing::warn!("Refusing to build the global registry: {}", e);
            return Err(e);
        }
        Ok(Self::new(config))
    }

    /// Install `registry` as the process-wide one.
    ///
    /// Fails, handing the registry back, once [`global`](Self::global) has
    /// succeeded.
    pub fn install_global(registry: Registry) -> std::result::Result<(), Registry> {
        GLOBAL.set(registry)
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Add a custom asset
    pub fn register_asset(&self, asset: PrimitiveAsset) -> Result<()> {
        let mut assets = self.inner.assets.write().unwrap_or_else(PoisonError::into_inner);
        if assets.contains_key(asset.name()) {
            return Err(HashError::DuplicateModule(asset.name().to_string()));
        }
        tracing::debug!("Registered primitive asset '{}'", asset.name());
        assets.insert(asset.name().to_string(), asset);
        Ok(())
    }

    /// Names of all registered assets, sorted
    pub fn asset_names(&self) -> Vec<String> {
        let assets = self.inner.assets.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = assets.keys().cloned().collect();
        names.sort();
        names
    }

    fn ensure_available(&self) -> Result<()> {
        if self.inner.sandbox.is_available() {
            return Ok(());
        }
        tracing::warn!("Sandbox '{}' is disabled; refusing to run primitives", self.inner.sandbox.name());
        Err(HashError::Capability(format!(
            "the {} sandbox is disabled",
            self.inner.sandbox.name()
        )))
    }

    fn asset(&self, name: &str) -> Result<PrimitiveAsset> {
        self.inner
            .assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| HashError::UnknownModule(name.to_string()))
    }

    /// Compiled module for `name`, compiling it on first request
    pub async fn compile(&self, name: &str) -> Result<Arc<CompiledModule>> {
        self.ensure_available()?;
        let asset = self.asset(name)?;

        let slot = {
            let mut modules = self.inner.modules.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(modules.entry(name.to_string()).or_default())
        };

        let inner = Arc::clone(&self.inner);
        slot.dispatch(move |cached| {
            async move {
                if let Some(module) = cached.as_ref() {
                    return Ok(Arc::clone(module));
                }

                tracing::debug!(
                    "Compiling primitive module '{}' in the {} sandbox",
                    asset.name(),
                    inner.sandbox.name()
                );
                let module = Arc::new(inner.sandbox.compile(&asset).await?);
                inner.compilations.fetch_add(1, Ordering::Relaxed);
                *cached = Some(Arc::clone(&module));
                Ok(module)
            }
            .boxed()
        })
        .await
    }

    /// New engine for `name` producing `digest_length`-byte digests
    pub async fn instantiate(&self, name: &str, digest_length: usize) -> Result<PrimitiveEngine> {
        check_digest_length(digest_length)?;

        let module = self.compile(name).await?;
        let instance = self.inner.sandbox.instantiate(module).await?;
        self.inner.instances.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("Instantiated '{}' ({} byte digest)", name, digest_length);

        Ok(PrimitiveEngine::new(instance, digest_length))
    }

    /// Run `op` on the shared engine for `(name, digest_length)`.
    ///
    /// Callers queue in FIFO order; the engine is created on first use and
    /// `op` runs to completion without suspending, so no other caller can
    /// observe or disturb its scratch window.
    pub async fn with_shared<R, F>(&self, name: &str, digest_length: usize, op: F) -> Result<R>
    where
        F: FnOnce(&mut PrimitiveEngine) -> Result<R>,
    {
        self.ensure_available()?;
        // Slots are only created for requests that can succeed
        check_digest_length(digest_length)?;
        self.asset(name)?;

        let slot = {
            let mut shared = self.inner.shared.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(shared.entry((name.to_string(), digest_length)).or_default())
        };

        let mut guard = slot.acquire().await;
        let engine = match guard.take() {
            Some(engine) => guard.insert(engine),
            None => {
                let engine = self.instantiate(name, digest_length).await?;
                tracing::debug!("Created shared '{}' engine ({} byte digest)", name, digest_length);
                guard.insert(engine)
            }
        };
        op(engine)
    }

    /// Current counters
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            compilations: self.inner.compilations.load(Ordering::Relaxed),
            instances: self.inner.instances.load(Ordering::Relaxed),
            shared_engines: self
                .inner
                .shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }
}

fn check_digest_length(digest_length: usize) -> Result<()> {
    if digest_length == 0 || digest_length > SCRATCH_CAPACITY {
        return Err(HashError::validation(
            "digest_length",
            format!("must be between 1 and {} bytes", SCRATCH_CAPACITY),
        ));
    }
    Ok(())
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.inner.config)
            .field("sandbox", &self.inner.sandbox.name())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_SANDBOX;
    use crate::error::ErrorKind;
    use futures::future::join_all;

    fn registry() -> Registry {
        Registry::new(RuntimeConfig::default())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loads_compile_once() {
        let registry = registry();

        let loads = (0..16).map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move {
                let asset = ["sha256", "md5", "sha1"][i % 3];
                registry.instantiate(asset, 16).await.map(|engine| engine.fingerprint())
            })
        });

        let results = join_all(loads).await;
        assert!(results.into_iter().all(|r| r.unwrap().is_ok()));

        let stats = registry.stats();
        assert_eq!(stats.compilations, 3);
        assert_eq!(stats.instances, 16);
    }

    #[tokio::test]
    async fn test_invalid_environment_fails_registry_setup() {
        let err = Registry::from_lookup(|key| (key == ENV_SANDBOX).then(|| "of".to_string())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Environment);

        let registry = Registry::from_lookup(|key| (key == ENV_SANDBOX).then(|| "off".to_string())).unwrap();
        assert!(!registry.config().sandbox_enabled);
        let err = registry.instantiate("sha256", 32).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);
    }

    #[tokio::test]
    async fn test_compiled_module_is_shared() {
        let registry = registry();
        let first = registry.compile("blake2b").await.unwrap();
        let second = registry.compile("blake2b").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.stats().compilations, 1);
    }

    #[tokio::test]
    async fn test_disabled_sandbox_fails_before_lookup() {
        let registry = Registry::new(RuntimeConfig {
            sandbox_enabled: false,
            ..Default::default()
        });

        let err = registry.instantiate("sha256", 32).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);

        let err = registry.instantiate("no-such-asset", 32).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);

        let err = registry
            .with_shared("sha256", 32, |engine| Ok(engine.digest().to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);
        assert_eq!(registry.stats(), RegistryStats::default());
    }

    #[tokio::test]
    async fn test_unknown_and_custom_assets() {
        let registry = registry();
        assert!(matches!(
            registry.instantiate("whirlpool", 64).await,
            Err(HashError::UnknownModule(_))
        ));

        let image = builtin_assets()[0].image().to_vec();
        registry
            .register_asset(PrimitiveAsset::new("md5-copy", image.clone()))
            .unwrap();
        assert!(matches!(
            registry.register_asset(PrimitiveAsset::new("md5-copy", image)),
            Err(HashError::DuplicateModule(_))
        ));
        assert!(registry.asset_names().contains(&"md5-copy".to_string()));

        let mut corrupt = builtin_assets()[0].image().to_vec();
        corrupt[0] = 0xff;
        registry
            .register_asset(PrimitiveAsset::new("md5-corrupt", corrupt))
            .unwrap();
        assert!(matches!(
            registry.instantiate("md5-corrupt", 16).await,
            Err(HashError::Compile { .. })
        ));
        assert_eq!(registry.stats().compilations, 0);

        registry.instantiate("md5-copy", 16).await.unwrap();
        assert_eq!(registry.stats().compilations, 1);
    }

    #[tokio::test]
    async fn test_instance_memory_limit() {
        let registry = Registry::new(RuntimeConfig {
            max_instance_memory: SCRATCH_CAPACITY,
            ..Default::default()
        });
        let err = registry.instantiate("sha256", 32).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);
    }

    #[tokio::test]
    async fn test_digest_length_validated() {
        let registry = registry();
        for length in [0, SCRATCH_CAPACITY + 1] {
            let err = registry.instantiate("sha256", length).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[tokio::test]
    async fn test_rejected_shared_requests_leave_no_slot() {
        let registry = registry();

        let err = registry
            .with_shared("whirlpool", 64, |engine| Ok(engine.digest().to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, HashError::UnknownModule(_)));

        for length in [0, SCRATCH_CAPACITY + 1] {
            let err = registry
                .with_shared("sha256", length, |engine| Ok(engine.digest().to_vec()))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        assert_eq!(registry.stats(), RegistryStats::default());

        registry
            .with_shared("sha256", 32, |engine| Ok(engine.digest().to_vec()))
            .await
            .unwrap();
        assert_eq!(registry.stats().shared_engines, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_engine_has_no_cross_talk() {
        let registry = registry();
        let inputs: Vec<Vec<u8>> = (0..32u8)
            .map(|i| (0..(i as usize * 997) % 40_000).map(|j| (j as u8) ^ i).collect())
            .collect();

        let mut sequential = Vec::new();
        let mut engine = registry.instantiate("sha256", 32).await.unwrap();
        for input in &inputs {
            sequential.push(engine.hash(input, Some(256), None).unwrap().to_vec());
        }

        let tasks = inputs.into_iter().map(|input| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .with_shared("sha256", 32, |engine| {
                        Ok(engine.hash(&input, Some(256), None)?.to_vec())
                    })
                    .await
            })
        });
        let concurrent: Vec<Vec<u8>> = join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(concurrent, sequential);
        assert_eq!(registry.stats().shared_engines, 1);
    }
}
