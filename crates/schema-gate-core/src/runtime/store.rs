// crates/schema-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Schema Gate Stores
// Description: In-memory and file-backed baseline stores plus an in-memory memento provider.
// Purpose: Provide deterministic capability implementations without external services.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! [`InMemoryBaselineStore`] and [`InMemoryMementoProvider`] back tests and
//! local hosts. [`FileBaselineStore`] persists one JSON document per tenant
//! in a directory. Mutex poisoning is reported as a store error, never
//! ignored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::IntegrityBaseline;
use crate::core::MementoHandle;
use crate::core::TenantId;
use crate::core::Timestamp;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::hash_bytes;
use crate::interfaces::BaselineStore;
use crate::interfaces::MementoError;
use crate::interfaces::MementoProvider;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Baseline Store
// ============================================================================

/// In-memory baseline store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBaselineStore {
    /// Baselines keyed by tenant, protected by a mutex.
    baselines: Arc<Mutex<BTreeMap<TenantId, IntegrityBaseline>>>,
}

impl InMemoryBaselineStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            baselines: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl BaselineStore for InMemoryBaselineStore {
    fn load(&self, tenant_id: &TenantId) -> Result<Option<IntegrityBaseline>, StoreError> {
        let guard = self
            .baselines
            .lock()
            .map_err(|_| StoreError::Store("baseline store mutex poisoned".to_string()))?;
        Ok(guard.get(tenant_id).cloned())
    }

    fn save(&self, baseline: &IntegrityBaseline) -> Result<(), StoreError> {
        self.baselines
            .lock()
            .map_err(|_| StoreError::Store("baseline store mutex poisoned".to_string()))?
            .insert(baseline.tenant_id.clone(), baseline.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: File Baseline Store
// ============================================================================

/// Baseline store writing one JSON file per tenant.
///
/// File names are the hex digest of the tenant identifier, so arbitrary
/// identifiers never escape the directory.
#[derive(Debug, Clone)]
pub struct FileBaselineStore {
    /// Directory holding baseline files.
    root: PathBuf,
}

impl FileBaselineStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the directory cannot be created.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(root).map_err(|err| StoreError::Io(err.to_string()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the file path for a tenant.
    fn path_for(&self, tenant_id: &TenantId) -> PathBuf {
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, tenant_id.as_str().as_bytes());
        self.root.join(format!("{}.json", digest.value))
    }
}

impl BaselineStore for FileBaselineStore {
    fn load(&self, tenant_id: &TenantId) -> Result<Option<IntegrityBaseline>, StoreError> {
        let bytes = match fs::read(self.path_for(tenant_id)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };
        let baseline: IntegrityBaseline =
            serde_json::from_slice(&bytes).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        if baseline.tenant_id != *tenant_id {
            return Err(StoreError::Corrupt(format!(
                "baseline file for {tenant_id} names tenant {}",
                baseline.tenant_id
            )));
        }
        Ok(Some(baseline))
    }

    fn save(&self, baseline: &IntegrityBaseline) -> Result<(), StoreError> {
        let payload =
            serde_json::to_vec_pretty(baseline).map_err(|err| StoreError::Store(err.to_string()))?;
        let path = self.path_for(&baseline.tenant_id);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload).map_err(|err| StoreError::Io(err.to_string()))?;
        fs::rename(&staging, &path).map_err(|err| StoreError::Io(err.to_string()))
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared baseline store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedBaselineStore {
    /// Inner store implementation.
    inner: Arc<dyn BaselineStore + Send + Sync>,
}

impl SharedBaselineStore {
    /// Wraps a baseline store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl BaselineStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn BaselineStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl BaselineStore for SharedBaselineStore {
    fn load(&self, tenant_id: &TenantId) -> Result<Option<IntegrityBaseline>, StoreError> {
        self.inner.load(tenant_id)
    }

    fn save(&self, baseline: &IntegrityBaseline) -> Result<(), StoreError> {
        self.inner.save(baseline)
    }
}

// ============================================================================
// SECTION: In-Memory Memento Provider
// ============================================================================

/// Lifecycle counters kept by [`InMemoryMementoProvider`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MementoLedger {
    /// Handles captured, in order.
    pub captured: Vec<MementoHandle>,
    /// Handles restored, in order.
    pub restored: Vec<MementoHandle>,
    /// Handles discarded, in order.
    pub discarded: Vec<MementoHandle>,
}

/// Memento provider that records handles without touching a database.
///
/// Hosts whose apply target is transactional can use it directly; tests use
/// it to observe capture and restore calls.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMementoProvider {
    /// Recorded lifecycle, protected by a mutex.
    ledger: Arc<Mutex<MementoLedger>>,
}

impl InMemoryMementoProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded lifecycle.
    #[must_use]
    pub fn ledger(&self) -> MementoLedger {
        self.ledger.lock().map(|ledger| ledger.clone()).unwrap_or_default()
    }

    /// Runs `update` against the ledger.
    fn with_ledger<T>(
        &self,
        update: impl FnOnce(&mut MementoLedger) -> T,
        error: impl FnOnce(String) -> MementoError,
    ) -> Result<T, MementoError> {
        let mut guard =
            self.ledger.lock().map_err(|_| error("memento ledger mutex poisoned".to_string()))?;
        Ok(update(&mut guard))
    }
}

impl MementoProvider for InMemoryMementoProvider {
    fn capture(&self, at: Timestamp) -> Result<MementoHandle, MementoError> {
        self.with_ledger(
            |ledger| {
                let handle = MementoHandle {
                    reference: format!("memento-{}", ledger.captured.len() + 1),
                    captured_at: at,
                };
                ledger.captured.push(handle.clone());
                handle
            },
            MementoError::Capture,
        )
    }

    fn restore(&self, handle: &MementoHandle) -> Result<(), MementoError> {
        self.with_ledger(|ledger| ledger.restored.push(handle.clone()), MementoError::Restore)
    }

    fn discard(&self, handle: &MementoHandle) -> Result<(), MementoError> {
        self.with_ledger(|ledger| ledger.discarded.push(handle.clone()), MementoError::Discard)
    }
}
