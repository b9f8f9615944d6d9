//! # Schema Registry
//!
//! Process-wide holder of the active compiled schema and the ordered list
//! of import roots the compiler searches for schema imports.
//!
//! The active schema is a [`DescriptorPool`]. Pools are reference-counted
//! internally, so a clone taken under the read lock stays usable for the
//! rest of a call even if another upload swaps the schema in the meantime.
//! That gives every resolved [`MethodDescriptor`] the lifetime guarantee it
//! needs without handing lock guards across await points.

use prost_reflect::{DescriptorPool, MethodDescriptor};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Path cannot be empty")]
    EmptyImportPath,
    #[error("Failed to parse descriptor set: {0}")]
    InvalidDescriptor(#[from] prost_reflect::DescriptorError),
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
    #[error("Method '{0}' not found")]
    MethodNotFound(String),
}

/// A service as presented to the UI: its fully qualified name plus the
/// short names of its methods, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEntry {
    pub service: String,
    pub methods: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    pool: DescriptorPool,
    import_roots: Vec<PathBuf>,
}

/// Single source of truth for the active schema and import roots.
///
/// One instance lives for the whole process, shared by every request
/// handler. Reads vastly outnumber writes, so a plain reader/writer lock
/// is enough.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    inner: RwLock<Inner>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a search root for schema imports and returns the updated
    /// ordered list. The path is not checked for existence here; `protoc`
    /// reports unusable roots at compile time.
    pub fn add_import_root(
        &self,
        path: impl Into<PathBuf>,
    ) -> Result<Vec<PathBuf>, RegistryError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(RegistryError::EmptyImportPath);
        }
        let mut inner = self.write();
        inner.import_roots.push(path);
        Ok(inner.import_roots.clone())
    }

    /// Snapshot of the ordered import root list.
    pub fn import_roots(&self) -> Vec<PathBuf> {
        self.read().import_roots.clone()
    }

    /// Atomically replaces the active schema with a freshly decoded pool.
    ///
    /// A blob that fails to decode leaves the previous schema untouched.
    pub fn replace_schema(&self, blob: &[u8]) -> Result<(), RegistryError> {
        let pool = DescriptorPool::decode(blob)?;
        self.write().pool = pool;
        Ok(())
    }

    /// Lists every service in the active schema. Services appear in
    /// file-declaration order, methods in declaration order.
    pub fn list_services(&self) -> Vec<ServiceEntry> {
        self.read()
            .pool
            .services()
            .map(|svc| ServiceEntry {
                service: svc.full_name().to_string(),
                methods: svc.methods().map(|m| m.name().to_string()).collect(),
            })
            .collect()
    }

    /// Resolves a method by exact service full name and method short name.
    ///
    /// The returned descriptor carries the input/output message descriptors
    /// and both streaming flags, and stays valid against the schema it was
    /// resolved from even if the schema is replaced while a call is in
    /// flight.
    pub fn resolve(
        &self,
        service: &str,
        method: &str,
    ) -> Result<MethodDescriptor, RegistryError> {
        let pool = self.read().pool.clone();
        pool.get_service_by_name(service)
            .ok_or_else(|| RegistryError::ServiceNotFound(service.to_string()))?
            .methods()
            .find(|m| m.name() == method)
            .ok_or_else(|| RegistryError::MethodNotFound(method.to_string()))
    }

    // A poisoned lock only means a panic happened mid-update; the data is
    // a Vec and a pool swap, neither of which can be left half-written.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
