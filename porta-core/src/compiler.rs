//! # Schema Compiler Driver
//!
//! Turns an uploaded `.proto` source file into a serialized
//! `FileDescriptorSet` by shelling out to the canonical `protoc` binary.
//!
//! Running `protoc` as a subprocess keeps its exact compilation semantics
//! (including well-known-type resolution) at the cost of one fork+exec per
//! upload. Uploads are rare and interactive, so that trade is fine.

use prost::Message;
use prost_types::FileDescriptorSet;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Failed to run protoc: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Failed to compile .proto with protoc: {stderr}")]
    Protoc { stderr: String },
    #[error("Could not read descriptor set: {0}")]
    ReadOutput(#[source] std::io::Error),
    #[error("Failed to parse descriptor set: {0}")]
    InvalidOutput(#[from] prost::DecodeError),
}

/// Interface over the external schema compiler, so callers (and tests) can
/// substitute an implementation that never forks.
pub trait SchemaCompiler: Send + Sync {
    /// Compiles `source` into a serialized `FileDescriptorSet` including
    /// all transitive imports. Imports are searched in `import_roots` (in
    /// order) and in the directory containing `source`.
    fn compile(&self, source: &Path, import_roots: &[PathBuf]) -> Result<Vec<u8>, CompileError>;
}

/// Drives the `protoc` binary found on `PATH`.
///
/// The emitted descriptor set is written to `descriptor_out`, overwritten
/// in place on every successful compile, then read back as the returned
/// blob. The file on disk therefore always equals the last successfully
/// compiled schema.
#[derive(Debug, Clone)]
pub struct ProtocCompiler {
    descriptor_out: PathBuf,
}

impl ProtocCompiler {
    pub fn new(descriptor_out: impl Into<PathBuf>) -> Self {
        Self {
            descriptor_out: descriptor_out.into(),
        }
    }
}

impl SchemaCompiler for ProtocCompiler {
    fn compile(&self, source: &Path, import_roots: &[PathBuf]) -> Result<Vec<u8>, CompileError> {
        let mut cmd = Command::new("protoc");
        for root in import_roots {
            cmd.arg(format!("--proto_path={}", root.display()));
        }
        if let Some(dir) = source.parent() {
            cmd.arg(format!("--proto_path={}", dir.display()));
        }
        cmd.arg(format!(
            "--descriptor_set_out={}",
            self.descriptor_out.display()
        ))
        .arg("--include_imports")
        .arg(source);

        tracing::debug!(source = %source.display(), roots = import_roots.len(), "invoking protoc");
        let output = cmd.output().map_err(CompileError::Spawn)?;
        if !output.status.success() {
            return Err(CompileError::Protoc {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let blob = std::fs::read(&self.descriptor_out).map_err(CompileError::ReadOutput)?;
        // A zero exit does not guarantee a parseable output file.
        FileDescriptorSet::decode(blob.as_slice())?;
        Ok(blob)
    }
}
