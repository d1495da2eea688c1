//! Artifact emission
//!
//! The artifact is rewritten only when its bytes would change, so file
//! watchers on the client side do not rebuild on every restart.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::generate;
use crate::config::ContractConfig;
use crate::error::Result;
use crate::registry::RouteRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Writes the generated contract to one path
#[derive(Debug, Clone)]
pub struct ArtifactEmitter {
    path: PathBuf,
}

impl ArtifactEmitter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generate from `registry` and write if changed
    pub fn emit(&self, registry: &RouteRegistry) -> Result<WriteOutcome> {
        let content = generate(registry)?.render();
        self.write(&content)
    }

    /// Write `content` unless the file already holds exactly these bytes
    pub fn write(&self, content: &str) -> Result<WriteOutcome> {
        if !self.is_stale(content)? {
            debug!(path = %self.path.display(), "API contract unchanged");
            return Ok(WriteOutcome::Unchanged);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, content)?;

        info!(path = %self.path.display(), bytes = content.len(), "Wrote API contract");
        Ok(WriteOutcome::Written)
    }

    /// Raw file bytes, `None` if there is no file yet
    pub fn current_bytes(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Current file contents as text, for diffs
    pub fn current(&self) -> Result<Option<String>> {
        Ok(self
            .current_bytes()?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Compares bytes, not decoded text
    pub fn is_stale(&self, content: &str) -> Result<bool> {
        Ok(self.current_bytes()?.as_deref() != Some(content.as_bytes()))
    }
}

/// Startup hook: regenerate the artifact in development mode only
pub fn sync_artifact(registry: &RouteRegistry, config: &ContractConfig) -> Result<Option<WriteOutcome>> {
    if !config.is_development() {
        debug!(mode = ?config.mode, "Skipping API contract generation");
        return Ok(None);
    }

    info!("Generating types...");
    ArtifactEmitter::new(config.artifact_path()).emit(registry).map(Some)
}
