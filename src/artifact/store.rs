//! # Artifact Store
//!
//! Filesystem-backed persistence behind a small backend trait, with public
//! URL construction. Filenames derive from the request path plus a random
//! uniqueness token; records are immutable once created.

use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use super::errors::{ArtifactError, ArtifactResult};

/// Backend trait for artifact persistence
pub trait ArtifactBackend: Send + Sync + std::fmt::Debug {
    /// Write data under a flat file name
    fn write(&self, name: &str, data: &[u8]) -> ArtifactResult<()>;

    /// Read data back by name
    fn read(&self, name: &str) -> ArtifactResult<Vec<u8>>;

    /// Check whether a name exists
    fn exists(&self, name: &str) -> ArtifactResult<bool>;
}

/// Local filesystem artifact backend
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at the given directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn full_path(&self, name: &str) -> ArtifactResult<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(ArtifactError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

impl ArtifactBackend for LocalBackend {
    fn write(&self, name: &str, data: &[u8]) -> ArtifactResult<()> {
        let path = self.full_path(name)?;
        fs::create_dir_all(&self.root).map_err(|e| ArtifactError::Io(e.to_string()))?;
        fs::write(&path, data).map_err(|e| ArtifactError::Io(e.to_string()))
    }

    fn read(&self, name: &str) -> ArtifactResult<Vec<u8>> {
        let path = self.full_path(name)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::NotFound(name.to_string())
            } else {
                ArtifactError::Io(e.to_string())
            }
        })
    }

    fn exists(&self, name: &str) -> ArtifactResult<bool> {
        Ok(self.full_path(name)?.exists())
    }
}

/// Media kind of a stored artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MimeKind {
    Png,
    Html,
}

impl MimeKind {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            MimeKind::Png => "png",
            MimeKind::Html => "html",
        }
    }

    /// HTTP content type
    pub fn content_type(&self) -> &'static str {
        match self {
            MimeKind::Png => "image/png",
            MimeKind::Html => "text/html; charset=utf-8",
        }
    }

    /// Resolve a kind from a file name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.rsplit('.').next() {
            Some("png") => Some(MimeKind::Png),
            Some("html") => Some(MimeKind::Html),
            _ => None,
        }
    }
}

/// A persisted artifact; immutable after creation
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub storage_path: String,
    pub public_url: String,
    pub mime: MimeKind,
    pub created_at: DateTime<Utc>,
}

/// An allocated name stem shared by every artifact of one request
#[derive(Debug, Clone)]
pub struct ArtifactSlot {
    stem: String,
}

impl ArtifactSlot {
    /// The allocated stem, extension-less
    pub fn stem(&self) -> &str {
        &self.stem
    }
}

/// Artifact store: name allocation, persistence, and URL construction
#[derive(Debug)]
pub struct ArtifactStore<B: ArtifactBackend = LocalBackend> {
    backend: B,
    public_base: String,
}

impl ArtifactStore<LocalBackend> {
    /// Store writing to a local directory
    pub fn local(root: PathBuf, public_base: impl Into<String>) -> Self {
        Self::new(LocalBackend::new(root), public_base)
    }
}

impl<B: ArtifactBackend> ArtifactStore<B> {
    /// Create a store over the given backend
    pub fn new(backend: B, public_base: impl Into<String>) -> Self {
        let mut public_base = public_base.into();
        while public_base.ends_with('/') {
            public_base.pop();
        }
        Self {
            backend,
            public_base,
        }
    }

    /// Allocate a name stem for a request path. The slug keeps names
    /// human-attributable; the token makes them collision-free.
    pub fn allocate(&self, request_path: &str) -> ArtifactSlot {
        let token = Uuid::new_v4().simple().to_string();
        ArtifactSlot {
            stem: format!("{}-{}", slug(request_path), token),
        }
    }

    /// Persist one artifact under the slot and build its public URL
    pub fn persist(
        &self,
        slot: &ArtifactSlot,
        mime: MimeKind,
        data: &[u8],
    ) -> ArtifactResult<ArtifactRecord> {
        let name = format!("{}.{}", slot.stem, mime.extension());
        self.backend.write(&name, data)?;
        Ok(ArtifactRecord {
            storage_path: name.clone(),
            public_url: format!("{}/{}", self.public_base, name),
            mime,
            created_at: Utc::now(),
        })
    }

    /// Read a stored artifact back, resolving its media kind from the name
    pub fn fetch(&self, name: &str) -> ArtifactResult<(MimeKind, Vec<u8>)> {
        let mime =
            MimeKind::from_name(name).ok_or_else(|| ArtifactError::InvalidName(name.to_string()))?;
        let data = self.backend.read(name)?;
        Ok((mime, data))
    }
}

fn slug(path: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new("[^a-z0-9]+").expect("static pattern"));
    let lowered = path.to_ascii_lowercase();
    let slug = re.replace_all(&lowered, "-");
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "explain".to_string()
    } else {
        trimmed.to_string()
    }
}
