//! Screenshots and report attachments

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::driver::Driver;
use crate::error::E2eResult;

/// A file recorded on a case's report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
    pub content_type: String,
}

/// Make a test title usable as a file name.
///
/// Whitespace runs become `_`, path-hostile characters are dropped.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_whitespace() || c == '_' {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            out.push(c);
        }
    }
    let trimmed = out.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Output directory layout: `screenshots/` and `attachments/<case>/`
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> E2eResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("screenshots"))?;
        std::fs::create_dir_all(root.join("attachments"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join("screenshots")
    }

    pub fn case_dir(&self, title: &str) -> PathBuf {
        self.root.join("attachments").join(sanitize_title(title))
    }

    /// `<title>.png`, or `<title>-<context>-<timestamp>.png` for mid-flow captures
    pub fn screenshot_path(&self, title: &str, context: Option<&str>) -> PathBuf {
        let stem = sanitize_title(title);
        let file = match context {
            None => format!("{}.png", stem),
            Some(context) => format!(
                "{}-{}-{}.png",
                stem,
                sanitize_title(context),
                chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f")
            ),
        };
        self.screenshots_dir().join(file)
    }

    /// Per-case recorder sharing this store
    pub fn case(self: &Arc<Self>, title: &str) -> CaseArtifacts {
        CaseArtifacts {
            store: Arc::clone(self),
            title: title.to_string(),
            attachments: Mutex::new(Vec::new()),
        }
    }
}

/// Attachments collected while one case runs
#[derive(Debug)]
pub struct CaseArtifacts {
    store: Arc<ArtifactStore>,
    title: String,
    attachments: Mutex<Vec<Attachment>>,
}

impl CaseArtifacts {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        self.attachments.lock().clone()
    }

    fn record(&self, name: &str, path: PathBuf, content_type: &str) -> E2eResult<Attachment> {
        let attachment = Attachment {
            name: name.to_string(),
            sha256: hash_file(&path)?,
            path,
            content_type: content_type.to_string(),
        };
        debug!("Attached '{}' to {}", attachment.name, self.title);
        self.attachments.lock().push(attachment.clone());
        Ok(attachment)
    }

    pub fn attach_text(&self, name: &str, content: &str) -> E2eResult<Attachment> {
        let dir = self.store.case_dir(&self.title);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.txt", sanitize_title(name)));
        std::fs::write(&path, content)?;
        self.record(name, path, "text/plain")
    }

    pub fn attach_file(&self, name: &str, source: &Path, content_type: &str) -> E2eResult<Attachment> {
        let dir = self.store.case_dir(&self.title);
        std::fs::create_dir_all(&dir)?;
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| sanitize_title(name));
        let path = dir.join(file_name);
        std::fs::copy(source, &path)?;
        self.record(name, path, content_type)
    }

    /// Full-page screenshot, attached under `name`
    pub async fn screenshot(&self, driver: &dyn Driver, name: &str) -> E2eResult<Attachment> {
        let path = self.store.screenshot_path(&self.title, Some(name));
        driver.screenshot(&path, true).await?;
        self.record(name, path, "image/png")
    }

    /// Diagnostic screenshot that never fails.
    ///
    /// Without a context the file is named by the test title alone.
    pub async fn capture_failure_screenshot(&self, driver: &dyn Driver, context: Option<&str>) -> Option<Attachment> {
        let path = self.store.screenshot_path(&self.title, context);
        if let Err(e) = driver.screenshot(&path, true).await {
            warn!("Could not capture failure screenshot for {}: {}", self.title, e);
            return None;
        }
        let name = context.unwrap_or("failure");
        match self.record(name, path, "image/png") {
            Ok(attachment) => Some(attachment),
            Err(e) => {
                warn!("Could not record failure screenshot for {}: {}", self.title, e);
                None
            }
        }
    }
}
