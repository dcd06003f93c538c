//! Filesystem layout for uploads and rendered output.
//!
//! Everything lives under one root (`static` by default):
//! `backgrounds/`, `logos/`, `signatures/` and `output/`. Rendered certificates
//! are written to `output/<cert_id>.pdf`; the live preview always overwrites
//! `output/preview.pdf`.

use sanitize_filename::{sanitize_with_options, Options};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

pub const PREVIEW_FILE_NAME: &str = "preview.pdf";

/// Longest file name most filesystems accept, in bytes.
const MAX_FILE_NAME_BYTES: usize = 255;

/// Kinds of user uploads, each with its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Logo,
    Signature,
}

impl UploadKind {
    fn dir_name(&self) -> &'static str {
        match self {
            UploadKind::Logo => "logos",
            UploadKind::Signature => "signatures",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the directory layout if it is missing.
    pub fn ensure_layout(&self) -> io::Result<()> {
        for dir in [
            self.backgrounds_dir(),
            self.upload_dir(UploadKind::Logo),
            self.upload_dir(UploadKind::Signature),
            self.output_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn backgrounds_dir(&self) -> PathBuf {
        self.root.join("backgrounds")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn upload_dir(&self, kind: UploadKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn preview_path(&self) -> PathBuf {
        self.output_dir().join(PREVIEW_FILE_NAME)
    }

    pub fn certificate_path(&self, cert_id: &str) -> PathBuf {
        self.output_dir().join(format!("{}.pdf", sanitize_filename(cert_id)))
    }

    /// Background images are referenced by file name relative to
    /// `backgrounds/`. Names that try to leave the directory resolve to nothing.
    pub fn background_path(&self, name: &str) -> Option<PathBuf> {
        if !is_plain_relative(Path::new(name)) {
            return None;
        }
        Some(self.backgrounds_dir().join(name))
    }

    /// Stores an uploaded file as `<prefix>_<sanitized original name>` and
    /// returns its path.
    pub fn save_upload(
        &self,
        kind: UploadKind,
        prefix: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> io::Result<PathBuf> {
        let dir = self.upload_dir(kind);
        fs::create_dir_all(&dir)?;
        let prefix = sanitize_filename(prefix);
        let budget = MAX_FILE_NAME_BYTES.saturating_sub(prefix.len() + 1);
        let name = fit_file_name(&sanitize_filename(original_name), budget);
        let path = dir.join(format!("{}_{}", prefix, name));
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Path of an upload relative to the storage root, as handed back to
    /// clients for re-submission.
    pub fn upload_reference(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
    }

    /// Resolves a reference produced by [`Storage::upload_reference`]. Only
    /// files inside the matching upload directory are accepted.
    pub fn resolve_upload(&self, kind: UploadKind, reference: &str) -> Option<PathBuf> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        let relative = Path::new(reference);
        if !is_plain_relative(relative) {
            return None;
        }
        let relative = relative.strip_prefix(kind.dir_name()).unwrap_or(relative);
        let path = self.upload_dir(kind).join(relative);
        path.is_file().then_some(path)
    }
}

/// Reduces a client supplied name to a plain file name: directories are
/// dropped, characters the filesystem rejects become `_`, leading dots are
/// stripped and the result is capped at 255 bytes.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = sanitize_with_options(
        base,
        Options {
            windows: true,
            truncate: true,
            replacement: "_",
        },
    );
    let cleaned = cleaned.trim_start_matches('.').trim();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Shortens the stem of `name` so the whole name fits in `max_bytes`,
/// keeping the extension when there is room for it.
fn fit_file_name(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot < max_bytes => name.split_at(dot),
        _ => (name, ""),
    };
    let mut cut = max_bytes.saturating_sub(ext.len()).min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &stem[..cut], ext)
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}
