//! Attachment manager: stores uploaded files under the upload root, tracks
//! them by stored reference, and removes them when a problem drops them.
//!
//! A stored reference has the form `uploads/<token>_<sanitized name>` where
//! `<token>` is 32 lowercase hex characters. The token makes names
//! collision-free; everything after the first `_` is the display name used
//! when the file is downloaded.
//!
//! File writes are not transactional with the database. Updates therefore go
//! through a [`Reconciliation`]: new uploads are written first, and only after
//! the database write succeeds are dropped files deleted. A failed write
//! removes the new uploads instead, leaving the stored list intact.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::CoreError;

/// Extensions accepted by [`AttachmentStore::store`].
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "pdf"];

/// Extensions served with `Content-Disposition: inline` by default.
pub const INLINE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "pdf"];

/// Prefix of every stored reference.
pub const REFERENCE_PREFIX: &str = "uploads/";

/// Fallback content type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Lowercased extension of `file_name`, if it has one.
pub fn extension_of(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Whether `file_name` carries one of the [`ALLOWED_EXTENSIONS`].
pub fn is_allowed_file(file_name: &str) -> bool {
    extension_of(file_name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Reduce an uploaded file name to a safe, flat file name.
///
/// Non-ASCII characters are dropped, path separators become spaces, runs of
/// whitespace become a single `_`, any character outside `[A-Za-z0-9._-]` is
/// removed, and leading/trailing `.` and `_` are stripped. The result may be
/// empty.
pub fn sanitize_filename(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Random 32-hex-character token used to prefix stored names.
pub fn unique_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Stored file name for an already sanitized name.
pub fn stored_name(token: &str, sanitized: &str) -> String {
    format!("{token}_{sanitized}")
}

/// Recover the name shown to users by stripping the leading token segment.
pub fn display_name(stored: &str) -> &str {
    match stored.split_once('_') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => stored,
    }
}

/// Content type for a file name, from a fixed table.
pub fn mime_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => OCTET_STREAM,
    }
}

/// How a served file should be presented by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// Images and PDFs open inline unless a download is forced.
pub fn disposition_for(file_name: &str, force_download: bool) -> Disposition {
    let inline = extension_of(file_name)
        .is_some_and(|ext| INLINE_EXTENSIONS.contains(&ext.as_str()));
    if inline && !force_download {
        Disposition::Inline
    } else {
        Disposition::Attachment
    }
}

/// Map a reference (with or without the `uploads/` prefix) to the stored
/// file name, refusing anything that could escape the upload root.
pub fn stored_name_from_reference(reference: &str) -> Option<&str> {
    let name = reference.strip_prefix(REFERENCE_PREFIX).unwrap_or(reference);
    let safe = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..");
    safe.then_some(name)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// The outcome of [`AttachmentStore::reconcile`], pending the database write.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    files: Vec<String>,
    stored: Vec<String>,
    dropped: Vec<String>,
}

impl Reconciliation {
    /// The new file list to persist.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// References the new list no longer holds.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }
}

/// A stored file opened for serving.
#[derive(Debug)]
pub struct ServedFile {
    pub file: tokio::fs::File,
    pub size: u64,
    pub mime_type: &'static str,
    pub disposition: Disposition,
    pub display_name: String,
}

/// Filesystem-backed attachment storage rooted at a single directory.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload root if it does not exist.
    pub async fn ensure_root(&self) -> Result<(), CoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to create upload directory: {e}")))
    }

    fn path_for(&self, reference: &str) -> Option<PathBuf> {
        stored_name_from_reference(reference).map(|name| self.root.join(name))
    }

    /// Persist `upload` and return its reference.
    ///
    /// Returns `Ok(None)` when the upload is rejected: empty file name, an
    /// extension outside [`ALLOWED_EXTENSIONS`], or a name that sanitizes
    /// away its extension.
    pub async fn store(&self, upload: &Upload) -> Result<Option<String>, CoreError> {
        if upload.file_name.trim().is_empty() || !is_allowed_file(&upload.file_name) {
            tracing::debug!(file_name = %upload.file_name, "Rejected upload");
            return Ok(None);
        }
        let sanitized = sanitize_filename(&upload.file_name);
        if !is_allowed_file(&sanitized) {
            tracing::debug!(file_name = %upload.file_name, "Rejected upload after sanitizing");
            return Ok(None);
        }

        let name = stored_name(&unique_token(), &sanitized);
        self.ensure_root().await?;
        tokio::fs::write(self.root.join(&name), &upload.bytes)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to write upload: {e}")))?;

        let reference = format!("{REFERENCE_PREFIX}{name}");
        tracing::info!(%reference, size = upload.bytes.len(), "Stored attachment");
        Ok(Some(reference))
    }

    /// Delete a stored file. Failures are logged and reported as `false`.
    pub async fn remove(&self, reference: &str) -> bool {
        let Some(path) = self.path_for(reference) else {
            tracing::warn!(%reference, "Refusing to remove unsafe attachment reference");
            return false;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(%reference, "Removed attachment");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(%reference, "Attachment already absent");
                false
            }
            Err(e) => {
                tracing::error!(%reference, error = %e, "Failed to remove attachment");
                false
            }
        }
    }

    /// Remove every reference in `references`, best-effort.
    pub async fn remove_all(&self, references: &[String]) {
        for reference in references {
            self.remove(reference).await;
        }
    }

    /// Plan a problem's new file list.
    ///
    /// Every upload goes through [`store`](Self::store), and the resulting
    /// list is `kept` followed by the successfully stored uploads, in order.
    /// Nothing is deleted yet: references in `old` but not in `kept` are
    /// removed by [`apply`](Self::apply) once the new list is persisted, and
    /// [`discard`](Self::discard) undoes the plan if persisting fails.
    pub async fn reconcile(
        &self,
        old: &[String],
        kept: &[String],
        uploads: &[Upload],
    ) -> Result<Reconciliation, CoreError> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.store(upload).await {
                Ok(Some(reference)) => stored.push(reference),
                Ok(None) => {}
                Err(e) => {
                    self.remove_all(&stored).await;
                    return Err(e);
                }
            }
        }

        let mut files = kept.to_vec();
        files.extend(stored.iter().cloned());
        Ok(Reconciliation {
            files,
            stored,
            dropped: old.iter().filter(|r| !kept.contains(r)).cloned().collect(),
        })
    }

    /// Finish a plan whose file list was persisted: delete the dropped files.
    pub async fn apply(&self, plan: Reconciliation) {
        self.remove_all(&plan.dropped).await;
    }

    /// Abandon a plan whose file list was not persisted: delete the uploads it
    /// stored and leave the old files alone.
    pub async fn discard(&self, plan: Reconciliation) {
        self.remove_all(&plan.stored).await;
    }

    /// Open a stored file for serving.
    pub async fn open(&self, reference: &str, force_download: bool) -> Result<ServedFile, CoreError> {
        let not_found = || CoreError::NotFoundByKey {
            entity: "File",
            key: reference.to_string(),
        };
        let name = stored_name_from_reference(reference).ok_or_else(not_found)?;
        let path = self.root.join(name);

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(CoreError::Internal(format!("Failed to open attachment: {e}"))),
        };
        let metadata = file
            .metadata()
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to stat attachment: {e}")))?;
        if !metadata.is_file() {
            return Err(not_found());
        }

        Ok(ServedFile {
            file,
            size: metadata.len(),
            mime_type: mime_type_for(name),
            disposition: disposition_for(name, force_download),
            display_name: display_name(name).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> AttachmentStore {
        AttachmentStore::new(dir.path())
    }

    fn on_disk(store: &AttachmentStore, reference: &str) -> bool {
        store.path_for(reference).is_some_and(|p| p.exists())
    }

    // -- naming ------------------------------------------------------------

    #[test]
    fn extension_checks_are_case_insensitive() {
        assert!(is_allowed_file("scan.PDF"));
        assert!(is_allowed_file("photo.jpeg"));
        assert!(!is_allowed_file("payload.exe"));
        assert!(!is_allowed_file("noextension"));
        assert!(!is_allowed_file("trailingdot."));
    }

    #[test]
    fn sanitize_flattens_paths_and_spaces() {
        assert_eq!(sanitize_filename("My Photo.png"), "My_Photo.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("C:\\temp\\shot.jpg"), "C_temp_shot.jpg");
        assert_eq!(sanitize_filename("résumé (v2).pdf"), "rsum_v2.pdf");
        assert_eq!(sanitize_filename("..."), "");
    }

    #[test]
    fn display_name_strips_token() {
        assert_eq!(display_name("0123abcd_my_photo.png"), "my_photo.png");
        assert_eq!(display_name("plain.png"), "plain.png");
    }

    #[test]
    fn mime_and_disposition_tables() {
        assert_eq!(mime_type_for("a.pdf"), "application/pdf");
        assert_eq!(mime_type_for("a.JPG"), "image/jpeg");
        assert_eq!(mime_type_for("a.txt"), OCTET_STREAM);
        assert_eq!(disposition_for("a.png", false), Disposition::Inline);
        assert_eq!(disposition_for("a.png", true), Disposition::Attachment);
        assert_eq!(disposition_for("a.txt", false), Disposition::Attachment);
    }

    #[test]
    fn references_cannot_escape_root() {
        assert_eq!(stored_name_from_reference("uploads/abc_x.png"), Some("abc_x.png"));
        assert_eq!(stored_name_from_reference("abc_x.png"), Some("abc_x.png"));
        assert_eq!(stored_name_from_reference("uploads/../secret"), None);
        assert_eq!(stored_name_from_reference("uploads/sub/x.png"), None);
        assert_eq!(stored_name_from_reference("uploads/.hidden"), None);
        assert_eq!(stored_name_from_reference(""), None);
    }

    // -- storage -----------------------------------------------------------

    #[tokio::test]
    async fn store_rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let result = store.store(&Upload::new("payload.exe", b"MZ".to_vec())).await;
        assert_matches!(result, Ok(None));
    }

    #[tokio::test]
    async fn store_accepts_png_and_preserves_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let reference = store
            .store(&Upload::new("photo.png", b"\x89PNG".to_vec()))
            .await
            .unwrap()
            .expect("png should be stored");

        assert!(reference.starts_with(REFERENCE_PREFIX));
        assert!(reference.ends_with("_photo.png"));
        let name = stored_name_from_reference(&reference).unwrap();
        assert_eq!(name.split_once('_').unwrap().0.len(), 32);
        assert!(on_disk(&store, &reference));
    }

    #[tokio::test]
    async fn same_name_twice_gets_distinct_references() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let upload = Upload::new("photo.png", b"x".to_vec());
        let a = store.store(&upload).await.unwrap().unwrap();
        let b = store.store(&upload).await.unwrap().unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn reconcile_removes_dropped_and_appends_new() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let a = store.store(&Upload::new("a.png", b"a".to_vec())).await.unwrap().unwrap();
        let b = store.store(&Upload::new("b.pdf", b"b".to_vec())).await.unwrap().unwrap();

        let plan = store
            .reconcile(
                &[a.clone(), b.clone()],
                &[b.clone()],
                &[
                    Upload::new("c.gif", b"c".to_vec()),
                    Upload::new("skip.exe", b"x".to_vec()),
                ],
            )
            .await
            .unwrap();

        let files = plan.files().to_vec();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0], b);
        assert!(files[1].ends_with("_c.gif"));
        assert_eq!(plan.dropped(), &[a.clone()]);
        // Dropped files survive until the plan is applied.
        assert!(on_disk(&store, &a));

        store.apply(plan).await;
        assert!(!on_disk(&store, &a));
        assert!(on_disk(&store, &b));
        assert!(on_disk(&store, &files[1]));
    }

    #[tokio::test]
    async fn discarded_reconcile_keeps_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let a = store.store(&Upload::new("a.png", b"a".to_vec())).await.unwrap().unwrap();

        let plan = store
            .reconcile(&[a.clone()], &[], &[Upload::new("c.gif", b"c".to_vec())])
            .await
            .unwrap();
        let new = plan.files()[0].clone();
        assert!(on_disk(&store, &new));

        store.discard(plan).await;
        assert!(on_disk(&store, &a));
        assert!(!on_disk(&store, &new));
    }

    #[tokio::test]
    async fn remove_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.remove("uploads/deadbeef_gone.png").await);
    }

    #[tokio::test]
    async fn open_reports_type_and_display_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let reference = store
            .store(&Upload::new("manual.pdf", b"%PDF-1.4".to_vec()))
            .await
            .unwrap()
            .unwrap();

        let served = store.open(&reference, false).await.unwrap();
        assert_eq!(served.mime_type, "application/pdf");
        assert_eq!(served.disposition, Disposition::Inline);
        assert_eq!(served.display_name, "manual.pdf");
        assert_eq!(served.size, 8);

        let forced = store.open(&reference, true).await.unwrap();
        assert_eq!(forced.disposition, Disposition::Attachment);
    }

    #[tokio::test]
    async fn open_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_matches!(
            store.open("uploads/nothing_here.png", false).await,
            Err(CoreError::NotFoundByKey { .. })
        );
        assert_matches!(
            store.open("uploads/../Cargo.toml", false).await,
            Err(CoreError::NotFoundByKey { .. })
        );
    }
}
