use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use tokio::task::JoinSet;

use crate::app::blob_store::{BlobStore, public_url};
use crate::formats::{
    BookManifest, BookMetadata, Grade, PageIndex, SaveMetadataRequest, UploadedPage,
};

const BOOKS_PREFIX: &str = "books/";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum BookError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Invalid book ID: {0}")]
    InvalidBookId(String),
    #[error("Invalid grade: {0}")]
    InvalidGrade(String),
    #[error("Book ID mismatch")]
    IdMismatch,
    #[error("No files provided")]
    NoFiles,
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
    #[error("Invalid page index: {0}")]
    InvalidPageIndex(PageIndex),
    #[error("Book not found")]
    NotFound,
    #[error("blob store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// One file of a page upload batch.
#[derive(Debug, Clone)]
pub struct PageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub fn manifest_path(book_id: &str) -> String {
    format!("{BOOKS_PREFIX}{book_id}/{MANIFEST_FILE}")
}

/// Only `books/{id}/manifest.json` is a manifest; a page image that happens to
/// be named `manifest.json` lives one level deeper and is not.
fn is_manifest_path(path: &str) -> bool {
    path.strip_prefix(BOOKS_PREFIX)
        .and_then(|rest| rest.split_once('/'))
        .is_some_and(|(book_id, rest)| {
            rest == MANIFEST_FILE && validate_book_id(book_id).is_ok()
        })
}

pub fn page_path(book_id: &str, filename: &str) -> String {
    format!("{BOOKS_PREFIX}{book_id}/pages/{filename}")
}

/// Book ids end up in blob paths and URLs, so only `[A-Za-z0-9_-]` is allowed.
pub fn validate_book_id(book_id: &str) -> Result<(), BookError> {
    let valid = !book_id.is_empty()
        && book_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !valid {
        return Err(BookError::InvalidBookId(book_id.to_string()));
    }
    Ok(())
}

fn validate_filename(filename: &str) -> Result<(), BookError> {
    let invalid = filename.trim().is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..");
    if invalid {
        return Err(BookError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

fn required(value: Option<String>) -> Result<String, BookError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(BookError::MissingFields)
}

/// Book CRUD on top of a [`BlobStore`]. Manifest writes are last-write-wins.
#[derive(Clone)]
pub struct BookStore {
    blobs: Arc<dyn BlobStore>,
}

impl BookStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Metadata of every stored book, most recently updated first.
    pub async fn list_books(&self) -> Result<Vec<BookMetadata>, BookError> {
        let paths = self
            .blobs
            .list(BOOKS_PREFIX)
            .await
            .context("list book blobs")?;

        let mut tasks = JoinSet::new();
        for path in paths
            .into_iter()
            .filter(|path| is_manifest_path(path))
        {
            let blobs = Arc::clone(&self.blobs);
            tasks.spawn(async move {
                let manifest = read_manifest(blobs.as_ref(), &path).await;
                (path, manifest)
            });
        }

        let mut books = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (path, manifest) = joined.context("join manifest fetch")?;
            match manifest.with_context(|| format!("fetch {path}"))? {
                Some(manifest) => books.push(manifest.metadata()),
                None => tracing::warn!(%path, "manifest disappeared while listing"),
            }
        }
        books.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(books)
    }

    /// Create a book, or update the metadata of an existing one.
    ///
    /// Pages, interactive pages and `createdAt` of an existing manifest are
    /// kept.
    pub async fn save_metadata(
        &self,
        request: SaveMetadataRequest,
    ) -> Result<(BookManifest, String), BookError> {
        let book_id = required(request.book_id)?;
        let title = required(request.title)?;
        let grade_raw = required(request.grade)?;
        validate_book_id(&book_id)?;
        let grade: Grade = grade_raw
            .parse()
            .map_err(|_| BookError::InvalidGrade(grade_raw.clone()))?;
        let lesson_name = request
            .lesson_name
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let now = Utc::now();
        let mut manifest = match self.load(&book_id).await? {
            Some(existing) => existing,
            None => BookManifest::new(&book_id, &title, grade, now),
        };
        manifest.title = title;
        manifest.grade = grade;
        manifest.lesson_name = lesson_name;
        manifest.touch(now);

        let url = self.write(&manifest).await?;
        tracing::info!(book_id = %book_id, "saved book metadata");
        Ok((manifest, url))
    }

    pub async fn get_manifest(&self, book_id: &str) -> Result<BookManifest, BookError> {
        validate_book_id(book_id)?;
        self.load(book_id).await?.ok_or(BookError::NotFound)
    }

    /// Overwrite the whole manifest of `book_id`.
    pub async fn save_manifest(
        &self,
        book_id: &str,
        mut manifest: BookManifest,
    ) -> Result<(BookManifest, String), BookError> {
        validate_book_id(book_id)?;
        if manifest.book_id != book_id {
            return Err(BookError::IdMismatch);
        }
        let indices = manifest.pages.iter().map(|page| page.index);
        if let Some(index) = indices
            .chain(manifest.interactive_pages.keys().copied())
            .find(|index| *index == 0)
        {
            return Err(BookError::InvalidPageIndex(index));
        }
        manifest.touch(Utc::now());
        let url = self.write(&manifest).await?;
        tracing::info!(
            book_id = %book_id,
            pages = manifest.pages.len(),
            interactive = manifest.interactive_pages.len(),
            "saved book manifest"
        );
        Ok((manifest, url))
    }

    /// Delete every blob under `books/{id}/`. Not atomic; unknown books succeed.
    pub async fn delete_book(&self, book_id: &str) -> Result<(), BookError> {
        validate_book_id(book_id)?;
        let prefix = format!("{BOOKS_PREFIX}{book_id}/");
        let paths = self
            .blobs
            .list(&prefix)
            .await
            .with_context(|| format!("list {prefix}"))?;
        let count = paths.len();

        let mut tasks = JoinSet::new();
        for path in paths {
            let blobs = Arc::clone(&self.blobs);
            tasks.spawn(async move {
                let result = blobs.delete(&path).await;
                (path, result)
            });
        }

        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            let (path, result) = joined.context("join blob delete")?;
            if let Err(err) = result {
                tracing::error!(book_id = %book_id, %path, ?err, "failed to delete blob");
                if first_err.is_none() {
                    first_err = Some(err.context(format!("delete {path}")));
                }
            }
        }
        if let Some(err) = first_err {
            return Err(err.into());
        }
        tracing::info!(book_id = %book_id, blobs = count, "deleted book");
        Ok(())
    }

    /// Store page images under `books/{id}/pages/`. The manifest is untouched.
    ///
    /// Every file is validated before anything is written.
    pub async fn upload_pages(
        &self,
        book_id: &str,
        files: Vec<PageUpload>,
    ) -> Result<Vec<UploadedPage>, BookError> {
        validate_book_id(book_id)?;
        if files.is_empty() {
            return Err(BookError::NoFiles);
        }
        for file in &files {
            let is_image = file
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"));
            if !is_image {
                return Err(BookError::InvalidFileType(file.filename.clone()));
            }
            validate_filename(&file.filename)?;
        }

        let mut tasks = JoinSet::new();
        for (position, file) in files.into_iter().enumerate() {
            let blobs = Arc::clone(&self.blobs);
            let path = page_path(book_id, &file.filename);
            tasks.spawn(async move {
                let size = file.bytes.len() as u64;
                let content_type = file
                    .content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let result = blobs.put(&path, file.bytes, &content_type).await;
                let uploaded = UploadedPage {
                    filename: file.filename,
                    url: public_url(&path),
                    size,
                };
                (position, result.map(|()| uploaded))
            });
        }

        let mut uploads = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (position, result) = joined.context("join page upload")?;
            uploads.push((position, result.context("store page image")?));
        }
        uploads.sort_by_key(|(position, _)| *position);
        tracing::info!(book_id = %book_id, files = uploads.len(), "uploaded pages");
        Ok(uploads.into_iter().map(|(_, upload)| upload).collect())
    }

    async fn load(&self, book_id: &str) -> anyhow::Result<Option<BookManifest>> {
        let path = manifest_path(book_id);
        read_manifest(self.blobs.as_ref(), &path)
            .await
            .with_context(|| format!("read {path}"))
    }

    async fn write(&self, manifest: &BookManifest) -> anyhow::Result<String> {
        let path = manifest_path(&manifest.book_id);
        let data = serde_json::to_vec_pretty(manifest).context("serialize manifest")?;
        self.blobs
            .put(&path, data, "application/json")
            .await
            .with_context(|| format!("write {path}"))?;
        Ok(public_url(&path))
    }
}

async fn read_manifest(blobs: &dyn BlobStore, path: &str) -> anyhow::Result<Option<BookManifest>> {
    let Some(bytes) = blobs.get(path).await? else {
        return Ok(None);
    };
    let manifest = serde_json::from_slice(&bytes).context("parse manifest json")?;
    Ok(Some(manifest))
}
