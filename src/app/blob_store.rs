use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use sha2::Digest as _;
use tokio::fs;

/// How a stored blob is handed to an HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobDownload {
    /// Stream a local file.
    File {
        path: PathBuf,
        content_type: &'static str,
    },
    /// Redirect to a (signed) URL.
    Redirect(String),
}

/// Object storage addressed by `/`-separated path strings.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Paths of every blob whose path starts with `prefix`.
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
    async fn get(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()>;
    /// Deleting a missing blob is not an error.
    async fn delete(&self, path: &str) -> anyhow::Result<()>;
    async fn download(&self, path: &str, ttl_secs: u32) -> anyhow::Result<Option<BlobDownload>>;
}

/// URL under which the app serves the blob at `path`.
pub fn public_url(path: &str) -> String {
    format!("/blobs/{}", percent_encode_path(path))
}

/// Content type served for a blob, derived from its extension.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Reject empty, absolute and `..` paths before they reach a backend.
fn validate_blob_path(path: &str) -> anyhow::Result<()> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        anyhow::bail!("invalid blob path: {path:?}");
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        anyhow::bail!("invalid blob path: {path:?}");
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LocalFsBlobStore {
    base_dir: PathBuf,
}

impl LocalFsBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn blobs_dir(&self) -> PathBuf {
        self.base_dir.join("blobs")
    }

    fn tmp_dir(&self) -> PathBuf {
        self.base_dir.join("tmp")
    }

    fn blob_path(&self, path: &str) -> anyhow::Result<PathBuf> {
        validate_blob_path(path)?;
        Ok(self.blobs_dir().join(path))
    }
}

#[async_trait]
impl BlobStore for LocalFsBlobStore {
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let root = self.blobs_dir();
        let mut out = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(err).with_context(|| format!("read dir: {}", dir.display()));
                }
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .with_context(|| format!("list dir: {}", dir.display()))?
            {
                let path = entry.path();
                let file_type = entry.file_type().await.context("read file type")?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                let Some(relative) = relative_blob_path(&root, &path) else {
                    continue;
                };
                if relative.starts_with(prefix) {
                    out.push(relative);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    async fn get(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let file_path = self.blob_path(path)?;
        match fs::read(&file_path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read: {}", file_path.display())),
        }
    }

    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> anyhow::Result<()> {
        let file_path = self.blob_path(path)?;
        let parent = file_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", file_path.display()))?;
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
        fs::create_dir_all(self.tmp_dir())
            .await
            .with_context(|| format!("create tmp dir: {}", self.tmp_dir().display()))?;

        // Staged outside blobs/ so listings never see partial writes.
        let tmp_path = self
            .tmp_dir()
            .join(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp_path, &bytes)
            .await
            .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &file_path)
            .await
            .with_context(|| format!("rename tmp to final: {}", file_path.display()))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let file_path = self.blob_path(path)?;
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove: {}", file_path.display())),
        }
    }

    async fn download(&self, path: &str, _ttl_secs: u32) -> anyhow::Result<Option<BlobDownload>> {
        let file_path = self.blob_path(path)?;
        match fs::metadata(&file_path).await {
            Ok(meta) if meta.is_file() => Ok(Some(BlobDownload::File {
                path: file_path,
                content_type: content_type_for(path),
            })),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("stat: {}", file_path.display())),
        }
    }
}

fn relative_blob_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
            _ => return None,
        }
    }
    Some(segments.join("/"))
}

#[derive(Debug, Clone)]
pub struct GcsBlobStore {
    bucket: String,
    client: reqwest::Client,
}

impl GcsBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "https://storage.googleapis.com/storage/v1/b/{bucket}/o/{object}",
            bucket = percent_encode_rfc3986(&self.bucket),
            object = percent_encode_rfc3986(path)
        )
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        #[derive(Debug, serde::Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let url = "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
        let resp = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("request metadata access token")?;
        if !resp.status().is_success() {
            anyhow::bail!("metadata token request failed ({})", resp.status());
        }
        let token: TokenResponse = resp.json().await.context("parse metadata token json")?;
        Ok(token.access_token)
    }

    async fn service_account_email(&self) -> anyhow::Result<String> {
        let url = "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/email";
        let resp = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("request metadata service account email")?;
        if !resp.status().is_success() {
            anyhow::bail!(
                "metadata service account email request failed ({})",
                resp.status()
            );
        }
        let text = resp.text().await.context("read metadata email response")?;
        Ok(text.trim().to_string())
    }

    async fn sign_blob(
        &self,
        access_token: &str,
        service_account_email: &str,
        blob: &[u8],
    ) -> anyhow::Result<Vec<u8>> {
        #[derive(Debug, serde::Serialize)]
        struct SignBlobRequest<'a> {
            payload: &'a str,
        }

        #[derive(Debug, serde::Deserialize)]
        struct SignBlobResponse {
            #[serde(rename = "signedBlob")]
            signed_blob: String,
        }

        let payload_b64 = base64::engine::general_purpose::STANDARD.encode(blob);
        let url = format!(
            "https://iamcredentials.googleapis.com/v1/projects/-/serviceAccounts/{service_account_email}:signBlob"
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&SignBlobRequest {
                payload: payload_b64.as_str(),
            })
            .send()
            .await
            .context("request iamcredentials signBlob")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("iamcredentials signBlob failed ({status}): {body}");
        }
        let result: SignBlobResponse = resp.json().await.context("parse signBlob json")?;
        let signature = base64::engine::general_purpose::STANDARD
            .decode(result.signed_blob)
            .context("decode signedBlob base64")?;
        Ok(signature)
    }

    async fn signed_download_url(
        &self,
        service_account_email: &str,
        object_name: &str,
        ttl_secs: u32,
        now: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<String> {
        let access_token = self.access_token().await.context("get access token")?;

        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let datestamp = now.format("%Y%m%d").to_string();

        let canonical_uri = format!(
            "/{}/{}",
            percent_encode_rfc3986(&self.bucket),
            percent_encode_path(object_name)
        );
        let credential_scope = format!("{datestamp}/auto/storage/goog4_request");
        let canonical_query = canonical_query_string(
            &format!("{service_account_email}/{credential_scope}"),
            &timestamp,
            ttl_secs,
        );

        let canonical_request = format!(
            "GET\n{canonical_uri}\n{canonical_query}\nhost:storage.googleapis.com\n\nhost\nUNSIGNED-PAYLOAD"
        );
        let canonical_request_hash = sha256_hex(&canonical_request);

        let string_to_sign =
            format!("GOOG4-RSA-SHA256\n{timestamp}\n{credential_scope}\n{canonical_request_hash}");
        let signature = self
            .sign_blob(
                &access_token,
                service_account_email,
                string_to_sign.as_bytes(),
            )
            .await
            .context("sign string_to_sign")?;
        let signature_hex = hex::encode(signature);

        Ok(format!(
            "https://storage.googleapis.com{canonical_uri}?{canonical_query}&X-Goog-Signature={signature_hex}"
        ))
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        #[derive(Debug, serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ListResponse {
            #[serde(default)]
            items: Vec<ObjectItem>,
            next_page_token: Option<String>,
        }

        #[derive(Debug, serde::Deserialize)]
        struct ObjectItem {
            name: String,
        }

        let access_token = self.access_token().await.context("get access token")?;
        let url = format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o",
            percent_encode_rfc3986(&self.bucket)
        );

        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("prefix", prefix.to_string()),
                ("fields", "items(name),nextPageToken".to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&access_token)
                .query(&query)
                .send()
                .await
                .context("list gcs objects")?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("gcs list failed ({status}): {body}");
            }
            let page: ListResponse = resp.json().await.context("parse gcs list json")?;
            out.extend(page.items.into_iter().map(|item| item.name));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn get(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        validate_blob_path(path)?;
        let access_token = self.access_token().await.context("get access token")?;
        let resp = self
            .client
            .get(self.object_url(path))
            .bearer_auth(access_token)
            .query(&[("alt", "media")])
            .send()
            .await
            .context("download gcs object")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("gcs download failed ({status}): {body}");
        }
        let bytes = resp.bytes().await.context("read gcs object body")?;
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        validate_blob_path(path)?;
        let access_token = self.access_token().await.context("get access token")?;
        let url = format!(
            "https://storage.googleapis.com/upload/storage/v1/b/{bucket}/o?uploadType=media&name={object}",
            bucket = percent_encode_rfc3986(&self.bucket),
            object = percent_encode_rfc3986(path)
        );

        tracing::debug!(
            bucket = %self.bucket,
            object = %path,
            size = bytes.len(),
            "uploading blob to gcs"
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .context("upload blob to gcs")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("gcs upload failed ({status}): {body}");
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        validate_blob_path(path)?;
        let access_token = self.access_token().await.context("get access token")?;
        let resp = self
            .client
            .delete(self.object_url(path))
            .bearer_auth(access_token)
            .send()
            .await
            .context("delete gcs object")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("gcs delete failed ({status}): {body}");
        }
        Ok(())
    }

    async fn download(&self, path: &str, ttl_secs: u32) -> anyhow::Result<Option<BlobDownload>> {
        validate_blob_path(path)?;
        let service_account_email = self
            .service_account_email()
            .await
            .context("get service account email")?;
        let url = self
            .signed_download_url(&service_account_email, path, ttl_secs, chrono::Utc::now())
            .await?;
        Ok(Some(BlobDownload::Redirect(url)))
    }
}

fn canonical_query_string(credential: &str, timestamp: &str, ttl_secs: u32) -> String {
    let mut query_params = [
        ("X-Goog-Algorithm", "GOOG4-RSA-SHA256".to_string()),
        ("X-Goog-Credential", credential.to_string()),
        ("X-Goog-Date", timestamp.to_string()),
        ("X-Goog-Expires", ttl_secs.to_string()),
        ("X-Goog-SignedHeaders", "host".to_string()),
    ];
    query_params.sort_by(|(a_name, a_value), (b_name, b_value)| {
        a_name.cmp(b_name).then_with(|| a_value.cmp(b_value))
    });
    query_params
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                percent_encode_rfc3986(name),
                percent_encode_rfc3986(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn sha256_hex(input: &str) -> String {
    let digest = sha2::Sha256::digest(input.as_bytes());
    hex::encode(digest)
}

fn percent_encode_rfc3986(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        let is_unreserved = matches!(
            b,
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~'
        );
        if is_unreserved {
            out.push(b as char);
        } else {
            out.push('%');
            out.push_str(&format!("{b:02X}"));
        }
    }
    out
}

fn percent_encode_path(path: &str) -> String {
    path.split('/')
        .map(percent_encode_rfc3986)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_encode_rfc3986_encodes_reserved_chars() {
        assert_eq!(percent_encode_rfc3986("a b"), "a%20b");
        assert_eq!(percent_encode_rfc3986("a/b"), "a%2Fb");
        assert_eq!(percent_encode_rfc3986("me@example.com"), "me%40example.com");
        assert_eq!(percent_encode_rfc3986("~"), "~");
    }

    #[test]
    fn public_url_keeps_slashes_and_encodes_segments() {
        assert_eq!(
            public_url("books/g3/pages/page 1.png"),
            "/blobs/books/g3/pages/page%201.png"
        );
    }

    #[test]
    fn canonical_query_is_sorted_and_encoded() {
        let query = canonical_query_string(
            "svc@example.iam/20250101/auto/storage/goog4_request",
            "20250101T000000Z",
            3600,
        );
        assert!(query.starts_with("X-Goog-Algorithm=GOOG4-RSA-SHA256&X-Goog-Credential=svc%40"));
        assert!(query.ends_with("X-Goog-Expires=3600&X-Goog-SignedHeaders=host"));
    }

    #[test]
    fn blob_paths_cannot_escape_the_store() {
        assert!(validate_blob_path("books/a/manifest.json").is_ok());
        assert!(validate_blob_path("../etc/passwd").is_err());
        assert!(validate_blob_path("books/../x").is_err());
        assert!(validate_blob_path("/abs").is_err());
        assert!(validate_blob_path("books//x").is_err());
        assert!(validate_blob_path("").is_err());
    }

    #[tokio::test]
    async fn local_store_put_get_list_delete() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalFsBlobStore::new(dir.path());

        store
            .put("books/a/manifest.json", b"{}".to_vec(), "application/json")
            .await?;
        store
            .put("books/a/pages/1.png", vec![1, 2, 3], "image/png")
            .await?;
        store
            .put("books/b/manifest.json", b"{}".to_vec(), "application/json")
            .await?;

        assert_eq!(store.get("books/a/pages/1.png").await?, Some(vec![1, 2, 3]));
        assert_eq!(store.get("books/missing/manifest.json").await?, None);
        assert_eq!(
            store.list("books/a/").await?,
            vec!["books/a/manifest.json", "books/a/pages/1.png"]
        );
        assert_eq!(store.list("books/").await?.len(), 3);

        store.delete("books/a/pages/1.png").await?;
        store.delete("books/a/pages/1.png").await?;
        assert_eq!(store.list("books/a/").await?, vec!["books/a/manifest.json"]);
        Ok(())
    }

    #[tokio::test]
    async fn local_store_lists_nothing_before_first_write() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalFsBlobStore::new(dir.path().join("fresh"));
        assert!(store.list("books/").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn local_download_serves_file_with_content_type() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalFsBlobStore::new(dir.path());
        store
            .put("books/a/pages/cover.JPG", vec![0xff], "image/jpeg")
            .await?;

        match store.download("books/a/pages/cover.JPG", 3600).await? {
            Some(BlobDownload::File { content_type, .. }) => {
                assert_eq!(content_type, "image/jpeg");
            }
            other => panic!("unexpected download: {other:?}"),
        }
        assert_eq!(store.download("books/a/pages/none.png", 3600).await?, None);
        Ok(())
    }
}
