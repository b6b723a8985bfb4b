use anyhow::Context as _;
use url::Url;

use crate::formats::{
    BookManifest, BookMetadata, ErrorResponse, GetBookResponse, ListBooksResponse,
    SaveManifestResponse, SaveMetadataRequest, SaveMetadataResponse, UploadPagesResponse,
    UploadedPage,
};

/// A page image to send to the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Thin client for the book HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(server: &str) -> anyhow::Result<Self> {
        let base =
            Url::parse(server.trim()).with_context(|| format!("parse server url: {server}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("server url must be http or https: {server}");
        }
        Ok(Self {
            base,
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("server url cannot be a base: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn list_books(&self) -> anyhow::Result<Vec<BookMetadata>> {
        let url = self.endpoint(&["api", "books"])?;
        let resp = self.http.get(url).send().await.context("request book list")?;
        let body: ListBooksResponse = decode(resp).await?;
        Ok(body.books)
    }

    pub async fn save_metadata(
        &self,
        request: &SaveMetadataRequest,
    ) -> anyhow::Result<SaveMetadataResponse> {
        let url = self.endpoint(&["api", "books"])?;
        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .context("request metadata save")?;
        decode(resp).await
    }

    pub async fn get_manifest(&self, book_id: &str) -> anyhow::Result<BookManifest> {
        let url = self.endpoint(&["api", "books", book_id])?;
        let resp = self.http.get(url).send().await.context("request manifest")?;
        let body: GetBookResponse = decode(resp).await?;
        Ok(body.manifest)
    }

    pub async fn save_manifest(
        &self,
        manifest: &BookManifest,
    ) -> anyhow::Result<SaveManifestResponse> {
        let url = self.endpoint(&["api", "books", &manifest.book_id, "manifest"])?;
        let resp = self
            .http
            .post(url)
            .json(manifest)
            .send()
            .await
            .context("request manifest save")?;
        decode(resp).await
    }

    pub async fn delete_book(&self, book_id: &str) -> anyhow::Result<()> {
        let url = self.endpoint(&["api", "books", book_id])?;
        let resp = self
            .http
            .delete(url)
            .send()
            .await
            .context("request book delete")?;
        let _: serde_json::Value = decode(resp).await?;
        Ok(())
    }

    pub async fn upload_pages(
        &self,
        book_id: &str,
        files: Vec<UploadFile>,
    ) -> anyhow::Result<Vec<UploadedPage>> {
        let url = self.endpoint(&["api", "books", book_id, "upload"])?;
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.filename)
                .mime_str(file.content_type)
                .context("set upload content type")?;
            form = form.part("files", part);
        }
        let resp = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("request page upload")?;
        let body: UploadPagesResponse = decode(resp).await?;
        Ok(body.uploads)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> anyhow::Result<T> {
    let status = resp.status();
    let bytes = resp.bytes().await.context("read response body")?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorResponse>(&bytes)
            .map(|body| body.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).trim().to_string());
        anyhow::bail!("server returned {status}: {message}");
    }
    serde_json::from_slice(&bytes).context("parse response json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_encode_segments_under_base_path() -> anyhow::Result<()> {
        let client = ApiClient::new("http://127.0.0.1:8080")?;
        assert_eq!(
            client.endpoint(&["api", "books", "g3"])?.as_str(),
            "http://127.0.0.1:8080/api/books/g3"
        );

        let client = ApiClient::new("https://books.example/cms/")?;
        assert_eq!(
            client.endpoint(&["api", "books", "a b"])?.as_str(),
            "https://books.example/cms/api/books/a%20b"
        );
        Ok(())
    }

    #[test]
    fn rejects_non_http_servers() {
        assert!(ApiClient::new("ftp://example.com").is_err());
        assert!(ApiClient::new("not a url").is_err());
    }
}
