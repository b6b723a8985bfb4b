use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use tokio_util::io::ReaderStream;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::app::auth::{self, AdminAuth};
use crate::app::blob_store::{BlobDownload, BlobStore};
use crate::app::books::{BookError, BookStore, PageUpload};
use crate::editor::BookDraft;
use crate::formats::{
    BookManifest, ErrorResponse, GetBookResponse, ListBooksResponse, SaveManifestResponse,
    SaveMetadataRequest, SaveMetadataResponse, SuccessResponse, UploadPagesResponse,
};
use crate::overlays::reflections::BrowserStorage;
use crate::viewer;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub books: BookStore,
    pub blobs: Arc<dyn BlobStore>,
    pub admin: AdminAuth,
    pub signed_url_ttl_secs: u32,
}

impl AppState {
    pub fn new(blobs: Arc<dyn BlobStore>, admin: AdminAuth, signed_url_ttl_secs: u32) -> Self {
        Self {
            books: BookStore::new(Arc::clone(&blobs)),
            blobs,
            admin,
            signed_url_ttl_secs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Static assets served for unmatched paths, when the directory exists.
    pub web_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            web_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

pub fn router(state: AppState, options: &RouterOptions) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/books", get(list_books).post(create_book))
        .route("/api/books/:book_id", get(get_book).delete(delete_book))
        .route("/api/books/:book_id/manifest", post(save_manifest))
        .route("/api/books/:book_id/upload", post(upload_pages))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/blobs/*path", get(download_blob))
        .route("/", get(home_page))
        .route("/book/:book_id", get(book_page))
        .route("/admin", get(admin_books_page))
        .route("/admin/login", get(admin_login_page))
        .route("/admin/books", get(admin_books_page))
        .route("/admin/new", get(admin_new_book_page))
        .route("/admin/books/:book_id", get(admin_edit_book_page));

    app = match options.web_dir.as_ref().filter(|dir| dir.is_dir()) {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app.fallback(|| async {
            (StatusCode::NOT_FOUND, Html(viewer::render_not_found()))
        }),
    };

    app.layer(middleware::from_fn(auth::require_admin))
        .layer(DefaultBodyLimit::max(options.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn error_json(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

pub(crate) fn book_error_to_status(err: &BookError) -> StatusCode {
    match err {
        BookError::MissingFields
        | BookError::InvalidBookId(_)
        | BookError::InvalidGrade(_)
        | BookError::IdMismatch
        | BookError::NoFiles
        | BookError::InvalidFileType(_)
        | BookError::InvalidFilename(_)
        | BookError::InvalidPageIndex(_) => StatusCode::BAD_REQUEST,
        BookError::NotFound => StatusCode::NOT_FOUND,
        BookError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Unwrap a JSON body, turning malformed or mistyped input into a 400.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            let message = rejection.body_text();
            tracing::debug!(%message, "rejected json body");
            Err(error_json(StatusCode::BAD_REQUEST, &message))
        }
    }
}

/// JSON error body. Store failures log the cause and return `failure` only.
fn book_error_response(err: BookError, failure: &str) -> Response {
    let status = book_error_to_status(&err);
    if let BookError::Store(cause) = &err {
        tracing::error!(error = ?cause, "{failure}");
        return error_json(status, failure);
    }
    error_json(status, &err.to_string())
}

async fn list_books(State(state): State<AppState>) -> Response {
    match state.books.list_books().await {
        Ok(books) => Json(ListBooksResponse { books }).into_response(),
        Err(err) => book_error_response(err, "Failed to list books"),
    }
}

async fn create_book(
    State(state): State<AppState>,
    body: Result<Json<SaveMetadataRequest>, JsonRejection>,
) -> Response {
    let request = match json_body(body) {
        Ok(request) => request,
        Err(resp) => return resp,
    };
    match state.books.save_metadata(request).await {
        Ok((manifest, url)) => Json(SaveMetadataResponse {
            success: true,
            manifest,
            url,
        })
        .into_response(),
        Err(err) => book_error_response(err, "Failed to save book"),
    }
}

async fn get_book(State(state): State<AppState>, Path(book_id): Path<String>) -> Response {
    match state.books.get_manifest(&book_id).await {
        Ok(manifest) => Json(GetBookResponse { manifest }).into_response(),
        Err(BookError::InvalidBookId(_)) => error_json(StatusCode::NOT_FOUND, "Book not found"),
        Err(err) => book_error_response(err, "Failed to fetch book"),
    }
}

async fn delete_book(State(state): State<AppState>, Path(book_id): Path<String>) -> Response {
    match state.books.delete_book(&book_id).await {
        Ok(()) => Json(SuccessResponse { success: true }).into_response(),
        Err(err) => book_error_response(err, "Failed to delete book"),
    }
}

async fn save_manifest(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    body: Result<Json<BookManifest>, JsonRejection>,
) -> Response {
    let manifest = match json_body(body) {
        Ok(manifest) => manifest,
        Err(resp) => return resp,
    };
    match state.books.save_manifest(&book_id, manifest).await {
        Ok((_, url)) => Json(SaveManifestResponse { success: true, url }).into_response(),
        Err(err) => book_error_response(err, "Failed to save manifest"),
    }
}

async fn upload_pages(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let mut files = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return error_json(err.status(), &err.body_text()),
        };
        if !matches!(field.name(), Some("files" | "files[]")) {
            continue;
        }
        // Plain text parts are not files.
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return error_json(err.status(), &err.body_text()),
        };
        files.push(PageUpload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    match state.books.upload_pages(&book_id, files).await {
        Ok(uploads) => Json(UploadPagesResponse {
            success: true,
            uploads,
        })
        .into_response(),
        Err(err) => book_error_response(err, "Failed to upload files"),
    }
}

async fn download_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, StatusCode> {
    let download = state
        .blobs
        .download(&path, state.signed_url_ttl_secs)
        .await
        .map_err(|err| {
            tracing::warn!(%path, ?err, "blob download failed");
            StatusCode::NOT_FOUND
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    match download {
        BlobDownload::Redirect(url) => Ok(Redirect::temporary(&url).into_response()),
        BlobDownload::File { path, content_type } => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|_| StatusCode::NOT_FOUND)?;
            let body = axum::body::Body::from_stream(ReaderStream::new(file));
            let mut resp = Response::new(body);
            resp.headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            Ok(resp)
        }
    }
}

async fn home_page(State(state): State<AppState>) -> Response {
    match state.books.list_books().await {
        Ok(books) => Html(viewer::render_home(&books)).into_response(),
        Err(err) => html_error(err),
    }
}

async fn book_page(State(state): State<AppState>, Path(book_id): Path<String>) -> Response {
    match state.books.get_manifest(&book_id).await {
        Ok(manifest) => {
            Html(viewer::render_book(&manifest, &BrowserStorage)).into_response()
        }
        Err(BookError::NotFound | BookError::InvalidBookId(_)) => {
            (StatusCode::NOT_FOUND, Html(viewer::render_not_found())).into_response()
        }
        Err(err) => html_error(err),
    }
}

async fn admin_login_page(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Html<String> {
    Html(admin::render_login(
        query.get("redirect").map(String::as_str),
        state.admin.is_configured(),
    ))
}

async fn admin_books_page(State(state): State<AppState>) -> Response {
    match state.books.list_books().await {
        Ok(books) => Html(admin::render_book_list(&books)).into_response(),
        Err(err) => html_error(err),
    }
}

async fn admin_new_book_page() -> Html<String> {
    Html(admin::render_editor(&BookDraft::blank(), None))
}

async fn admin_edit_book_page(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    match state.books.get_manifest(&book_id).await {
        Ok(manifest) => {
            let draft = BookDraft::from_manifest(&manifest);
            let tab = query.get("tab").and_then(|raw| admin::parse_tab(raw));
            Html(admin::render_editor(&draft, tab)).into_response()
        }
        Err(BookError::NotFound | BookError::InvalidBookId(_)) => {
            (StatusCode::NOT_FOUND, Html(viewer::render_not_found())).into_response()
        }
        Err(err) => html_error(err),
    }
}

fn html_error(err: BookError) -> Response {
    tracing::error!(error = %err, "page render failed");
    (
        book_error_to_status(&err),
        Html(crate::html::document(
            "Error",
            "",
            "<main><h1>Something went wrong</h1><p><a href=\"/\">Go Home</a></p></main>",
        )),
    )
        .into_response()
}
