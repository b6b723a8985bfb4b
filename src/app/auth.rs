use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::app::routes::{AppState, error_json, json_body};
use crate::formats::{LoginRequest, SuccessResponse};

pub const ADMIN_COOKIE: &str = "admin";
const LOGIN_PATH: &str = "/admin/login";

/// Shared admin password. Login is refused when none is configured.
#[derive(Debug, Clone, Default)]
pub struct AdminAuth {
    password: Option<String>,
}

impl AdminAuth {
    pub fn new(password: Option<String>) -> Self {
        Self {
            password: password.filter(|p| !p.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.password.is_some()
    }

    fn accepts(&self, candidate: &str) -> bool {
        self.password.as_deref() == Some(candidate)
    }
}

pub fn is_admin(jar: &CookieJar) -> bool {
    jar.get(ADMIN_COOKIE)
        .is_some_and(|cookie| cookie.value() == "1")
}

/// Paths behind the admin cookie: `/admin` and everything below it, except
/// the login page itself.
pub fn requires_admin(path: &str) -> bool {
    let admin = path == "/admin" || path.starts_with("/admin/");
    admin && path != LOGIN_PATH
}

pub fn login_redirect(path: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
    format!("{LOGIN_PATH}?redirect={encoded}")
}

pub async fn require_admin(jar: CookieJar, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if requires_admin(path) && !is_admin(&jar) {
        tracing::debug!(%path, "admin cookie missing; redirecting to login");
        return Redirect::temporary(&login_redirect(path)).into_response();
    }
    next.run(request).await
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    if !state.admin.is_configured() {
        return error_json(StatusCode::FORBIDDEN, "Admin login is not configured");
    }
    if !state.admin.accepts(&body.password) {
        tracing::warn!("rejected admin login");
        return error_json(StatusCode::UNAUTHORIZED, "Invalid password");
    }

    let cookie = Cookie::build((ADMIN_COOKIE, "1"))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), Json(SuccessResponse { success: true })).into_response()
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build((ADMIN_COOKIE, "")).path("/"));
    (jar, Json(SuccessResponse { success: true }))
}
