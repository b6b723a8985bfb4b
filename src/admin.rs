//! Server-rendered admin pages.

use crate::app::auth::requires_admin;
use crate::editor::{BookDraft, EditorTab};
use crate::formats::{ActivityKind, BookMetadata, Grade};
use crate::html::{document, escape, percent};

const ADMIN_SCRIPT: &str = r#"
<script>
async function flipbookRequest(method, url, body) {
  var init = { method: method, headers: {} };
  if (body !== undefined) {
    init.headers['Content-Type'] = 'application/json';
    init.body = JSON.stringify(body);
  }
  var resp = await fetch(url, init);
  var data = await resp.json().catch(function () { return {}; });
  if (!resp.ok) throw new Error(data.error || ('HTTP ' + resp.status));
  return data;
}
document.addEventListener('click', async function (event) {
  var target = event.target.closest('[data-delete-book]');
  if (target) {
    var id = target.getAttribute('data-delete-book');
    if (!confirm('Delete "' + id + '" and all of its pages?')) return;
    try {
      await flipbookRequest('DELETE', '/api/books/' + encodeURIComponent(id));
      window.location.href = '/admin/books';
    } catch (err) { alert(err.message); }
  }
  if (event.target.closest('[data-logout]')) {
    await fetch('/api/auth/logout', { method: 'POST' });
    window.location.href = '/admin/login';
  }
});
var metadataForm = document.getElementById('metadata-form');
if (metadataForm) {
  metadataForm.addEventListener('submit', async function (event) {
    event.preventDefault();
    var form = new FormData(metadataForm);
    var body = {
      bookId: (form.get('bookId') || '').trim(),
      title: (form.get('title') || '').trim(),
      grade: form.get('grade'),
      lessonName: (form.get('lessonName') || '').trim()
    };
    var status = document.getElementById('metadata-status');
    if (!body.bookId || !body.title) {
      status.textContent = 'Please fill in Book ID and Title';
      return;
    }
    try {
      await flipbookRequest('POST', '/api/books', body);
      window.location.href = '/admin/books/' + encodeURIComponent(body.bookId) + '?tab=pages';
    } catch (err) { status.textContent = err.message; }
  });
}
var loginForm = document.getElementById('login-form');
if (loginForm) {
  loginForm.addEventListener('submit', async function (event) {
    event.preventDefault();
    var password = new FormData(loginForm).get('password');
    try {
      await flipbookRequest('POST', '/api/auth/login', { password: password });
      window.location.href = loginForm.getAttribute('data-redirect');
    } catch (err) {
      document.getElementById('login-status').textContent = err.message;
    }
  });
}
</script>
"#;

/// Only admin-local redirect targets are honored after login.
pub fn safe_redirect(redirect: Option<&str>) -> &str {
    match redirect {
        Some(target) if requires_admin(target) => target,
        _ => "/admin",
    }
}

pub fn render_login(redirect: Option<&str>, configured: bool) -> String {
    let notice = if configured {
        String::new()
    } else {
        r#"<p class="warning">Admin login is disabled: no admin password is configured on the server.</p>"#
            .to_string()
    };
    let body = format!(
        r#"<main><div class="card" style="max-width: 360px; margin: 64px auto;">
<h1>Admin Login</h1>
{notice}
<form id="login-form" data-redirect="{redirect}">
<p><input type="password" name="password" placeholder="Password" required style="width: 100%; padding: 8px;"></p>
<p><button type="submit" class="primary">Log in</button> <span id="login-status" class="error"></span></p>
</form>
</div></main>"#,
        redirect = escape(safe_redirect(redirect)),
    );
    document("Admin Login", ADMIN_SCRIPT, &body)
}

pub fn render_book_list(books: &[BookMetadata]) -> String {
    let mut body = String::from(
        r#"<main><header style="display: flex; justify-content: space-between; align-items: center;"><h1>Books</h1><div><a class="button primary" href="/admin/new">New Book</a> <button type="button" data-logout>Log out</button></div></header>"#,
    );
    body.push_str(r#"<div class="card">"#);
    if books.is_empty() {
        body.push_str(r#"<p class="muted">No books yet. Create one to get started.</p>"#);
    } else {
        body.push_str(
            "<table><thead><tr><th>Book ID</th><th>Title</th><th>Grade</th><th>Lesson</th><th>Pages</th><th>Updated</th><th></th></tr></thead><tbody>",
        );
        for book in books {
            body.push_str(&format!(
                r#"<tr><td><code>{id}</code></td><td>{title}</td><td>{grade}</td><td>{lesson}</td><td>{count}</td><td>{updated}</td><td><a class="button" href="/admin/books/{id}">Edit</a> <a class="button" href="/book/{id}">View</a> <button type="button" data-delete-book="{id}">Delete</button></td></tr>"#,
                id = escape(&book.book_id),
                title = escape(&book.title),
                grade = escape(&book.grade.label()),
                lesson = escape(book.lesson_name.as_deref().unwrap_or("")),
                count = book.page_count,
                updated = book.updated_at.format("%Y-%m-%d %H:%M UTC"),
            ));
        }
        body.push_str("</tbody></table>");
    }
    body.push_str("</div></main>");
    document("Books · Admin", ADMIN_SCRIPT, &body)
}

/// Editor for one book. A requested tab that is not enabled falls back to the
/// draft's initial tab.
pub fn render_editor(draft: &BookDraft, requested: Option<EditorTab>) -> String {
    let tab = requested
        .filter(|tab| draft.tab_enabled(*tab))
        .unwrap_or_else(|| draft.initial_tab());
    let heading = if draft.is_new() {
        "New Book".to_string()
    } else {
        escape(&draft.title)
    };

    let mut body = format!(
        r#"<main><p><a href="/admin/books">&larr; Books</a></p><h1>{heading}</h1><nav class="tabs" style="display: flex; gap: 8px; margin-bottom: 16px;">"#
    );
    for candidate in EditorTab::ALL {
        let label = candidate.title();
        if !draft.tab_enabled(candidate) {
            body.push_str(&format!(r#"<button type="button" disabled>{label}</button>"#));
        } else if candidate == tab {
            body.push_str(&format!(
                r#"<span class="button primary" aria-current="page">{label}</span>"#
            ));
        } else {
            body.push_str(&format!(
                r#"<a class="button" href="{href}">{label}</a>"#,
                href = tab_href(draft, candidate),
            ));
        }
    }
    body.push_str("</nav>");

    body.push_str(r#"<section class="card">"#);
    match tab {
        EditorTab::BookInfo => body.push_str(&render_metadata_form(draft)),
        EditorTab::Pages => body.push_str(&render_pages(draft)),
        EditorTab::Interactive => body.push_str(&render_interactive(draft)),
    }
    body.push_str("</section>");

    body.push_str(&format!(
        r#"<footer class="muted">{summary}</footer></main>"#,
        summary = draft.summary(),
    ));
    let title = if draft.is_new() {
        "New Book"
    } else {
        draft.title.as_str()
    };
    document(title, ADMIN_SCRIPT, &body)
}

fn tab_href(draft: &BookDraft, tab: EditorTab) -> String {
    let query = match tab {
        EditorTab::BookInfo => "info",
        EditorTab::Pages => "pages",
        EditorTab::Interactive => "interactive",
    };
    format!("/admin/books/{}?tab={query}", escape(&draft.book_id))
}

/// Parse the `tab` query value used by [`render_editor`].
pub fn parse_tab(raw: &str) -> Option<EditorTab> {
    match raw {
        "info" => Some(EditorTab::BookInfo),
        "pages" => Some(EditorTab::Pages),
        "interactive" => Some(EditorTab::Interactive),
        _ => None,
    }
}

fn render_metadata_form(draft: &BookDraft) -> String {
    let grade_options: String = Grade::ALL
        .into_iter()
        .map(|grade| {
            let selected = if grade == draft.grade { " selected" } else { "" };
            format!(
                r#"<option value="{value}"{selected}>{label}</option>"#,
                value = grade.as_str(),
                label = escape(&grade.label()),
            )
        })
        .collect();
    let id_attrs = if draft.is_new() { "" } else { " readonly" };
    format!(
        r#"<form id="metadata-form">
<p><label>Book ID<br><input name="bookId" value="{book_id}" pattern="[A-Za-z0-9_-]+" placeholder="grade3_lesson1"{id_attrs}></label></p>
<p><label>Title<br><input name="title" value="{title}" placeholder="Grade 3 - Lesson 1"></label></p>
<p><label>Grade<br><select name="grade">{grade_options}</select></label></p>
<p><label>Lesson Name<br><input name="lessonName" value="{lesson}" placeholder="Introduction to Fractions"></label></p>
<p><button type="submit" class="primary">{save}</button> <span id="metadata-status" class="error"></span></p>
</form>"#,
        book_id = escape(&draft.book_id),
        title = escape(&draft.title),
        lesson = escape(&draft.lesson_name),
        save = draft.save_metadata_label(),
    )
}

fn render_pages(draft: &BookDraft) -> String {
    let mut out = format!(
        r#"<p class="muted">Upload pages with <code>flipbook pages upload {id} FILES...</code>; reorder with <code>pages move</code>, <code>pages set-index</code> or <code>pages auto-index</code>.</p>"#,
        id = escape(&draft.book_id),
    );
    if draft.pages.is_empty() {
        out.push_str(r#"<p class="muted">No pages uploaded yet.</p>"#);
        return out;
    }
    out.push_str("<table><thead><tr><th>Position</th><th>Index</th><th>Preview</th><th>Filename</th><th>Interactive</th></tr></thead><tbody>");
    for (position, page) in draft.pages.iter().enumerate() {
        let interactive = draft
            .interactive_pages
            .get(&page.index)
            .map(|p| p.activity.kind().label())
            .unwrap_or("");
        out.push_str(&format!(
            r#"<tr><td>{position}</td><td>{index}</td><td><img src="{url}" alt="Page {index}" style="height: 64px;"></td><td>{filename}</td><td>{interactive}</td></tr>"#,
            position = position + 1,
            index = page.index,
            url = escape(&page.url),
            filename = escape(page.filename.as_deref().unwrap_or("")),
        ));
    }
    out.push_str("</tbody></table>");
    out
}

fn render_interactive(draft: &BookDraft) -> String {
    let mut out = String::from(
        r#"<p class="muted">Toggle pages and adjust overlays with <code>flipbook interactive toggle|set-type|set-rect|drag</code>.</p>"#,
    );
    out.push_str("<table><thead><tr><th>Page</th><th>Activity</th><th>Rect (x, y, w, h)</th></tr></thead><tbody>");
    for page in &draft.pages {
        let (activity, rect) = match draft.interactive_pages.get(&page.index) {
            Some(interactive) => (
                interactive.activity.kind().label(),
                format!(
                    "{}, {}, {}, {}",
                    percent(interactive.rect.x),
                    percent(interactive.rect.y),
                    percent(interactive.rect.w),
                    percent(interactive.rect.h)
                ),
            ),
            None => ("", String::new()),
        };
        out.push_str(&format!(
            "<tr><td>{index}</td><td>{activity}</td><td>{rect}</td></tr>",
            index = page.index,
        ));
    }
    out.push_str("</tbody></table>");

    let orphaned: Vec<String> = draft
        .interactive_pages
        .keys()
        .filter(|index| !draft.pages.iter().any(|page| page.index == **index))
        .map(|index| index.to_string())
        .collect();
    if !orphaned.is_empty() {
        out.push_str(&format!(
            r#"<p class="warning">Overlays without a matching page: {}</p>"#,
            orphaned.join(", ")
        ));
    }

    let kinds: Vec<&str> = ActivityKind::ALL.iter().map(|kind| kind.as_str()).collect();
    out.push_str(&format!(
        r#"<p class="muted">Activity types: {}</p>"#,
        kinds.join(", ")
    ));
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::formats::{BookManifest, BookPage};
    use crate::interactive::toggle;

    fn draft_with_pages() -> BookDraft {
        let mut manifest = BookManifest::new("g3", "Fractions", Grade::Third, Utc::now());
        manifest.pages.push(BookPage {
            index: 1,
            url: "/blobs/books/g3/pages/1.png".to_string(),
            filename: Some("1.png".to_string()),
        });
        let mut draft = BookDraft::from_manifest(&manifest);
        toggle(&mut draft.interactive_pages, 1);
        toggle(&mut draft.interactive_pages, 9);
        draft
    }

    #[test]
    fn redirect_targets_are_limited_to_admin_pages() {
        assert_eq!(safe_redirect(Some("/admin/books")), "/admin/books");
        assert_eq!(safe_redirect(Some("https://evil.example")), "/admin");
        assert_eq!(safe_redirect(Some("/admin/login")), "/admin");
        assert_eq!(safe_redirect(Some("/administrator")), "/admin");
        assert_eq!(safe_redirect(None), "/admin");
    }

    #[test]
    fn new_book_editor_disables_pages_and_interactive_tabs() {
        let html = render_editor(&BookDraft::blank(), Some(EditorTab::Interactive));
        assert!(html.contains("<button type=\"button\" disabled>Pages</button>"));
        assert!(html.contains("<button type=\"button\" disabled>Interactive Pages</button>"));
        assert!(html.contains("Create Book"));
        assert!(html.contains(r#"<option value="3" selected>Grade 3</option>"#));
        assert!(html.contains("0 pages • 0 interactive"));
    }

    #[test]
    fn existing_book_editor_lists_overlays_and_orphans() {
        let draft = draft_with_pages();
        let html = render_editor(&draft, Some(EditorTab::Interactive));
        assert!(html.contains("Skills Match"));
        assert!(html.contains("10%, 10%, 80%, 80%"));
        assert!(html.contains("Overlays without a matching page: 9"));
        assert!(html.contains("1 pages • 2 interactive"));

        let html = render_editor(&draft, None);
        assert!(html.contains(r#"<span class="button primary" aria-current="page">Pages</span>"#));
    }

    #[test]
    fn tab_query_values_parse() {
        assert_eq!(parse_tab("pages"), Some(EditorTab::Pages));
        assert_eq!(parse_tab("other"), None);
    }
}
