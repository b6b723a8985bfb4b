use serde::Serialize;

use crate::formats::{BookManifest, BookMetadata};
use crate::html::{document, escape};
use crate::overlays::reflections::ReflectionStore;
use crate::overlays::{OverlayContext, render_overlay};

const PAGE_FLIP_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/npm/page-flip@2.0.7/dist/js/page-flip.browser.js";

/// Settings handed to the St.PageFlip widget.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlipOptions {
    pub width: u32,
    pub height: u32,
    pub size: &'static str,
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub max_shadow_opacity: f64,
    pub show_cover: bool,
    pub mobile_scroll_support: bool,
}

impl Default for FlipOptions {
    fn default() -> Self {
        Self {
            width: 520,
            height: 680,
            size: "stretch",
            min_width: 320,
            max_width: 900,
            min_height: 420,
            max_height: 1100,
            max_shadow_opacity: 0.2,
            show_cover: true,
            mobile_scroll_support: true,
        }
    }
}

const VIEWER_STYLE: &str = r#"
<style>
.viewer header { margin-bottom: 16px; }
.flipbook { margin: 0 auto; }
.page { background: #fff; overflow: hidden; }
.page-inner { position: relative; width: 100%; height: 100%; }
.page-inner img { width: 100%; height: 100%; object-fit: contain; display: block; user-select: none; -webkit-user-drag: none; }
.controls { display: flex; justify-content: center; align-items: center; gap: 16px; margin-top: 16px; }
.overlay { position: absolute; z-index: 5; }
.skills-stage { position: relative; width: 100%; height: 100%; background: rgba(15, 23, 42, .75); border-radius: 8px; overflow: hidden; }
.skills-card, .skills-pocket { position: absolute; display: flex; align-items: center; justify-content: center; font-weight: 700; border-radius: 8px; color: #fff; }
.skills-card { background: #2563eb; cursor: grab; touch-action: none; z-index: 2; }
.skills-pocket { background: #374151; border: 3px dashed #9ca3af; }
.skills-status { position: absolute; top: 8px; width: 100%; text-align: center; color: #fff; margin: 0; font-weight: 600; }
.skills-status.correct { color: #22c55e; font-size: 1.4rem; }
.reflection { width: 100%; height: 100%; background: rgba(255, 255, 255, .95); border-radius: 8px; padding: 12px; display: flex; flex-direction: column; gap: 8px; }
.reflection h3 { margin: 0; }
.reflection textarea { flex: 1; width: 100%; resize: none; font: inherit; padding: 8px; }
.reflection-status { margin-left: 8px; color: #16a34a; }
.vocab { width: 100%; height: 100%; display: flex; flex-direction: column; gap: 8px; }
.vocab-card { flex: 1; font-size: 1.5rem; font-weight: 700; background: #fef3c7; border: 2px solid #f59e0b; border-radius: 12px; }
.vocab-card[data-side="definition"] { background: #dbeafe; border-color: #3b82f6; font-size: 1.1rem; font-weight: 500; }
.vocab-nav { display: flex; justify-content: space-between; align-items: center; }
.book-list { display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 16px; }
.book-list a { text-decoration: none; color: inherit; }
</style>
"#;

const VIEWER_SCRIPT: &str = r#"
(function () {
  var root = document.getElementById('book');
  if (!root) return;
  var pages = root.querySelectorAll('.page');
  var total = pages.length;
  var indicator = document.getElementById('page-indicator');
  function show(index) {
    if (indicator) indicator.textContent = 'Page ' + (index + 1) + ' of ' + total;
  }

  root.querySelectorAll('.overlay').forEach(function (el) {
    ['mousedown', 'touchstart', 'pointerdown'].forEach(function (type) {
      el.addEventListener(type, function (event) { event.stopPropagation(); });
    });
  });

  root.querySelectorAll('[data-overlay="vocab-flip"] .vocab').forEach(function (el) {
    var cards = JSON.parse(el.getAttribute('data-cards') || '[]');
    if (!cards.length) return;
    var current = 0;
    var flipped = false;
    var card = el.querySelector('.vocab-card');
    var counter = el.querySelector('.vocab-counter');
    function render() {
      card.textContent = flipped ? cards[current].definition : cards[current].word;
      card.setAttribute('data-side', flipped ? 'definition' : 'word');
      counter.textContent = (current + 1) + ' / ' + cards.length;
    }
    card.addEventListener('click', function () { flipped = !flipped; render(); });
    el.querySelector('[data-action="prev"]').addEventListener('click', function () {
      current = (current + cards.length - 1) % cards.length;
      flipped = false;
      render();
    });
    el.querySelector('[data-action="next"]').addEventListener('click', function () {
      current = (current + 1) % cards.length;
      flipped = false;
      render();
    });
  });

  root.querySelectorAll('[data-overlay="reflections"] .reflection').forEach(function (form) {
    var key = form.getAttribute('data-storage-key');
    var textarea = form.querySelector('textarea');
    var status = form.querySelector('.reflection-status');
    var timer = null;
    try {
      var saved = window.localStorage.getItem(key);
      if (saved !== null) textarea.value = saved;
    } catch (err) {}
    form.addEventListener('submit', function (event) {
      event.preventDefault();
      try { window.localStorage.setItem(key, textarea.value); } catch (err) {}
      status.textContent = 'Saved!';
      if (timer) clearTimeout(timer);
      timer = setTimeout(function () { status.textContent = ''; }, Number(form.getAttribute('data-saved-ms')) || 2000);
    });
  });

  root.querySelectorAll('[data-overlay="skills-match"] .skills-stage').forEach(function (stage) {
    var card = stage.querySelector('.skills-card');
    var pocket = stage.querySelector('.skills-pocket');
    var status = stage.querySelector('.skills-status');
    var startLeft = card.style.left;
    var startTop = card.style.top;
    var drag = null;
    var solved = false;
    card.addEventListener('pointerdown', function (event) {
      if (solved) return;
      card.setPointerCapture(event.pointerId);
      drag = { x: event.clientX - card.offsetLeft, y: event.clientY - card.offsetTop };
    });
    card.addEventListener('pointermove', function (event) {
      if (!drag) return;
      card.style.left = (event.clientX - drag.x) + 'px';
      card.style.top = (event.clientY - drag.y) + 'px';
    });
    card.addEventListener('pointerup', function () {
      if (!drag) return;
      drag = null;
      var a = card.getBoundingClientRect();
      var b = pocket.getBoundingClientRect();
      var overlap = a.left < b.right && a.right > b.left && a.top < b.bottom && a.bottom > b.top;
      if (overlap) {
        solved = true;
        status.textContent = stage.getAttribute('data-success');
        status.classList.add('correct');
      } else {
        card.style.left = startLeft;
        card.style.top = startTop;
      }
    });
  });

  if (window.St && total > 0) {
    var flip = new St.PageFlip(root, window.FLIPBOOK_OPTIONS);
    flip.loadFromHTML(pages);
    flip.on('flip', function (event) { show(event.data); });
    document.getElementById('prev').addEventListener('click', function () { flip.flipPrev(); });
    document.getElementById('next').addEventListener('click', function () { flip.flipNext(); });
  }
  show(0);
})();
"#;

/// Public landing page listing every book.
pub fn render_home(books: &[BookMetadata]) -> String {
    let mut body = String::from("<main>\n<h1>Interactive Books</h1>\n");
    if books.is_empty() {
        body.push_str(r#"<p class="muted">No books yet.</p>"#);
    } else {
        body.push_str(r#"<div class="book-list">"#);
        for book in books {
            body.push_str(&format!(
                r#"<a class="card" href="/book/{id}"><h2>{title}</h2><p class="muted">{grade}{lesson}</p><p>{count} pages</p></a>"#,
                id = escape(&book.book_id),
                title = escape(&book.title),
                grade = escape(&book.grade.label()),
                lesson = book
                    .lesson_name
                    .as_deref()
                    .map(|name| format!(" · {}", escape(name)))
                    .unwrap_or_default(),
                count = book.page_count,
            ));
        }
        body.push_str("</div>");
    }
    body.push_str("\n</main>");
    document("Interactive Books", VIEWER_STYLE, &body)
}

/// Page-flip viewer for one book, overlays included. Reflection forms start
/// with whatever `reflections` holds for their page.
pub fn render_book(manifest: &BookManifest, reflections: &dyn ReflectionStore) -> String {
    let options = FlipOptions::default();
    let mut body = String::from(r#"<main class="viewer">"#);
    body.push_str(&format!(
        r#"<header><a href="/">&larr; All books</a><h1>{title}</h1><p class="muted">{grade}{lesson}</p></header>"#,
        title = escape(&manifest.title),
        grade = escape(&manifest.grade.label()),
        lesson = manifest
            .lesson_name
            .as_deref()
            .map(|name| format!(" · {}", escape(name)))
            .unwrap_or_default(),
    ));

    if manifest.pages.is_empty() {
        body.push_str(r#"<p class="card muted">This book has no pages yet.</p></main>"#);
        return document(&manifest.title, VIEWER_STYLE, &body);
    }

    let ctx = OverlayContext {
        book_id: &manifest.book_id,
        page_size: (f64::from(options.width), f64::from(options.height)),
        reflections,
    };
    body.push_str(r#"<div id="book" class="flipbook">"#);
    for page in &manifest.pages {
        let overlay = manifest
            .interactive_pages
            .get(&page.index)
            .map(|interactive| render_overlay(&ctx, page.index, interactive))
            .unwrap_or_default();
        body.push_str(&format!(
            r#"<div class="page" data-index="{index}"><div class="page-inner"><img src="{url}" alt="Page {index}" draggable="false">{overlay}</div></div>"#,
            index = page.index,
            url = escape(&page.url),
        ));
    }
    body.push_str("</div>");
    body.push_str(&format!(
        r#"<div class="controls"><button id="prev" type="button">Previous</button><span id="page-indicator">Page 1 of {total}</span><button id="next" type="button">Next</button></div>"#,
        total = manifest.pages.len(),
    ));
    body.push_str("</main>\n");

    let options = serde_json::to_string(&options).unwrap_or_else(|_| "{}".into());
    body.push_str(&format!(
        "<script src=\"{PAGE_FLIP_SCRIPT_URL}\"></script>\n<script>window.FLIPBOOK_OPTIONS = {options};</script>\n<script>{VIEWER_SCRIPT}</script>"
    ));
    document(&manifest.title, VIEWER_STYLE, &body)
}

pub fn render_not_found() -> String {
    document(
        "Book not found",
        VIEWER_STYLE,
        r#"<main><div class="card"><h1>Book not found</h1><p><a class="button primary" href="/">Go Home</a></p></div></main>"#,
    )
}
