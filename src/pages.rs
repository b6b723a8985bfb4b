use std::sync::LazyLock;

use regex::Regex;

use crate::formats::{BookPage, PageIndex, UploadedPage};

static IMAGE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(png|jpg|jpeg)$").expect("valid extension regex"));

// Tried in order; the first pattern that matches decides the page number.
static PAGE_NUMBER_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"^(\d+)$").expect("valid numeric regex"),
        Regex::new(r"^0*(\d+)$").expect("valid zero-padded regex"),
        Regex::new(r"(?i)page[-_]?(\d+)").expect("valid page-N regex"),
        Regex::new(r"(?i)(\d+)[-_]?page").expect("valid N-page regex"),
    ]
});

/// Page number encoded in an upload's filename, if any.
///
/// `007.png` → 7, `page-12.jpg` → 12, `3_page.jpeg` → 3, `cover.png` → `None`.
/// Zero and values that do not fit a page index are treated as no match.
pub fn infer_page_number(filename: &str) -> Option<PageIndex> {
    let stem = IMAGE_EXTENSION.replace(filename, "");
    for pattern in PAGE_NUMBER_PATTERNS.iter() {
        let Some(captures) = pattern.captures(&stem) else {
            continue;
        };
        return captures
            .get(1)
            .and_then(|digits| digits.as_str().parse::<PageIndex>().ok())
            .filter(|index| *index > 0);
    }
    None
}

/// Content type for the page images the uploader accepts (PNG and JPEG),
/// derived from the extension.
pub fn image_content_type(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Turn upload results into pages.
///
/// Files without a recognizable page number are placed after the existing
/// pages in batch order.
pub fn pages_from_uploads(uploads: &[UploadedPage], existing_count: usize) -> Vec<BookPage> {
    uploads
        .iter()
        .enumerate()
        .map(|(position, upload)| {
            let fallback =
                PageIndex::try_from(existing_count + position + 1).unwrap_or(PageIndex::MAX);
            BookPage {
                index: infer_page_number(&upload.filename).unwrap_or(fallback),
                url: upload.url.clone(),
                filename: Some(upload.filename.clone()),
            }
        })
        .collect()
}

/// Append `new_pages` and sort by index. Ties keep merge order.
pub fn merge_pages(existing: &[BookPage], new_pages: Vec<BookPage>) -> Vec<BookPage> {
    let mut pages = existing.to_vec();
    pages.extend(new_pages);
    pages.sort_by_key(|page| page.index);
    pages
}

/// Renumber pages `1..=N` in their current order.
pub fn auto_index(pages: &mut [BookPage]) {
    for (position, page) in pages.iter_mut().enumerate() {
        page.index = PageIndex::try_from(position + 1).unwrap_or(PageIndex::MAX);
    }
}

/// Drag-and-drop: move the page at position `from` to position `to` (0-based).
pub fn move_page(pages: &mut Vec<BookPage>, from: usize, to: usize) -> anyhow::Result<()> {
    ensure_position(pages, from)?;
    ensure_position(pages, to)?;
    if from != to {
        let page = pages.remove(from);
        pages.insert(to, page);
    }
    auto_index(pages);
    Ok(())
}

/// Remove the page at `position` (0-based) and renumber the rest.
pub fn remove_page(pages: &mut Vec<BookPage>, position: usize) -> anyhow::Result<BookPage> {
    ensure_position(pages, position)?;
    let removed = pages.remove(position);
    auto_index(pages);
    Ok(removed)
}

/// Give the page at `position` (0-based) a new index.
///
/// The page is moved to the slot its new index names (clamped to `1..=N`) and
/// the sequence is renumbered, so indices stay unique and gap-free.
pub fn set_page_index(
    pages: &mut Vec<BookPage>,
    position: usize,
    new_index: PageIndex,
) -> anyhow::Result<()> {
    ensure_position(pages, position)?;
    let target = usize::try_from(new_index.max(1))
        .unwrap_or(usize::MAX)
        .min(pages.len())
        - 1;
    move_page(pages, position, target)
}

fn ensure_position(pages: &[BookPage], position: usize) -> anyhow::Result<()> {
    if position >= pages.len() {
        anyhow::bail!(
            "page position {} is out of range (book has {} pages)",
            position + 1,
            pages.len()
        );
    }
    Ok(())
}
