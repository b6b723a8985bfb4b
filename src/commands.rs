//! `flipbook` subcommands. Each edit fetches the manifest, changes it locally
//! and saves the whole manifest back.

use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::{
    BooksCommand, DragArgs, InteractiveCommand, PagesCommand, SetRectArgs, SetTypeArgs,
    UploadArgs,
};
use crate::client::{ApiClient, UploadFile};
use crate::editor::BookDraft;
use crate::formats::{Activity, ActivityKind, BookManifest, PageIndex, Rect, VocabCard};
use crate::interactive;
use crate::overlay_editor::{DragHandle, MIN_SIZE, OverlayEditor, PointerPos};
use crate::pages;

pub async fn run_books(client: &ApiClient, command: BooksCommand) -> anyhow::Result<()> {
    match command {
        BooksCommand::List => {
            let books = client.list_books().await?;
            if books.is_empty() {
                println!("no books");
            }
            for book in books {
                println!(
                    "{}\t{}\t{}\t{} pages\t{}",
                    book.book_id,
                    book.title,
                    book.grade.label(),
                    book.page_count,
                    book.updated_at.to_rfc3339()
                );
            }
        }
        BooksCommand::Create(args) => {
            let mut draft = BookDraft::blank();
            draft.book_id = args.book_id;
            draft.title = args.title;
            draft.grade = args.grade;
            draft.lesson_name = args.lesson.unwrap_or_default();
            let request = draft.metadata_request()?;
            let saved = client.save_metadata(&request).await?;
            println!("saved {} ({})", saved.manifest.book_id, saved.url);
        }
        BooksCommand::Show(args) => {
            let manifest = client.get_manifest(&args.book_id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&manifest).context("serialize manifest")?
            );
            warn_orphans(&manifest);
        }
        BooksCommand::Delete(args) => {
            client.delete_book(&args.book_id).await?;
            println!("deleted {}", args.book_id);
        }
    }
    Ok(())
}

pub async fn run_pages(client: &ApiClient, command: PagesCommand) -> anyhow::Result<()> {
    match command {
        PagesCommand::Upload(args) => upload(client, args).await,
        PagesCommand::Move(args) => {
            edit(client, &args.book_id, |manifest| {
                pages::move_page(
                    &mut manifest.pages,
                    position(args.from)?,
                    position(args.to)?,
                )
            })
            .await
        }
        PagesCommand::Remove(args) => {
            edit(client, &args.book_id, |manifest| {
                let removed = pages::remove_page(&mut manifest.pages, position(args.position)?)?;
                tracing::info!(index = removed.index, url = %removed.url, "removed page");
                Ok(())
            })
            .await
        }
        PagesCommand::AutoIndex(args) => {
            edit(client, &args.book_id, |manifest| {
                pages::auto_index(&mut manifest.pages);
                Ok(())
            })
            .await
        }
        PagesCommand::SetIndex(args) => {
            edit(client, &args.book_id, |manifest| {
                pages::set_page_index(&mut manifest.pages, position(args.position)?, args.index)
            })
            .await
        }
    }
}

pub async fn run_interactive(
    client: &ApiClient,
    command: InteractiveCommand,
) -> anyhow::Result<()> {
    match command {
        InteractiveCommand::Toggle(args) => {
            edit(client, &args.book_id, |manifest| {
                ensure_page(manifest, args.page)?;
                let on = interactive::toggle(&mut manifest.interactive_pages, args.page);
                println!(
                    "page {} is {}",
                    args.page,
                    if on { "interactive" } else { "no longer interactive" }
                );
                Ok(())
            })
            .await
        }
        InteractiveCommand::SetType(args) => {
            edit(client, &args.target.book_id, |manifest| {
                apply_activity(manifest, &args)
            })
            .await
        }
        InteractiveCommand::SetRect(args) => {
            edit(client, &args.target.book_id, |manifest| {
                apply_rect(manifest, &args)
            })
            .await
        }
        InteractiveCommand::Drag(args) => {
            edit(client, &args.target.book_id, |manifest| {
                let rect = apply_drag(manifest, &args)?;
                println!(
                    "page {} rect: x={:.3} y={:.3} w={:.3} h={:.3}",
                    args.target.page, rect.x, rect.y, rect.w, rect.h
                );
                Ok(())
            })
            .await
        }
    }
}

/// Fetch the manifest, apply `change`, save it back.
async fn edit<F>(client: &ApiClient, book_id: &str, change: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut BookManifest) -> anyhow::Result<()>,
{
    let mut manifest = client.get_manifest(book_id).await?;
    change(&mut manifest)?;
    save(client, &manifest).await
}

async fn upload(client: &ApiClient, args: UploadArgs) -> anyhow::Result<()> {
    let (accepted, skipped) = select_images(&args.files);
    for path in &skipped {
        tracing::warn!(path = %path.display(), "skipping file that is not PNG or JPEG");
    }
    if accepted.is_empty() {
        anyhow::bail!("no PNG or JPEG files to upload");
    }

    let mut files = Vec::with_capacity(accepted.len());
    for (path, content_type) in accepted {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("file name is not valid UTF-8: {}", path.display()))?
            .to_string();
        files.push(UploadFile {
            filename,
            content_type,
            bytes,
        });
    }

    let uploads = client.upload_pages(&args.book_id, files).await?;
    let mut manifest = client.get_manifest(&args.book_id).await?;
    let new_pages = pages::pages_from_uploads(&uploads, manifest.pages.len());
    manifest.pages = pages::merge_pages(&manifest.pages, new_pages);
    println!("uploaded {} file(s)", uploads.len());
    save(client, &manifest).await
}

async fn save(client: &ApiClient, manifest: &BookManifest) -> anyhow::Result<()> {
    client.save_manifest(manifest).await?;
    let summary = BookDraft::from_manifest(manifest).summary();
    println!("saved {}: {summary}", manifest.book_id);
    warn_orphans(manifest);
    Ok(())
}

fn warn_orphans(manifest: &BookManifest) {
    let orphaned = manifest.orphaned_interactive_pages();
    if !orphaned.is_empty() {
        tracing::warn!(?orphaned, "interactive pages without a matching page");
    }
}

/// 1-based CLI position to a 0-based slot.
fn position(one_based: usize) -> anyhow::Result<usize> {
    one_based
        .checked_sub(1)
        .ok_or_else(|| anyhow::anyhow!("positions start at 1"))
}

/// Split paths into uploadable images (with content type) and skipped files.
fn select_images(paths: &[PathBuf]) -> (Vec<(PathBuf, &'static str)>, Vec<PathBuf>) {
    let mut accepted = Vec::new();
    let mut skipped = Vec::new();
    for path in paths {
        let content_type = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(pages::image_content_type);
        match content_type {
            Some(content_type) => accepted.push((path.clone(), content_type)),
            None => skipped.push(path.clone()),
        }
    }
    (accepted, skipped)
}

fn ensure_page(manifest: &BookManifest, index: PageIndex) -> anyhow::Result<()> {
    if manifest.page(index).is_none() {
        anyhow::bail!("book {} has no page with index {index}", manifest.book_id);
    }
    Ok(())
}

fn not_interactive(index: PageIndex) -> anyhow::Error {
    anyhow::anyhow!("page {index} is not interactive; run `interactive toggle` first")
}

fn parse_card(raw: &str) -> anyhow::Result<VocabCard> {
    let (word, definition) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("card must look like WORD=DEFINITION: {raw:?}"))?;
    let (word, definition) = (word.trim(), definition.trim());
    if word.is_empty() || definition.is_empty() {
        anyhow::bail!("card word and definition must not be empty: {raw:?}");
    }
    Ok(VocabCard {
        word: word.to_string(),
        definition: definition.to_string(),
    })
}

fn apply_activity(manifest: &mut BookManifest, args: &SetTypeArgs) -> anyhow::Result<()> {
    let index = args.target.page;
    if args.prompt.is_some() && args.kind != ActivityKind::Reflections {
        anyhow::bail!("--prompt only applies to reflections");
    }
    if !args.cards.is_empty() && args.kind != ActivityKind::VocabFlip {
        anyhow::bail!("--card only applies to vocab-flip");
    }
    let cards = args
        .cards
        .iter()
        .map(|raw| parse_card(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if !interactive::set_activity_kind(&mut manifest.interactive_pages, index, args.kind) {
        return Err(not_interactive(index));
    }
    let page = manifest
        .interactive_pages
        .get_mut(&index)
        .ok_or_else(|| not_interactive(index))?;
    match &mut page.activity {
        Activity::Reflections { prompt } if args.prompt.is_some() => {
            *prompt = args.prompt.clone();
        }
        Activity::VocabFlip { cards: current } if !cards.is_empty() => *current = cards,
        _ => {}
    }
    Ok(())
}

fn ensure_finite(name: &str, value: f64) -> anyhow::Result<()> {
    if !value.is_finite() {
        anyhow::bail!("--{name} must be a finite number, got {value}");
    }
    Ok(())
}

fn apply_rect(manifest: &mut BookManifest, args: &SetRectArgs) -> anyhow::Result<()> {
    for (name, value) in [("x", args.x), ("y", args.y), ("w", args.w), ("h", args.h)] {
        ensure_finite(name, value)?;
    }
    let rect = Rect::new(args.x, args.y, args.w, args.h);
    if rect.w < MIN_SIZE || rect.h < MIN_SIZE || !rect.is_within_page() {
        anyhow::bail!(
            "rect must lie inside the page with width and height of at least {MIN_SIZE}"
        );
    }
    if !interactive::set_rect(&mut manifest.interactive_pages, args.target.page, rect) {
        return Err(not_interactive(args.target.page));
    }
    Ok(())
}

/// One pointer-down, move, up cycle on the overlay editor, then save.
fn apply_drag(manifest: &mut BookManifest, args: &DragArgs) -> anyhow::Result<Rect> {
    ensure_finite("dx", args.dx)?;
    ensure_finite("dy", args.dy)?;
    let index = args.target.page;
    let current = manifest
        .interactive_pages
        .get(&index)
        .map(|page| page.rect)
        .ok_or_else(|| not_interactive(index))?;

    let mut editor = OverlayEditor::new(current);
    let start = drag_start(current, args.handle);
    editor.pointer_down(args.handle, start);
    editor.pointer_move(PointerPos::new(start.x + args.dx, start.y + args.dy));
    editor.pointer_up();

    let mut saved = current;
    editor.save(|rect| saved = rect);
    interactive::set_rect(&mut manifest.interactive_pages, index, saved);
    Ok(saved)
}

/// Where a pointer would grab `handle` on `rect`.
fn drag_start(rect: Rect, handle: DragHandle) -> PointerPos {
    let (left, center_x, right) = (rect.x, rect.x + rect.w / 2.0, rect.x + rect.w);
    let (top, center_y, bottom) = (rect.y, rect.y + rect.h / 2.0, rect.y + rect.h);
    match handle {
        DragHandle::Move => PointerPos::new(center_x, center_y),
        DragHandle::North => PointerPos::new(center_x, top),
        DragHandle::South => PointerPos::new(center_x, bottom),
        DragHandle::East => PointerPos::new(right, center_y),
        DragHandle::West => PointerPos::new(left, center_y),
        DragHandle::NorthEast => PointerPos::new(right, top),
        DragHandle::NorthWest => PointerPos::new(left, top),
        DragHandle::SouthEast => PointerPos::new(right, bottom),
        DragHandle::SouthWest => PointerPos::new(left, bottom),
    }
}
