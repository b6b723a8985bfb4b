//! Interactive overlays layered over viewer pages.
//!
//! The models here set each overlay's starting state; `render_overlay` turns
//! it into the markup the viewer script animates in the browser.

pub mod reflections;
pub mod skills_match;
pub mod vocab;

use crate::formats::{Activity, InteractivePage, PageIndex, Rect, VocabCard};
use crate::html::{escape, percent};

use self::reflections::{DEFAULT_PROMPT, ReflectionStore, SAVED_FEEDBACK, reflection_key};
use self::skills_match::SkillsMatchBoard;
use self::vocab::VocabDeck;

/// What every overlay of one rendered book shares.
pub struct OverlayContext<'a> {
    pub book_id: &'a str,
    /// Nominal page size in pixels; the rect scales it to the overlay size.
    pub page_size: (f64, f64),
    pub reflections: &'a dyn ReflectionStore,
}

/// Overlay markup for one interactive page, positioned by its rect.
pub fn render_overlay(
    ctx: &OverlayContext<'_>,
    page_index: PageIndex,
    page: &InteractivePage,
) -> String {
    let inner = match &page.activity {
        Activity::SkillsMatch => render_skills_match(ctx, page.rect),
        Activity::Reflections { prompt } => render_reflections(ctx, page_index, prompt.as_deref()),
        Activity::VocabFlip { cards } => render_vocab_flip(cards),
    };
    let kind = page.activity.kind();
    format!(
        r#"<div class="overlay overlay-{kind}" data-overlay="{kind}" data-page="{page_index}" style="left: {left}; top: {top}; width: {width}; height: {height};">{inner}</div>"#,
        left = percent(page.rect.x),
        top = percent(page.rect.y),
        width = percent(page.rect.w),
        height = percent(page.rect.h),
    )
}

fn render_skills_match(ctx: &OverlayContext<'_>, rect: Rect) -> String {
    let board = SkillsMatchBoard::new(
        (ctx.page_size.0 * rect.w).max(1.0),
        (ctx.page_size.1 * rect.h).max(1.0),
    );
    format!(
        r#"<div class="skills-stage" data-success="{success}"><div class="skills-pocket" style="{pocket_style}">{pocket_label}</div><div class="skills-card" style="{card_style}">{card_label}</div><p class="skills-status">{instruction}</p></div>"#,
        success = skills_match::SUCCESS_TEXT,
        pocket_style = board.style(board.pocket()),
        card_style = board.style(board.card()),
        pocket_label = skills_match::POCKET_LABEL,
        card_label = skills_match::CARD_LABEL,
        instruction = skills_match::INSTRUCTION,
    )
}

fn render_reflections(
    ctx: &OverlayContext<'_>,
    page_index: PageIndex,
    prompt: Option<&str>,
) -> String {
    let prompt = prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PROMPT);
    let key = reflection_key(ctx.book_id, page_index);
    let saved = ctx.reflections.load(&key).unwrap_or_default();
    format!(
        r#"<form class="reflection" data-storage-key="{key}" data-saved-ms="{saved_ms}"><h3>{prompt}</h3><textarea rows="5" placeholder="Write your thoughts here...">{saved}</textarea><div class="reflection-actions"><button type="submit" class="primary">Save</button><span class="reflection-status" aria-live="polite"></span></div></form>"#,
        key = escape(&key),
        saved_ms = SAVED_FEEDBACK.as_millis(),
        prompt = escape(prompt),
        saved = escape(&saved),
    )
}

fn render_vocab_flip(cards: &[VocabCard]) -> String {
    let deck = VocabDeck::new(cards.to_vec());
    let cards_json = serde_json::to_string(deck.cards()).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"<div class="vocab" data-cards="{cards}"><button type="button" class="vocab-card" data-side="word">{text}</button><div class="vocab-nav"><button type="button" data-action="prev">Previous</button><span class="vocab-counter">{counter}</span><button type="button" data-action="next">Next</button></div></div>"#,
        cards = escape(&cards_json),
        text = escape(deck.visible_text()),
        counter = deck.counter(),
    )
}
