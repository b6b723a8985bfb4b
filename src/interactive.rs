use std::collections::BTreeMap;

use crate::formats::{ActivityKind, InteractivePage, PageIndex, Rect};
use crate::overlay_editor::DEFAULT_RECT;

pub type InteractivePages = BTreeMap<PageIndex, InteractivePage>;

/// Mark a page interactive, or clear it if it already is.
///
/// Returns whether the page is interactive afterwards. New entries start as a
/// skills-match activity covering [`DEFAULT_RECT`].
pub fn toggle(pages: &mut InteractivePages, index: PageIndex) -> bool {
    if pages.remove(&index).is_some() {
        return false;
    }
    pages.insert(
        index,
        InteractivePage {
            activity: ActivityKind::SkillsMatch.empty_activity(),
            rect: DEFAULT_RECT,
        },
    );
    true
}

/// Switch the activity type of an interactive page.
///
/// Selecting the type a page already has keeps its payload. Returns `false`
/// when the page is not interactive.
pub fn set_activity_kind(
    pages: &mut InteractivePages,
    index: PageIndex,
    kind: ActivityKind,
) -> bool {
    let Some(page) = pages.get_mut(&index) else {
        return false;
    };
    if page.activity.kind() != kind {
        page.activity = kind.empty_activity();
    }
    true
}

/// Replace the overlay rectangle of an interactive page.
pub fn set_rect(pages: &mut InteractivePages, index: PageIndex, rect: Rect) -> bool {
    let Some(page) = pages.get_mut(&index) else {
        return false;
    };
    page.rect = rect;
    true
}
