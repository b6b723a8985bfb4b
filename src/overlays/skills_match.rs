//! Drag-a-card-into-the-pocket mini-game. The viewer script handles the drag
//! and the overlap check; this lays out the starting board.

use crate::html::percent;

pub const CARD_SIZE: (f64, f64) = (140.0, 70.0);
pub const POCKET_SIZE: (f64, f64) = (140.0, 90.0);
/// Card and pocket centers as fractions of the overlay size.
pub const CARD_CENTER: (f64, f64) = (0.25, 0.6);
pub const POCKET_CENTER: (f64, f64) = (0.75, 0.6);

pub const CARD_LABEL: &str = "SKILL CARD";
pub const POCKET_LABEL: &str = "POCKET";
pub const INSTRUCTION: &str = "Drag the card into the pocket";
pub const SUCCESS_TEXT: &str = "CORRECT!";

/// Axis-aligned box in overlay pixels, positioned by its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

/// Starting positions of the card and the pocket on one overlay.
#[derive(Debug, Clone)]
pub struct SkillsMatchBoard {
    width: f64,
    height: f64,
    card: Bounds,
    pocket: Bounds,
}

impl SkillsMatchBoard {
    /// Lay out the board for an overlay of `width` × `height` pixels.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            card: Bounds {
                cx: width * CARD_CENTER.0,
                cy: height * CARD_CENTER.1,
                w: CARD_SIZE.0,
                h: CARD_SIZE.1,
            },
            pocket: Bounds {
                cx: width * POCKET_CENTER.0,
                cy: height * POCKET_CENTER.1,
                w: POCKET_SIZE.0,
                h: POCKET_SIZE.1,
            },
        }
    }

    pub fn card(&self) -> Bounds {
        self.card
    }

    pub fn pocket(&self) -> Bounds {
        self.pocket
    }

    /// Inline CSS placing `bounds` on the board, in percent of the overlay so
    /// the board scales with the page.
    pub fn style(&self, bounds: Bounds) -> String {
        format!(
            "left: {}; top: {}; width: {}; height: {};",
            percent((bounds.cx - bounds.w / 2.0) / self.width),
            percent((bounds.cy - bounds.h / 2.0) / self.height),
            percent(bounds.w / self.width),
            percent(bounds.h / self.height),
        )
    }
}
