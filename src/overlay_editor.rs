//! Drag/resize editing of an overlay's normalized rectangle.
//!
//! Positions are fractions of the page container (0..1 on both axes). Each
//! pointer move applies the delta from the previous pointer position, so the
//! edit is incremental rather than anchored at the drag start.

use std::str::FromStr;

use crate::formats::Rect;

/// Smallest width or height a resize may produce.
pub const MIN_SIZE: f64 = 0.05;

/// Rectangle given to a page that is newly marked interactive.
pub const DEFAULT_RECT: Rect = Rect::new(0.1, 0.1, 0.8, 0.8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragHandle {
    Move,
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl DragHandle {
    pub const ALL: [DragHandle; 9] = [
        DragHandle::Move,
        DragHandle::North,
        DragHandle::South,
        DragHandle::East,
        DragHandle::West,
        DragHandle::NorthEast,
        DragHandle::NorthWest,
        DragHandle::SouthEast,
        DragHandle::SouthWest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DragHandle::Move => "move",
            DragHandle::North => "n",
            DragHandle::South => "s",
            DragHandle::East => "e",
            DragHandle::West => "w",
            DragHandle::NorthEast => "ne",
            DragHandle::NorthWest => "nw",
            DragHandle::SouthEast => "se",
            DragHandle::SouthWest => "sw",
        }
    }

    fn north(self) -> bool {
        matches!(
            self,
            DragHandle::North | DragHandle::NorthEast | DragHandle::NorthWest
        )
    }

    fn south(self) -> bool {
        matches!(
            self,
            DragHandle::South | DragHandle::SouthEast | DragHandle::SouthWest
        )
    }

    fn east(self) -> bool {
        matches!(
            self,
            DragHandle::East | DragHandle::NorthEast | DragHandle::SouthEast
        )
    }

    fn west(self) -> bool {
        matches!(
            self,
            DragHandle::West | DragHandle::NorthWest | DragHandle::SouthWest
        )
    }
}

impl FromStr for DragHandle {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim().to_ascii_lowercase();
        DragHandle::ALL
            .into_iter()
            .find(|handle| handle.as_str() == raw)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown drag handle: {raw:?} (expected move, n, s, e, w, ne, nw, se or sw)"
                )
            })
    }
}

/// Pointer position normalized to the page container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPos {
    pub x: f64,
    pub y: f64,
}

impl PointerPos {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Apply one pointer delta to `rect` for the given handle.
pub fn apply_drag(rect: Rect, handle: DragHandle, dx: f64, dy: f64) -> Rect {
    let mut next = rect;

    if handle == DragHandle::Move {
        next.x = (rect.x + dx).min(1.0 - rect.w).max(0.0);
        next.y = (rect.y + dy).min(1.0 - rect.h).max(0.0);
        return next;
    }

    if handle.north() {
        let y = (rect.y + dy).max(0.0);
        let h = rect.h + (rect.y - y);
        if h > MIN_SIZE {
            next.y = y;
            next.h = h;
        }
    }
    if handle.south() {
        next.h = (rect.h + dy).min(1.0 - rect.y).max(MIN_SIZE);
    }
    if handle.west() {
        let x = (rect.x + dx).max(0.0);
        let w = rect.w + (rect.x - x);
        if w > MIN_SIZE {
            next.x = x;
            next.w = w;
        }
    }
    if handle.east() {
        next.w = (rect.w + dx).min(1.0 - rect.x).max(MIN_SIZE);
    }

    next
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    handle: DragHandle,
    last: PointerPos,
}

/// Editing session for one page's overlay rectangle.
#[derive(Debug, Clone)]
pub struct OverlayEditor {
    initial: Rect,
    rect: Rect,
    drag: Option<Drag>,
}

impl OverlayEditor {
    pub fn new(rect: Rect) -> Self {
        Self {
            initial: rect,
            rect,
            drag: None,
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn pointer_down(&mut self, handle: DragHandle, at: PointerPos) {
        self.drag = Some(Drag { handle, last: at });
    }

    /// Returns the updated rectangle, or `None` when no drag is in progress.
    pub fn pointer_move(&mut self, at: PointerPos) -> Option<Rect> {
        let drag = self.drag.as_mut()?;
        let dx = at.x - drag.last.x;
        let dy = at.y - drag.last.y;
        self.rect = apply_drag(self.rect, drag.handle, dx, dy);
        drag.last = at;
        Some(self.rect)
    }

    /// Ends the drag; also used when the pointer leaves the container.
    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Hand the edited rectangle to `on_save`.
    pub fn save<F>(mut self, on_save: F)
    where
        F: FnOnce(Rect),
    {
        self.pointer_up();
        on_save(self.rect);
    }

    /// Discard edits, returning the rectangle the session started with.
    pub fn cancel(self) -> Rect {
        self.initial
    }
}
