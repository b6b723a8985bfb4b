use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::formats::{ActivityKind, Grade, PageIndex};
use crate::overlay_editor::DragHandle;

#[derive(Debug, Parser)]
#[command(author, version, about = "Admin client for the flipbook server")]
pub struct Cli {
    /// Base URL of the flipbook server.
    #[arg(
        long,
        global = true,
        env = "FLIPBOOK_SERVER",
        default_value = "http://127.0.0.1:8080"
    )]
    pub server: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Books {
        #[command(subcommand)]
        command: BooksCommand,
    },
    Pages {
        #[command(subcommand)]
        command: PagesCommand,
    },
    Interactive {
        #[command(subcommand)]
        command: InteractiveCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum BooksCommand {
    /// List books, most recently updated first.
    List,
    /// Create a book or update its metadata.
    Create(CreateBookArgs),
    /// Print a book's manifest as JSON.
    Show(BookIdArg),
    /// Delete a book and all of its page images.
    Delete(BookIdArg),
}

#[derive(Debug, Args)]
pub struct BookIdArg {
    pub book_id: String,
}

#[derive(Debug, Args)]
pub struct CreateBookArgs {
    /// URL-safe id (letters, digits, `-`, `_`).
    #[arg(long = "id")]
    pub book_id: String,

    #[arg(long)]
    pub title: String,

    /// K or 1-8.
    #[arg(long, default_value = "3")]
    pub grade: Grade,

    #[arg(long)]
    pub lesson: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum PagesCommand {
    /// Upload PNG/JPEG page images and merge them into the page list.
    Upload(UploadArgs),
    /// Move a page from one position to another (1-based).
    Move(MovePageArgs),
    /// Remove the page at a position (1-based).
    Remove(RemovePageArgs),
    /// Renumber pages 1..N in their current order.
    AutoIndex(BookIdArg),
    /// Give a page a new index; the page moves to that slot.
    SetIndex(SetIndexArgs),
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    pub book_id: String,

    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MovePageArgs {
    pub book_id: String,

    #[arg(long)]
    pub from: usize,

    #[arg(long)]
    pub to: usize,
}

#[derive(Debug, Args)]
pub struct RemovePageArgs {
    pub book_id: String,

    #[arg(long)]
    pub position: usize,
}

#[derive(Debug, Args)]
pub struct SetIndexArgs {
    pub book_id: String,

    #[arg(long)]
    pub position: usize,

    #[arg(long)]
    pub index: PageIndex,
}

#[derive(Debug, Subcommand)]
pub enum InteractiveCommand {
    /// Mark a page interactive, or clear it if it already is.
    Toggle(PageArgs),
    /// Change the activity of an interactive page.
    SetType(SetTypeArgs),
    /// Set the overlay rectangle (fractions of the page).
    SetRect(SetRectArgs),
    /// Drag one handle of the overlay rectangle by a delta.
    Drag(DragArgs),
}

#[derive(Debug, Args)]
pub struct PageArgs {
    pub book_id: String,

    /// Page index.
    #[arg(long)]
    pub page: PageIndex,
}

#[derive(Debug, Args)]
pub struct SetTypeArgs {
    #[command(flatten)]
    pub target: PageArgs,

    /// skills-match, reflections or vocab-flip.
    #[arg(long = "type")]
    pub kind: ActivityKind,

    /// Heading of a reflections form.
    #[arg(long)]
    pub prompt: Option<String>,

    /// Vocab card as `WORD=DEFINITION`; repeat for more cards.
    #[arg(long = "card")]
    pub cards: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SetRectArgs {
    #[command(flatten)]
    pub target: PageArgs,

    #[arg(long)]
    pub x: f64,

    #[arg(long)]
    pub y: f64,

    #[arg(long)]
    pub w: f64,

    #[arg(long)]
    pub h: f64,
}

#[derive(Debug, Args)]
pub struct DragArgs {
    #[command(flatten)]
    pub target: PageArgs,

    /// move, n, s, e, w, ne, nw, se or sw.
    #[arg(long)]
    pub handle: DragHandle,

    #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
    pub dx: f64,

    #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
    pub dy: f64,
}
