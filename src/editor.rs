use chrono::{DateTime, Utc};

use crate::formats::{BookManifest, BookPage, Grade, SaveMetadataRequest};
use crate::interactive::InteractivePages;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorTab {
    BookInfo,
    Pages,
    Interactive,
}

impl EditorTab {
    pub const ALL: [EditorTab; 3] = [
        EditorTab::BookInfo,
        EditorTab::Pages,
        EditorTab::Interactive,
    ];

    pub fn title(self) -> &'static str {
        match self {
            EditorTab::BookInfo => "Book Info",
            EditorTab::Pages => "Pages",
            EditorTab::Interactive => "Interactive Pages",
        }
    }
}

/// Editable state of one book in the admin editor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookDraft {
    pub book_id: String,
    pub title: String,
    pub grade: Grade,
    pub lesson_name: String,
    pub pages: Vec<BookPage>,
    pub interactive_pages: InteractivePages,
    pub created_at: Option<DateTime<Utc>>,
}

impl BookDraft {
    /// Blank draft for creating a book.
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn from_manifest(manifest: &BookManifest) -> Self {
        Self {
            book_id: manifest.book_id.clone(),
            title: manifest.title.clone(),
            grade: manifest.grade,
            lesson_name: manifest.lesson_name.clone().unwrap_or_default(),
            pages: manifest.pages.clone(),
            interactive_pages: manifest.interactive_pages.clone(),
            created_at: Some(manifest.created_at),
        }
    }

    pub fn is_new(&self) -> bool {
        self.created_at.is_none()
    }

    pub fn initial_tab(&self) -> EditorTab {
        if self.is_new() {
            EditorTab::BookInfo
        } else {
            EditorTab::Pages
        }
    }

    pub fn tab_enabled(&self, tab: EditorTab) -> bool {
        match tab {
            EditorTab::BookInfo => true,
            EditorTab::Pages => !self.book_id.trim().is_empty(),
            EditorTab::Interactive => !self.pages.is_empty(),
        }
    }

    /// Label of the metadata save button.
    pub fn save_metadata_label(&self) -> &'static str {
        if self.is_new() {
            "Create Book"
        } else {
            "Save Changes"
        }
    }

    /// Footer line, e.g. "12 pages • 3 interactive".
    pub fn summary(&self) -> String {
        format!(
            "{} pages • {} interactive",
            self.pages.len(),
            self.interactive_pages.len()
        )
    }

    pub fn validate_metadata(&self) -> anyhow::Result<()> {
        if self.book_id.trim().is_empty() || self.title.trim().is_empty() {
            anyhow::bail!("please fill in Book ID and Title");
        }
        Ok(())
    }

    pub fn metadata_request(&self) -> anyhow::Result<SaveMetadataRequest> {
        self.validate_metadata()?;
        let lesson_name = self.lesson_name.trim();
        Ok(SaveMetadataRequest {
            book_id: Some(self.book_id.trim().to_string()),
            title: Some(self.title.trim().to_string()),
            grade: Some(self.grade.as_str().to_string()),
            lesson_name: (!lesson_name.is_empty()).then(|| lesson_name.to_string()),
        })
    }

    /// Full manifest for "Save Book".
    pub fn to_manifest(&self, now: DateTime<Utc>) -> anyhow::Result<BookManifest> {
        if self.book_id.trim().is_empty() {
            anyhow::bail!("book id is required");
        }
        let lesson_name = self.lesson_name.trim();
        let mut manifest = BookManifest::new(
            self.book_id.trim(),
            self.title.trim(),
            self.grade,
            self.created_at.unwrap_or(now),
        );
        manifest.lesson_name = (!lesson_name.is_empty()).then(|| lesson_name.to_string());
        manifest.pages = self.pages.clone();
        manifest.interactive_pages = self.interactive_pages.clone();
        manifest.touch(now);
        Ok(manifest)
    }
}
