use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page index as stored in `pages[].index` and as the key of `interactivePages`.
pub type PageIndex = u32;

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum Grade {
    #[serde(rename = "K")]
    Kindergarten,
    #[serde(rename = "1")]
    First,
    #[serde(rename = "2")]
    Second,
    #[default]
    #[serde(rename = "3")]
    Third,
    #[serde(rename = "4")]
    Fourth,
    #[serde(rename = "5")]
    Fifth,
    #[serde(rename = "6")]
    Sixth,
    #[serde(rename = "7")]
    Seventh,
    #[serde(rename = "8")]
    Eighth,
}

impl Grade {
    pub const ALL: [Grade; 9] = [
        Grade::Kindergarten,
        Grade::First,
        Grade::Second,
        Grade::Third,
        Grade::Fourth,
        Grade::Fifth,
        Grade::Sixth,
        Grade::Seventh,
        Grade::Eighth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Kindergarten => "K",
            Grade::First => "1",
            Grade::Second => "2",
            Grade::Third => "3",
            Grade::Fourth => "4",
            Grade::Fifth => "5",
            Grade::Sixth => "6",
            Grade::Seventh => "7",
            Grade::Eighth => "8",
        }
    }

    /// Human label used by the admin pages ("Kindergarten", "Grade 3").
    pub fn label(self) -> String {
        match self {
            Grade::Kindergarten => "Kindergarten".to_string(),
            other => format!("Grade {}", other.as_str()),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Grade::ALL
            .into_iter()
            .find(|grade| grade.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| anyhow::anyhow!("unknown grade: {raw:?} (expected K or 1-8)"))
    }
}

/// Region of a page image in unit-square coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_within_page(&self) -> bool {
        const EPS: f64 = 1e-9;
        self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.w <= 1.0 + EPS
            && self.y + self.h <= 1.0 + EPS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VocabCard {
    pub word: String,
    pub definition: String,
}

/// Activity shown in an overlay, tagged by the manifest's `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Activity {
    SkillsMatch,
    Reflections {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },
    VocabFlip {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        cards: Vec<VocabCard>,
    },
}

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        match self {
            Activity::SkillsMatch => ActivityKind::SkillsMatch,
            Activity::Reflections { .. } => ActivityKind::Reflections,
            Activity::VocabFlip { .. } => ActivityKind::VocabFlip,
        }
    }
}

/// Payload-free discriminant of [`Activity`], used for selection and CLI input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    SkillsMatch,
    Reflections,
    VocabFlip,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 3] = [
        ActivityKind::SkillsMatch,
        ActivityKind::Reflections,
        ActivityKind::VocabFlip,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::SkillsMatch => "skills-match",
            ActivityKind::Reflections => "reflections",
            ActivityKind::VocabFlip => "vocab-flip",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivityKind::SkillsMatch => "Skills Match",
            ActivityKind::Reflections => "Reflections (Form)",
            ActivityKind::VocabFlip => "Vocab Flip",
        }
    }

    /// Fresh activity of this kind with an empty payload.
    pub fn empty_activity(self) -> Activity {
        match self {
            ActivityKind::SkillsMatch => Activity::SkillsMatch,
            ActivityKind::Reflections => Activity::Reflections { prompt: None },
            ActivityKind::VocabFlip => Activity::VocabFlip { cards: Vec::new() },
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        ActivityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown activity type: {raw:?} (expected skills-match, reflections or vocab-flip)"
                )
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractivePage {
    #[serde(flatten)]
    pub activity: Activity,
    pub rect: Rect,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookPage {
    pub index: PageIndex,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookManifest {
    pub book_id: String,
    pub title: String,
    pub grade: Grade,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_name: Option<String>,
    #[serde(default)]
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub pages: Vec<BookPage>,
    #[serde(default)]
    pub interactive_pages: BTreeMap<PageIndex, InteractivePage>,
}

impl BookManifest {
    pub fn new(
        book_id: impl Into<String>,
        title: impl Into<String>,
        grade: Grade,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            book_id: book_id.into(),
            title: title.into(),
            grade,
            lesson_name: None,
            page_count: 0,
            created_at: now,
            updated_at: now,
            pages: Vec::new(),
            interactive_pages: BTreeMap::new(),
        }
    }

    /// Refresh `updatedAt` and re-derive `pageCount` before a write.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.page_count = self.pages.len();
    }

    pub fn metadata(&self) -> BookMetadata {
        BookMetadata {
            book_id: self.book_id.clone(),
            title: self.title.clone(),
            grade: self.grade,
            lesson_name: self.lesson_name.clone(),
            page_count: self.page_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn page(&self, index: PageIndex) -> Option<&BookPage> {
        self.pages.iter().find(|page| page.index == index)
    }

    /// Keys of `interactivePages` that point at no existing page.
    pub fn orphaned_interactive_pages(&self) -> Vec<PageIndex> {
        self.interactive_pages
            .keys()
            .copied()
            .filter(|index| self.page(*index).is_none())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub book_id: String,
    pub title: String,
    pub grade: Grade,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_name: Option<String>,
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// HTTP request/response bodies shared by the server and the CLI client.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMetadataRequest {
    #[serde(default)]
    pub book_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub lesson_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMetadataResponse {
    pub success: bool,
    pub manifest: BookManifest,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListBooksResponse {
    pub books: Vec<BookMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBookResponse {
    pub manifest: BookManifest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveManifestResponse {
    pub success: bool,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedPage {
    pub filename: String,
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPagesResponse {
    pub success: bool,
    pub uploads: Vec<UploadedPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}
