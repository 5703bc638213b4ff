use serde::{Deserialize, Serialize};

/// Title/content value meaning "not provided".
pub const UNSET: &str = "none";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    #[serde(default)]
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
}

impl Note {
    pub fn display_title(&self) -> &str {
        display(&self.title)
    }

    pub fn display_content(&self) -> &str {
        display(&self.content)
    }

    /// Neither title nor content has been provided yet.
    pub fn is_blank(&self) -> bool {
        self.title == UNSET && self.content == UNSET
    }

    /// Character count shown by the editor; an unset body counts as empty.
    pub fn content_len(&self) -> usize {
        self.display_content().chars().count()
    }

    pub fn apply(&mut self, patch: NotePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
    }
}

fn display(value: &str) -> &str {
    if value == UNSET {
        ""
    } else {
        value
    }
}

/// Body of `POST /notes/new`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
}

impl NewNote {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

impl Default for NewNote {
    fn default() -> Self {
        Self::new(UNSET, UNSET)
    }
}

/// Partial edit merged into an edit-session draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl NotePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: None,
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: Some(content.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}
