use serde::{Deserialize, Serialize};

use crate::model::Page;
use crate::settings::SettingsUpdate;

pub type Generation = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum HostRequest {
    SearchTermsChanged {
        terms: Vec<String>,
    },
    Subsearch {
        #[serde(default)]
        previous_results: Vec<u64>,
        terms: Vec<String>,
    },
    BackspaceWhileTriggered,
    Activate {
        page_id: u64,
    },
    ActivateSuggestion,
    SearchText {
        text: String,
        #[serde(default)]
        language: Option<String>,
    },
    Clear,
    Disable,
    UpdateSettings(SettingsUpdate),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum HostResponse {
    Accepted,
    Activated { url: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Prompt,
    Searching,
    NoResults,
    // Same text as `NoResults`; the fetch itself failed.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultSet {
    pub generation: Generation,
    pub term: String,
    pub language: String,
    pub pages: Vec<Page>,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisplayEvent {
    Status {
        kind: StatusKind,
        message: String,
        suggestion: Option<String>,
    },
    Results(ResultSet),
    PageReady {
        generation: Generation,
        page: Page,
    },
    EntryText {
        text: String,
    },
    Clear,
}

pub fn prompt_message() -> String {
    "Enter your query.".to_string()
}

pub fn searching_message(term: &str) -> String {
    format!("Searching for '{term}'...")
}

pub fn no_results_message(term: &str, language: &str) -> String {
    format!("Your search - {term} - did not match any documents. Language: {language}")
}
