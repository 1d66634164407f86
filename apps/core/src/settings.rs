use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DELAY_RANGE_MS: (u64, u64) = (100, 5000);
pub const MAX_CHARS_RANGE: (u16, u16) = (50, 1000);
pub const MAX_RESULTS_RANGE: (u16, u16) = (1, 20);
pub const IMAGE_WIDTH_RANGE: (u32, u32) = (50, 500);
pub const IMAGE_HEIGHT_RANGE: (u32, u32) = (30, 500);
pub const TIMEOUT_RANGE_SECS: (u64, u64) = (1, 120);

const MAX_LANGUAGE_LEN: usize = 20;

// A session keeps the snapshot it was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub keyword: String,
    pub default_language: String,
    pub delay: Duration,
    pub max_results: u16,
    pub max_chars: u16,
    pub exclude_disambiguation: bool,
    pub enable_images: bool,
    pub image_max_width: u32,
    pub image_max_height: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            keyword: "wiki".to_string(),
            default_language: "en".to_string(),
            delay: Duration::from_millis(500),
            max_results: 10,
            max_chars: 300,
            exclude_disambiguation: true,
            enable_images: true,
            image_max_width: 200,
            image_max_height: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    pub keyword: String,
    pub default_language: String,
    pub delay_ms: u64,
    pub max_results: u16,
    pub max_chars: u16,
    pub exclude_disambiguation: bool,
    pub enable_images: bool,
    pub image_max_width: u32,
    pub image_max_height: u32,
}

impl Default for SettingsUpdate {
    fn default() -> Self {
        Self::from(&SearchSettings::default())
    }
}

impl From<&SearchSettings> for SettingsUpdate {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            keyword: settings.keyword.clone(),
            default_language: settings.default_language.clone(),
            delay_ms: settings.delay.as_millis() as u64,
            max_results: settings.max_results,
            max_chars: settings.max_chars,
            exclude_disambiguation: settings.exclude_disambiguation,
            enable_images: settings.enable_images,
            image_max_width: settings.image_max_width,
            image_max_height: settings.image_max_height,
        }
    }
}

impl SettingsUpdate {
    pub fn into_settings(self) -> Result<SearchSettings, String> {
        let keyword = validate_keyword(&self.keyword)?;
        let default_language = validate_language(&self.default_language)?;
        validate_delay_ms(self.delay_ms)?;
        validate_max_results(self.max_results)?;
        validate_max_chars(self.max_chars)?;
        validate_image_size(self.image_max_width, self.image_max_height)?;

        Ok(SearchSettings {
            keyword,
            default_language,
            delay: Duration::from_millis(self.delay_ms),
            max_results: self.max_results,
            max_chars: self.max_chars,
            exclude_disambiguation: self.exclude_disambiguation,
            enable_images: self.enable_images,
            image_max_width: self.image_max_width,
            image_max_height: self.image_max_height,
        })
    }
}

pub fn validate_keyword(input: &str) -> Result<String, String> {
    let keyword = input.trim();
    if keyword.is_empty() {
        return Err("Keyword is required.".to_string());
    }
    if keyword.chars().any(char::is_whitespace) {
        return Err("Keyword must be a single word.".to_string());
    }
    if keyword.contains('-') {
        return Err("Keyword cannot contain '-'; it separates the language code.".to_string());
    }
    Ok(keyword.to_string())
}

pub fn validate_language(input: &str) -> Result<String, String> {
    let code = input.trim();
    if code.is_empty() {
        return Err("Language code is required.".to_string());
    }
    if code.len() > MAX_LANGUAGE_LEN {
        return Err(format!(
            "Language code must be at most {MAX_LANGUAGE_LEN} characters."
        ));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(format!("Unsupported language code '{code}'."));
    }
    Ok(code.to_ascii_lowercase())
}

pub fn validate_delay_ms(value: u64) -> Result<(), String> {
    check_range("Delay time", value, DELAY_RANGE_MS)
}

pub fn validate_max_chars(value: u16) -> Result<(), String> {
    check_range("Max chars", value, MAX_CHARS_RANGE)
}

pub fn validate_max_results(value: u16) -> Result<(), String> {
    check_range("Max results", value, MAX_RESULTS_RANGE)
}

pub fn validate_image_size(width: u32, height: u32) -> Result<(), String> {
    check_range("Image max width", width, IMAGE_WIDTH_RANGE)?;
    check_range("Image max height", height, IMAGE_HEIGHT_RANGE)
}

pub fn validate_timeout_secs(value: u64) -> Result<(), String> {
    check_range("HTTP timeout", value, TIMEOUT_RANGE_SECS)
}

fn check_range<T>(label: &str, value: T, (min, max): (T, T)) -> Result<(), String>
where
    T: PartialOrd + std::fmt::Display,
{
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(format!("{label} must be between {min} and {max}."))
    }
}
