use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::api_client::{ApiError, QueryParams};
use crate::model::{is_blank, Image, Page};
use crate::settings::SearchSettings;

// MediaWiki caps `titles` at 50 per request.
pub const MAX_IMAGE_TITLES: usize = 50;
const IMAGES_PER_PAGE_LIMIT: u32 = 500;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResponse {
    pub pages: Option<Map<String, Value>>,
    pub suggestion: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Envelope {
    query: Option<QueryBlock>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct QueryBlock {
    pages: Option<Map<String, Value>>,
    searchinfo: Option<SearchInfo>,
    normalized: Vec<Normalized>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SearchInfo {
    suggestion: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Normalized {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ApiErrorBody {
    code: String,
    info: String,
}

fn decode_envelope(value: &Value) -> Result<Envelope, ApiError> {
    if !value.is_object() {
        return Err(ApiError::parse("response is not a JSON object"));
    }
    let envelope = Envelope::deserialize(value).map_err(|error| ApiError::parse(error.to_string()))?;
    if let Some(error) = &envelope.error {
        warn!(code = %error.code, info = %error.info, "api returned an error object");
    }
    Ok(envelope)
}

pub fn decode_search_response(value: &Value) -> Result<SearchResponse, ApiError> {
    let Some(query) = decode_envelope(value)?.query else {
        return Ok(SearchResponse::default());
    };
    let suggestion = query
        .searchinfo
        .and_then(|info| info.suggestion)
        .map(|suggestion| suggestion.trim().to_string())
        .filter(|suggestion| !suggestion.is_empty());

    Ok(SearchResponse {
        pages: query.pages,
        suggestion,
    })
}

pub fn search_params(term: &str, settings: &SearchSettings) -> QueryParams {
    vec![
        ("prop", "info|extracts|pageprops|images".to_string()),
        ("inprop", "url".to_string()),
        ("generator", "search".to_string()),
        ("gsrsearch", term.to_string()),
        ("gsrnamespace", "0".to_string()),
        ("gsrlimit", settings.max_results.to_string()),
        ("exlimit", settings.max_results.to_string()),
        ("exchars", settings.max_chars.to_string()),
        ("exintro", String::new()),
        ("explaintext", String::new()),
        ("exsectionformat", "plain".to_string()),
        ("imlimit", IMAGES_PER_PAGE_LIMIT.to_string()),
        ("redirects", String::new()),
    ]
}

pub fn image_params(titles: &[String], settings: &SearchSettings) -> QueryParams {
    vec![
        ("prop", "imageinfo".to_string()),
        ("iiprop", "url".to_string()),
        ("iiurlwidth", settings.image_max_width.to_string()),
        ("iiurlheight", settings.image_max_height.to_string()),
        ("redirects", String::new()),
        ("titles", titles.join("|")),
    ]
}

pub fn assemble(
    pages: &Map<String, Value>,
    exclude_disambiguation: bool,
    language: &str,
) -> Vec<Page> {
    let mut ranked: Vec<(usize, Page)> = Vec::with_capacity(pages.len());

    for (position, (key, raw)) in pages.iter().enumerate() {
        let page = match Page::from_api(raw, language) {
            Ok(page) => page,
            Err(error) => {
                warn!(page_key = %key, %error, "skipping malformed page");
                continue;
            }
        };
        if exclude_disambiguation && page.is_disambiguation {
            debug!(page_id = page.id, title = %page.title, "excluding disambiguation page");
            continue;
        }
        ranked.push((position, page));
    }

    ranked.sort_by_key(|(position, page)| (page.rank.unwrap_or(u32::MAX), *position));
    ranked.into_iter().map(|(_, page)| page).collect()
}

pub fn image_request_titles(page: &Page) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    let candidates = page.page_image_name.iter().chain(page.image_titles.iter());
    for title in candidates {
        if is_blank(title) || titles.contains(title) {
            continue;
        }
        titles.push(title.clone());
        if titles.len() == MAX_IMAGE_TITLES {
            break;
        }
    }
    titles
}

pub fn match_images(value: &Value, page: &Page, requested: &[String]) -> Result<Vec<Image>, ApiError> {
    let Some(query) = decode_envelope(value)?.query else {
        return Ok(Vec::new());
    };
    let Some(pages) = query.pages else {
        return Ok(Vec::new());
    };

    let renamed: HashMap<&str, &str> = query
        .normalized
        .iter()
        .map(|entry| (entry.from.as_str(), entry.to.as_str()))
        .collect();
    let resolve = |title: &str| -> String {
        renamed.get(title).copied().unwrap_or(title).to_string()
    };

    let page_image = page.page_image_name.as_deref().map(resolve);
    let order: HashMap<String, usize> = requested
        .iter()
        .enumerate()
        .map(|(index, title)| (resolve(title.as_str()), index))
        .collect();

    let mut images: Vec<Image> = pages
        .values()
        .map(Image::from_api)
        .filter(|image| image.exists)
        .map(|mut image| {
            image.is_page_image = page_image.as_deref() == Some(image.title.as_str());
            image
        })
        .collect();

    images.sort_by_key(|image| {
        (
            !image.is_page_image,
            order.get(&image.title).copied().unwrap_or(usize::MAX),
        )
    });
    Ok(images)
}
