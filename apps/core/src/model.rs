use serde::{Deserialize, Serialize};
use serde_json::Value;

const FILE_NAMESPACE: &str = "File:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedPageError {
    #[error("page has no numeric id")]
    MissingId,
    #[error("page {0} has no title")]
    MissingTitle(u64),
    #[error("page {0} has no extract")]
    MissingExtract(u64),
    #[error("page record does not decode: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Repository {
    #[default]
    Local,
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub title: String,
    pub repository: Repository,
    pub full_url: String,
    pub thumb_url: String,
    pub thumb_width: u32,
    pub thumb_height: u32,
    pub exists: bool,
    pub is_page_image: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawImage {
    title: String,
    imagerepository: Option<String>,
    imageinfo: Option<Vec<RawImageInfo>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawImageInfo {
    url: String,
    thumburl: String,
    thumbwidth: u32,
    thumbheight: u32,
}

impl Image {
    pub fn missing(title: &str) -> Self {
        Self {
            title: title.to_string(),
            repository: Repository::Local,
            full_url: String::new(),
            thumb_url: String::new(),
            thumb_width: 0,
            thumb_height: 0,
            exists: false,
            is_page_image: false,
        }
    }

    pub fn from_api(value: &Value) -> Self {
        let raw = RawImage::deserialize(value).unwrap_or_default();
        if raw.title.to_ascii_lowercase().ends_with(".svg") {
            return Self::missing(&raw.title);
        }
        let Some(info) = raw.imageinfo.and_then(|infos| infos.into_iter().next()) else {
            return Self::missing(&raw.title);
        };

        Self {
            repository: match raw.imagerepository.as_deref() {
                Some("shared") => Repository::Shared,
                _ => Repository::Local,
            },
            title: raw.title,
            full_url: info.url,
            thumb_url: info.thumburl,
            thumb_width: info.thumbwidth,
            thumb_height: info.thumbheight,
            exists: true,
            is_page_image: false,
        }
    }

    pub fn clean_title(&self) -> &str {
        let title = self.title.strip_prefix(FILE_NAMESPACE).unwrap_or(&self.title);
        match title.rfind('.') {
            Some(dot) if dot > 0 => &title[..dot],
            _ => title,
        }
    }

    pub fn fit_within(&self, max_width: u32, max_height: u32) -> (u32, u32) {
        if self.thumb_width == 0 || self.thumb_height == 0 {
            return (0, 0);
        }
        let width = f64::from(self.thumb_width);
        let height = f64::from(self.thumb_height);
        if width > height {
            let ratio = width / height;
            (max_width, (f64::from(max_width) / ratio).ceil() as u32)
        } else {
            let ratio = height / width;
            ((f64::from(max_height) / ratio).ceil() as u32, max_height)
        }
    }
}

// Join of the two loads a page waits on before it is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Readiness {
    data_loaded: bool,
    images_loaded: bool,
    ready_sent: bool,
}

impl Readiness {
    fn take_ready(&mut self) -> bool {
        if self.data_loaded && self.images_loaded && !self.ready_sent {
            self.ready_sent = true;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: u64,
    pub title: String,
    pub url: Option<String>,
    pub extract: String,
    pub length: u64,
    pub language: String,
    pub is_disambiguation: bool,
    pub page_image_name: Option<String>,
    pub images: Vec<Image>,
    pub exists: bool,
    #[serde(skip)]
    pub image_titles: Vec<String>,
    #[serde(skip)]
    pub rank: Option<u32>,
    #[serde(skip)]
    readiness: Readiness,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawPage {
    pageid: Option<u64>,
    title: Option<String>,
    extract: Option<String>,
    fullurl: Option<String>,
    length: u64,
    index: Option<u32>,
    pageprops: Option<RawPageProps>,
    images: Vec<RawImageRef>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawPageProps {
    disambiguation: Option<Value>,
    page_image: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawImageRef {
    title: String,
}

impl Page {
    pub fn from_api(value: &Value, language: &str) -> Result<Self, MalformedPageError> {
        let raw = RawPage::deserialize(value)
            .map_err(|error| MalformedPageError::Decode(error.to_string()))?;

        let id = raw.pageid.ok_or(MalformedPageError::MissingId)?;
        let title = raw
            .title
            .filter(|title| !is_blank(title))
            .ok_or(MalformedPageError::MissingTitle(id))?;
        let extract = raw
            .extract
            .filter(|extract| !is_blank(extract))
            .ok_or(MalformedPageError::MissingExtract(id))?;

        let (is_disambiguation, page_image_name) = match raw.pageprops {
            Some(props) => (
                props.disambiguation.is_some(),
                props
                    .page_image
                    .filter(|name| !is_blank(name))
                    .map(|name| format!("{FILE_NAMESPACE}{}", normalize_title(&name))),
            ),
            None => (false, None),
        };

        let image_titles = raw
            .images
            .into_iter()
            .map(|image| image.title)
            .filter(|title| !is_blank(title))
            .collect();

        Ok(Self {
            id,
            title,
            url: raw.fullurl.filter(|url| !is_blank(url)),
            extract,
            length: raw.length,
            language: language.to_string(),
            is_disambiguation,
            page_image_name,
            images: Vec::new(),
            exists: true,
            image_titles,
            rank: raw.index,
            readiness: Readiness {
                data_loaded: true,
                ..Readiness::default()
            },
        })
    }

    pub fn mobile_url(&self) -> Option<String> {
        self.url
            .as_ref()
            .map(|url| format!("{url}?useformat=mobile"))
    }

    pub fn page_image(&self) -> Option<&Image> {
        self.images.iter().find(|image| image.is_page_image)
    }

    pub fn has_images_to_load(&self) -> bool {
        self.page_image_name.is_some() || !self.image_titles.is_empty()
    }

    pub fn finish_images(&mut self, images: Vec<Image>) -> bool {
        self.images = images;
        self.readiness.images_loaded = true;
        self.readiness.take_ready()
    }

    pub fn skip_images(&mut self) -> bool {
        self.readiness.images_loaded = true;
        self.readiness.take_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.ready_sent
    }
}

pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut previous_space = false;
    for ch in title.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch == ' ' {
            if previous_space {
                continue;
            }
            previous_space = true;
        } else {
            previous_space = false;
        }
        out.push(ch);
    }

    let mut chars = out.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    capitalized.trim().to_string()
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
