#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    pub trigger: bool,
    pub language: Option<String>,
    pub term: Option<String>,
}

impl Query {
    pub fn parse(raw: &str, keyword: &str) -> Self {
        if keyword.is_empty() {
            return Self::default();
        }
        let Some(rest) = raw.strip_prefix(keyword) else {
            return Self::default();
        };

        let (language, remainder) = if let Some(tail) = rest.strip_prefix('-') {
            let lang_end = tail.find(char::is_whitespace).unwrap_or(tail.len());
            let lang = &tail[..lang_end];
            if lang.is_empty() {
                return Self::default();
            }
            (Some(lang), &tail[lang_end..])
        } else {
            (None, rest)
        };

        let mut chars = remainder.chars();
        match chars.next() {
            Some(separator) if separator.is_whitespace() => {}
            _ => return Self::default(),
        }

        let term = chars.as_str().trim();
        Self {
            trigger: true,
            language: language
                .map(str::trim)
                .filter(|lang| !lang.is_empty())
                .map(str::to_string),
            term: (!term.is_empty()).then(|| term.to_string()),
        }
    }

    pub fn from_terms(terms: &[String], keyword: &str) -> Self {
        Self::parse(&terms.join(" "), keyword)
    }

    pub fn render(&self, keyword: &str) -> String {
        let mut text = keyword.to_string();
        if let Some(language) = &self.language {
            text.push('-');
            text.push_str(language);
        }
        text.push(' ');
        if let Some(term) = &self.term {
            text.push_str(term);
        }
        text
    }

    pub fn resolved_language<'a>(&'a self, default_language: &'a str) -> &'a str {
        self.language.as_deref().unwrap_or(default_language)
    }
}
