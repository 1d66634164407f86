use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api_client::{ApiError, QueryParams};
use crate::contract::{
    no_results_message, prompt_message, searching_message, DisplayEvent, Generation, ResultSet,
    StatusKind,
};
use crate::model::Page;
use crate::query_dsl::Query;
use crate::search::{
    assemble, decode_search_response, image_params, image_request_titles, match_images,
    search_params,
};
use crate::settings::{self, SearchSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Debouncing,
    Fetching,
    Displaying,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CancelDebounce,
    ScheduleDebounce {
        generation: Generation,
        delay: Duration,
    },
    FetchPages {
        generation: Generation,
        language: String,
        params: QueryParams,
    },
    FetchImages {
        generation: Generation,
        page_id: u64,
        language: String,
        titles: Vec<String>,
        params: QueryParams,
    },
    Display(DisplayEvent),
}

#[derive(Debug, Clone)]
pub struct SearchSession {
    pub generation: Generation,
    pub term: String,
    pub language: String,
    pub phase: SessionPhase,
    pub suggestion: Option<String>,
    pub pages: Vec<Page>,
    settings: SearchSettings,
}

impl SearchSession {
    fn new(
        generation: Generation,
        term: String,
        language: String,
        settings: SearchSettings,
        phase: SessionPhase,
    ) -> Self {
        Self {
            generation,
            term,
            language,
            phase,
            suggestion: None,
            pages: Vec::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Displayed {
    language: String,
    page_ids: Vec<u64>,
    suggestion: Option<String>,
}

// Completions stamped with a stale generation are dropped.
#[derive(Debug, Clone)]
pub struct SessionController {
    settings: SearchSettings,
    generation: Generation,
    session: Option<SearchSession>,
    displayed: Option<Displayed>,
}

impl SessionController {
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings,
            generation: 0,
            session: None,
            displayed: None,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: SearchSettings) {
        self.settings = settings;
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn session(&self) -> Option<&SearchSession> {
        self.session.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session
            .as_ref()
            .map(|session| session.phase)
            .unwrap_or(SessionPhase::Idle)
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.displayed
            .as_ref()
            .and_then(|displayed| displayed.suggestion.as_deref())
    }

    pub fn on_terms_changed(&mut self, terms: &[String]) -> Vec<Effect> {
        let query = Query::from_terms(terms, &self.settings.keyword);
        if !query.trigger {
            return self.reset(DisplayEvent::Clear);
        }
        let Some(term) = query.term else {
            return self.reset(prompt_event());
        };
        let language = match query.language {
            Some(code) => match settings::validate_language(&code) {
                Ok(language) => language,
                Err(reason) => {
                    warn!(%code, %reason, "ignoring input with invalid language override");
                    return self.reset(DisplayEvent::Clear);
                }
            },
            None => self.settings.default_language.clone(),
        };

        if self.is_current(&term, &language) {
            debug!(%term, %language, "terms unchanged; keeping current search");
            return Vec::new();
        }

        let generation = self.advance();
        debug!(generation, %term, %language, "debouncing search");
        self.session = Some(SearchSession::new(
            generation,
            term,
            language,
            self.settings.clone(),
            SessionPhase::Debouncing,
        ));

        vec![
            Effect::CancelDebounce,
            Effect::ScheduleDebounce {
                generation,
                delay: self.settings.delay,
            },
        ]
    }

    pub fn on_backspace_while_triggered(&mut self) -> Vec<Effect> {
        self.reset(prompt_event())
    }

    pub fn clear(&mut self) -> Vec<Effect> {
        self.reset(DisplayEvent::Clear)
    }

    pub fn disable(&mut self) -> Vec<Effect> {
        info!(generation = self.generation, "provider disabled");
        self.reset(DisplayEvent::Clear)
    }

    pub fn search_now(&mut self, term: &str, language: Option<&str>) -> Vec<Effect> {
        let term = term.trim();
        if term.is_empty() {
            return self.reset(prompt_event());
        }
        let language = match language.map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) => settings::validate_language(code).unwrap_or_else(|reason| {
                warn!(%code, %reason, "invalid language override; using default");
                self.settings.default_language.clone()
            }),
            None => self.settings.default_language.clone(),
        };

        let entry = Query {
            trigger: true,
            language: (language != self.settings.default_language).then(|| language.clone()),
            term: Some(term.to_string()),
        };

        let generation = self.advance();
        self.session = Some(SearchSession::new(
            generation,
            term.to_string(),
            language,
            self.settings.clone(),
            SessionPhase::Fetching,
        ));

        let mut effects = vec![
            Effect::CancelDebounce,
            Effect::Display(DisplayEvent::EntryText {
                text: entry.render(&self.settings.keyword),
            }),
        ];
        effects.extend(self.start_fetch());
        effects
    }

    pub fn activate_suggestion(&mut self) -> Vec<Effect> {
        let Some(displayed) = self.displayed.clone() else {
            return Vec::new();
        };
        let Some(suggestion) = displayed.suggestion else {
            return Vec::new();
        };
        info!(%suggestion, language = %displayed.language, "activating suggestion");
        self.search_now(&suggestion, Some(displayed.language.as_str()))
    }

    pub fn activation_language(&self, page_id: u64) -> Option<String> {
        if page_id == 0 {
            return None;
        }
        let displayed = self
            .displayed
            .as_ref()
            .filter(|displayed| displayed.page_ids.contains(&page_id))
            .map(|displayed| displayed.language.clone());
        let language = displayed
            .or_else(|| self.session.as_ref().map(|session| session.language.clone()))
            .unwrap_or_else(|| self.settings.default_language.clone());
        Some(language)
    }

    pub fn on_debounce_elapsed(&mut self, generation: Generation) -> Vec<Effect> {
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping stale debounce");
            return Vec::new();
        }
        match self.session.as_mut() {
            Some(session) if session.phase == SessionPhase::Debouncing => {
                session.phase = SessionPhase::Fetching;
            }
            _ => return Vec::new(),
        }
        self.start_fetch()
    }

    pub fn on_pages_fetched(
        &mut self,
        generation: Generation,
        result: Result<Value, ApiError>,
    ) -> Vec<Effect> {
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping stale page search");
            return Vec::new();
        }
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.phase == SessionPhase::Fetching)
        else {
            return Vec::new();
        };

        let response = match result.and_then(|value| decode_search_response(&value)) {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    generation,
                    term = %session.term,
                    language = %session.language,
                    class = error.class(),
                    %error,
                    "page search failed"
                );
                session.phase = SessionPhase::Failed;
                session.suggestion = None;
                return self.show_no_results(StatusKind::Failed);
            }
        };

        session.suggestion = response.suggestion;
        let pages = response
            .pages
            .map(|pages| {
                assemble(
                    &pages,
                    session.settings.exclude_disambiguation,
                    &session.language,
                )
            })
            .unwrap_or_default();
        session.phase = SessionPhase::Displaying;

        if pages.is_empty() {
            info!(generation, term = %session.term, language = %session.language, "search returned no usable pages");
            return self.show_no_results(StatusKind::NoResults);
        }

        info!(generation, term = %session.term, count = pages.len(), "displaying results");
        session.pages = pages;
        let result_set = ResultSet {
            generation,
            term: session.term.clone(),
            language: session.language.clone(),
            pages: session.pages.clone(),
            suggestion: session.suggestion.clone(),
        };
        let mut effects = vec![Effect::Display(DisplayEvent::Results(result_set))];

        let load_images = session.settings.enable_images;
        for page in session.pages.iter_mut() {
            if load_images && page.has_images_to_load() {
                let titles = image_request_titles(page);
                effects.push(Effect::FetchImages {
                    generation,
                    page_id: page.id,
                    language: session.language.clone(),
                    params: image_params(&titles, &session.settings),
                    titles,
                });
            } else if page.skip_images() {
                effects.push(Effect::Display(DisplayEvent::PageReady {
                    generation,
                    page: page.clone(),
                }));
            }
        }

        self.displayed = Some(Displayed {
            language: session.language.clone(),
            page_ids: session.pages.iter().map(|page| page.id).collect(),
            suggestion: session.suggestion.clone(),
        });
        effects
    }

    pub fn on_images_fetched(
        &mut self,
        generation: Generation,
        page_id: u64,
        titles: &[String],
        result: Result<Value, ApiError>,
    ) -> Vec<Effect> {
        if generation != self.generation {
            debug!(generation, page_id, current = self.generation, "dropping stale image wave");
            return Vec::new();
        }
        let Some(page) = self
            .session
            .as_mut()
            .filter(|session| session.phase == SessionPhase::Displaying)
            .and_then(|session| session.pages.iter_mut().find(|page| page.id == page_id))
        else {
            return Vec::new();
        };

        let images = match result.and_then(|value| match_images(&value, page, titles)) {
            Ok(images) => images,
            Err(error) => {
                warn!(generation, page_id, class = error.class(), %error, "image wave failed");
                Vec::new()
            }
        };

        if page.finish_images(images) {
            vec![Effect::Display(DisplayEvent::PageReady {
                generation,
                page: page.clone(),
            })]
        } else {
            Vec::new()
        }
    }

    fn advance(&mut self) -> Generation {
        self.generation += 1;
        self.generation
    }

    fn is_current(&self, term: &str, language: &str) -> bool {
        self.session.as_ref().is_some_and(|session| {
            session.term == term
                && session.language == language
                && matches!(
                    session.phase,
                    SessionPhase::Debouncing | SessionPhase::Fetching | SessionPhase::Displaying
                )
        })
    }

    fn reset(&mut self, event: DisplayEvent) -> Vec<Effect> {
        self.advance();
        self.session = None;
        self.displayed = None;
        vec![Effect::CancelDebounce, Effect::Display(event)]
    }

    fn start_fetch(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        info!(generation = session.generation, term = %session.term, language = %session.language, "dispatching page search");
        self.displayed = None;

        vec![
            Effect::Display(DisplayEvent::Status {
                kind: StatusKind::Searching,
                message: searching_message(&session.term),
                suggestion: None,
            }),
            Effect::FetchPages {
                generation: session.generation,
                language: session.language.clone(),
                params: search_params(&session.term, &session.settings),
            },
        ]
    }

    fn show_no_results(&mut self, kind: StatusKind) -> Vec<Effect> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        self.displayed = Some(Displayed {
            language: session.language.clone(),
            page_ids: Vec::new(),
            suggestion: session.suggestion.clone(),
        });
        vec![Effect::Display(DisplayEvent::Status {
            kind,
            message: no_results_message(&session.term, &session.language),
            suggestion: session.suggestion.clone(),
        })]
    }
}

fn prompt_event() -> DisplayEvent {
    DisplayEvent::Status {
        kind: StatusKind::Prompt,
        message: prompt_message(),
        suggestion: None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Effect, SessionController, SessionPhase};
    use crate::api_client::ApiError;
    use crate::contract::{DisplayEvent, StatusKind};
    use crate::settings::SearchSettings;
    use serde_json::json;

    fn terms(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn controller() -> SessionController {
        SessionController::new(SearchSettings::default())
    }

    fn fetch_generation(effects: &[Effect]) -> u64 {
        effects
            .iter()
            .find_map(|effect| match effect {
                Effect::FetchPages { generation, .. } => Some(*generation),
                _ => None,
            })
            .expect("fetch effect")
    }

    fn einstein_response() -> serde_json::Value {
        json!({"query": {"pages": {"736": {
            "pageid": 736, "ns": 0, "title": "Albert Einstein", "index": 1,
            "extract": "physicist..."
        }}}})
    }

    fn status_of(effects: &[Effect]) -> Option<(StatusKind, String)> {
        effects.iter().find_map(|effect| match effect {
            Effect::Display(DisplayEvent::Status { kind, message, .. }) => {
                Some((*kind, message.clone()))
            }
            _ => None,
        })
    }

    #[test]
    fn keystroke_schedules_debounce() {
        let mut state = controller();
        let effects = state.on_terms_changed(&terms("wiki rust"));
        assert_eq!(state.phase(), SessionPhase::Debouncing);
        assert!(matches!(effects[0], Effect::CancelDebounce));
        assert!(matches!(effects[1], Effect::ScheduleDebounce { generation: 1, .. }));
    }

    #[test]
    fn blank_term_prompts_without_fetch() {
        let mut state = controller();
        state.on_terms_changed(&terms("wiki einst"));
        let effects = state.on_terms_changed(&["wiki".to_string(), String::new()]);
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert_eq!(
            status_of(&effects),
            Some((StatusKind::Prompt, "Enter your query.".to_string()))
        );
        assert!(!effects
            .iter()
            .any(|effect| matches!(effect, Effect::ScheduleDebounce { .. } | Effect::FetchPages { .. })));
    }

    #[test]
    fn non_trigger_input_clears() {
        let mut state = controller();
        let effects = state.on_terms_changed(&terms("firefox"));
        assert_eq!(effects, vec![Effect::CancelDebounce, Effect::Display(DisplayEvent::Clear)]);
    }

    #[test]
    fn only_last_debounce_fetches() {
        let mut state = controller();
        state.on_terms_changed(&terms("wiki ru"));
        state.on_terms_changed(&terms("wiki rus"));
        state.on_terms_changed(&terms("wiki rust"));
        assert!(state.on_debounce_elapsed(1).is_empty());
        assert!(state.on_debounce_elapsed(2).is_empty());

        let effects = state.on_debounce_elapsed(3);
        assert_eq!(state.phase(), SessionPhase::Fetching);
        assert_eq!(
            status_of(&effects),
            Some((StatusKind::Searching, "Searching for 'rust'...".to_string()))
        );
        assert_eq!(fetch_generation(&effects), 3);
    }

    #[test]
    fn stale_response_never_overwrites_newer_one() {
        let mut state = controller();
        state.on_terms_changed(&terms("wiki alpha"));
        let first = fetch_generation(&state.on_debounce_elapsed(1));
        state.on_terms_changed(&terms("wiki beta"));
        let second = fetch_generation(&state.on_debounce_elapsed(2));

        let effects = state.on_pages_fetched(second, Ok(einstein_response()));
        assert!(matches!(effects[0], Effect::Display(DisplayEvent::Results(_))));
        assert!(state.on_pages_fetched(first, Ok(einstein_response())).is_empty());
        assert_eq!(state.session().map(|s| s.term.as_str()), Some("beta"));
    }

    #[test]
    fn language_override_is_pinned() {
        let mut state = controller();
        state.on_terms_changed(&terms("wiki-fr Einstein"));
        let effects = state.on_debounce_elapsed(1);
        let language = effects.iter().find_map(|effect| match effect {
            Effect::FetchPages { language, .. } => Some(language.clone()),
            _ => None,
        });
        assert_eq!(language.as_deref(), Some("fr"));

        let effects = state.on_pages_fetched(1, Ok(einstein_response()));
        match &effects[0] {
            Effect::Display(DisplayEvent::Results(set)) => {
                assert_eq!(set.language, "fr");
                assert_eq!(set.pages.len(), 1);
                assert_eq!(set.pages[0].id, 736);
                assert_eq!(set.pages[0].title, "Albert Einstein");
                assert_eq!(set.pages[0].extract, "physicist...");
                assert!(set.pages[0].exists);
            }
            other => panic!("unexpected effect: {other:?}"),
        }
        assert_eq!(state.activation_language(736).as_deref(), Some("fr"));
    }

    #[test]
    fn missing_pages_and_missing_query_share_fallback() {
        for response in [json!({"query": {}}), json!({})] {
            let mut state = controller();
            state.on_terms_changed(&terms("wiki zzzz"));
            state.on_debounce_elapsed(1);
            let effects = state.on_pages_fetched(1, Ok(response));
            assert_eq!(
                status_of(&effects),
                Some((
                    StatusKind::NoResults,
                    "Your search - zzzz - did not match any documents. Language: en".to_string()
                ))
            );
        }
    }

    #[test]
    fn transport_failure_shows_same_text_but_failed_kind() {
        let mut state = controller();
        state.on_terms_changed(&terms("wiki zzzz"));
        state.on_debounce_elapsed(1);
        let effects = state.on_pages_fetched(1, Err(ApiError::status(503)));
        assert_eq!(state.phase(), SessionPhase::Failed);
        assert_eq!(
            status_of(&effects),
            Some((
                StatusKind::Failed,
                "Your search - zzzz - did not match any documents. Language: en".to_string()
            ))
        );
    }

    #[test]
    fn suggestion_is_kept_and_can_be_activated() {
        let mut state = controller();
        state.on_terms_changed(&terms("wiki-de einstien"));
        state.on_debounce_elapsed(1);
        let effects = state.on_pages_fetched(
            1,
            Ok(json!({"query": {"searchinfo": {"suggestion": "einstein"}}})),
        );
        match &effects[0] {
            Effect::Display(DisplayEvent::Status { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("einstein"));
            }
            other => panic!("unexpected effect: {other:?}"),
        }

        let effects = state.activate_suggestion();
        assert!(effects.contains(&Effect::Display(DisplayEvent::EntryText {
            text: "wiki-de einstein".to_string()
        })));
        assert_eq!(fetch_generation(&effects), 2);

        // Host echoes the entry text back; no new cycle starts.
        assert!(state.on_terms_changed(&terms("wiki-de einstein")).is_empty());
    }

    #[test]
    fn images_update_pages_then_fire_ready() {
        let mut state = controller();
        state.on_terms_changed(&terms("wiki einstein"));
        state.on_debounce_elapsed(1);
        let effects = state.on_pages_fetched(
            1,
            Ok(json!({"query": {"pages": {
                "736": {"pageid": 736, "title": "Albert Einstein", "extract": "physicist...",
                        "index": 1, "pageprops": {"page_image": "Einstein_1921.jpg"}},
                "9": {"pageid": 9, "title": "Other", "extract": "text", "index": 2}
            }}})),
        );
        let titles = effects
            .iter()
            .find_map(|effect| match effect {
                Effect::FetchImages { page_id: 736, titles, .. } => Some(titles.clone()),
                _ => None,
            })
            .expect("image wave for page 736");
        assert!(effects.iter().any(|effect| matches!(
            effect,
            Effect::Display(DisplayEvent::PageReady { page, .. }) if page.id == 9
        )));

        let effects = state.on_images_fetched(
            1,
            736,
            &titles,
            Ok(json!({"query": {
                "normalized": [{"from": "File:Einstein 1921.jpg", "to": "File:Einstein 1921.jpg"}],
                "pages": {"-1": {"title": "File:Einstein 1921.jpg", "imagerepository": "shared",
                    "imageinfo": [{"url": "u", "thumburl": "t", "thumbwidth": 100, "thumbheight": 120}]}}
            }})),
        );
        match &effects[..] {
            [Effect::Display(DisplayEvent::PageReady { page, .. })] => {
                assert_eq!(page.images.len(), 1);
                assert!(page.page_image().is_some());
            }
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[test]
    fn disabled_images_skip_the_wave() {
        let mut state = SessionController::new(SearchSettings {
            enable_images: false,
            ..SearchSettings::default()
        });
        state.on_terms_changed(&terms("wiki einstein"));
        state.on_debounce_elapsed(1);
        let effects = state.on_pages_fetched(
            1,
            Ok(json!({"query": {"pages": {"736": {"pageid": 736, "title": "Albert Einstein",
                "extract": "physicist...", "pageprops": {"page_image": "E.jpg"}}}}})),
        );
        assert!(!effects
            .iter()
            .any(|effect| matches!(effect, Effect::FetchImages { .. })));
    }

    #[test]
    fn clearing_drops_in_flight_results() {
        let mut state = controller();
        state.on_terms_changed(&terms("wiki einstein"));
        state.on_debounce_elapsed(1);
        state.clear();
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(state.on_pages_fetched(1, Ok(einstein_response())).is_empty());
    }

    #[test]
    fn settings_change_waits_for_next_session() {
        let mut state = controller();
        state.on_terms_changed(&terms("wiki einstein"));
        state.update_settings(SearchSettings {
            max_results: 3,
            ..SearchSettings::default()
        });
        let effects = state.on_debounce_elapsed(1);
        let params = effects
            .iter()
            .find_map(|effect| match effect {
                Effect::FetchPages { params, .. } => Some(params.clone()),
                _ => None,
            })
            .expect("fetch effect");
        assert!(params.contains(&("gsrlimit", "10".to_string())));
    }

    #[test]
    fn url_characters_in_language_override_never_reach_a_fetch() {
        let mut state = controller();
        let effects =
            state.on_terms_changed(&["wiki-attacker.example/x?".to_string(), "rust".to_string()]);
        assert_eq!(effects, vec![Effect::CancelDebounce, Effect::Display(DisplayEvent::Clear)]);
        assert_eq!(state.phase(), SessionPhase::Idle);
        assert!(state.on_debounce_elapsed(state.generation()).is_empty());
    }

    #[test]
    fn direct_search_with_bad_language_uses_default() {
        let mut state = controller();
        let effects = state.search_now("rust", Some("evil.example#"));
        let language = effects.iter().find_map(|effect| match effect {
            Effect::FetchPages { language, .. } => Some(language.clone()),
            _ => None,
        });
        assert_eq!(language.as_deref(), Some("en"));
        assert!(effects.contains(&Effect::Display(DisplayEvent::EntryText {
            text: "wiki rust".to_string()
        })));
    }

    #[test]
    fn superseded_image_wave_is_dropped() {
        let mut state = controller();
        state.on_terms_changed(&terms("wiki einstein"));
        state.on_debounce_elapsed(1);
        let effects = state.on_pages_fetched(
            1,
            Ok(json!({"query": {"pages": {"736": {"pageid": 736, "title": "Albert Einstein",
                "extract": "physicist...", "pageprops": {"page_image": "E.jpg"}}}}})),
        );
        let titles = effects
            .iter()
            .find_map(|effect| match effect {
                Effect::FetchImages { generation: 1, titles, .. } => Some(titles.clone()),
                _ => None,
            })
            .expect("image wave for generation 1");

        state.on_terms_changed(&terms("wiki newton"));
        let effects = state.on_images_fetched(
            1,
            736,
            &titles,
            Ok(json!({"query": {"pages": {"-1": {"title": "File:E.jpg",
                "imageinfo": [{"url": "u", "thumburl": "t", "thumbwidth": 10, "thumbheight": 10}]}}}})),
        );
        assert!(effects.is_empty());
        assert_eq!(state.phase(), SessionPhase::Debouncing);
        assert_eq!(state.session().map(|s| s.term.as_str()), Some("newton"));
        assert!(state.session().is_some_and(|s| s.pages.is_empty()));
    }
}
