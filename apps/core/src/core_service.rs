use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api_client::{ApiClient, ApiError};
use crate::contract::{DisplayEvent, Generation};
use crate::session_state::{Effect, SessionController};
use crate::settings::SearchSettings;

const QUERY_ACTION: &str = "query";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("search service has stopped")]
    Stopped,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug)]
enum Command {
    TermsChanged(Vec<String>),
    BackspaceWhileTriggered,
    Activate {
        page_id: u64,
        reply: oneshot::Sender<Option<String>>,
    },
    ActivateSuggestion,
    SearchText {
        text: String,
        language: Option<String>,
    },
    Clear,
    Disable,
    UpdateSettings(SearchSettings),
}

#[derive(Debug)]
enum Completion {
    DebounceElapsed(Generation),
    PagesFetched {
        generation: Generation,
        result: Result<Value, ApiError>,
    },
    ImagesFetched {
        generation: Generation,
        page_id: u64,
        titles: Vec<String>,
        result: Result<Value, ApiError>,
    },
}

#[derive(Debug, Clone)]
pub struct ServiceHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ServiceHandle {
    fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.commands.send(command).map_err(|_| ServiceError::Stopped)
    }

    pub fn search_terms_changed(&self, terms: Vec<String>) -> Result<(), ServiceError> {
        self.send(Command::TermsChanged(terms))
    }

    pub fn subsearch(&self, _previous_results: &[u64], terms: Vec<String>) -> Result<(), ServiceError> {
        self.send(Command::TermsChanged(terms))
    }

    pub fn backspace_while_triggered(&self) -> Result<(), ServiceError> {
        self.send(Command::BackspaceWhileTriggered)
    }

    pub async fn activate(&self, page_id: u64) -> Result<Option<String>, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Activate { page_id, reply })?;
        response.await.map_err(|_| ServiceError::Stopped)
    }

    pub fn activate_suggestion(&self) -> Result<(), ServiceError> {
        self.send(Command::ActivateSuggestion)
    }

    pub fn search_text(&self, text: String, language: Option<String>) -> Result<(), ServiceError> {
        self.send(Command::SearchText { text, language })
    }

    pub fn clear(&self) -> Result<(), ServiceError> {
        self.send(Command::Clear)
    }

    pub fn disable(&self) -> Result<(), ServiceError> {
        self.send(Command::Disable)
    }

    pub fn update_settings(&self, settings: SearchSettings) -> Result<(), ServiceError> {
        self.send(Command::UpdateSettings(settings))
    }
}

pub struct CoreService {
    state: SessionController,
    client: ApiClient,
    display: mpsc::UnboundedSender<DisplayEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    debounce: Option<JoinHandle<()>>,
}

impl CoreService {
    pub fn new(
        settings: SearchSettings,
        client: ApiClient,
        display: mpsc::UnboundedSender<DisplayEvent>,
    ) -> (Self, ServiceHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let service = Self {
            state: SessionController::new(settings),
            client,
            display,
            commands,
            completions_tx,
            completions,
            debounce: None,
        };
        (service, ServiceHandle { commands: commands_tx })
    }

    pub async fn run(mut self) {
        info!(endpoint = ?self.client.endpoint(), "search service started");
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
            }
        }
        self.cancel_debounce();
        info!("search service stopped");
    }

    fn handle_command(&mut self, command: Command) {
        let effects = match command {
            Command::TermsChanged(terms) => self.state.on_terms_changed(&terms),
            Command::BackspaceWhileTriggered => self.state.on_backspace_while_triggered(),
            Command::Activate { page_id, reply } => {
                let url = self
                    .state
                    .activation_language(page_id)
                    .map(|language| self.client.url_for_page_id(&language, page_id));
                info!(page_id, url = url.as_deref().unwrap_or("-"), "activating result");
                let _ = reply.send(url);
                Vec::new()
            }
            Command::ActivateSuggestion => self.state.activate_suggestion(),
            Command::SearchText { text, language } => {
                self.state.search_now(&text, language.as_deref())
            }
            Command::Clear => self.state.clear(),
            Command::Disable => self.state.disable(),
            Command::UpdateSettings(settings) => {
                info!(keyword = %settings.keyword, language = %settings.default_language, "settings updated");
                self.state.update_settings(settings);
                Vec::new()
            }
        };
        self.apply(effects);
    }

    fn handle_completion(&mut self, completion: Completion) {
        let effects = match completion {
            Completion::DebounceElapsed(generation) => {
                // A stale tick must not orphan the live timer's handle.
                if generation == self.state.generation() {
                    self.debounce = None;
                }
                self.state.on_debounce_elapsed(generation)
            }
            Completion::PagesFetched { generation, result } => {
                self.state.on_pages_fetched(generation, result)
            }
            Completion::ImagesFetched {
                generation,
                page_id,
                titles,
                result,
            } => self
                .state
                .on_images_fetched(generation, page_id, &titles, result),
        };
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::CancelDebounce => self.cancel_debounce(),
                Effect::ScheduleDebounce { generation, delay } => {
                    self.cancel_debounce();
                    let completions = self.completions_tx.clone();
                    self.debounce = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = completions.send(Completion::DebounceElapsed(generation));
                    }));
                }
                Effect::FetchPages {
                    generation,
                    language,
                    params,
                } => {
                    let client = self.client.clone();
                    let completions = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = client.query(&language, QUERY_ACTION, &params).await;
                        let _ = completions.send(Completion::PagesFetched { generation, result });
                    });
                }
                Effect::FetchImages {
                    generation,
                    page_id,
                    language,
                    titles,
                    params,
                } => {
                    let client = self.client.clone();
                    let completions = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = client.query(&language, QUERY_ACTION, &params).await;
                        let _ = completions.send(Completion::ImagesFetched {
                            generation,
                            page_id,
                            titles,
                            result,
                        });
                    });
                }
                Effect::Display(event) => {
                    if self.display.send(event).is_err() {
                        debug!("display receiver dropped; event discarded");
                    }
                }
            }
        }
    }

    fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }
}
