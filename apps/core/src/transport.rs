use serde::{Deserialize, Serialize};

use crate::contract::{DisplayEvent, HostRequest, HostResponse};
use crate::core_service::{ServiceError, ServiceHandle};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidJson,
    InvalidRequest,
    ServiceUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransportResponse {
    Ok { response: HostResponse },
    Err { error: ErrorResponse },
    Event { event: DisplayEvent },
}

pub async fn handle_request(service: &ServiceHandle, request: HostRequest) -> TransportResponse {
    match dispatch(service, request).await {
        Ok(response) => TransportResponse::Ok { response },
        Err(error) => TransportResponse::Err {
            error: map_service_error(error),
        },
    }
}

pub async fn handle_json(service: &ServiceHandle, payload: &str) -> String {
    let response = match serde_json::from_str::<HostRequest>(payload) {
        Ok(request) => handle_request(service, request).await,
        Err(error) => TransportResponse::Err {
            error: ErrorResponse {
                code: ErrorCode::InvalidJson,
                message: error.to_string(),
            },
        },
    };
    encode(&response)
}

pub fn encode_event(event: DisplayEvent) -> String {
    encode(&TransportResponse::Event { event })
}

fn encode(response: &TransportResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|error| {
        format!(
            r#"{{"status":"err","error":{{"code":"invalid_json","message":"{}"}}}}"#,
            error.to_string().replace('"', "'")
        )
    })
}

async fn dispatch(service: &ServiceHandle, request: HostRequest) -> Result<HostResponse, ServiceError> {
    match request {
        HostRequest::SearchTermsChanged { terms } => service.search_terms_changed(terms)?,
        HostRequest::Subsearch {
            previous_results,
            terms,
        } => service.subsearch(&previous_results, terms)?,
        HostRequest::BackspaceWhileTriggered => service.backspace_while_triggered()?,
        HostRequest::Activate { page_id } => {
            if page_id == 0 {
                return Err(ServiceError::InvalidRequest(
                    "page_id must be a positive integer".to_string(),
                ));
            }
            let url = service.activate(page_id).await?.ok_or_else(|| {
                ServiceError::InvalidRequest(format!("page {page_id} cannot be activated"))
            })?;
            return Ok(HostResponse::Activated { url });
        }
        HostRequest::ActivateSuggestion => service.activate_suggestion()?,
        HostRequest::SearchText { text, language } => {
            if text.trim().is_empty() {
                return Err(ServiceError::InvalidRequest("text must not be empty".to_string()));
            }
            service.search_text(text, language)?
        }
        HostRequest::Clear => service.clear()?,
        HostRequest::Disable => service.disable()?,
        HostRequest::UpdateSettings(update) => {
            let settings = update.into_settings().map_err(ServiceError::InvalidRequest)?;
            service.update_settings(settings)?
        }
    }
    Ok(HostResponse::Accepted)
}

fn map_service_error(error: ServiceError) -> ErrorResponse {
    match error {
        ServiceError::InvalidRequest(message) => ErrorResponse {
            code: ErrorCode::InvalidRequest,
            message,
        },
        ServiceError::Stopped => ErrorResponse {
            code: ErrorCode::ServiceUnavailable,
            message: error.to_string(),
        },
    }
}
