pub mod api_client;
pub mod config;
pub mod contract;
pub mod core_service;
pub mod logging;
pub mod model;
pub mod query_dsl;
pub mod runtime;
pub mod search;
pub mod session_state;
pub mod settings;
pub mod transport;
