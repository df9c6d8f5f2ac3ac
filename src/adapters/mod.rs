// Adapters layer: concrete implementations for external systems (model gateway, http server, endpoint client).

pub mod api_client;
pub mod http;
pub mod openai;
