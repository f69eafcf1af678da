/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses decoded into domain records
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod public;

pub use client::BitfinexClient;
