pub mod api_types;
pub mod client;
pub mod present;
pub mod types;
