//! Classification API client.

mod client;
mod response;

pub use client::ApiClient;
