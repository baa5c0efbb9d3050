//! Outbound HTTP with retry, timeouts and browser-like default headers.
//!
//! # Example
//!
//! ```no_run
//! use songbridge_core::http::{HttpClient, HttpRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let response = client
//!     .send(&HttpRequest::get("https://api.deezer.com/search/track?q=song"))
//!     .await?;
//! println!("HTTP {}", response.status);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod retry;

pub use client::{
    CONNECT_TIMEOUT_SECS, HttpClient, HttpRequest, HttpResponse, HttpSettings,
    REQUEST_TIMEOUT_SECS,
};
pub use error::HttpError;
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};
