//! Etymology Daily - daily etymology newsletter service.
//!
//! This library provides shared modules for the two binaries:
//! - `etymology-web`: HTTP server for subscriptions, feedback, unsubscribe,
//!   and the dispatch trigger
//! - `etymology-dispatch`: one-shot dispatch runner for cron
//!
//! ## Architecture
//!
//! ```text
//! subscribe -> confirm -> [daily dispatch: select content -> fan out] -> feedback / unsubscribe
//! ```
//!
//! Action links in outbound email carry stateless HMAC-signed tokens; no
//! issued token is ever stored. Persistence goes through the [`store::Store`]
//! port, content generation through [`content::ContentProvider`], and
//! delivery through [`mail::MailTransport`].

pub mod config;
pub mod content;
pub mod dispatch;
pub mod error;
pub mod feedback;
pub mod mail;
pub mod render;
pub mod store;
pub mod token;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use content::{ContentProvider, Etymology, GeminiProvider};
pub use dispatch::{run_dispatch, DispatchReport};
pub use error::ServiceError;
pub use mail::{MailTransport, ResendMailer};
pub use store::{MemStore, PgStore, Store};
pub use token::TokenCodec;
pub use web::AppState;
