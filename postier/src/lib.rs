//! Queue-backed email delivery with optional generative HTML enhancement.
//!
//! An HTTP intake ([`api`]) validates send requests and queues them
//! ([`queue`]); workers run the send task ([`pipeline`]), which may rewrite
//! the body through a generative-text service ([`enhance`]) before handing
//! it to SMTP ([`mail`]).

pub mod api;
pub mod config;
pub mod enhance;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod queue;
pub mod serve;

pub use config::EnvConfig;
pub use serve::serve;
