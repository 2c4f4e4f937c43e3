//! kinchat library
//!
//! Server and client components for the kinchat family chat service: upstream
//! model clients, the stream relay, the HTTP API, the client-side conversation
//! store and the chat session used by the terminal client.

pub mod api;
pub mod client;
pub mod config;
pub mod models;
pub mod providers;
pub mod relay;
pub mod store;

pub use kinchat_files as files;
