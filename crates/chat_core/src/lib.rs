//! Core types shared across the chat backend.
//!
//! This crate holds the message/content model, the model catalog with
//! per-provider capability flags, the authenticated principal, and the
//! environment-driven application configuration. It deliberately contains
//! no I/O.

pub mod config;
pub mod message;
pub mod model;
pub mod principal;

pub use config::{AgentFallbackPolicy, AppConfig};
pub use message::{ContentPart, Message, MessageContent, Role};
pub use model::{ModelCatalog, ModelDescriptor, ProviderSdk};
pub use principal::Principal;
