//! Botdesk Library
//!
//! Two independent services: a chat relay that keeps per-user memory in front
//! of a hosted completion API, and a browser robot that submits configured
//! posts while streaming its progress to viewers.

pub mod api;
pub mod browser;
pub mod chat;
pub mod config;
pub mod history;
pub mod robot;
pub mod upstream;
