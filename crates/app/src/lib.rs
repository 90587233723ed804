#![deny(unsafe_code)]

//! Quill: a desktop chat client over a pluggable agent host.

/// Window root, routing between pages and global actions.
pub mod app;
/// Session lifecycle, transcript state and the chat UI.
pub mod chat;
pub mod markdown;
pub mod router;
/// Startup configuration and the settings page.
pub mod settings;
/// Theme preference, persistence and toolkit mode switching.
pub mod theme;
pub mod title_bar;
