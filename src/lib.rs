//! # Wayfarer - minimal Wayland compositor core
//!
//! The coordination core of a minimal Wayland compositor: long-lived
//! process state for displays, input devices and client windows, plus the
//! single-threaded event glue keeping them consistent while hardware and
//! clients come and go.
//!
//! ## Architecture
//!
//! - `subscription`: event subscriptions with guaranteed one-shot
//!   deregistration
//! - `output`: per-display tracking and the render/commit cycle
//! - `view`: client toplevels and their scene nodes
//! - `input`: pointer devices, cursor modes, focus-gated cursor requests
//! - `server`: the single owning context and event dispatcher
//! - `compositor`: calloop event-loop wiring
//! - `backend`: the narrow contracts collaborators are consumed through,
//!   including the headless reference implementation
//! - `config`: TOML configuration parsing

pub mod backend;
pub mod compositor;
pub mod config;
pub mod input;
pub mod output;
pub mod server;
pub mod subscription;
pub mod view;

// Re-export main types for easy access
pub use backend::{Collaborators, Event};
pub use compositor::Compositor;
pub use config::Config;
pub use input::CursorCoordinator;
pub use output::OutputManager;
pub use server::Server;
pub use subscription::Registry;
pub use view::ViewManager;

// Re-export common error types
pub use anyhow::{Context, Error, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
