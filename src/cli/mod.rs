// ABOUTME: CLI module for the waypoint workflow engine
// ABOUTME: Exports argument parsing, application setup, and command implementations

pub mod app;
pub mod args;
pub mod commands;

pub use app::App;
pub use args::{Args, Commands};
