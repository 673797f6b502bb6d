#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod cli;
pub mod config;
pub mod content;
pub mod data;
pub mod format;
pub mod logging;
pub mod model;
pub mod reddit;
pub mod runtime;
pub mod share;
pub mod state;
pub mod storage;
pub mod ui;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
