pub mod api;
pub mod app_config;
pub mod builder;
pub mod clean;
pub mod config;
pub mod datasync;
pub mod errors;
pub mod fetch;
pub mod hooks;
pub mod layout;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod process;
pub mod scm;
pub mod search;
pub mod settings_file;
pub mod symlinks;
pub mod ui;
pub mod updater;
