pub mod app;
pub mod auth;
pub mod backend;
pub mod browser;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod github;
pub mod join;
pub mod output;
pub mod session;
pub mod tui;
pub mod view;
pub mod workflow;
