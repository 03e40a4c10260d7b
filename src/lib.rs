//! A calendar of daily savings, kept in local storage and mirrored to a spreadsheet endpoint.

pub mod api;
pub mod args;
pub mod calendar;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod render;
pub mod storage;
pub mod store;
mod utils;


pub use api::Mode;
pub use config::Config;
pub use error::Error;
pub use error::Result;
