#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod detect;
pub mod dom;
pub mod dominant;
pub mod formats;
pub mod layout;
pub mod logging;
pub mod metadata;
pub mod normalize;
pub mod reidentify;
pub mod session;
pub mod sync;
pub mod visibility;
