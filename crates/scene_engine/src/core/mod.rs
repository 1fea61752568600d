//! Core settings shared by every World of a Universe

pub mod config;

pub use config::SceneConfig;
