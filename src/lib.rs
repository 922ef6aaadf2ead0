pub mod backends;
pub mod catalog;
pub mod config_loader;
pub mod controller;
pub mod ear;
pub mod engine;
pub mod error;
pub mod expression;
pub mod intent;
pub mod render;
pub mod runtime;
pub mod service;
pub mod stt;
pub mod utterance;
pub mod vad;
pub mod wake;
