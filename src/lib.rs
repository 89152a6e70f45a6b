pub mod ai;
pub mod api;
pub mod attachment;
pub mod chat;
pub mod cli;
pub mod core;
pub mod export;
pub mod gemini;
pub mod markdown;
pub mod quiz;
pub mod speech;
pub mod stream;
