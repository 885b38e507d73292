//! View rendering.

pub mod generator;

pub use generator::{generate_json, generate_markdown, View};
