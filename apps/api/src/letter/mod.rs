pub mod escape;
pub mod generator;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod prompts;
pub mod template;
