pub mod base_image;
pub mod config;
pub mod emitter;
pub mod error;
pub mod injector;
pub mod manifest;
pub mod pipeline;
pub mod project;
pub mod resolver;
pub mod template;
pub mod templates;
