mod archive;
mod assets;
mod builder;
mod context;
mod document;
mod format;
mod highlight;
mod index;
mod item;
mod markdown;
mod metadata;
mod notebook;
mod page;
mod paths;
mod render;
mod slides;

pub use builder::Builder;
pub use context::PublishContext;
pub use paths::base_path_from_config;
