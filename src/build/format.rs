//! Pluggable content processors.
//!
//! Each source kind (notebooks, markdown pages) has a processor that turns
//! one file into its published outputs and returns the record listed on the
//! index. The registry picks the processor by file extension.
//!
//! # Adding a New Processor
//!
//! ```ignore
//! struct ScriptProcessor;
//!
//! impl ContentProcessor for ScriptProcessor {
//!     fn name(&self) -> &'static str { "script" }
//!     fn extensions(&self) -> &[&'static str] { &["py"] }
//!     fn process(&self, path: &Path, section: &Section, ctx: &PublishContext)
//!         -> Result<Option<PublishedItem>, ProcessError> {
//!         // Write outputs under ctx.output_dir...
//!     }
//! }
//!
//! registry.register(ScriptProcessor);
//! ```

use std::path::Path;
use std::rc::Rc;

use super::context::PublishContext;
use super::item::PublishedItem;
use super::notebook::{NotebookError, NotebookProcessor};
use super::page::{MarkdownProcessor, PageError};
use super::render::Renderer;
use crate::config::Section;

#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Notebook(#[from] NotebookError),

    #[error(transparent)]
    Page(#[from] PageError),
}

/// Turns one source file into published outputs.
pub trait ContentProcessor {
    /// The name of this processor (e.g., "notebook", "markdown").
    fn name(&self) -> &'static str;

    /// File extensions this processor handles (lowercase, without dot).
    fn extensions(&self) -> &[&'static str];

    /// Publish `path`, which lives in `section`.
    ///
    /// Returns `None` when the file is deliberately skipped.
    fn process(
        &self,
        path: &Path,
        section: &Section,
        ctx: &PublishContext,
    ) -> Result<Option<PublishedItem>, ProcessError>;
}

/// Registry of content processors, in scan order.
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn ContentProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Notebooks first, then markdown pages.
    pub fn with_defaults(renderer: Rc<Renderer>) -> Self {
        let mut registry = Self::new();
        registry.register(NotebookProcessor);
        registry.register(MarkdownProcessor::new(renderer));
        registry
    }

    pub fn register<P: ContentProcessor + 'static>(&mut self, processor: P) {
        self.processors.push(Box::new(processor));
    }

    /// Find the processor for a file path based on its extension.
    pub fn for_path(&self, path: &Path) -> Option<&dyn ContentProcessor> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.processors
            .iter()
            .find(|p| p.extensions().iter().any(|e| *e == ext))
            .map(|p| p.as_ref())
    }

    /// Registered processors, in scan order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ContentProcessor> {
        self.processors.iter().map(|p| p.as_ref())
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
