use std::path::{Path, PathBuf};
use std::rc::Rc;

use walkdir::WalkDir;

use crate::config::{Section, WorkshopConfig};

use super::archive::ArchiveError;
use super::context::PublishContext;
use super::format::{ContentProcessor, ProcessError, ProcessorRegistry};
use super::index::{IndexBuilder, IndexError, create_section_zip};
use super::item::{ItemKind, PublishedItem};
use super::render::{RenderError, Renderer};
use super::slides::SlideEmbedder;

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to publish {path}: {source}")]
    Process { path: PathBuf, source: ProcessError },

    #[error("section {section}: {source}")]
    SectionArchive {
        section: String,
        source: ArchiveError,
    },

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

pub struct BuildResult {
    pub output_dir: PathBuf,
    /// Published records, drafts included
    pub items: Vec<PublishedItem>,
    /// Path of the written landing page, if one was written
    pub index: Option<PathBuf>,
}

impl BuildResult {
    pub fn notebooks(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.kind, ItemKind::Notebook { .. }))
            .count()
    }

    pub fn pages(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.kind, ItemKind::Markdown { .. }))
            .count()
    }
}

/// Builds the static site for one workshop.
pub struct Builder {
    ctx: PublishContext,
}

impl Builder {
    pub fn new(config: WorkshopConfig, base_path: PathBuf) -> Self {
        Self {
            ctx: PublishContext::new(config, base_path),
        }
    }

    pub fn context(&self) -> &PublishContext {
        &self.ctx
    }

    pub fn build(&self) -> Result<BuildResult, BuildError> {
        // Build pipeline:
        // 1. Reset the output directory
        // 2. Publish every section (draft placeholder, or archive + processors)
        // 3. Write the landing page

        let output_dir = self.ctx.output_dir.clone();
        self.reset_output_dir()?;

        let config = &self.ctx.config;
        if config.sections.is_empty() && !config.has_root_content() {
            tracing::warn!("no sections or root-level content configured, nothing to publish");
            return Ok(BuildResult {
                output_dir,
                items: Vec::new(),
                index: None,
            });
        }

        let renderer = Rc::new(Renderer::new()?);
        let registry = ProcessorRegistry::with_defaults(Rc::clone(&renderer));

        let mut items = Vec::new();
        for section in &config.sections {
            items.extend(self.publish_section(section, &registry)?);
        }

        let index = if !items.is_empty() || config.has_root_content() {
            let slides = SlideEmbedder::default();
            Some(IndexBuilder::new(&self.ctx, &renderer, &slides).write(&items)?)
        } else {
            tracing::warn!("nothing was published, skipping index");
            None
        };

        Ok(BuildResult {
            output_dir,
            items,
            index,
        })
    }

    fn reset_output_dir(&self) -> Result<(), BuildError> {
        let output_dir = &self.ctx.output_dir;
        let io_err = |source| BuildError::Io {
            path: output_dir.clone(),
            source,
        };
        if output_dir.exists() {
            tracing::info!("cleaning {}", output_dir.display());
            std::fs::remove_dir_all(output_dir).map_err(io_err)?;
        }
        std::fs::create_dir_all(output_dir).map_err(io_err)
    }

    fn publish_section(
        &self,
        section: &Section,
        registry: &ProcessorRegistry,
    ) -> Result<Vec<PublishedItem>, BuildError> {
        if section.draft {
            tracing::info!("section '{}' is a draft, adding placeholder", section.title);
            return Ok(vec![PublishedItem::draft(section)]);
        }

        let folder = self.ctx.resolve(&section.folder);
        if !folder.is_dir() {
            tracing::warn!("section folder {} not found, skipping", section.folder);
            return Ok(Vec::new());
        }
        tracing::info!("processing section '{}'", section.title);

        if !section.data_files.is_empty() {
            create_section_zip(section, &self.ctx).map_err(|source| {
                BuildError::SectionArchive {
                    section: section.title.clone(),
                    source,
                }
            })?;
        }

        let mut items = Vec::new();
        for processor in registry.iter() {
            for path in section_files(&folder, processor) {
                let published = processor
                    .process(&path, section, &self.ctx)
                    .map_err(|source| BuildError::Process {
                        path: path.clone(),
                        source,
                    })?;
                if let Some(item) = published {
                    items.push(item.in_section(section));
                }
            }
        }
        Ok(items)
    }
}

/// Files directly inside `folder` handled by `processor`, sorted by name.
fn section_files(folder: &Path, processor: &dyn ContentProcessor) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| !p.to_string_lossy().contains(".ipynb_checkpoints"))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| {
                    processor
                        .extensions()
                        .iter()
                        .any(|x| x.eq_ignore_ascii_case(e))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NOTEBOOK: &str = r#"{
 "cells": [{"cell_type": "code", "metadata": {"tags": ["solution"]}, "source": ["x = 1"], "execution_count": 1, "outputs": []}],
 "metadata": {"workshop": {"title": "Intro"}},
 "nbformat": 4,
 "nbformat_minor": 5
}"#;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn builder(root: &TempDir, yaml: &str) -> Builder {
        let config = WorkshopConfig::from_yaml(yaml).unwrap();
        Builder::new(config, root.path().to_path_buf())
    }

    #[test]
    fn test_full_build() {
        let root = TempDir::new().unwrap();
        write(root.path(), "s1/intro.ipynb", NOTEBOOK);
        write(root.path(), "s1/notes.md", "---\ntitle: Notes\n---\nText\n");
        write(root.path(), "s1/plain.ipynb", r#"{"cells": [], "metadata": {}}"#);
        write(root.path(), "s1/data/a.csv", "a");

        let result = builder(
            &root,
            "sections:\n  - folder: s1\n    title: Basics\n    data_files: s1/data/*.csv\n  - folder: s2\n    title: Soon\n    draft: true",
        )
        .build()
        .unwrap();

        assert_eq!(result.notebooks(), 1);
        assert_eq!(result.pages(), 1);
        assert_eq!(result.items.len(), 3);
        assert!(result.items.iter().any(|i| i.kind == ItemKind::Draft));
        assert!(result.items.iter().all(|i| i.is_draft() || i.section == "Basics"));

        let out = &result.output_dir;
        assert!(out.join("s1/intro.ipynb").exists());
        assert!(out.join("s1/intro-ANSWERS.ipynb").exists());
        assert!(!out.join("s1/plain.ipynb").exists());
        assert!(out.join("s1/notes.html").exists());
        assert!(out.join("s1/s1-data.zip").exists());

        let index = std::fs::read_to_string(result.index.unwrap()).unwrap();
        assert!(index.contains("Content will be uploaded later."));
        assert!(index.contains("<h2 id=\"basics\">Basics</h2>"));
    }

    #[test]
    fn test_output_dir_is_cleaned() {
        let root = TempDir::new().unwrap();
        write(root.path(), "docs/stale.html", "old");
        write(root.path(), "s1/notes.md", "Text\n");

        let result = builder(&root, "sections: [s1]").build().unwrap();
        assert!(!result.output_dir.join("stale.html").exists());
        assert!(result.output_dir.join("s1/notes.html").exists());
    }

    #[test]
    fn test_nothing_configured() {
        let root = TempDir::new().unwrap();
        let result = builder(&root, "title: Empty").build().unwrap();
        assert!(result.items.is_empty());
        assert!(result.index.is_none());
        assert!(!result.output_dir.join("index.html").exists());
    }

    #[test]
    fn test_missing_section_folder_is_skipped() {
        let root = TempDir::new().unwrap();
        write(root.path(), "s1/notes.md", "Text\n");

        let result = builder(&root, "sections: [s1, nowhere]").build().unwrap();
        assert_eq!(result.items.len(), 1);
        assert!(result.index.is_some());
    }

    #[test]
    fn test_missing_slide_aborts_before_index() {
        let root = TempDir::new().unwrap();
        write(root.path(), "s1/notes.md", "---\nslides: missing.pdf\n---\nText\n");

        let result = builder(&root, "sections: [s1]").build();
        assert!(matches!(
            result,
            Err(BuildError::Process {
                source: ProcessError::Page(_),
                ..
            })
        ));
        assert!(!root.path().join("docs/index.html").exists());
    }

    #[test]
    fn test_section_files_sorted_and_filtered() {
        let root = TempDir::new().unwrap();
        write(root.path(), "b.md", "");
        write(root.path(), "a.md", "");
        write(root.path(), "c.ipynb", "");
        write(root.path(), "nested/d.md", "");

        let renderer = Rc::new(Renderer::new().unwrap());
        let registry = ProcessorRegistry::with_defaults(renderer);
        let markdown = registry.for_path(Path::new("x.md")).unwrap();
        let files = section_files(root.path(), markdown);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }
}
