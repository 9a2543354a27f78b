//! Markdown pages: front matter, generated navigation, slides and links,
//! rendered into a styled standalone HTML page.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::archive::{ArchiveError, create_data_zip};
use super::assets::{AssetError, AssetSyntax, copy_referenced_files};
use super::context::PublishContext;
use super::document::{parse_front_matter, toc_markdown};
use super::format::{ContentProcessor, ProcessError};
use super::item::{ItemKind, PublishedItem};
use super::metadata::{ItemMetadata, apply_overrides};
use super::paths::{relative_path, to_link};
use super::render::{RenderError, Renderer};
use super::slides::{SlideEmbedder, SlideError};
use crate::config::{Link, Section};

#[derive(thiserror::Error, Debug)]
pub enum PageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Slide(#[from] SlideError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("failed to render {path}: {source}")]
    Render { path: PathBuf, source: RenderError },
}

/// Download box pointing at an archive next to the page.
pub fn download_box(zip_name: &str) -> String {
    format!(
        "<div class=\"download-box\">\n<strong>Download files:</strong> <a href=\"./{zip_name}\">📦 {zip_name}</a>\n</div>\n\n"
    )
}

/// The `## Useful Links` block.
pub fn useful_links(links: &[Link]) -> String {
    let mut out = String::from("## Useful Links\n\n");
    for link in links {
        if link.description.is_empty() {
            out.push_str(&format!("- [{}]({})\n", link.name, link.url));
        } else {
            out.push_str(&format!(
                "- [{}]({}) - {}\n",
                link.name, link.url, link.description
            ));
        }
    }
    out.push('\n');
    out
}

/// Publishes `.md` files as HTML pages.
pub struct MarkdownProcessor {
    renderer: Rc<Renderer>,
    slides: SlideEmbedder,
}

impl MarkdownProcessor {
    pub fn new(renderer: Rc<Renderer>) -> Self {
        Self::with_embedder(renderer, SlideEmbedder::default())
    }

    pub fn with_embedder(renderer: Rc<Renderer>, slides: SlideEmbedder) -> Self {
        Self { renderer, slides }
    }

    fn publish(
        &self,
        path: &Path,
        section: &Section,
        ctx: &PublishContext,
    ) -> Result<Option<PublishedItem>, PageError> {
        let content = std::fs::read_to_string(path).map_err(|source| PageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = parse_front_matter(&content);
        let relative = ctx.relative_to_root(path);

        let merged = apply_overrides(&relative, &parsed.front_matter, &ctx.config.overrides);
        let meta = match ItemMetadata::from_map(&merged, path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("skipping {}: {}", relative, e);
                return Ok(None);
            }
        };

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = meta.title.clone().unwrap_or_else(|| stem.clone());
        let page_dir = path.parent().unwrap_or(&ctx.root);
        let folder = section.folder_name();

        let out_dir = ctx.output_dir.join(&folder);
        std::fs::create_dir_all(&out_dir).map_err(|source| PageError::Write {
            path: out_dir.clone(),
            source,
        })?;

        copy_referenced_files(&parsed.content, AssetSyntax::Markdown, page_dir, &out_dir)?;

        let zip_name = meta.has_data_files().then(|| format!("{stem}-data.zip"));
        if let Some(zip) = &zip_name {
            create_data_zip(&meta.data_files, &out_dir.join(zip), page_dir)?;
        }

        let index_rel = to_link(&relative_path(&ctx.output_dir.join("index.html"), &out_dir));

        let mut full = format!("[← Back to main page]({index_rel})\n\n# {title}\n\n");

        let toc = toc_markdown(&parsed.content, !meta.links.is_empty());
        if !toc.is_empty() {
            full.push_str(&toc);
            full.push('\n');
        }

        if let Some(zip) = &zip_name {
            full.push_str(&download_box(zip));
        }

        if let Some(slide) = &meta.slides {
            let html = self.slides.embed(slide, page_dir, &ctx.root, &out_dir, "")?;
            full.push_str(&html);
            full.push_str("\n\n");
        }

        if !meta.links.is_empty() {
            full.push_str(&useful_links(&meta.links));
        }

        full.push_str(&parsed.content);

        let html_path = out_dir.join(format!("{stem}.html"));
        let html = self
            .renderer
            .render_page(&title, &full)
            .map_err(|source| PageError::Render {
                path: path.to_path_buf(),
                source,
            })?;
        std::fs::write(&html_path, html).map_err(|source| PageError::Write {
            path: html_path.clone(),
            source,
        })?;

        let html_file = format!("{folder}/{stem}.html");
        tracing::info!("created {}", html_file);

        Ok(Some(PublishedItem {
            name: stem,
            title,
            description: meta.description.unwrap_or_default(),
            section: section.title.clone(),
            section_folder: folder.clone(),
            section_slides: section.slides.clone(),
            kind: ItemKind::Markdown { html_file },
            data_file: zip_name.map(|zip| format!("{folder}/{zip}")),
            order: meta.order,
            links: meta.links,
            slides: meta.slides,
        }))
    }
}

impl ContentProcessor for MarkdownProcessor {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn extensions(&self) -> &[&'static str] {
        &["md"]
    }

    fn process(
        &self,
        path: &Path,
        section: &Section,
        ctx: &PublishContext,
    ) -> Result<Option<PublishedItem>, ProcessError> {
        Ok(self.publish(path, section, ctx)?)
    }
}
