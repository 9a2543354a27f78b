//! The landing page: root-level resources, then every section with its
//! items in index order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::archive::{ArchiveError, create_data_zip};
use super::context::PublishContext;
use super::item::{ItemKind, PublishedItem, sort_for_index};
use super::page::{download_box, useful_links};
use super::paths::{file_name_of, hosted_url};
use super::render::{IndexContext, RenderError, Renderer};
use super::slides::{SlideEmbedder, SlideError};
use crate::config::{Link, Section};

/// Archive built from the root-level data patterns.
pub const WORKSHOP_ZIP: &str = "workshop-data.zip";

const COLAB_BASE: &str = "https://colab.research.google.com/github";

#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Slide(#[from] SlideError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("failed to render index: {0}")]
    Render(#[from] RenderError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Assembles and writes `index.html`.
pub struct IndexBuilder<'a> {
    ctx: &'a PublishContext,
    renderer: &'a Renderer,
    slides: &'a SlideEmbedder,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(ctx: &'a PublishContext, renderer: &'a Renderer, slides: &'a SlideEmbedder) -> Self {
        Self {
            ctx,
            renderer,
            slides,
        }
    }

    /// Write `index.html` for `items` and return its path.
    pub fn write(&self, items: &[PublishedItem]) -> Result<PathBuf, IndexError> {
        let config = &self.ctx.config;

        let codespaces_button = if config.offers_codespaces() {
            self.renderer
                .codespaces_button(&config.github_repo, &config.notebooks_branch)?
        } else {
            String::new()
        };

        let vars = IndexContext {
            title: config.title.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            organization: config.organization.clone(),
            newsletter: config.newsletter_signup.clone(),
            codespaces_button,
            notebooks: self.listing(items)?,
        };

        let markdown = self
            .renderer
            .render_index(config.index_template.as_deref(), &vars)?;
        let html = self.renderer.render_page(&config.title, &markdown)?;

        let path = self.ctx.output_dir.join("index.html");
        std::fs::write(&path, html).map_err(|source| IndexError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!("created {}", path.display());
        Ok(path)
    }

    /// The section listing substituted for `{{ notebooks }}`.
    pub fn listing(&self, items: &[PublishedItem]) -> Result<String, IndexError> {
        let mut fragments = self.root_content()?;

        let groups = group_by_section(items);
        for title in self.section_order(&groups) {
            let Some(group) = groups.get(title) else {
                continue;
            };
            fragments.push(format!("\n## {title}\n"));

            if let [only] = group.as_slice()
                && only.is_draft()
            {
                if !only.description.is_empty() {
                    fragments.push(format!("\n{}\n\n", only.description));
                }
                fragments.push("*Content will be uploaded later.*\n".to_string());
                continue;
            }

            let section = self.ctx.config.section_by_title(title);
            if let Some(section) = section {
                fragments.extend(self.section_header(section)?);
            }

            let icon_prefix = section
                .and_then(|s| s.icon.as_deref())
                .map(|icon| format!("{icon} "))
                .unwrap_or_default();

            let mut sorted: Vec<PublishedItem> = group.iter().map(|i| (*i).clone()).collect();
            sort_for_index(&mut sorted);
            for item in &sorted {
                fragments.extend(self.item_fragments(item, &icon_prefix));
            }
        }

        Ok(fragments.join("\n"))
    }

    fn root_content(&self) -> Result<Vec<String>, IndexError> {
        let config = &self.ctx.config;
        let mut fragments = Vec::new();

        if let Some(slide) = &config.slides {
            let html = self.slides.embed(
                slide,
                &self.ctx.root,
                &self.ctx.root,
                &self.ctx.output_dir,
                "",
            )?;
            fragments.push(html + "\n");
        }

        if !config.data_files.is_empty() {
            create_data_zip(
                &config.data_files,
                &self.ctx.output_dir.join(WORKSHOP_ZIP),
                &self.ctx.root,
            )?;
            fragments.push(download_box(WORKSHOP_ZIP));
        }

        if !config.links.is_empty() {
            fragments.push(useful_links(&config.links));
        }

        Ok(fragments)
    }

    /// Sections in config order, then unknown section titles alphabetically.
    fn section_order<'g>(&self, groups: &'g BTreeMap<&'g str, Vec<&'g PublishedItem>>) -> Vec<&'g str> {
        let mut order: Vec<&str> = Vec::new();
        for section in &self.ctx.config.sections {
            if let Some((&title, _)) = groups.get_key_value(section.title.as_str())
                && !order.contains(&title)
            {
                order.push(title);
            }
        }
        for &title in groups.keys() {
            if !order.contains(&title) {
                order.push(title);
            }
        }
        order
    }

    fn section_header(&self, section: &Section) -> Result<Vec<String>, IndexError> {
        let mut fragments = Vec::new();
        let folder = section.folder_name();

        if let Some(slide) = &section.slides {
            let section_dir = self.ctx.resolve(&section.folder);
            let base = section_dir.parent().unwrap_or(&self.ctx.root);
            let dest = self.ctx.output_dir.join(&folder);
            let html = self
                .slides
                .embed(slide, base, &self.ctx.root, &dest, &format!("{folder}/"))?;
            fragments.push(format!("\n{html}\n"));
        }

        if !section.data_files.is_empty() {
            let zip = section_zip_name(section);
            fragments.push(format!(
                "\n<div class=\"download-box\">\n<strong>Section files:</strong> <a href=\"./{folder}/{zip}\">📦 {zip}</a>\n</div>\n\n"
            ));
        }

        Ok(fragments)
    }

    fn colab_url(&self, file: &str) -> String {
        let config = &self.ctx.config;
        hosted_url(
            COLAB_BASE,
            &[
                &config.github_repo,
                "blob",
                &config.github_branch,
                &self.ctx.output_dir_name(),
                file,
            ],
        )
    }

    fn item_fragments(&self, item: &PublishedItem, icon_prefix: &str) -> Vec<String> {
        let mut fragments = Vec::new();

        match &item.kind {
            ItemKind::Markdown { html_file } => {
                fragments.push(format!(
                    "### {icon_prefix}[{} →](./{html_file})\n",
                    item.title
                ));
                if !item.description.is_empty() {
                    fragments.push(format!("{}\n", item.description));
                }
                fragments.push("<div>\n".to_string());
                if let Some(data) = &item.data_file {
                    fragments.push(format!("📦 Data: <a href=\"./{data}\">{data}</a><br>\n"));
                }
                fragments.push("</div>\n".to_string());
            }
            ItemKind::Notebook {
                exercise_file,
                answers_file,
            } => {
                let colab = self.colab_url(exercise_file);
                let answers_colab = self.colab_url(answers_file);
                fragments.push(format!("### {icon_prefix}[{} →]({colab})\n", item.title));
                if !item.description.is_empty() {
                    fragments.push(format!("{}\n", item.description));
                }
                fragments.push("<div class=\"resource-buttons\">\n".to_string());
                fragments.push(format!(
                    "<a href=\"{colab}\" class=\"resource-button primary\">🚀 Open in Colab</a>\n"
                ));
                fragments.push(format!(
                    "<a href=\"{answers_colab}\" class=\"resource-button completed\">✓ Completed (Colab)</a>\n"
                ));
                fragments.push("</div>\n".to_string());

                fragments.push("<div class=\"download-links\">\n".to_string());
                fragments.push(format!(
                    "📓 Download: <a href=\"./{exercise_file}\">worksheet</a> | "
                ));
                fragments.push(format!("<a href=\"./{answers_file}\">completed</a><br>\n"));
                if let Some(data) = &item.data_file {
                    fragments.push(format!("📦 Data: <a href=\"./{data}\">{data}</a>\n"));
                }
                fragments.push("</div>\n".to_string());
            }
            ItemKind::Draft => {}
        }

        if item.has_distinct_slides()
            && let Some(slides) = &item.slides
        {
            let file = file_name_of(slides);
            fragments.push(format!(
                "<div style=\"margin: 0.5em 0; color: #666;\">📑 Slides: <a href=\"./{}/{file}\">{file}</a></div>\n",
                item.section_folder
            ));
        }

        if !item.links.is_empty() {
            fragments.push("\n**Links:**\n\n".to_string());
            fragments.push(format!("<ul>{}</ul>", link_items(&item.links)));
        }
        fragments.push("\n\n".to_string());
        fragments.push(String::new());

        fragments
    }
}

fn link_items(links: &[Link]) -> String {
    links
        .iter()
        .map(|link| {
            if link.description.is_empty() {
                format!("<li><a href=\"{}\">{}</a></li>\n", link.url, link.name)
            } else {
                format!(
                    "<li><a href=\"{}\">{}</a> {}</li>\n",
                    link.url, link.name, link.description
                )
            }
        })
        .collect()
}

fn group_by_section(items: &[PublishedItem]) -> BTreeMap<&str, Vec<&PublishedItem>> {
    let mut groups: BTreeMap<&str, Vec<&PublishedItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.section.as_str()).or_default().push(item);
    }
    groups
}

/// Name of a section's archive: `<folder-name>-data.zip`.
pub fn section_zip_name(section: &Section) -> String {
    format!("{}-data.zip", section.folder_name())
}

/// Section data patterns relative to the section folder: a leading
/// `<folder-name>/` is dropped.
pub fn section_patterns(section: &Section) -> Vec<String> {
    let prefix = format!("{}/", section.folder_name());
    section
        .data_files
        .iter()
        .map(|p| p.strip_prefix(&prefix).unwrap_or(p).to_string())
        .collect()
}

/// Build a section's archive in its output directory.
pub fn create_section_zip(section: &Section, ctx: &PublishContext) -> Result<(), ArchiveError> {
    let folder = section.folder_name();
    let zip_path = ctx.output_dir.join(&folder).join(section_zip_name(section));
    create_data_zip(
        &section_patterns(section),
        &zip_path,
        &ctx.resolve(Path::new(&section.folder)),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkshopConfig;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        ctx: PublishContext,
        renderer: Renderer,
        slides: SlideEmbedder,
    }

    fn fixture(yaml: &str) -> Fixture {
        let root = TempDir::new().unwrap();
        let config = WorkshopConfig::from_yaml(yaml).unwrap();
        let ctx = PublishContext::new(config, root.path().to_path_buf());
        std::fs::create_dir_all(&ctx.output_dir).unwrap();
        Fixture {
            _root: root,
            ctx,
            renderer: Renderer::new().unwrap(),
            slides: SlideEmbedder::new(Vec::new(), Vec::new()),
        }
    }

    impl Fixture {
        fn builder(&self) -> IndexBuilder<'_> {
            IndexBuilder::new(&self.ctx, &self.renderer, &self.slides)
        }
    }

    fn notebook(name: &str, section: &str, order: Option<f64>) -> PublishedItem {
        PublishedItem {
            name: name.to_string(),
            title: format!("Title {name}"),
            description: String::new(),
            section: section.to_string(),
            section_folder: "s1".to_string(),
            section_slides: None,
            kind: ItemKind::Notebook {
                exercise_file: format!("s1/{name}.ipynb"),
                answers_file: format!("s1/{name}-ANSWERS.ipynb"),
            },
            data_file: None,
            order,
            links: Vec::new(),
            slides: None,
        }
    }

    #[test]
    fn test_draft_section_placeholder() {
        let f = fixture(
            "sections:\n  - folder: s2\n    title: Later\n    draft: true\n    description: Coming soon",
        );
        let section = f.ctx.config.sections[0].clone();
        let listing = f.builder().listing(&[PublishedItem::draft(&section)]).unwrap();
        assert_eq!(
            listing,
            "\n## Later\n\n\nComing soon\n\n\n*Content will be uploaded later.*\n"
        );
    }

    #[test]
    fn test_items_in_index_order() {
        let f = fixture("sections:\n  - folder: s1\n    title: One");
        let items = vec![
            notebook("x", "One", None),
            notebook("b", "One", Some(2.0)),
            notebook("z", "One", None),
            notebook("a", "One", Some(1.0)),
        ];
        let listing = f.builder().listing(&items).unwrap();
        let pos = |name: &str| listing.find(&format!("[Title {name} →]")).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("z"));
        assert!(pos("z") < pos("x"));
    }

    #[test]
    fn test_section_order_config_then_alphabetical() {
        let f = fixture("sections:\n  - folder: s1\n    title: Zeta\n  - folder: s9\n    title: Empty");
        let items = vec![
            notebook("a", "Beta", None),
            notebook("b", "Zeta", None),
            notebook("c", "Alpha", None),
        ];
        let listing = f.builder().listing(&items).unwrap();
        let zeta = listing.find("## Zeta").unwrap();
        let alpha = listing.find("## Alpha").unwrap();
        let beta = listing.find("## Beta").unwrap();
        assert!(zeta < alpha && alpha < beta);
        assert!(!listing.contains("## Empty"));
    }

    #[test]
    fn test_notebook_item_links() {
        let f = fixture("github_repo: me/workshop\nsections:\n  - folder: s1\n    title: One\n    icon: 📘");
        let mut item = notebook("intro", "One", None);
        item.description = "Start here".to_string();
        item.data_file = Some("s1/intro-data.zip".to_string());
        let listing = f.builder().listing(&[item]).unwrap();

        let colab = "https://colab.research.google.com/github/me/workshop/blob/main/docs/s1/intro.ipynb";
        assert!(listing.contains(&format!("### 📘 [Title intro →]({colab})\n")));
        assert!(listing.contains("Start here\n"));
        assert!(listing.contains(&format!(
            "<a href=\"{colab}\" class=\"resource-button primary\">🚀 Open in Colab</a>"
        )));
        assert!(listing.contains("intro-ANSWERS.ipynb\" class=\"resource-button completed\">"));
        assert!(listing.contains("📓 Download: <a href=\"./s1/intro.ipynb\">worksheet</a> | "));
        assert!(listing.contains("📦 Data: <a href=\"./s1/intro-data.zip\">s1/intro-data.zip</a>\n"));
        assert!(!listing.contains("<ul>"));
    }

    #[test]
    fn test_markdown_item_and_links() {
        let f = fixture("sections:\n  - folder: s1\n    title: One");
        let mut item = notebook("guide", "One", None);
        item.kind = ItemKind::Markdown {
            html_file: "s1/guide.html".to_string(),
        };
        item.links = vec![Link {
            name: "Docs".to_string(),
            url: "https://example.com".to_string(),
            description: "reference".to_string(),
        }];
        let listing = f.builder().listing(&[item]).unwrap();

        assert!(listing.contains("### [Title guide →](./s1/guide.html)\n"));
        assert!(listing.contains("<div>\n\n</div>\n"));
        assert!(listing.contains(
            "\n**Links:**\n\n\n<ul><li><a href=\"https://example.com\">Docs</a> reference</li>\n</ul>"
        ));
    }

    #[test]
    fn test_item_slides_shown_only_when_distinct() {
        let f = fixture("sections:\n  - folder: s1\n    title: One");
        let mut inherited = notebook("a", "One", None);
        inherited.slides = Some("deck.pdf".to_string());
        inherited.section_slides = Some("deck.pdf".to_string());
        let mut own = notebook("b", "One", None);
        own.slides = Some("slides/own deck.pdf".to_string());
        own.section_slides = Some("deck.pdf".to_string());

        let listing = f.builder().listing(&[inherited]).unwrap();
        assert!(!listing.contains("📑 Slides"));

        let listing = f.builder().listing(&[own]).unwrap();
        assert!(listing.contains(
            "📑 Slides: <a href=\"./s1/own deck.pdf\">own deck.pdf</a></div>\n"
        ));
    }

    #[test]
    fn test_section_data_box_and_root_content() {
        let f = fixture(
            "data_files: shared/*.txt\nlinks:\n  - name: Home\n    url: https://example.com\nsections:\n  - folder: s1\n    title: One\n    data_files: s1/data/*.csv",
        );
        std::fs::create_dir_all(f.ctx.root.join("shared")).unwrap();
        std::fs::write(f.ctx.root.join("shared/readme.txt"), "hi").unwrap();

        let listing = f.builder().listing(&[notebook("a", "One", None)]).unwrap();
        assert!(f.ctx.output_dir.join(WORKSHOP_ZIP).exists());
        assert!(listing.starts_with(&download_box(WORKSHOP_ZIP)));
        assert!(listing.contains("## Useful Links\n\n- [Home](https://example.com)\n"));
        assert!(listing.contains(
            "<strong>Section files:</strong> <a href=\"./s1/s1-data.zip\">📦 s1-data.zip</a>"
        ));
    }

    #[test]
    fn test_section_slides_copied_into_section_dir() {
        let f = fixture("sections:\n  - folder: s1\n    title: One\n    slides: s1/deck.pdf");
        std::fs::create_dir_all(f.ctx.root.join("s1")).unwrap();
        std::fs::write(f.ctx.root.join("s1/deck.pdf"), b"%PDF").unwrap();

        let listing = f.builder().listing(&[notebook("a", "One", None)]).unwrap();
        assert!(f.ctx.output_dir.join("s1/deck.pdf").exists());
        assert!(listing.contains("src=\"./s1/deck.pdf\""));
    }

    #[test]
    fn test_write_index_with_codespaces() {
        let f = fixture(
            "title: PDF Workshop\ngithub_repo: me/workshop\nplatforms: [codespaces]\nsections:\n  - folder: s1\n    title: One",
        );
        let path = f.builder().write(&[notebook("a", "One", None)]).unwrap();
        let html = std::fs::read_to_string(path).unwrap();
        assert!(html.contains("<title>PDF Workshop</title>"));
        assert!(html.contains("https://codespaces.new/me/workshop?ref=codespaces"));
        assert!(html.contains("<h2 id=\"one\">One</h2>"));
    }

    #[test]
    fn test_section_patterns_strip_folder_prefix() {
        let section: Section =
            serde_yaml::from_str("folder: part/s1\ndata_files: [s1/data/*.csv, extra.txt]").unwrap();
        assert_eq!(section_patterns(&section), vec!["data/*.csv", "extra.txt"]);
        assert_eq!(section_zip_name(&section), "s1-data.zip");
    }
}
