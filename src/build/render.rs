use serde::Serialize;
use tera::{Context, Tera};

use super::highlight::SyntaxHighlighter;
use super::markdown::render_markdown;

const PAGE_TEMPLATE: &str = include_str!("templates/page.html");
const INDEX_TEMPLATE: &str = include_str!("templates/index.md");
const CODESPACES_TEMPLATE: &str = include_str!("templates/codespaces.html");

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
}

/// The page renderer, wrapping Tera and the markdown pipeline.
pub struct Renderer {
    tera: Tera,
    highlighter: SyntaxHighlighter,
    highlight_css: Option<String>,
}

impl Renderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        // Generated fragments are trusted HTML
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(vec![
            ("page.html", PAGE_TEMPLATE),
            ("index.md", INDEX_TEMPLATE),
            ("codespaces.html", CODESPACES_TEMPLATE),
        ])?;

        let highlighter = SyntaxHighlighter::default();
        let highlight_css = highlighter.generate_css();
        Ok(Self {
            tera,
            highlighter,
            highlight_css,
        })
    }

    /// Render markdown into a complete, styled HTML page.
    pub fn render_page(&self, title: &str, markdown: &str) -> Result<String, RenderError> {
        let output = render_markdown(markdown, &self.highlighter);

        let mut context = Context::new();
        context.insert("title", title);
        context.insert("content", &output.html);
        context.insert("highlight_css", &self.highlight_css);
        Ok(self.tera.render("page.html", &context)?)
    }

    /// Fill the index template (a custom one when given) with `vars`.
    /// The result is markdown, ready for [`Renderer::render_page`].
    ///
    /// Custom templates only get their placeholders substituted; anything
    /// else in them, including template-like syntax, is kept verbatim.
    pub fn render_index(
        &self,
        custom_template: Option<&str>,
        vars: &IndexContext,
    ) -> Result<String, RenderError> {
        match custom_template {
            Some(template) => Ok(vars.substitute(template)),
            None => {
                let context = Context::from_serialize(vars)?;
                Ok(self.tera.render("index.md", &context)?)
            }
        }
    }

    /// The cloud workspace call-to-action block.
    pub fn codespaces_button(&self, repo: &str, branch: &str) -> Result<String, RenderError> {
        let mut context = Context::new();
        context.insert("new_url", &format!("https://codespaces.new/{repo}?ref={branch}"));
        context.insert(
            "resume_url",
            &format!(
                "https://github.com/codespaces?query=repo%3A{}",
                repo.replace('/', "%2F")
            ),
        );
        context.insert("branch", branch);
        Ok(self.tera.render("codespaces.html", &context)?)
    }
}

/// Variables available to index templates.
#[derive(Debug, Default, Serialize)]
pub struct IndexContext {
    pub title: String,
    pub description: String,
    pub author: String,
    pub organization: String,
    pub newsletter: String,
    /// Empty unless the cloud workspace is offered
    pub codespaces_button: String,
    /// The assembled section listing (markdown with embedded HTML)
    pub notebooks: String,
}

impl IndexContext {
    /// Replace each `{{ name }}` placeholder, in a fixed order.
    fn substitute(&self, template: &str) -> String {
        let placeholders = [
            ("title", &self.title),
            ("description", &self.description),
            ("codespaces_button", &self.codespaces_button),
            ("notebooks", &self.notebooks),
            ("author", &self.author),
            ("organization", &self.organization),
            ("newsletter", &self.newsletter),
        ];
        placeholders
            .into_iter()
            .fold(template.to_string(), |out, (name, value)| {
                out.replace(&format!("{{{{ {name} }}}}"), value)
            })
    }
}
