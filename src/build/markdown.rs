//! Markdown rendering with syntax highlighting and heading anchors.

use std::collections::HashSet;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

use super::document::slugify;
use super::highlight::SyntaxHighlighter;

/// Result of rendering markdown.
pub struct MarkdownOutput {
    pub html: String,
    /// Headings in document order, with the ids written into the HTML
    pub headings: Vec<HeadingEntry>,
}

/// A rendered heading.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingEntry {
    /// The heading text
    pub text: String,
    /// The heading id (for anchor links)
    pub id: String,
    /// The heading level (1-6)
    pub level: u8,
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_DEFINITION_LIST);
    options
}

struct OpenHeading {
    level: HeadingLevel,
    explicit_id: Option<String>,
    text: String,
    inner: Vec<Event<'static>>,
}

/// Render markdown to HTML using pulldown-cmark.
///
/// Every heading gets an id derived from its text (the same anchor rule as
/// the generated table of contents), made unique with a `-N` suffix. Fenced
/// code blocks go through the highlighter.
pub fn render_markdown(markdown: &str, highlighter: &SyntaxHighlighter) -> MarkdownOutput {
    let parser = Parser::new_ext(markdown, options());

    let mut in_code_block = false;
    let mut code_language = String::new();
    let mut code_content = String::new();

    let mut heading: Option<OpenHeading> = None;
    let mut used_ids: HashSet<String> = HashSet::new();
    let mut headings: Vec<HeadingEntry> = Vec::new();
    let mut events: Vec<Event> = Vec::new();

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                heading = Some(OpenHeading {
                    level,
                    explicit_id: id.map(|id| id.to_string()),
                    text: String::new(),
                    inner: Vec::new(),
                });
            }
            Event::End(TagEnd::Heading(_)) => {
                let Some(open) = heading.take() else {
                    continue;
                };
                let id = match open.explicit_id {
                    Some(id) => id,
                    None => unique_id(&slugify(&open.text), &used_ids),
                };
                used_ids.insert(id.clone());

                let mut inner = String::new();
                html::push_html(&mut inner, open.inner.into_iter());
                let level = open.level as usize;
                events.push(Event::Html(
                    format!("<h{level} id=\"{id}\">{inner}</h{level}>\n").into(),
                ));
                headings.push(HeadingEntry {
                    text: open.text,
                    id,
                    level: level as u8,
                });
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                code_language = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                code_content.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                let highlighted = highlighter.highlight(&code_content, &code_language);
                events.push(Event::Html(highlighted.into()));
            }
            Event::Text(text) if in_code_block => {
                code_content.push_str(&text);
            }
            other => match heading.as_mut() {
                Some(open) => {
                    if let Event::Text(text) | Event::Code(text) = &other {
                        open.text.push_str(text);
                    }
                    open.inner.push(other.into_static());
                }
                None => events.push(other),
            },
        }
    }

    let mut html_output = String::new();
    html::push_html(&mut html_output, events.into_iter());

    MarkdownOutput {
        html: html_output,
        headings,
    }
}

fn unique_id(base: &str, used: &HashSet<String>) -> String {
    let mut id = base.to_string();
    let mut suffix = 1;
    while used.contains(&id) {
        id = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    id
}
