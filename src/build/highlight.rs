use autumnus::{HtmlLinkedBuilder, formatter::Formatter, languages::Language, themes};

/// Theme whose stylesheet is inlined into every page.
pub const DEFAULT_THEME: &str = "github_light";

/// Code block highlighter (tree-sitter based, via autumnus). Emits class
/// names only; colors come from the theme stylesheet.
pub struct SyntaxHighlighter {
    theme_name: String,
}

impl SyntaxHighlighter {
    pub fn new(theme_name: &str) -> Self {
        Self {
            theme_name: theme_name.to_string(),
        }
    }

    /// Highlight code and return HTML with CSS classes.
    /// Unsupported languages come back as a plain escaped `<pre><code>` block.
    pub fn highlight(&self, code: &str, language: &str) -> String {
        let lang = Language::guess(language, code);

        if matches!(lang, Language::PlainText)
            && !language.is_empty()
            && language != "plaintext"
            && language != "text"
        {
            return plain_code_block(code, language);
        }

        let formatter = match HtmlLinkedBuilder::new().source(code).lang(lang).build() {
            Ok(f) => f,
            Err(_) => return plain_code_block(code, language),
        };

        let mut output: Vec<u8> = Vec::new();
        if formatter.format(&mut output).is_err() {
            return plain_code_block(code, language);
        }
        String::from_utf8(output).unwrap_or_else(|_| plain_code_block(code, language))
    }

    /// Stylesheet for the configured theme, if the theme exists.
    pub fn generate_css(&self) -> Option<String> {
        match themes::get(&self.theme_name) {
            Ok(theme) => Some(theme.css(false)),
            Err(_) => {
                tracing::debug!("unknown highlight theme {}", self.theme_name);
                None
            }
        }
    }
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new(DEFAULT_THEME)
    }
}

fn plain_code_block(code: &str, language: &str) -> String {
    let escaped = html_escape(code);
    if language.is_empty() {
        format!("<pre><code>{}</code></pre>", escaped)
    } else {
        format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            html_escape(language),
            escaped
        )
    }
}

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_python() {
        let highlighter = SyntaxHighlighter::default();
        let result = highlighter.highlight("import pandas as pd", "python");
        assert!(result.contains("<pre"));
        assert!(result.contains("</pre>"));
    }

    #[test]
    fn test_highlight_unknown_language() {
        let highlighter = SyntaxHighlighter::default();
        let result = highlighter.highlight("a < b", "unknown_lang_xyz");
        assert_eq!(
            result,
            "<pre><code class=\"language-unknown_lang_xyz\">a &lt; b</code></pre>"
        );
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<div>&</div>"), "&lt;div&gt;&amp;&lt;/div&gt;");
    }

    #[test]
    fn test_generate_css() {
        let css = SyntaxHighlighter::new("dracula").generate_css();
        assert!(css.is_some_and(|c| !c.is_empty()));
        assert!(SyntaxHighlighter::new("no-such-theme").generate_css().is_none());
    }
}
