//! Slide handling: locating decks, converting presentations to PDF,
//! rendering first-page thumbnails and emitting the embed snippet.
//!
//! Conversion and rasterization are each an ordered cascade of external
//! tools. A strategy either produces its artifact or reports why it could
//! not; the first success wins and failures fall through silently.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use super::paths::file_name_of;

/// Upper bound for a single presentation conversion attempt.
pub const CONVERSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Thumbnail width in pixels.
pub const THUMBNAIL_WIDTH: u32 = 800;

#[derive(thiserror::Error, Debug)]
pub enum SlideError {
    #[error("slide file not found: {slide} (looked in {})", join_paths(.tried))]
    NotFound { slide: String, tried: Vec<PathBuf> },

    #[error("failed to copy slide file {path}: {source}")]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Locating
// =============================================================================

/// Find a slide deck relative to `base_dir`, then relative to the project
/// root. Absolute references are used as given.
pub fn locate_slide(slide: &str, base_dir: &Path, root: &Path) -> Result<PathBuf, SlideError> {
    let candidates = if Path::new(slide).is_absolute() {
        vec![PathBuf::from(slide)]
    } else {
        vec![base_dir.join(slide), root.join(slide)]
    };

    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| SlideError::NotFound {
            slide: slide.to_string(),
            tried: candidates,
        })
}

/// Copy `source` to `dest` unless `dest` already exists.
pub fn copy_if_missing(source: &Path, dest: &Path) -> Result<bool, SlideError> {
    if dest.exists() {
        return Ok(false);
    }
    let copy_err = |source| SlideError::Copy {
        path: dest.to_path_buf(),
        source,
    };
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(copy_err)?;
    }
    std::fs::copy(source, dest).map_err(copy_err)?;
    Ok(true)
}

// =============================================================================
// Strategy cascade
// =============================================================================

/// Result of one strategy attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Produced(PathBuf),
    Failed(String),
}

/// An external tool that turns `input` into `output`.
pub trait Strategy {
    fn name(&self) -> &str;

    /// Whether the strategy can run on this platform.
    fn is_applicable(&self) -> bool {
        true
    }

    fn run(&self, input: &Path, output: &Path) -> Outcome;
}

/// Try each applicable strategy in order until one produces the output.
pub fn run_cascade(strategies: &[Box<dyn Strategy>], input: &Path, output: &Path) -> Outcome {
    let mut reasons = Vec::new();
    for strategy in strategies.iter().filter(|s| s.is_applicable()) {
        match strategy.run(input, output) {
            Outcome::Produced(path) => {
                tracing::debug!(strategy = strategy.name(), "produced {}", path.display());
                return Outcome::Produced(path);
            }
            Outcome::Failed(reason) => {
                tracing::debug!(strategy = strategy.name(), "failed: {}", reason);
                reasons.push(format!("{}: {}", strategy.name(), reason));
            }
        }
    }
    if reasons.is_empty() {
        Outcome::Failed("no applicable strategy".to_string())
    } else {
        Outcome::Failed(reasons.join("; "))
    }
}

type ArgBuilder = fn(&Path, &Path) -> Vec<OsString>;

/// A strategy backed by a single external command.
pub struct CommandStrategy {
    name: &'static str,
    program: &'static str,
    /// Restrict to one `std::env::consts::OS`
    os: Option<&'static str>,
    timeout: Option<Duration>,
    args: ArgBuilder,
}

impl Strategy for CommandStrategy {
    fn name(&self) -> &str {
        self.name
    }

    fn is_applicable(&self) -> bool {
        self.os.is_none_or(|os| os == std::env::consts::OS)
    }

    fn run(&self, input: &Path, output: &Path) -> Outcome {
        let mut command = Command::new(self.program);
        command
            .args((self.args)(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match run_command(&mut command, self.timeout) {
            Ok(status) if status.success() && output.exists() => {
                Outcome::Produced(output.to_path_buf())
            }
            Ok(status) if status.success() => {
                Outcome::Failed(format!("{} did not produce {}", self.program, output.display()))
            }
            Ok(status) => Outcome::Failed(format!("{} exited with {}", self.program, status)),
            Err(reason) => Outcome::Failed(reason),
        }
    }
}

/// Run a command to completion, killing it once `timeout` elapses.
fn run_command(command: &mut Command, timeout: Option<Duration>) -> Result<ExitStatus, String> {
    let mut child = command.spawn().map_err(|e| format!("failed to start: {e}"))?;
    match timeout {
        None => child.wait().map_err(|e| e.to_string()),
        Some(timeout) => wait_with_timeout(&mut child, timeout),
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, String> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(100);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("timed out after {}s", timeout.as_secs()));
                }
                std::thread::sleep(poll_interval);
            }
            Err(e) => return Err(format!("failed to check process status: {e}")),
        }
    }
}

fn os(s: impl Into<OsString>) -> OsString {
    s.into()
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn dir_of(path: &Path) -> OsString {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.as_os_str().to_owned())
        .unwrap_or_else(|| os("."))
}

/// Presentation to PDF converters, in preference order.
pub fn pdf_converters() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(CommandStrategy {
            name: "powerpoint-applescript",
            program: "osascript",
            os: Some("macos"),
            timeout: Some(CONVERSION_TIMEOUT),
            args: |pptx, pdf| {
                let script = format!(
                    r#"tell application "Microsoft PowerPoint"
    activate
    open POSIX file "{}"
    delay 2
    save active presentation in POSIX file "{}" as save as PDF
    close active presentation
end tell"#,
                    absolute(pptx).display(),
                    absolute(pdf).display()
                );
                vec![os("-e"), os(script)]
            },
        }),
        Box::new(CommandStrategy {
            name: "pptxtopdf",
            program: "python",
            os: Some("windows"),
            timeout: Some(CONVERSION_TIMEOUT),
            args: |pptx, _pdf| {
                let dir = absolute(&PathBuf::from(dir_of(pptx)));
                let script = format!(
                    "from pptxtopdf import convert; convert(r'{0}', r'{0}')",
                    dir.display()
                );
                vec![os("-c"), os(script)]
            },
        }),
        Box::new(CommandStrategy {
            name: "soffice",
            program: "soffice",
            os: None,
            timeout: Some(CONVERSION_TIMEOUT),
            args: |pptx, pdf| {
                vec![
                    os("--headless"),
                    os("--convert-to"),
                    os("pdf"),
                    os("--outdir"),
                    dir_of(pdf),
                    pptx.as_os_str().to_owned(),
                ]
            },
        }),
        Box::new(CommandStrategy {
            name: "unoconv",
            program: "unoconv",
            os: None,
            timeout: Some(CONVERSION_TIMEOUT),
            args: |pptx, pdf| {
                vec![
                    os("-f"),
                    os("pdf"),
                    os("-o"),
                    pdf.as_os_str().to_owned(),
                    pptx.as_os_str().to_owned(),
                ]
            },
        }),
    ]
}

/// First-page rasterizers, in preference order.
pub fn thumbnailers() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(CommandStrategy {
            name: "imagemagick",
            program: "convert",
            os: None,
            timeout: None,
            args: |pdf, thumb| {
                let mut first_page = pdf.as_os_str().to_owned();
                first_page.push("[0]");
                vec![
                    os("-density"),
                    os("150"),
                    first_page,
                    os("-resize"),
                    os(format!("{THUMBNAIL_WIDTH}x")),
                    os("-quality"),
                    os("85"),
                    thumb.as_os_str().to_owned(),
                ]
            },
        }),
        Box::new(CommandStrategy {
            name: "pdftoppm",
            program: "pdftoppm",
            os: None,
            timeout: None,
            // -singlefile appends the extension to the output root
            args: |pdf, thumb| {
                vec![
                    os("-f"),
                    os("1"),
                    os("-l"),
                    os("1"),
                    os("-png"),
                    os("-scale-to-x"),
                    os(THUMBNAIL_WIDTH.to_string()),
                    os("-scale-to-y"),
                    os("-1"),
                    os("-singlefile"),
                    pdf.as_os_str().to_owned(),
                    thumb.with_extension("").into_os_string(),
                ]
            },
        }),
    ]
}

// =============================================================================
// Embedding
// =============================================================================

/// Converts, copies and embeds slide decks.
pub struct SlideEmbedder {
    converters: Vec<Box<dyn Strategy>>,
    thumbnailers: Vec<Box<dyn Strategy>>,
}

impl Default for SlideEmbedder {
    fn default() -> Self {
        Self::new(pdf_converters(), thumbnailers())
    }
}

impl SlideEmbedder {
    pub fn new(converters: Vec<Box<dyn Strategy>>, thumbnailers: Vec<Box<dyn Strategy>>) -> Self {
        Self {
            converters,
            thumbnailers,
        }
    }

    /// Resolve `source` (a located deck) to a PDF, converting presentations
    /// when needed. Returns `None` when no converter succeeds.
    pub fn ensure_pdf(&self, source: &Path) -> Option<PathBuf> {
        if !is_presentation(source) {
            return Some(source.to_path_buf());
        }

        let pdf = source.with_extension("pdf");
        if is_newer(&pdf, source) {
            tracing::info!("using existing PDF (newer than presentation): {}", pdf.display());
            return Some(pdf);
        }

        tracing::info!("converting {} to PDF", source.display());
        match run_cascade(&self.converters, source, &pdf) {
            Outcome::Produced(pdf) => Some(pdf),
            Outcome::Failed(reason) => {
                tracing::warn!(
                    "could not convert {} to PDF ({}); install LibreOffice or PowerPoint",
                    source.display(),
                    reason
                );
                None
            }
        }
    }

    /// Produce `<stem>-thumb.png` in `dest_dir` for `pdf`, reusing an
    /// existing thumbnail. Returns the thumbnail file name.
    pub fn thumbnail(&self, pdf: &Path, dest_dir: &Path) -> Option<String> {
        let stem = pdf.file_stem()?.to_string_lossy();
        let thumb_name = format!("{stem}-thumb.png");
        let thumb = dest_dir.join(&thumb_name);
        if thumb.exists() {
            return Some(thumb_name);
        }

        match run_cascade(&self.thumbnailers, pdf, &thumb) {
            Outcome::Produced(_) => {
                tracing::info!("created slide thumbnail: {}", thumb_name);
                Some(thumb_name)
            }
            Outcome::Failed(_) => {
                tracing::warn!(
                    "could not create thumbnail for {} (install ImageMagick or poppler-utils)",
                    pdf.display()
                );
                None
            }
        }
    }

    /// Copy a deck into `dest_dir` and return its embed snippet.
    ///
    /// `link_prefix` is prepended to every link in the snippet, for pages
    /// that live above `dest_dir` (e.g. `section1/` from the index).
    pub fn embed(
        &self,
        slide: &str,
        base_dir: &Path,
        root: &Path,
        dest_dir: &Path,
        link_prefix: &str,
    ) -> Result<String, SlideError> {
        let source = locate_slide(slide, base_dir, root)?;

        let Some(pdf) = self.ensure_pdf(&source) else {
            let name = file_name_of(slide);
            if copy_if_missing(&source, &dest_dir.join(&name))? {
                tracing::info!("copied presentation file: {}", slide);
            }
            return Ok(download_only_html(&format!("{link_prefix}{name}"), &name));
        };

        let pdf_name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name_of(slide));
        if copy_if_missing(&pdf, &dest_dir.join(&pdf_name))? {
            tracing::info!("copied slide file: {}", slide);
        }

        let thumb = self
            .thumbnail(&pdf, dest_dir)
            .map(|t| format!("{link_prefix}{t}"));
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(embed_html(
            &slide_id(&stem),
            &format!("{link_prefix}{pdf_name}"),
            thumb.as_deref(),
        ))
    }
}

fn is_presentation(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("pptx"))
}

/// Whether `a` exists and was modified after `b`.
fn is_newer(a: &Path, b: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(a), modified(b)) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

/// Element id for an embed: `slides-<stem>` with spaces and dots hyphenated.
pub fn slide_id(stem: &str) -> String {
    format!("slides-{stem}").replace([' ', '.'], "-")
}

fn download_only_html(href: &str, name: &str) -> String {
    format!(
        r#"
<div class="download-box">
    <strong>Slides:</strong> <a href="./{href}">📥 Download PowerPoint ({name})</a>
</div>
"#
    )
}

const LOAD_SLIDES_SCRIPT: &str = r#"
<script>
function loadSlides(id, src) {
    const container = document.querySelector(`#${id} .slide-container`);
    const preview = document.querySelector(`#${id} .slide-preview`);
    container.style.display = 'block';
    preview.style.display = 'none';
}
</script>
"#;

fn embed_html(id: &str, pdf_href: &str, thumb_href: Option<&str>) -> String {
    let preview = match thumb_href {
        Some(thumb) => format!(
            r#"<img src="./{thumb}" alt="First slide" style="max-width: 100%; cursor: pointer;">"#
        ),
        None => r#"<div style="background: #f0f0f0; padding: 3em; text-align: center; cursor: pointer;">📊 Click to load slides</div>"#
            .to_string(),
    };

    let body = format!(
        r#"
<div id="{id}" class="slide-embed" style="margin: 2em 0;">
    <div class="slide-preview" onclick="loadSlides('{id}', './{pdf_href}')">
        {preview}
        <p style="text-align: center; margin-top: 0.5em;">
            <button style="padding: 0.5em 1em; background: #1976d2; color: white; border: none; border-radius: 4px; cursor: pointer;">
                📊 View Slides
            </button>
            <a href="./{pdf_href}" download style="margin-left: 1em;">📥 Download PDF</a>
        </p>
    </div>
    <div class="slide-container" style="display: none;">
        <embed src="./{pdf_href}" type="application/pdf" style="width: 100%; height: 600px; border: 1px solid #ddd;">
    </div>
</div>
"#
    );
    body + LOAD_SLIDES_SCRIPT
}
