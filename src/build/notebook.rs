//! Notebook processing: one annotated source notebook becomes an exercise
//! notebook (solutions removed, outputs cleared) and an answers notebook.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::archive::{ArchiveError, create_data_zip};
use super::assets::{AssetError, AssetSyntax, copy_referenced_files};
use super::context::PublishContext;
use super::format::ContentProcessor;
use super::item::{ItemKind, PublishedItem};
use super::metadata::{ItemMetadata, apply_overrides};
use super::paths::{file_name_of, hosted_url};
use super::slides::{SlideError, copy_if_missing, locate_slide};
use crate::config::Section;

/// Key of the embedded metadata block under the notebook's `metadata`.
pub const METADATA_KEY: &str = "workshop";

/// Tag marking cells removed from the exercise notebook.
pub const SOLUTION_TAG: &str = "solution";

#[derive(thiserror::Error, Debug)]
pub enum NotebookError {
    #[error("failed to read notebook {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse notebook {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("notebook {0} is not a JSON object")]
    NotAnObject(PathBuf),

    #[error("failed to write notebook {path}: {source}")]
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
}

// =============================================================================
// Document model
// =============================================================================

/// A notebook document. Unknown fields are carried through untouched and in
/// their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct Notebook {
    doc: Map<String, Value>,
}

impl Notebook {
    pub fn parse(content: &str, path: &Path) -> Result<Self, NotebookError> {
        let value: Value = serde_json::from_str(content).map_err(|source| NotebookError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        match value {
            Value::Object(doc) => Ok(Self { doc }),
            _ => Err(NotebookError::NotAnObject(path.to_path_buf())),
        }
    }

    pub fn read(path: &Path) -> Result<Self, NotebookError> {
        let content = std::fs::read_to_string(path).map_err(|source| NotebookError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn cells(&self) -> &[Value] {
        self.doc
            .get("cells")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn cells_mut(&mut self) -> &mut Vec<Value> {
        let cells = self
            .doc
            .entry("cells")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !cells.is_array() {
            *cells = Value::Array(Vec::new());
        }
        match cells {
            Value::Array(cells) => cells,
            _ => unreachable!("cells was just made an array"),
        }
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        object_entry(&mut self.doc, "metadata")
    }

    /// The embedded workshop metadata block, or an empty mapping.
    pub fn workshop_metadata(&self) -> Map<String, Value> {
        self.doc
            .get("metadata")
            .and_then(|m| m.get(METADATA_KEY))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_workshop_metadata(&mut self, meta: Map<String, Value>) {
        self.metadata_mut()
            .insert(METADATA_KEY.to_string(), Value::Object(meta));
    }

    /// Point the kernel at a stock Python 3 kernel.
    pub fn normalize_kernel(&mut self) {
        let kernelspec = object_entry(self.metadata_mut(), "kernelspec");
        kernelspec.insert("name".into(), json!("python3"));
        kernelspec.insert("display_name".into(), json!("Python 3"));
        kernelspec.insert("language".into(), json!("python"));
    }

    /// Derive the exercise variant: outputs cleared on every code cell and
    /// solution cells replaced by empty code cells.
    pub fn to_exercise(&self) -> Notebook {
        let mut exercise = self.clone();
        for cell in exercise.cells_mut().iter_mut() {
            if is_solution(cell) {
                *cell = empty_code_cell(Vec::new());
                continue;
            }
            if let Value::Object(fields) = cell
                && fields.get("cell_type").and_then(Value::as_str) == Some("code")
            {
                fields.insert("outputs".into(), json!([]));
                fields.insert("execution_count".into(), Value::Null);
            }
        }
        exercise
    }

    pub fn insert_cells(&mut self, at: usize, cells: &[Value]) {
        let existing = self.cells_mut();
        let at = at.min(existing.len());
        existing.splice(at..at, cells.iter().cloned());
    }

    /// Concatenated source of every markdown cell.
    pub fn markdown_text(&self) -> String {
        self.cells()
            .iter()
            .filter(|c| c.get("cell_type").and_then(Value::as_str) == Some("markdown"))
            .map(cell_source)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Serialize with one-space indentation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.doc.serialize(&mut serializer)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn write(&self, path: &Path) -> Result<(), NotebookError> {
        let json = self.to_json().map_err(|source| NotebookError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| NotebookError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(map) => map,
        _ => unreachable!("entry was just made an object"),
    }
}

fn is_solution(cell: &Value) -> bool {
    cell.get("metadata")
        .and_then(|m| m.get("tags"))
        .and_then(Value::as_array)
        .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(SOLUTION_TAG)))
}

/// Cell source as one string; notebooks store it as a string or a list of lines.
fn cell_source(cell: &Value) -> String {
    match cell.get("source") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(lines)) => lines.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

fn empty_code_cell(source: Vec<String>) -> Value {
    json!({
        "cell_type": "code",
        "metadata": {},
        "source": source,
        "execution_count": null,
        "outputs": []
    })
}

fn markdown_cell(source: String) -> Value {
    json!({
        "cell_type": "markdown",
        "metadata": {},
        "source": [source]
    })
}

// =============================================================================
// Setup cells
// =============================================================================

/// Cells prepended to hosted notebooks: package installation and data
/// download. Only the published site gets them; the cloud workspace receives
/// the untouched section folders.
pub fn setup_cells(
    zip_name: Option<&str>,
    packages: &[String],
    section_folder: &str,
    ctx: &PublishContext,
) -> Vec<Value> {
    let mut cells = Vec::new();

    let packages: Vec<&str> = packages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if !packages.is_empty() {
        let mut lines = vec!["# Install required packages\n".to_string()];
        lines.extend(
            packages
                .iter()
                .map(|p| format!("%pip install --upgrade --quiet {p}\n")),
        );
        cells.push(empty_code_cell(lines));
    }

    if let Some(zip) = zip_name {
        let output_dir = ctx.output_dir_name();
        let url = hosted_url(
            "https://github.com",
            &[
                &ctx.config.github_repo,
                "raw",
                &ctx.config.github_branch,
                &output_dir,
                section_folder,
                zip,
            ],
        );
        let lines = [
            "# Download and extract data files\n".to_string(),
            "import os\n".to_string(),
            "import urllib.request\n".to_string(),
            "import zipfile\n".to_string(),
            "\n".to_string(),
            format!("url = '{url}'\n"),
            "print(f'Downloading data from {url}...')\n".to_string(),
            format!("urllib.request.urlretrieve(url, '{zip}')\n"),
            "\n".to_string(),
            format!("print('Extracting {zip}...')\n"),
            format!("with zipfile.ZipFile('{zip}', 'r') as zip_ref:\n"),
            "    zip_ref.extractall('.')\n".to_string(),
            "\n".to_string(),
            format!("os.remove('{zip}')\n"),
            "print('✓ Data files extracted!')".to_string(),
        ];
        cells.push(empty_code_cell(lines.to_vec()));
    }

    cells
}

// =============================================================================
// Processor
// =============================================================================

/// Publishes `.ipynb` files.
#[derive(Debug, Default)]
pub struct NotebookProcessor;

impl ContentProcessor for NotebookProcessor {
    fn name(&self) -> &'static str {
        "notebook"
    }

    fn extensions(&self) -> &[&'static str] {
        &["ipynb"]
    }

    fn process(
        &self,
        path: &Path,
        section: &Section,
        ctx: &PublishContext,
    ) -> Result<Option<PublishedItem>, super::format::ProcessError> {
        Ok(process_notebook(path, section, ctx)?)
    }
}

pub fn process_notebook(
    path: &Path,
    section: &Section,
    ctx: &PublishContext,
) -> Result<Option<PublishedItem>, NotebookError> {
    let source = Notebook::read(path)?;
    let relative = ctx.relative_to_root(path);

    let merged = apply_overrides(&relative, &source.workshop_metadata(), &ctx.config.overrides);
    if merged.is_empty() {
        tracing::info!("skipping {} - no workshop metadata", relative);
        return Ok(None);
    }
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
    let notebook_dir = path.parent().unwrap_or(&ctx.root);
    let folder = section.folder_name();
    let zip_name = meta.has_data_files().then(|| format!("{stem}-data.zip"));

    let mut answers = source.clone();
    answers.normalize_kernel();
    answers.set_workshop_metadata(merged);
    let mut exercise = answers.to_exercise();

    let setup = if meta.needs_setup() {
        let packages = meta.install.as_deref().unwrap_or(&ctx.config.install);
        setup_cells(zip_name.as_deref(), packages, &folder, ctx)
    } else {
        Vec::new()
    };
    answers.insert_cells(0, &setup);
    exercise.insert_cells(0, &setup);

    let out_dir = ctx.output_dir.join(&folder);
    std::fs::create_dir_all(&out_dir).map_err(|source| NotebookError::Write {
        path: out_dir.clone(),
        source,
    })?;

    copy_referenced_files(
        &source.markdown_text(),
        AssetSyntax::Notebook,
        notebook_dir,
        &out_dir,
    )?;

    if let Some(slide) = &meta.slides {
        let name = file_name_of(slide);
        let link = markdown_cell(format!("**Slides:** [{name}](./{name})"));
        answers.insert_cells(setup.len(), std::slice::from_ref(&link));
        exercise.insert_cells(setup.len(), std::slice::from_ref(&link));

        let located = locate_slide(slide, notebook_dir, &ctx.root)?;
        if copy_if_missing(&located, &out_dir.join(&name))? {
            tracing::info!("copied slide file: {}", slide);
        }
    }

    if let Some(zip) = &zip_name {
        create_data_zip(&meta.data_files, &out_dir.join(zip), notebook_dir)?;
    }

    let exercise_file = format!("{folder}/{stem}.ipynb");
    let answers_file = format!("{folder}/{stem}-ANSWERS.ipynb");
    exercise.write(&ctx.output_dir.join(&exercise_file))?;
    tracing::info!("created {}", exercise_file);
    answers.write(&ctx.output_dir.join(&answers_file))?;
    tracing::info!("created {}", answers_file);

    Ok(Some(PublishedItem {
        title: meta.title.clone().unwrap_or_else(|| stem.clone()),
        description: meta.description.clone().unwrap_or_default(),
        section: section.title.clone(),
        section_folder: folder.clone(),
        section_slides: section.slides.clone(),
        kind: ItemKind::Notebook {
            exercise_file,
            answers_file,
        },
        data_file: zip_name.map(|zip| format!("{folder}/{zip}")),
        order: meta.order,
        links: meta.links,
        slides: meta.slides,
        name: stem,
    }))
}
