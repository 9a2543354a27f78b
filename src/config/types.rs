//! Configuration type definitions.
//!
//! This module contains the data structures read from `workshop-config.yaml`.
//! Input-shape variance (string vs. list, section shorthand, override rule
//! layouts) is folded away during deserialization so the rest of the build
//! only ever sees the canonical types below.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use super::overrides::{MetadataOverrideRule, normalize_overrides};

// =============================================================================
// Top-level config
// =============================================================================

/// Workshop configuration, loaded once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawConfig")]
pub struct WorkshopConfig {
    /// Repository identifier, `owner/name`
    pub github_repo: String,
    /// Branch the site is published from
    pub github_branch: String,
    /// Orphan branch holding the cloud workspace copy
    pub notebooks_branch: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub organization: String,
    pub newsletter_signup: String,
    /// Output directory, relative to the project root
    pub output_dir: PathBuf,
    pub sections: Vec<Section>,
    /// Root-level slide deck shown at the top of the index
    pub slides: Option<String>,
    /// Root-level data file patterns, packed into `workshop-data.zip`
    pub data_files: Vec<String>,
    /// Root-level links shown on the index
    pub links: Vec<Link>,
    /// Canonical metadata override rules, in declaration order
    pub overrides: Vec<MetadataOverrideRule>,
    /// Packages installed by notebook setup cells when an item declares none
    pub install: Vec<String>,
    /// Cloud platforms to advertise (`codespaces` enables the workspace CTA)
    pub platforms: Vec<String>,
    /// Custom index page template
    pub index_template: Option<String>,
    /// Files above this size (in megabytes) are tracked with git LFS
    pub git_lfs_threshold_mb: u64,
    pub codespaces: CodespacesConfig,
}

impl Default for WorkshopConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

impl WorkshopConfig {
    /// Whether the cloud workspace call-to-action should be rendered.
    pub fn offers_codespaces(&self) -> bool {
        self.platforms.iter().any(|p| p == "codespaces")
    }

    /// Find a section by its display title.
    pub fn section_by_title(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Whether any root-level content (slides, data files, links) is declared.
    pub fn has_root_content(&self) -> bool {
        self.slides.is_some() || !self.data_files.is_empty() || !self.links.is_empty()
    }
}

/// Settings for the cloud workspace staging tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodespacesConfig {
    /// Lines written to `requirements.txt`
    #[serde(default)]
    pub requirements: Vec<String>,
}

// =============================================================================
// Sections
// =============================================================================

/// A named group of source files mapped to one output subdirectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SectionEntry")]
pub struct Section {
    pub folder: String,
    pub title: String,
    pub slides: Option<String>,
    pub data_files: Vec<String>,
    pub icon: Option<String>,
    pub description: String,
    pub draft: bool,
}

impl Section {
    /// Name of the output subdirectory (the folder's last component).
    pub fn folder_name(&self) -> String {
        std::path::Path::new(&self.folder)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.folder.clone())
    }
}

/// A section as written in YAML: either `- folder` or a full mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SectionEntry {
    Folder(String),
    Full(FullSection),
}

#[derive(Debug, Clone, Deserialize)]
struct FullSection {
    folder: String,
    title: Option<String>,
    slides: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    data_files: Vec<String>,
    icon: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    draft: bool,
}

impl From<SectionEntry> for Section {
    fn from(entry: SectionEntry) -> Self {
        match entry {
            SectionEntry::Folder(folder) => Section {
                title: folder.clone(),
                folder,
                slides: None,
                data_files: Vec::new(),
                icon: None,
                description: String::new(),
                draft: false,
            },
            SectionEntry::Full(full) => Section {
                title: full.title.unwrap_or_else(|| full.folder.clone()),
                folder: full.folder,
                slides: full.slides,
                data_files: full.data_files,
                icon: full.icon,
                description: full.description,
                draft: full.draft,
            },
        }
    }
}

// =============================================================================
// Links
// =============================================================================

/// A named link shown on pages and the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default = "default_link_name")]
    pub name: String,
    #[serde(default = "default_link_url")]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

fn default_link_name() -> String {
    "Link".to_string()
}

fn default_link_url() -> String {
    "#".to_string()
}

// =============================================================================
// Raw (on-disk) shape
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(default = "default_repo")]
    github_repo: String,
    #[serde(default = "default_branch")]
    github_branch: String,
    #[serde(default = "default_notebooks_branch")]
    notebooks_branch: String,
    #[serde(default = "default_title")]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    organization: String,
    #[serde(default)]
    newsletter_signup: String,
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    #[serde(default)]
    sections: Vec<Section>,
    slides: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    data_files: Vec<String>,
    #[serde(default)]
    links: Vec<Link>,
    metadata_overrides: Option<serde_json::Value>,
    metadata: Option<serde_json::Value>,
    #[serde(default = "default_install", deserialize_with = "package_list")]
    install: Vec<String>,
    #[serde(default)]
    platforms: Vec<String>,
    index_template: Option<String>,
    #[serde(default = "default_lfs_threshold")]
    git_lfs_threshold_mb: u64,
    #[serde(default)]
    codespaces: CodespacesConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            github_repo: default_repo(),
            github_branch: default_branch(),
            notebooks_branch: default_notebooks_branch(),
            title: default_title(),
            description: String::new(),
            author: String::new(),
            organization: String::new(),
            newsletter_signup: String::new(),
            output_dir: default_output_dir(),
            sections: Vec::new(),
            slides: None,
            data_files: Vec::new(),
            links: Vec::new(),
            metadata_overrides: None,
            metadata: None,
            install: default_install(),
            platforms: Vec::new(),
            index_template: None,
            git_lfs_threshold_mb: default_lfs_threshold(),
            codespaces: CodespacesConfig::default(),
        }
    }
}

impl From<RawConfig> for WorkshopConfig {
    fn from(raw: RawConfig) -> Self {
        // `metadata_overrides` wins over the shorter `metadata` key
        let overrides = raw
            .metadata_overrides
            .as_ref()
            .filter(|v| !is_empty_value(v))
            .or(raw.metadata.as_ref())
            .map(normalize_overrides)
            .unwrap_or_default();

        Self {
            github_repo: raw.github_repo,
            github_branch: raw.github_branch,
            notebooks_branch: raw.notebooks_branch,
            title: raw.title,
            description: raw.description,
            author: raw.author,
            organization: raw.organization,
            newsletter_signup: raw.newsletter_signup,
            output_dir: raw.output_dir,
            sections: raw.sections,
            slides: raw.slides,
            data_files: raw.data_files,
            links: raw.links,
            overrides,
            install: raw.install,
            platforms: raw.platforms,
            index_template: raw.index_template,
            git_lfs_threshold_mb: raw.git_lfs_threshold_mb,
            codespaces: raw.codespaces,
        }
    }
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn default_repo() -> String {
    "USER/REPO".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_notebooks_branch() -> String {
    "codespaces".to_string()
}

fn default_title() -> String {
    "Workshop".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_install() -> Vec<String> {
    ["pandas", "natural_pdf", "tqdm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_lfs_threshold() -> u64 {
    80
}

// =============================================================================
// Shared deserializers
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Accept either `key: value` or `key: [a, b]`.
pub(crate) fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Accept a whitespace-separated package string or a list of packages.
pub(crate) fn package_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let packages = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => s.split_whitespace().map(str::to_string).collect(),
        Some(OneOrMany::Many(v)) => v,
    };
    Ok(packages
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect())
}
