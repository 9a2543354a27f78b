//! Summary records produced by the content processors and consumed by the
//! index builder.

use std::cmp::Ordering;

use crate::config::{Link, Section};

/// What kind of output an item produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    /// Paths are relative to the output directory
    Notebook {
        exercise_file: String,
        answers_file: String,
    },
    Markdown {
        html_file: String,
    },
    /// Placeholder standing in for an unpublished section
    Draft,
}

/// A published file, as listed on the index page.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedItem {
    /// File stem
    pub name: String,
    pub title: String,
    pub description: String,
    /// Title of the owning section
    pub section: String,
    /// Output subdirectory of the owning section
    pub section_folder: String,
    pub section_slides: Option<String>,
    pub kind: ItemKind,
    /// Per-item data archive, relative to the output directory
    pub data_file: Option<String>,
    pub order: Option<f64>,
    pub links: Vec<Link>,
    pub slides: Option<String>,
}

impl PublishedItem {
    /// The single placeholder record for a draft section.
    pub fn draft(section: &Section) -> Self {
        Self {
            name: String::new(),
            title: section.title.clone(),
            description: section.description.clone(),
            section: section.title.clone(),
            section_folder: section.folder_name(),
            section_slides: section.slides.clone(),
            kind: ItemKind::Draft,
            data_file: None,
            order: None,
            links: Vec::new(),
            slides: None,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self.kind, ItemKind::Draft)
    }

    /// Attach the owning section, overriding whatever the processor recorded.
    pub fn in_section(mut self, section: &Section) -> Self {
        self.section = section.title.clone();
        self.section_folder = section.folder_name();
        self.section_slides = section.slides.clone();
        self
    }

    /// Whether the item's own slide should be listed next to it.
    ///
    /// Only slides that differ from the section's are shown.
    pub fn has_distinct_slides(&self) -> bool {
        self.slides.is_some() && self.slides != self.section_slides
    }
}

/// Index ordering: items with an order key first, ascending by key; then the
/// rest, descending by name.
pub fn index_order(a: &PublishedItem, b: &PublishedItem) -> Ordering {
    match (a.order, b.order) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.name.cmp(&a.name),
    }
}

/// Sort items into index order. The sort is stable, so equal keys keep
/// their discovery order.
pub fn sort_for_index(items: &mut [PublishedItem]) {
    items.sort_by(index_order);
}
