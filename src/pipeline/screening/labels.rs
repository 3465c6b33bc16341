use std::collections::HashSet;
use std::path::Path;

use super::ScreeningError;
use crate::pipeline::types::Label;

/// Paddy classes in model output order.
pub const PADDY_LABELS: [&str; 10] = [
    "bacterial_leaf_blight",
    "bacterial_leaf_streak",
    "bacterial_panicle_blight",
    "blast",
    "brown_spot",
    "dead_heart",
    "downy_mildew",
    "hispa",
    "normal",
    "tungro",
];

/// Ordered label set; index `i` names model output `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::paddy()
    }
}

impl LabelSet {
    /// The built-in 10-class paddy set.
    pub fn paddy() -> Self {
        Self {
            labels: PADDY_LABELS.iter().map(|l| Label::new(*l)).collect(),
        }
    }

    /// Parse `labels.txt` content: one label per line, blank lines ignored.
    pub fn from_lines(text: &str) -> Result<Self, ScreeningError> {
        let mut seen = HashSet::new();
        let mut labels = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !seen.insert(line) {
                return Err(ScreeningError::Labels(format!("duplicate label '{line}'")));
            }
            labels.push(Label::new(line));
        }
        if labels.is_empty() {
            return Err(ScreeningError::Labels("no labels".into()));
        }
        Ok(Self { labels })
    }

    pub fn from_file(path: &Path) -> Result<Self, ScreeningError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScreeningError::Labels(format!("{}: {e}", path.display())))?;
        Self::from_lines(&text)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    /// Exact-match lookup.
    pub fn find(&self, id: &str) -> Option<&Label> {
        self.labels.iter().find(|l| l.as_str() == id)
    }

    /// Lenient lookup for names coming from outside the app:
    /// `"Brown Spot"`, `"brown-spot"` and `"brown_spot"` all resolve.
    pub fn resolve(&self, name: &str) -> Option<&Label> {
        let folded = fold_label(name);
        self.labels.iter().find(|l| fold_label(l.as_str()) == folded)
    }
}

/// Lowercase, with spaces and hyphens folded to underscores.
pub fn fold_label(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}
