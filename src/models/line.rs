use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A transit line that the run may switch on or off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub id: String,
    pub shortname: String,
    /// Relative share of extra vehicles this line attracts; `None` counts as 1.
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Line {
    pub fn new(id: impl Into<String>, shortname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            shortname: shortname.into(),
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub(crate) fn assignment_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// The simulated lines of a run, in chromosome order.
///
/// Lines to keep come first; their count is the protected gene prefix. This
/// ordering is persisted once and restored verbatim on resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCollection {
    lines: Vec<Line>,
    protected: usize,
}

impl LineCollection {
    /// Moves the lines to keep to the front, keeping the relative order otherwise.
    #[instrument(level = "debug", skip_all, fields(lines_count = lines.len(), lines_to_keep = lines_to_keep.len()))]
    pub fn ordered(lines: Vec<Line>, lines_to_keep: &[String]) -> Self {
        let (kept, others): (Vec<Line>, Vec<Line>) = lines
            .into_iter()
            .partition(|line| lines_to_keep.contains(&line.id));
        let protected = kept.len();

        Self {
            lines: kept.into_iter().chain(others).collect(),
            protected,
        }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn get(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of leading genes that are always active.
    pub fn protected(&self) -> usize {
        self.protected
    }
}
