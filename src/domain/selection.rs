//! User-chosen ability classification codes.

use serde::{Deserialize, Serialize};

/// One selected classification code, e.g. a knowledge, skill or technology
/// code picked in the analyzer wizard.
///
/// Never persisted on its own; consumed transiently when deriving cache keys
/// and when ranking occupations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
}

impl Selection {
    pub fn new(kind: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            code: code.into(),
        }
    }

    /// Canonical form: `kind` lower-cased, `code` stripped of surrounding
    /// whitespace with its case preserved. Returns `None` when either
    /// component ends up empty.
    ///
    /// The asymmetry (case folded on `kind` only) is intentional: codes such
    /// as O*NET identifiers are case-significant.
    pub fn normalized(&self) -> Option<Selection> {
        let kind = self.kind.to_lowercase();
        let code = self.code.trim();
        if kind.is_empty() || code.is_empty() {
            return None;
        }
        Some(Selection {
            kind,
            code: code.to_string(),
        })
    }
}
