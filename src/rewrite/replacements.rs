//! Reference forms: the literal strings under which an asset path appears in source text.
//!
//! For an asset at `public/images/blog/cover.png` the forms are:
//! - URL form: `/images/blog/cover.png`
//! - aliased import: `@/public/images/blog/cover.png`
//! - bare relative: `public/images/blog/cover.png`
//!
//! All matching is literal byte-sequence matching. Paths contain `.` and `/`,
//! which a regex would need escaped.

#![allow(missing_docs)]

use memchr::memmem;
use serde::Serialize;

/// Which syntactic form a pair covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceForm {
    Url,
    AliasedImport,
    BareRelative,
}

/// One `old -> new` literal substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementPair {
    pub form: ReferenceForm,
    pub from: String,
    pub to: String,
}

/// How the three forms are spelled for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceStyle {
    /// Web root as written in source, e.g. `public`.
    pub public_prefix: String,
    /// Import alias for the project root, e.g. `@/`.
    pub import_alias: String,
}

impl Default for ReferenceStyle {
    fn default() -> Self {
        Self {
            public_prefix: "public".to_string(),
            import_alias: "@/".to_string(),
        }
    }
}

/// The replacement pairs of one candidate. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementSet {
    pairs: Vec<ReplacementPair>,
}

impl ReplacementSet {
    /// Build the set from web-root-relative old/new paths (`/`-separated).
    pub fn new(style: &ReferenceStyle, old_rel: &str, new_rel: &str) -> Self {
        let public = style.public_prefix.trim_matches('/');
        let bare = |rel: &str| {
            if public.is_empty() {
                rel.to_string()
            } else {
                format!("{public}/{rel}")
            }
        };
        let alias = |rel: &str| format!("{}{}", style.import_alias, bare(rel));

        let pairs = vec![
            ReplacementPair {
                form: ReferenceForm::Url,
                from: format!("/{old_rel}"),
                to: format!("/{new_rel}"),
            },
            ReplacementPair {
                form: ReferenceForm::AliasedImport,
                from: alias(old_rel),
                to: alias(new_rel),
            },
            ReplacementPair {
                form: ReferenceForm::BareRelative,
                from: bare(old_rel),
                to: bare(new_rel),
            },
        ];
        Self { pairs }
    }

    pub fn pairs(&self) -> &[ReplacementPair] {
        &self.pairs
    }

    /// The old forms; any of these left in the corpus keeps the original alive.
    pub fn old_forms(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|p| p.from.as_str())
    }

    /// Apply every pair in order. Returns `None` when the content is unchanged.
    pub fn apply(&self, content: &[u8]) -> Option<Vec<u8>> {
        let mut current: Option<Vec<u8>> = None;
        for pair in &self.pairs {
            let source = current.as_deref().unwrap_or(content);
            if let Some(next) = replace_all(source, pair.from.as_bytes(), pair.to.as_bytes()) {
                current = Some(next);
            }
        }
        current.filter(|after| after.as_slice() != content)
    }

    /// Whether any old form occurs in `content`.
    pub fn references_old(&self, content: &[u8]) -> bool {
        self.old_forms()
            .any(|needle| !needle.is_empty() && memmem::find(content, needle.as_bytes()).is_some())
    }
}

/// Replace every non-overlapping occurrence of `from`, left to right.
///
/// Returns `None` if `from` does not occur (or is empty).
pub fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Option<Vec<u8>> {
    if from.is_empty() {
        return None;
    }
    let finder = memmem::Finder::new(from);
    let mut matches = finder.find_iter(haystack).peekable();
    matches.peek()?;

    let mut out = Vec::with_capacity(haystack.len());
    let mut last = 0;
    for start in matches {
        // find_iter yields non-overlapping matches.
        out.extend_from_slice(&haystack[last..start]);
        out.extend_from_slice(to);
        last = start + from.len();
    }
    out.extend_from_slice(&haystack[last..]);
    Some(out)
}
