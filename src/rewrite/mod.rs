//! Reference rewriting: replacement forms, corpus-wide substitution, original cleanup.

pub mod replacements;
pub mod rewriter;
