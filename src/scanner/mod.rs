//! Asset scanner and reference index: directory walker, extension tables, protection.

pub mod assets;
pub mod corpus;
pub mod patterns;
pub mod protection;
pub mod walker;
