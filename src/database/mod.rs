// Database module
// LanceDB-backed persistence for the pattern collection

pub mod lancedb;

pub use lancedb::{IndexedDocument, PatternMatch, PatternMetadata};
