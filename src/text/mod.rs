//! Textual layer of the transformation pipeline.
//!
//! A map travels between the polyhedral backend and the transformations
//! as structured pieces: parameter names, tuple names, ordered range
//! entries, and constraint strings.  Transformations edit the pieces in
//! memory; only the backend parses the entry and constraint text.

pub mod map_parser;
pub mod space_parser;

pub use map_parser::{MapParser, SetParser};
pub use space_parser::SpaceParser;
