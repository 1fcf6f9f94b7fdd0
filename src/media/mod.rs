//! Media module for collection items, parsing and asset selection.

pub mod item;
pub mod parser;
pub mod resolver;

pub use item::{AssetCandidate, AssetReference, CollectionItem, MediaType};
pub use parser::{guess_mime, parse_collection_item, parse_deviation, SUPPORTED_EXTENSIONS};
pub use resolver::resolve;
