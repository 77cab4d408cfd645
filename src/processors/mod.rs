// webpnorm/src/processors/mod.rs
pub mod animated;
mod batch;
mod compressor;
mod loader;
mod metadata;
mod resizer;
pub mod sniffer;
pub mod writer;

pub use animated::{AnimatedHandler, AnimatedOutcome};
pub use batch::{convert_json_list, BatchProcessor};
pub use compressor::Compressor;
pub use loader::Loader;
pub use metadata::{apply_orientation, MetadataProcessor};
pub use resizer::{BoundingBox, Resizer, LANDSCAPE_BOX, PORTRAIT_BOX};
