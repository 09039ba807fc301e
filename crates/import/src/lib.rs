pub mod dedup;
pub mod delimited;
pub mod document;
pub mod error;
pub mod format;
pub mod mapping;
pub mod pipeline;
pub mod spreadsheet;
pub(crate) mod util;

pub use dedup::{DedupEngine, Partition};
pub use error::ImportError;
pub use format::{detect_format, FileFormat};
pub use mapping::{map_rows, CanonicalField, ColumnMap, MappedRows};
pub use pipeline::{ImportFile, ImportId, ImportPipeline, ImportPreview, ImportResult};
