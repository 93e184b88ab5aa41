//! CSV uploads into the embedded database.

pub mod csv;
pub mod upload;

pub use csv::{CellValue, ColumnType, CsvTable};
pub use upload::{
    DEFAULT_UPLOAD_TABLE, SkipReason, TableUploader, UploadOutcome, UploadRequest, UploadedColumn,
};
