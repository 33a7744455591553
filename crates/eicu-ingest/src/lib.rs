pub mod chunked;
pub mod discovery;
pub mod error;
pub mod roster;
pub mod schema;
pub mod units;

pub use chunked::{ChunkedReader, DEFAULT_CHUNK_ROWS, RecordChunks, SourceRow, get_string};
pub use discovery::list_files_with_extension;
pub use error::{IngestError, Result};
pub use roster::PatientRoster;
pub use schema::{PATIENT_ID_COLUMN, TableSpec};
pub use units::{ABSENT_UNIT, is_absent_unit, normalize_unit};
