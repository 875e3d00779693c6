//! Local copy of the supplier parts list.
//!
//! The supplier publishes a very large, loosely structured CSV dump. This
//! crate ingests it into a SQLite catalog ([`store::CatalogStore`]) and
//! drives the interactive search used to find part numbers for a BOM
//! ([`session::QuerySession`]).

pub mod command;
pub mod download;
pub mod error;
pub mod ingest;
pub mod model;
pub mod paths;
pub mod session;
pub mod store;
mod table;

pub use command::{parse_line, CommandKind, CommandSpec, QueryCommand, COMMANDS};
pub use download::download_dump;
pub use error::{CatalogError, Result};
pub use ingest::{ingest_file, ingest_reader, IngestReport, PROGRESS_INTERVAL};
pub use model::{parse_field_list, CatalogField, CatalogRow, LibraryType};
pub use session::{QuerySession, SearchCriteria, SessionOutput};
pub use store::{CatalogFilter, CatalogQuery, CatalogStatus, CatalogStore, OrderBy, QueryResult};
pub use table::{fit_to_width, render_csv, render_table};
