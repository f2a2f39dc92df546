//! Flux query construction and response decoding
//!
//! - [`filter`]: composable tag filters rendered to `filter(fn: ...)`
//! - [`time`]: timezone-checked query bounds
//! - [`flux`]: full recency / range query text
//! - [`csv`]: streaming decoder for query responses

pub mod csv;
pub mod filter;
pub mod flux;
pub mod time;

pub use csv::{decode_rows, FluxCsvDecoder, FluxRow};
pub use filter::{FilterExpression, FilterNode, Operator, TagConstraint};
pub use flux::{FluxQuery, Window, MESSAGE_FIELD};
pub use time::Timestamp;
