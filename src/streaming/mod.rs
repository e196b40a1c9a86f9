//! Streaming row routing.
//!
//! This module splits a delimited text stream into one output file per
//! routing key, writing the shared header once at the top of each file and
//! appending matching records in input order.

mod destination;
mod record;
mod row_router;

pub use destination::{DestinationPool, DestinationSummary, Resolution};
pub use record::{destination_name, routing_key, split_fields, strip_quotes, Header};
pub use row_router::{
    route_file, route_reader, route_stdin, RouteResult, RouterConfig, DEFAULT_KEY_FIELD,
    DEFAULT_MAX_OPEN_FILES, DEFAULT_SUFFIX,
};
