pub mod error;
pub mod streaming;

pub use error::AppError;
pub use streaming::{route_file, route_reader, route_stdin, RouteResult, RouterConfig};
