mod config;
mod errors;
mod http;
mod storage;
mod transport;

pub use config::*;
pub use errors::*;
pub use http::*;
pub use storage::*;
pub use transport::*;
