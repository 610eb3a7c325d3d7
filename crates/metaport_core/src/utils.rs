pub mod error_logging;

pub use error_logging::error_chain;
