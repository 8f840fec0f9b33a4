pub mod logging;

pub use logging::{LogContext, Logging};
