#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod session;
pub mod time;

pub use error::ValidationError;
pub use session::Session;
pub use time::Clock;
