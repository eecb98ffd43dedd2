pub mod argon;
pub mod check;
pub mod digest;
mod error;
pub mod server;

pub use error::Error;
