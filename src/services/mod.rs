pub mod error;
pub mod gemini;

pub use error::*;
pub use gemini::*;
