//! Tool definitions and input validation.

mod definition;
mod schema;

pub use definition::*;
pub use schema::*;
