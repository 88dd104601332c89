mod document;
mod error;
mod value;

pub use document::{Document, Fields};
pub use error::{FiresiteError, FiresiteResult};
pub use value::compare_values;
