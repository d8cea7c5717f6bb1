pub mod json;

pub use json::JsonMatrixFile;
