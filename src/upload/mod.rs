pub mod form;
pub mod storage;

pub use form::{FilePart, FormPayload};
pub use storage::{ImageKind, ImageStore};
