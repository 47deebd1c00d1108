pub mod archive;
pub mod error;
pub mod store;
pub mod sync;
