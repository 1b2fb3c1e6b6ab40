pub mod schema;
pub mod store;

pub use store::{snapshot_digest, Store};
