//! File-based store implementations.

mod kv;
mod session;

pub use kv::FileKvStore;
pub use session::FileSessionStateStore;
