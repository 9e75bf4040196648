pub mod call_context;
pub mod db;
pub mod encryption;
pub mod logging;

pub use call_context::{CallContext, CancelHandle};
pub use db::SqlitePool;
pub use encryption::Vault;
