//! V1 API handlers.

mod describe;
mod keys;
mod records;
mod sessions;

pub use describe::describe_api;
pub use keys::{list_keys, revoke_key, store_key};
pub use records::{delete_record, get_record, put_record};
pub use sessions::{
    append_turn, close_session, create_session, delete_session, get_session, list_sessions,
    list_turns, update_context,
};
