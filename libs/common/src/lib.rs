pub mod id;

pub use id::{PrefixedId, SessionId};
