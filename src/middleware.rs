pub mod guard;
pub use guard::{AuthContext, Guarded};
pub mod session;
