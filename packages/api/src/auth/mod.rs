//! Identity providers: the hosted auth service and a local stand-in.

mod gotrue;
mod local;
mod password;

pub use gotrue::GoTrueIdentity;
pub use local::LocalIdentity;
pub use password::{hash_password, verify_password};
