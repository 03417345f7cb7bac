//! CLI commands implementation

pub mod compare;
pub mod init;
pub mod release;
pub mod status;
pub mod sync;

pub use compare::*;
pub use init::*;
pub use release::*;
pub use status::*;
pub use sync::*;
