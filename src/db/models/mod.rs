//! Database models split into domain-specific modules.

pub mod common;
pub mod product;
pub mod pvz;
pub mod reception;
pub mod user;

pub use common::*;
pub use product::*;
pub use pvz::*;
pub use reception::*;
pub use user::*;
