//! Object operations.

mod basic;
mod multipart;
mod types_rs;

pub use types_rs::*;
