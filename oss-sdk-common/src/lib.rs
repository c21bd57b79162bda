//! Helpers shared by the OSS signers and request pipeline.

pub mod error;
pub mod helper;

pub use error::Error;
