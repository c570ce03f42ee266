//! Splitter contract models.

pub use address::*;
pub use contract::*;
pub use message::*;
pub use records::*;
pub use text::*;

pub mod address;
pub mod contract;
pub mod message;
pub mod records;
pub mod text;

#[cfg(test)]
mod tests;
