//! Embedding encoders: the shared contract, a process-backed implementation
//! and the single-query adapter.

pub mod command;
pub mod encoder;
pub mod query;

pub use command::CommandEncoder;
pub use encoder::{EncodeInput, Encoder, MockEncoder};
pub use query::QueryEncoder;
