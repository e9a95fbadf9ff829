//! Chart types and payload validation
//!
//! Every producer push is checked against the payload shape of its chart type
//! before it reaches the registry. The set of chart types is closed; each one
//! maps to exactly one [`PayloadShape`].

pub mod kind;
pub mod payload;
pub mod validate;

pub use kind::{ChartType, PayloadShape};
pub use payload::Payload;
pub use validate::{is_valid_payload, validate, ValidationError};
