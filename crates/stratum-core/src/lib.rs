//! stratum-core — shared types: the transformation engine, the wire codec,
//! configuration, and the error taxonomy. Every other Stratum crate depends
//! on this one.

pub mod config;
pub mod error;
pub mod transform;
pub mod wire;

pub use error::{Result, StratumError};
pub use transform::{Transformation, TransformationCaller, TransformationKind, TransformationMode};
pub use wire::{Message, MessageHeader, MessageType, WireError, WireTransformation};
