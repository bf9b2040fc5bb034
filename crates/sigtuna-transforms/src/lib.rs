#![forbid(unsafe_code)]

//! Reference transform chain for sigtuna.
//!
//! Each `<ds:Reference>` names a sequence of transforms that turn the
//! referenced node set into the octets that get digested.

pub mod enveloped;
pub mod pipeline;
pub mod uri;

pub use pipeline::{C14nTransform, Transform, TransformData, TransformPipeline};
