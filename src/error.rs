//! Internal error types. Per spec.md 7, the public API degrades rather
//! than fails — `pipeline::decode_image` and `atlas::try_build_atlas` are
//! the only things that construct these, and both callers convert the
//! `Err` into the documented degrade-not-fail behavior (the sentinel CGP,
//! or an empty/invalid atlas) before it ever reaches a public entry
//! point.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not decode image")]
    DecodeFailed(#[from] image::ImageError),

    #[error("no usable font on the search path")]
    FontUnavailable,
}
