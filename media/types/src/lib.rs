/*!
    Shared types for the vidfrag transcoding pipeline.

    This crate defines the vocabulary that crosses crate boundaries — the
    error model and stream classification. It has no dependency on FFmpeg,
    so downstream consumers can name pipeline errors without pulling in
    the bindings.
*/

mod error;
mod stream;

pub use error::{Error, Result};
pub use stream::StreamKind;
