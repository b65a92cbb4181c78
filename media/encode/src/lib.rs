/*!
    Encoder derivation for transcoded streams.
*/

mod derive;
mod policy;

pub use derive::{derive_audio_encoder, derive_video_encoder};
pub use policy::TranscodePolicy;
