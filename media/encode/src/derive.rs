/*!
    Encoder derivation.

    Each transcoded stream gets an encoder of the same codec family as
    its decoder, configured from the decoder's parameters bent through
    the [`TranscodePolicy`] rather than copied verbatim.
*/

use ffmpeg_next::{
    Rational,
    codec::{self, decoder, encoder},
};

use vidfrag_types::{Error, Result};

use crate::policy::TranscodePolicy;

/**
    Build and open a video encoder matching `decoder`'s codec.

    Dimensions are scaled by the policy; the pixel format is the
    encoder's first supported one, falling back to the decoder's own
    format when the codec does not advertise any. `time_base` is the
    source stream's: the video filter chain emits timestamps in source
    ticks, so the encoder must keep counting in them.
*/
pub fn derive_video_encoder(
    decoder: &decoder::Video,
    policy: &TranscodePolicy,
    time_base: Rational,
    stream: usize,
) -> Result<encoder::Video> {
    let codec = ffmpeg_next::encoder::find(decoder.id()).ok_or(Error::MissingEncoder { stream })?;
    let mut video = codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .map_err(|e| Error::codec(e.to_string()))?;

    let (width, height) = policy.scaled_dimensions(decoder.width(), decoder.height());
    video.set_width(width);
    video.set_height(height);
    video.set_aspect_ratio(decoder.aspect_ratio());

    let format = codec
        .video()
        .ok()
        .and_then(|caps| caps.formats().and_then(|mut formats| formats.next()))
        .unwrap_or_else(|| decoder.format());
    video.set_format(format);

    video.set_frame_rate(Some(policy.video_frame_rate));
    video.set_time_base(time_base);

    video.open().map_err(|e| Error::codec(e.to_string()))
}

/**
    Build and open an audio encoder matching `decoder`'s codec.

    The channel layout is carried over from the source; sample rate and
    bitrate come from the policy, and the sample format is the encoder's
    first supported one.
*/
pub fn derive_audio_encoder(
    decoder: &decoder::Audio,
    policy: &TranscodePolicy,
    stream: usize,
) -> Result<encoder::Audio> {
    let codec = ffmpeg_next::encoder::find(decoder.id()).ok_or(Error::MissingEncoder { stream })?;
    let mut audio = codec::context::Context::new_with_codec(codec)
        .encoder()
        .audio()
        .map_err(|e| Error::codec(e.to_string()))?;

    audio.set_rate(policy.audio_sample_rate);
    audio.set_channel_layout(decoder.channel_layout());

    let format = codec
        .audio()
        .ok()
        .and_then(|caps| caps.formats().and_then(|mut formats| formats.next()))
        .unwrap_or_else(|| decoder.format());
    audio.set_format(format);

    audio.set_bit_rate(policy.audio_bit_rate);
    audio.set_time_base(Rational::new(1, policy.audio_sample_rate));

    audio.open().map_err(|e| Error::codec(e.to_string()))
}
