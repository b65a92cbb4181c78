/*!
    Per-stream codec state and output-stream wiring.
*/

use ffmpeg_next::{
    Rational,
    codec::{self, decoder, encoder},
    format, media,
};

use vidfrag_encode::{TranscodePolicy, derive_audio_encoder, derive_video_encoder};
use vidfrag_source::FragmentedInput;
use vidfrag_transform::{StreamFilter, audio_filter, video_filter};
use vidfrag_types::{Error, Result, StreamKind};

/// Decode/encode pair for one stream, or its passthrough parameters.
pub enum StreamCodec {
    Video {
        decoder: decoder::Video,
        encoder: encoder::Video,
    },
    Audio {
        decoder: decoder::Audio,
        encoder: encoder::Audio,
    },
    Passthrough {
        parameters: codec::Parameters,
    },
}

impl StreamCodec {
    pub fn send_packet(
        &mut self,
        packet: &ffmpeg_next::Packet,
    ) -> std::result::Result<(), ffmpeg_next::Error> {
        match self {
            Self::Video { decoder, .. } => decoder.send_packet(packet),
            Self::Audio { decoder, .. } => decoder.send_packet(packet),
            Self::Passthrough { .. } => Err(ffmpeg_next::Error::Unknown),
        }
    }

    pub fn receive_frame(
        &mut self,
        frame: &mut ffmpeg_next::Frame,
    ) -> std::result::Result<(), ffmpeg_next::Error> {
        match self {
            Self::Video { decoder, .. } => decoder.receive_frame(frame),
            Self::Audio { decoder, .. } => decoder.receive_frame(frame),
            Self::Passthrough { .. } => Err(ffmpeg_next::Error::Unknown),
        }
    }

    pub fn send_frame(
        &mut self,
        frame: &ffmpeg_next::Frame,
    ) -> std::result::Result<(), ffmpeg_next::Error> {
        match self {
            Self::Video { encoder, .. } => encoder.send_frame(frame),
            Self::Audio { encoder, .. } => encoder.send_frame(frame),
            Self::Passthrough { .. } => Err(ffmpeg_next::Error::Unknown),
        }
    }

    pub fn send_eof(&mut self) -> std::result::Result<(), ffmpeg_next::Error> {
        match self {
            Self::Video { encoder, .. } => encoder.send_eof(),
            Self::Audio { encoder, .. } => encoder.send_eof(),
            Self::Passthrough { .. } => Ok(()),
        }
    }

    pub fn receive_packet(
        &mut self,
        packet: &mut ffmpeg_next::Packet,
    ) -> std::result::Result<(), ffmpeg_next::Error> {
        match self {
            Self::Video { encoder, .. } => encoder.receive_packet(packet),
            Self::Audio { encoder, .. } => encoder.receive_packet(packet),
            Self::Passthrough { .. } => Err(ffmpeg_next::Error::Eof),
        }
    }
}

/**
    Everything the pump needs to know about one elementary stream.

    `time_base` is the source stream's; `enc_time_base` is what the
    encoder counts in (the source base again for video, one over the
    output sample rate for audio). The recovery cursor is the index of
    the first sample-index entry not yet matched during packet repair.
*/
pub struct StreamContext {
    pub kind: StreamKind,
    pub codec: StreamCodec,
    pub filter: Option<StreamFilter>,
    pub time_base: Rational,
    pub enc_time_base: Rational,
    pub recovery_cursor: usize,
    /// Set when the decoder rejects a packet; the stream stops there.
    pub dead: bool,
}

/**
    Open a decoder, derive an encoder, and build the filter graph for
    every stream of the input. Any failure here is fatal to the run.
*/
pub fn build_streams(
    input: &FragmentedInput,
    policy: &TranscodePolicy,
) -> Result<Vec<StreamContext>> {
    let mut streams = Vec::with_capacity(input.nb_streams());
    for index in 0..input.nb_streams() {
        let parameters = input.stream_parameters(index)?;
        let time_base = input.stream_time_base(index);
        let context = codec::Context::from_parameters(parameters.clone())
            .map_err(|e| Error::codec(e.to_string()))?;

        let (kind, codec, filter, enc_time_base) = match context.medium() {
            media::Type::Video => {
                let decoder = context
                    .decoder()
                    .video()
                    .map_err(|e| decoder_error(e, index))?;
                let frame_rate = input.guess_frame_rate(index);
                let encoder = derive_video_encoder(&decoder, policy, time_base, index)?;
                let filter = video_filter(
                    &decoder,
                    &encoder,
                    time_base,
                    frame_rate,
                    policy.video_frame_rate,
                    index,
                )?;
                (
                    StreamKind::Video,
                    StreamCodec::Video { decoder, encoder },
                    Some(filter),
                    time_base,
                )
            }
            media::Type::Audio => {
                let decoder = context
                    .decoder()
                    .audio()
                    .map_err(|e| decoder_error(e, index))?;
                let encoder = derive_audio_encoder(&decoder, policy, index)?;
                let filter = audio_filter(&decoder, &encoder, time_base, index)?;
                (
                    StreamKind::Audio,
                    StreamCodec::Audio { decoder, encoder },
                    Some(filter),
                    Rational::new(1, policy.audio_sample_rate),
                )
            }
            media::Type::Unknown => {
                return Err(Error::UnclassifiableStream { stream: index });
            }
            _ => (
                StreamKind::Other,
                StreamCodec::Passthrough { parameters },
                None,
                time_base,
            ),
        };

        streams.push(StreamContext {
            kind,
            codec,
            filter,
            time_base,
            enc_time_base,
            recovery_cursor: 0,
            dead: false,
        });
    }
    Ok(streams)
}

fn decoder_error(e: ffmpeg_next::Error, stream: usize) -> Error {
    match e {
        ffmpeg_next::Error::DecoderNotFound => Error::MissingDecoder { stream },
        e => Error::codec(e.to_string()),
    }
}

/**
    Mirror the input's stream table onto the output: transcoded streams
    carry their encoder's parameters and time base, everything else gets
    the source parameters copied through.
*/
pub fn setup_output_streams(
    output: &mut format::context::Output,
    streams: &[StreamContext],
) -> Result<()> {
    for (index, sctx) in streams.iter().enumerate() {
        match &sctx.codec {
            StreamCodec::Video { encoder, .. } => {
                let codec = encoder.codec().ok_or(Error::MissingEncoder { stream: index })?;
                let mut ost = output
                    .add_stream(codec)
                    .map_err(|e| Error::codec(e.to_string()))?;
                ost.set_parameters(encoder);
                ost.set_time_base(sctx.enc_time_base);
            }
            StreamCodec::Audio { encoder, .. } => {
                let codec = encoder.codec().ok_or(Error::MissingEncoder { stream: index })?;
                let mut ost = output
                    .add_stream(codec)
                    .map_err(|e| Error::codec(e.to_string()))?;
                ost.set_parameters(encoder);
                ost.set_time_base(sctx.enc_time_base);
            }
            StreamCodec::Passthrough { parameters } => {
                let mut ost = output
                    .add_stream(ffmpeg_next::encoder::find(codec::Id::None))
                    .map_err(|e| Error::codec(e.to_string()))?;
                ost.set_parameters(parameters.clone());
                ost.set_time_base(sctx.time_base);
            }
        }
    }
    Ok(())
}
