/*!
    Audio filter chain: a single `aresample` onto the encoder's rate.
*/

use ffmpeg_next::{
    Rational,
    codec::{decoder, encoder},
    filter,
};

use vidfrag_types::{Error, Result};

use crate::graph::{StreamFilter, find_filter};

/// The audio chain description.
pub fn audio_filter_spec(sample_rate: i32) -> String {
    format!("aresample={sample_rate}")
}

/**
    Build and validate the filter graph for one audio stream. The sink
    is constrained to the encoder's sample format, layout, and rate so
    pulled frames can be sent to it directly.
*/
pub fn audio_filter(
    decoder: &decoder::Audio,
    encoder: &encoder::Audio,
    dec_time_base: Rational,
    stream: usize,
) -> Result<StreamFilter> {
    let mut graph = filter::Graph::new();

    let args = format!(
        "time_base={}/{}:sample_rate={}:sample_fmt={}:channel_layout={}c",
        dec_time_base.numerator(),
        dec_time_base.denominator(),
        decoder.rate(),
        decoder.format().name(),
        decoder.channels(),
    );
    graph
        .add(&find_filter("abuffer", stream)?, "in", &args)
        .map_err(|e| Error::filter_setup(stream, e.to_string()))?;
    graph
        .add(&find_filter("abuffersink", stream)?, "out", "")
        .map_err(|e| Error::filter_setup(stream, e.to_string()))?;

    {
        let mut out = graph
            .get("out")
            .ok_or_else(|| Error::filter_setup(stream, "sink endpoint missing"))?;
        out.set_sample_format(encoder.format());
        out.set_channel_layout(encoder.channel_layout());
        out.set_sample_rate(encoder.rate());
    }

    let spec = audio_filter_spec(encoder.rate() as i32);
    graph
        .output("in", 0)
        .and_then(|o| o.input("out", 0))
        .and_then(|i| i.parse(&spec))
        .map_err(|e| Error::filter_setup(stream, e.to_string()))?;
    graph
        .validate()
        .map_err(|e| Error::filter_setup(stream, e.to_string()))?;

    Ok(StreamFilter::new(graph, stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_is_a_single_resample() {
        assert_eq!(audio_filter_spec(44_100), "aresample=44100");
    }
}
