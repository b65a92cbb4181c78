/*!
    Video filter chain: frame-rate conversion, timestamp rescale, and
    downscaling between one decoder and its derived encoder.
*/

use ffmpeg_next::{
    Rational,
    codec::{decoder, encoder},
    ffi, filter,
};

use vidfrag_types::{Error, Result};

use crate::graph::{StreamFilter, find_filter};

/**
    Timestamp multiplier applied by `setpts` so that frames re-timed by
    the `fps` filter land on the encoder's time base: the source's
    ticks-per-frame stretched by the ratio of source to output frame
    rate.
*/
pub fn pts_scale(
    dec_frame_rate: Rational,
    dec_time_base: Rational,
    enc_frame_rate: Rational,
) -> f64 {
    let ticks_per_frame = (dec_frame_rate * dec_time_base).invert();
    let stretch = f64::from(dec_frame_rate.numerator()) / f64::from(enc_frame_rate.numerator());
    f64::from(ticks_per_frame.numerator()) / f64::from(ticks_per_frame.denominator()) * stretch
}

/**
    The video chain description. `fps` must come first: placed after
    `setpts` it silently stops re-timing frames.
*/
pub fn video_filter_spec(
    enc_frame_rate: Rational,
    pts_scale: f64,
    width: u32,
    height: u32,
) -> String {
    format!(
        "fps={},setpts=PTS*{:.6},scale={}:{}",
        enc_frame_rate.numerator(),
        pts_scale,
        width,
        height
    )
}

/**
    Build and validate the filter graph for one video stream.

    `dec_time_base` and `dec_frame_rate` come from the container (the
    decoder context does not carry them after a parameters-only open).
*/
pub fn video_filter(
    decoder: &decoder::Video,
    encoder: &encoder::Video,
    dec_time_base: Rational,
    dec_frame_rate: Rational,
    enc_frame_rate: Rational,
    stream: usize,
) -> Result<StreamFilter> {
    let mut graph = filter::Graph::new();

    let args = format!(
        "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect={}/{}",
        decoder.width(),
        decoder.height(),
        ffi::AVPixelFormat::from(decoder.format()) as i32,
        dec_time_base.numerator(),
        dec_time_base.denominator(),
        decoder.aspect_ratio().numerator(),
        decoder.aspect_ratio().denominator(),
    );
    graph
        .add(&find_filter("buffer", stream)?, "in", &args)
        .map_err(|e| Error::filter_setup(stream, e.to_string()))?;
    graph
        .add(&find_filter("buffersink", stream)?, "out", "")
        .map_err(|e| Error::filter_setup(stream, e.to_string()))?;

    graph
        .get("out")
        .ok_or_else(|| Error::filter_setup(stream, "sink endpoint missing"))?
        .set_pixel_format(encoder.format());

    let spec = video_filter_spec(
        enc_frame_rate,
        pts_scale(dec_frame_rate, dec_time_base, enc_frame_rate),
        encoder.width(),
        encoder.height(),
    );
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
    fn fps_precedes_setpts_in_the_chain() {
        let spec = video_filter_spec(Rational::new(11, 1), 0.5, 426, 320);
        let fps_at = spec.find("fps=").unwrap();
        let setpts_at = spec.find("setpts=").unwrap();
        assert!(fps_at < setpts_at);
        assert_eq!(spec, "fps=11,setpts=PTS*0.500000,scale=426:320");
    }

    #[test]
    fn pts_scale_stretches_by_the_frame_rate_ratio() {
        // 25 fps source in a 1/12800 time base: 512 ticks per frame,
        // stretched by 25/11 for the slower output rate.
        let scale = pts_scale(
            Rational::new(25, 1),
            Rational::new(1, 12800),
            Rational::new(11, 1),
        );
        assert!((scale - 512.0 * 25.0 / 11.0).abs() < 1e-9);
    }
}
