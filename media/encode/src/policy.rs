/*!
    Transcode policy.
*/

use ffmpeg_next::Rational;

/**
    Output parameters applied uniformly to every transcoded stream.

    The defaults favour a small, quickly produced rendition of a
    fragmented upload rather than a faithful one: a low fixed frame
    rate, frames scaled down by two thirds, and a modest audio bitrate.
*/
#[derive(Clone, Copy, Debug)]
pub struct TranscodePolicy {
    /// Output video frame rate; also fixes the video time base.
    pub video_frame_rate: Rational,
    /// Scaling factor applied to both frame dimensions.
    pub scale: Rational,
    /// Output audio sample rate in Hz; also fixes the audio time base.
    pub audio_sample_rate: i32,
    /// Output audio bitrate in bits per second.
    pub audio_bit_rate: usize,
}

impl Default for TranscodePolicy {
    fn default() -> Self {
        Self {
            video_frame_rate: Rational::new(11, 1),
            scale: Rational::new(2, 3),
            audio_sample_rate: 44_100,
            audio_bit_rate: 63_999,
        }
    }
}

impl TranscodePolicy {
    /**
        Scale source dimensions by the policy factor, masking each down
        to an even value as most planar pixel formats require.
    */
    pub fn scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let num = self.scale.numerator() as u32;
        let den = self.scale.denominator() as u32;
        (width * num / den & !1, height * num / den & !1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dimensions_are_two_thirds_and_even() {
        let policy = TranscodePolicy::default();
        assert_eq!(policy.scaled_dimensions(640, 480), (426, 320));
        // 500 * 2 / 3 = 333, masked down to 332.
        assert_eq!(policy.scaled_dimensions(500, 500), (332, 332));
    }

    #[test]
    fn default_rates() {
        let policy = TranscodePolicy::default();
        assert_eq!(policy.video_frame_rate, Rational::new(11, 1));
        assert_eq!(policy.audio_sample_rate, 44_100);
        assert_eq!(policy.audio_bit_rate, 63_999);
    }
}
