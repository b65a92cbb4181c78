/*!
    Stream classification.
*/

/**
    The media kind of one elementary stream.

    Video and audio streams are decoded, filtered, and re-encoded; `Other`
    streams (subtitles, data tracks) are passed through with their
    parameters copied. A stream whose kind cannot be determined at all is
    a fatal setup error, so no variant exists for it.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
    /// Neither video nor audio; muxed through without transcoding.
    Other,
}

impl StreamKind {
    /// Returns true for kinds that get a decode/filter/encode chain.
    pub const fn is_transcoded(self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_av_streams_are_transcoded() {
        assert!(StreamKind::Video.is_transcoded());
        assert!(StreamKind::Audio.is_transcoded());
        assert!(!StreamKind::Other.is_transcoded());
    }
}
