/*!
    Segmented (HLS-style) output sink.
*/

use std::path::{Path, PathBuf};

use ffmpeg_next::{Dictionary, format};

use vidfrag_types::{Error, Result};

use crate::OutputSink;
use crate::promote::{
    INIT_NAME, MANIFEST_NAME, SEGMENT_PREFIX, STAGING_DIR, SegmentPromoter, ensure_dir,
};

/**
    Muxes into fixed-duration fMP4 segments under a staging directory,
    promoting finished files into the destination directory after every
    pump cycle. See [`SegmentPromoter`] for the promotion rules.
*/
pub struct SegmentedSink {
    output: format::context::Output,
    promoter: SegmentPromoter,
}

impl SegmentedSink {
    /// Create the staging and destination directories and the muxer.
    pub fn create(dst: &Path) -> Result<Self> {
        let staging = PathBuf::from(STAGING_DIR);
        ensure_dir(&staging)?;
        ensure_dir(dst)?;

        let manifest = staging.join(MANIFEST_NAME);
        let output =
            format::output_as(&manifest, "hls").map_err(|e| Error::codec(e.to_string()))?;
        Ok(Self {
            output,
            promoter: SegmentPromoter::new(staging, dst),
        })
    }
}

impl OutputSink for SegmentedSink {
    fn output(&mut self) -> &mut format::context::Output {
        &mut self.output
    }

    fn write_header(&mut self) -> Result<()> {
        let mut options = Dictionary::new();
        options.set("hls_playlist_type", "2"); // vod
        options.set("hls_segment_type", "1"); // fmp4
        options.set("hls_time", "7");
        options.set("hls_delete_threshold", "2");
        options.set(
            "hls_segment_filename",
            &format!("{STAGING_DIR}/{SEGMENT_PREFIX}%03d"),
        );
        options.set("hls_fmp4_init_filename", INIT_NAME);
        self.output
            .write_header_with(options)
            .map(|_| ())
            .map_err(|e| Error::codec(e.to_string()))
    }

    fn flush(&mut self) -> Result<()> {
        self.promoter.promote()
    }

    fn close(&mut self) -> Result<()> {
        self.output
            .write_trailer()
            .map_err(|e| Error::codec(e.to_string()))?;
        // The manifest lands on the trailer write; one last scan moves
        // it and the tail segments out.
        self.promoter.promote()
    }
}
