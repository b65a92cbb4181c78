/*!
    Single-file output sink.
*/

use std::path::Path;

use ffmpeg_next::format;

use vidfrag_types::{Error, Result};

use crate::OutputSink;

/**
    Muxes the whole result into one container file. The muxer is picked
    from the demuxer's name: the first comma-separated token of a name
    like `"mov,mp4,m4a,3gp,3g2,mj2"` is a valid muxer name.
*/
pub struct DirectSink {
    output: format::context::Output,
}

impl DirectSink {
    /// Create the destination file (truncating any previous content).
    pub fn create(path: &Path, input_format_name: &str) -> Result<Self> {
        let muxer = input_format_name
            .split(',')
            .next()
            .filter(|token| !token.is_empty())
            .unwrap_or("mp4");
        let output = format::output_as(&path, muxer).map_err(|e| Error::codec(e.to_string()))?;
        Ok(Self { output })
    }
}

impl OutputSink for DirectSink {
    fn output(&mut self) -> &mut format::context::Output {
        &mut self.output
    }

    fn write_header(&mut self) -> Result<()> {
        self.output
            .write_header()
            .map_err(|e| Error::codec(e.to_string()))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.output
            .write_trailer()
            .map_err(|e| Error::codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn muxer_name_is_the_first_token() {
        let name = "mov,mp4,m4a,3gp,3g2,mj2";
        assert_eq!(name.split(',').next(), Some("mov"));
    }
}
