use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;

use crate::pipeline;

#[derive(Parser, Debug)]
#[command(name = "vidfrag")]
#[command(about = "Transcode a partially-available media file into a single container \
                   or a promoted HLS segment sequence")]
pub struct Args {
    /// Partially-available source container
    pub input: PathBuf,

    /// Destination: a file path for direct output, a directory for segments
    pub output: PathBuf,

    /// Maximum number of packets to pull from the demuxer
    pub packet_budget: usize,
}

impl Args {
    pub fn run(self) -> Result<()> {
        if self.packet_budget == 0 {
            anyhow::bail!("packet budget must be positive");
        }
        let segmented = is_segmented_destination(&self.output);
        pipeline::run(&self.input, &self.output, segmented, self.packet_budget)?;
        Ok(())
    }
}

/// An existing directory, or a path with no extension, means segments.
fn is_segmented_destination(path: &Path) -> bool {
    path.is_dir() || path.extension().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensionless_paths_select_the_segmented_sink() {
        assert!(is_segmented_destination(Path::new("out/stream")));
        assert!(!is_segmented_destination(Path::new("out/clip.mp4")));
    }
}
