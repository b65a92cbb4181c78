/*!
    Segment promotion.

    The segmented muxer writes everything into a staging directory.
    Nothing is promoted to the destination until the manifest appears
    (the muxer writes it only once the stream is complete); from then on
    init segment and manifest move exactly once, and segment files move
    by rename in index order, never twice.
*/

use std::fs;
use std::path::{Path, PathBuf};

use vidfrag_types::Result;

/// Staging directory the segmented muxer writes into.
pub const STAGING_DIR: &str = "tmp_hls_seg/version0";

/// Filename prefix of every media segment.
pub const SEGMENT_PREFIX: &str = "data_seg_";

/// Playlist written by the muxer when the stream is complete.
pub const MANIFEST_NAME: &str = "mystream.m3u8";

/// Initialization segment holding the stream headers.
pub const INIT_NAME: &str = "init_packet_map";

/// Segment filename for one index, `data_seg_007` style.
pub fn segment_name(index: usize) -> String {
    format!("{SEGMENT_PREFIX}{index:03}")
}

/// Parse a segment index out of a staging filename.
fn segment_number(name: &str) -> Option<usize> {
    name.strip_prefix(SEGMENT_PREFIX)?.parse().ok()
}

/**
    Tracks which staging files have already been moved to the
    destination, so repeated scans after every pump cycle never promote
    a file twice.
*/
pub struct SegmentPromoter {
    staging: PathBuf,
    dst: PathBuf,
    /// Lowest segment index not yet promoted.
    promoted_through: usize,
    manifest_moved: bool,
}

impl SegmentPromoter {
    pub fn new(staging: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Self {
        Self {
            staging: staging.into(),
            dst: dst.into(),
            promoted_through: 0,
            manifest_moved: false,
        }
    }

    /// Lowest segment index not yet promoted.
    pub fn promoted_through(&self) -> usize {
        self.promoted_through
    }

    /**
        Scan the staging directory and move whatever is ready.

        Before the manifest exists nothing moves: segment boundaries are
        not trustworthy until the muxer has finalized the stream. Once
        it appears, the init segment and manifest move exactly once,
        then every segment up to the highest index present.
    */
    pub fn promote(&mut self) -> Result<()> {
        let mut max_present: Option<usize> = None;
        for entry in fs::read_dir(&self.staging)? {
            let entry = entry?;
            if let Some(n) = segment_number(&entry.file_name().to_string_lossy()) {
                max_present = Some(max_present.map_or(n, |m| m.max(n)));
            }
        }
        let Some(max_present) = max_present else {
            return Ok(());
        };
        if !self.staging.join(MANIFEST_NAME).exists() && !self.manifest_moved {
            return Ok(());
        }

        if !self.manifest_moved {
            self.move_to_dst(INIT_NAME)?;
            self.move_to_dst(MANIFEST_NAME)?;
            self.manifest_moved = true;
        }
        for index in self.promoted_through..=max_present {
            let name = segment_name(index);
            // Gaps can appear when an earlier flush raced the muxer.
            if self.staging.join(&name).exists() {
                self.move_to_dst(&name)?;
            }
        }
        self.promoted_through = self.promoted_through.max(max_present + 1);
        Ok(())
    }

    fn move_to_dst(&self, name: &str) -> Result<()> {
        fs::rename(self.staging.join(name), self.dst.join(name))?;
        Ok(())
    }
}

/// Create a directory tree, rejecting an existing non-directory path.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            format!("{} exists and is not a directory", path.display()),
        )
        .into());
    }
    fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut out: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn nothing_moves_before_the_manifest_appears() {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("staging");
        let dst = root.path().join("dst");
        fs::create_dir_all(&staging).unwrap();
        fs::create_dir_all(&dst).unwrap();
        for i in 0..4 {
            touch(&staging, &segment_name(i));
        }

        let mut promoter = SegmentPromoter::new(&staging, &dst);
        promoter.promote().unwrap();
        assert!(names(&dst).is_empty());
        assert_eq!(promoter.promoted_through(), 0);
    }

    #[test]
    fn manifest_unlocks_init_manifest_and_all_segments() {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("staging");
        let dst = root.path().join("dst");
        fs::create_dir_all(&staging).unwrap();
        fs::create_dir_all(&dst).unwrap();
        for i in 0..4 {
            touch(&staging, &segment_name(i));
        }
        touch(&staging, INIT_NAME);
        touch(&staging, MANIFEST_NAME);

        let mut promoter = SegmentPromoter::new(&staging, &dst);
        promoter.promote().unwrap();

        assert_eq!(
            names(&dst),
            vec![
                "data_seg_000",
                "data_seg_001",
                "data_seg_002",
                "data_seg_003",
                INIT_NAME,
                MANIFEST_NAME,
            ]
        );
        assert_eq!(promoter.promoted_through(), 4);
    }

    #[test]
    fn a_late_segment_moves_alone() {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("staging");
        let dst = root.path().join("dst");
        fs::create_dir_all(&staging).unwrap();
        fs::create_dir_all(&dst).unwrap();
        touch(&staging, &segment_name(0));
        touch(&staging, INIT_NAME);
        touch(&staging, MANIFEST_NAME);

        let mut promoter = SegmentPromoter::new(&staging, &dst);
        promoter.promote().unwrap();
        let before = names(&dst).len();

        touch(&staging, &segment_name(4));
        promoter.promote().unwrap();
        assert_eq!(names(&dst).len(), before + 1);
        assert!(dst.join("data_seg_004").exists());
        assert_eq!(promoter.promoted_through(), 5);

        // A repeated scan with nothing new is a no-op.
        promoter.promote().unwrap();
        assert_eq!(names(&dst).len(), before + 1);
    }

    #[test]
    fn ensure_dir_rejects_a_plain_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("occupied");
        File::create(&file).unwrap();
        assert!(ensure_dir(&file).is_err());

        let dir = root.path().join("a/b/c");
        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
