/*!
    Corrupt-packet recovery.

    When the read window runs dry mid-sample the demuxer emits a short
    packet flagged corrupt. The sample index still knows the sample's
    true size, so the missing tail can be fetched straight from the
    source file (whose cursor sits exactly at the first missing byte)
    and appended to the packet.
*/

use std::os::raw::c_int;

use ffmpeg_next::{Packet, ffi, packet::Mut as PacketMut};

use vidfrag_types::{Error, Result};

use crate::input::FragmentedInput;

/// One sample-index entry: byte position in the file and true size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub pos: i64,
    pub size: i64,
}

/**
    Find the first index entry at or after `start` whose file position
    matches `target_pos`. The cursor keeps the scan monotonic per stream:
    packets arrive in index order, so entries behind the cursor never
    match again.
*/
pub(crate) fn find_entry(
    lookup: impl Fn(usize) -> Option<IndexEntry>,
    len: usize,
    target_pos: i64,
    start: usize,
) -> Option<usize> {
    (start..len).find(|&idx| lookup(idx).is_some_and(|e| e.pos == target_pos))
}

impl FragmentedInput {
    /**
        Restore a truncated packet to its indexed size.

        `cursor` is the caller's per-stream recovery cursor (index of the
        last recovered entry plus one, initially zero). On success the
        packet holds the full sample, its corrupt flag is cleared, and
        the matched entry index is returned so the caller can advance the
        cursor past it.
    */
    pub fn repair_packet(&mut self, packet: &mut Packet, cursor: usize) -> Result<usize> {
        let stream = packet.stream();
        let pos = packet.position() as i64;

        let len = self.index_len(stream);
        let matched = find_entry(|idx| self.index_entry(stream, idx), len, pos, cursor)
            .ok_or(Error::UnrecoverablePacket { stream, pos })?;
        let entry = self
            .index_entry(stream, matched)
            .ok_or(Error::UnrecoverablePacket { stream, pos })?;

        let shortfall = entry.size - packet.size() as i64;
        if shortfall > 0 {
            let old_len = packet.size();
            unsafe {
                let raw = packet.as_mut_ptr();
                if ffi::av_grow_packet(raw, shortfall as c_int) < 0 {
                    return Err(Error::Allocation("packet growth"));
                }
                let tail =
                    std::slice::from_raw_parts_mut((*raw).data.add(old_len), shortfall as usize);
                self.window_mut().read_tail(tail)?;
            }
            // The tail bytes were consumed outside the AVIO window.
            self.bump_logical_pos(shortfall);
        }

        unsafe {
            (*packet.as_mut_ptr()).flags &= !ffi::AV_PKT_FLAG_CORRUPT;
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(entries: &[(i64, i64)]) -> Vec<IndexEntry> {
        entries
            .iter()
            .map(|&(pos, size)| IndexEntry { pos, size })
            .collect()
    }

    #[test]
    fn finds_the_entry_matching_a_file_position() {
        let idx = index(&[(0, 10), (10, 20), (30, 5)]);
        let found = find_entry(|i| idx.get(i).copied(), idx.len(), 10, 0);
        assert_eq!(found, Some(1));
    }

    #[test]
    fn cursor_skips_already_recovered_entries() {
        // Two samples at the same position (e.g. after an edit list);
        // the cursor must land on the second one the second time around.
        let idx = index(&[(0, 10), (40, 8), (40, 12)]);
        assert_eq!(find_entry(|i| idx.get(i).copied(), idx.len(), 40, 0), Some(1));
        assert_eq!(find_entry(|i| idx.get(i).copied(), idx.len(), 40, 2), Some(2));
    }

    #[test]
    fn unmatched_position_is_none() {
        let idx = index(&[(0, 10), (10, 20)]);
        assert_eq!(find_entry(|i| idx.get(i).copied(), idx.len(), 99, 0), None);
        // Behind the cursor never matches again.
        assert_eq!(find_entry(|i| idx.get(i).copied(), idx.len(), 0, 1), None);
    }
}
