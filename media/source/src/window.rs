/*!
    Chunked read window over a partially-available source.

    The demuxer never sees the source file directly: its reads are
    serviced by [`read_source`], an AVIO callback backed by a
    [`SourceWindow`]. While the structural header is being parsed the
    window hands out bytes from the staged header copy; afterwards it
    serves a bounded in-memory slice of the payload that the caller
    refills chunk by chunk.
*/

use std::fs::File;
use std::io::{self, Read};
use std::os::raw::{c_int, c_void};

use ffmpeg_next::ffi;

/**
    The source descriptor: the open input file, the staged-header scratch
    file (present only until the demuxer has parsed the header), and the
    fixed-size working buffer with its current read window.

    Invariant: `pos <= len <= buf.len()`. Once `remaining()` hits zero a
    refill must happen before further reads succeed.
*/
pub struct SourceWindow {
    file: File,
    staged: Option<File>,
    buf: Vec<u8>,
    pos: usize,
    len: usize,
    consumed: u64,
}

impl SourceWindow {
    /**
        Create a window in header-staging mode. The working buffer is
        allocated later, once the probe size is known.
    */
    pub fn new(file: File, staged: File) -> Self {
        Self {
            file,
            staged: Some(staged),
            buf: Vec::new(),
            pos: 0,
            len: 0,
            consumed: 0,
        }
    }

    /**
        Leave header-staging mode and allocate the working buffer.
        `capacity` is the probe size computed from the sample index.
    */
    pub fn into_payload_mode(&mut self, capacity: usize) {
        self.staged = None;
        self.buf = vec![0u8; capacity];
        self.pos = 0;
        self.len = 0;
    }

    /// Bytes still readable without a refill.
    pub fn remaining(&self) -> usize {
        self.len - self.pos
    }

    /// Size of the working buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Total payload bytes handed to the demuxer so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /**
        Re-read up to the working-buffer size from the source and reset
        the window. Returns the number of bytes now resident; zero means
        end of input.
    */
    pub fn refill(&mut self) -> io::Result<usize> {
        let n = self.file.read(&mut self.buf)?;
        self.pos = 0;
        self.len = n;
        Ok(n)
    }

    /**
        Read `dst.len()` bytes from the source file at its current
        cursor, bypassing the window. Used by packet recovery to fetch
        the tail of a truncated sample.
    */
    pub fn read_tail(&mut self, dst: &mut [u8]) -> io::Result<()> {
        self.file.read_exact(dst)
    }

    /**
        Service one demuxer read. In staging mode this reads from the
        staged header file; in payload mode it copies out of the current
        window. Returns `Ok(0)` when the window (or staged header) is
        exhausted.
    */
    fn fill(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if let Some(staged) = self.staged.as_mut() {
            return staged.read(dst);
        }
        let n = dst.len().min(self.remaining());
        if n > 0 {
            dst[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            self.consumed += n as u64;
        }
        Ok(n)
    }
}

/**
    AVIO read callback. `opaque` is a pointer to the [`SourceWindow`]
    owned (boxed, address-stable) by the input context wrapper.
*/
pub(crate) unsafe extern "C" fn read_source(
    opaque: *mut c_void,
    buf: *mut u8,
    buf_size: c_int,
) -> c_int {
    if opaque.is_null() || buf.is_null() || buf_size <= 0 {
        return ffi::AVERROR_EXTERNAL;
    }
    let window = unsafe { &mut *(opaque as *mut SourceWindow) };
    let dst = unsafe { std::slice::from_raw_parts_mut(buf, buf_size as usize) };
    match window.fill(dst) {
        Ok(0) => ffi::AVERROR_EOF,
        Ok(n) => n as c_int,
        Err(_) => ffi::AVERROR_EXTERNAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write};

    fn file_with(bytes: &[u8]) -> File {
        let mut f = tempfile::tempfile().unwrap();
        f.write_all(bytes).unwrap();
        f.seek(SeekFrom::Start(0)).unwrap();
        f
    }

    #[test]
    fn staged_mode_reads_the_header_copy() {
        let src = file_with(&[0xAA; 4]);
        let staged = file_with(b"header");
        let mut window = SourceWindow::new(src, staged);

        let mut dst = [0u8; 16];
        assert_eq!(window.fill(&mut dst).unwrap(), 6);
        assert_eq!(&dst[..6], b"header");
        assert_eq!(window.fill(&mut dst).unwrap(), 0);
    }

    #[test]
    fn payload_mode_is_bounded_by_the_window() {
        let src = file_with(&[7u8; 10]);
        let staged = file_with(&[]);
        let mut window = SourceWindow::new(src, staged);
        window.into_payload_mode(4);

        assert_eq!(window.refill().unwrap(), 4);
        assert_eq!(window.remaining(), 4);

        let mut dst = [0u8; 3];
        assert_eq!(window.fill(&mut dst).unwrap(), 3);
        assert_eq!(window.remaining(), 1);
        assert_eq!(window.fill(&mut dst).unwrap(), 1);
        // Window exhausted; a refill is required before further reads.
        assert_eq!(window.fill(&mut dst).unwrap(), 0);

        assert_eq!(window.refill().unwrap(), 4);
        assert_eq!(window.refill().unwrap(), 2);
        assert_eq!(window.refill().unwrap(), 0);
        assert_eq!(window.consumed(), 4);
    }

    #[test]
    fn read_tail_bypasses_the_window() {
        let src = file_with(&[1, 2, 3, 4, 5, 6]);
        let staged = file_with(&[]);
        let mut window = SourceWindow::new(src, staged);
        window.into_payload_mode(2);
        window.refill().unwrap();

        // The file cursor sits after the refilled bytes.
        let mut tail = [0u8; 2];
        window.read_tail(&mut tail).unwrap();
        assert_eq!(tail, [3, 4]);
    }
}
