/*!
    Demuxer bring-up over a fragmented source.

    The input file is never handed to FFmpeg as a path. Instead the
    structural header is staged (payload block relocated to the end, see
    [`crate::atoms`]), the demuxer parses that staged copy through a
    custom AVIO context, and payload bytes are then served out of a
    bounded [`SourceWindow`] sized from the container's sample index.
*/

use std::ffi::CStr;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::os::raw::{c_int, c_void};
use std::path::Path;
use std::ptr;

use ffmpeg_next::{Packet, Rational, codec, ffi, packet::Mut as PacketMut};

use vidfrag_types::{Error, Result};

use crate::atoms;
use crate::recover::IndexEntry;
use crate::window::{SourceWindow, read_source};

/// AVIO scratch buffer handed to `avio_alloc_context`.
const AVIO_BUFFER_LEN: usize = 2048;

/// Index entries per stream summed into the initial window size.
const PROBE_SAMPLES_PER_STREAM: usize = 15;

/// Map a negative libav return code into a pipeline error.
pub(crate) fn check(ret: c_int) -> Result<c_int> {
    if ret < 0 {
        Err(Error::codec(ffmpeg_next::Error::from(ret).to_string()))
    } else {
        Ok(ret)
    }
}

/**
    Sum the sizes of each stream's first `min(15, available)` indexed
    samples. The result sizes the working window: big enough to hold
    the probe set in one piece, bounded regardless of file size.
*/
pub(crate) fn probe_budget(
    streams: usize,
    index_len: impl Fn(usize) -> usize,
    entry: impl Fn(usize, usize) -> Option<IndexEntry>,
) -> usize {
    let mut probe = 0usize;
    for stream in 0..streams {
        let entries = index_len(stream);
        for idx in 0..entries.min(PROBE_SAMPLES_PER_STREAM) {
            if let Some(entry) = entry(stream, idx) {
                probe += entry.size as usize;
            }
        }
    }
    probe
}

/**
    An opened demuxer over a partially-available container.

    The working window holds, at most, the summed size of the first
    `min(15, available)` indexed samples of every stream. A single sample
    larger than that budget cannot be made resident in one piece; such
    packets surface as corrupt and go through [`repair_packet`]
    (`FragmentedInput::repair_packet`), or are abandoned by the caller.
    That limitation is accepted — callers may reject such inputs outright.
*/
pub struct FragmentedInput {
    fmt: *mut ffi::AVFormatContext,
    window: Box<SourceWindow>,
    payload_offset: u64,
    probe_size: usize,
}

impl FragmentedInput {
    /**
        Stage the structural header, open the demuxer over it, size the
        working window from the sample index, and probe stream info.
    */
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ffmpeg_next::init().map_err(|e| Error::codec(e.to_string()))?;

        let mut file = File::open(path)?;
        let mut staged = tempfile::tempfile()?;
        let payload_offset = atoms::stage_header(&mut file, &mut staged)?;
        staged.seek(SeekFrom::Start(0))?;
        file.seek(SeekFrom::Start(payload_offset))?;

        let mut window = Box::new(SourceWindow::new(file, staged));
        let fmt = unsafe { open_demuxer(&mut window)? };

        let mut input = Self {
            fmt,
            window,
            payload_offset,
            probe_size: 0,
        };
        input.size_window()?;
        Ok(input)
    }

    /**
        Compute the probe budget from the sample index, switch the window
        to payload mode, realign the demuxer's logical position to the
        payload offset, and run stream-info probing over the first chunk.
    */
    fn size_window(&mut self) -> Result<()> {
        let probe = probe_budget(
            self.nb_streams(),
            |stream| self.index_len(stream),
            |stream, idx| self.index_entry(stream, idx),
        );
        if probe == 0 {
            return Err(Error::header_parse(
                "sample index is empty; cannot size the read window",
            ));
        }

        unsafe {
            (*self.fmt).probesize = probe as i64;
            (*(*self.fmt).pb).pos = self.payload_offset as i64;
        }
        self.window.into_payload_mode(probe);
        self.probe_size = probe;
        self.window.refill()?;

        unsafe {
            check(ffi::avformat_find_stream_info(self.fmt, ptr::null_mut()))?;
        }
        Ok(())
    }

    /// Number of elementary streams in the container.
    pub fn nb_streams(&self) -> usize {
        unsafe { (*self.fmt).nb_streams as usize }
    }

    /// The initial window budget, in bytes.
    pub fn probe_size(&self) -> usize {
        self.probe_size
    }

    /// File offset at which the payload bytes begin.
    pub fn payload_offset(&self) -> u64 {
        self.payload_offset
    }

    /// Total payload bytes handed to the demuxer so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.window.consumed()
    }

    /// Demuxer name, e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`.
    pub fn format_name(&self) -> String {
        unsafe {
            let name = (*(*self.fmt).iformat).name;
            if name.is_null() {
                String::new()
            } else {
                CStr::from_ptr(name).to_string_lossy().into_owned()
            }
        }
    }

    fn stream_ptr(&self, index: usize) -> *mut ffi::AVStream {
        unsafe { *(*self.fmt).streams.add(index) }
    }

    /// The container-level time base of one stream.
    pub fn stream_time_base(&self, index: usize) -> Rational {
        unsafe { Rational::from((*self.stream_ptr(index)).time_base) }
    }

    /// Container's best guess at the stream's frame rate.
    pub fn guess_frame_rate(&self, index: usize) -> Rational {
        unsafe {
            Rational::from(ffi::av_guess_frame_rate(
                self.fmt,
                self.stream_ptr(index),
                ptr::null_mut(),
            ))
        }
    }

    /// A standalone copy of one stream's codec parameters.
    pub fn stream_parameters(&self, index: usize) -> Result<codec::Parameters> {
        let params = codec::Parameters::new();
        unsafe {
            check(ffi::avcodec_parameters_copy(
                params.as_ptr() as *mut ffi::AVCodecParameters,
                (*self.stream_ptr(index)).codecpar,
            ))?;
        }
        Ok(params)
    }

    /// Number of sample-index entries for one stream.
    pub fn index_len(&self, index: usize) -> usize {
        unsafe { ffi::avformat_index_get_entries_count(self.stream_ptr(index)) as usize }
    }

    /// One sample-index entry: true byte size and file position.
    pub fn index_entry(&self, stream: usize, entry: usize) -> Option<IndexEntry> {
        unsafe {
            let ptr = ffi::avformat_index_get_entry(self.stream_ptr(stream), entry as c_int);
            if ptr.is_null() {
                None
            } else {
                Some(IndexEntry {
                    pos: (*ptr).pos,
                    size: (*ptr).size() as i64,
                })
            }
        }
    }

    /**
        Read the next packet. Returns `Ok(false)` at end of input. A
        returned packet may carry the corrupt flag when the window ran
        out mid-sample; the caller decides whether to repair it.
    */
    pub fn read_packet(&mut self, packet: &mut Packet) -> Result<bool> {
        let ret = unsafe { ffi::av_read_frame(self.fmt, packet.as_mut_ptr()) };
        if ret == ffi::AVERROR_EOF {
            return Ok(false);
        }
        check(ret)?;
        Ok(true)
    }

    /// True once every resident byte has been handed to the demuxer.
    pub fn window_exhausted(&self) -> bool {
        self.window.remaining() == 0
    }

    /// Re-read up to the window budget; zero means end of input.
    pub fn refill(&mut self) -> Result<usize> {
        Ok(self.window.refill()?)
    }

    pub(crate) fn window_mut(&mut self) -> &mut SourceWindow {
        &mut self.window
    }

    /// Account for bytes consumed outside the window (packet repair).
    pub(crate) fn bump_logical_pos(&mut self, by: i64) {
        unsafe {
            (*(*self.fmt).pb).pos += by;
        }
    }
}

unsafe fn open_demuxer(window: &mut SourceWindow) -> Result<*mut ffi::AVFormatContext> {
    unsafe {
        let mut fmt = ffi::avformat_alloc_context();
        if fmt.is_null() {
            return Err(Error::Allocation("format context"));
        }

        let avio_buf = ffi::av_malloc(AVIO_BUFFER_LEN) as *mut u8;
        if avio_buf.is_null() {
            ffi::avformat_free_context(fmt);
            return Err(Error::Allocation("avio buffer"));
        }

        let opaque = window as *mut SourceWindow as *mut c_void;
        let avio = ffi::avio_alloc_context(
            avio_buf,
            AVIO_BUFFER_LEN as c_int,
            0,
            opaque,
            Some(read_source),
            None,
            None,
        );
        if avio.is_null() {
            ffi::av_free(avio_buf as *mut c_void);
            ffi::avformat_free_context(fmt);
            return Err(Error::Allocation("avio context"));
        }
        (*fmt).pb = avio;

        let ret = ffi::avformat_open_input(&mut fmt, ptr::null(), ptr::null(), ptr::null_mut());
        if ret < 0 {
            // On failure avformat_open_input frees the format context;
            // the AVIO context stays ours to release.
            let mut avio = avio;
            ffi::av_freep(&mut (*avio).buffer as *mut *mut u8 as *mut c_void);
            ffi::avio_context_free(&mut avio);
            return Err(Error::codec(ffmpeg_next::Error::from(ret).to_string()));
        }
        Ok(fmt)
    }
}

impl Drop for FragmentedInput {
    fn drop(&mut self) {
        unsafe {
            if !self.fmt.is_null() {
                let mut avio = (*self.fmt).pb;
                if !avio.is_null() {
                    // The internal buffer may have been reallocated by
                    // the AVIO layer and be != the one we allocated.
                    ffi::av_freep(&mut (*avio).buffer as *mut *mut u8 as *mut c_void);
                    ffi::avio_context_free(&mut avio);
                    (*self.fmt).pb = ptr::null_mut();
                }
                ffi::avformat_close_input(&mut self.fmt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(sizes: &[&[i64]]) -> usize {
        probe_budget(
            sizes.len(),
            |stream| sizes[stream].len(),
            |stream, idx| {
                sizes[stream]
                    .get(idx)
                    .map(|&size| IndexEntry { pos: 0, size })
            },
        )
    }

    #[test]
    fn probe_budget_sums_across_streams() {
        assert_eq!(budget(&[&[5, 7], &[3]]), 15);
    }

    #[test]
    fn probe_budget_clamps_to_fifteen_samples_per_stream() {
        let twenty = [10i64; 20];
        assert_eq!(budget(&[&twenty]), 150);
        // A short index contributes everything it has.
        assert_eq!(budget(&[&twenty, &[1, 2]]), 153);
    }

    #[test]
    fn empty_index_yields_no_budget() {
        assert_eq!(budget(&[]), 0);
        assert_eq!(budget(&[&[], &[]]), 0);
    }
}
