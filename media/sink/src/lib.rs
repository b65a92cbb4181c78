/*!
    Output sinks: one container file, or a promoted segment sequence.
*/

use ffmpeg_next::format;

use vidfrag_types::Result;

mod direct;
mod promote;
mod segmented;

pub use direct::DirectSink;
pub use promote::{
    INIT_NAME, MANIFEST_NAME, SEGMENT_PREFIX, STAGING_DIR, SegmentPromoter, segment_name,
};
pub use segmented::SegmentedSink;

/**
    Common surface of the two output strategies. The pipeline adds
    streams and writes packets through [`output`](OutputSink::output),
    calls [`flush`](OutputSink::flush) after every pump cycle (a no-op
    for the direct sink, a promotion scan for the segmented one), and
    [`close`](OutputSink::close) exactly once at the end.
*/
pub trait OutputSink {
    fn output(&mut self) -> &mut format::context::Output;
    fn write_header(&mut self) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}
