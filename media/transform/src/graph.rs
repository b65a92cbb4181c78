/*!
    Filter-graph driver shared by the video and audio chains.
*/

use ffmpeg_next::{Frame, ffi, filter};

use vidfrag_types::{Error, Result};

/**
    One stream's filter graph between its decoder and encoder.

    Frames go in with [`push`](StreamFilter::push), come out rescaled and
    reformatted with [`pull`](StreamFilter::pull);
    [`flush`](StreamFilter::flush) signals end of stream to the graph.
*/
pub struct StreamFilter {
    graph: filter::Graph,
    stream: usize,
}

impl StreamFilter {
    pub(crate) fn new(graph: filter::Graph, stream: usize) -> Self {
        Self { graph, stream }
    }

    fn endpoint(&mut self, name: &str) -> Result<filter::Context> {
        let stream = self.stream;
        self.graph
            .get(name)
            .ok_or_else(|| Error::filter_setup(stream, format!("endpoint {name:?} missing")))
    }

    /// Feed one decoded frame into the graph.
    pub fn push(&mut self, frame: &Frame) -> Result<()> {
        self.endpoint("in")?
            .source()
            .add(frame)
            .map_err(|e| Error::codec(e.to_string()))
    }

    /// Signal end of stream on the graph input.
    pub fn flush(&mut self) -> Result<()> {
        self.endpoint("in")?
            .source()
            .flush()
            .map_err(|e| Error::codec(e.to_string()))
    }

    /**
        Pull one filtered frame out of the graph. Returns `Ok(false)`
        when the graph has nothing more to give for now (or is fully
        drained after a flush).
    */
    pub fn pull(&mut self, frame: &mut Frame) -> Result<bool> {
        match self.endpoint("out")?.sink().frame(frame) {
            Ok(()) => Ok(true),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => Ok(false),
            Err(ffmpeg_next::Error::Eof) => Ok(false),
            Err(e) => Err(Error::codec(e.to_string())),
        }
    }
}

pub(crate) fn find_filter(name: &'static str, stream: usize) -> Result<filter::Filter> {
    filter::find(name).ok_or_else(|| Error::filter_setup(stream, format!("filter {name:?} not found")))
}
