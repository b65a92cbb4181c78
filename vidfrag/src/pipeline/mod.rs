/*!
    Pipeline orchestration: open the fragmented input, derive per-stream
    codec chains, wire the chosen sink, pump, and flush.
*/

use std::path::Path;

use vidfrag_encode::TranscodePolicy;
use vidfrag_sink::{DirectSink, OutputSink, SegmentedSink};
use vidfrag_source::FragmentedInput;
use vidfrag_types::Result;

mod context;
mod pump;

pub use pump::PumpStats;

/// Run the whole transcode, start to finish.
pub fn run(input: &Path, output: &Path, segmented: bool, packet_budget: usize) -> Result<()> {
    let mut source = FragmentedInput::open(input)?;
    println!(
        "[vidfrag] opened {} via {}: {} streams, payload at {:#x}, {}-byte read window",
        input.display(),
        source.format_name(),
        source.nb_streams(),
        source.payload_offset(),
        source.probe_size(),
    );

    let policy = TranscodePolicy::default();
    let mut streams = context::build_streams(&source, &policy)?;

    let mut sink: Box<dyn OutputSink> = if segmented {
        println!("[vidfrag] segmented output into {}", output.display());
        Box::new(SegmentedSink::create(output)?)
    } else {
        println!("[vidfrag] direct output into {}", output.display());
        Box::new(DirectSink::create(output, &source.format_name())?)
    };
    context::setup_output_streams(sink.output(), &streams)?;
    sink.write_header()?;

    let stats = pump::run(&mut source, sink.as_mut(), &mut streams, packet_budget)?;
    sink.close()?;

    println!(
        "[vidfrag] done: {} packets ({} recovered, {} dropped), {} payload bytes read",
        stats.packets,
        stats.recovered,
        stats.dropped,
        source.bytes_consumed(),
    );
    Ok(())
}
