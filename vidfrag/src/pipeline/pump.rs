/*!
    The packet pump: read, repair, decode, filter, encode, mux, promote.
*/

use ffmpeg_next::{Frame, Packet, Rational, ffi, format, packet};

use vidfrag_sink::OutputSink;
use vidfrag_source::FragmentedInput;
use vidfrag_types::{Error, Result, StreamKind};

use super::context::{StreamCodec, StreamContext};

#[derive(Clone, Copy, Debug, Default)]
pub struct PumpStats {
    pub packets: usize,
    pub recovered: usize,
    pub dropped: usize,
}

/**
    Pump up to `packet_budget` packets from the input through the
    per-stream chains, then flush filters and encoders to end of stream.

    When the read window runs dry the packet in hand is repaired first
    (its missing tail sits exactly at the source file's cursor) and the
    window refilled afterwards. Unrecoverable packets are dropped and
    the run continues.
*/
pub fn run(
    input: &mut FragmentedInput,
    sink: &mut dyn OutputSink,
    streams: &mut [StreamContext],
    packet_budget: usize,
) -> Result<PumpStats> {
    let mut stats = PumpStats::default();

    for _ in 0..packet_budget {
        let mut pkt = Packet::empty();
        match input.read_packet(&mut pkt) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                eprintln!("[pump] packet read failed: {e}");
                break;
            }
        }
        stats.packets += 1;

        if input.window_exhausted() {
            if pkt.flags().contains(packet::Flags::CORRUPT) {
                let index = pkt.stream();
                if let Some(cursor) = streams.get(index).map(|s| s.recovery_cursor) {
                    match input.repair_packet(&mut pkt, cursor) {
                        Ok(matched) => {
                            streams[index].recovery_cursor = matched + 1;
                            stats.recovered += 1;
                        }
                        Err(e) => {
                            eprintln!("[pump] dropping packet on stream #{index}: {e}");
                            stats.dropped += 1;
                            input.refill()?;
                            continue;
                        }
                    }
                }
            }
            input.refill()?;
        }

        let index = pkt.stream();
        let Some(sctx) = streams.get_mut(index) else {
            return Err(Error::codec(format!("packet for unknown stream #{index}")));
        };
        if sctx.dead {
            continue;
        }
        process_packet(sctx, index, &pkt, sink.output())?;
        sink.flush()?;
    }

    for (index, sctx) in streams.iter_mut().enumerate() {
        if sctx.dead || !sctx.kind.is_transcoded() {
            continue;
        }
        if let Err(e) = drain_stream(sctx, index, sink.output()) {
            eprintln!("[pump] flushing stream #{index} failed: {e}");
        }
    }
    sink.flush()?;

    Ok(stats)
}

fn process_packet(
    sctx: &mut StreamContext,
    index: usize,
    packet: &Packet,
    output: &mut format::context::Output,
) -> Result<()> {
    if !sctx.kind.is_transcoded() {
        return forward_packet(sctx, index, packet, output);
    }
    if let Err(e) = sctx.codec.send_packet(packet) {
        eprintln!(
            "[pump] decoder rejected packet on stream #{index} at {:#010x}: {e}",
            packet.position()
        );
        sctx.dead = true;
        return Ok(());
    }

    let mut frame = unsafe { Frame::empty() };
    loop {
        match sctx.codec.receive_frame(&mut frame) {
            Ok(()) => {
                frame.set_pts(frame.timestamp());
                filter_frames(sctx, index, Some(&frame), output)?;
            }
            Err(e) if is_drained(&e) => break,
            Err(e) => {
                eprintln!("[pump] decode failed on stream #{index}: {e}");
                break;
            }
        }
    }
    Ok(())
}

/// Remux a non-AV packet with its timestamps moved to the output base.
fn forward_packet(
    sctx: &StreamContext,
    index: usize,
    packet: &Packet,
    output: &mut format::context::Output,
) -> Result<()> {
    let mut pkt = packet.clone();
    pkt.set_stream(index);
    pkt.rescale_ts(sctx.time_base, output_time_base(output, index));
    pkt.write_interleaved(output)
        .map_err(|e| Error::codec(e.to_string()))
}

/**
    Push one frame (or, with `None`, an end-of-stream flush) into the
    stream's filter graph and encode everything the graph gives back.
*/
fn filter_frames(
    sctx: &mut StreamContext,
    index: usize,
    frame: Option<&Frame>,
    output: &mut format::context::Output,
) -> Result<()> {
    let Some(filter) = sctx.filter.as_mut() else {
        return Ok(());
    };
    match frame {
        Some(frame) => filter.push(frame)?,
        None => filter.flush()?,
    }

    let mut filtered = unsafe { Frame::empty() };
    while filter.pull(&mut filtered)? {
        if sctx.kind == StreamKind::Video {
            // Let the encoder pick frame types itself.
            unsafe {
                (*filtered.as_mut_ptr()).pict_type = ffi::AVPictureType::AV_PICTURE_TYPE_NONE;
            }
        }
        encode_frame(
            &mut sctx.codec,
            index,
            Some(&filtered),
            sctx.enc_time_base,
            output,
        )?;
    }
    Ok(())
}

/**
    Send one filtered frame (or, with `None`, end of stream) to the
    encoder and mux every packet it produces. Encoded timestamps move
    from the encoder's base to the output stream's; packets the encoder
    left without a duration default to the frame's, or one tick.
*/
fn encode_frame(
    codec: &mut StreamCodec,
    index: usize,
    frame: Option<&Frame>,
    enc_time_base: Rational,
    output: &mut format::context::Output,
) -> Result<()> {
    match frame {
        Some(frame) => {
            if let Err(e) = codec.send_frame(frame) {
                eprintln!("[pump] encoder rejected frame on stream #{index}: {e}");
                return Ok(());
            }
        }
        None => codec.send_eof().map_err(|e| Error::codec(e.to_string()))?,
    }

    let mut pkt = Packet::empty();
    loop {
        match codec.receive_packet(&mut pkt) {
            Ok(()) => {
                pkt.set_stream(index);
                pkt.rescale_ts(enc_time_base, output_time_base(output, index));
                if pkt.duration() == 0 {
                    let fallback = frame.map(frame_duration).filter(|d| *d != 0).unwrap_or(1);
                    pkt.set_duration(fallback);
                }
                pkt.write_interleaved(output)
                    .map_err(|e| Error::codec(e.to_string()))?;
            }
            Err(e) if is_drained(&e) => break,
            Err(e) => {
                eprintln!("[pump] encode failed on stream #{index}: {e}");
                break;
            }
        }
    }
    Ok(())
}

/// Flush one stream's filter graph, then its encoder.
fn drain_stream(
    sctx: &mut StreamContext,
    index: usize,
    output: &mut format::context::Output,
) -> Result<()> {
    filter_frames(sctx, index, None, output)?;
    encode_frame(&mut sctx.codec, index, None, sctx.enc_time_base, output)
}

fn output_time_base(output: &format::context::Output, index: usize) -> Rational {
    output
        .stream(index)
        .map(|s| s.time_base())
        .unwrap_or_else(|| Rational::new(1, 1))
}

fn frame_duration(frame: &Frame) -> i64 {
    unsafe { (*frame.as_ptr()).pkt_duration }
}

fn is_drained(e: &ffmpeg_next::Error) -> bool {
    matches!(
        e,
        ffmpeg_next::Error::Eof | ffmpeg_next::Error::Other { errno: ffi::EAGAIN }
    )
}
