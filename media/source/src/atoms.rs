/*!
    MP4 structural-header staging.

    The demuxer expects the atom sequence `ftyp` → `moov` → `mdat` in
    strict order, but a fragmented upload may carry `mdat` anywhere. This
    module rewrites the container's structural blocks into a staging area
    with the payload block relocated to the very end, so the demuxer can
    parse the whole header before any payload bytes exist locally.
*/

use std::io::{Read, Seek, SeekFrom, Write};

use vidfrag_types::{Error, Result};

/// Size-plus-tag prefix of every structural block.
pub const ATOM_HEADER_LEN: u64 = 8;

/// Tag of the trailing payload block.
const PAYLOAD_TAG: [u8; 4] = *b"mdat";

/**
    One atom header: 4-byte big-endian size followed by a 4-byte type tag.
    The size counts the header itself.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AtomHeader {
    size: u32,
    tag: [u8; 4],
}

impl AtomHeader {
    fn parse(raw: [u8; 8]) -> Self {
        Self {
            size: u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            tag: [raw[4], raw[5], raw[6], raw[7]],
        }
    }

    fn raw(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.size.to_be_bytes());
        out[4..].copy_from_slice(&self.tag);
        out
    }

    fn is_payload(&self) -> bool {
        self.tag == PAYLOAD_TAG
    }
}

/**
    Copy every structural block of `src` into `dst`, except the payload
    block, whose 8-byte header is re-appended at the very end so the
    payload always comes last in the staged copy.

    Returns the offset within `src` at which the payload bytes begin —
    the position immediately after the original payload header. The live
    source is seeked to that offset before decoding resumes.

    Fails if `src` holds no payload block, declares an atom smaller than
    its own header, or a copy comes up short.
*/
pub fn stage_header<S, D>(src: &mut S, dst: &mut D) -> Result<u64>
where
    S: Read + Seek,
    D: Write + Seek,
{
    src.seek(SeekFrom::Start(0))?;
    dst.seek(SeekFrom::Start(0))?;

    let mut payload: Option<(AtomHeader, u64)> = None;

    loop {
        let mut raw = [0u8; 8];
        match read_fully(src, &mut raw)? {
            0 => break,
            8 => {}
            n => {
                return Err(Error::header_parse(format!(
                    "truncated atom header ({n} of {ATOM_HEADER_LEN} bytes)"
                )));
            }
        }
        let header = AtomHeader::parse(raw);
        if u64::from(header.size) < ATOM_HEADER_LEN {
            return Err(Error::header_parse(format!(
                "atom {:?} declares size {} below header length",
                header.tag, header.size
            )));
        }
        let body_len = u64::from(header.size) - ATOM_HEADER_LEN;

        if header.is_payload() {
            // Skip the payload body; its header is rewritten at the end.
            let pos = src.stream_position()?;
            payload = Some((header, pos));
            src.seek(SeekFrom::Current(body_len as i64))?;
        } else {
            dst.write_all(&raw)?;
            let copied = std::io::copy(&mut src.take(body_len), dst)?;
            if copied != body_len {
                return Err(Error::header_parse(format!(
                    "short copy of atom {:?}: {copied} of {body_len} bytes",
                    header.tag
                )));
            }
        }
    }

    match payload {
        Some((header, offset)) => {
            dst.write_all(&header.raw())?;
            Ok(offset)
        }
        None => Err(Error::header_parse("no payload (mdat) atom found")),
    }
}

/// Like `read_exact`, but reports a clean 0 on immediate end of input.
fn read_fully<R: Read>(src: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = src.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn atom(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(body.len() as u32 + 8).to_be_bytes());
        out.extend_from_slice(tag);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn payload_atom_is_relocated_to_the_end() {
        let a = atom(b"ftyp", &[1; 16]);
        let b = atom(b"moov", &[2; 32]);
        let payload = atom(b"mdat", &[3; 100]);

        let mut file = Vec::new();
        file.extend_from_slice(&a);
        file.extend_from_slice(&b);
        file.extend_from_slice(&payload);

        let mut src = Cursor::new(file);
        let mut dst = Cursor::new(Vec::new());
        let offset = stage_header(&mut src, &mut dst).unwrap();

        // Offset points right past the payload header in the original.
        assert_eq!(offset, (a.len() + b.len()) as u64 + ATOM_HEADER_LEN);

        let staged = dst.into_inner();
        assert_eq!(staged.len(), a.len() + b.len() + ATOM_HEADER_LEN as usize);
        assert_eq!(&staged[..a.len()], &a[..]);
        assert_eq!(&staged[a.len()..a.len() + b.len()], &b[..]);
        // Trailing 8 bytes are the payload header, size intact.
        assert_eq!(&staged[staged.len() - 8..], &payload[..8]);
    }

    #[test]
    fn payload_in_the_middle_still_lands_last() {
        let a = atom(b"ftyp", &[1; 8]);
        let payload = atom(b"mdat", &[9; 64]);
        let b = atom(b"moov", &[2; 24]);

        let mut file = Vec::new();
        file.extend_from_slice(&a);
        file.extend_from_slice(&payload);
        file.extend_from_slice(&b);

        let mut src = Cursor::new(file);
        let mut dst = Cursor::new(Vec::new());
        let offset = stage_header(&mut src, &mut dst).unwrap();

        assert_eq!(offset, a.len() as u64 + ATOM_HEADER_LEN);
        let staged = dst.into_inner();
        assert_eq!(&staged[staged.len() - 8..], &payload[..8]);
        assert_eq!(&staged[a.len()..a.len() + b.len()], &b[..]);
    }

    #[test]
    fn missing_payload_is_an_error() {
        let mut file = Vec::new();
        file.extend_from_slice(&atom(b"ftyp", &[1; 4]));
        file.extend_from_slice(&atom(b"moov", &[2; 4]));

        let mut src = Cursor::new(file);
        let mut dst = Cursor::new(Vec::new());
        let err = stage_header(&mut src, &mut dst).unwrap_err();
        assert!(matches!(err, Error::HeaderParse(_)));
    }

    #[test]
    fn truncated_atom_header_is_an_error() {
        let mut file = atom(b"mdat", &[0; 4]);
        file.extend_from_slice(&[0, 0]); // two stray bytes

        let mut src = Cursor::new(file);
        let mut dst = Cursor::new(Vec::new());
        let err = stage_header(&mut src, &mut dst).unwrap_err();
        assert!(matches!(err, Error::HeaderParse(_)));
    }

    #[test]
    fn undersized_atom_is_an_error() {
        let mut file = Vec::new();
        file.extend_from_slice(&4u32.to_be_bytes());
        file.extend_from_slice(b"free");

        let mut src = Cursor::new(file);
        let mut dst = Cursor::new(Vec::new());
        let err = stage_header(&mut src, &mut dst).unwrap_err();
        assert!(matches!(err, Error::HeaderParse(_)));
    }
}
