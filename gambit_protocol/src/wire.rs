// Newline-delimited JSON framing over TCP.
//
// Wire format: one JSON object per line, `\n`-terminated. serde_json's
// compact output never emits raw control characters inside scalars, so the
// newline is an unambiguous record boundary. Encoding produces a single
// buffer (JSON + trailing `\n`) so the caller can hand the whole record to
// one `write_all` — a message is never split across writes, preserving TCP's
// per-connection ordering for whole records.
//
// A `MAX_LINE_BYTES` cap bounds allocation on reads. Restore histories are
// the largest expected payloads; 1 MB is generous headroom.

use std::io::{self, BufRead, Read};

use crate::message::Envelope;

/// Maximum accepted line length. Protects the reader from unbounded
/// allocation on a malformed or hostile stream.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Encode one envelope as a single newline-terminated buffer.
pub fn encode_line(envelope: &Envelope) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(envelope)?;
    line.push(b'\n');
    Ok(line)
}

/// Read one line (without the trailing `\n`).
///
/// Returns `Ok(None)` on clean EOF at a record boundary. A stream that ends
/// mid-line yields `UnexpectedEof`; a line over [`MAX_LINE_BYTES`] yields
/// `InvalidData`.
pub fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    let n = reader
        .by_ref()
        .take(MAX_LINE_BYTES as u64 + 1)
        .read_until(b'\n', &mut line)?;

    if n == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') {
        if line.len() > MAX_LINE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {MAX_LINE_BYTES} bytes"),
            ));
        }
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream closed mid-line",
        ));
    }
    line.pop();
    Ok(Some(line))
}

/// Parse one line into an envelope.
pub fn decode_line(line: &[u8]) -> Result<Envelope, serde_json::Error> {
    serde_json::from_slice(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use crate::types::PeerId;
    use std::io::Cursor;

    fn envelope(payload: &[u8]) -> Envelope {
        Envelope::new(
            42,
            PeerId::new("brave-falcon", 2),
            MessageKind::NewMove,
            payload.to_vec(),
        )
    }

    #[test]
    fn encode_produces_one_terminated_line() {
        let line = encode_line(&envelope(b"e7e5")).unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        // Exactly one newline: the record boundary.
        assert_eq!(line.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn reads_records_in_sequence() {
        let mut wire = Vec::new();
        wire.extend(encode_line(&envelope(b"e2e4")).unwrap());
        wire.extend(encode_line(&envelope(b"e7e5")).unwrap());

        let mut cursor = Cursor::new(wire);
        let first = decode_line(&read_line(&mut cursor).unwrap().unwrap()).unwrap();
        let second = decode_line(&read_line(&mut cursor).unwrap().unwrap()).unwrap();
        assert_eq!(first.payload, b"e2e4");
        assert_eq!(second.payload, b"e7e5");
        assert!(read_line(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn newline_in_payload_does_not_break_framing() {
        // Restore histories are newline-joined move lists; serde_json must
        // escape them inside the scalar.
        let line = encode_line(&envelope(b"e2e4\ne7e5\n")).unwrap();
        assert_eq!(line.iter().filter(|&&b| b == b'\n').count(), 1);

        let mut cursor = Cursor::new(line);
        let back = decode_line(&read_line(&mut cursor).unwrap().unwrap()).unwrap();
        assert_eq!(back.payload, b"e2e4\ne7e5\n");
    }

    #[test]
    fn eof_mid_line_is_an_error() {
        let mut cursor = Cursor::new(b"{\"truncated".to_vec());
        let err = read_line(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn oversized_line_is_rejected() {
        let mut wire = vec![b'x'; MAX_LINE_BYTES + 1];
        wire.push(b'\n');
        let mut cursor = Cursor::new(wire);
        let err = read_line(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn malformed_line_fails_decode_not_read() {
        let mut cursor = Cursor::new(b"not json at all\n".to_vec());
        let line = read_line(&mut cursor).unwrap().unwrap();
        assert!(decode_line(&line).is_err());
    }
}
