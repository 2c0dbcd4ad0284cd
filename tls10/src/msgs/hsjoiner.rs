use std::collections::VecDeque;

use crate::enums::{ContentType, ProtocolVersion};
use crate::error::InvalidMessage;
use crate::msgs::base::Payload;
use crate::msgs::codec::{self, Codec};
use crate::msgs::handshake::HandshakeMessagePayload;
use crate::msgs::message::{Message, MessagePayload, PlainMessage};

const HEADER_SIZE: usize = 1 + 3;

/// TLS allows for handshake messages of up to 16MB.  We
/// restrict that to 64KB to limit potential for denial-of-
/// service.
const MAX_HANDSHAKE_SIZE: u32 = 0xffff;

/// This works to reconstruct TLS handshake messages
/// from individual TLS messages.  It's guaranteed that
/// TLS messages output from this layer contain precisely
/// one handshake payload.
#[derive(Default)]
pub struct HandshakeJoiner {
    /// Completed handshake frames for output.
    frames: VecDeque<Message>,

    /// The message payload we're currently accumulating.
    buf: Vec<u8>,
}

enum BufferState {
    /// Buffer contains a header that introduces a message that is too long.
    MessageTooLarge,

    /// Buffer contains a full header and body.
    OneMessage,

    /// We need more data to see a header and complete body.
    NeedsMoreData,
}

impl HandshakeJoiner {
    /// Make a new HandshakeJoiner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Do we have any buffered data?
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the next completed handshake message, if any.
    pub fn pop(&mut self) -> Option<Message> {
        self.frames.pop_front()
    }

    /// Take the message, and join/split it as needed.
    /// Return the number of new messages added to the
    /// output deque as a result of this message.
    ///
    /// Returns an error if msg or a preceding message was corrupt.
    /// You cannot recover from this situation.
    pub fn push(&mut self, msg: PlainMessage) -> Result<usize, InvalidMessage> {
        debug_assert_eq!(msg.typ, ContentType::Handshake);

        // A handshake record must carry something.
        if msg.payload.0.is_empty() {
            return Err(InvalidMessage::InvalidEmptyPayload);
        }

        // The vast majority of the time `self.buf` will be empty since most
        // handshake messages arrive in a single fragment. Avoid allocating and
        // copying in that common case.
        if self.buf.is_empty() {
            self.buf = msg.payload.0;
        } else {
            self.buf
                .extend_from_slice(&msg.payload.0[..]);
        }

        let mut count = 0;
        loop {
            match self.buf_contains_message() {
                BufferState::MessageTooLarge => {
                    return Err(InvalidMessage::HandshakePayloadTooLarge)
                }
                BufferState::NeedsMoreData => break,
                BufferState::OneMessage => {
                    self.deframe_one(msg.version)?;
                    count += 1;
                }
            }
        }

        Ok(count)
    }

    /// Does our `buf` contain a full handshake payload?  It does if it is big
    /// enough to contain a header, and that header has a length which falls
    /// within `buf`.
    fn buf_contains_message(&self) -> BufferState {
        if self.buf.len() < HEADER_SIZE {
            return BufferState::NeedsMoreData;
        }

        let (header, rest) = self.buf.split_at(HEADER_SIZE);
        match codec::u24::decode(&header[1..]) {
            Some(len) if len.0 > MAX_HANDSHAKE_SIZE => BufferState::MessageTooLarge,
            Some(len) if rest.get(..len.into()).is_some() => BufferState::OneMessage,
            _ => BufferState::NeedsMoreData,
        }
    }

    /// Take a TLS handshake payload off the front of `buf`, and put it onto
    /// the back of our `frames` deque inside a normal `Message`.
    ///
    /// Fails if the message body does not decode; the stream is then
    /// desynchronised beyond repair.
    fn deframe_one(&mut self, version: ProtocolVersion) -> Result<(), InvalidMessage> {
        let used = {
            let mut rd = codec::Reader::init(&self.buf);
            let parsed = HandshakeMessagePayload::read(&mut rd)?;

            let m = Message {
                version,
                payload: MessagePayload::Handshake {
                    parsed,
                    encoded: Payload::new(&self.buf[..rd.used()]),
                },
            };

            self.frames.push_back(m);
            rd.used()
        };
        self.buf = self.buf.split_off(used);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::HandshakeJoiner;
    use crate::enums::{ContentType, HandshakeType, ProtocolVersion};
    use crate::error::InvalidMessage;
    use crate::msgs::base::Payload;
    use crate::msgs::message::{MessagePayload, PlainMessage};

    fn handshake_record(bytes: &[u8]) -> PlainMessage {
        PlainMessage {
            typ: ContentType::Handshake,
            version: ProtocolVersion::TLSv1_0,
            payload: Payload::new(bytes.to_vec()),
        }
    }

    fn pop_eq(expect_type: HandshakeType, expect_encoded: &[u8], hj: &mut HandshakeJoiner) {
        let got = hj.pop().unwrap();
        assert!(got.is_handshake_type(expect_type));
        match got.payload {
            MessagePayload::Handshake { encoded, .. } => assert_eq!(encoded.0, expect_encoded),
            _ => panic!("not a handshake message"),
        }
    }

    #[test]
    fn want() {
        let hj = HandshakeJoiner::new();
        assert!(hj.is_empty());
    }

    #[test]
    fn split() {
        // Check we split two handshake messages within one PlainMessage.
        let mut hj = HandshakeJoiner::new();

        // two HelloRequests
        let msg = handshake_record(b"\x00\x00\x00\x00\x00\x00\x00\x00");
        assert_eq!(hj.push(msg), Ok(2));
        assert!(hj.is_empty());

        pop_eq(HandshakeType::HelloRequest, b"\x00\x00\x00\x00", &mut hj);
        pop_eq(HandshakeType::HelloRequest, b"\x00\x00\x00\x00", &mut hj);
        assert!(hj.pop().is_none());
    }

    #[test]
    fn broken() {
        // Check obviously invalid length
        let mut hj = HandshakeJoiner::new();

        let msg = handshake_record(b"\x01\xff\x00\x00");
        assert_eq!(
            hj.push(msg),
            Err(InvalidMessage::HandshakePayloadTooLarge)
        );
    }

    #[test]
    fn trailing_data_in_empty_message() {
        let mut hj = HandshakeJoiner::new();

        // ServerHelloDone with a one byte body
        let msg = handshake_record(b"\x0e\x00\x00\x01\x00");
        assert!(hj.push(msg).is_err());
    }

    #[test]
    fn join() {
        // Check we join one handshake message split over two PlainMessages.
        let mut hj = HandshakeJoiner::new();

        // Introduce Finished of 16 bytes, providing 4.
        let msg = handshake_record(b"\x14\x00\x00\x10\x00\x01\x02\x03");
        assert_eq!(hj.push(msg), Ok(0));
        assert!(!hj.is_empty());

        // 11 more bytes.
        let msg = handshake_record(b"\x04\x05\x06\x07\x08\x09\x0a\x0b\x0c\x0d\x0e");
        assert_eq!(hj.push(msg), Ok(0));
        assert!(!hj.is_empty());

        // Final 1 byte.
        let msg = handshake_record(b"\x0f");
        assert_eq!(hj.push(msg), Ok(1));
        assert!(hj.is_empty());

        pop_eq(
            HandshakeType::Finished,
            b"\x14\x00\x00\x10\x00\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b\x0c\x0d\x0e\x0f",
            &mut hj,
        );
    }

    #[test]
    fn empty_record_is_rejected() {
        let mut hj = HandshakeJoiner::new();
        assert_eq!(
            hj.push(handshake_record(b"")),
            Err(InvalidMessage::InvalidEmptyPayload)
        );
    }

    #[test]
    fn join_many() {
        // Check we join one handshake message split over many PlainMessages.
        let mut hj = HandshakeJoiner::new();

        // Introduce Certificate of 0xfffc bytes, carrying one certificate.
        let msg = handshake_record(b"\x0b\x00\xff\xfc\x00\xff\xf9\x00\xff\xf6");
        assert_eq!(hj.push(msg), Ok(0));

        let mut remain = 0xfff6;
        while remain > 1000 {
            let msg = handshake_record(&[0xaa; 1000]);
            assert_eq!(hj.push(msg), Ok(0));
            remain -= 1000;
        }

        let msg = handshake_record(&vec![0xaa; remain]);
        assert_eq!(hj.push(msg), Ok(1));
        assert!(hj.is_empty());

        let got = hj.pop().unwrap();
        assert!(got.is_handshake_type(HandshakeType::Certificate));
    }
}
