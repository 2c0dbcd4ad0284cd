use std::io;

use crate::error::{Error, InvalidMessage};
use crate::msgs::codec;
use crate::msgs::message::{MessageError, OpaqueMessage};

/// This deframer works to reconstruct TLS messages
/// from arbitrary-sized reads, buffering as necessary.
/// The input is `read()`, get the output from `pop()`.
pub struct MessageDeframer {
    /// Set if the peer is not talking TLS 1.0, but some other
    /// protocol.  The caller should abort the connection, because
    /// the deframer cannot recover.
    desynced: bool,

    /// A fixed-size buffer containing the currently-accumulating
    /// TLS message.
    buf: Box<[u8; OpaqueMessage::MAX_WIRE_SIZE]>,

    /// What size prefix of `buf` is used.
    used: usize,
}

impl Default for MessageDeframer {
    fn default() -> Self {
        Self {
            desynced: false,
            buf: Box::new([0u8; OpaqueMessage::MAX_WIRE_SIZE]),
            used: 0,
        }
    }
}

impl MessageDeframer {
    /// Return any complete record that the deframer has accumulated.
    ///
    /// Nothing is returned until the whole of a record's declared
    /// length has arrived.
    pub fn pop(&mut self) -> Result<Option<OpaqueMessage>, Error> {
        if self.desynced {
            return Err(Error::InvalidMessage(InvalidMessage::MessageTooShort));
        } else if self.used == 0 {
            return Ok(None);
        }

        let mut rd = codec::Reader::init(&self.buf[..self.used]);
        let m = match OpaqueMessage::read(&mut rd) {
            Ok(m) => m,
            Err(MessageError::TooShortForHeader | MessageError::TooShortForLength) => {
                return Ok(None)
            }
            Err(MessageError::MessageTooLarge) => {
                self.desynced = true;
                return Err(Error::PeerSentOversizedRecord);
            }
            Err(MessageError::UnknownProtocolVersion) => {
                self.desynced = true;
                return Err(Error::InvalidMessage(
                    InvalidMessage::UnknownProtocolVersion,
                ));
            }
        };

        let taken = rd.used();
        self.buf.copy_within(taken..self.used, 0);
        self.used -= taken;
        Ok(Some(m))
    }

    /// Is the buffer too full to read into?
    pub fn is_full(&self) -> bool {
        self.used == OpaqueMessage::MAX_WIRE_SIZE
    }

    /// Read some bytes from `rd`, and add them to our internal buffer.
    pub fn read(&mut self, rd: &mut dyn io::Read) -> io::Result<usize> {
        if self.is_full() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "message buffer full",
            ));
        }

        // Try to do the largest reads possible.  A full buffer always
        // holds at least one whole record, so popping makes room again.
        debug_assert!(self.used <= OpaqueMessage::MAX_WIRE_SIZE);
        let new_bytes = rd.read(&mut self.buf[self.used..])?;
        self.used += new_bytes;
        Ok(new_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::MessageDeframer;
    use crate::enums::ContentType;
    use crate::error::{Error, InvalidMessage};
    use std::io;

    const FIRST_MESSAGE: &[u8] = b"\x16\x03\x01\x00\x04\x0e\x00\x00\x00";
    const SECOND_MESSAGE: &[u8] = b"\x15\x03\x01\x00\x02\x01\x00";

    struct ByteRead<'a> {
        buf: &'a [u8],
        offs: usize,
    }

    impl<'a> ByteRead<'a> {
        fn new(bytes: &'a [u8]) -> Self {
            ByteRead {
                buf: bytes,
                offs: 0,
            }
        }
    }

    impl io::Read for ByteRead<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut len = 0;

            while len < buf.len() && len < self.buf.len() - self.offs {
                buf[len] = self.buf[self.offs + len];
                len += 1;
            }

            self.offs += len;

            Ok(len)
        }
    }

    fn input_bytes(d: &mut MessageDeframer, bytes: &[u8]) -> io::Result<usize> {
        let mut rd = ByteRead::new(bytes);
        d.read(&mut rd)
    }

    fn pop_first(d: &mut MessageDeframer) {
        let m = d.pop().unwrap().unwrap();
        assert_eq!(m.typ, ContentType::Handshake);
        assert_eq!(m.payload.0, vec![0x0e, 0, 0, 0]);
    }

    fn pop_second(d: &mut MessageDeframer) {
        let m = d.pop().unwrap().unwrap();
        assert_eq!(m.typ, ContentType::Alert);
        assert_eq!(m.payload.0, vec![1, 0]);
    }

    #[test]
    fn check_incremental() {
        let mut d = MessageDeframer::default();
        for byte in FIRST_MESSAGE {
            assert_eq!(d.pop().unwrap().map(|_| ()), None);
            assert_eq!(input_bytes(&mut d, &[*byte]).unwrap(), 1);
        }
        pop_first(&mut d);
        assert_eq!(d.pop().unwrap().map(|_| ()), None);
    }

    #[test]
    fn check_two_in_one_read() {
        let mut d = MessageDeframer::default();
        let mut both = FIRST_MESSAGE.to_vec();
        both.extend_from_slice(SECOND_MESSAGE);
        assert_eq!(input_bytes(&mut d, &both).unwrap(), both.len());
        pop_first(&mut d);
        pop_second(&mut d);
        assert!(d.pop().unwrap().is_none());
    }

    #[test]
    fn check_split_across_reads() {
        let mut d = MessageDeframer::default();
        let mut both = FIRST_MESSAGE.to_vec();
        both.extend_from_slice(SECOND_MESSAGE);
        let (a, b) = both.split_at(FIRST_MESSAGE.len() + 3);
        input_bytes(&mut d, a).unwrap();
        pop_first(&mut d);
        assert!(d.pop().unwrap().is_none());
        input_bytes(&mut d, b).unwrap();
        pop_second(&mut d);
    }

    #[test]
    fn test_invalid_version() {
        let mut d = MessageDeframer::default();
        input_bytes(&mut d, b"\x16\x03\x03\x00\x01\x00").unwrap();
        assert_eq!(
            d.pop().unwrap_err(),
            Error::InvalidMessage(InvalidMessage::UnknownProtocolVersion)
        );
        assert!(d.pop().is_err());
    }

    #[test]
    fn test_oversized_record() {
        let mut d = MessageDeframer::default();
        input_bytes(&mut d, b"\x17\x03\x01\x48\x01").unwrap();
        assert_eq!(d.pop().unwrap_err(), Error::PeerSentOversizedRecord);
    }

    #[test]
    fn test_empty_application_data() {
        let mut d = MessageDeframer::default();
        input_bytes(&mut d, b"\x17\x03\x01\x00\x00").unwrap();
        let m = d.pop().unwrap().unwrap();
        assert_eq!(m.typ, ContentType::ApplicationData);
        assert!(m.payload.0.is_empty());
    }
}
