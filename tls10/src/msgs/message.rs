use crate::enums::{AlertDescription, ContentType, HandshakeType, ProtocolVersion};
use crate::error::InvalidMessage;
use crate::msgs::alert::AlertMessagePayload;
use crate::msgs::base::Payload;
use crate::msgs::ccs::ChangeCipherSpecPayload;
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::enums::AlertLevel;
use crate::msgs::handshake::HandshakeMessagePayload;

#[derive(Debug)]
pub enum MessagePayload {
    Alert(AlertMessagePayload),
    Handshake {
        parsed: HandshakeMessagePayload,
        encoded: Payload,
    },
    ChangeCipherSpec(ChangeCipherSpecPayload),
    ApplicationData(Payload),
}

impl MessagePayload {
    pub fn encode(&self, bytes: &mut Vec<u8>) {
        match self {
            Self::Alert(x) => x.encode(bytes),
            Self::Handshake { encoded, .. } => bytes.extend(&encoded.0),
            Self::ChangeCipherSpec(x) => x.encode(bytes),
            Self::ApplicationData(x) => x.encode(bytes),
        }
    }

    /// Decode a record body of content type `typ`.
    pub fn new(typ: ContentType, payload: Payload) -> Result<Self, InvalidMessage> {
        match typ {
            ContentType::ApplicationData => Ok(Self::ApplicationData(payload)),
            ContentType::Alert => AlertMessagePayload::read_bytes(&payload.0).map(Self::Alert),
            ContentType::Handshake => {
                let parsed = HandshakeMessagePayload::read_bytes(&payload.0)?;
                Ok(Self::Handshake {
                    parsed,
                    encoded: payload,
                })
            }
            ContentType::ChangeCipherSpec => {
                ChangeCipherSpecPayload::read_bytes(&payload.0).map(Self::ChangeCipherSpec)
            }
            _ => Err(InvalidMessage::InvalidContentType),
        }
    }

    pub fn handshake(parsed: HandshakeMessagePayload) -> Self {
        Self::Handshake {
            encoded: Payload::new(parsed.get_encoding()),
            parsed,
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Alert(_) => ContentType::Alert,
            Self::Handshake { .. } => ContentType::Handshake,
            Self::ChangeCipherSpec(_) => ContentType::ChangeCipherSpec,
            Self::ApplicationData(_) => ContentType::ApplicationData,
        }
    }
}

/// A TLS frame, named TLSPlaintext in the standard.
///
/// This type owns all memory for its interior parts. It is used to read/write from/to I/O
/// buffers as well as for fragmenting, joining and encryption/decryption. It can be converted
/// into a `Message` by decoding the payload.
#[derive(Clone, Debug)]
pub struct OpaqueMessage {
    pub typ: ContentType,
    pub version: ProtocolVersion,
    pub payload: Payload,
}

impl OpaqueMessage {
    /// `MessageError` allows callers to distinguish between valid prefixes (might
    /// become valid if we read more data) and invalid data.
    pub fn read(r: &mut Reader) -> Result<Self, MessageError> {
        let typ = ContentType::read(r).map_err(|_| MessageError::TooShortForHeader)?;
        let version = ProtocolVersion::read(r).map_err(|_| MessageError::TooShortForHeader)?;
        let len = u16::read(r).map_err(|_| MessageError::TooShortForHeader)?;

        // Reject oversize messages
        if len > Self::MAX_PAYLOAD {
            return Err(MessageError::MessageTooLarge);
        }

        // This engine speaks exactly one version.
        if version != ProtocolVersion::TLSv1_0 {
            return Err(MessageError::UnknownProtocolVersion);
        }

        let mut sub = r
            .sub(usize::from(len))
            .map_err(|_| MessageError::TooShortForLength)?;
        let payload = Payload::read(&mut sub);

        Ok(Self {
            typ,
            version,
            payload,
        })
    }

    pub fn encode(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER_SIZE as usize + self.payload.0.len());
        self.typ.encode(&mut buf);
        self.version.encode(&mut buf);
        (self.payload.0.len() as u16).encode(&mut buf);
        self.payload.encode(&mut buf);
        buf
    }

    /// Force conversion into a plaintext message.
    ///
    /// This should only be used for messages that are known to be in plaintext. Otherwise, the
    /// `OpaqueMessage` should be decrypted into a `PlainMessage` using a `MessageDecrypter`.
    pub fn into_plain_message(self) -> PlainMessage {
        PlainMessage {
            version: self.version,
            typ: self.typ,
            payload: self.payload,
        }
    }

    /// This is the maximum on-the-wire size of a TLSCiphertext.
    /// That's 2^14 payload bytes, a header, and a 2KB allowance
    /// for ciphertext overheads.
    pub const MAX_PAYLOAD: u16 = 16384 + 2048;

    /// Content type, version and size.
    pub const HEADER_SIZE: u16 = 1 + 2 + 2;

    /// Maximum on-wire message size.
    pub const MAX_WIRE_SIZE: usize = (Self::MAX_PAYLOAD + Self::HEADER_SIZE) as usize;
}

impl From<Message> for PlainMessage {
    fn from(msg: Message) -> Self {
        let typ = msg.payload.content_type();
        let payload = match msg.payload {
            MessagePayload::ApplicationData(payload) => payload,
            MessagePayload::Handshake { encoded, .. } => encoded,
            _ => {
                let mut buf = Vec::new();
                msg.payload.encode(&mut buf);
                Payload(buf)
            }
        };

        Self {
            typ,
            version: msg.version,
            payload,
        }
    }
}

impl TryFrom<PlainMessage> for Message {
    type Error = InvalidMessage;

    fn try_from(plain: PlainMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            version: plain.version,
            payload: MessagePayload::new(plain.typ, plain.payload)?,
        })
    }
}

/// A decrypted TLS frame
///
/// This type owns all memory for its interior parts. It can be decrypted from an OpaqueMessage
/// or encrypted into an OpaqueMessage, and it is also used for joining and fragmenting.
#[derive(Clone, Debug)]
pub struct PlainMessage {
    pub typ: ContentType,
    pub version: ProtocolVersion,
    pub payload: Payload,
}

impl PlainMessage {
    pub fn into_unencrypted_opaque(self) -> OpaqueMessage {
        OpaqueMessage {
            version: self.version,
            typ: self.typ,
            payload: self.payload,
        }
    }

    pub fn borrow(&self) -> BorrowedPlainMessage<'_> {
        BorrowedPlainMessage {
            version: self.version,
            typ: self.typ,
            payload: &self.payload.0,
        }
    }
}

/// A message with decoded payload
#[derive(Debug)]
pub struct Message {
    pub version: ProtocolVersion,
    pub payload: MessagePayload,
}

impl Message {
    pub fn is_handshake_type(&self, hstyp: HandshakeType) -> bool {
        // Bit of a layering violation, but OK.
        if let MessagePayload::Handshake { parsed, .. } = &self.payload {
            parsed.typ == hstyp
        } else {
            false
        }
    }

    pub fn build_alert(level: AlertLevel, desc: AlertDescription) -> Self {
        Self {
            version: ProtocolVersion::TLSv1_0,
            payload: MessagePayload::Alert(AlertMessagePayload {
                level,
                description: desc,
            }),
        }
    }

    pub fn build_handshake(parsed: HandshakeMessagePayload) -> Self {
        Self {
            version: ProtocolVersion::TLSv1_0,
            payload: MessagePayload::handshake(parsed),
        }
    }

    pub fn build_change_cipher_spec() -> Self {
        Self {
            version: ProtocolVersion::TLSv1_0,
            payload: MessagePayload::ChangeCipherSpec(ChangeCipherSpecPayload {}),
        }
    }
}

/// A TLS frame, named `TLSPlaintext` in the standard.
///
/// This type differs from `OpaqueMessage` because it borrows
/// its payload.  You can make a `OpaqueMessage` from an
/// `BorrowedPlainMessage`, but doing so involves a copy.
#[derive(Debug)]
pub struct BorrowedPlainMessage<'a> {
    pub typ: ContentType,
    pub version: ProtocolVersion,
    pub payload: &'a [u8],
}

impl<'a> BorrowedPlainMessage<'a> {
    pub fn to_unencrypted_opaque(&self) -> OpaqueMessage {
        OpaqueMessage {
            version: self.version,
            typ: self.typ,
            payload: Payload(self.payload.to_vec()),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum MessageError {
    TooShortForHeader,
    TooShortForLength,
    MessageTooLarge,
    UnknownProtocolVersion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_header_layout() {
        let m = PlainMessage {
            typ: ContentType::Alert,
            version: ProtocolVersion::TLSv1_0,
            payload: Payload::new(vec![2, 40]),
        };
        assert_eq!(
            m.into_unencrypted_opaque().encode(),
            vec![0x15, 0x03, 0x01, 0x00, 0x02, 0x02, 0x28]
        );
    }

    #[test]
    fn rejects_other_versions() {
        let mut r = Reader::init(&[0x16, 0x03, 0x03, 0x00, 0x00]);
        assert_eq!(
            OpaqueMessage::read(&mut r).unwrap_err(),
            MessageError::UnknownProtocolVersion
        );
    }

    #[test]
    fn rejects_oversized_records() {
        let mut r = Reader::init(&[0x17, 0x03, 0x01, 0x48, 0x01]);
        assert_eq!(
            OpaqueMessage::read(&mut r).unwrap_err(),
            MessageError::MessageTooLarge
        );
    }

    #[test]
    fn waits_for_whole_record() {
        let mut r = Reader::init(&[0x17, 0x03, 0x01, 0x00, 0x03, 0xaa]);
        assert_eq!(
            OpaqueMessage::read(&mut r).unwrap_err(),
            MessageError::TooShortForLength
        );
    }

    #[test]
    fn alert_message_to_plain() {
        let plain = PlainMessage::from(Message::build_alert(
            AlertLevel::Warning,
            AlertDescription::CloseNotify,
        ));
        assert_eq!(plain.typ, ContentType::Alert);
        assert_eq!(plain.payload.0, vec![1, 0]);
    }

    #[test]
    fn decodes_alert_and_ccs_bodies() {
        let alert = Message::try_from(PlainMessage {
            typ: ContentType::Alert,
            version: ProtocolVersion::TLSv1_0,
            payload: Payload::new(vec![2, 40]),
        })
        .unwrap();
        match alert.payload {
            MessagePayload::Alert(a) => {
                assert_eq!(a.level, AlertLevel::Fatal);
                assert_eq!(a.description, AlertDescription::HandshakeFailure);
            }
            _ => panic!("not an alert"),
        }

        let bad_ccs = Message::try_from(PlainMessage {
            typ: ContentType::ChangeCipherSpec,
            version: ProtocolVersion::TLSv1_0,
            payload: Payload::new(vec![2]),
        });
        assert_eq!(bad_ccs.unwrap_err(), InvalidMessage::InvalidCcs);
    }

    #[test]
    fn alert_with_trailing_data_is_rejected() {
        let err = Message::try_from(PlainMessage {
            typ: ContentType::Alert,
            version: ProtocolVersion::TLSv1_0,
            payload: Payload::new(vec![1, 0, 0]),
        })
        .unwrap_err();
        assert_eq!(err, InvalidMessage::TrailingData("AlertMessagePayload"));
    }

    #[test]
    fn unknown_content_type_does_not_decode() {
        let err = Message::try_from(PlainMessage {
            typ: ContentType::Unknown(0x42),
            version: ProtocolVersion::TLSv1_0,
            payload: Payload::new(vec![]),
        })
        .unwrap_err();
        assert_eq!(err, InvalidMessage::InvalidContentType);
    }

    #[test]
    fn ccs_message_to_plain() {
        let plain = PlainMessage::from(Message::build_change_cipher_spec());
        assert_eq!(plain.typ, ContentType::ChangeCipherSpec);
        assert_eq!(plain.payload.0, vec![1]);
    }
}
