use std::fmt;

use crate::enums::{CipherSuite, HandshakeType, ProtocolVersion};
use crate::error::InvalidMessage;
use crate::key;
use crate::msgs::base::{Payload, PayloadU16, PayloadU8};
use crate::msgs::codec::{self, Codec, Reader};
use crate::msgs::enums::{ClientCertificateType, Compression, ExtensionType};
use crate::suites::KeyExchangeAlgorithm;

/// The 32-byte hello random.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Random(pub [u8; 32]);

impl fmt::Debug for Random {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        super::base::hex(f, &self.0)
    }
}

impl Codec for Random {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        let bytes = match r.take(32) {
            Some(bytes) => bytes,
            None => return Err(InvalidMessage::MissingData("Random")),
        };

        let mut opaque = [0; 32];
        opaque.clone_from_slice(bytes);
        Ok(Self(opaque))
    }
}

impl From<[u8; 32]> for Random {
    #[inline]
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A session id of at most 32 bytes.  We never resume, so this is
/// only ever sent empty and read back to be ignored.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct SessionId {
    len: usize,
    data: [u8; 32],
}

impl SessionId {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        super::base::hex(f, &self.data[..self.len])
    }
}

impl Codec for SessionId {
    fn encode(&self, bytes: &mut Vec<u8>) {
        debug_assert!(self.len <= 32);
        bytes.push(self.len as u8);
        bytes.extend_from_slice(&self.data[..self.len]);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        let len = usize::from(u8::read(r)?);
        if len > 32 {
            return Err(InvalidMessage::TrailingData("SessionID"));
        }

        let bytes = match r.take(len) {
            Some(bytes) => bytes,
            None => return Err(InvalidMessage::MissingData("SessionID")),
        };

        let mut out = [0u8; 32];
        out[..len].clone_from_slice(&bytes[..len]);
        Ok(Self { data: out, len })
    }
}

impl Codec for key::Certificate {
    fn encode(&self, bytes: &mut Vec<u8>) {
        codec::u24(self.0.len() as u32).encode(bytes);
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        let len = usize::from(codec::u24::read(r)?);
        let mut sub = r.sub(len)?;
        let body = sub.rest().to_vec();
        Ok(Self(body))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnknownExtension {
    pub typ: ExtensionType,
    pub payload: Payload,
}

impl UnknownExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.payload.encode(bytes);
    }

    fn read(typ: ExtensionType, r: &mut Reader) -> Self {
        let payload = Payload::read(r);
        Self { typ, payload }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClientExtension {
    /// RFC 5054 section 2.8.1: the SRP username.
    SrpIdentity(PayloadU8),
    Unknown(UnknownExtension),
}

impl ClientExtension {
    pub fn ext_type(&self) -> ExtensionType {
        match self {
            Self::SrpIdentity(_) => ExtensionType::SRP,
            Self::Unknown(r) => r.typ,
        }
    }
}

impl Codec for ClientExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.ext_type().encode(bytes);

        let mut sub: Vec<u8> = Vec::new();
        match self {
            Self::SrpIdentity(r) => r.encode(&mut sub),
            Self::Unknown(r) => r.encode(&mut sub),
        }

        (sub.len() as u16).encode(bytes);
        bytes.append(&mut sub);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        let typ = ExtensionType::read(r)?;
        let len = usize::from(u16::read(r)?);
        let mut sub = r.sub(len)?;

        let ext = match typ {
            ExtensionType::SRP => Self::SrpIdentity(PayloadU8::read(&mut sub)?),
            _ => Self::Unknown(UnknownExtension::read(typ, &mut sub)),
        };

        sub.expect_empty("ClientExtension")
            .map(|_| ext)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ServerExtension {
    Unknown(UnknownExtension),
}

impl ServerExtension {
    pub fn ext_type(&self) -> ExtensionType {
        match self {
            Self::Unknown(r) => r.typ,
        }
    }
}

impl Codec for ServerExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.ext_type().encode(bytes);

        let mut sub: Vec<u8> = Vec::new();
        match self {
            Self::Unknown(r) => r.encode(&mut sub),
        }

        (sub.len() as u16).encode(bytes);
        bytes.append(&mut sub);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        let typ = ExtensionType::read(r)?;
        let len = usize::from(u16::read(r)?);
        let mut sub = r.sub(len)?;

        Ok(Self::Unknown(UnknownExtension::read(typ, &mut sub)))
    }
}

#[derive(Clone, Debug)]
pub struct ClientHelloPayload {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<Compression>,
    pub extensions: Vec<ClientExtension>,
}

impl Codec for ClientHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.client_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        codec::encode_vec_u16(bytes, &self.cipher_suites);
        codec::encode_vec_u8(bytes, &self.compression_methods);

        if !self.extensions.is_empty() {
            codec::encode_vec_u16(bytes, &self.extensions);
        }
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        let mut ret = Self {
            client_version: ProtocolVersion::read(r)?,
            random: Random::read(r)?,
            session_id: SessionId::read(r)?,
            cipher_suites: codec::read_vec_u16::<CipherSuite>(r)?,
            compression_methods: codec::read_vec_u8::<Compression>(r)?,
            extensions: Vec::new(),
        };

        if r.any_left() {
            ret.extensions = codec::read_vec_u16::<ClientExtension>(r)?;
        }

        r.expect_empty("ClientHelloPayload")
            .map(|_| ret)
    }
}

#[derive(Clone, Debug)]
pub struct ServerHelloPayload {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: Compression,
    pub extensions: Vec<ServerExtension>,
}

impl Codec for ServerHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.server_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        self.cipher_suite.encode(bytes);
        self.compression_method.encode(bytes);

        if !self.extensions.is_empty() {
            codec::encode_vec_u16(bytes, &self.extensions);
        }
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        let mut ret = Self {
            server_version: ProtocolVersion::read(r)?,
            random: Random::read(r)?,
            session_id: SessionId::read(r)?,
            cipher_suite: CipherSuite::read(r)?,
            compression_method: Compression::read(r)?,
            extensions: Vec::new(),
        };

        if r.any_left() {
            ret.extensions = codec::read_vec_u16::<ServerExtension>(r)?;
        }

        r.expect_empty("ServerHelloPayload")
            .map(|_| ret)
    }
}

pub type CertificatePayload = Vec<key::Certificate>;

impl Codec for CertificatePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        codec::encode_vec_u24(bytes, self);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        // 64KB of certificates is plenty, 16MB is obviously silly
        codec::read_vec_u24_limited(r, 0x10000)
    }
}

/// Diffie-Hellman group and the server's public value.
#[derive(Clone, Debug)]
pub struct ServerDhParams {
    pub dh_p: PayloadU16,
    pub dh_g: PayloadU16,
    pub dh_ys: PayloadU16,
}

impl Codec for ServerDhParams {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.dh_p.encode(bytes);
        self.dh_g.encode(bytes);
        self.dh_ys.encode(bytes);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        Ok(Self {
            dh_p: PayloadU16::read(r)?,
            dh_g: PayloadU16::read(r)?,
            dh_ys: PayloadU16::read(r)?,
        })
    }
}

/// RFC 5054 section 2.8.3: SRP group, salt and the server's public value.
#[derive(Clone, Debug)]
pub struct ServerSrpParams {
    pub srp_n: PayloadU16,
    pub srp_g: PayloadU16,
    pub srp_s: PayloadU8,
    pub srp_b: PayloadU16,
}

impl Codec for ServerSrpParams {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.srp_n.encode(bytes);
        self.srp_g.encode(bytes);
        self.srp_s.encode(bytes);
        self.srp_b.encode(bytes);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        Ok(Self {
            srp_n: PayloadU16::read(r)?,
            srp_g: PayloadU16::read(r)?,
            srp_s: PayloadU8::read(r)?,
            srp_b: PayloadU16::read(r)?,
        })
    }
}

#[derive(Clone, Debug)]
pub enum ServerKeyExchangeParams {
    Dh(ServerDhParams),
    Srp(ServerSrpParams),
}

impl ServerKeyExchangeParams {
    fn encode(&self, bytes: &mut Vec<u8>) {
        match self {
            Self::Dh(dh) => dh.encode(bytes),
            Self::Srp(srp) => srp.encode(bytes),
        }
    }

    /// The exact bytes covered by the server's signature.
    pub fn get_encoding(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.encode(&mut bytes);
        bytes
    }
}

#[derive(Clone, Debug)]
pub struct ServerKeyExchange {
    pub params: ServerKeyExchangeParams,
    /// Present when the key exchange algorithm is signed.
    pub signature: Option<PayloadU16>,
}

impl ServerKeyExchange {
    pub fn encode(&self, bytes: &mut Vec<u8>) {
        self.params.encode(bytes);
        if let Some(sig) = &self.signature {
            sig.encode(bytes);
        }
    }
}

#[derive(Clone, Debug)]
pub enum ServerKeyExchangePayload {
    Known(ServerKeyExchange),
    Unknown(Payload),
}

impl Codec for ServerKeyExchangePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        match self {
            Self::Known(x) => x.encode(bytes),
            Self::Unknown(x) => x.encode(bytes),
        }
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        // read as Unknown, fully parse when we know the
        // KeyExchangeAlgorithm
        Ok(Self::Unknown(Payload::read(r)))
    }
}

impl ServerKeyExchangePayload {
    pub fn unwrap_given_kxa(
        &self,
        kxa: KeyExchangeAlgorithm,
    ) -> Result<ServerKeyExchange, InvalidMessage> {
        let unknown = match self {
            Self::Known(known) => return Ok(known.clone()),
            Self::Unknown(unknown) => unknown,
        };

        let mut rd = Reader::init(&unknown.0);
        let params = match kxa {
            KeyExchangeAlgorithm::DHE_RSA | KeyExchangeAlgorithm::DHE_DSS => {
                ServerKeyExchangeParams::Dh(ServerDhParams::read(&mut rd)?)
            }
            KeyExchangeAlgorithm::SRP
            | KeyExchangeAlgorithm::SRP_RSA
            | KeyExchangeAlgorithm::SRP_DSS => {
                ServerKeyExchangeParams::Srp(ServerSrpParams::read(&mut rd)?)
            }
            KeyExchangeAlgorithm::RSA => {
                return Err(InvalidMessage::UnexpectedMessage("ServerKeyExchange"))
            }
        };

        let signature = match kxa.is_signed() {
            true => Some(PayloadU16::read(&mut rd)?),
            false => None,
        };

        rd.expect_empty("ServerKeyExchangePayload")
            .map(|_| ServerKeyExchange { params, signature })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DistinguishedName(pub PayloadU16);

impl Codec for DistinguishedName {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.0.encode(bytes);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        PayloadU16::read(r).map(Self)
    }
}

#[derive(Clone, Debug)]
pub struct CertificateRequestPayload {
    pub certtypes: Vec<ClientCertificateType>,
    pub canames: Vec<DistinguishedName>,
}

impl Codec for CertificateRequestPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        codec::encode_vec_u8(bytes, &self.certtypes);
        codec::encode_vec_u16(bytes, &self.canames);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        let certtypes = codec::read_vec_u8::<ClientCertificateType>(r)?;
        let canames = codec::read_vec_u16::<DistinguishedName>(r)?;

        Ok(Self { certtypes, canames })
    }
}

#[derive(Clone, Debug)]
pub enum HandshakePayload {
    HelloRequest,
    ClientHello(ClientHelloPayload),
    ServerHello(ServerHelloPayload),
    Certificate(CertificatePayload),
    ServerKeyExchange(ServerKeyExchangePayload),
    CertificateRequest(CertificateRequestPayload),
    ServerHelloDone,
    CertificateVerify(PayloadU16),
    ClientKeyExchange(PayloadU16),
    Finished(Payload),
    Unknown(Payload),
}

impl HandshakePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        use self::HandshakePayload::*;
        match self {
            HelloRequest | ServerHelloDone => {}
            ClientHello(x) => x.encode(bytes),
            ServerHello(x) => x.encode(bytes),
            Certificate(x) => x.encode(bytes),
            ServerKeyExchange(x) => x.encode(bytes),
            CertificateRequest(x) => x.encode(bytes),
            CertificateVerify(x) => x.encode(bytes),
            ClientKeyExchange(x) => x.encode(bytes),
            Finished(x) => x.encode(bytes),
            Unknown(x) => x.encode(bytes),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HandshakeMessagePayload {
    pub typ: HandshakeType,
    pub payload: HandshakePayload,
}

impl Codec for HandshakeMessagePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        // encode payload to learn length
        let mut sub: Vec<u8> = Vec::new();
        self.payload.encode(&mut sub);

        self.typ.encode(bytes);
        codec::u24(sub.len() as u32).encode(bytes);
        bytes.append(&mut sub);
    }

    fn read(r: &mut Reader) -> Result<Self, InvalidMessage> {
        let typ = HandshakeType::read(r)?;
        let len = usize::from(codec::u24::read(r)?);
        let mut sub = r.sub(len)?;

        let payload = match typ {
            HandshakeType::HelloRequest if sub.left() == 0 => HandshakePayload::HelloRequest,
            HandshakeType::ClientHello => {
                HandshakePayload::ClientHello(ClientHelloPayload::read(&mut sub)?)
            }
            HandshakeType::ServerHello => {
                HandshakePayload::ServerHello(ServerHelloPayload::read(&mut sub)?)
            }
            HandshakeType::Certificate => {
                HandshakePayload::Certificate(CertificatePayload::read(&mut sub)?)
            }
            HandshakeType::ServerKeyExchange => {
                HandshakePayload::ServerKeyExchange(ServerKeyExchangePayload::read(&mut sub)?)
            }
            HandshakeType::CertificateRequest => {
                HandshakePayload::CertificateRequest(CertificateRequestPayload::read(&mut sub)?)
            }
            HandshakeType::ServerHelloDone if sub.left() == 0 => HandshakePayload::ServerHelloDone,
            HandshakeType::CertificateVerify => {
                HandshakePayload::CertificateVerify(PayloadU16::read(&mut sub)?)
            }
            HandshakeType::ClientKeyExchange => {
                HandshakePayload::ClientKeyExchange(PayloadU16::read(&mut sub)?)
            }
            HandshakeType::Finished => HandshakePayload::Finished(Payload::read(&mut sub)),
            HandshakeType::HelloRequest | HandshakeType::ServerHelloDone => {
                return Err(InvalidMessage::TrailingData("HandshakeMessagePayload"))
            }
            _ => HandshakePayload::Unknown(Payload::read(&mut sub)),
        };

        sub.expect_empty("HandshakeMessagePayload")
            .map(|_| Self { typ, payload })
    }
}

impl HandshakeMessagePayload {
    pub fn build(typ: HandshakeType, payload: HandshakePayload) -> Self {
        Self { typ, payload }
    }
}
