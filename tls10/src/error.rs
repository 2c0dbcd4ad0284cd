use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::enums::{AlertDescription, ContentType, HandshakeType};
use crate::rand;

/// tls10 reports protocol errors using this type.
#[non_exhaustive]
#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// We received a TLS message that isn't valid right now.
    /// `expect_types` lists the message types we can expect right now.
    /// `got_type` is the type we found.  This error is typically
    /// caused by a buggy TLS stack (the peer or this one), a broken
    /// network, or an attack.
    InappropriateMessage {
        /// Which types we expected
        expect_types: Vec<ContentType>,
        /// What type we received
        got_type: ContentType,
    },

    /// We received a TLS handshake message that isn't valid right now.
    /// `expect_types` lists the handshake message types we can expect
    /// right now.  `got_type` is the type we found.
    InappropriateHandshakeMessage {
        /// Which handshake type we expected
        expect_types: Vec<HandshakeType>,
        /// What handshake type we received
        got_type: HandshakeType,
    },

    /// The peer sent us a TLS message with invalid contents.
    InvalidMessage(InvalidMessage),

    /// The peer didn't give us any certificates.
    NoCertificatesPresented,

    /// We couldn't decrypt a message, or the peer's Finished did
    /// not match our transcript.  This is invariably fatal.
    DecryptError,

    /// We couldn't encrypt a message because it was larger than the allowed message size.
    /// This should never happen if the application is using valid record sizes.
    EncryptError,

    /// The peer doesn't support a protocol version/feature we require.
    /// The parameter gives a hint as to what version/feature it is.
    PeerIncompatible(PeerIncompatible),

    /// The peer deviated from the standard TLS protocol.
    /// The parameter gives a hint where.
    PeerMisbehaved(PeerMisbehaved),

    /// The server's key exchange parameters were unusable, or
    /// computing our side of the exchange failed.
    KeyExchange(KeyExchangeError),

    /// We received a fatal alert.  This means the peer is unhappy.
    AlertReceived(AlertDescription),

    /// We saw an invalid certificate.
    ///
    /// The contained error is from the certificate validation trait
    /// implementation.
    InvalidCertificate(CertificateError),

    /// The underlying transport failed.  No alert is sent for these.
    Transport(TransportError),

    /// The supplied configuration cannot be used.
    Config(ConfigError),

    /// The connection has been closed, by us or by the peer.
    ConnectionClosed,

    /// A catch-all error for unlikely errors.
    General(String),

    /// We failed to acquire random bytes from the system.
    FailedToGetRandomBytes,

    /// This function doesn't work until the TLS handshake
    /// is complete.
    HandshakeNotComplete,

    /// The peer sent an oversized record/fragment.
    PeerSentOversizedRecord,

    /// Any other error.
    ///
    /// This variant should only be used when the error is not better described by a more
    /// specific variant.
    ///
    /// Enums holding this variant will never compare equal to each other.
    Other(OtherError),
}

/// The broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A message arrived in the wrong state, or was malformed.
    ProtocolViolation,
    /// A signature, Finished, MAC or key exchange check failed.
    CryptoFailure,
    /// The peer sent a fatal alert.
    PeerAlert,
    /// The underlying transport failed, or the connection is closed.
    TransportFailure,
    /// The caller's configuration is unusable.
    ConfigurationError,
    /// Local failures with no better home, such as random number generation.
    Internal,
}

impl Error {
    /// Which category this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InappropriateMessage { .. }
            | Self::InappropriateHandshakeMessage { .. }
            | Self::InvalidMessage(_)
            | Self::NoCertificatesPresented
            | Self::PeerIncompatible(_)
            | Self::PeerMisbehaved(_)
            | Self::PeerSentOversizedRecord
            | Self::HandshakeNotComplete => ErrorKind::ProtocolViolation,
            Self::DecryptError | Self::KeyExchange(_) | Self::InvalidCertificate(_) => {
                ErrorKind::CryptoFailure
            }
            Self::AlertReceived(_) => ErrorKind::PeerAlert,
            Self::Transport(_) | Self::ConnectionClosed => ErrorKind::TransportFailure,
            Self::Config(_) => ErrorKind::ConfigurationError,
            Self::EncryptError
            | Self::General(_)
            | Self::FailedToGetRandomBytes
            | Self::Other(_) => ErrorKind::Internal,
        }
    }
}

/// A corrupt TLS message payload that resulted in an error.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidMessage {
    /// An advertised message was larger then expected.
    HandshakePayloadTooLarge,
    /// The peer sent us a syntactically incorrect ChangeCipherSpec payload.
    InvalidCcs,
    /// An unknown content type was encountered during message decoding.
    InvalidContentType,
    /// A message was zero-length when its record kind forbids it.
    InvalidEmptyPayload,
    /// A TLS message payload was larger then allowed by the specification.
    MessageTooLarge,
    /// Message is shorter than the expected length
    MessageTooShort,
    /// Missing data for the named handshake payload value
    MissingData(&'static str),
    /// Trailing data found for the named handshake payload value
    TrailingData(&'static str),
    /// A peer sent an unexpected message type.
    UnexpectedMessage(&'static str),
    /// The record layer carried a version other than TLS 1.0.
    UnknownProtocolVersion,
}

impl From<InvalidMessage> for Error {
    #[inline]
    fn from(e: InvalidMessage) -> Self {
        Self::InvalidMessage(e)
    }
}

impl From<InvalidMessage> for AlertDescription {
    fn from(e: InvalidMessage) -> Self {
        match e {
            InvalidMessage::InvalidCcs | InvalidMessage::InvalidContentType => {
                Self::UnexpectedMessage
            }
            InvalidMessage::UnknownProtocolVersion => Self::ProtocolVersion,
            InvalidMessage::MessageTooLarge => Self::RecordOverflow,
            _ => Self::DecodeError,
        }
    }
}

#[non_exhaustive]
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Clone)]
/// The set of cases where we failed to make a connection because we thought
/// the peer was misbehaving.
///
/// This is `non_exhaustive`: we might add or stop using items here in minor
/// versions.  We also don't document what they mean.  Generally a user of
/// tls10 shouldn't vary its behaviour on these error codes, and there is
/// nothing it can do to improve matters.
pub enum PeerMisbehaved {
    CertificateKeyDoesNotMatchKeyExchange,
    CertificateKeyUsageForbidsKeyExchange,
    CertificateSentForAnonymousKeyExchange,
    KeyEpochWithPendingFragment,
    MessageInterleavedWithHandshakeMessage,
    SelectedUnofferedCipherSuite,
    SelectedUnofferedCompression,
    UnsolicitedServerHelloExtension,
}

impl From<PeerMisbehaved> for Error {
    #[inline]
    fn from(e: PeerMisbehaved) -> Self {
        Self::PeerMisbehaved(e)
    }
}

#[non_exhaustive]
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Clone)]
/// The set of cases where we failed to make a connection because a peer
/// doesn't support a TLS version/feature we require.
///
/// This is `non_exhaustive`: we might add or stop using items here in minor
/// versions.
pub enum PeerIncompatible {
    ServerDoesNotSupportTls10,
}

impl From<PeerIncompatible> for Error {
    #[inline]
    fn from(e: PeerIncompatible) -> Self {
        Self::PeerIncompatible(e)
    }
}

/// The ways in which the server's key exchange can fail.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeError {
    /// The server key exchange message could not be decoded.
    MalformedParameters,
    /// The signature over the server's parameters did not verify.
    BadSignature,
    /// A group or public value was out of range.
    IllegalParameter,
    /// The certificate did not carry the key the exchange needs.
    MissingServerKey,
    /// Encrypting the pre-master secret under the server's key failed.
    EncryptionFailed,
}

impl KeyExchangeError {
    /// The alert we send for this failure.
    pub fn alert(&self) -> AlertDescription {
        match self {
            Self::MalformedParameters => AlertDescription::DecodeError,
            Self::BadSignature => AlertDescription::BadCertificate,
            Self::IllegalParameter => AlertDescription::IllegalParameter,
            Self::MissingServerKey => AlertDescription::CertificateUnknown,
            Self::EncryptionFailed => AlertDescription::InternalError,
        }
    }
}

impl From<KeyExchangeError> for Error {
    #[inline]
    fn from(e: KeyExchangeError) -> Self {
        Self::KeyExchange(e)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone)]
/// The ways in which certificate validators can express errors.
///
/// Note that the TLS protocol code interprets specifically these
/// error codes to send specific TLS alerts.  Therefore, if a
/// custom certificate validator uses incorrect errors the library as
/// a whole will send alerts that do not match the standard (this is usually
/// a minor issue, but could be misleading).
pub enum CertificateError {
    /// The certificate is not correctly encoded.
    BadEncoding,

    /// The current time is after the `notAfter` time in the certificate.
    Expired,

    /// The current time is before the `notBefore` time in the certificate.
    NotValidYet,

    /// The certificate has been revoked.
    Revoked,

    /// The certificate chain is not issued by a known root certificate.
    UnknownIssuer,

    /// A certificate is not correctly signed by the key of its alleged
    /// issuer.
    BadSignature,

    /// The subject names in an end-entity certificate do not include
    /// the expected name.
    NotValidForName,

    /// The certificate is being used for a different purpose than allowed.
    InvalidPurpose,

    /// The certificate is valid, but the handshake is rejected for other
    /// reasons.
    ApplicationVerificationFailure,

    /// Any other error.
    ///
    /// Enums holding this variant will never compare equal to each other.
    Other(OtherError),
}

impl PartialEq<Self> for CertificateError {
    fn eq(&self, other: &Self) -> bool {
        use CertificateError::*;
        #[allow(clippy::match_like_matches_macro)]
        match (self, other) {
            (BadEncoding, BadEncoding) => true,
            (Expired, Expired) => true,
            (NotValidYet, NotValidYet) => true,
            (Revoked, Revoked) => true,
            (UnknownIssuer, UnknownIssuer) => true,
            (BadSignature, BadSignature) => true,
            (NotValidForName, NotValidForName) => true,
            (InvalidPurpose, InvalidPurpose) => true,
            (ApplicationVerificationFailure, ApplicationVerificationFailure) => true,
            _ => false,
        }
    }
}

// The following mapping are heavily referenced in:
// * [OpenSSL Implementation](https://github.com/openssl/openssl/blob/45bb98bfa223efd3258f445ad443f878011450f0/ssl/statem/statem_lib.c#L1434)
// * [BoringSSL Implementation](https://github.com/google/boringssl/blob/583c60bd4bf76d61b2634a58bcda99a92de106cb/ssl/ssl_x509.cc#L1323)
impl From<CertificateError> for AlertDescription {
    fn from(e: CertificateError) -> Self {
        use CertificateError::*;
        match e {
            BadEncoding | NotValidForName => Self::BadCertificate,
            Expired | NotValidYet => Self::CertificateExpired,
            Revoked => Self::CertificateRevoked,
            UnknownIssuer => Self::UnknownCA,
            BadSignature => Self::DecryptError,
            InvalidPurpose => Self::UnsupportedCertificate,
            ApplicationVerificationFailure => Self::UserCanceled,
            Other(_) => Self::CertificateUnknown,
        }
    }
}

impl From<CertificateError> for Error {
    #[inline]
    fn from(e: CertificateError) -> Self {
        Self::InvalidCertificate(e)
    }
}

/// Problems with a [`crate::ClientConfig`], found when it is built.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No cipher suites were enabled.
    NoCipherSuites,
    /// SRP suites were enabled without an identity and password.
    SrpSuitesWithoutCredentials,
    /// SRP credentials were given but no SRP suite is enabled.
    SrpCredentialsWithoutSuites,
    /// The client certificate chain was empty.
    EmptyClientCertChain,
}

impl From<ConfigError> for Error {
    #[inline]
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// An I/O error from the underlying transport.
///
/// Two of these compare equal if their `io::ErrorKind`s do.
#[derive(Debug, Clone)]
pub struct TransportError(pub Arc<io::Error>);

impl PartialEq<Self> for TransportError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Transport(TransportError(Arc::new(e)))
    }
}

fn join<T: fmt::Debug>(items: &[T]) -> String {
    items
        .iter()
        .map(|x| format!("{:?}", x))
        .collect::<Vec<String>>()
        .join(" or ")
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::InappropriateMessage {
                ref expect_types,
                ref got_type,
            } => write!(
                f,
                "received unexpected message: got {:?} when expecting {}",
                got_type,
                join::<ContentType>(expect_types)
            ),
            Self::InappropriateHandshakeMessage {
                ref expect_types,
                ref got_type,
            } => write!(
                f,
                "received unexpected handshake message: got {:?} when expecting {}",
                got_type,
                join::<HandshakeType>(expect_types)
            ),
            Self::InvalidMessage(ref typ) => {
                write!(f, "received corrupt message of type {:?}", typ)
            }
            Self::PeerIncompatible(ref why) => write!(f, "peer is incompatible: {:?}", why),
            Self::PeerMisbehaved(ref why) => write!(f, "peer misbehaved: {:?}", why),
            Self::KeyExchange(ref why) => write!(f, "key exchange failed: {:?}", why),
            Self::AlertReceived(ref alert) => write!(f, "received fatal alert: {:?}", alert),
            Self::InvalidCertificate(ref err) => {
                write!(f, "invalid peer certificate: {:?}", err)
            }
            Self::Transport(ref err) => write!(f, "transport failed: {}", err.0),
            Self::Config(ref err) => write!(f, "unusable configuration: {:?}", err),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::NoCertificatesPresented => write!(f, "peer sent no certificates"),
            Self::DecryptError => write!(f, "cannot decrypt peer's message"),
            Self::EncryptError => write!(f, "cannot encrypt message"),
            Self::PeerSentOversizedRecord => write!(f, "peer sent excess record size"),
            Self::HandshakeNotComplete => write!(f, "handshake not complete"),
            Self::FailedToGetRandomBytes => write!(f, "failed to get random bytes"),
            Self::General(ref err) => write!(f, "unexpected error: {}", err),
            Self::Other(ref err) => write!(f, "other error: {}", err),
        }
    }
}

impl StdError for Error {}

impl From<rand::GetRandomFailed> for Error {
    fn from(_: rand::GetRandomFailed) -> Self {
        Self::FailedToGetRandomBytes
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Transport(TransportError(inner)) => Self::new(inner.kind(), inner.to_string()),
            Error::ConnectionClosed => Self::new(io::ErrorKind::NotConnected, e),
            _ => Self::new(io::ErrorKind::InvalidData, e),
        }
    }
}

/// Any other error that cannot be expressed by a more specific [`Error`] variant.
///
/// Enums holding this type will never compare equal to each other.
#[derive(Debug, Clone)]
pub struct OtherError(pub Arc<dyn StdError + Send + Sync>);

impl PartialEq<Self> for OtherError {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl From<OtherError> for Error {
    fn from(value: OtherError) -> Self {
        Self::Other(value)
    }
}

impl fmt::Display for OtherError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for OtherError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::{CertificateError, Error, ErrorKind, InvalidMessage, KeyExchangeError, OtherError};
    use crate::enums::AlertDescription;
    use std::io;
    use std::sync::Arc;

    #[test]
    fn certificate_error_equality() {
        use super::CertificateError::*;
        assert_eq!(BadEncoding, BadEncoding);
        assert_eq!(UnknownIssuer, UnknownIssuer);
        assert_ne!(Expired, Revoked);
        let other = Other(OtherError(Arc::from(Box::from(""))));
        assert_ne!(other, other);
    }

    #[test]
    fn certificate_error_alerts() {
        assert_eq!(
            AlertDescription::from(CertificateError::UnknownIssuer),
            AlertDescription::UnknownCA
        );
        assert_eq!(
            AlertDescription::from(CertificateError::ApplicationVerificationFailure),
            AlertDescription::UserCanceled
        );
    }

    #[test]
    fn key_exchange_alerts() {
        assert_eq!(
            KeyExchangeError::IllegalParameter.alert(),
            AlertDescription::IllegalParameter
        );
        assert_eq!(
            KeyExchangeError::BadSignature.alert(),
            AlertDescription::BadCertificate
        );
    }

    #[test]
    fn kinds() {
        assert_eq!(
            Error::from(InvalidMessage::TrailingData("x")).kind(),
            ErrorKind::ProtocolViolation
        );
        assert_eq!(Error::DecryptError.kind(), ErrorKind::CryptoFailure);
        assert_eq!(
            Error::AlertReceived(AlertDescription::HandshakeFailure).kind(),
            ErrorKind::PeerAlert
        );
        assert_eq!(
            Error::from(io::Error::from(io::ErrorKind::BrokenPipe)).kind(),
            ErrorKind::TransportFailure
        );
        assert_eq!(
            Error::from(super::ConfigError::NoCipherSuites).kind(),
            ErrorKind::ConfigurationError
        );
        assert_eq!(
            Error::from(super::ConfigError::SrpSuitesWithoutCredentials).kind(),
            ErrorKind::ConfigurationError
        );
    }

    #[test]
    fn smoke() {
        use crate::enums::{ContentType, HandshakeType};

        let all = vec![
            Error::InappropriateMessage {
                expect_types: vec![ContentType::Alert],
                got_type: ContentType::Handshake,
            },
            Error::InappropriateHandshakeMessage {
                expect_types: vec![HandshakeType::ClientHello, HandshakeType::Finished],
                got_type: HandshakeType::ServerKeyExchange,
            },
            Error::InvalidMessage(InvalidMessage::InvalidCcs),
            Error::NoCertificatesPresented,
            Error::DecryptError,
            super::PeerIncompatible::ServerDoesNotSupportTls10.into(),
            super::PeerMisbehaved::SelectedUnofferedCipherSuite.into(),
            KeyExchangeError::IllegalParameter.into(),
            Error::AlertReceived(AlertDescription::ExportRestriction),
            super::CertificateError::Expired.into(),
            Error::ConnectionClosed,
            Error::General("undocumented error".to_string()),
            Error::FailedToGetRandomBytes,
            Error::HandshakeNotComplete,
            Error::PeerSentOversizedRecord,
            Error::Other(OtherError(Arc::from(Box::from("")))),
        ];

        for err in all {
            println!("{:?}:", err);
            println!("  fmt '{}'", err);
        }
    }

    #[test]
    fn transport_errors_keep_their_kind() {
        let err = Error::from(io::Error::from(io::ErrorKind::ConnectionReset));
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::ConnectionReset);
    }
}
