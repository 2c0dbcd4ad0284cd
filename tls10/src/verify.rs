use std::fmt::Debug;

use crate::error::CertificateError;
use crate::key::Certificate;
use crate::sign::ServerPublicKey;

// Marker types.  These are used to bind the fact some verification
// (certificate chain or Finished message) has taken place into
// protocol states.  We use this to have the compiler check that there
// are no 'goto fail'-style elisions of important checks.

/// Zero-sized marker type representing verification of a server cert chain.
#[derive(Debug)]
pub(crate) struct ServerCertVerified(());

impl ServerCertVerified {
    pub(crate) fn assertion() -> Self {
        Self(())
    }
}

#[derive(Debug)]
pub(crate) struct FinishedMessageVerified(());

impl FinishedMessageVerified {
    pub(crate) fn assertion() -> Self {
        Self(())
    }
}

/// The key usage bits of a certificate that matter to a TLS 1.0 client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyUsage {
    pub digital_signature: bool,
    pub key_encipherment: bool,
}

/// What a verifier learned from an acceptable server certificate chain.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerCertInfo {
    /// The end-entity certificate's public key.
    pub public_key: ServerPublicKey,
    /// The end-entity certificate's key usage extension, if it has one.
    pub key_usage: Option<KeyUsage>,
}

/// Something that can verify a server certificate chain.
///
/// Certificate parsing, path building and revocation all live behind
/// this trait; the handshake only sees the leaf key it returns.
pub trait ServerCertVerifier: Debug + Send + Sync {
    /// Verify the server's certificate chain, end-entity certificate first.
    ///
    /// The chain is the raw list the server sent and has not been
    /// checked in any way.  An error here is sent to the server as
    /// an alert chosen by the [`CertificateError`].
    fn verify_server_cert(&self, chain: &[Certificate]) -> Result<ServerCertInfo, CertificateError>;
}

/// A verifier that accepts exactly the end-entity certificates it was
/// given, each paired with its public key.
#[derive(Debug, Default)]
pub struct PinnedKeyVerifier {
    pins: Vec<(Certificate, ServerCertInfo)>,
}

impl PinnedKeyVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `cert` as an end-entity certificate, carrying `info`.
    pub fn with_pin(mut self, cert: Certificate, info: ServerCertInfo) -> Self {
        self.pins.push((cert, info));
        self
    }
}

impl ServerCertVerifier for PinnedKeyVerifier {
    fn verify_server_cert(&self, chain: &[Certificate]) -> Result<ServerCertInfo, CertificateError> {
        let end_entity = chain
            .first()
            .ok_or(CertificateError::BadEncoding)?;

        self.pins
            .iter()
            .find(|(cert, _)| cert == end_entity)
            .map(|(_, info)| info.clone())
            .ok_or(CertificateError::UnknownIssuer)
    }
}
