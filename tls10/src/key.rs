use std::fmt;

/// This type contains a single certificate by value.
///
/// The bytes are opaque to this crate: interpreting them is the job of the
/// configured [`crate::verify::ServerCertVerifier`].  Usually they are an
/// ASN.1 DER-encoded X.509 certificate.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Certificate(pub Vec<u8>);

impl AsRef<[u8]> for Certificate {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Certificate({} bytes)", self.0.len())
    }
}
