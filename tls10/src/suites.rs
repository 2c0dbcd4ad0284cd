use std::fmt;

use crate::enums::CipherSuite;
use crate::sign::SignatureAlgorithm;
use crate::verify::KeyUsage;

/// How the premaster secret is agreed, and how the server
/// authenticates itself while doing so.
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyExchangeAlgorithm {
    /// The premaster secret is encrypted to the certified RSA key.
    RSA,
    /// Ephemeral Diffie-Hellman, signed by an RSA key.
    DHE_RSA,
    /// Ephemeral Diffie-Hellman, signed by a DSA key.
    DHE_DSS,
    /// Secure Remote Password, with no server certificate.
    SRP,
    /// Secure Remote Password, parameters signed by an RSA key.
    SRP_RSA,
    /// Secure Remote Password, parameters signed by a DSA key.
    SRP_DSS,
}

impl KeyExchangeAlgorithm {
    /// Does the ServerKeyExchange carry a signature?
    pub fn is_signed(self) -> bool {
        !matches!(self, Self::RSA | Self::SRP)
    }

    /// Is this one of the SRP families?
    pub fn is_srp(self) -> bool {
        matches!(self, Self::SRP | Self::SRP_RSA | Self::SRP_DSS)
    }

    /// Does the server send a Certificate?
    pub fn expects_certificate(self) -> bool {
        self != Self::SRP
    }

    /// Does the server send a ServerKeyExchange?
    pub fn expects_server_kx(self) -> bool {
        self != Self::RSA
    }

    /// The kind of key the server's certificate must carry, if any.
    pub fn certificate_key_algorithm(self) -> Option<SignatureAlgorithm> {
        match self {
            Self::RSA | Self::DHE_RSA | Self::SRP_RSA => Some(SignatureAlgorithm::RSA),
            Self::DHE_DSS | Self::SRP_DSS => Some(SignatureAlgorithm::DSA),
            Self::SRP => None,
        }
    }

    /// Whether a certificate with `usage` may be used for this exchange.
    ///
    /// Certificates without a key usage extension may be used for anything.
    pub fn permitted_by(self, usage: &KeyUsage) -> bool {
        match self {
            Self::RSA => usage.key_encipherment,
            Self::DHE_RSA | Self::SRP_RSA => usage.digital_signature,
            Self::DHE_DSS | Self::SRP_DSS | Self::SRP => true,
        }
    }
}

/// The bulk cipher a suite protects records with.  The MAC is always HMAC-SHA1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkAlgorithm {
    /// AES with 128-bit keys, in CBC mode.
    Aes128Cbc,
    /// AES with 256-bit keys, in CBC mode.
    Aes256Cbc,
    /// Three-key triple DES, in CBC mode.
    TripleDesEdeCbc,
}

impl BulkAlgorithm {
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128Cbc => 16,
            Self::Aes256Cbc => 32,
            Self::TripleDesEdeCbc => 24,
        }
    }

    /// The cipher's block size, which is also the length of its IV.
    pub fn block_len(self) -> usize {
        match self {
            Self::Aes128Cbc | Self::Aes256Cbc => 16,
            Self::TripleDesEdeCbc => 8,
        }
    }
}

/// Length of an HMAC-SHA1 key and tag.
pub(crate) const MAC_LEN: usize = 20;

/// A cipher suite supported by this crate.
///
/// All possible instances of this type are provided by the library in
/// the [`ALL_CIPHER_SUITES`] array.
pub struct SupportedCipherSuite {
    /// The TLS enumeration naming this cipher suite.
    pub suite: CipherSuite,
    /// How to exchange/agree keys.
    pub kx: KeyExchangeAlgorithm,
    /// How to protect records.
    pub bulk: BulkAlgorithm,
}

impl SupportedCipherSuite {
    /// The cipher suite's identifier
    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// How many bytes of key material the suite needs: two MAC keys,
    /// two cipher keys and two IVs.
    pub(crate) fn key_block_len(&self) -> usize {
        (MAC_LEN + self.bulk.key_len() + self.bulk.block_len()) * 2
    }
}

impl PartialEq for SupportedCipherSuite {
    fn eq(&self, other: &Self) -> bool {
        self.suite == other.suite
    }
}

impl fmt::Debug for SupportedCipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.suite.fmt(f)
    }
}

macro_rules! cipher_suite {
    ($name:ident, $kx:ident, $bulk:ident) => {
        #[doc = concat!("The TLS1.0 ciphersuite ", stringify!($name))]
        pub static $name: SupportedCipherSuite = SupportedCipherSuite {
            suite: CipherSuite::$name,
            kx: KeyExchangeAlgorithm::$kx,
            bulk: BulkAlgorithm::$bulk,
        };
    };
}

cipher_suite!(TLS_RSA_WITH_3DES_EDE_CBC_SHA, RSA, TripleDesEdeCbc);
cipher_suite!(TLS_DHE_DSS_WITH_3DES_EDE_CBC_SHA, DHE_DSS, TripleDesEdeCbc);
cipher_suite!(TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA, DHE_RSA, TripleDesEdeCbc);
cipher_suite!(TLS_RSA_WITH_AES_128_CBC_SHA, RSA, Aes128Cbc);
cipher_suite!(TLS_DHE_DSS_WITH_AES_128_CBC_SHA, DHE_DSS, Aes128Cbc);
cipher_suite!(TLS_DHE_RSA_WITH_AES_128_CBC_SHA, DHE_RSA, Aes128Cbc);
cipher_suite!(TLS_RSA_WITH_AES_256_CBC_SHA, RSA, Aes256Cbc);
cipher_suite!(TLS_DHE_DSS_WITH_AES_256_CBC_SHA, DHE_DSS, Aes256Cbc);
cipher_suite!(TLS_DHE_RSA_WITH_AES_256_CBC_SHA, DHE_RSA, Aes256Cbc);
cipher_suite!(TLS_SRP_SHA_WITH_3DES_EDE_CBC_SHA, SRP, TripleDesEdeCbc);
cipher_suite!(TLS_SRP_SHA_RSA_WITH_3DES_EDE_CBC_SHA, SRP_RSA, TripleDesEdeCbc);
cipher_suite!(TLS_SRP_SHA_DSS_WITH_3DES_EDE_CBC_SHA, SRP_DSS, TripleDesEdeCbc);
cipher_suite!(TLS_SRP_SHA_WITH_AES_128_CBC_SHA, SRP, Aes128Cbc);
cipher_suite!(TLS_SRP_SHA_RSA_WITH_AES_128_CBC_SHA, SRP_RSA, Aes128Cbc);
cipher_suite!(TLS_SRP_SHA_DSS_WITH_AES_128_CBC_SHA, SRP_DSS, Aes128Cbc);
cipher_suite!(TLS_SRP_SHA_WITH_AES_256_CBC_SHA, SRP, Aes256Cbc);
cipher_suite!(TLS_SRP_SHA_RSA_WITH_AES_256_CBC_SHA, SRP_RSA, Aes256Cbc);
cipher_suite!(TLS_SRP_SHA_DSS_WITH_AES_256_CBC_SHA, SRP_DSS, Aes256Cbc);

/// A list of all the cipher suites supported by this crate, in
/// order of preference.
pub static ALL_CIPHER_SUITES: &[&SupportedCipherSuite] = &[
    &TLS_SRP_SHA_DSS_WITH_AES_256_CBC_SHA,
    &TLS_SRP_SHA_RSA_WITH_AES_256_CBC_SHA,
    &TLS_SRP_SHA_WITH_AES_256_CBC_SHA,
    &TLS_DHE_DSS_WITH_AES_256_CBC_SHA,
    &TLS_DHE_RSA_WITH_AES_256_CBC_SHA,
    &TLS_RSA_WITH_AES_256_CBC_SHA,
    &TLS_SRP_SHA_DSS_WITH_AES_128_CBC_SHA,
    &TLS_SRP_SHA_RSA_WITH_AES_128_CBC_SHA,
    &TLS_SRP_SHA_WITH_AES_128_CBC_SHA,
    &TLS_DHE_DSS_WITH_AES_128_CBC_SHA,
    &TLS_DHE_RSA_WITH_AES_128_CBC_SHA,
    &TLS_RSA_WITH_AES_128_CBC_SHA,
    &TLS_SRP_SHA_DSS_WITH_3DES_EDE_CBC_SHA,
    &TLS_SRP_SHA_RSA_WITH_3DES_EDE_CBC_SHA,
    &TLS_SRP_SHA_WITH_3DES_EDE_CBC_SHA,
    &TLS_DHE_DSS_WITH_3DES_EDE_CBC_SHA,
    &TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA,
    &TLS_RSA_WITH_3DES_EDE_CBC_SHA,
];

/// Look up a supported suite by its identifier.
pub fn lookup(suite: CipherSuite) -> Option<&'static SupportedCipherSuite> {
    ALL_CIPHER_SUITES
        .iter()
        .find(|scs| scs.suite == suite)
        .copied()
}

/// The suites in `all` usable without SRP credentials, in order.
pub(crate) fn without_srp(all: &[&'static SupportedCipherSuite]) -> Vec<&'static SupportedCipherSuite> {
    all.iter()
        .filter(|scs| !scs.kx.is_srp())
        .copied()
        .collect()
}
