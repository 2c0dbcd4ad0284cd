use std::fmt;

use dsa::Signature as DsaSignature;
use num_bigint_dig::BigUint;
use rand_core::OsRng;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use signature::{DigestSigner, DigestVerifier, SignatureEncoding};

use crate::error::Error;
use crate::hash_hs::HandshakeHash;

/// The kinds of key a TLS 1.0 peer can sign with.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// PKCS#1 v1.5 signatures over the MD5 and SHA-1 hashes together.
    RSA,
    /// DSA signatures over SHA-1.
    DSA,
}

/// The domain parameters and public value of a DSA key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DsaPublicKey {
    pub p: BigUint,
    pub q: BigUint,
    pub g: BigUint,
    pub y: BigUint,
}

/// The public key found in a server's end-entity certificate.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerPublicKey {
    Rsa(RsaPublicKey),
    Dsa(DsaPublicKey),
}

impl ServerPublicKey {
    /// Which kind of key this is.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::Rsa(_) => SignatureAlgorithm::RSA,
            Self::Dsa(_) => SignatureAlgorithm::DSA,
        }
    }

    /// Check `signature` over `message`, as sent in a ServerKeyExchange.
    pub(crate) fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), InvalidSignature> {
        match self {
            Self::Rsa(key) => {
                let mut hash = HandshakeHash::new();
                hash.update_raw(message);
                key.verify(Pkcs1v15Sign::new_unprefixed(), &hash.finish(), signature)
                    .map_err(|_| InvalidSignature)
            }
            Self::Dsa(key) => {
                let components =
                    dsa::Components::from_components(key.p.clone(), key.q.clone(), key.g.clone())
                        .map_err(|_| InvalidSignature)?;
                let verifying_key = dsa::VerifyingKey::from_components(components, key.y.clone())
                    .map_err(|_| InvalidSignature)?;
                let signature = DsaSignature::try_from(signature).map_err(|_| InvalidSignature)?;

                verifying_key
                    .verify_digest(Sha1::new_with_prefix(message), &signature)
                    .map_err(|_| InvalidSignature)
            }
        }
    }
}

/// A signature did not verify, or could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InvalidSignature;

/// A private key used to authenticate the client, through CertificateVerify.
pub enum SigningKey {
    Rsa(RsaPrivateKey),
    Dsa(dsa::SigningKey),
}

impl SigningKey {
    /// What kind of key we have.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::Rsa(_) => SignatureAlgorithm::RSA,
            Self::Dsa(_) => SignatureAlgorithm::DSA,
        }
    }

    /// Sign the handshake transcript.
    ///
    /// RSA keys sign the MD5 and SHA-1 hashes together; DSA keys sign
    /// only the SHA-1 one.
    pub(crate) fn sign_transcript(&self, transcript: HandshakeHash) -> Result<Vec<u8>, Error> {
        match self {
            Self::Rsa(key) => key
                .sign_with_rng(
                    &mut OsRng,
                    Pkcs1v15Sign::new_unprefixed(),
                    &transcript.finish(),
                )
                .map_err(|_| Error::General("RSA signing failed".into())),
            Self::Dsa(key) => {
                let signature: DsaSignature = key
                    .try_sign_digest(transcript.sha1())
                    .map_err(|_| Error::General("DSA signing failed".into()))?;
                Ok(signature.to_vec())
            }
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}
