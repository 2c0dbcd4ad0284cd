use std::sync::Arc;

use num_bigint_dig::prime::probably_prime;
use num_bigint_dig::BigUint;
use num_traits::Zero;
use rand_core::OsRng;
use rsa::Pkcs1v15Encrypt;
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use crate::client::SrpCredentials;
use crate::conn::ConnectionRandoms;
use crate::enums::ProtocolVersion;
use crate::error::{ConfigError, Error, KeyExchangeError};
use crate::msgs::handshake::{ServerDhParams, ServerKeyExchange, ServerKeyExchangeParams, ServerSrpParams};
use crate::rand;
use crate::sign::ServerPublicKey;
use crate::suites::KeyExchangeAlgorithm;

/// Miller-Rabin rounds used to check a server's DH prime.
const PRIMALITY_ROUNDS: usize = 20;

/// What a finished key exchange gives us.
pub(crate) struct KeyExchangeOutput {
    /// The body of our ClientKeyExchange message.
    pub(crate) client_contribution: Vec<u8>,
    pub(crate) pre_master_secret: Zeroizing<Vec<u8>>,
}

/// One family of key exchange, chosen once from the negotiated suite.
///
/// The server's parameters (if the family has any) are checked on
/// arrival by `process_server_key_exchange`; the exchange is
/// completed by `negotiate` once the server's flight is over.
pub(crate) trait KeyExchange: Send + Sync {
    /// Validate the server's parameters, and the signature over them
    /// when the family is signed.
    fn process_server_key_exchange(
        &mut self,
        skx: &ServerKeyExchange,
        randoms: &ConnectionRandoms,
        server_key: Option<&ServerPublicKey>,
    ) -> Result<(), KeyExchangeError>;

    /// Compute our contribution and the pre-master secret.
    fn negotiate(
        self: Box<Self>,
        server_key: Option<&ServerPublicKey>,
    ) -> Result<KeyExchangeOutput, Error>;
}

/// Make the key exchange for `kxa`.
///
/// SRP exchanges need credentials; a config that enables SRP suites
/// always has them.
pub(crate) fn start(
    kxa: KeyExchangeAlgorithm,
    srp_credentials: Option<&Arc<SrpCredentials>>,
) -> Result<Box<dyn KeyExchange>, ConfigError> {
    Ok(match kxa {
        KeyExchangeAlgorithm::RSA => Box::new(RsaKeyExchange),
        KeyExchangeAlgorithm::DHE_RSA | KeyExchangeAlgorithm::DHE_DSS => {
            Box::new(DheKeyExchange { kxa, params: None })
        }
        KeyExchangeAlgorithm::SRP
        | KeyExchangeAlgorithm::SRP_RSA
        | KeyExchangeAlgorithm::SRP_DSS => Box::new(SrpKeyExchange {
            kxa,
            credentials: srp_credentials
                .cloned()
                .ok_or(ConfigError::SrpSuitesWithoutCredentials)?,
            params: None,
        }),
    })
}

/// The pre-master secret is random, and encrypted to the server's
/// certified RSA key.
struct RsaKeyExchange;

impl KeyExchange for RsaKeyExchange {
    fn process_server_key_exchange(
        &mut self,
        _skx: &ServerKeyExchange,
        _randoms: &ConnectionRandoms,
        _server_key: Option<&ServerPublicKey>,
    ) -> Result<(), KeyExchangeError> {
        Err(KeyExchangeError::MalformedParameters)
    }

    fn negotiate(
        self: Box<Self>,
        server_key: Option<&ServerPublicKey>,
    ) -> Result<KeyExchangeOutput, Error> {
        let key = match server_key {
            Some(ServerPublicKey::Rsa(key)) => key,
            _ => return Err(KeyExchangeError::MissingServerKey.into()),
        };

        let mut pre_master_secret = Zeroizing::new(vec![0u8; 48]);
        pre_master_secret[..2].copy_from_slice(&ProtocolVersion::TLSv1_0.to_array());
        rand::fill_random(&mut pre_master_secret[2..])?;

        let client_contribution = key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &pre_master_secret)
            .map_err(|_| KeyExchangeError::EncryptionFailed)?;

        Ok(KeyExchangeOutput {
            client_contribution,
            pre_master_secret,
        })
    }
}

struct DhParams {
    p: BigUint,
    g: BigUint,
    ys: BigUint,
}

impl DhParams {
    /// Decode and range-check the server's group and public value.
    fn new(dh: &ServerDhParams) -> Result<Self, KeyExchangeError> {
        let p = BigUint::from_bytes_be(&dh.dh_p.0);
        let g = BigUint::from_bytes_be(&dh.dh_g.0);
        let ys = BigUint::from_bytes_be(&dh.dh_ys.0);

        let two = BigUint::from(2u32);
        if p <= two || !probably_prime(&p, PRIMALITY_ROUNDS) {
            return Err(KeyExchangeError::IllegalParameter);
        }

        let p_minus_one = &p - BigUint::from(1u32);
        let p_minus_two = &p - &two;
        if g < two || g > p_minus_two || ys < two || ys > p_minus_one {
            return Err(KeyExchangeError::IllegalParameter);
        }

        Ok(Self { p, g, ys })
    }
}

/// Ephemeral Diffie-Hellman over a group the server picks.
struct DheKeyExchange {
    kxa: KeyExchangeAlgorithm,
    params: Option<DhParams>,
}

impl KeyExchange for DheKeyExchange {
    fn process_server_key_exchange(
        &mut self,
        skx: &ServerKeyExchange,
        randoms: &ConnectionRandoms,
        server_key: Option<&ServerPublicKey>,
    ) -> Result<(), KeyExchangeError> {
        let dh = match &skx.params {
            ServerKeyExchangeParams::Dh(dh) => dh,
            ServerKeyExchangeParams::Srp(_) => return Err(KeyExchangeError::MalformedParameters),
        };

        let params = DhParams::new(dh)?;
        verify_signed_params(self.kxa, skx, randoms, server_key)?;
        self.params = Some(params);
        Ok(())
    }

    fn negotiate(
        self: Box<Self>,
        _server_key: Option<&ServerPublicKey>,
    ) -> Result<KeyExchangeOutput, Error> {
        let params = self
            .params
            .ok_or(KeyExchangeError::MalformedParameters)?;

        let x = random_exponent(&params.p)?;
        let yc = params.g.modpow(&x, &params.p);
        let z = Zeroizing::new(params.ys.modpow(&x, &params.p));

        Ok(KeyExchangeOutput {
            client_contribution: yc.to_bytes_be(),
            pre_master_secret: Zeroizing::new(z.to_bytes_be()),
        })
    }
}

struct SrpParams {
    n: BigUint,
    g: BigUint,
    salt: Vec<u8>,
    b: BigUint,
}

impl SrpParams {
    fn new(srp: &ServerSrpParams) -> Result<Self, KeyExchangeError> {
        let n = BigUint::from_bytes_be(&srp.srp_n.0);
        let g = BigUint::from_bytes_be(&srp.srp_g.0);
        let b = BigUint::from_bytes_be(&srp.srp_b.0);

        let two = BigUint::from(2u32);
        if n <= BigUint::from(3u32) || g < two || g >= n {
            return Err(KeyExchangeError::IllegalParameter);
        }

        // RFC 5054 section 2.5.4: abort if B % N is zero.
        if (&b % &n).is_zero() {
            return Err(KeyExchangeError::IllegalParameter);
        }

        Ok(Self {
            n,
            g,
            salt: srp.srp_s.0.clone(),
            b,
        })
    }

    /// `x = SHA1(s | SHA1(I | ":" | P))`
    fn private_key(&self, credentials: &SrpCredentials) -> Zeroizing<BigUint> {
        let inner = Sha1::new()
            .chain_update(&credentials.identity)
            .chain_update(b":")
            .chain_update(credentials.password.as_slice())
            .finalize();
        let outer = Sha1::new()
            .chain_update(&self.salt)
            .chain_update(inner)
            .finalize();
        Zeroizing::new(BigUint::from_bytes_be(&outer))
    }

    /// `SHA1(PAD(a) | PAD(b))`, padding to the length of N.
    fn hash_padded(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let len = self.n.to_bytes_be().len();
        let digest = Sha1::new()
            .chain_update(pad(a, len))
            .chain_update(pad(b, len))
            .finalize();
        BigUint::from_bytes_be(&digest)
    }
}

fn pad(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut out = vec![0u8; len.saturating_sub(bytes.len())];
    out.extend_from_slice(&bytes);
    out
}

/// The client side of SRP-6a, as used by RFC 5054.
struct SrpKeyExchange {
    kxa: KeyExchangeAlgorithm,
    credentials: Arc<SrpCredentials>,
    params: Option<SrpParams>,
}

impl KeyExchange for SrpKeyExchange {
    fn process_server_key_exchange(
        &mut self,
        skx: &ServerKeyExchange,
        randoms: &ConnectionRandoms,
        server_key: Option<&ServerPublicKey>,
    ) -> Result<(), KeyExchangeError> {
        let srp = match &skx.params {
            ServerKeyExchangeParams::Srp(srp) => srp,
            ServerKeyExchangeParams::Dh(_) => return Err(KeyExchangeError::MalformedParameters),
        };

        let params = SrpParams::new(srp)?;
        verify_signed_params(self.kxa, skx, randoms, server_key)?;
        self.params = Some(params);
        Ok(())
    }

    fn negotiate(
        self: Box<Self>,
        _server_key: Option<&ServerPublicKey>,
    ) -> Result<KeyExchangeOutput, Error> {
        let params = self
            .params
            .as_ref()
            .ok_or(KeyExchangeError::MalformedParameters)?;
        let n = &params.n;

        let a = random_exponent(n)?;
        let big_a = params.g.modpow(&a, n);

        let u = params.hash_padded(&big_a, &params.b);
        if u.is_zero() {
            return Err(KeyExchangeError::IllegalParameter.into());
        }

        let k = params.hash_padded(n, &params.g);
        let x = params.private_key(&self.credentials);

        // S = (B - k * g^x) ^ (a + u * x) % N
        let kv = (k * params.g.modpow(&x, n)) % n;
        let base = Zeroizing::new(((&params.b % n) + n - kv) % n);
        let exponent = Zeroizing::new(&*a + u * &*x);
        let s = Zeroizing::new(base.modpow(&exponent, n));

        Ok(KeyExchangeOutput {
            client_contribution: big_a.to_bytes_be(),
            pre_master_secret: Zeroizing::new(s.to_bytes_be()),
        })
    }
}

/// Check the server's signature over `client_random + server_random + params`.
fn verify_signed_params(
    kxa: KeyExchangeAlgorithm,
    skx: &ServerKeyExchange,
    randoms: &ConnectionRandoms,
    server_key: Option<&ServerPublicKey>,
) -> Result<(), KeyExchangeError> {
    if !kxa.is_signed() {
        return Ok(());
    }

    let signature = skx
        .signature
        .as_ref()
        .ok_or(KeyExchangeError::MalformedParameters)?;
    let key = server_key.ok_or(KeyExchangeError::MissingServerKey)?;
    if Some(key.algorithm()) != kxa.certificate_key_algorithm() {
        return Err(KeyExchangeError::MissingServerKey);
    }

    let mut message = Vec::new();
    message.extend_from_slice(&randoms.client);
    message.extend_from_slice(&randoms.server);
    message.extend_from_slice(&skx.params.get_encoding());

    key.verify(&message, &signature.0)
        .map_err(|_| KeyExchangeError::BadSignature)
}

/// A random private exponent in `[2, modulus - 2]`.
///
/// `modulus` must be greater than 3.
fn random_exponent(modulus: &BigUint) -> Result<Zeroizing<BigUint>, Error> {
    let two = BigUint::from(2u32);
    let range = modulus - BigUint::from(3u32);

    // extra bytes make the reduction's bias negligible
    let bytes = Zeroizing::new(rand::random_vec(modulus.to_bytes_be().len() + 8)?);
    let x = BigUint::from_bytes_be(&bytes) % range + two;
    Ok(Zeroizing::new(x))
}
