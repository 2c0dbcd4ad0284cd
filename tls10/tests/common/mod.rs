#![allow(dead_code)]

//! A scripted TLS 1.0 server, just capable enough to drive a
//! `ClientConnection` through each kind of handshake, and to be
//! told to misbehave.

use std::io;
pub use std::sync::Arc;
use std::sync::{Mutex, OnceLock};

use aes::{Aes128, Aes256};
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use des::TdesEde3;
use hmac::{Hmac, Mac};
use md5::Md5;
use num_bigint_dig::BigUint;
use rand_core::{OsRng, RngCore};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use signature::{DigestSigner, DigestVerifier, SignatureEncoding};

use tls10::sign::{DsaPublicKey, ServerPublicKey, SignatureAlgorithm, SigningKey};
use tls10::verify::{PinnedKeyVerifier, ServerCertInfo};
use tls10::{
    AlertDescription, BulkAlgorithm, Certificate, ClientConfig, ClientConnection, Error, IoState,
    KeyExchangeAlgorithm, KeyLog, SupportedCipherSuite,
};

pub const CCS: u8 = 20;
pub const ALERT: u8 = 21;
pub const HANDSHAKE: u8 = 22;
pub const APPLICATION_DATA: u8 = 23;

pub const HELLO_REQUEST: u8 = 0;
pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const CERTIFICATE: u8 = 11;
pub const SERVER_KEY_EXCHANGE: u8 = 12;
pub const CERTIFICATE_REQUEST: u8 = 13;
pub const SERVER_HELLO_DONE: u8 = 14;
pub const CERTIFICATE_VERIFY: u8 = 15;
pub const CLIENT_KEY_EXCHANGE: u8 = 16;
pub const FINISHED: u8 = 20;

pub const SRP_IDENTITY: &[u8] = b"alice";
pub const SRP_PASSWORD: &[u8] = b"password123";

pub const SERVER_CERT: &[u8] = b"server certificate";
pub const CLIENT_CERT: &[u8] = b"client certificate";
pub const DSA_CLIENT_CERT: &[u8] = b"client DSA certificate";

pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .try_init();
}

pub fn server_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 512).unwrap())
}

pub fn client_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 512).unwrap())
}

/// 1024-bit DSA keys, as TLS 1.0 peers used them.
#[allow(deprecated)]
fn generate_dsa_key() -> dsa::SigningKey {
    let components = dsa::Components::generate(&mut OsRng, dsa::KeySize::DSA_1024_160);
    dsa::SigningKey::generate(&mut OsRng, components)
}

pub fn dsa_server_key() -> &'static dsa::SigningKey {
    static KEY: OnceLock<dsa::SigningKey> = OnceLock::new();
    KEY.get_or_init(generate_dsa_key)
}

pub fn dsa_client_key() -> &'static dsa::SigningKey {
    static KEY: OnceLock<dsa::SigningKey> = OnceLock::new();
    KEY.get_or_init(generate_dsa_key)
}

pub fn dsa_public(key: &dsa::SigningKey) -> DsaPublicKey {
    let verifying_key = key.verifying_key();
    let components = verifying_key.components();
    DsaPublicKey {
        p: components.p().clone(),
        q: components.q().clone(),
        g: components.g().clone(),
        y: verifying_key.y().clone(),
    }
}

/// 2^127 - 1, which is prime.
pub fn group_prime() -> BigUint {
    (BigUint::from(1u32) << 127usize) - BigUint::from(1u32)
}

pub fn server_cert_info() -> ServerCertInfo {
    ServerCertInfo {
        public_key: ServerPublicKey::Rsa(server_key().to_public_key()),
        key_usage: None,
    }
}

/// Our certificate, carrying the kind of key `suite` needs.
pub fn server_cert_info_for(suite: &SupportedCipherSuite) -> ServerCertInfo {
    match suite.kx.certificate_key_algorithm() {
        Some(SignatureAlgorithm::DSA) => ServerCertInfo {
            public_key: ServerPublicKey::Dsa(dsa_public(dsa_server_key())),
            key_usage: None,
        },
        _ => server_cert_info(),
    }
}

pub fn verifier_for(info: ServerCertInfo) -> Arc<PinnedKeyVerifier> {
    Arc::new(PinnedKeyVerifier::new().with_pin(Certificate(SERVER_CERT.to_vec()), info))
}

pub fn make_client_config(suite: &'static SupportedCipherSuite) -> ClientConfig {
    let builder = ClientConfig::builder(verifier_for(server_cert_info_for(suite)))
        .with_cipher_suites(&[suite]);
    match suite.kx.is_srp() {
        true => builder.with_srp_credentials(SRP_IDENTITY, SRP_PASSWORD),
        false => builder,
    }
    .build()
    .unwrap()
}

pub fn make_client_config_with_auth(suite: &'static SupportedCipherSuite) -> ClientConfig {
    ClientConfig::builder(verifier_for(server_cert_info_for(suite)))
        .with_cipher_suites(&[suite])
        .with_client_auth_cert(
            vec![Certificate(CLIENT_CERT.to_vec())],
            SigningKey::Rsa(client_key().clone()),
        )
        .build()
        .unwrap()
}

pub fn make_client_config_with_dsa_auth(suite: &'static SupportedCipherSuite) -> ClientConfig {
    ClientConfig::builder(verifier_for(server_cert_info_for(suite)))
        .with_cipher_suites(&[suite])
        .with_client_auth_cert(
            vec![Certificate(DSA_CLIENT_CERT.to_vec())],
            SigningKey::Dsa(dsa_client_key().clone()),
        )
        .build()
        .unwrap()
}

pub fn make_client(config: ClientConfig) -> ClientConnection {
    ClientConnection::new(Arc::new(config)).unwrap()
}

/// Everything the client wants to write.
pub fn take_tls(client: &mut ClientConnection) -> Vec<u8> {
    let mut out = Vec::new();
    while client.wants_write() {
        client.write_tls(&mut out).unwrap();
    }
    out
}

/// Give `bytes` to the client, and have it process them.
pub fn feed(client: &mut ClientConnection, bytes: &[u8]) -> Result<IoState, Error> {
    let mut rd = bytes;
    while !rd.is_empty() {
        if client.read_tls(&mut rd).unwrap() == 0 {
            break;
        }
    }
    client.process_new_packets()
}

/// A KeyLog that remembers everything it is given.
#[derive(Debug, Default)]
pub struct KeyLogRecorder {
    pub items: Mutex<Vec<(String, Vec<u8>, Vec<u8>)>>,
}

impl KeyLog for KeyLogRecorder {
    fn log(&self, label: &str, client_random: &[u8], secret: &[u8]) {
        self.items
            .lock()
            .unwrap()
            .push((label.to_string(), client_random.to_vec(), secret.to_vec()));
    }
}

/// A handshake message, as a type and body.
#[derive(Clone, Debug)]
pub struct HandshakeMsg {
    pub typ: u8,
    pub body: Vec<u8>,
}

impl HandshakeMsg {
    pub fn new(typ: u8, body: Vec<u8>) -> Self {
        Self { typ, body }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.typ];
        put_u24(&mut out, self.body.len());
        out.extend_from_slice(&self.body);
        out
    }
}

/// A record the client sent us, after decryption.
#[derive(Clone, Debug)]
pub struct Record {
    pub typ: u8,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn alert(&self) -> Option<(u8, AlertDescription)> {
        match (self.typ, self.payload.as_slice()) {
            (ALERT, [level, desc]) => Some((*level, AlertDescription::from(*desc))),
            _ => None,
        }
    }
}

fn put_u16(out: &mut Vec<u8>, v: usize) {
    out.extend_from_slice(&(v as u16).to_be_bytes());
}

fn put_u24(out: &mut Vec<u8>, v: usize) {
    out.extend_from_slice(&(v as u32).to_be_bytes()[1..]);
}

pub fn opaque8(data: &[u8]) -> Vec<u8> {
    let mut out = vec![data.len() as u8];
    out.extend_from_slice(data);
    out
}

pub fn opaque16(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, data.len());
    out.extend_from_slice(data);
    out
}

fn opaque24_list(items: &[&[u8]]) -> Vec<u8> {
    let mut inner = Vec::new();
    for item in items {
        put_u24(&mut inner, item.len());
        inner.extend_from_slice(item);
    }
    let mut out = Vec::new();
    put_u24(&mut out, inner.len());
    out.extend_from_slice(&inner);
    out
}

/// A cursor over a received message body.
struct Cursor<'a>(&'a [u8]);

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> &'a [u8] {
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        head
    }

    fn u8(&mut self) -> usize {
        usize::from(self.take(1)[0])
    }

    fn u16(&mut self) -> usize {
        let b = self.take(2);
        usize::from(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> usize {
        let b = self.take(3);
        (usize::from(b[0]) << 16) | (usize::from(b[1]) << 8) | usize::from(b[2])
    }

    fn opaque8(&mut self) -> &'a [u8] {
        let len = self.u8();
        self.take(len)
    }

    fn opaque16(&mut self) -> &'a [u8] {
        let len = self.u16();
        self.take(len)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

enum BlockCipher {
    Aes128(Aes128),
    Aes256(Aes256),
    Tdes(TdesEde3),
}

impl BlockCipher {
    fn new(bulk: BulkAlgorithm, key: &[u8]) -> Self {
        match bulk {
            BulkAlgorithm::Aes128Cbc => Self::Aes128(Aes128::new_from_slice(key).unwrap()),
            BulkAlgorithm::Aes256Cbc => Self::Aes256(Aes256::new_from_slice(key).unwrap()),
            BulkAlgorithm::TripleDesEdeCbc => Self::Tdes(TdesEde3::new_from_slice(key).unwrap()),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes256(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Tdes(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes256(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Tdes(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
        }
    }
}

/// One direction of CBC + HMAC-SHA1 record protection.
struct Protection {
    mac_key: Vec<u8>,
    cipher: BlockCipher,
    iv: Vec<u8>,
    seq: u64,
}

impl Protection {
    fn mac(&self, typ: u8, data: &[u8]) -> Vec<u8> {
        let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(&self.mac_key).unwrap();
        mac.update(&self.seq.to_be_bytes());
        mac.update(&[typ, 3, 1]);
        mac.update(&(data.len() as u16).to_be_bytes());
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    fn seal(&mut self, typ: u8, data: &[u8]) -> Vec<u8> {
        let block_len = self.iv.len();
        let mut out = data.to_vec();
        out.extend_from_slice(&self.mac(typ, data));
        let pad = block_len - 1 - (out.len() % block_len);
        out.extend(std::iter::repeat(pad as u8).take(pad + 1));

        for block in out.chunks_exact_mut(block_len) {
            block
                .iter_mut()
                .zip(self.iv.iter())
                .for_each(|(b, v)| *b ^= *v);
            self.cipher.encrypt_block(block);
            self.iv.copy_from_slice(block);
        }
        self.seq += 1;
        out
    }

    fn open(&mut self, typ: u8, data: &[u8]) -> Vec<u8> {
        let block_len = self.iv.len();
        assert_eq!(data.len() % block_len, 0);
        let mut out = data.to_vec();
        for block in out.chunks_exact_mut(block_len) {
            let next_iv = block.to_vec();
            self.cipher.decrypt_block(block);
            block
                .iter_mut()
                .zip(self.iv.iter())
                .for_each(|(b, v)| *b ^= *v);
            self.iv = next_iv;
        }

        let pad = usize::from(*out.last().unwrap());
        let content_len = out.len() - pad - 1 - 20;
        assert!(out[content_len + 20..]
            .iter()
            .all(|b| usize::from(*b) == pad));
        let (content, mac) = out[..content_len + 20].split_at(content_len);
        assert_eq!(mac, self.mac(typ, content).as_slice(), "bad record MAC from client");
        self.seq += 1;
        content.to_vec()
    }
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut mac = <Hmac<Md5> as Mac>::new_from_slice(key).unwrap();
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().to_vec()
}

fn hmac_sha1(key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key).unwrap();
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().to_vec()
}

/// RFC 2246 P_hash, written out longhand.
fn p_hash(hmac: fn(&[u8], &[&[u8]]) -> Vec<u8>, secret: &[u8], seed: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut a = hmac(secret, &[seed]);
    while out.len() < len {
        out.extend(hmac(secret, &[&a, seed]));
        a = hmac(secret, &[&a]);
    }
    out.truncate(len);
    out
}

/// RFC 2246 section 5.
fn prf(out: &mut [u8], secret: &[u8], label: &[u8], seed: &[u8]) {
    let half = (secret.len() + 1) / 2;
    let mut label_seed = label.to_vec();
    label_seed.extend_from_slice(seed);

    let md5 = p_hash(hmac_md5, &secret[..half], &label_seed, out.len());
    let sha1 = p_hash(hmac_sha1, &secret[secret.len() - half..], &label_seed, out.len());
    for (o, (a, b)) in out.iter_mut().zip(md5.iter().zip(sha1.iter())) {
        *o = a ^ b;
    }
}

fn sha1(parts: &[&[u8]]) -> Vec<u8> {
    let mut h = Sha1::new();
    for part in parts {
        h.update(part);
    }
    h.finalize().to_vec()
}

/// MD5 and SHA-1 of `data`, concatenated.
pub fn md5_sha1(data: &[u8]) -> Vec<u8> {
    let mut out = Md5::digest(data).to_vec();
    out.extend_from_slice(&Sha1::digest(data));
    out
}

fn random_biguint(len: usize) -> BigUint {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    BigUint::from_bytes_be(&bytes)
}

fn pad_to(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}

/// The server's half of the key exchange.
enum ServerKx {
    Rsa,
    Dhe {
        x: BigUint,
    },
    Srp {
        b: BigUint,
        v: BigUint,
        big_b: BigUint,
    },
}

/// A TLS 1.0 server driven step by step from a test.
pub struct TestServer {
    pub suite: &'static SupportedCipherSuite,
    pub server_random: [u8; 32],
    pub client_random: [u8; 32],
    pub client_hello_version: [u8; 2],
    pub offered_suites: Vec<u16>,
    pub srp_identity: Option<Vec<u8>>,

    /// The certificate chain we send.
    pub chain: Vec<Vec<u8>>,
    /// Ask the client for a certificate.
    pub request_client_cert: bool,
    /// DH group; the generator is 3 unless changed.
    pub dh_p: BigUint,
    pub dh_g: BigUint,
    /// Override our DH public value.
    pub dh_ys: Option<BigUint>,
    /// Send Finished with this verify_data bit flipped.
    pub corrupt_finished: bool,

    /// What the client has sent us.
    pub received: Vec<Record>,
    pub client_chain: Option<Vec<Vec<u8>>>,
    pub client_cert_verified: bool,
    pub client_finished_ok: bool,
    pub master_secret: Option<Vec<u8>>,

    kx: Option<ServerKx>,
    transcript: Vec<u8>,
    certificate_verify_transcript: Option<Vec<u8>>,
    handshake_buf: Vec<u8>,
    client_encrypting: bool,
    server_encrypting: bool,
    read_protection: Option<Protection>,
    write_protection: Option<Protection>,
}

impl TestServer {
    pub fn new(suite: &'static SupportedCipherSuite) -> Self {
        let mut server_random = [0u8; 32];
        OsRng.fill_bytes(&mut server_random);
        Self {
            suite,
            server_random,
            client_random: [0u8; 32],
            client_hello_version: [0u8; 2],
            offered_suites: Vec::new(),
            srp_identity: None,
            chain: vec![SERVER_CERT.to_vec()],
            request_client_cert: false,
            dh_p: group_prime(),
            dh_g: BigUint::from(3u32),
            dh_ys: None,
            corrupt_finished: false,
            received: Vec::new(),
            client_chain: None,
            client_cert_verified: false,
            client_finished_ok: false,
            master_secret: None,
            kx: None,
            transcript: Vec::new(),
            certificate_verify_transcript: None,
            handshake_buf: Vec::new(),
            client_encrypting: false,
            server_encrypting: false,
            read_protection: None,
            write_protection: None,
        }
    }

    /// Alerts the client has sent, in order.
    pub fn alerts(&self) -> Vec<(u8, AlertDescription)> {
        self.received
            .iter()
            .filter_map(Record::alert)
            .collect()
    }

    /// Application data the client has sent, joined up.
    pub fn app_data(&self) -> Vec<u8> {
        self.received
            .iter()
            .filter(|r| r.typ == APPLICATION_DATA)
            .flat_map(|r| r.payload.clone())
            .collect()
    }

    /// Take in TLS bytes from the client.
    pub fn receive(&mut self, bytes: &[u8]) {
        let mut rd = Cursor(bytes);
        while !rd.is_empty() {
            let typ = rd.u8() as u8;
            let version = rd.take(2);
            assert_eq!(version, &[3, 1]);
            let body = rd.opaque16();

            let payload = match (self.client_encrypting, self.read_protection.as_mut()) {
                (true, Some(protection)) => protection.open(typ, body),
                _ => body.to_vec(),
            };

            match typ {
                HANDSHAKE => {
                    self.handshake_buf
                        .extend_from_slice(&payload);
                    self.take_handshake_messages();
                }
                CCS => {
                    assert_eq!(payload, vec![1]);
                    self.client_encrypting = true;
                }
                _ => {}
            }

            self.received.push(Record { typ, payload });
        }
    }

    fn take_handshake_messages(&mut self) {
        while self.handshake_buf.len() >= 4 {
            let mut hdr = Cursor(&self.handshake_buf[1..4]);
            let len = hdr.u24();
            if self.handshake_buf.len() < 4 + len {
                return;
            }
            let encoded: Vec<u8> = self.handshake_buf.drain(..4 + len).collect();
            self.on_handshake(encoded[0], &encoded[4..], &encoded);
        }
    }

    fn on_handshake(&mut self, typ: u8, body: &[u8], encoded: &[u8]) {
        let mut rd = Cursor(body);
        match typ {
            CLIENT_HELLO => {
                self.client_hello_version
                    .copy_from_slice(rd.take(2));
                self.client_random
                    .copy_from_slice(rd.take(32));
                let _session_id = rd.opaque8();
                let mut suites = Cursor(rd.opaque16());
                while !suites.is_empty() {
                    self.offered_suites.push(suites.u16() as u16);
                }
                let compressions = rd.opaque8();
                assert_eq!(compressions, &[0]);
                if !rd.is_empty() {
                    let mut exts = Cursor(rd.opaque16());
                    while !exts.is_empty() {
                        let typ = exts.u16();
                        let mut data = Cursor(exts.opaque16());
                        if typ == 12 {
                            self.srp_identity = Some(data.opaque8().to_vec());
                        }
                    }
                }
            }
            CERTIFICATE => {
                let len = rd.u24();
                let mut certs = Cursor(rd.take(len));
                let mut chain = Vec::new();
                while !certs.is_empty() {
                    let len = certs.u24();
                    chain.push(certs.take(len).to_vec());
                }
                self.client_chain = Some(chain);
            }
            CLIENT_KEY_EXCHANGE => {
                let contribution = rd.opaque16().to_vec();
                self.transcript
                    .extend_from_slice(encoded);
                self.certificate_verify_transcript = Some(self.transcript.clone());
                self.derive_secrets(&contribution);
                return;
            }
            CERTIFICATE_VERIFY => {
                let signature = rd.opaque16();
                let transcript = self
                    .certificate_verify_transcript
                    .take()
                    .unwrap();
                let chain = self.client_chain.as_ref().unwrap();
                match chain[0].as_slice() {
                    DSA_CLIENT_CERT => {
                        let signature = dsa::Signature::try_from(signature).unwrap();
                        dsa_client_key()
                            .verifying_key()
                            .verify_digest(Sha1::new_with_prefix(&transcript), &signature)
                            .unwrap();
                    }
                    _ => client_key()
                        .to_public_key()
                        .verify(
                            Pkcs1v15Sign::new_unprefixed(),
                            &md5_sha1(&transcript),
                            signature,
                        )
                        .unwrap(),
                }
                self.client_cert_verified = true;
            }
            FINISHED => {
                let expected = self.verify_data(b"client finished");
                self.client_finished_ok = body == expected.as_slice();
            }
            _ => panic!("unexpected handshake message {} from client", typ),
        }

        self.transcript
            .extend_from_slice(encoded);
    }

    fn derive_secrets(&mut self, contribution: &[u8]) {
        let pms = match self.kx.take().unwrap() {
            ServerKx::Rsa => {
                let pms = server_key()
                    .decrypt(Pkcs1v15Encrypt, contribution)
                    .unwrap();
                assert_eq!(pms.len(), 48);
                assert_eq!(&pms[..2], &[3, 1]);
                pms
            }
            ServerKx::Dhe { x } => {
                let yc = BigUint::from_bytes_be(contribution);
                yc.modpow(&x, &self.dh_p).to_bytes_be()
            }
            ServerKx::Srp { b, v, big_b } => {
                let n = &self.dh_p;
                let len = n.to_bytes_be().len();
                let big_a = BigUint::from_bytes_be(contribution);
                let u = BigUint::from_bytes_be(&sha1(&[&pad_to(&big_a, len), &pad_to(&big_b, len)]));
                let s = (big_a * v.modpow(&u, n)).modpow(&b, n);
                s.to_bytes_be()
            }
        };

        let mut seed = self.client_random.to_vec();
        seed.extend_from_slice(&self.server_random);
        let mut master_secret = vec![0u8; 48];
        prf(&mut master_secret, &pms, b"master secret", &seed);

        let bulk = self.suite.bulk;
        let mut seed = self.server_random.to_vec();
        seed.extend_from_slice(&self.client_random);
        let mut key_block = vec![0u8; (20 + bulk.key_len() + bulk.block_len()) * 2];
        prf(&mut key_block, &master_secret, b"key expansion", &seed);

        let mut kb = Cursor(&key_block);
        let client_mac = kb.take(20);
        let server_mac = kb.take(20);
        let client_key = kb.take(bulk.key_len());
        let server_key = kb.take(bulk.key_len());
        let client_iv = kb.take(bulk.block_len());
        let server_iv = kb.take(bulk.block_len());

        self.read_protection = Some(Protection {
            mac_key: client_mac.to_vec(),
            cipher: BlockCipher::new(bulk, client_key),
            iv: client_iv.to_vec(),
            seq: 0,
        });
        self.write_protection = Some(Protection {
            mac_key: server_mac.to_vec(),
            cipher: BlockCipher::new(bulk, server_key),
            iv: server_iv.to_vec(),
            seq: 0,
        });
        self.master_secret = Some(master_secret);
    }

    fn verify_data(&self, label: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; 12];
        prf(
            &mut out,
            self.master_secret.as_ref().unwrap(),
            label,
            &md5_sha1(&self.transcript),
        );
        out
    }

    pub fn server_hello(&self) -> HandshakeMsg {
        let mut body = vec![3, 1];
        body.extend_from_slice(&self.server_random);
        body.extend_from_slice(&opaque8(&[]));
        body.extend_from_slice(&u16::from(self.suite.suite()).to_be_bytes());
        body.push(0);
        HandshakeMsg::new(SERVER_HELLO, body)
    }

    pub fn certificate(&self) -> HandshakeMsg {
        let chain: Vec<&[u8]> = self
            .chain
            .iter()
            .map(|c| c.as_slice())
            .collect();
        HandshakeMsg::new(CERTIFICATE, opaque24_list(&chain))
    }

    fn sign_params(&self, params: &[u8]) -> Vec<u8> {
        let mut message = self.client_random.to_vec();
        message.extend_from_slice(&self.server_random);
        message.extend_from_slice(params);
        let signature = match self.suite.kx.certificate_key_algorithm() {
            Some(SignatureAlgorithm::DSA) => {
                let signature: dsa::Signature = dsa_server_key()
                    .try_sign_digest(Sha1::new_with_prefix(&message))
                    .unwrap();
                signature.to_vec()
            }
            _ => server_key()
                .sign(Pkcs1v15Sign::new_unprefixed(), &md5_sha1(&message))
                .unwrap(),
        };
        opaque16(&signature)
    }

    fn server_key_exchange(&mut self) -> HandshakeMsg {
        let kxa = self.suite.kx;
        let mut params = Vec::new();
        if kxa.is_srp() {
            let identity = self.srp_identity.clone().unwrap();
            assert_eq!(identity, SRP_IDENTITY);
            let n = self.dh_p.clone();
            let g = self.dh_g.clone();
            let len = n.to_bytes_be().len();
            let salt = b"saltsaltsalt".to_vec();

            let inner = sha1(&[&identity, b":", SRP_PASSWORD]);
            let x = BigUint::from_bytes_be(&sha1(&[&salt, &inner]));
            let v = g.modpow(&x, &n);
            let k = BigUint::from_bytes_be(&sha1(&[&pad_to(&n, len), &pad_to(&g, len)]));
            let b = random_biguint(len) % &n;
            let big_b = (k * &v + g.modpow(&b, &n)) % &n;

            params.extend_from_slice(&opaque16(&n.to_bytes_be()));
            params.extend_from_slice(&opaque16(&g.to_bytes_be()));
            params.extend_from_slice(&opaque8(&salt));
            params.extend_from_slice(&opaque16(&big_b.to_bytes_be()));
            self.kx = Some(ServerKx::Srp { b, v, big_b });
        } else {
            let x = random_biguint(16) % &self.dh_p;
            let ys = match &self.dh_ys {
                Some(ys) => ys.clone(),
                None => self.dh_g.modpow(&x, &self.dh_p),
            };
            params.extend_from_slice(&opaque16(&self.dh_p.to_bytes_be()));
            params.extend_from_slice(&opaque16(&self.dh_g.to_bytes_be()));
            params.extend_from_slice(&opaque16(&ys.to_bytes_be()));
            self.kx = Some(ServerKx::Dhe { x });
        }

        let mut body = params.clone();
        if kxa.is_signed() {
            body.extend_from_slice(&self.sign_params(&params));
        }
        HandshakeMsg::new(SERVER_KEY_EXCHANGE, body)
    }

    pub fn certificate_request(&self) -> HandshakeMsg {
        let mut body = opaque8(&[1, 2]);
        body.extend_from_slice(&opaque16(&opaque16(b"CN=test CA")));
        HandshakeMsg::new(CERTIFICATE_REQUEST, body)
    }

    /// Our first flight, for the negotiated suite, in order.
    pub fn first_flight(&mut self) -> Vec<HandshakeMsg> {
        let kxa = self.suite.kx;
        let mut flight = vec![self.server_hello()];
        if kxa.expects_certificate() {
            flight.push(self.certificate());
        }
        match kxa.expects_server_kx() {
            true => flight.push(self.server_key_exchange()),
            false => self.kx = Some(ServerKx::Rsa),
        }
        if self.request_client_cert {
            flight.push(self.certificate_request());
        }
        flight.push(HandshakeMsg::new(SERVER_HELLO_DONE, Vec::new()));
        flight
    }

    /// Frame handshake messages, one per record, adding them to the transcript.
    pub fn send_handshake(&mut self, msgs: &[HandshakeMsg]) -> Vec<u8> {
        let mut out = Vec::new();
        for m in msgs {
            let encoded = m.encode();
            self.transcript
                .extend_from_slice(&encoded);
            out.extend(self.record(HANDSHAKE, &encoded));
        }
        out
    }

    /// Frame one record, encrypting once we have sent ChangeCipherSpec.
    pub fn record(&mut self, typ: u8, payload: &[u8]) -> Vec<u8> {
        let body = match (self.server_encrypting, self.write_protection.as_mut()) {
            (true, Some(protection)) => protection.seal(typ, payload),
            _ => payload.to_vec(),
        };
        let mut out = vec![typ, 3, 1];
        out.extend_from_slice(&opaque16(&body));
        out
    }

    /// ChangeCipherSpec and Finished, after the client's flight.
    pub fn finish(&mut self) -> Vec<u8> {
        assert!(self.client_finished_ok, "client Finished did not verify");
        let mut verify_data = self.verify_data(b"server finished");
        if self.corrupt_finished {
            verify_data[0] ^= 0x01;
        }

        let mut out = self.record(CCS, &[1]);
        self.server_encrypting = true;
        let finished = HandshakeMsg::new(FINISHED, verify_data).encode();
        self.transcript
            .extend_from_slice(&finished);
        out.extend(self.record(HANDSHAKE, &finished));
        out
    }

    pub fn app_data_record(&mut self, data: &[u8]) -> Vec<u8> {
        self.record(APPLICATION_DATA, data)
    }
}

/// Run a whole handshake between `server` and `client`.
pub fn do_handshake(server: &mut TestServer, client: &mut ClientConnection) -> Result<(), Error> {
    server.receive(&take_tls(client));
    let flight = server.first_flight();
    let bytes = server.send_handshake(&flight);
    let result = feed(client, &bytes);
    server.receive(&take_tls(client));
    result?;

    let bytes = server.finish();
    let result = feed(client, &bytes);
    server.receive(&take_tls(client));
    result.map(|_| ())
}

/// Read exactly the plaintext the client has received.
pub fn read_plaintext(client: &mut ClientConnection) -> Vec<u8> {
    let mut buf = [0u8; 1024];
    let mut out = Vec::new();
    loop {
        match io::Read::read(&mut client.reader(), &mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => panic!("read failed: {:?}", e),
        }
    }
    out
}

pub fn rsa_public(key: &RsaPrivateKey) -> RsaPublicKey {
    key.to_public_key()
}

pub fn is_srp_plain(kxa: KeyExchangeAlgorithm) -> bool {
    kxa == KeyExchangeAlgorithm::SRP
}
