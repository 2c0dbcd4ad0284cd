//! # tls10
//!
//! A client-side TLS 1.0 protocol engine.
//!
//! tls10 drives the client half of a TLS 1.0 handshake, and then carries
//! application data under the negotiated CBC cipher suite.  It offers:
//!
//! * RSA key transport,
//! * ephemeral Diffie-Hellman signed with RSA or DSA keys (`DHE_RSA`,
//!   `DHE_DSS`),
//! * Secure Remote Password key exchange, anonymous or signed (`SRP`,
//!   `SRP_RSA`, `SRP_DSS`),
//! * client authentication with an RSA or DSA key,
//! * 3DES-EDE-CBC, AES-128-CBC and AES-256-CBC record protection, with
//!   HMAC-SHA1.
//!
//! tls10 does not do any IO of its own.  A [`ClientConnection`] is fed
//! bytes from the server with [`ClientConnection::read_tls`] and gives back
//! bytes for the server with [`ClientConnection::write_tls`]; the
//! [`TlsStream`] wrapper does this for a blocking socket.
//!
//! Certificates are opaque here: what a server certificate chain means is
//! decided by the [`verify::ServerCertVerifier`] in the [`ClientConfig`],
//! which hands back the end-entity certificate's public key.
//!
//! ## Getting started
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use std::io::{Read, Write};
//! # fn verifier() -> Arc<dyn tls10::verify::ServerCertVerifier> { unimplemented!() }
//! let config = tls10::ClientConfig::builder(verifier())
//!     .build()
//!     .unwrap();
//! let conn = tls10::ClientConnection::new(Arc::new(config)).unwrap();
//! let sock = std::net::TcpStream::connect("example.com:443").unwrap();
//! let mut tls = tls10::TlsStream::connect(conn, sock).unwrap();
//! tls.write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
//! let mut response = Vec::new();
//! tls.read_to_end(&mut response).unwrap();
//! ```
//!
//! ## Crate features
//!
//! - `logging`: this makes the tls10 crate depend on the `log` crate.
//!   tls10 outputs interesting protocol-level messages at `trace!` and `debug!`
//!   level, and protocol-level errors at `warn!` and `error!` level.  The log
//!   messages do not contain secret key data, and so are safe to archive without
//!   affecting session security.  This feature is in the default set.

#![forbid(unsafe_code, unused_must_use)]
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::use_self,
    trivial_casts,
    unused_import_braces,
    unused_extern_crates
)]
// Relax these clippy lints:
// - single_component_path_imports: our top-level `use log` import causes
//   a false positive, https://github.com/rust-lang/rust-clippy/issues/5210
// - new_without_default: for internal constructors, the indirection is not
//   helpful
#![allow(clippy::single_component_path_imports, clippy::new_without_default)]

// log for logging (optional).
#[cfg(feature = "logging")]
use log;

#[cfg(not(feature = "logging"))]
#[macro_use]
mod log {
    macro_rules! trace    ( ($($tt:tt)*) => {{}} );
    macro_rules! debug    ( ($($tt:tt)*) => {{}} );
    macro_rules! warn     ( ($($tt:tt)*) => {{}} );
    macro_rules! error    ( ($($tt:tt)*) => {{}} );
}

#[macro_use]
mod msgs;
mod cipher;
mod common_state;
mod conn;
mod error;
mod hash_hs;
mod kx;
mod prf;
mod rand;
mod record_layer;
mod stream;
mod tls10;
mod vecbuf;
#[macro_use]
mod check;
mod enums;
mod key;
mod key_log;
mod suites;

// The public interface is:
pub use crate::common_state::{ConnectionStatus, IoState};
pub use crate::conn::{ClientConnection, Reader, Writer};
pub use crate::enums::{
    AlertDescription, CipherSuite, ContentType, HandshakeType, ProtocolVersion,
};
pub use crate::error::{
    CertificateError, ConfigError, Error, ErrorKind, InvalidMessage, KeyExchangeError,
    OtherError, PeerIncompatible, PeerMisbehaved, TransportError,
};
pub use crate::key::Certificate;
pub use crate::key_log::{KeyLog, NoKeyLog};
pub use crate::stream::TlsStream;
pub use crate::suites::{
    lookup as lookup_cipher_suite, BulkAlgorithm, KeyExchangeAlgorithm, SupportedCipherSuite,
    ALL_CIPHER_SUITES,
};

/// Items for use in a client.
pub mod client {
    mod config;
    pub(crate) mod hs;
    mod tls10;

    pub use config::{ClientCertKey, ClientConfig, ClientConfigBuilder, SrpCredentials};
    pub use hs::HandshakeState;
}

pub use client::{ClientConfig, HandshakeState};

/// All defined cipher suites supported by tls10 appear in this module.
pub mod cipher_suite {
    pub use crate::suites::{
        TLS_DHE_DSS_WITH_3DES_EDE_CBC_SHA, TLS_DHE_DSS_WITH_AES_128_CBC_SHA,
        TLS_DHE_DSS_WITH_AES_256_CBC_SHA, TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA,
        TLS_DHE_RSA_WITH_AES_128_CBC_SHA, TLS_DHE_RSA_WITH_AES_256_CBC_SHA,
        TLS_RSA_WITH_3DES_EDE_CBC_SHA, TLS_RSA_WITH_AES_128_CBC_SHA,
        TLS_RSA_WITH_AES_256_CBC_SHA, TLS_SRP_SHA_DSS_WITH_3DES_EDE_CBC_SHA,
        TLS_SRP_SHA_DSS_WITH_AES_128_CBC_SHA, TLS_SRP_SHA_DSS_WITH_AES_256_CBC_SHA,
        TLS_SRP_SHA_RSA_WITH_3DES_EDE_CBC_SHA, TLS_SRP_SHA_RSA_WITH_AES_128_CBC_SHA,
        TLS_SRP_SHA_RSA_WITH_AES_256_CBC_SHA, TLS_SRP_SHA_WITH_3DES_EDE_CBC_SHA,
        TLS_SRP_SHA_WITH_AES_128_CBC_SHA, TLS_SRP_SHA_WITH_AES_256_CBC_SHA,
    };
}

/// Message signing and the keys it uses.
pub mod sign;

/// Server certificate verification.
pub mod verify;
