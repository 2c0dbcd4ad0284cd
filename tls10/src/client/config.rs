use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::error::{ConfigError, Error};
use crate::key::Certificate;
use crate::key_log::{KeyLog, NoKeyLog};
use crate::sign::SigningKey;
use crate::suites::{self, SupportedCipherSuite, ALL_CIPHER_SUITES};
use crate::verify::ServerCertVerifier;

/// Common configuration for (typically) all connections made by
/// a program.
///
/// Making one of these is cheap, but it is still worth sharing one
/// `Arc<ClientConfig>` between connections.  Use [`ClientConfig::builder`]
/// to make one.
#[derive(Clone)]
pub struct ClientConfig {
    /// List of cipher suites, in preference order.
    pub(crate) cipher_suites: Vec<&'static SupportedCipherSuite>,

    /// How to verify the server's certificate chain.
    pub(crate) verifier: Arc<dyn ServerCertVerifier>,

    /// Identity and password for the SRP suites.
    pub(crate) srp_credentials: Option<Arc<SrpCredentials>>,

    /// Certificate and key to answer a CertificateRequest with.
    pub(crate) client_auth: Option<Arc<ClientCertKey>>,

    /// How to output key material for debugging.  The default
    /// does nothing.
    pub key_log: Arc<dyn KeyLog>,
}

impl ClientConfig {
    /// Start building a config that verifies servers with `verifier`.
    pub fn builder(verifier: Arc<dyn ServerCertVerifier>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            verifier,
            cipher_suites: None,
            srp_credentials: None,
            client_auth: None,
            key_log: Arc::new(NoKeyLog {}),
        }
    }

    /// The cipher suites offered in our ClientHello, most preferred first.
    pub fn cipher_suites(&self) -> &[&'static SupportedCipherSuite] {
        &self.cipher_suites
    }

    /// Whether any offered suite uses SRP.
    pub(crate) fn offers_srp(&self) -> bool {
        self.cipher_suites
            .iter()
            .any(|scs| scs.kx.is_srp())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("cipher_suites", &self.cipher_suites)
            .field("verifier", &self.verifier)
            .field("srp_credentials", &self.srp_credentials)
            .field("client_auth", &self.client_auth)
            .field("key_log", &self.key_log)
            .finish()
    }
}

/// Builds a [`ClientConfig`], checking the pieces fit together.
pub struct ClientConfigBuilder {
    verifier: Arc<dyn ServerCertVerifier>,
    cipher_suites: Option<Vec<&'static SupportedCipherSuite>>,
    srp_credentials: Option<SrpCredentials>,
    client_auth: Option<ClientCertKey>,
    key_log: Arc<dyn KeyLog>,
}

impl ClientConfigBuilder {
    /// Offer exactly `cipher_suites`, in this order.
    ///
    /// Without this, every supported suite is offered; the SRP suites
    /// only when SRP credentials are configured.
    pub fn with_cipher_suites(mut self, cipher_suites: &[&'static SupportedCipherSuite]) -> Self {
        self.cipher_suites = Some(cipher_suites.to_vec());
        self
    }

    /// Use `identity` and `password` for SRP key exchange.
    pub fn with_srp_credentials(
        mut self,
        identity: impl Into<Vec<u8>>,
        password: impl Into<Vec<u8>>,
    ) -> Self {
        self.srp_credentials = Some(SrpCredentials::new(identity.into(), password.into()));
        self
    }

    /// Answer a server's CertificateRequest with `cert_chain`, and prove
    /// possession of `key` with a CertificateVerify.
    ///
    /// `cert_chain` is sent as-is, end-entity certificate first.
    pub fn with_client_auth_cert(mut self, cert_chain: Vec<Certificate>, key: SigningKey) -> Self {
        self.client_auth = Some(ClientCertKey::new(cert_chain, key));
        self
    }

    /// Log session secrets through `key_log`.
    pub fn with_key_log(mut self, key_log: Arc<dyn KeyLog>) -> Self {
        self.key_log = key_log;
        self
    }

    /// Finish building.
    pub fn build(self) -> Result<ClientConfig, Error> {
        let cipher_suites = match self.cipher_suites {
            Some(cipher_suites) => cipher_suites,
            None if self.srp_credentials.is_some() => ALL_CIPHER_SUITES.to_vec(),
            None => suites::without_srp(ALL_CIPHER_SUITES),
        };

        if cipher_suites.is_empty() {
            return Err(ConfigError::NoCipherSuites.into());
        }

        let offers_srp = cipher_suites
            .iter()
            .any(|scs| scs.kx.is_srp());
        match (offers_srp, self.srp_credentials.is_some()) {
            (true, false) => return Err(ConfigError::SrpSuitesWithoutCredentials.into()),
            (false, true) => return Err(ConfigError::SrpCredentialsWithoutSuites.into()),
            _ => {}
        }

        if let Some(client_auth) = &self.client_auth {
            if client_auth.cert.is_empty() {
                return Err(ConfigError::EmptyClientCertChain.into());
            }
        }

        Ok(ClientConfig {
            cipher_suites,
            verifier: self.verifier,
            srp_credentials: self.srp_credentials.map(Arc::new),
            client_auth: self.client_auth.map(Arc::new),
            key_log: self.key_log,
        })
    }
}

/// The SRP username and password.
pub struct SrpCredentials {
    /// Sent in the clear, in the ClientHello's SRP extension.
    pub identity: Vec<u8>,
    pub password: Zeroizing<Vec<u8>>,
}

impl SrpCredentials {
    pub fn new(identity: Vec<u8>, password: Vec<u8>) -> Self {
        Self {
            identity,
            password: Zeroizing::new(password),
        }
    }
}

impl fmt::Debug for SrpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrpCredentials")
            .field("identity", &String::from_utf8_lossy(&self.identity))
            .finish_non_exhaustive()
    }
}

/// A client certificate chain and its private key.
#[derive(Debug)]
pub struct ClientCertKey {
    /// The certificate chain, end-entity certificate first.
    pub cert: Vec<Certificate>,

    /// The private key for the end-entity certificate.
    pub key: SigningKey,
}

impl ClientCertKey {
    pub fn new(cert: Vec<Certificate>, key: SigningKey) -> Self {
        Self { cert, key }
    }
}
