use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::client::tls10;
use crate::client::ClientConfig;
use crate::common_state::CommonState;
use crate::conn::ConnectionRandoms;
use crate::enums::{AlertDescription, CipherSuite, HandshakeType, ProtocolVersion};
use crate::error::{Error, PeerIncompatible, PeerMisbehaved};
use crate::hash_hs::HandshakeTranscripts;
use crate::kx;
#[cfg(feature = "logging")]
use crate::log::{debug, trace};
use crate::msgs::base::PayloadU8;
use crate::msgs::enums::{Compression, ExtensionType};
use crate::msgs::handshake::{
    ClientExtension, ClientHelloPayload, HandshakeMessagePayload, HandshakePayload, Random,
    SessionId,
};
use crate::msgs::message::Message;
use crate::suites::SupportedCipherSuite;

/// How far a client handshake has got.
///
/// The states from `ClientKeyExchangeSent` to `ClientFinishedSent` are
/// passed through while processing a single ServerHelloDone, so a
/// connection is only ever observed resting in one of the others.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    ClientHelloSent,
    ServerHelloReceived,
    ServerCertificateReceived,
    ServerKeyExchangeReceived,
    CertificateRequestReceived,
    ServerHelloDoneReceived,
    ClientKeyExchangeSent,
    CertificateVerifySent,
    ClientChangeCipherSpecSent,
    ClientFinishedSent,
    ServerChangeCipherSpecReceived,
    /// The handshake is complete, and application data may flow.
    Done,
    /// The handshake failed, and the connection is unusable.
    Failed,
}

pub(crate) type NextState = Box<dyn State>;
pub(crate) type NextStateOrError = Result<NextState, Error>;

pub(crate) trait State: Send + Sync {
    /// Each handle() implementation consumes a whole TLS message, and returns
    /// either an error or the next state.
    fn handle(self: Box<Self>, cx: &mut CommonState, m: Message) -> NextStateOrError;

    /// Where this state sits in the handshake.
    fn handshake_state(&self) -> HandshakeState;
}

pub(crate) fn log_progress(state: HandshakeState) {
    debug!("Client handshake now {:?}", state);
}

fn unix_time() -> u32 {
    // TLS 1.0 has a 32-bit gmt_unix_time; it wraps in 2106.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default()
}

/// Send our ClientHello, and return the state expecting the server's reply.
pub(crate) fn start_handshake(
    config: Arc<ClientConfig>,
    cx: &mut CommonState,
) -> NextStateOrError {
    log_progress(HandshakeState::Start);

    let randoms = ConnectionRandoms::for_client(unix_time())?;

    let mut extensions = Vec::new();
    if let (true, Some(credentials)) = (config.offers_srp(), &config.srp_credentials) {
        extensions.push(ClientExtension::SrpIdentity(PayloadU8::new(
            credentials.identity.clone(),
        )));
    }

    let offered_extensions = extensions
        .iter()
        .map(ClientExtension::ext_type)
        .collect();

    let ch = Message::build_handshake(HandshakeMessagePayload::build(
        HandshakeType::ClientHello,
        HandshakePayload::ClientHello(ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_0,
            random: Random::from(randoms.client),
            session_id: SessionId::empty(),
            cipher_suites: config
                .cipher_suites
                .iter()
                .map(|cs| cs.suite())
                .collect(),
            compression_methods: vec![Compression::Null],
            extensions,
        }),
    ));

    trace!("Sending ClientHello {:#?}", ch);

    let mut transcript = HandshakeTranscripts::new();
    transcript.add_message(&ch);
    cx.send_msg(ch);

    log_progress(HandshakeState::ClientHelloSent);
    Ok(Box::new(ExpectServerHello {
        config,
        randoms,
        transcript,
        offered_extensions,
    }))
}

struct ExpectServerHello {
    config: Arc<ClientConfig>,
    randoms: ConnectionRandoms,
    transcript: HandshakeTranscripts,
    offered_extensions: Vec<ExtensionType>,
}

impl ExpectServerHello {
    fn find_offered_suite(&self, suite: CipherSuite) -> Option<&'static SupportedCipherSuite> {
        self.config
            .cipher_suites
            .iter()
            .find(|scs| scs.suite() == suite)
            .copied()
    }
}

impl State for ExpectServerHello {
    fn handle(mut self: Box<Self>, cx: &mut CommonState, m: Message) -> NextStateOrError {
        let server_hello =
            require_handshake_msg!(m, HandshakeType::ServerHello, HandshakePayload::ServerHello)?;
        trace!("We got ServerHello {:#?}", server_hello);

        if server_hello.server_version != ProtocolVersion::TLSv1_0 {
            return Err(cx.send_fatal_alert(
                AlertDescription::ProtocolVersion,
                PeerIncompatible::ServerDoesNotSupportTls10,
            ));
        }

        let suite = match self.find_offered_suite(server_hello.cipher_suite) {
            Some(suite) => suite,
            None => {
                return Err(cx.send_fatal_alert(
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::SelectedUnofferedCipherSuite,
                ));
            }
        };

        if server_hello.compression_method != Compression::Null {
            return Err(cx.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::SelectedUnofferedCompression,
            ));
        }

        if server_hello
            .extensions
            .iter()
            .any(|ext| !self.offered_extensions.contains(&ext.ext_type()))
        {
            return Err(cx.send_fatal_alert(
                AlertDescription::UnsupportedExtension,
                PeerMisbehaved::UnsolicitedServerHelloExtension,
            ));
        }

        debug!("Using ciphersuite {:?}", suite);
        cx.suite = Some(suite);
        self.randoms.server = server_hello.random.0;

        let kx = kx::start(suite.kx, self.config.srp_credentials.as_ref())
            .map_err(|err| cx.send_fatal_alert(AlertDescription::InternalError, err))?;

        self.transcript.add_message(&m);

        let flight = tls10::ServerFlight {
            config: self.config,
            randoms: self.randoms,
            suite,
            transcript: self.transcript,
            kx,
        };

        log_progress(HandshakeState::ServerHelloReceived);
        Ok(tls10::after_server_hello(flight))
    }

    fn handshake_state(&self) -> HandshakeState {
        HandshakeState::ClientHelloSent
    }
}
