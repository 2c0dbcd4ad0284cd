use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::check::{inappropriate_handshake_message, inappropriate_message};
use crate::client::config::ClientCertKey;
use crate::client::hs::{log_progress, HandshakeState, NextState, NextStateOrError, State};
use crate::client::ClientConfig;
use crate::common_state::CommonState;
use crate::conn::ConnectionRandoms;
use crate::enums::{AlertDescription, ContentType, HandshakeType};
use crate::error::{Error, PeerMisbehaved};
use crate::hash_hs::{HandshakeHash, HandshakeTranscripts};
use crate::key::Certificate;
use crate::kx::KeyExchange;
#[cfg(feature = "logging")]
use crate::log::{debug, trace, warn};
use crate::msgs::base::{Payload, PayloadU16};
use crate::msgs::enums::ClientCertificateType;
use crate::msgs::handshake::{CertificateRequestPayload, HandshakeMessagePayload, HandshakePayload};
use crate::msgs::message::{Message, MessagePayload};
use crate::sign::{ServerPublicKey, SignatureAlgorithm};
use crate::suites::{KeyExchangeAlgorithm, SupportedCipherSuite};
use crate::tls10::ConnectionSecrets;
use crate::verify::{FinishedMessageVerified, ServerCertVerified};

/// What we carry from the ServerHello until the server's flight is done.
pub(super) struct ServerFlight {
    pub(super) config: Arc<ClientConfig>,
    pub(super) randoms: ConnectionRandoms,
    pub(super) suite: &'static SupportedCipherSuite,
    pub(super) transcript: HandshakeTranscripts,
    pub(super) kx: Box<dyn KeyExchange>,
}

/// The server's certified key, once its chain has been accepted.
struct ServerCert {
    public_key: ServerPublicKey,
    _verified: ServerCertVerified,
}

/// Pick the state following ServerHello.  Only plain SRP goes
/// straight to the ServerKeyExchange.
pub(super) fn after_server_hello(flight: ServerFlight) -> NextState {
    match flight.suite.kx.expects_certificate() {
        true => Box::new(ExpectCertificate { flight }),
        false => Box::new(ExpectServerKx {
            flight,
            server_cert: None,
            progress: HandshakeState::ServerHelloReceived,
        }),
    }
}

struct ExpectCertificate {
    flight: ServerFlight,
}

impl State for ExpectCertificate {
    fn handle(mut self: Box<Self>, cx: &mut CommonState, m: Message) -> NextStateOrError {
        let chain =
            require_handshake_msg!(m, HandshakeType::Certificate, HandshakePayload::Certificate)?;
        trace!("Server certificate chain has {} certificates", chain.len());

        if chain.is_empty() {
            return Err(cx.send_fatal_alert(
                AlertDescription::BadCertificate,
                Error::NoCertificatesPresented,
            ));
        }

        let info = self
            .flight
            .config
            .verifier
            .verify_server_cert(chain)
            .map_err(|err| cx.send_fatal_alert(err.clone().into(), err))?;
        let verified = ServerCertVerified::assertion();

        let kxa = self.flight.suite.kx;
        if kxa.certificate_key_algorithm() != Some(info.public_key.algorithm()) {
            return Err(cx.send_fatal_alert(
                AlertDescription::CertificateUnknown,
                PeerMisbehaved::CertificateKeyDoesNotMatchKeyExchange,
            ));
        }

        if let Some(usage) = &info.key_usage {
            if !kxa.permitted_by(usage) {
                return Err(cx.send_fatal_alert(
                    AlertDescription::CertificateUnknown,
                    PeerMisbehaved::CertificateKeyUsageForbidsKeyExchange,
                ));
            }
        }

        self.flight.transcript.add_message(&m);

        let server_cert = ServerCert {
            public_key: info.public_key,
            _verified: verified,
        };

        log_progress(HandshakeState::ServerCertificateReceived);
        Ok(match kxa.expects_server_kx() {
            true => Box::new(ExpectServerKx {
                flight: self.flight,
                server_cert: Some(server_cert),
                progress: HandshakeState::ServerCertificateReceived,
            }),
            false => Box::new(ExpectServerDoneOrCertReq {
                flight: self.flight,
                server_cert: Some(server_cert),
                progress: HandshakeState::ServerCertificateReceived,
            }),
        })
    }

    fn handshake_state(&self) -> HandshakeState {
        HandshakeState::ServerHelloReceived
    }
}

struct ExpectServerKx {
    flight: ServerFlight,
    server_cert: Option<ServerCert>,
    progress: HandshakeState,
}

impl State for ExpectServerKx {
    fn handle(mut self: Box<Self>, cx: &mut CommonState, m: Message) -> NextStateOrError {
        let kxa = self.flight.suite.kx;
        if kxa == KeyExchangeAlgorithm::SRP && m.is_handshake_type(HandshakeType::Certificate) {
            return Err(cx.send_fatal_alert(
                AlertDescription::UnsupportedCertificate,
                PeerMisbehaved::CertificateSentForAnonymousKeyExchange,
            ));
        }

        let opaque_kx = require_handshake_msg!(
            m,
            HandshakeType::ServerKeyExchange,
            HandshakePayload::ServerKeyExchange
        )?;
        let skx = opaque_kx
            .unwrap_given_kxa(kxa)
            .map_err(|err| cx.send_fatal_alert(AlertDescription::DecodeError, err))?;
        trace!("Server key exchange {:?}", skx);

        let server_key = self
            .server_cert
            .as_ref()
            .map(|cert| &cert.public_key);
        self.flight
            .kx
            .process_server_key_exchange(&skx, &self.flight.randoms, server_key)
            .map_err(|err| cx.send_fatal_alert(err.alert(), err))?;

        self.flight.transcript.add_message(&m);

        log_progress(HandshakeState::ServerKeyExchangeReceived);
        Ok(Box::new(ExpectServerDoneOrCertReq {
            flight: self.flight,
            server_cert: self.server_cert,
            progress: HandshakeState::ServerKeyExchangeReceived,
        }))
    }

    fn handshake_state(&self) -> HandshakeState {
        self.progress
    }
}

struct ExpectServerDoneOrCertReq {
    flight: ServerFlight,
    server_cert: Option<ServerCert>,
    progress: HandshakeState,
}

impl State for ExpectServerDoneOrCertReq {
    fn handle(mut self: Box<Self>, cx: &mut CommonState, m: Message) -> NextStateOrError {
        if m.is_handshake_type(HandshakeType::ServerHelloDone) {
            return emit_client_flight(self.flight, self.server_cert, None, cx, m);
        }

        match &m.payload {
            MessagePayload::Handshake {
                parsed:
                    HandshakeMessagePayload {
                        payload: HandshakePayload::CertificateRequest(certreq),
                        ..
                    },
                ..
            } => {
                debug!(
                    "Got CertificateRequest for types {:?}, {} CA names",
                    certreq.certtypes,
                    certreq.canames.len()
                );
                let certreq = certreq.clone();
                self.flight.transcript.add_message(&m);

                log_progress(HandshakeState::CertificateRequestReceived);
                Ok(Box::new(ExpectServerDone {
                    flight: self.flight,
                    server_cert: self.server_cert,
                    certreq,
                }))
            }
            payload => Err(inappropriate_handshake_message(
                payload,
                &[ContentType::Handshake],
                &[
                    HandshakeType::CertificateRequest,
                    HandshakeType::ServerHelloDone,
                ],
            )),
        }
    }

    fn handshake_state(&self) -> HandshakeState {
        self.progress
    }
}

struct ExpectServerDone {
    flight: ServerFlight,
    server_cert: Option<ServerCert>,
    certreq: CertificateRequestPayload,
}

impl State for ExpectServerDone {
    fn handle(self: Box<Self>, cx: &mut CommonState, m: Message) -> NextStateOrError {
        if !m.is_handshake_type(HandshakeType::ServerHelloDone) {
            return Err(inappropriate_handshake_message(
                &m.payload,
                &[ContentType::Handshake],
                &[HandshakeType::ServerHelloDone],
            ));
        }
        emit_client_flight(self.flight, self.server_cert, Some(self.certreq), cx, m)
    }

    fn handshake_state(&self) -> HandshakeState {
        HandshakeState::CertificateRequestReceived
    }
}

fn client_certificate_type(algorithm: SignatureAlgorithm) -> ClientCertificateType {
    match algorithm {
        SignatureAlgorithm::RSA => ClientCertificateType::RSASign,
        SignatureAlgorithm::DSA => ClientCertificateType::DSSSign,
    }
}

/// Our configured credentials, if the server asked for a kind we have.
fn choose_client_auth<'a>(
    config: &'a ClientConfig,
    certreq: &CertificateRequestPayload,
) -> Option<&'a ClientCertKey> {
    let auth = config.client_auth.as_deref()?;
    let wanted = client_certificate_type(auth.key.algorithm());
    match certreq.certtypes.contains(&wanted) {
        true => Some(auth),
        false => {
            warn!(
                "Server wants a client certificate of type {:?}, we have {:?}",
                certreq.certtypes, wanted
            );
            None
        }
    }
}

fn emit_certificate(transcript: &mut HandshakeTranscripts, chain: Vec<Certificate>, cx: &mut CommonState) {
    let cert = Message::build_handshake(HandshakeMessagePayload::build(
        HandshakeType::Certificate,
        HandshakePayload::Certificate(chain),
    ));

    transcript.add_message(&cert);
    cx.send_msg(cert);
}

/// Send our Finished, and give back the transcript the server's
/// Finished is checked against.
fn emit_finished(
    secrets: &ConnectionSecrets,
    transcript: HandshakeTranscripts,
    cx: &mut CommonState,
) -> HandshakeHash {
    let (client_hash, mut server_hash) = transcript.into_finished();
    let verify_data = secrets.client_verify_data(&client_hash.finish());

    let f = Message::build_handshake(HandshakeMessagePayload::build(
        HandshakeType::Finished,
        HandshakePayload::Finished(Payload::new(verify_data.to_vec())),
    ));

    server_hash.add_message(&f);
    cx.send_msg(f);
    server_hash
}

/// The server's flight is over: send ours, from our Certificate (if
/// asked for) through to our Finished.
fn emit_client_flight(
    mut flight: ServerFlight,
    server_cert: Option<ServerCert>,
    certreq: Option<CertificateRequestPayload>,
    cx: &mut CommonState,
    done: Message,
) -> NextStateOrError {
    flight.transcript.add_message(&done);
    log_progress(HandshakeState::ServerHelloDoneReceived);

    let config = Arc::clone(&flight.config);
    let client_auth = match &certreq {
        Some(certreq) => {
            let auth = choose_client_auth(&config, certreq);
            let chain = auth
                .map(|auth| auth.cert.clone())
                .unwrap_or_default();
            debug!("Sending client certificate chain of {} certificates", chain.len());
            emit_certificate(&mut flight.transcript, chain, cx);
            auth
        }
        None => None,
    };

    let server_key = server_cert
        .as_ref()
        .map(|cert| &cert.public_key);
    let output = flight
        .kx
        .negotiate(server_key)
        .map_err(|err| {
            let desc = match &err {
                Error::KeyExchange(why) => why.alert(),
                _ => AlertDescription::InternalError,
            };
            cx.send_fatal_alert(desc, err)
        })?;

    let ckx = Message::build_handshake(HandshakeMessagePayload::build(
        HandshakeType::ClientKeyExchange,
        HandshakePayload::ClientKeyExchange(PayloadU16::new(output.client_contribution)),
    ));
    flight.transcript.add_message(&ckx);
    cx.send_msg(ckx);
    log_progress(HandshakeState::ClientKeyExchangeSent);

    let certificate_verify_hash = flight.transcript.take_certificate_verify();
    if let (Some(auth), Some(hash)) = (client_auth, certificate_verify_hash) {
        let signature = auth
            .key
            .sign_transcript(hash)
            .map_err(|err| cx.send_fatal_alert(AlertDescription::InternalError, err))?;

        let cv = Message::build_handshake(HandshakeMessagePayload::build(
            HandshakeType::CertificateVerify,
            HandshakePayload::CertificateVerify(PayloadU16::new(signature)),
        ));
        flight.transcript.add_message(&cv);
        cx.send_msg(cv);
        log_progress(HandshakeState::CertificateVerifySent);
    }

    let secrets = ConnectionSecrets::from_pre_master_secret(
        output.pre_master_secret,
        flight.randoms,
        flight.suite,
    );

    if config.key_log.will_log("CLIENT_RANDOM") {
        config.key_log.log(
            "CLIENT_RANDOM",
            &secrets.randoms.client,
            secrets.master_secret(),
        );
    }

    cx.start_encryption(&secrets)
        .map_err(|err| cx.send_fatal_alert(AlertDescription::InternalError, err))?;

    cx.send_msg(Message::build_change_cipher_spec());
    cx.record_layer.start_encrypting();
    log_progress(HandshakeState::ClientChangeCipherSpecSent);

    let transcript = emit_finished(&secrets, flight.transcript, cx);
    log_progress(HandshakeState::ClientFinishedSent);

    Ok(Box::new(ExpectCcs {
        secrets,
        transcript,
    }))
}

struct ExpectCcs {
    secrets: ConnectionSecrets,
    transcript: HandshakeHash,
}

impl State for ExpectCcs {
    fn handle(self: Box<Self>, cx: &mut CommonState, m: Message) -> NextStateOrError {
        match m.payload {
            MessagePayload::ChangeCipherSpec(..) => {}
            payload => {
                return Err(inappropriate_message(
                    &payload,
                    &[ContentType::ChangeCipherSpec],
                ));
            }
        }

        // From here on, the server's records are encrypted.
        cx.record_layer.start_decrypting();

        log_progress(HandshakeState::ServerChangeCipherSpecReceived);
        Ok(Box::new(ExpectFinished {
            secrets: self.secrets,
            transcript: self.transcript,
        }))
    }

    fn handshake_state(&self) -> HandshakeState {
        HandshakeState::ClientFinishedSent
    }
}

struct ExpectFinished {
    secrets: ConnectionSecrets,
    transcript: HandshakeHash,
}

impl State for ExpectFinished {
    fn handle(self: Box<Self>, cx: &mut CommonState, m: Message) -> NextStateOrError {
        let finished =
            require_handshake_msg!(m, HandshakeType::Finished, HandshakePayload::Finished)?;

        let Self { secrets, transcript } = *self;
        let expect_verify_data = secrets.server_verify_data(&transcript.finish());

        let fin_verified = match bool::from(expect_verify_data[..].ct_eq(finished.bytes())) {
            true => FinishedMessageVerified::assertion(),
            false => {
                return Err(cx.send_fatal_alert(
                    AlertDescription::HandshakeFailure,
                    Error::DecryptError,
                ));
            }
        };

        cx.start_traffic();

        log_progress(HandshakeState::Done);
        Ok(Box::new(ExpectTraffic {
            _fin_verified: fin_verified,
        }))
    }

    fn handshake_state(&self) -> HandshakeState {
        HandshakeState::ServerChangeCipherSpecReceived
    }
}

struct ExpectTraffic {
    _fin_verified: FinishedMessageVerified,
}

impl State for ExpectTraffic {
    fn handle(self: Box<Self>, cx: &mut CommonState, m: Message) -> NextStateOrError {
        match m.payload {
            MessagePayload::ApplicationData(payload) => cx.take_received_plaintext(payload),
            payload => {
                return Err(inappropriate_message(
                    &payload,
                    &[ContentType::ApplicationData],
                ));
            }
        }
        Ok(self)
    }

    fn handshake_state(&self) -> HandshakeState {
        HandshakeState::Done
    }
}
