use std::io;

use crate::enums::{AlertDescription, ContentType, ProtocolVersion};
use crate::error::Error;
#[cfg(feature = "logging")]
use crate::log::{debug, error, trace, warn};
use crate::msgs::alert::AlertMessagePayload;
use crate::msgs::base::Payload;
use crate::msgs::enums::AlertLevel;
use crate::msgs::fragmenter::MessageFragmenter;
use crate::msgs::message::{BorrowedPlainMessage, Message, OpaqueMessage, PlainMessage};
use crate::record_layer::RecordLayer;
use crate::suites::SupportedCipherSuite;
use crate::tls10::ConnectionSecrets;
use crate::vecbuf::ChunkVecBuffer;

/// How far the connection has got in shutting down.
///
/// A connection only moves forward through these: `Open` until we
/// send close_notify, `Closing` until the peer answers it, and
/// `Closed` after that or after any fatal alert in either direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Records may flow in both directions.
    Open,
    /// We sent close_notify, and are waiting for the peer's.
    Closing,
    /// Nothing more will be sent or accepted.
    Closed,
}

/// Connection state shared by the handshake states and the record
/// processing that drives them.
pub struct CommonState {
    pub(crate) record_layer: RecordLayer,
    pub(crate) suite: Option<&'static SupportedCipherSuite>,
    status: ConnectionStatus,
    traffic: bool,
    has_received_close_notify: bool,
    sent_fatal_alert: bool,
    message_fragmenter: MessageFragmenter,
    received_plaintext: ChunkVecBuffer,
    sendable_plaintext: ChunkVecBuffer,
    pub(crate) sendable_tls: ChunkVecBuffer,
}

impl CommonState {
    pub(crate) fn new() -> Self {
        Self {
            record_layer: RecordLayer::new(),
            suite: None,
            status: ConnectionStatus::Open,
            traffic: false,
            has_received_close_notify: false,
            sent_fatal_alert: false,
            message_fragmenter: MessageFragmenter::default(),
            received_plaintext: ChunkVecBuffer::new(),
            sendable_plaintext: ChunkVecBuffer::new(),
            sendable_tls: ChunkVecBuffer::new(),
        }
    }

    /// The transport is gone: nothing more can be sent or received.
    pub(crate) fn lose_transport(&mut self) {
        self.status = ConnectionStatus::Closed;
        self.sendable_tls = ChunkVecBuffer::new();
    }

    /// Returns true if the caller should call `write_tls` as soon as possible.
    pub fn wants_write(&self) -> bool {
        !self.sendable_tls.is_empty()
    }

    /// Returns true if the handshake has not finished.  During this time
    /// plaintext written to the connection is buffered in memory.
    pub fn is_handshaking(&self) -> bool {
        !self.traffic
    }

    /// Where the connection is in its shutdown.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Retrieves the ciphersuite agreed with the peer.
    ///
    /// This returns None until the ciphersuite is agreed.
    pub fn negotiated_cipher_suite(&self) -> Option<&'static SupportedCipherSuite> {
        self.suite
    }

    pub(crate) fn has_readable_plaintext(&self) -> bool {
        !self.received_plaintext.is_empty()
    }

    pub(crate) fn has_received_close_notify(&self) -> bool {
        self.has_received_close_notify
    }

    pub(crate) fn current_io_state(&self) -> IoState {
        IoState {
            tls_bytes_to_write: self.sendable_tls.len(),
            plaintext_bytes_to_read: self.received_plaintext.len(),
            peer_has_closed: self.has_received_close_notify,
        }
    }

    /// Install the record protection derived from `secrets`.  Each
    /// direction is switched on later, at its ChangeCipherSpec.
    pub(crate) fn start_encryption(&mut self, secrets: &ConnectionSecrets) -> Result<(), Error> {
        let (dec, enc) = secrets.make_cipher_pair()?;
        self.record_layer
            .prepare_message_encrypter(enc);
        self.record_layer
            .prepare_message_decrypter(dec);
        Ok(())
    }

    pub(crate) fn start_traffic(&mut self) {
        self.traffic = true;
        self.flush_plaintext();
    }

    /// Send any buffered plaintext.  Plaintext is buffered if
    /// written during handshake.
    fn flush_plaintext(&mut self) {
        if !self.traffic {
            return;
        }

        while let Some(buf) = self.sendable_plaintext.pop() {
            self.send_plain(&buf);
        }
    }

    /// Send plaintext application data, fragmenting and encrypting it
    /// as it goes out.
    pub(crate) fn send_some_plaintext(&mut self, data: &[u8]) -> Result<usize, Error> {
        if self.status != ConnectionStatus::Open {
            return Err(Error::ConnectionClosed);
        }

        Ok(self.send_plain(data))
    }

    fn send_plain(&mut self, data: &[u8]) -> usize {
        if !self.traffic {
            // If we haven't completed handshaking, buffer
            // plaintext to send once we do.
            return self
                .sendable_plaintext
                .append(data.to_vec());
        }

        debug_assert!(self.record_layer.is_encrypting());

        if data.is_empty() {
            // Don't send empty fragments.
            return 0;
        }

        self.send_appdata_encrypt(data)
    }

    fn send_appdata_encrypt(&mut self, payload: &[u8]) -> usize {
        // An empty record goes first: its ciphertext becomes the IV
        // of the record carrying the data, which the sender of that
        // data cannot predict.
        self.send_single_fragment(BorrowedPlainMessage {
            typ: ContentType::ApplicationData,
            version: ProtocolVersion::TLSv1_0,
            payload: &[],
        });

        for m in self.message_fragmenter.fragment_slice(
            ContentType::ApplicationData,
            ProtocolVersion::TLSv1_0,
            payload,
        ) {
            self.send_single_fragment(m);
        }

        payload.len()
    }

    fn send_single_fragment(&mut self, m: BorrowedPlainMessage) {
        // Close connection once we start to run out of
        // sequence space.
        if self
            .record_layer
            .wants_close_before_encrypt()
        {
            self.send_close_notify();
        }

        // Refuse to wrap counter at all costs.  This
        // is basically untestable unfortunately.
        if self.record_layer.encrypt_exhausted() {
            return;
        }

        match self.record_layer.encrypt_outgoing(m) {
            Ok(em) => self.queue_tls_message(em),
            Err(e) => error!("Dropping record we cannot encrypt: {}", e),
        }
    }

    // Put m into sendable_tls for writing.
    fn queue_tls_message(&mut self, m: OpaqueMessage) {
        self.sendable_tls.append(m.encode());
    }

    /// Send a raw TLS message, fragmenting it if needed.  It is
    /// encrypted if our ChangeCipherSpec has been sent.
    pub(crate) fn send_msg(&mut self, m: Message) {
        let plain = PlainMessage::from(m);
        for m in self
            .message_fragmenter
            .fragment_message(&plain)
        {
            self.send_single_fragment(m);
        }
    }

    pub(crate) fn take_received_plaintext(&mut self, bytes: Payload) {
        trace!("Received {} bytes of application data", bytes.0.len());
        self.received_plaintext.append(bytes.0);
    }

    pub(crate) fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.received_plaintext.read(buf)?;

        if len == 0 && !buf.is_empty() {
            // no bytes available:
            // - if we received a close_notify, this is a genuine permanent EOF
            // - if the connection failed, nothing will ever arrive
            // - otherwise say EWOULDBLOCK
            if self.has_received_close_notify {
                return Ok(0);
            } else if self.status == ConnectionStatus::Closed {
                return Err(Error::ConnectionClosed.into());
            }
            return Err(io::ErrorKind::WouldBlock.into());
        }

        Ok(len)
    }

    pub(crate) fn process_alert(&mut self, alert: &AlertMessagePayload) -> Result<(), Error> {
        // Reject unknown AlertLevels.
        if let AlertLevel::Unknown(_) = alert.level {
            return Err(self.send_fatal_alert(
                AlertDescription::IllegalParameter,
                Error::AlertReceived(alert.description),
            ));
        }

        // A close_notify is answered, then the connection is closed.
        if alert.description == AlertDescription::CloseNotify {
            debug!("Received close_notify");
            self.has_received_close_notify = true;
            if self.status == ConnectionStatus::Open {
                self.send_warning_alert_no_log(AlertDescription::CloseNotify);
            }
            self.status = ConnectionStatus::Closed;

            // a handshake cut short cannot be completed
            if !self.traffic {
                return Err(Error::AlertReceived(alert.description));
            }
            return Ok(());
        }

        if alert.level == AlertLevel::Warning {
            warn!("TLS alert warning received: {:?}", alert);
            return Ok(());
        }

        error!("TLS alert received: {:?}", alert);
        self.status = ConnectionStatus::Closed;
        Err(Error::AlertReceived(alert.description))
    }

    pub(crate) fn send_warning_alert(&mut self, desc: AlertDescription) {
        warn!("Sending warning alert {:?}", desc);
        self.send_warning_alert_no_log(desc);
    }

    /// Queue a fatal alert, close the connection, and give back `err`
    /// for the caller to return.
    ///
    /// Nothing is sent once the connection is closed, so a connection
    /// never sends more than one fatal alert.
    pub(crate) fn send_fatal_alert(
        &mut self,
        desc: AlertDescription,
        err: impl Into<Error>,
    ) -> Error {
        if self.status != ConnectionStatus::Closed {
            debug_assert!(!self.sent_fatal_alert);
            warn!("Sending fatal alert {:?}", desc);
            let m = Message::build_alert(AlertLevel::Fatal, desc);
            self.send_msg(m);
            self.sent_fatal_alert = true;
            self.status = ConnectionStatus::Closed;
        }
        err.into()
    }

    /// Make `err` terminal for the connection.
    ///
    /// Errors are normally reported with [`Self::send_fatal_alert`] where
    /// they are found.  Anything that got here without an alert gets one
    /// chosen from the error itself.
    pub(crate) fn escalate(&mut self, err: Error) -> Error {
        if self.status == ConnectionStatus::Closed {
            return err;
        }

        let desc = match &err {
            Error::InappropriateMessage { .. } | Error::InappropriateHandshakeMessage { .. } => {
                AlertDescription::UnexpectedMessage
            }
            Error::InvalidMessage(why) => AlertDescription::from(*why),
            Error::KeyExchange(why) => why.alert(),
            Error::InvalidCertificate(why) => AlertDescription::from(why.clone()),
            Error::DecryptError => AlertDescription::BadRecordMac,
            Error::PeerSentOversizedRecord => AlertDescription::RecordOverflow,
            Error::PeerIncompatible(_) => AlertDescription::HandshakeFailure,
            Error::PeerMisbehaved(_) => AlertDescription::IllegalParameter,
            _ => AlertDescription::InternalError,
        };
        self.send_fatal_alert(desc, err)
    }

    /// Queues a close_notify warning alert to be sent in the next
    /// `write_tls` call.  This informs the peer that the
    /// connection is being closed.
    ///
    /// Only the first call has any effect.
    pub fn send_close_notify(&mut self) {
        if self.status != ConnectionStatus::Open {
            return;
        }

        debug!("Sending warning alert {:?}", AlertDescription::CloseNotify);
        self.status = ConnectionStatus::Closing;
        self.send_warning_alert_no_log(AlertDescription::CloseNotify);
    }

    fn send_warning_alert_no_log(&mut self, desc: AlertDescription) {
        let m = Message::build_alert(AlertLevel::Warning, desc);
        self.send_msg(m);
    }
}

/// Values of this structure are returned from
/// [`crate::ClientConnection::process_new_packets`] and tell the caller
/// the current I/O state of the TLS connection.
#[derive(Debug, PartialEq, Eq)]
pub struct IoState {
    tls_bytes_to_write: usize,
    plaintext_bytes_to_read: usize,
    peer_has_closed: bool,
}

impl IoState {
    /// How many bytes could be written by `write_tls` if called
    /// right now.  A non-zero value implies `wants_write`.
    pub fn tls_bytes_to_write(&self) -> usize {
        self.tls_bytes_to_write
    }

    /// How many plaintext bytes could be obtained via `std::io::Read`
    /// without further I/O.
    pub fn plaintext_bytes_to_read(&self) -> usize {
        self.plaintext_bytes_to_read
    }

    /// True if the peer has sent us a close_notify alert.  This is
    /// the TLS mechanism to securely half-close a TLS connection,
    /// and signifies that the peer will not send any further data
    /// on this connection.
    ///
    /// This is also signalled via returning `Ok(0)` from
    /// `std::io::Read`, after all the received bytes have been
    /// retrieved.
    pub fn peer_has_closed(&self) -> bool {
        self.peer_has_closed
    }
}
