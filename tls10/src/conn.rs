use std::fmt;
use std::io;
use std::mem;
use std::sync::Arc;

use crate::client::hs;
use crate::client::{ClientConfig, HandshakeState};
use crate::common_state::{CommonState, ConnectionStatus, IoState};
use crate::enums::{AlertDescription, ContentType, HandshakeType};
use crate::error::{Error, PeerMisbehaved};
#[cfg(feature = "logging")]
use crate::log::{debug, error, trace};
use crate::msgs::alert::AlertJoiner;
use crate::msgs::deframer::MessageDeframer;
use crate::msgs::hsjoiner::HandshakeJoiner;
use crate::msgs::message::{Message, OpaqueMessage};
use crate::rand;
use crate::suites::SupportedCipherSuite;

/// The two hello randoms.
#[derive(Clone, Debug)]
pub(crate) struct ConnectionRandoms {
    pub(crate) client: [u8; 32],
    pub(crate) server: [u8; 32],
}

impl ConnectionRandoms {
    /// Our random is the current unix time in seconds, followed by 28
    /// random bytes.  The server's is filled in from its ServerHello.
    pub(crate) fn for_client(unix_time: u32) -> Result<Self, rand::GetRandomFailed> {
        let mut ret = Self {
            client: [0u8; 32],
            server: [0u8; 32],
        };

        ret.client[..4].copy_from_slice(&unix_time.to_be_bytes());
        rand::fill_random(&mut ret.client[4..])?;
        Ok(ret)
    }
}

/// A structure that implements `std::io::Read` for reading plaintext.
pub struct Reader<'a> {
    common: &'a mut CommonState,
}

impl<'a> io::Read for Reader<'a> {
    /// Obtain plaintext data received from the peer over this TLS connection.
    ///
    /// If the peer closes the TLS session cleanly, this returns `Ok(0)` once all
    /// the pending data has been read.  No further data can be received on that
    /// connection, so the underlying TCP connection should be half-closed too.
    ///
    /// If the connection has failed, this returns an error of kind `NotConnected`
    /// once the pending data has been read.
    ///
    /// If there are no bytes to read, this returns `Err(ErrorKind::WouldBlock.into())`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.common.read(buf)
    }
}

/// A structure that implements `std::io::Write` for writing plaintext.
pub struct Writer<'a> {
    common: &'a mut CommonState,
}

impl<'a> io::Write for Writer<'a> {
    /// Send the plaintext `buf` to the peer, encrypting
    /// and authenticating it.  Once this function succeeds
    /// you should call `write_tls` which will output the
    /// corresponding TLS records.
    ///
    /// This function buffers plaintext sent before the
    /// TLS handshake completes, and sends it as soon
    /// as it can.
    ///
    /// Writing after `send_close_notify`, or after the connection
    /// failed, is an error.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.common
            .send_some_plaintext(buf)
            .map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A TLS 1.0 client connection.
///
/// This is sans-IO: bytes from the server are given to [`Self::read_tls`]
/// and processed by [`Self::process_new_packets`], and bytes for the
/// server are taken with [`Self::write_tls`].  [`Self::complete_io`] and
/// [`crate::TlsStream`] do that for a blocking transport.
pub struct ClientConnection {
    common: CommonState,
    state: Result<Box<dyn hs::State>, Error>,
    message_deframer: MessageDeframer,
    handshake_joiner: HandshakeJoiner,
    alert_joiner: AlertJoiner,
}

impl ClientConnection {
    /// Make a new ClientConnection.  The ClientHello is queued at once,
    /// ready for `write_tls`.
    pub fn new(config: Arc<ClientConfig>) -> Result<Self, Error> {
        let mut common = CommonState::new();
        let state = hs::start_handshake(config, &mut common)?;

        Ok(Self {
            common,
            state: Ok(state),
            message_deframer: MessageDeframer::default(),
            handshake_joiner: HandshakeJoiner::new(),
            alert_joiner: AlertJoiner::new(),
        })
    }

    /// Read TLS content from `rd`.  This method does internal
    /// buffering, so `rd` can supply TLS messages in arbitrary-
    /// sized chunks (like a socket or pipe might).
    ///
    /// You should call `process_new_packets` each time a call to
    /// this function succeeds.
    ///
    /// The returned error only relates to IO on `rd`.  TLS-level
    /// errors are emitted from `process_new_packets`.
    ///
    /// This function returns `Ok(0)` when the underlying `rd` does
    /// so.  This typically happens when a socket is cleanly closed,
    /// or a file is at EOF.
    ///
    /// Any error from `rd` other than `WouldBlock` or `Interrupted`
    /// fails the connection: `process_new_packets` returns it as
    /// [`Error::Transport`] from then on.
    pub fn read_tls(&mut self, rd: &mut dyn io::Read) -> io::Result<usize> {
        if self.common.has_received_close_notify() {
            return Ok(0);
        }

        match self.message_deframer.read(rd) {
            Err(err) if !self.message_deframer.is_full() => Err(self.transport_failed(err)),
            result => result,
        }
    }

    /// Writes TLS messages to `wr`.
    ///
    /// On success the function returns `Ok(n)` where `n` is a number
    /// of bytes written to `wr`, number of bytes after encoding and
    /// encryption.
    ///
    /// Errors from `wr` fail the connection, as for `read_tls`.
    pub fn write_tls(&mut self, wr: &mut dyn io::Write) -> io::Result<usize> {
        match self.common.sendable_tls.write_to(wr) {
            Err(err) => Err(self.transport_failed(err)),
            ok => ok,
        }
    }

    /// Record a broken transport as the end of this connection, and
    /// give back `err` for the caller.
    fn transport_failed(&mut self, err: io::Error) -> io::Error {
        if matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
        ) {
            return err;
        }

        if self.state.is_ok() {
            error!("Transport failed: {}", err);
            self.state = Err(io::Error::new(err.kind(), err.to_string()).into());
        }
        self.common.lose_transport();
        err
    }

    /// Returns an object that allows reading plaintext.
    pub fn reader(&mut self) -> Reader {
        Reader {
            common: &mut self.common,
        }
    }

    /// Returns an object that allows writing plaintext.
    pub fn writer(&mut self) -> Writer {
        Writer {
            common: &mut self.common,
        }
    }

    /// Returns true if the caller should call `read_tls` as soon
    /// as possible.
    pub fn wants_read(&self) -> bool {
        // We want to read more data all the time, except when we have
        // unprocessed plaintext, or the connection is over.  During the
        // handshake we first want to be rid of our own flight.
        self.state.is_ok()
            && self.common.status() != ConnectionStatus::Closed
            && !self.common.has_readable_plaintext()
            && (!self.common.is_handshaking() || !self.common.wants_write())
    }

    /// Returns true if the caller should call `write_tls` as soon
    /// as possible.
    pub fn wants_write(&self) -> bool {
        self.common.wants_write()
    }

    /// Returns true if the connection is currently performing the TLS
    /// handshake.  During this time plaintext written to the
    /// connection is buffered in memory.
    pub fn is_handshaking(&self) -> bool {
        self.common.is_handshaking()
    }

    /// Where the handshake has got to.
    pub fn handshake_state(&self) -> HandshakeState {
        match &self.state {
            Ok(state) => state.handshake_state(),
            Err(_) => HandshakeState::Failed,
        }
    }

    /// Where the connection is in its shutdown.
    pub fn status(&self) -> ConnectionStatus {
        self.common.status()
    }

    /// Retrieves the ciphersuite agreed with the peer.
    ///
    /// This returns None until the ciphersuite is agreed.
    pub fn negotiated_cipher_suite(&self) -> Option<&'static SupportedCipherSuite> {
        self.common.negotiated_cipher_suite()
    }

    /// Queues a close_notify warning alert to be sent in the next
    /// `write_tls` call.  This informs the peer that the
    /// connection is being closed.
    ///
    /// Calling this more than once does nothing more.
    pub fn send_close_notify(&mut self) {
        self.common.send_close_notify();
    }

    /// Processes any new packets read by a previous call to `read_tls`.
    ///
    /// Errors from this function relate to TLS protocol errors, and
    /// are fatal to the connection.  Future calls after an error will do
    /// no new work and will return the same error.  Any alert describing
    /// the error is queued for `write_tls`.
    ///
    /// Success from this function comes with some sundry state data
    /// about the connection.
    pub fn process_new_packets(&mut self) -> Result<IoState, Error> {
        let mut state = match mem::replace(&mut self.state, Err(Error::HandshakeNotComplete)) {
            Ok(state) => state,
            Err(e) => {
                self.state = Err(e.clone());
                return Err(e);
            }
        };

        // nothing after a close_notify is processed
        while !self.common.has_received_close_notify() {
            let msg = match self.message_deframer.pop() {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(err) => return Err(self.fail(err)),
            };

            state = match self.process_msg(msg, state) {
                Ok(state) => state,
                Err(err) => return Err(self.fail(err)),
            };
        }

        self.state = Ok(state);
        Ok(self.common.current_io_state())
    }

    fn fail(&mut self, err: Error) -> Error {
        let err = self.common.escalate(err);
        self.state = Err(err.clone());
        err
    }

    /// Route one record by its content type.
    fn process_msg(
        &mut self,
        msg: OpaqueMessage,
        state: Box<dyn hs::State>,
    ) -> Result<Box<dyn hs::State>, Error> {
        let msg = match self.common.record_layer.decrypt_incoming(msg) {
            Ok(msg) => msg,
            Err(err @ Error::PeerSentOversizedRecord) => {
                return Err(self
                    .common
                    .send_fatal_alert(AlertDescription::RecordOverflow, err))
            }
            Err(err) => {
                return Err(self
                    .common
                    .send_fatal_alert(AlertDescription::BadRecordMac, err))
            }
        };
        trace!("Received {:?} record of {} bytes", msg.typ, msg.payload.0.len());

        // Handshake messages may span records, but nothing may come
        // between their fragments.
        if !self.handshake_joiner.is_empty() && msg.typ != ContentType::Handshake {
            let why = match msg.typ {
                ContentType::ChangeCipherSpec => PeerMisbehaved::KeyEpochWithPendingFragment,
                _ => PeerMisbehaved::MessageInterleavedWithHandshakeMessage,
            };
            return Err(self
                .common
                .send_fatal_alert(AlertDescription::UnexpectedMessage, why));
        }

        match msg.typ {
            ContentType::Handshake => {
                self.handshake_joiner
                    .push(msg)
                    .map_err(|err| self.common.send_fatal_alert(err.into(), err))?;

                let mut state = state;
                while let Some(msg) = self.handshake_joiner.pop() {
                    state = self.process_main_protocol(msg, state)?;
                }
                Ok(state)
            }
            ContentType::Alert => {
                self.alert_joiner
                    .push(msg)
                    .map_err(|err| self.common.send_fatal_alert(err.into(), err))?;

                while let Some(alert) = self.alert_joiner.pop() {
                    self.common.process_alert(&alert)?;
                    if self.common.has_received_close_notify() {
                        break;
                    }
                }
                Ok(state)
            }
            ContentType::ChangeCipherSpec | ContentType::ApplicationData => {
                let msg = Message::try_from(msg)
                    .map_err(|err| self.common.send_fatal_alert(err.into(), err))?;
                self.process_main_protocol(msg, state)
            }
            _ => {
                debug!("Dropping record of unknown content type {:?}", msg.typ);
                Ok(state)
            }
        }
    }

    /// Give `msg` to the current state, which decides whether it is
    /// acceptable and what state comes next.
    fn process_main_protocol(
        &mut self,
        msg: Message,
        state: Box<dyn hs::State>,
    ) -> Result<Box<dyn hs::State>, Error> {
        // Renegotiation is not supported: once the handshake is over,
        // a HelloRequest is declined with a warning.
        if !self.common.is_handshaking() && msg.is_handshake_type(HandshakeType::HelloRequest) {
            self.common
                .send_warning_alert(AlertDescription::NoRenegotiation);
            return Ok(state);
        }

        match state.handle(&mut self.common, msg) {
            Ok(next) => Ok(next),
            Err(e @ Error::InappropriateMessage { .. })
            | Err(e @ Error::InappropriateHandshakeMessage { .. }) => Err(self
                .common
                .send_fatal_alert(AlertDescription::UnexpectedMessage, e)),
            Err(e) => Err(e),
        }
    }

    /// This function uses `io` to complete any outstanding IO for
    /// this connection.
    ///
    /// What this means depends on the connection state:
    ///
    /// - If the connection `is_handshaking()`, then IO is performed until
    ///   the handshake is complete.
    /// - Otherwise, if `wants_write` is true, `write_tls` is invoked
    ///   until it is all written.
    /// - Otherwise, if `wants_read` is true, `read_tls` is invoked
    ///   once.
    ///
    /// The return value is the number of bytes read from and written
    /// to `io`, respectively.
    ///
    /// This function will block if `io` blocks.
    ///
    /// Errors from TLS record handling (i.e., from `process_new_packets()`)
    /// are wrapped in an `io::ErrorKind::InvalidData`-kind error.
    pub fn complete_io<T>(&mut self, io: &mut T) -> Result<(usize, usize), io::Error>
    where
        T: io::Read + io::Write,
    {
        if let Err(err @ Error::Transport(_)) = &self.state {
            return Err(io::Error::new(io::ErrorKind::NotConnected, err.clone()));
        }

        let until_handshaked = self.is_handshaking();
        let mut eof = false;
        let mut wrlen = 0;
        let mut rdlen = 0;

        loop {
            while self.wants_write() {
                wrlen += self.write_tls(io)?;
            }

            if !until_handshaked && wrlen > 0 {
                return Ok((rdlen, wrlen));
            }

            if !eof && self.wants_read() {
                match self.read_tls(io)? {
                    0 => eof = true,
                    n => rdlen += n,
                }
            }

            match self.process_new_packets() {
                Ok(_) => {}
                Err(e) => {
                    // In case we have an alert to send describing this error,
                    // try a last-gasp write -- but don't predate the primary
                    // error.
                    let _ignored = self.write_tls(io);

                    return Err(io::Error::new(io::ErrorKind::InvalidData, e));
                }
            };

            match (eof, until_handshaked, self.is_handshaking()) {
                (_, true, false) => return Ok((rdlen, wrlen)),
                (_, false, _) => return Ok((rdlen, wrlen)),
                (true, true, true) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
                (..) => {}
            }
        }
    }
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("handshake_state", &self.handshake_state())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
