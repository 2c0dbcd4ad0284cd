use md5::Md5;
use sha1::{Digest, Sha1};

use crate::msgs::message::{Message, MessagePayload};

/// Length of a TLS 1.0 handshake hash: MD5 followed by SHA-1.
pub(crate) const HANDSHAKE_HASH_LEN: usize = 16 + 20;

/// This deals with keeping a running hash of the handshake
/// payloads, using the MD5 and SHA-1 pair TLS 1.0 feeds
/// into its PRF and signatures.
#[derive(Clone)]
pub(crate) struct HandshakeHash {
    md5: Md5,
    sha1: Sha1,
}

impl HandshakeHash {
    pub(crate) fn new() -> Self {
        Self {
            md5: Md5::new(),
            sha1: Sha1::new(),
        }
    }

    /// Hash a handshake message.
    pub(crate) fn add_message(&mut self, m: &Message) -> &mut Self {
        if let MessagePayload::Handshake { encoded, .. } = &m.payload {
            self.update_raw(&encoded.0);
        }
        self
    }

    /// Hash a byte slice.
    pub(crate) fn update_raw(&mut self, buf: &[u8]) -> &mut Self {
        self.md5.update(buf);
        self.sha1.update(buf);
        self
    }

    /// The SHA-1 half alone, still open for more input.
    pub(crate) fn sha1(&self) -> Sha1 {
        self.sha1.clone()
    }

    /// Consume the hash, giving `MD5(messages) + SHA1(messages)`.
    pub(crate) fn finish(self) -> [u8; HANDSHAKE_HASH_LEN] {
        let mut out = [0u8; HANDSHAKE_HASH_LEN];
        out[..16].copy_from_slice(&self.md5.finalize());
        out[16..].copy_from_slice(&self.sha1.finalize());
        out
    }
}

/// The three transcripts a TLS 1.0 client needs.
///
/// They are fed at one place, and each diverges from the
/// others only by when it is taken:
///
/// - `certificate_verify` covers everything up to and including
///   ClientKeyExchange,
/// - `client_finished` covers everything before our Finished,
/// - `server_finished` additionally covers our Finished.
///
/// A taken transcript stops being updated.  Taking the client
/// Finished one consumes the set, so it happens exactly once.
pub(crate) struct HandshakeTranscripts {
    certificate_verify: Option<HandshakeHash>,
    client_finished: HandshakeHash,
    server_finished: HandshakeHash,
}

impl HandshakeTranscripts {
    pub(crate) fn new() -> Self {
        Self {
            certificate_verify: Some(HandshakeHash::new()),
            client_finished: HandshakeHash::new(),
            server_finished: HandshakeHash::new(),
        }
    }

    /// Add a handshake message to every transcript not yet taken.
    pub(crate) fn add_message(&mut self, m: &Message) {
        if let Some(hash) = &mut self.certificate_verify {
            hash.add_message(m);
        }
        self.client_finished.add_message(m);
        self.server_finished.add_message(m);
    }

    pub(crate) fn take_certificate_verify(&mut self) -> Option<HandshakeHash> {
        self.certificate_verify.take()
    }

    /// Give back the client Finished transcript, and the server
    /// Finished one, which goes on to cover our Finished.
    pub(crate) fn into_finished(self) -> (HandshakeHash, HandshakeHash) {
        (self.client_finished, self.server_finished)
    }
}
