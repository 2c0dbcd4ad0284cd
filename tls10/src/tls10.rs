use zeroize::{Zeroize, Zeroizing};

use crate::cipher::{self, MessageDecrypter, MessageEncrypter};
use crate::conn::ConnectionRandoms;
use crate::error::Error;
use crate::hash_hs::HANDSHAKE_HASH_LEN;
use crate::prf;
use crate::suites::{SupportedCipherSuite, MAC_LEN};

/// Length of the master secret.
pub(crate) const MASTER_SECRET_LEN: usize = 48;

/// Length of the Finished message's verify_data.
pub(crate) const VERIFY_DATA_LEN: usize = 12;

/// A decrypter for the server's records and an encrypter for ours.
pub(crate) type MessageCipherPair = (Box<dyn MessageDecrypter>, Box<dyn MessageEncrypter>);

/// TLS1.0 per-connection keying material
pub(crate) struct ConnectionSecrets {
    pub(crate) randoms: ConnectionRandoms,
    suite: &'static SupportedCipherSuite,
    master_secret: [u8; MASTER_SECRET_LEN],
}

impl ConnectionSecrets {
    /// Derive the master secret.  The pre-master secret is consumed,
    /// and zeroed when it drops at the end of this call.
    pub(crate) fn from_pre_master_secret(
        pre_master_secret: Zeroizing<Vec<u8>>,
        randoms: ConnectionRandoms,
        suite: &'static SupportedCipherSuite,
    ) -> Self {
        let mut ret = Self {
            randoms,
            suite,
            master_secret: [0u8; MASTER_SECRET_LEN],
        };

        let seed = join_randoms(&ret.randoms.client, &ret.randoms.server);
        prf::prf(
            &mut ret.master_secret,
            &pre_master_secret,
            b"master secret",
            &seed,
        );
        ret
    }

    /// Make a `MessageCipherPair` for the client side of the connection.
    pub(crate) fn make_cipher_pair(&self) -> Result<MessageCipherPair, Error> {
        let bulk = self.suite.bulk;
        let key_block = self.make_key_block();

        // client MAC, server MAC, client key, server key, client IV, server IV
        let (client_mac, rest) = key_block.split_at(MAC_LEN);
        let (server_mac, rest) = rest.split_at(MAC_LEN);
        let (client_key, rest) = rest.split_at(bulk.key_len());
        let (server_key, rest) = rest.split_at(bulk.key_len());
        let (client_iv, server_iv) = rest.split_at(bulk.block_len());

        Ok((
            cipher::new_cbc_decrypter(bulk, server_mac, server_key, server_iv)?,
            cipher::new_cbc_encrypter(bulk, client_mac, client_key, client_iv)?,
        ))
    }

    fn make_key_block(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(vec![0u8; self.suite.key_block_len()]);

        // NOTE: opposite order to the master secret's seed.
        let randoms = join_randoms(&self.randoms.server, &self.randoms.client);
        prf::prf(&mut out, &self.master_secret, b"key expansion", &randoms);

        out
    }

    pub(crate) fn master_secret(&self) -> &[u8] {
        &self.master_secret
    }

    fn make_verify_data(
        &self,
        handshake_hash: &[u8; HANDSHAKE_HASH_LEN],
        label: &[u8],
    ) -> [u8; VERIFY_DATA_LEN] {
        let mut out = [0u8; VERIFY_DATA_LEN];
        prf::prf(&mut out, &self.master_secret, label, handshake_hash);
        out
    }

    pub(crate) fn client_verify_data(
        &self,
        handshake_hash: &[u8; HANDSHAKE_HASH_LEN],
    ) -> [u8; VERIFY_DATA_LEN] {
        self.make_verify_data(handshake_hash, b"client finished")
    }

    pub(crate) fn server_verify_data(
        &self,
        handshake_hash: &[u8; HANDSHAKE_HASH_LEN],
    ) -> [u8; VERIFY_DATA_LEN] {
        self.make_verify_data(handshake_hash, b"server finished")
    }
}

impl Drop for ConnectionSecrets {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

fn join_randoms(first: &[u8; 32], second: &[u8; 32]) -> [u8; 64] {
    let mut randoms = [0u8; 64];
    randoms[..32].copy_from_slice(first);
    randoms[32..].copy_from_slice(second);
    randoms
}
