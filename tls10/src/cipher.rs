use aes::{Aes128, Aes256};
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use des::TdesEde3;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::enums::ContentType;
use crate::error::Error;
use crate::msgs::base::Payload;
use crate::msgs::codec;
use crate::msgs::fragmenter::MAX_FRAGMENT_LEN;
use crate::msgs::message::{BorrowedPlainMessage, OpaqueMessage, PlainMessage};
use crate::suites::{BulkAlgorithm, MAC_LEN};

/// Objects with this trait can decrypt TLS messages.
///
/// TLS 1.0 CBC chains each record's IV from the previous record's
/// last ciphertext block, so decryption mutates the decrypter.
pub(crate) trait MessageDecrypter: Send + Sync {
    fn decrypt(&mut self, m: OpaqueMessage, seq: u64) -> Result<PlainMessage, Error>;
}

/// Objects with this trait can encrypt TLS messages.
pub(crate) trait MessageEncrypter: Send + Sync {
    fn encrypt(&mut self, m: BorrowedPlainMessage, seq: u64) -> Result<OpaqueMessage, Error>;
}

impl dyn MessageEncrypter {
    pub(crate) fn invalid() -> Box<dyn MessageEncrypter> {
        Box::new(InvalidMessageEncrypter {})
    }
}

impl dyn MessageDecrypter {
    pub(crate) fn invalid() -> Box<dyn MessageDecrypter> {
        Box::new(InvalidMessageDecrypter {})
    }
}

/// Make a record encrypter for `bulk` from one direction's slice of the key block.
pub(crate) fn new_cbc_encrypter(
    bulk: BulkAlgorithm,
    mac_key: &[u8],
    enc_key: &[u8],
    iv: &[u8],
) -> Result<Box<dyn MessageEncrypter>, Error> {
    Ok(Box::new(CbcMessageEncrypter {
        state: CbcState::new(bulk, mac_key, enc_key, iv)?,
    }))
}

/// Make a record decrypter for `bulk` from one direction's slice of the key block.
pub(crate) fn new_cbc_decrypter(
    bulk: BulkAlgorithm,
    mac_key: &[u8],
    enc_key: &[u8],
    iv: &[u8],
) -> Result<Box<dyn MessageDecrypter>, Error> {
    Ok(Box::new(CbcMessageDecrypter {
        state: CbcState::new(bulk, mac_key, enc_key, iv)?,
    }))
}

/// A block cipher, run in CBC mode over whole blocks.
trait CbcBlockCipher: Send + Sync {
    fn block_len(&self) -> usize;

    /// Encrypt `data` in place, leaving the last ciphertext block in `iv`.
    fn encrypt(&self, iv: &mut [u8], data: &mut [u8]);

    /// Decrypt `data` in place, leaving the last ciphertext block in `iv`.
    fn decrypt(&self, iv: &mut [u8], data: &mut [u8]);
}

struct Cbc<C>(C);

impl<C> CbcBlockCipher for Cbc<C>
where
    C: BlockEncrypt + BlockDecrypt + Send + Sync,
{
    fn block_len(&self) -> usize {
        <C as BlockSizeUser>::block_size()
    }

    fn encrypt(&self, iv: &mut [u8], data: &mut [u8]) {
        for block in data.chunks_exact_mut(iv.len()) {
            block
                .iter_mut()
                .zip(iv.iter())
                .for_each(|(b, v)| *b ^= *v);
            self.0
                .encrypt_block(GenericArray::from_mut_slice(block));
            iv.copy_from_slice(block);
        }
    }

    fn decrypt(&self, iv: &mut [u8], data: &mut [u8]) {
        let mut next_iv = vec![0u8; iv.len()];
        for block in data.chunks_exact_mut(iv.len()) {
            next_iv.copy_from_slice(block);
            self.0
                .decrypt_block(GenericArray::from_mut_slice(block));
            block
                .iter_mut()
                .zip(iv.iter())
                .for_each(|(b, v)| *b ^= *v);
            iv.copy_from_slice(&next_iv);
        }
    }
}

fn new_block_cipher(bulk: BulkAlgorithm, key: &[u8]) -> Result<Box<dyn CbcBlockCipher>, Error> {
    let bad_key = |_| Error::General(format!("wrong key length for {:?}", bulk));
    let cipher: Box<dyn CbcBlockCipher> = match bulk {
        BulkAlgorithm::Aes128Cbc => Box::new(Cbc(Aes128::new_from_slice(key).map_err(bad_key)?)),
        BulkAlgorithm::Aes256Cbc => Box::new(Cbc(Aes256::new_from_slice(key).map_err(bad_key)?)),
        BulkAlgorithm::TripleDesEdeCbc => {
            Box::new(Cbc(TdesEde3::new_from_slice(key).map_err(bad_key)?))
        }
    };
    Ok(cipher)
}

/// The keys and chained IV for one direction.
struct CbcState {
    mac_key: Zeroizing<Vec<u8>>,
    cipher: Box<dyn CbcBlockCipher>,
    iv: Vec<u8>,
}

impl CbcState {
    fn new(bulk: BulkAlgorithm, mac_key: &[u8], enc_key: &[u8], iv: &[u8]) -> Result<Self, Error> {
        debug_assert_eq!(mac_key.len(), MAC_LEN);
        debug_assert_eq!(iv.len(), bulk.block_len());
        Ok(Self {
            mac_key: Zeroizing::new(mac_key.to_vec()),
            cipher: new_block_cipher(bulk, enc_key)?,
            iv: iv.to_vec(),
        })
    }

    /// HMAC-SHA1(seq || type || version || length || fragment)
    fn record_mac(&self, seq: u64, typ: ContentType, version: [u8; 2], fragment: &[u8]) -> Vec<u8> {
        let mut header = [0u8; 13];
        codec::put_u64(seq, &mut header[..8]);
        header[8] = u8::from(typ);
        header[9..11].copy_from_slice(&version);
        codec::put_u16(fragment.len() as u16, &mut header[11..]);

        let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(&self.mac_key)
            .expect("HMAC can take keys of any size");
        mac.update(&header);
        mac.update(fragment);
        mac.finalize().into_bytes().to_vec()
    }
}

struct CbcMessageEncrypter {
    state: CbcState,
}

impl MessageEncrypter for CbcMessageEncrypter {
    fn encrypt(&mut self, msg: BorrowedPlainMessage, seq: u64) -> Result<OpaqueMessage, Error> {
        if msg.payload.len() > MAX_FRAGMENT_LEN {
            return Err(Error::EncryptError);
        }

        let block_len = self.state.cipher.block_len();
        let mac = self
            .state
            .record_mac(seq, msg.typ, msg.version.to_array(), msg.payload);

        // At least one byte of padding: the padding length itself.
        let unpadded = msg.payload.len() + mac.len();
        let pad_len = block_len - (unpadded % block_len);

        let mut buf = Vec::with_capacity(unpadded + pad_len);
        buf.extend_from_slice(msg.payload);
        buf.extend_from_slice(&mac);
        buf.resize(unpadded + pad_len, (pad_len - 1) as u8);

        self.state
            .cipher
            .encrypt(&mut self.state.iv, &mut buf);

        Ok(OpaqueMessage {
            typ: msg.typ,
            version: msg.version,
            payload: Payload::new(buf),
        })
    }
}

struct CbcMessageDecrypter {
    state: CbcState,
}

impl MessageDecrypter for CbcMessageDecrypter {
    fn decrypt(&mut self, mut msg: OpaqueMessage, seq: u64) -> Result<PlainMessage, Error> {
        let block_len = self.state.cipher.block_len();
        let buf = &mut msg.payload.0;

        if buf.is_empty() || buf.len() % block_len != 0 || buf.len() < MAC_LEN + 1 {
            return Err(Error::DecryptError);
        }

        self.state
            .cipher
            .decrypt(&mut self.state.iv, buf);

        // Check every padding byte whatever the padding length, and
        // always compute a MAC, so a bad pad costs the same as a bad MAC.
        let pad_value = buf[buf.len() - 1];
        let claimed_pad = usize::from(pad_value) + 1;
        let pad_ok = claimed_pad + MAC_LEN <= buf.len()
            && buf[buf.len() - claimed_pad..]
                .iter()
                .fold(0u8, |acc, b| acc | (b ^ pad_value))
                == 0;
        let pad_len = if pad_ok { claimed_pad } else { 0 };

        let fragment_len = buf.len() - pad_len - MAC_LEN;
        let expected = self.state.record_mac(
            seq,
            msg.typ,
            msg.version.to_array(),
            &buf[..fragment_len],
        );
        let mac_ok: bool = expected
            .ct_eq(&buf[fragment_len..fragment_len + MAC_LEN])
            .into();

        if !(pad_ok && mac_ok) {
            return Err(Error::DecryptError);
        }

        if fragment_len > MAX_FRAGMENT_LEN {
            return Err(Error::PeerSentOversizedRecord);
        }

        buf.truncate(fragment_len);
        Ok(msg.into_plain_message())
    }
}

/// A `MessageEncrypter` which doesn't work.
struct InvalidMessageEncrypter {}

impl MessageEncrypter for InvalidMessageEncrypter {
    fn encrypt(&mut self, _m: BorrowedPlainMessage, _seq: u64) -> Result<OpaqueMessage, Error> {
        Err(Error::EncryptError)
    }
}

/// A `MessageDecrypter` which doesn't work.
struct InvalidMessageDecrypter {}

impl MessageDecrypter for InvalidMessageDecrypter {
    fn decrypt(&mut self, _m: OpaqueMessage, _seq: u64) -> Result<PlainMessage, Error> {
        Err(Error::DecryptError)
    }
}
