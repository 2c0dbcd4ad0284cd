use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;

/// The TLS 1.0 PRF: `P_MD5(S1, label + seed) XOR P_SHA1(S2, label + seed)`,
/// where `S1` and `S2` are the two halves of `secret`, sharing the middle
/// byte when its length is odd.
pub(crate) fn prf(out: &mut [u8], secret: &[u8], label: &[u8], seed: &[u8]) {
    let half = (secret.len() + 1) / 2;
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    out.fill(0);
    p_hash_xor(out, &hmac_key::<Hmac<Md5>>(s1), label, seed);
    p_hash_xor(out, &hmac_key::<Hmac<Sha1>>(s2), label, seed);
}

fn hmac_key<M: Mac + KeyInit>(secret: &[u8]) -> M {
    <M as Mac>::new_from_slice(secret).expect("HMAC can take keys of any size")
}

fn sign<M: Mac + Clone>(key: &M, data: &[&[u8]]) -> Vec<u8> {
    let mut ctx = key.clone();
    for d in data {
        ctx.update(d);
    }
    ctx.finalize().into_bytes().to_vec()
}

fn p_hash_xor<M: Mac + Clone>(out: &mut [u8], hmac_key: &M, label: &[u8], seed: &[u8]) {
    // A(1)
    let mut current_a = sign(hmac_key, &[label, seed]);

    let chunk_size = current_a.len();
    for chunk in out.chunks_mut(chunk_size) {
        // P_hash[i] = HMAC_hash(secret, A(i) + seed)
        let p_term = sign(hmac_key, &[&current_a, label, seed]);
        for (o, p) in chunk.iter_mut().zip(p_term) {
            *o ^= p;
        }

        // A(i+1) = HMAC_hash(secret, A(i))
        current_a = sign(hmac_key, &[&current_a]);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn check_published_vector() {
        let secret = [0xab; 48];
        let seed = [0xcd; 64];
        let label = b"PRF Testvector";
        let expect: [u8; 104] = [
            0xd3, 0xd4, 0xd1, 0xe3, 0x49, 0xb5, 0xd5, 0x15, 0x04, 0x46, 0x66, 0xd5,
            0x1d, 0xe3, 0x2b, 0xab, 0x25, 0x8c, 0xb5, 0x21, 0xb6, 0xb0, 0x53, 0x46,
            0x3e, 0x35, 0x48, 0x32, 0xfd, 0x97, 0x67, 0x54, 0x44, 0x3b, 0xcf, 0x9a,
            0x29, 0x65, 0x19, 0xbc, 0x28, 0x9a, 0xbc, 0xbc, 0x11, 0x87, 0xe4, 0xeb,
            0xd3, 0x1e, 0x60, 0x23, 0x53, 0x77, 0x6c, 0x40, 0x8a, 0xaf, 0xb7, 0x4c,
            0xbc, 0x85, 0xef, 0xf6, 0x92, 0x55, 0xf9, 0x78, 0x8f, 0xaa, 0x18, 0x4c,
            0xbb, 0x95, 0x7a, 0x98, 0x19, 0xd8, 0x4a, 0x5d, 0x7e, 0xb0, 0x06, 0xeb,
            0x45, 0x9d, 0x3a, 0xe8, 0xde, 0x98, 0x10, 0x45, 0x4b, 0x8b, 0x2d, 0x8f,
            0x1a, 0xfb, 0xc6, 0x55, 0xa8, 0xc9, 0xa0, 0x13,
        ];
        let mut output = [0u8; 104];

        super::prf(&mut output, &secret, label, &seed);
        assert_eq!(expect.to_vec(), output.to_vec());
    }

    #[test]
    fn odd_length_secret_shares_middle_byte() {
        let mut output = [0u8; 20];
        super::prf(&mut output, &[1, 2, 3], b"odd", &[0xff]);
        assert_eq!(
            output,
            [
                0x23, 0x99, 0xac, 0xd7, 0x4f, 0x3e, 0x73, 0xd2, 0x74, 0xe6, 0x1e, 0x91, 0x0d,
                0xbd, 0x41, 0x0a, 0x86, 0x3e, 0x3e, 0xb2
            ]
        );
    }

    #[test]
    fn output_is_prefix_stable() {
        let mut short = [0u8; 12];
        let mut long = [0u8; 48];
        super::prf(&mut short, b"secret", b"label", b"seed");
        super::prf(&mut long, b"secret", b"label", b"seed");
        assert_eq!(short, long[..12]);
    }
}
