//! AES-256-CBC with PKCS#7 padding.

use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::keys::KeyMaterial;
use crate::errors::DecodeError;

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

/// Decrypt and strip padding.
pub fn decrypt(material: &KeyMaterial, ciphertext: &[u8]) -> Result<Vec<u8>, DecodeError> {
    Aes256CbcDec::new(&material.key().into(), &material.iv().into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DecodeError::Cipher)
}

/// Pad and encrypt.
pub fn encrypt(material: &KeyMaterial, plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(&material.key().into(), &material.iv().into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn ciphertext_is_block_aligned() {
        let material = KeyMaterial::derive("123", "alice");
        assert_eq!(encrypt(&material, b"").len(), 16);
        assert_eq!(encrypt(&material, &[7u8; 16]).len(), 32);
    }

    #[test]
    fn wrong_key_fails_or_garbles() {
        let right = KeyMaterial::derive("123", "alice");
        let wrong = KeyMaterial::derive("123", "mallory");
        let ciphertext = encrypt(&right, b"{'mti':'abc'}|{'host':'n1'}");
        match decrypt(&wrong, &ciphertext) {
            Err(e) => assert_matches!(e, DecodeError::Cipher),
            Ok(plain) => assert_ne!(plain, b"{'mti':'abc'}|{'host':'n1'}"),
        }
    }

    #[test]
    fn truncated_ciphertext_is_cipher_error() {
        let material = KeyMaterial::derive("123", "alice");
        let ciphertext = encrypt(&material, b"hello world");
        assert_matches!(decrypt(&material, &ciphertext[..10]), Err(DecodeError::Cipher));
        assert_matches!(decrypt(&material, &[]), Err(DecodeError::Cipher));
    }

    proptest! {
        #[test]
        fn round_trip(job in "[0-9]{1,8}", user in "[a-z]{1,12}", data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let material = KeyMaterial::derive(&job, &user);
            let ciphertext = encrypt(&material, &data);
            prop_assert_eq!(decrypt(&material, &ciphertext).unwrap(), data);
        }
    }
}
