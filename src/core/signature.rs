// ECDSA signing and verification over secp256k1

use crate::core::Hash256;
use crate::error::Result;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};

/// Sign a 32-byte digest, returning the DER-encoded signature
pub fn sign(secret_key: &SecretKey, digest: &Hash256) -> Vec<u8> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(*digest.as_bytes());
    secp.sign_ecdsa(&message, secret_key).serialize_der().to_vec()
}

/// Verify a DER signature against a serialized public key.
///
/// Malformed key or signature bytes are a `Crypto` error; a well-formed
/// signature that does not match yields `Ok(false)`.
pub fn verify(pubkey: &[u8], digest: &Hash256, signature: &[u8]) -> Result<bool> {
    let secp = Secp256k1::verification_only();

    let pubkey = PublicKey::from_slice(pubkey)?;
    let signature = Signature::from_der(signature)?;
    let message = Message::from_digest(*digest.as_bytes());

    Ok(secp.verify_ecdsa(&message, &signature, &pubkey).is_ok())
}

/// Parse raw secret key bytes
pub fn secret_key_from_bytes(bytes: &[u8]) -> Result<SecretKey> {
    Ok(SecretKey::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sha256;
    use crate::error::LedgerError;
    use secp256k1::rand::rngs::OsRng;

    fn keypair() -> (SecretKey, Vec<u8>) {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::new(&mut OsRng);
        let pubkey = secret_key.public_key(&secp).serialize().to_vec();
        (secret_key, pubkey)
    }

    #[test]
    fn test_sign_and_verify() {
        let (secret_key, pubkey) = keypair();
        let digest = sha256(b"payload");

        let signature = sign(&secret_key, &digest);
        assert!(verify(&pubkey, &digest, &signature).unwrap());
    }

    #[test]
    fn test_verify_wrong_key() {
        let (secret_key, _) = keypair();
        let (_, other_pubkey) = keypair();
        let digest = sha256(b"payload");

        let signature = sign(&secret_key, &digest);
        assert!(!verify(&other_pubkey, &digest, &signature).unwrap());
    }

    #[test]
    fn test_verify_wrong_message() {
        let (secret_key, pubkey) = keypair();
        let signature = sign(&secret_key, &sha256(b"payload"));
        assert!(!verify(&pubkey, &sha256(b"tampered"), &signature).unwrap());
    }

    #[test]
    fn test_malformed_material_is_crypto_error() {
        let (secret_key, pubkey) = keypair();
        let digest = sha256(b"payload");
        let signature = sign(&secret_key, &digest);

        let result = verify(&[0x05; 33], &digest, &signature);
        assert!(matches!(result, Err(LedgerError::Crypto(_))));

        let result = verify(&pubkey, &digest, &[0x30, 0x01]);
        assert!(matches!(result, Err(LedgerError::Crypto(_))));

        assert!(matches!(secret_key_from_bytes(&[0u8; 32]), Err(LedgerError::Crypto(_))));
    }
}
