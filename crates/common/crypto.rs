use ethereum_types::{Address, H256};
use keccak_hash::keccak;

pub const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid recovery id")]
    InvalidRecoveryId,
    #[error("recovery failed")]
    RecoveryFailed,
}

pub fn keccak_hash(data: impl AsRef<[u8]>) -> H256 {
    keccak(data.as_ref())
}

/// Hashes `message` under the personal-message convention (EIP-191 version 0x45):
/// the prefix, the message length as ASCII decimal digits, then the message.
pub fn personal_message_hash(message: &[u8]) -> H256 {
    let length = message.len().to_string();
    let mut signed = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + length.len() + message.len());
    signed.extend_from_slice(PERSONAL_MESSAGE_PREFIX);
    signed.extend_from_slice(length.as_bytes());
    signed.extend_from_slice(message);
    keccak_hash(signed)
}

/// Recovers the address that produced `sig` over `msg`.
///
/// The last byte is the recovery id; wallets commonly add 27 to it, which is
/// undone here before recovery.
pub fn recover_address(sig: &[u8; 65], msg: &H256) -> Result<Address, CryptoError> {
    let mut recid_byte = sig[64];
    if recid_byte >= 27 {
        recid_byte -= 27;
    }
    let recovery_id = secp256k1::ecdsa::RecoveryId::try_from(i32::from(recid_byte))
        .map_err(|_| CryptoError::InvalidRecoveryId)?;

    let recoverable_sig =
        secp256k1::ecdsa::RecoverableSignature::from_compact(&sig[..64], recovery_id)
            .map_err(|_| CryptoError::InvalidSignature)?;

    let message = secp256k1::Message::from_digest(msg.to_fixed_bytes());

    let public_key = secp256k1::SECP256K1
        .recover_ecdsa(&message, &recoverable_sig)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_public_key(&public_key))
}

pub fn address_from_public_key(public_key: &secp256k1::PublicKey) -> Address {
    let hash = keccak_hash(&public_key.serialize_uncompressed()[1..]);
    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use secp256k1::{Message, PublicKey, SECP256K1, SecretKey};

    fn sign(secret: &SecretKey, hash: &H256) -> [u8; 65] {
        let message = Message::from_digest(hash.to_fixed_bytes());
        let (recid, compact) = SECP256K1
            .sign_ecdsa_recoverable(&message, secret)
            .serialize_compact();
        let mut sig = [0u8; 65];
        sig[..64].copy_from_slice(&compact);
        sig[64] = i32::from(recid) as u8;
        sig
    }

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            keccak_hash(b""),
            H256(hex!(
                "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
            ))
        );
    }

    #[test]
    fn personal_message_hash_prefixes_decimal_length() {
        let message = b"hello";
        let mut expected = b"\x19Ethereum Signed Message:\n5".to_vec();
        expected.extend_from_slice(message);
        assert_eq!(personal_message_hash(message), keccak_hash(expected));
    }

    #[test]
    fn recovers_signer_with_and_without_offset() {
        let secret = SecretKey::from_slice(&[0x42; 32]).unwrap();
        let expected = address_from_public_key(&PublicKey::from_secret_key_global(&secret));
        let hash = keccak_hash(b"payload");

        let mut sig = sign(&secret, &hash);
        assert_eq!(recover_address(&sig, &hash).unwrap(), expected);

        sig[64] += 27;
        assert_eq!(recover_address(&sig, &hash).unwrap(), expected);
    }

    #[test]
    fn rejects_out_of_range_recovery_id() {
        let mut sig = [1u8; 65];
        sig[64] = 9;
        assert!(matches!(
            recover_address(&sig, &H256::zero()),
            Err(CryptoError::InvalidRecoveryId)
        ));
    }
}
