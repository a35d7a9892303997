use azimuth_common::{
    H256,
    crypto::{personal_message_hash, recover_address},
    types::Point,
};
use tracing::debug;

use crate::codec::L2Transaction;

/// Domain tag prepended to every signed rollup transaction.
pub const SIGNING_DOMAIN: &[u8] = b"UrbitIDV1Chain";
/// Ethereum mainnet chain id, as ASCII.
pub const SIGNING_CHAIN_ID: &[u8] = b"1";

/// Bytes a signer commits to for `raw` at `nonce`.
///
/// The payload is byte-reversed; it is signed the way the contract reads it.
pub fn signing_preimage(nonce: u32, raw: &[u8]) -> Vec<u8> {
    let mut preimage =
        Vec::with_capacity(SIGNING_DOMAIN.len() + SIGNING_CHAIN_ID.len() + 1 + 4 + raw.len());
    preimage.extend_from_slice(SIGNING_DOMAIN);
    preimage.extend_from_slice(SIGNING_CHAIN_ID);
    preimage.push(b':');
    preimage.extend_from_slice(&nonce.to_le_bytes());
    preimage.extend(raw.iter().rev());
    preimage
}

pub fn signing_hash(nonce: u32, raw: &[u8]) -> H256 {
    personal_message_hash(&signing_preimage(nonce, raw))
}

/// Checks `tx` was signed by the proxy it claims, at that proxy's current nonce.
pub fn verify_signature(tx: &L2Transaction, signer: &Point) -> bool {
    let Some(role) = tx.role() else {
        return false;
    };
    let slot = signer.proxy(role);
    let hash = signing_hash(slot.nonce, &tx.raw);
    match recover_address(&tx.signature, &hash) {
        Ok(address) => address == slot.address,
        Err(err) => {
            debug!(
                point = tx.source,
                index = tx.intra_batch_index,
                "Signature recovery failed: {err}"
            );
            false
        }
    }
}
