//! Decoder for the rollup's packed batch call-data.
//!
//! A batch is a run of signed transactions, each laid out as
//! `tail || opcode || ship || role || signature`. The run is read from the
//! end of the buffer, so the last transaction in the buffer has index 0.
//! Leading zero bytes of the first transaction may be missing from the
//! buffer; they are restored as padding, both in the decoded fields and in
//! the signed payload.

use azimuth_common::{
    Address, Bytes, H256,
    types::{PointNumber, ProxyRole},
};

use super::cursor::ReverseCursor;

pub const SIGNATURE_LENGTH: usize = 65;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[repr(u8)]
pub enum L2Opcode {
    TransferPoint = 0,
    Spawn = 1,
    ConfigureKeys = 2,
    Escape = 3,
    CancelEscape = 4,
    Adopt = 5,
    Reject = 6,
    Detach = 7,
    SetManagementProxy = 8,
    SetSpawnProxy = 9,
    SetTransferProxy = 10,
}

impl TryFrom<u8> for L2Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let opcode = match value {
            0 => L2Opcode::TransferPoint,
            1 => L2Opcode::Spawn,
            2 => L2Opcode::ConfigureKeys,
            3 => L2Opcode::Escape,
            4 => L2Opcode::CancelEscape,
            5 => L2Opcode::Adopt,
            6 => L2Opcode::Reject,
            7 => L2Opcode::Detach,
            8 => L2Opcode::SetManagementProxy,
            9 => L2Opcode::SetSpawnProxy,
            10 => L2Opcode::SetTransferProxy,
            other => return Err(other),
        };
        Ok(opcode)
    }
}

/// Operation-specific arguments of a rollup transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum L2Action {
    TransferPoint {
        to: Address,
        reset: bool,
    },
    Spawn {
        point: PointNumber,
        to: Address,
    },
    ConfigureKeys {
        encryption_key: H256,
        auth_key: H256,
        crypto_suite_version: u32,
        breach: bool,
    },
    Escape {
        sponsor: PointNumber,
    },
    CancelEscape {
        sponsor: PointNumber,
    },
    Adopt {
        point: PointNumber,
    },
    Reject {
        point: PointNumber,
    },
    Detach {
        point: PointNumber,
    },
    SetManagementProxy {
        address: Address,
    },
    SetSpawnProxy {
        address: Address,
    },
    SetTransferProxy {
        address: Address,
    },
    /// Opcode with no known layout; carries no arguments.
    Unknown {
        opcode: u8,
    },
}

impl L2Action {
    /// Another point this action reads or writes, besides the signer.
    pub fn target_point(&self) -> Option<PointNumber> {
        match self {
            L2Action::Spawn { point, .. }
            | L2Action::Adopt { point }
            | L2Action::Reject { point }
            | L2Action::Detach { point } => Some(*point),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        match self {
            L2Action::TransferPoint { .. } => L2Opcode::TransferPoint.to_string(),
            L2Action::Spawn { .. } => L2Opcode::Spawn.to_string(),
            L2Action::ConfigureKeys { .. } => L2Opcode::ConfigureKeys.to_string(),
            L2Action::Escape { .. } => L2Opcode::Escape.to_string(),
            L2Action::CancelEscape { .. } => L2Opcode::CancelEscape.to_string(),
            L2Action::Adopt { .. } => L2Opcode::Adopt.to_string(),
            L2Action::Reject { .. } => L2Opcode::Reject.to_string(),
            L2Action::Detach { .. } => L2Opcode::Detach.to_string(),
            L2Action::SetManagementProxy { .. } => L2Opcode::SetManagementProxy.to_string(),
            L2Action::SetSpawnProxy { .. } => L2Opcode::SetSpawnProxy.to_string(),
            L2Action::SetTransferProxy { .. } => L2Opcode::SetTransferProxy.to_string(),
            L2Action::Unknown { opcode } => format!("Unknown({opcode})"),
        }
    }
}

/// One signed transaction decoded from a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2Transaction {
    /// Position within the batch, counted from the end of the buffer.
    pub intra_batch_index: u64,
    pub signature: [u8; SIGNATURE_LENGTH],
    /// The signed bytes: everything except the signature, zero-padded.
    pub raw: Bytes,
    pub source: PointNumber,
    /// Role byte as found on the wire; see [`L2Transaction::role`].
    pub role_byte: u8,
    pub action: L2Action,
}

impl L2Transaction {
    /// The proxy role the signer claims, or `None` for an undefined role byte.
    pub fn role(&self) -> Option<ProxyRole> {
        ProxyRole::try_from(self.role_byte).ok()
    }

    /// Every point number this transaction may touch.
    pub fn referenced_points(&self) -> impl Iterator<Item = PointNumber> + '_ {
        std::iter::once(self.source).chain(self.action.target_point())
    }
}

/// Splits batch call-data into its transactions.
///
/// Decoding never fails: truncated fields read as zero-padded values and
/// unknown opcodes decode with no arguments.
pub fn decode_batch(data: &[u8]) -> Vec<L2Transaction> {
    let mut cursor = ReverseCursor::new(data);
    let mut transactions = Vec::new();
    let mut intra_batch_index = 0;

    while cursor.has_remaining() {
        let signature = cursor.take::<SIGNATURE_LENGTH>();
        let signed_end = cursor.position();

        let role_byte = cursor.take_u8();
        let source = cursor.take_u32();
        let opcode_byte = cursor.take_u8();
        // High bit clear means the flag is set
        let flag = opcode_byte >> 7 == 0;
        let action = match L2Opcode::try_from(opcode_byte & 0x7F) {
            Ok(L2Opcode::TransferPoint) => L2Action::TransferPoint {
                to: cursor.take_address(),
                reset: flag,
            },
            Ok(L2Opcode::Spawn) => {
                let point = cursor.take_u32();
                let to = cursor.take_address();
                L2Action::Spawn { point, to }
            }
            Ok(L2Opcode::ConfigureKeys) => {
                let encryption_key = cursor.take_h256();
                let auth_key = cursor.take_h256();
                let crypto_suite_version = cursor.take_u32();
                L2Action::ConfigureKeys {
                    encryption_key,
                    auth_key,
                    crypto_suite_version,
                    breach: flag,
                }
            }
            Ok(L2Opcode::Escape) => L2Action::Escape {
                sponsor: cursor.take_u32(),
            },
            Ok(L2Opcode::CancelEscape) => L2Action::CancelEscape {
                sponsor: cursor.take_u32(),
            },
            Ok(L2Opcode::Adopt) => L2Action::Adopt {
                point: cursor.take_u32(),
            },
            Ok(L2Opcode::Reject) => L2Action::Reject {
                point: cursor.take_u32(),
            },
            Ok(L2Opcode::Detach) => L2Action::Detach {
                point: cursor.take_u32(),
            },
            Ok(L2Opcode::SetManagementProxy) => L2Action::SetManagementProxy {
                address: cursor.take_address(),
            },
            Ok(L2Opcode::SetSpawnProxy) => L2Action::SetSpawnProxy {
                address: cursor.take_address(),
            },
            Ok(L2Opcode::SetTransferProxy) => L2Action::SetTransferProxy {
                address: cursor.take_address(),
            },
            Err(opcode) => L2Action::Unknown { opcode },
        };

        transactions.push(L2Transaction {
            intra_batch_index,
            signature,
            raw: Bytes::from(cursor.consumed_since(signed_end)),
            source,
            role_byte,
            action,
        });
        intra_batch_index += 1;
    }
    transactions
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn decodes_proxy_and_transfer() {
        let data = hex!(
            "671738dada5c209c12b6501e80c62e091c27b14a8022d601a20473fdca35f685fa61153a73bef738eb"
            "fbf4cf95cca253dd39343ad3ae287e156228693b06f7a66defb761109e1d3c3bc5be348c28b22ae272"
            "d83709ea8a9acf031c671738dada5c209c12b6501e80c62e091c27b14a0a22d601a2000ef750117707"
            "57f561b40f3ba2dea676af739795101800457a19b68698bbdfde653437558121965eef535c95f96780"
            "1c4e3a7928cb9d06a6fa66b4e97ca43e9500"
        );
        let target = Address::from(hex!("671738dada5c209c12b6501e80c62e091c27b14a"));

        let transactions = decode_batch(&data);
        assert_eq!(transactions.len(), 2);

        let first = &transactions[0];
        assert_eq!(first.intra_batch_index, 0);
        assert_eq!(
            first.signature,
            hex!(
                "0ef75011770757f561b40f3ba2dea676af739795101800457a19b68698bbdfde65343755812196"
                "5eef535c95f967801c4e3a7928cb9d06a6fa66b4e97ca43e9500"
            )
        );
        assert_eq!(
            first.raw.as_ref(),
            hex!("671738dada5c209c12b6501e80c62e091c27b14a0a22d601a200")
        );
        assert_eq!(first.source, 584450466);
        assert_eq!(first.role(), Some(ProxyRole::Owner));
        assert_eq!(first.action, L2Action::SetTransferProxy { address: target });

        let second = &transactions[1];
        assert_eq!(second.intra_batch_index, 1);
        assert_eq!(
            second.raw.as_ref(),
            hex!("671738dada5c209c12b6501e80c62e091c27b14a8022d601a204")
        );
        assert_eq!(second.role(), Some(ProxyRole::Transfer));
        assert_eq!(
            second.action,
            L2Action::TransferPoint {
                to: target,
                reset: false
            }
        );
    }

    #[test]
    fn restores_missing_leading_zeros_of_configure_keys() {
        let data = hex!(
            "01f9900aa356eb818275c9bc58c355d075570094503a01a510270c78f30724fd7ef387f5c96dad3a56"
            "5e78dcfda556e4d36a8257e187d7106ea5ecabd2f6b5fd82820342050000566725a9b02227bfc58d82"
            "218061a28d17d750b32e1828b7dc0d32675431a27e4d50b943315d9dcaf335e0a1c4418be025df9347"
            "86f937e7e973d22e07d4e60601"
        );
        let transactions = decode_batch(&data);
        assert_eq!(transactions.len(), 1);
        let tx = &transactions[0];
        assert_eq!(
            tx.raw.as_ref(),
            hex!(
                "00000001f9900aa356eb818275c9bc58c355d075570094503a01a510270c78f30724fd7ef387f5c96dad3a565e78dcfda556e4d36a8257e187d7106ea5ecabd2f6b5fd82820342050000"
            )
        );
        assert_eq!(tx.source, 54658304);
        assert_eq!(tx.role(), Some(ProxyRole::Owner));
        assert_eq!(
            tx.action,
            L2Action::ConfigureKeys {
                encryption_key: H256(hex!(
                    "f387f5c96dad3a565e78dcfda556e4d36a8257e187d7106ea5ecabd2f6b5fd82"
                )),
                auth_key: H256(hex!(
                    "f9900aa356eb818275c9bc58c355d075570094503a01a510270c78f30724fd7e"
                )),
                crypto_suite_version: 1,
                breach: false,
            }
        );
    }

    #[test]
    fn restores_truncated_escape_target() {
        let data = hex!(
            "3eb303beccfeac00594a127b1ea1a880de4c446971932d15b1b021ad13be5e09f98ebb71f45f06967f17bacca27d84b448ec5809c15ca48ff73d47a541e94be994ef774fe9b56ba01b00003eb30321cdfeac00845adadfb162528b3df3d407b8177060b5284f9d9257cee641b143e4cfd30af74ca01325ef50be6349d4ae69698992fcf74ef544e63ae1461d7ce1913000a3ef1c"
        );
        let transactions = decode_batch(&data);
        assert_eq!(transactions.len(), 2);

        assert_eq!(transactions[0].raw.as_ref(), hex!("00003eb30321cdfeac00"));
        assert_eq!(transactions[0].source, 567148204);
        assert_eq!(transactions[0].action, L2Action::Escape { sponsor: 16051 });

        assert_eq!(transactions[1].raw.as_ref(), hex!("00003eb303beccfeac00"));
        assert_eq!(transactions[1].source, 3201105580);
        assert_eq!(transactions[1].action, L2Action::Escape { sponsor: 16051 });
        assert_eq!(
            transactions[1].signature,
            hex!(
                "594a127b1ea1a880de4c446971932d15b1b021ad13be5e09f98ebb71f45f06967f17bacca27d84b448"
                "ec5809c15ca48ff73d47a541e94be994ef774fe9b56ba01b"
            )
        );
    }

    #[test]
    fn decodes_single_escape() {
        let data = hex!(
            "661803651AC018009399A8A143B21FCA343109128370BD9575B17F97BE491985D4932F309B4088BA5B"
            "9E2666ED5FF6322B0594AD31F6BD966B7D5A0B55738C43FA2E80517858F27C00"
        );
        let transactions = decode_batch(&data);
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].raw.as_ref(), hex!("0000661803651ac01800"));
        assert_eq!(transactions[0].source, 1696251928);
        assert_eq!(transactions[0].action, L2Action::Escape { sponsor: 26136 });
    }

    #[test]
    fn crypto_suite_version_is_read_in_full() {
        let data = hex!(
            "000000010A56E0A92352BF6723E518122DCE95A0EAAFBA3B3028B8806D5E7AD6AC56FF1E6A753FC18CC1BA858A4F344A164098247B607482812D6D5F75A8987EF62F9F3D82651AC018004962588F587083D2044965626440CB2281FE6DD413CF4F9EA90587BB98444DE5473DFF657EB3B0D6E03B67FA6367C483543AD7C2C8B678FF96A05E071B2F680200"
        );
        let transactions = decode_batch(&data);
        assert_eq!(transactions.len(), 1);
        let L2Action::ConfigureKeys {
            crypto_suite_version,
            auth_key,
            breach,
            ..
        } = transactions[0].action
        else {
            panic!("expected configure-keys, got {:?}", transactions[0].action);
        };
        assert_eq!(crypto_suite_version, 1);
        assert_eq!(
            auth_key,
            H256(hex!(
                "0a56e0a92352bf6723e518122dce95a0eaafba3b3028b8806d5e7ad6ac56ff1e"
            ))
        );
        assert!(!breach);
    }

    #[test]
    fn unknown_opcode_and_role_still_decode() {
        let mut data = vec![0x7F, 0x00, 0x00, 0x01, 0x00, 0x09];
        data.extend_from_slice(&[0x55; SIGNATURE_LENGTH]);
        let transactions = decode_batch(&data);
        assert_eq!(transactions.len(), 1);
        let tx = &transactions[0];
        assert_eq!(tx.action, L2Action::Unknown { opcode: 0x7F });
        assert_eq!(tx.source, 0x0100);
        assert_eq!(tx.role(), None);
        assert_eq!(tx.raw.as_ref(), &[0x7F, 0x00, 0x00, 0x01, 0x00, 0x09]);
    }

    #[test]
    fn spawn_reads_target_before_address() {
        let raw = hex!("bad132bf9c1269ee4fbc3affc537d3de3adb169b0001fbea010000fbea00");
        let mut data = raw.to_vec();
        data.extend_from_slice(&[0u8; SIGNATURE_LENGTH]);
        let transactions = decode_batch(&data);
        assert_eq!(
            transactions[0].action,
            L2Action::Spawn {
                point: 130026,
                to: Address::from(hex!("bad132bf9c1269ee4fbc3affc537d3de3adb169b")),
            }
        );
        assert_eq!(transactions[0].source, 64490);
        assert_eq!(
            transactions[0].referenced_points().collect::<Vec<_>>(),
            vec![64490, 130026]
        );
    }
}
