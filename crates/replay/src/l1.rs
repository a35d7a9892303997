//! Effects of registry logs on the point table.
//!
//! Every log upserts: a log naming a point the table has not seen yet starts
//! from a bare record. Points whose dominion is L2 are owned by the rollup, so
//! registry updates to their ownership, proxies, escapes and keys are ignored.

use azimuth_common::{
    Address, H256,
    types::{Diff, DiffOperation, Dominion, Point, Rank, RawEvent, topic_as_address, topic_as_u32},
};

use crate::{
    errors::ReplayError,
    events::{L1EventKind, required_topic},
};

/// Length of the `ChangedKeys` payload: four 32-byte words.
pub const CHANGED_KEYS_DATA_LEN: usize = 32 * 4;

/// Outcome of one registry log: the record to write back and its audit entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct L1Effect {
    pub point: Option<Point>,
    pub diff: Option<Diff>,
}

impl L1Effect {
    fn none() -> Self {
        Self::default()
    }

    fn updated(point: Point, diff: Diff) -> Self {
        Self {
            point: Some(point),
            diff: Some(diff),
        }
    }
}

/// Resolves one classified registry log against the current record of its
/// subject point.
pub fn resolve_l1_event(
    event: &RawEvent,
    kind: L1EventKind,
    current: Option<&Point>,
    deposit_address: Address,
) -> Result<L1Effect, ReplayError> {
    let Some(number) = kind.subject(event)? else {
        return Ok(L1Effect::none());
    };
    let Some(operation) = diff_operation(kind) else {
        return Ok(L1Effect::none());
    };
    let mut point = current.cloned().unwrap_or_else(|| Point::new(number));
    let diff = Diff::new(event.id, 0, number, operation);
    let on_l2 = point.dominion == Dominion::L2;

    match kind {
        L1EventKind::ChangedDns => Ok(L1Effect::none()),
        L1EventKind::Spawned => {
            let parent = topic_as_u32(required_topic(event, 1)?);
            Ok(L1Effect::updated(point, diff.with_u32(parent)))
        }
        L1EventKind::Activated => {
            point.active = true;
            point.has_sponsor = true;
            match point.rank() {
                Rank::Galaxy => {}
                Rank::Star => point.sponsor = number % 0x100,
                Rank::Planet => point.sponsor = number % 0x10000,
            }
            let diff = match point.rank() {
                Rank::Galaxy => diff,
                _ => diff.with_u32(point.sponsor),
            };
            Ok(L1Effect::updated(point, diff))
        }
        L1EventKind::OwnerChanged => {
            let owner = topic_as_address(required_topic(event, 2)?);
            if owner == deposit_address {
                return Ok(deposit(point, diff, Dominion::L2));
            }
            if on_l2 {
                return Ok(L1Effect::none());
            }
            point.owner.address = owner;
            Ok(L1Effect::updated(point, diff.with_address(owner)))
        }
        L1EventKind::ChangedSpawnProxy => {
            let proxy = topic_as_address(required_topic(event, 2)?);
            if proxy == deposit_address && point.rank() != Rank::Planet {
                return Ok(deposit(point, diff, Dominion::Spawn));
            }
            if on_l2 {
                return Ok(L1Effect::none());
            }
            point.spawn_proxy.address = proxy;
            Ok(L1Effect::updated(point, diff.with_address(proxy)))
        }
        L1EventKind::ChangedTransferProxy
        | L1EventKind::ChangedManagementProxy
        | L1EventKind::ChangedVotingProxy => {
            let proxy = topic_as_address(required_topic(event, 2)?);
            if on_l2 {
                return Ok(L1Effect::none());
            }
            let slot = match kind {
                L1EventKind::ChangedTransferProxy => &mut point.transfer_proxy,
                L1EventKind::ChangedManagementProxy => &mut point.management_proxy,
                _ => &mut point.voting_proxy,
            };
            slot.address = proxy;
            Ok(L1Effect::updated(point, diff.with_address(proxy)))
        }
        L1EventKind::EscapeRequested => {
            let sponsor = topic_as_u32(required_topic(event, 2)?);
            if on_l2 {
                return Ok(L1Effect::none());
            }
            point.escape_requested = true;
            point.escape_target = sponsor;
            Ok(L1Effect::updated(point, diff.with_u32(sponsor)))
        }
        L1EventKind::EscapeCanceled => {
            let sponsor = topic_as_u32(required_topic(event, 2)?);
            if on_l2 {
                return Ok(L1Effect::none());
            }
            point.clear_escape();
            Ok(L1Effect::updated(point, diff.with_u32(sponsor)))
        }
        L1EventKind::EscapeAccepted => {
            let sponsor = topic_as_u32(required_topic(event, 2)?);
            if on_l2 {
                return Ok(L1Effect::none());
            }
            point.clear_escape();
            point.has_sponsor = true;
            point.sponsor = sponsor;
            Ok(L1Effect::updated(point, diff.with_u32(sponsor)))
        }
        L1EventKind::LostSponsor => {
            let former = topic_as_u32(required_topic(event, 2)?);
            point.clear_sponsor();
            Ok(L1Effect::updated(point, diff.with_u32(former)))
        }
        L1EventKind::BrokeContinuity => {
            if on_l2 {
                return Ok(L1Effect::none());
            }
            point.rift = point.rift.saturating_add(1);
            let rift = point.rift;
            Ok(L1Effect::updated(point, diff.with_u32(rift)))
        }
        L1EventKind::ChangedKeys => {
            let data = &event.data;
            if data.len() != CHANGED_KEYS_DATA_LEN {
                return Err(ReplayError::MalformedPayload {
                    event_id: event.id,
                    reason: format!(
                        "ChangedKeys carries {} bytes, expected {CHANGED_KEYS_DATA_LEN}",
                        data.len()
                    ),
                });
            }
            if on_l2 {
                return Ok(L1Effect::none());
            }
            point.encryption_key = H256::from_slice(&data[..32]);
            point.auth_key = H256::from_slice(&data[32..64]);
            point.crypto_suite_version = word_tail_u32(&data[64..96]);
            point.life = word_tail_u32(&data[96..128]);
            Ok(L1Effect::updated(point, diff.with_data(data.clone())))
        }
    }
}

/// Moves an L1 point onto the rollup. Points already off L1 stay where they are.
fn deposit(mut point: Point, diff: Diff, dominion: Dominion) -> L1Effect {
    if point.dominion != Dominion::L1 {
        return L1Effect::none();
    }
    point.dominion = dominion;
    let diff = Diff {
        operation: DiffOperation::NewDominion,
        ..diff
    }
    .with_data(vec![dominion as u8]);
    L1Effect::updated(point, diff)
}

fn diff_operation(kind: L1EventKind) -> Option<DiffOperation> {
    let operation = match kind {
        L1EventKind::Spawned => DiffOperation::Spawned,
        L1EventKind::Activated => DiffOperation::Activated,
        L1EventKind::OwnerChanged => DiffOperation::ChangedOwner,
        L1EventKind::ChangedSpawnProxy => DiffOperation::ChangedSpawnProxy,
        L1EventKind::ChangedTransferProxy => DiffOperation::ChangedTransferProxy,
        L1EventKind::ChangedManagementProxy => DiffOperation::ChangedManagementProxy,
        L1EventKind::ChangedVotingProxy => DiffOperation::ChangedVotingProxy,
        L1EventKind::EscapeRequested => DiffOperation::EscapeRequested,
        L1EventKind::EscapeCanceled => DiffOperation::EscapeCanceled,
        L1EventKind::EscapeAccepted => DiffOperation::EscapeAccepted,
        L1EventKind::LostSponsor => DiffOperation::LostSponsor,
        L1EventKind::BrokeContinuity => DiffOperation::Breached,
        L1EventKind::ChangedKeys => DiffOperation::ResetKeys,
        L1EventKind::ChangedDns => return None,
    };
    Some(operation)
}

/// A `uint32` ABI word keeps its value in the last 4 bytes.
fn word_tail_u32(word: &[u8]) -> u32 {
    let mut tail = [0u8; 4];
    tail.copy_from_slice(&word[word.len() - 4..]);
    u32::from_be_bytes(tail)
}
