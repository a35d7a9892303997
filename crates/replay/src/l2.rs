//! Effects of signed rollup transactions on the point table.
//!
//! A transaction that passes signature checks always consumes its proxy's
//! nonce, even if its preconditions then fail. Failed preconditions are
//! reported as a [`SkipReason`]; they never abort the replay.

use azimuth_common::{
    Address, H256,
    types::{Diff, DiffOperation, Dominion, Point, PointNumber, ProxyRole, Rank, parent_of},
};

use crate::{
    codec::{L2Action, L2Transaction},
    signature::verify_signature,
    state::PointSet,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum L2Outcome {
    Applied(Vec<Diff>),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("signing point {0} does not exist")]
    UnknownSource(PointNumber),
    #[error("role byte {0} is not a proxy role")]
    InvalidRole(u8),
    #[error("signature does not match the {0} proxy")]
    BadSignature(ProxyRole),
    #[error("point is in dominion {}", .0.as_str())]
    WrongDominion(Dominion),
    #[error("{0} proxy may not perform this action")]
    UnauthorizedRole(ProxyRole),
    #[error("point {target} is not a child of the signer")]
    NotParent { target: PointNumber },
    #[error("point {0} already exists")]
    TargetExists(PointNumber),
    #[error("point {0} does not exist")]
    TargetMissing(PointNumber),
    #[error("point {0} cannot be sponsored by the signer's rank")]
    RankMismatch(PointNumber),
    #[error("point {0} has no pending escape to the signer")]
    NoEscapeToSigner(PointNumber),
    #[error("point {0} is not sponsored by the signer")]
    NotSponsor(PointNumber),
    #[error("planets have no spawn proxy")]
    PlanetSpawnProxy,
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
}

/// Verifies `tx` against the current state of its signer and applies it.
///
/// Transactions from unknown points, with an undefined role or with a bad
/// signature are skipped without touching any nonce.
pub fn process_transaction(tx: &L2Transaction, event_id: u64, points: &mut PointSet) -> L2Outcome {
    let Some(signer) = points.get(tx.source) else {
        return L2Outcome::Skipped(SkipReason::UnknownSource(tx.source));
    };
    let Some(role) = tx.role() else {
        return L2Outcome::Skipped(SkipReason::InvalidRole(tx.role_byte));
    };
    if !verify_signature(tx, signer) {
        return L2Outcome::Skipped(SkipReason::BadSignature(role));
    }
    apply_verified_transaction(tx, role, event_id, points)
}

/// Applies a transaction whose signature has been checked for `role`.
pub fn apply_verified_transaction(
    tx: &L2Transaction,
    role: ProxyRole,
    event_id: u64,
    points: &mut PointSet,
) -> L2Outcome {
    let Some(signer) = points.get_mut(tx.source) else {
        return L2Outcome::Skipped(SkipReason::UnknownSource(tx.source));
    };
    let slot = signer.proxy_mut(role);
    slot.nonce = slot.nonce.saturating_add(1);

    let ctx = Context {
        event_id,
        intra_batch_index: tx.intra_batch_index,
        source: tx.source,
        role,
    };
    let result = match &tx.action {
        L2Action::TransferPoint { to, reset } => transfer_point(&ctx, points, *to, *reset),
        L2Action::Spawn { point, to } => spawn(&ctx, points, *point, *to),
        L2Action::ConfigureKeys {
            encryption_key,
            auth_key,
            crypto_suite_version,
            breach,
        } => configure_keys(
            &ctx,
            points,
            *encryption_key,
            *auth_key,
            *crypto_suite_version,
            *breach,
        ),
        L2Action::Escape { sponsor } => escape(&ctx, points, *sponsor),
        L2Action::CancelEscape { .. } => cancel_escape(&ctx, points),
        L2Action::Adopt { point } => settle_escape(&ctx, points, *point, true),
        L2Action::Reject { point } => settle_escape(&ctx, points, *point, false),
        L2Action::Detach { point } => detach(&ctx, points, *point),
        L2Action::SetManagementProxy { address } => {
            set_proxy(&ctx, points, ProxyRole::Management, *address)
        }
        L2Action::SetSpawnProxy { address } => set_proxy(&ctx, points, ProxyRole::Spawn, *address),
        L2Action::SetTransferProxy { address } => {
            set_proxy(&ctx, points, ProxyRole::Transfer, *address)
        }
        L2Action::Unknown { opcode } => Err(SkipReason::UnknownOpcode(*opcode)),
    };
    match result {
        Ok(diffs) => L2Outcome::Applied(diffs),
        Err(reason) => L2Outcome::Skipped(reason),
    }
}

/// The signer of the transaction being applied.
struct Context {
    event_id: u64,
    intra_batch_index: u64,
    source: PointNumber,
    role: ProxyRole,
}

impl Context {
    fn diff(&self, point: PointNumber, operation: DiffOperation) -> Diff {
        Diff::new(self.event_id, self.intra_batch_index, point, operation)
    }

    fn require_role(&self, allowed: &[ProxyRole]) -> Result<(), SkipReason> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(SkipReason::UnauthorizedRole(self.role))
        }
    }

    fn signer<'a>(&self, points: &'a mut PointSet) -> Result<&'a mut Point, SkipReason> {
        points
            .get_mut(self.source)
            .ok_or(SkipReason::UnknownSource(self.source))
    }
}

fn require_dominion(point: &Point, allowed: &[Dominion]) -> Result<(), SkipReason> {
    if allowed.contains(&point.dominion) {
        Ok(())
    } else {
        Err(SkipReason::WrongDominion(point.dominion))
    }
}

type Applied = Result<Vec<Diff>, SkipReason>;

fn transfer_point(ctx: &Context, points: &mut PointSet, to: Address, reset: bool) -> Applied {
    let point = ctx.signer(points)?;
    require_dominion(point, &[Dominion::L2])?;
    ctx.require_role(&[ProxyRole::Owner, ProxyRole::Transfer])?;

    point.owner.address = to;
    point.transfer_proxy.address = Address::zero();
    let mut diffs = vec![ctx.diff(ctx.source, DiffOperation::ChangedOwner).with_address(to)];
    if reset {
        if point.life != 0 {
            point.rift = point.rift.saturating_add(1);
            diffs.push(ctx.diff(ctx.source, DiffOperation::Breached).with_u32(point.rift));
        }
        if point.has_keys() {
            point.clear_keys();
            point.life = point.life.saturating_add(1);
            diffs.push(ctx.diff(ctx.source, DiffOperation::ResetKeys));
        }
        point.spawn_proxy.address = Address::zero();
        point.management_proxy.address = Address::zero();
        point.voting_proxy.address = Address::zero();
        point.transfer_proxy.address = Address::zero();
    }
    Ok(diffs)
}

fn spawn(ctx: &Context, points: &mut PointSet, target: PointNumber, to: Address) -> Applied {
    if target == ctx.source || parent_of(target) != ctx.source {
        return Err(SkipReason::NotParent { target });
    }
    let parent = ctx.signer(points)?;
    require_dominion(parent, &[Dominion::L2, Dominion::Spawn])?;
    ctx.require_role(&[ProxyRole::Owner, ProxyRole::Spawn])?;
    let inviter = parent.proxy(ctx.role).address;
    let parent_owner = parent.owner.address;
    if points.contains(target) {
        return Err(SkipReason::TargetExists(target));
    }

    let mut child = Point::new(target);
    child.dominion = Dominion::L2;
    child.has_sponsor = true;
    child.sponsor = ctx.source;
    if inviter == to {
        child.owner.address = to;
    } else {
        child.owner.address = parent_owner;
        child.transfer_proxy.address = to;
    }
    points.insert(child);
    Ok(vec![ctx.diff(target, DiffOperation::Spawned).with_u32(ctx.source)])
}

fn configure_keys(
    ctx: &Context,
    points: &mut PointSet,
    encryption_key: H256,
    auth_key: H256,
    crypto_suite_version: u32,
    breach: bool,
) -> Applied {
    let point = ctx.signer(points)?;
    require_dominion(point, &[Dominion::L2])?;
    ctx.require_role(&[ProxyRole::Owner, ProxyRole::Management])?;

    let mut diffs = Vec::new();
    if breach {
        point.rift = point.rift.saturating_add(1);
        diffs.push(ctx.diff(ctx.source, DiffOperation::Breached).with_u32(point.rift));
    }
    let unchanged = point.crypto_suite_version == crypto_suite_version
        && point.auth_key == auth_key
        && point.encryption_key == encryption_key;
    if !unchanged {
        point.life = point.life.saturating_add(1);
        let mut data = Vec::with_capacity(4 + 32 + 32);
        data.extend_from_slice(&crypto_suite_version.to_be_bytes());
        data.extend_from_slice(auth_key.as_bytes());
        data.extend_from_slice(encryption_key.as_bytes());
        diffs.push(ctx.diff(ctx.source, DiffOperation::ResetKeys).with_data(data));
    }
    point.crypto_suite_version = crypto_suite_version;
    point.auth_key = auth_key;
    point.encryption_key = encryption_key;
    Ok(diffs)
}

fn escape(ctx: &Context, points: &mut PointSet, sponsor: PointNumber) -> Applied {
    ctx.require_role(&[ProxyRole::Owner, ProxyRole::Management])?;
    let point = ctx.signer(points)?;
    if Rank::of(sponsor).depth() + 1 != point.rank().depth() {
        return Err(SkipReason::RankMismatch(ctx.source));
    }
    point.escape_requested = true;
    point.escape_target = sponsor;
    Ok(vec![ctx.diff(ctx.source, DiffOperation::EscapeRequested).with_u32(sponsor)])
}

fn cancel_escape(ctx: &Context, points: &mut PointSet) -> Applied {
    ctx.require_role(&[ProxyRole::Owner, ProxyRole::Management])?;
    let point = ctx.signer(points)?;
    let previous = point.escape_target;
    point.clear_escape();
    Ok(vec![ctx.diff(ctx.source, DiffOperation::EscapeCanceled).with_u32(previous)])
}

/// Adopts or rejects the pending escape of `target` towards the signer.
fn settle_escape(
    ctx: &Context,
    points: &mut PointSet,
    target: PointNumber,
    adopt: bool,
) -> Applied {
    ctx.require_role(&[ProxyRole::Owner, ProxyRole::Management])?;
    let escapee = points
        .get_mut(target)
        .ok_or(SkipReason::TargetMissing(target))?;
    if !escapee.escape_requested || escapee.escape_target != ctx.source {
        return Err(SkipReason::NoEscapeToSigner(target));
    }
    escapee.clear_escape();
    let operation = if adopt {
        escapee.has_sponsor = true;
        escapee.sponsor = ctx.source;
        DiffOperation::EscapeAccepted
    } else {
        DiffOperation::EscapeRejected
    };
    Ok(vec![ctx.diff(target, operation).with_u32(ctx.source)])
}

fn detach(ctx: &Context, points: &mut PointSet, target: PointNumber) -> Applied {
    ctx.require_role(&[ProxyRole::Owner, ProxyRole::Management])?;
    let sponsored = points
        .get_mut(target)
        .ok_or(SkipReason::TargetMissing(target))?;
    if !sponsored.has_sponsor || sponsored.sponsor != ctx.source {
        return Err(SkipReason::NotSponsor(target));
    }
    sponsored.clear_sponsor();
    Ok(vec![ctx.diff(target, DiffOperation::LostSponsor).with_u32(ctx.source)])
}

fn set_proxy(
    ctx: &Context,
    points: &mut PointSet,
    proxy: ProxyRole,
    address: Address,
) -> Applied {
    let point = ctx.signer(points)?;
    let (dominions, operation): (&[Dominion], _) = match proxy {
        ProxyRole::Spawn => (
            &[Dominion::L2, Dominion::Spawn][..],
            DiffOperation::ChangedSpawnProxy,
        ),
        ProxyRole::Management => (&[Dominion::L2][..], DiffOperation::ChangedManagementProxy),
        _ => (&[Dominion::L2][..], DiffOperation::ChangedTransferProxy),
    };
    require_dominion(point, dominions)?;
    ctx.require_role(&[ProxyRole::Owner, proxy])?;
    if proxy == ProxyRole::Spawn && point.rank() == Rank::Planet {
        return Err(SkipReason::PlanetSpawnProxy);
    }
    point.proxy_mut(proxy).address = address;
    Ok(vec![ctx.diff(ctx.source, operation).with_address(address)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use azimuth_common::Bytes;

    const OWNER: Address = Address::repeat_byte(0x0A);
    const MANAGER: Address = Address::repeat_byte(0x0B);
    const SPAWNER: Address = Address::repeat_byte(0x0C);
    const BUYER: Address = Address::repeat_byte(0x0D);

    fn l2_point(number: PointNumber) -> Point {
        let mut point = Point::new(number);
        point.dominion = Dominion::L2;
        point.owner.address = OWNER;
        point.management_proxy.address = MANAGER;
        point
    }

    fn tx(source: PointNumber, role: ProxyRole, action: L2Action) -> L2Transaction {
        L2Transaction {
            intra_batch_index: 2,
            signature: [0u8; 65],
            raw: Bytes::new(),
            source,
            role_byte: role as u8,
            action,
        }
    }

    fn set_of(points: impl IntoIterator<Item = Point>) -> PointSet {
        let mut set = PointSet::new();
        for point in points {
            set.preload(point.number, Some(point));
        }
        set
    }

    fn apply(points: &mut PointSet, tx: &L2Transaction) -> L2Outcome {
        let role = tx.role().expect("valid role");
        apply_verified_transaction(tx, role, 9, points)
    }

    fn point(points: &PointSet, number: PointNumber) -> Point {
        points.get(number).cloned().expect("point exists")
    }

    #[test]
    fn nonce_is_consumed_by_rejected_transactions() {
        let mut points = set_of([l2_point(0x0100)]);
        // Voting proxy may not set a management proxy
        let outcome = apply(
            &mut points,
            &tx(
                0x0100,
                ProxyRole::Voting,
                L2Action::SetManagementProxy { address: BUYER },
            ),
        );
        assert_eq!(
            outcome,
            L2Outcome::Skipped(SkipReason::UnauthorizedRole(ProxyRole::Voting))
        );
        let after = point(&points, 0x0100);
        assert_eq!(after.voting_proxy.nonce, 1);
        assert_eq!(after.owner.nonce, 0);
        assert_eq!(after.management_proxy.address, MANAGER);

        let unknown = apply(
            &mut points,
            &tx(0x0100, ProxyRole::Owner, L2Action::Unknown { opcode: 0x55 }),
        );
        assert_eq!(unknown, L2Outcome::Skipped(SkipReason::UnknownOpcode(0x55)));
        assert_eq!(point(&points, 0x0100).owner.nonce, 1);
    }

    #[test]
    fn bad_signature_leaves_nonce_alone() {
        let mut points = set_of([l2_point(0x0100)]);
        let outcome = process_transaction(
            &tx(
                0x0100,
                ProxyRole::Owner,
                L2Action::SetManagementProxy { address: BUYER },
            ),
            1,
            &mut points,
        );
        assert_eq!(
            outcome,
            L2Outcome::Skipped(SkipReason::BadSignature(ProxyRole::Owner))
        );
        assert_eq!(point(&points, 0x0100).owner.nonce, 0);

        let missing = process_transaction(
            &tx(0x0200, ProxyRole::Owner, L2Action::Unknown { opcode: 0 }),
            1,
            &mut points,
        );
        assert_eq!(missing, L2Outcome::Skipped(SkipReason::UnknownSource(0x0200)));
    }

    #[test]
    fn transfer_with_reset_clears_keys_and_proxies() {
        let mut star = l2_point(0x0100);
        star.life = 2;
        star.rift = 1;
        star.auth_key = H256::repeat_byte(0x01);
        star.spawn_proxy.address = SPAWNER;
        star.transfer_proxy.address = BUYER;
        let mut points = set_of([star]);

        let outcome = apply(
            &mut points,
            &tx(
                0x0100,
                ProxyRole::Transfer,
                L2Action::TransferPoint {
                    to: BUYER,
                    reset: true,
                },
            ),
        );
        let L2Outcome::Applied(diffs) = outcome else {
            panic!("transfer rejected");
        };
        let operations: Vec<_> = diffs.iter().map(|diff| diff.operation).collect();
        assert_eq!(
            operations,
            vec![
                DiffOperation::ChangedOwner,
                DiffOperation::Breached,
                DiffOperation::ResetKeys
            ]
        );
        assert!(diffs.iter().all(|diff| diff.intra_batch_index == 2));
        assert_eq!(diffs[1].data_as_u32().ok(), Some(2));
        assert!(diffs[2].data.is_empty());

        let after = point(&points, 0x0100);
        assert_eq!(after.owner.address, BUYER);
        assert_eq!(after.rift, 2);
        assert_eq!(after.life, 3);
        assert!(!after.has_keys());
        assert_eq!(after.spawn_proxy.address, Address::zero());
        assert_eq!(after.management_proxy.address, Address::zero());
        assert_eq!(after.transfer_proxy.address, Address::zero());
        assert_eq!(after.transfer_proxy.nonce, 1);
    }

    #[test]
    fn transfer_with_reset_before_any_keys_skips_breach() {
        let reset_to_buyer = tx(
            0x0100,
            ProxyRole::Owner,
            L2Action::TransferPoint {
                to: BUYER,
                reset: true,
            },
        );

        let mut fresh = l2_point(0x0100);
        fresh.spawn_proxy.address = SPAWNER;
        let mut points = set_of([fresh]);
        let L2Outcome::Applied(diffs) = apply(&mut points, &reset_to_buyer) else {
            panic!("transfer rejected");
        };
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].operation, DiffOperation::ChangedOwner);
        let after = point(&points, 0x0100);
        assert_eq!(after.rift, 0);
        assert_eq!(after.life, 0);
        assert_eq!(after.owner.address, BUYER);
        assert_eq!(after.spawn_proxy.address, Address::zero());
        assert_eq!(after.management_proxy.address, Address::zero());

        // Keys present without a key revision: reset, but no breach
        let mut keyed = l2_point(0x0200);
        keyed.crypto_suite_version = 1;
        keyed.encryption_key = H256::repeat_byte(0x02);
        let mut points = set_of([keyed]);
        let reset_keyed = L2Transaction {
            source: 0x0200,
            ..reset_to_buyer
        };
        let L2Outcome::Applied(diffs) = apply(&mut points, &reset_keyed) else {
            panic!("transfer rejected");
        };
        let operations: Vec<_> = diffs.iter().map(|diff| diff.operation).collect();
        assert_eq!(
            operations,
            vec![DiffOperation::ChangedOwner, DiffOperation::ResetKeys]
        );
        let after = point(&points, 0x0200);
        assert_eq!(after.rift, 0);
        assert_eq!(after.life, 1);
        assert!(!after.has_keys());
    }

    #[test]
    fn transfer_requires_l2() {
        let mut point_on_l1 = l2_point(0x0100);
        point_on_l1.dominion = Dominion::L1;
        let mut points = set_of([point_on_l1]);
        let outcome = apply(
            &mut points,
            &tx(
                0x0100,
                ProxyRole::Owner,
                L2Action::TransferPoint {
                    to: BUYER,
                    reset: false,
                },
            ),
        );
        assert_eq!(
            outcome,
            L2Outcome::Skipped(SkipReason::WrongDominion(Dominion::L1))
        );
    }

    #[test]
    fn spawn_to_own_address_sets_owner() {
        let mut star = l2_point(0x0100);
        star.dominion = Dominion::Spawn;
        star.spawn_proxy.address = SPAWNER;
        let mut points = set_of([star]);
        points.preload(0x0001_0100, None);
        points.preload(0x0002_0100, None);

        let outcome = apply(
            &mut points,
            &tx(
                0x0100,
                ProxyRole::Spawn,
                L2Action::Spawn {
                    point: 0x0001_0100,
                    to: SPAWNER,
                },
            ),
        );
        assert!(matches!(outcome, L2Outcome::Applied(ref diffs) if diffs.len() == 1));
        let child = point(&points, 0x0001_0100);
        assert_eq!(child.owner.address, SPAWNER);
        assert_eq!(child.transfer_proxy.address, Address::zero());
        assert_eq!(child.dominion, Dominion::L2);
        assert!(child.has_sponsor);
        assert_eq!(child.sponsor, 0x0100);

        // To someone else: parent's owner keeps it until the buyer claims it
        apply(
            &mut points,
            &tx(
                0x0100,
                ProxyRole::Spawn,
                L2Action::Spawn {
                    point: 0x0002_0100,
                    to: BUYER,
                },
            ),
        );
        let child = point(&points, 0x0002_0100);
        assert_eq!(child.owner.address, OWNER);
        assert_eq!(child.transfer_proxy.address, BUYER);

        let again = apply(
            &mut points,
            &tx(
                0x0100,
                ProxyRole::Owner,
                L2Action::Spawn {
                    point: 0x0002_0100,
                    to: BUYER,
                },
            ),
        );
        assert_eq!(again, L2Outcome::Skipped(SkipReason::TargetExists(0x0002_0100)));
    }

    #[test]
    fn spawn_requires_parentage() {
        let mut points = set_of([l2_point(0x0100)]);
        let outcome = apply(
            &mut points,
            &tx(
                0x0100,
                ProxyRole::Owner,
                L2Action::Spawn {
                    point: 0x0001_0200,
                    to: BUYER,
                },
            ),
        );
        assert_eq!(
            outcome,
            L2Outcome::Skipped(SkipReason::NotParent { target: 0x0001_0200 })
        );
    }

    #[test]
    fn configure_keys_bumps_life_only_on_change() {
        let mut points = set_of([l2_point(0x0100)]);
        let action = L2Action::ConfigureKeys {
            encryption_key: H256::repeat_byte(0xE0),
            auth_key: H256::repeat_byte(0xA0),
            crypto_suite_version: 1,
            breach: true,
        };
        let configure = tx(0x0100, ProxyRole::Management, action);
        let L2Outcome::Applied(diffs) = apply(&mut points, &configure) else {
            panic!("configure-keys rejected");
        };
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].operation, DiffOperation::Breached);
        assert_eq!(
            diffs[1].data_as_keys().ok(),
            Some((1, H256::repeat_byte(0xA0), H256::repeat_byte(0xE0)))
        );
        let after = point(&points, 0x0100);
        assert_eq!((after.rift, after.life), (1, 1));

        let L2Outcome::Applied(diffs) = apply(
            &mut points,
            &tx(
                0x0100,
                ProxyRole::Owner,
                L2Action::ConfigureKeys {
                    encryption_key: H256::repeat_byte(0xE0),
                    auth_key: H256::repeat_byte(0xA0),
                    crypto_suite_version: 1,
                    breach: false,
                },
            ),
        ) else {
            panic!("configure-keys rejected");
        };
        assert!(diffs.is_empty());
        assert_eq!(point(&points, 0x0100).life, 1);
    }

    #[test]
    fn escape_adopt_and_detach() {
        let planet = l2_point(0x0001_0100);
        let new_sponsor = l2_point(0x0200);
        let mut points = set_of([planet, new_sponsor]);

        // Planets escape to stars, not galaxies
        let wrong_rank = apply(
            &mut points,
            &tx(0x0001_0100, ProxyRole::Owner, L2Action::Escape { sponsor: 0x02 }),
        );
        assert_eq!(
            wrong_rank,
            L2Outcome::Skipped(SkipReason::RankMismatch(0x0001_0100))
        );

        apply(
            &mut points,
            &tx(
                0x0001_0100,
                ProxyRole::Owner,
                L2Action::Escape { sponsor: 0x0200 },
            ),
        );
        assert_eq!(point(&points, 0x0001_0100).escape_target, 0x0200);

        let outcome = apply(
            &mut points,
            &tx(
                0x0200,
                ProxyRole::Management,
                L2Action::Adopt {
                    point: 0x0001_0100,
                },
            ),
        );
        let L2Outcome::Applied(diffs) = outcome else {
            panic!("adopt rejected");
        };
        assert_eq!(diffs[0].point, 0x0001_0100);
        assert_eq!(diffs[0].operation, DiffOperation::EscapeAccepted);
        let adopted = point(&points, 0x0001_0100);
        assert!(!adopted.escape_requested);
        assert!(adopted.has_sponsor);
        assert_eq!(adopted.sponsor, 0x0200);

        // Adopting twice finds no pending escape
        let twice = apply(
            &mut points,
            &tx(0x0200, ProxyRole::Owner, L2Action::Adopt { point: 0x0001_0100 }),
        );
        assert_eq!(
            twice,
            L2Outcome::Skipped(SkipReason::NoEscapeToSigner(0x0001_0100))
        );

        let detached = apply(
            &mut points,
            &tx(0x0200, ProxyRole::Owner, L2Action::Detach { point: 0x0001_0100 }),
        );
        assert!(matches!(detached, L2Outcome::Applied(_)));
        assert!(!point(&points, 0x0001_0100).has_sponsor);
        assert_eq!(point(&points, 0x0200).owner.nonce, 2);
    }

    #[test]
    fn reject_and_cancel_clear_the_escape() {
        let mut planet = l2_point(0x0001_0100);
        planet.escape_requested = true;
        planet.escape_target = 0x0200;
        let mut points = set_of([planet, l2_point(0x0200)]);

        let rejected = apply(
            &mut points,
            &tx(0x0200, ProxyRole::Owner, L2Action::Reject { point: 0x0001_0100 }),
        );
        let L2Outcome::Applied(diffs) = rejected else {
            panic!("reject refused");
        };
        assert_eq!(diffs[0].operation, DiffOperation::EscapeRejected);
        let after = point(&points, 0x0001_0100);
        assert!(!after.escape_requested);
        assert!(!after.has_sponsor);

        let missing = apply(
            &mut points,
            &tx(0x0200, ProxyRole::Owner, L2Action::Reject { point: 0x0003_0200 }),
        );
        assert_eq!(missing, L2Outcome::Skipped(SkipReason::TargetMissing(0x0003_0200)));

        let canceled = apply(
            &mut points,
            &tx(
                0x0001_0100,
                ProxyRole::Owner,
                L2Action::CancelEscape { sponsor: 0x0200 },
            ),
        );
        assert!(matches!(canceled, L2Outcome::Applied(_)));
    }

    #[test]
    fn spawn_proxy_rules() {
        let mut star = l2_point(0x0100);
        star.dominion = Dominion::Spawn;
        let planet = l2_point(0x0001_0100);
        let mut points = set_of([star, planet]);

        let on_star = apply(
            &mut points,
            &tx(
                0x0100,
                ProxyRole::Owner,
                L2Action::SetSpawnProxy { address: SPAWNER },
            ),
        );
        assert!(matches!(on_star, L2Outcome::Applied(_)));
        assert_eq!(point(&points, 0x0100).spawn_proxy.address, SPAWNER);

        // Management proxies are L2-only
        let management = apply(
            &mut points,
            &tx(
                0x0100,
                ProxyRole::Owner,
                L2Action::SetManagementProxy { address: BUYER },
            ),
        );
        assert_eq!(
            management,
            L2Outcome::Skipped(SkipReason::WrongDominion(Dominion::Spawn))
        );

        let on_planet = apply(
            &mut points,
            &tx(
                0x0001_0100,
                ProxyRole::Owner,
                L2Action::SetSpawnProxy { address: SPAWNER },
            ),
        );
        assert_eq!(on_planet, L2Outcome::Skipped(SkipReason::PlanetSpawnProxy));
    }
}
