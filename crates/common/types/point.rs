use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

use crate::serde_utils;

/// 32-bit identity number of a registry entry.
pub type PointNumber = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Rank {
    Galaxy,
    Star,
    Planet,
}

impl Rank {
    pub fn of(point: PointNumber) -> Self {
        if point <= 0xFF {
            Rank::Galaxy
        } else if point <= 0xFFFF {
            Rank::Star
        } else {
            Rank::Planet
        }
    }

    /// Distance from the top of the hierarchy; galaxies are 0.
    pub fn depth(self) -> u8 {
        self as u8
    }
}

/// The point that issued `point`. Galaxies are their own parent.
pub fn parent_of(point: PointNumber) -> PointNumber {
    match Rank::of(point) {
        Rank::Galaxy => point,
        Rank::Star => point & 0xFF,
        Rank::Planet => point & 0xFFFF,
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PointFieldError {
    #[error("Invalid proxy role {0}")]
    InvalidProxyRole(u8),
    #[error("Invalid dominion {0}")]
    InvalidDominion(u8),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum ProxyRole {
    Owner = 0,
    Spawn = 1,
    Management = 2,
    Voting = 3,
    Transfer = 4,
}

impl TryFrom<u8> for ProxyRole {
    type Error = PointFieldError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ProxyRole::Owner),
            1 => Ok(ProxyRole::Spawn),
            2 => Ok(ProxyRole::Management),
            3 => Ok(ProxyRole::Voting),
            4 => Ok(ProxyRole::Transfer),
            other => Err(PointFieldError::InvalidProxyRole(other)),
        }
    }
}

/// Which ledger currently has authority over a point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Dominion {
    #[default]
    L1 = 1,
    L2 = 2,
    Spawn = 3,
}

impl Dominion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dominion::L1 => "l1",
            Dominion::L2 => "l2",
            Dominion::Spawn => "spawn",
        }
    }
}

impl TryFrom<u8> for Dominion {
    type Error = PointFieldError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Dominion::L1),
            2 => Ok(Dominion::L2),
            3 => Ok(Dominion::Spawn),
            other => Err(PointFieldError::InvalidDominion(other)),
        }
    }
}

/// A delegated address and its replay-protection nonce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySlot {
    pub address: Address,
    pub nonce: u32,
}

/// Current state of one registry entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub number: PointNumber,
    pub owner: ProxySlot,
    pub spawn_proxy: ProxySlot,
    pub management_proxy: ProxySlot,
    pub voting_proxy: ProxySlot,
    pub transfer_proxy: ProxySlot,
    pub dominion: Dominion,
    pub active: bool,
    /// Continuity-breach counter.
    pub rift: u32,
    /// Key-generation counter.
    pub life: u32,
    #[serde(with = "serde_utils::h256_plain")]
    pub encryption_key: H256,
    #[serde(with = "serde_utils::h256_plain")]
    pub auth_key: H256,
    pub crypto_suite_version: u32,
    pub has_sponsor: bool,
    /// Meaningful only when `has_sponsor` is set.
    pub sponsor: PointNumber,
    pub escape_requested: bool,
    /// Meaningful only when `escape_requested` is set.
    pub escape_target: PointNumber,
}

impl Point {
    pub fn new(number: PointNumber) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }

    pub fn rank(&self) -> Rank {
        Rank::of(self.number)
    }

    pub fn proxy(&self, role: ProxyRole) -> &ProxySlot {
        match role {
            ProxyRole::Owner => &self.owner,
            ProxyRole::Spawn => &self.spawn_proxy,
            ProxyRole::Management => &self.management_proxy,
            ProxyRole::Voting => &self.voting_proxy,
            ProxyRole::Transfer => &self.transfer_proxy,
        }
    }

    pub fn proxy_mut(&mut self, role: ProxyRole) -> &mut ProxySlot {
        match role {
            ProxyRole::Owner => &mut self.owner,
            ProxyRole::Spawn => &mut self.spawn_proxy,
            ProxyRole::Management => &mut self.management_proxy,
            ProxyRole::Voting => &mut self.voting_proxy,
            ProxyRole::Transfer => &mut self.transfer_proxy,
        }
    }

    /// True if any of suite, auth key or encryption key is set.
    pub fn has_keys(&self) -> bool {
        self.crypto_suite_version != 0 || !self.auth_key.is_zero() || !self.encryption_key.is_zero()
    }

    pub fn clear_keys(&mut self) {
        self.crypto_suite_version = 0;
        self.auth_key = H256::zero();
        self.encryption_key = H256::zero();
    }

    pub fn clear_escape(&mut self) {
        self.escape_requested = false;
        self.escape_target = 0;
    }

    pub fn clear_sponsor(&mut self) {
        self.has_sponsor = false;
        self.sponsor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_boundaries() {
        assert_eq!(Rank::of(0), Rank::Galaxy);
        assert_eq!(Rank::of(0xFF), Rank::Galaxy);
        assert_eq!(Rank::of(0x100), Rank::Star);
        assert_eq!(Rank::of(0xFFFF), Rank::Star);
        assert_eq!(Rank::of(0x10000), Rank::Planet);
        assert_eq!(Rank::of(u32::MAX), Rank::Planet);
        assert_eq!(Rank::Planet.depth(), 2);
    }

    #[test]
    fn parent_follows_rank() {
        assert_eq!(parent_of(0x12), 0x12);
        assert_eq!(parent_of(0xFBEA), 0xEA);
        assert_eq!(parent_of(130026), 64490);
        assert_eq!(parent_of(584450466), 584450466 & 0xFFFF);
    }

    #[test]
    fn proxy_slots_are_addressed_by_role() {
        let mut point = Point::new(7);
        point.proxy_mut(ProxyRole::Voting).nonce = 3;
        point.proxy_mut(ProxyRole::Transfer).address = Address::repeat_byte(0xAA);
        assert_eq!(point.voting_proxy.nonce, 3);
        assert_eq!(point.transfer_proxy.address, Address::repeat_byte(0xAA));
        assert_eq!(point.proxy(ProxyRole::Owner), &ProxySlot::default());
    }

    #[test]
    fn role_and_dominion_decoding() {
        assert_eq!(ProxyRole::try_from(4), Ok(ProxyRole::Transfer));
        assert_eq!(
            ProxyRole::try_from(5),
            Err(PointFieldError::InvalidProxyRole(5))
        );
        assert_eq!(Dominion::try_from(3), Ok(Dominion::Spawn));
        assert!(Dominion::try_from(0).is_err());
        assert_eq!(Dominion::default().as_str(), "l1");
    }

    #[test]
    fn keys_presence() {
        let mut point = Point::new(1);
        assert!(!point.has_keys());
        point.crypto_suite_version = 1;
        assert!(point.has_keys());
        point.clear_keys();
        assert!(!point.has_keys());
    }
}
