use azimuth_common::types::{Point, PointNumber};
use azimuth_storage::Store;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, trace, warn};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum RollerError {
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("Failed to deserialize getPoint result for point {point}: {source}")]
    DeserializeError {
        point: PointNumber,
        source: serde_json::Error,
    },
    #[error("getPoint({point}) failed with code {code}: {message}")]
    RpcError {
        point: PointNumber,
        code: i64,
        message: String,
    },
}

#[derive(Serialize, Debug)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'static str,
    params: Value,
}

#[derive(Deserialize, Debug)]
struct RpcErrorMetadata {
    code: i64,
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RpcResponse {
    Error { error: RpcErrorMetadata },
    Success { result: Value },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollerProxy {
    pub address: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollerOwnership {
    pub owner: RollerProxy,
    pub management_proxy: RollerProxy,
    pub spawn_proxy: RollerProxy,
    pub transfer_proxy: RollerProxy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RollerKeys {
    pub life: String,
    pub suite: String,
    pub auth: String,
    pub crypt: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RollerSponsor {
    pub has: bool,
    #[serde(default)]
    pub who: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RollerNetwork {
    #[serde(default)]
    pub escape: Option<u64>,
    pub keys: RollerKeys,
    pub sponsor: RollerSponsor,
    pub rift: String,
}

/// A point as a roller's `getPoint` reports it. Numbers the roller sends as
/// strings are kept as strings and parsed during comparison.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RollerPoint {
    pub dominion: String,
    pub ownership: RollerOwnership,
    pub network: RollerNetwork,
}

pub struct RollerClient {
    client: reqwest::Client,
    url: Url,
}

impl RollerClient {
    pub fn new(url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub async fn get_point(&self, point: PointNumber) -> Result<RollerPoint, RollerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: "7",
            method: "getPoint",
            params: json!({ "ship": point }),
        };
        trace!(endpoint = %self.url, point, "Sending getPoint request");
        let response = self
            .client
            .post(self.url.as_str())
            .json(&request)
            .send()
            .await?
            .json::<RpcResponse>()
            .await?;
        match response {
            RpcResponse::Success { result } => serde_json::from_value(result)
                .map_err(|source| RollerError::DeserializeError { point, source }),
            RpcResponse::Error { error } => Err(RollerError::RpcError {
                point,
                code: error.code,
                message: error.message,
            }),
        }
    }
}

/// Asks the roller for every stored point and prints the fields that differ.
/// Returns how many points had at least one mismatch.
pub async fn check_points_against_roller(store: &Store, url: Url) -> eyre::Result<usize> {
    let points = store.get_points().await?;
    if points.is_empty() {
        warn!("No points in the store");
        return Ok(0);
    }
    info!("Comparing {} points with the roller at {url}", points.len());

    let client = RollerClient::new(url);
    let mut mismatched = 0;
    for point in &points {
        let remote = client.get_point(point.number).await?;
        let mismatches = diff_point_with_remote(point, &remote);
        if mismatches.is_empty() {
            continue;
        }
        mismatched += 1;
        println!("point {} mismatches:", point.number);
        for mismatch in mismatches {
            println!("  - {mismatch}");
        }
    }
    Ok(mismatched)
}

/// Lists every field on which the stored point and the roller disagree.
pub fn diff_point_with_remote(point: &Point, remote: &RollerPoint) -> Vec<String> {
    let mut diffs = Vec::new();

    let dominion = point.dominion.as_str();
    if !dominion.eq_ignore_ascii_case(&remote.dominion) {
        diffs.push(format!("dominion: db={dominion} api={}", remote.dominion));
    }

    let ownership = &remote.ownership;
    for (label, local, reported) in [
        ("owner", &point.owner, &ownership.owner),
        ("mgmt", &point.management_proxy, &ownership.management_proxy),
        ("spawn", &point.spawn_proxy, &ownership.spawn_proxy),
        ("transfer", &point.transfer_proxy, &ownership.transfer_proxy),
    ] {
        let address = format!("{:#x}", local.address);
        if !address.eq_ignore_ascii_case(&reported.address) {
            diffs.push(format!(
                "{label} address: db={address} api={}",
                reported.address
            ));
        }
        if u64::from(local.nonce) != reported.nonce {
            diffs.push(format!(
                "{label} nonce: db={} api={}",
                local.nonce, reported.nonce
            ));
        }
    }

    let network = &remote.network;
    compare_decimal(&mut diffs, "rift", point.rift, &network.rift);
    compare_key(
        &mut diffs,
        "encryption",
        point.encryption_key.as_bytes(),
        &network.keys.crypt,
    );
    compare_key(&mut diffs, "auth", point.auth_key.as_bytes(), &network.keys.auth);
    compare_decimal(&mut diffs, "life", point.life, &network.keys.life);
    compare_decimal(
        &mut diffs,
        "suite",
        point.crypto_suite_version,
        &network.keys.suite,
    );

    if point.has_sponsor != network.sponsor.has {
        diffs.push(format!(
            "hasSponsor: db={} api={}",
            point.has_sponsor, network.sponsor.has
        ));
    }
    if network.sponsor.has && u64::from(point.sponsor) != network.sponsor.who {
        diffs.push(format!(
            "sponsor: db={} api={}",
            point.sponsor, network.sponsor.who
        ));
    }

    let escape_requested = network.escape.is_some();
    if point.escape_requested != escape_requested {
        diffs.push(format!(
            "isEscapeRequested: db={} api={escape_requested}",
            point.escape_requested
        ));
    }
    match network.escape {
        Some(target) if u64::from(point.escape_target) != target => diffs.push(format!(
            "escapeRequestedTo: db={} api={target}",
            point.escape_target
        )),
        _ => {}
    }

    diffs
}

fn compare_decimal(diffs: &mut Vec<String>, label: &str, local: u32, remote: &str) {
    match remote.parse::<u32>() {
        Ok(value) if value != local => diffs.push(format!("{label}: db={local} api={value}")),
        Ok(_) => {}
        Err(_) => diffs.push(format!("{label}: invalid api value {remote:?}")),
    }
}

/// An empty or all-zero key on both sides counts as no key.
fn compare_key(diffs: &mut Vec<String>, label: &str, local: &[u8], remote: &str) {
    let Ok(remote_key) = hex::decode(remote.trim_start_matches("0x")) else {
        diffs.push(format!("invalid {label} key in api: {remote:?}"));
        return;
    };
    let is_unset = |key: &[u8]| key.iter().all(|byte| *byte == 0);
    if is_unset(local) && is_unset(&remote_key) {
        return;
    }
    if local != remote_key.as_slice() {
        diffs.push(format!(
            "{label} key mismatch: db=0x{} api=0x{}",
            hex::encode(local),
            hex::encode(&remote_key)
        ));
    }
}
