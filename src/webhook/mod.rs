//! GitHub webhook transport
//!
//! Provides:
//! - `X-Hub-Signature-256` verification
//! - `pull_request` payload decoding into a [`PullRequestSnapshot`]
//! - the axum server dispatching deliveries to the [`crate::handler`]

pub mod server;

pub use server::{router, WebhookServer};

use crate::error::{BotError, Result};
use crate::snapshot::{PrAction, PullRequestSnapshot, RepositoryRef};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_HEADER: &str = "X-GitHub-Event";
pub const DELIVERY_HEADER: &str = "X-GitHub-Delivery";
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Compute the `sha256=<hex>` signature GitHub sends for `body`
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BotError::Webhook(format!("Invalid HMAC key: {}", e)))?;
    mac.update(body);
    let hex: String = mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    Ok(format!("sha256={}", hex))
}

/// Check a delivery against the shared secret
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> Result<()> {
    let header = header.ok_or_else(|| BotError::Webhook("Missing signature".to_string()))?;
    let hex = header
        .strip_prefix("sha256=")
        .ok_or_else(|| BotError::Webhook("Unsupported signature scheme".to_string()))?;
    let expected = decode_hex(hex)
        .ok_or_else(|| BotError::Webhook("Malformed signature".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BotError::Webhook(format!("Invalid HMAC key: {}", e)))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| BotError::Webhook("Signature mismatch".to_string()))
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Subset of the `pull_request` event payload the bot reads
#[derive(Debug, Deserialize)]
pub struct PullRequestPayload {
    pub action: PrAction,
    pub number: u64,
    pub pull_request: PullRequestBody,
    pub repository: RepositoryBody,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestBody {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub user: Account,
    pub head: GitRef,
    pub base: GitRef,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub mergeable: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryBody {
    pub name: String,
    pub owner: Account,
}

#[derive(Debug, Deserialize)]
pub struct Account {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct GitRef {
    pub sha: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct Label {
    pub name: String,
}

impl PullRequestPayload {
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| BotError::Webhook(format!("Malformed pull_request payload: {}", e)))
    }

    /// Snapshot with the fields the payload carries; platform reads fill the rest
    pub fn into_snapshot(self) -> PullRequestSnapshot {
        let pr = self.pull_request;
        let repository = RepositoryRef::new(self.repository.owner.login, self.repository.name);

        let mut snapshot = PullRequestSnapshot::new(repository, self.number, pr.head.sha)
            .with_action(self.action)
            .with_author(pr.user.login)
            .with_title(pr.title)
            .with_body(pr.body.unwrap_or_default())
            .with_labels(pr.labels.into_iter().map(|l| l.name))
            .with_mergeable(pr.mergeable);
        snapshot.base_ref = pr.base.git_ref;
        snapshot
    }
}
