//! # Rows
//!
//! Shapes of the four tables the site uses, as the backend stores them.
//!
//! - `profiles`: one per account, linked by `user_id`
//! - `site_config`: singleton, at most one row
//! - `ranks`, `keys`: shop catalog, sorted by `display_order`
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::backend::Record;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    SiteConfig,
    Ranks,
    Keys,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::SiteConfig => "site_config",
            Table::Ranks => "ranks",
            Table::Keys => "keys",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub server_name: String,
    pub server_ip: String,
    pub server_port: u16,
    pub discord_url: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            id: None,
            server_name: "ConfessionMc".to_string(),
            server_ip: "play.confessionmc.fun".to_string(),
            server_port: 25594,
            discord_url: "https://discord.gg/nphym8nWXU".to_string(),
            logo_url: None,
        }
    }
}

impl SiteConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.server_ip, self.server_port)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rank {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub features: Vec<String>,
    pub color: String,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub how_to_get: Option<String>,
    pub display_order: i32,
}

/// A rank before the backend has assigned it an id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub features: Vec<String>,
    pub color: String,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub how_to_get: Option<String>,
    pub display_order: i32,
}

impl RankDraft {
    pub fn template(display_order: i32) -> Self {
        Self {
            name: "New Rank".to_string(),
            description: Some("Description".to_string()),
            price: Decimal::new(999, 2),
            features: vec!["Feature 1".to_string(), "Feature 2".to_string()],
            color: "#00D9FF".to_string(),
            is_free: false,
            how_to_get: None,
            display_order,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub color: String,
    pub display_order: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub color: String,
    pub display_order: i32,
}

impl KeyDraft {
    pub fn template(display_order: i32) -> Self {
        Self {
            name: "New Key".to_string(),
            description: Some("Description".to_string()),
            price: Decimal::new(499, 2),
            color: "#A855F7".to_string(),
            display_order,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_premium_minecraft: bool,
}

/// An account as the auth service knows it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// Result of a password sign-in or sign-up. Sign-up may return no token when
/// the backend requires email confirmation.
#[derive(Clone, Debug)]
pub struct AuthSession {
    pub identity: Identity,
    pub access_token: Option<String>,
    /// Traded for a new access token once the current one runs out.
    pub refresh_token: Option<String>,
    /// Seconds the access token stays valid.
    pub expires_in: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    #[serde(default)]
    pub online: u32,
    #[serde(default)]
    pub max: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motd {
    #[serde(default)]
    pub clean: Vec<String>,
}

/// Live state of the game server. Never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub players: Players,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motd: Option<Motd>,
}

impl ServerStatus {
    pub fn offline() -> Self {
        Self::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Row-change notification, in the shape of the backend's database webhook.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub table: Table,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
}

/// Initial content for a fresh project: the site config row plus the catalog.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub site_config: Option<SiteConfig>,
    #[serde(default)]
    pub ranks: Vec<RankDraft>,
    #[serde(default)]
    pub keys: Vec<KeyDraft>,
}

impl Record for SiteConfig {
    const TABLE: Table = Table::SiteConfig;
    const ORDER: Option<&'static str> = None;

    fn id(&self) -> Option<Uuid> {
        self.id
    }
}

impl Record for Rank {
    const TABLE: Table = Table::Ranks;
    const ORDER: Option<&'static str> = Some("display_order");

    fn id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

impl Record for Key {
    const TABLE: Table = Table::Keys;
    const ORDER: Option<&'static str> = Some("display_order");

    fn id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}
