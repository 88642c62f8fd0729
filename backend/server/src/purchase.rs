//! # Purchase
//!
//! Nothing is sold in-process. Buying opens a dialog that sends the visitor to
//! Discord, where staff finish the sale by hand.
use remote::models::{Key, Rank, SiteConfig};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PurchaseStep {
    pub marker: &'static str,
    pub title: &'static str,
    pub detail: &'static str,
}

pub const STEPS: [PurchaseStep; 3] = [
    PurchaseStep {
        marker: "1",
        title: "Join our Discord",
        detail: "Click the button below to join our server",
    },
    PurchaseStep {
        marker: "2",
        title: "Create a Ticket",
        detail: "Open a support ticket in the Discord server",
    },
    PurchaseStep {
        marker: "OR",
        title: "Mention @axobhaiya",
        detail: "Tag axobhaiya in Discord to buy your rank directly",
    },
];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PurchaseDialog {
    pub item_id: Uuid,
    pub item_name: String,
    pub price: Decimal,
    pub discord_url: String,
    pub steps: &'static [PurchaseStep],
}

impl PurchaseDialog {
    fn new(item_id: Uuid, item_name: &str, price: Decimal, config: &SiteConfig) -> Self {
        Self {
            item_id,
            item_name: item_name.to_string(),
            price,
            discord_url: config.discord_url.clone(),
            steps: &STEPS,
        }
    }
}

/// Dialog for whichever rank or key has `id`. Free ranks are earned, not
/// bought, so they never open one.
pub fn open(id: Uuid, ranks: &[Rank], keys: &[Key], config: &SiteConfig) -> Option<PurchaseDialog> {
    if let Some(rank) = ranks.iter().find(|rank| rank.id == id) {
        return (!rank.is_free).then(|| PurchaseDialog::new(rank.id, &rank.name, rank.price, config));
    }

    keys.iter()
        .find(|key| key.id == id)
        .map(|key| PurchaseDialog::new(key.id, &key.name, key.price, config))
}
