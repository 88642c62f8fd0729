//! # Views
//!
//! Server-rendered pages. Templates are compiled into the binary and loaded
//! once at startup; `.html` templates are auto-escaped.
use axum::response::Html;
use chrono::{Datelike, Utc};
use minijinja::{Environment, Value, context};
use remote::models::{Key, Profile, Rank, SiteConfig};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{error::AppResult, purchase::PurchaseDialog, status::StatusView};

const TEMPLATES: [(&str, &str); 4] = [
    ("base.html", include_str!("../templates/base.html")),
    ("landing.html", include_str!("../templates/landing.html")),
    ("shop.html", include_str!("../templates/shop.html")),
    ("admin.html", include_str!("../templates/admin.html")),
];

const AVATAR_BASE: &str = "https://mc-heads.net/avatar";

/// Confirmation shown after a redirect, carried as `?notice={code}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notice {
    SignedIn,
    Registered,
    SignedOut,
    ConfigSaved,
    RankAdded,
    RankSaved,
    RankDeleted,
    KeyAdded,
    KeySaved,
    KeyDeleted,
}

impl Notice {
    pub fn code(&self) -> &'static str {
        match self {
            Notice::SignedIn => "signed-in",
            Notice::Registered => "registered",
            Notice::SignedOut => "signed-out",
            Notice::ConfigSaved => "config-saved",
            Notice::RankAdded => "rank-added",
            Notice::RankSaved => "rank-saved",
            Notice::RankDeleted => "rank-deleted",
            Notice::KeyAdded => "key-added",
            Notice::KeySaved => "key-saved",
            Notice::KeyDeleted => "key-deleted",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [
            Notice::SignedIn,
            Notice::Registered,
            Notice::SignedOut,
            Notice::ConfigSaved,
            Notice::RankAdded,
            Notice::RankSaved,
            Notice::RankDeleted,
            Notice::KeyAdded,
            Notice::KeySaved,
            Notice::KeyDeleted,
        ]
        .into_iter()
        .find(|notice| notice.code() == code)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Notice::SignedIn => "Welcome back!",
            Notice::Registered => "Account created! Welcome to ConfessionMC.",
            Notice::SignedOut => "Logged out.",
            Notice::ConfigSaved => "Site configuration updated.",
            Notice::RankAdded => "New rank created.",
            Notice::RankSaved => "Rank updated.",
            Notice::RankDeleted => "Rank removed.",
            Notice::KeyAdded => "New key created.",
            Notice::KeySaved => "Key updated.",
            Notice::KeyDeleted => "Key removed.",
        }
    }
}

/// Everything the shared layout needs: nav, account menu, flash, footer.
#[derive(Clone, Debug, Serialize)]
pub struct Chrome {
    pub path: &'static str,
    pub config: SiteConfig,
    pub profile: Option<Profile>,
    pub avatar_url: String,
    pub notice: Option<&'static str>,
    pub error: Option<String>,
    pub year: i32,
}

impl Chrome {
    pub fn new(path: &'static str, config: SiteConfig, profile: Option<Profile>) -> Self {
        Self {
            path,
            avatar_url: avatar_url(profile.as_ref()),
            config,
            profile,
            notice: None,
            error: None,
            year: Utc::now().year(),
        }
    }

    pub fn with_notice(mut self, notice: Option<Notice>) -> Self {
        self.notice = notice.map(|notice| notice.message());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Premium accounts show their own skin, everyone else shows Steve.
pub fn avatar_url(profile: Option<&Profile>) -> String {
    match profile {
        Some(profile) if profile.is_premium_minecraft => {
            format!("{AVATAR_BASE}/{}/40", profile.username)
        }
        _ => format!("{AVATAR_BASE}/Steve/40"),
    }
}

pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_filter("money", money);

        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }

        Ok(Self { env })
    }

    pub fn landing(&self, chrome: &Chrome, status: &StatusView) -> AppResult<Html<String>> {
        self.render(
            "landing.html",
            context! {
                chrome => chrome,
                status => status,
                address => chrome.config.address(),
            },
        )
    }

    pub fn shop(
        &self,
        chrome: &Chrome,
        ranks: &[Rank],
        keys: &[Key],
        purchase: Option<&PurchaseDialog>,
    ) -> AppResult<Html<String>> {
        let (free, paid): (Vec<&Rank>, Vec<&Rank>) = ranks.iter().partition(|rank| rank.is_free);

        self.render(
            "shop.html",
            context! {
                chrome => chrome,
                paid_ranks => paid,
                free_ranks => free,
                keys => keys,
                purchase => purchase,
            },
        )
    }

    pub fn admin(&self, chrome: &Chrome, ranks: &[Rank], keys: &[Key]) -> AppResult<Html<String>> {
        self.render(
            "admin.html",
            context! {
                chrome => chrome,
                ranks => ranks,
                keys => keys,
            },
        )
    }

    fn render(&self, name: &str, context: Value) -> AppResult<Html<String>> {
        let html = self.env.get_template(name)?.render(context)?;

        Ok(Html(html))
    }
}

/// `9.9` -> `9.90`. Anything that is not a number passes through.
fn money(value: Value) -> String {
    let text = value.to_string();

    match text.parse::<Decimal>() {
        Ok(amount) => format!("{:.2}", amount.round_dp(2)),
        Err(_) => text,
    }
}
