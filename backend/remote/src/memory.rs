//! # Memory Backend
//!
//! Same contract as the hosted service, held in process. Used when no backend
//! URL is configured and by tests.
//!
//! - Handles are unique; a second sign-up with the same handle is rejected
//! - Every write publishes a [`RowChange`] like the hosted realtime service
//! - [`MemoryBackend::set_failing`] makes every call fail until cleared
//! - Access tokens it did not issue, or has expired, are refused with a 401
use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    backend::{Backend, Query},
    error::RemoteError,
    feed::ChangeFeed,
    models::{AuthSession, ChangeKind, Identity, RowChange, Table},
};

const TOKEN_LIFETIME_SECS: u64 = 3600;

struct Account {
    id: Uuid,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, Identity>,
    rows: HashMap<Table, Vec<Value>>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    failing: AtomicBool,
    feed: ChangeFeed,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `rows` without publishing changes.
    pub fn seed(&self, table: Table, rows: impl IntoIterator<Item = Value>) {
        let mut state = self.state();
        let stored = state.rows.entry(table).or_default();

        for mut row in rows {
            ensure_id(&mut row);
            stored.push(row);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.state().rows.get(&table).cloned().unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable);
        }

        Ok(())
    }

    /// Forgets every access token, as if they all ran out at once. Refresh
    /// tokens keep working.
    pub fn expire_access_tokens(&self) {
        self.state().tokens.clear();
    }

    fn issue_session(state: &mut MemoryState, identity: Identity) -> AuthSession {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        state.tokens.insert(access_token.clone(), identity.id);
        state.refresh_tokens.insert(refresh_token.clone(), identity.clone());

        AuthSession {
            identity,
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            expires_in: Some(TOKEN_LIFETIME_SECS),
        }
    }

    fn check_token(&self, token: Option<&str>) -> Result<(), RemoteError> {
        self.check()?;

        match token {
            Some(token) if !self.state().tokens.contains_key(token) => {
                Err(RemoteError::rejected(401, "JWT expired"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sign_in(&self, handle: &str, password: &str) -> Result<AuthSession, RemoteError> {
        self.check()?;
        let mut state = self.state();

        let id = match state.accounts.get(handle) {
            Some(account) if account.password == password => account.id,
            _ => return Err(RemoteError::rejected(400, "Invalid login credentials")),
        };

        Ok(Self::issue_session(
            &mut state,
            Identity {
                id,
                email: handle.to_string(),
            },
        ))
    }

    async fn sign_up(&self, handle: &str, password: &str) -> Result<AuthSession, RemoteError> {
        self.check()?;
        let mut state = self.state();

        if state.accounts.contains_key(handle) {
            return Err(RemoteError::rejected(422, "User already registered"));
        }

        let id = Uuid::new_v4();
        state.accounts.insert(
            handle.to_string(),
            Account {
                id,
                password: password.to_string(),
            },
        );

        Ok(Self::issue_session(
            &mut state,
            Identity {
                id,
                email: handle.to_string(),
            },
        ))
    }

    async fn sign_out(&self, token: &str) -> Result<(), RemoteError> {
        self.check()?;
        self.state().tokens.remove(token);

        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, RemoteError> {
        self.check()?;
        let mut state = self.state();

        let identity = state
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| RemoteError::rejected(400, "Invalid Refresh Token: Already Used"))?;

        Ok(Self::issue_session(&mut state, identity))
    }

    async fn select(&self, query: &Query, token: Option<&str>) -> Result<Vec<Value>, RemoteError> {
        self.check_token(token)?;
        let state = self.state();

        let mut rows: Vec<Value> = state
            .rows
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| match &query.filter {
                        Some((column, value)) => {
                            row.get(column).map(text).as_deref() == Some(value.as_str())
                        }
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(column) = &query.order {
            rows.sort_by_key(|row| row.get(column).and_then(Value::as_i64).unwrap_or(i64::MAX));
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn insert(
        &self,
        table: Table,
        mut row: Value,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.check_token(token)?;
        if !row.is_object() {
            return Err(RemoteError::rejected(400, "Row must be an object"));
        }
        ensure_id(&mut row);

        self.state().rows.entry(table).or_default().push(row.clone());
        self.feed.publish(RowChange {
            kind: ChangeKind::Insert,
            table,
            record: Some(row.clone()),
            old_record: None,
        });

        Ok(row)
    }

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        patch: Value,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        self.check_token(token)?;
        let (old, new) = {
            let mut state = self.state();
            let row = state
                .rows
                .get_mut(&table)
                .and_then(|rows| rows.iter_mut().find(|row| has_id(row, id)))
                .ok_or_else(|| RemoteError::NotFound(table.as_str().to_string()))?;

            let old = row.clone();
            if let (Some(target), Value::Object(fields)) = (row.as_object_mut(), patch) {
                for (field, value) in fields {
                    if field != "id" {
                        target.insert(field, value);
                    }
                }
            }

            (old, row.clone())
        };

        self.feed.publish(RowChange {
            kind: ChangeKind::Update,
            table,
            record: Some(new.clone()),
            old_record: Some(old),
        });

        Ok(new)
    }

    async fn delete(&self, table: Table, id: Uuid, token: Option<&str>) -> Result<(), RemoteError> {
        self.check_token(token)?;
        let removed = {
            let mut state = self.state();
            let rows = state.rows.entry(table).or_default();
            let position = rows.iter().position(|row| has_id(row, id));

            position.map(|index| rows.remove(index))
        };

        if let Some(old) = removed {
            self.feed.publish(RowChange {
                kind: ChangeKind::Delete,
                table,
                record: None,
                old_record: Some(old),
            });
        }

        Ok(())
    }

    fn changes(&self) -> &ChangeFeed {
        &self.feed
    }
}

fn ensure_id(row: &mut Value) {
    if let Some(fields) = row.as_object_mut() {
        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    }
}

fn has_id(row: &Value, id: Uuid) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id.to_string().as_str())
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
