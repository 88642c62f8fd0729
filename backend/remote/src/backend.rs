use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::RemoteError,
    feed::ChangeFeed,
    models::{AuthSession, Profile, Table},
};

/// Read of one table: optional equality filter, ascending order, row limit.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub table: Table,
    pub filter: Option<(String, String)>,
    pub order: Option<String>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            filter: None,
            order: None,
            limit: None,
        }
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filter = Some((column.to_string(), value.to_string()));
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.order = Some(column.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The hosted data/auth service.
///
/// Rows travel as JSON objects; [`Tables`] adds the typed view on top.
/// `token` is the signed-in user's access token, `None` for anonymous access.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_in(&self, handle: &str, password: &str) -> Result<AuthSession, RemoteError>;

    async fn sign_up(&self, handle: &str, password: &str) -> Result<AuthSession, RemoteError>;

    async fn sign_out(&self, token: &str) -> Result<(), RemoteError>;

    /// Exchanges a refresh token for a fresh session. Refresh tokens are
    /// single use.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, RemoteError>;

    async fn select(&self, query: &Query, token: Option<&str>) -> Result<Vec<Value>, RemoteError>;

    async fn insert(&self, table: Table, row: Value, token: Option<&str>)
    -> Result<Value, RemoteError>;

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        patch: Value,
        token: Option<&str>,
    ) -> Result<Value, RemoteError>;

    async fn delete(&self, table: Table, id: Uuid, token: Option<&str>) -> Result<(), RemoteError>;

    fn changes(&self) -> &ChangeFeed;
}

/// A typed row of one table.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;
    const ORDER: Option<&'static str>;

    fn id(&self) -> Option<Uuid>;
}

#[async_trait]
pub trait Tables {
    async fn fetch_all<T: Record>(&self, token: Option<&str>) -> Result<Vec<T>, RemoteError>;

    async fn fetch_first<T: Record>(&self, token: Option<&str>) -> Result<Option<T>, RemoteError>;

    async fn create<T, D>(&self, draft: &D, token: Option<&str>) -> Result<T, RemoteError>
    where
        T: Record,
        D: Serialize + Sync;

    async fn save<T: Record>(&self, record: &T, token: Option<&str>) -> Result<T, RemoteError>;

    async fn fetch_profile(
        &self,
        user_id: Uuid,
        token: Option<&str>,
    ) -> Result<Option<Profile>, RemoteError>;

    async fn insert_profile(
        &self,
        profile: &Profile,
        token: Option<&str>,
    ) -> Result<Profile, RemoteError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Tables for B {
    async fn fetch_all<T: Record>(&self, token: Option<&str>) -> Result<Vec<T>, RemoteError> {
        let mut query = Query::table(T::TABLE);
        if let Some(order) = T::ORDER {
            query = query.order_by(order);
        }

        self.select(&query, token)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(RemoteError::from))
            .collect()
    }

    async fn fetch_first<T: Record>(&self, token: Option<&str>) -> Result<Option<T>, RemoteError> {
        let query = Query::table(T::TABLE).limit(1);

        match self.select(&query, token).await?.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    async fn create<T, D>(&self, draft: &D, token: Option<&str>) -> Result<T, RemoteError>
    where
        T: Record,
        D: Serialize + Sync,
    {
        let row = self.insert(T::TABLE, serde_json::to_value(draft)?, token).await?;

        Ok(serde_json::from_value(row)?)
    }

    async fn save<T: Record>(&self, record: &T, token: Option<&str>) -> Result<T, RemoteError> {
        let id = record
            .id()
            .ok_or_else(|| RemoteError::NotFound(T::TABLE.as_str().to_string()))?;
        let row = self
            .update(T::TABLE, id, serde_json::to_value(record)?, token)
            .await?;

        Ok(serde_json::from_value(row)?)
    }

    async fn fetch_profile(
        &self,
        user_id: Uuid,
        token: Option<&str>,
    ) -> Result<Option<Profile>, RemoteError> {
        let query = Query::table(Table::Profiles).eq("user_id", user_id).limit(1);

        match self.select(&query, token).await?.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    async fn insert_profile(
        &self,
        profile: &Profile,
        token: Option<&str>,
    ) -> Result<Profile, RemoteError> {
        let row = self
            .insert(Table::Profiles, serde_json::to_value(profile)?, token)
            .await?;

        Ok(serde_json::from_value(row)?)
    }
}
