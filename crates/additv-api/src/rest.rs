// Table and function endpoints
//
// Inserts and filtered updates go through the REST surface; remote
// functions are invoked by name. All of them share the refresh-once
// behavior of `BackendClient::send`.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::client::{BackendClient, preview};
use crate::error::Error;

impl BackendClient {
    /// Insert one row (object body) or many rows (array body).
    ///
    /// `POST /rest/v1/{table}`
    pub async fn insert(&self, table: &str, rows: &(impl Serialize + Sync)) -> Result<(), Error> {
        let url = self.rest_url(table)?;
        let body = serde_json::to_value(rows)?;
        debug!(table, "inserting rows");

        self.send(|http| {
            http.post(url.clone())
                .header("Prefer", "return=minimal")
                .json(&body)
        })
        .await?;
        Ok(())
    }

    /// Update rows matching every `(column, value)` equality filter.
    ///
    /// `PATCH /rest/v1/{table}?{column}=eq.{value}`
    pub async fn update(
        &self,
        table: &str,
        changes: &(impl Serialize + Sync),
        filters: &[(&str, &str)],
    ) -> Result<(), Error> {
        let mut url = self.rest_url(table)?;
        {
            let mut query = url.query_pairs_mut();
            for (column, value) in filters {
                query.append_pair(column, &format!("eq.{value}"));
            }
        }
        let body = serde_json::to_value(changes)?;
        debug!(table, filters = filters.len(), "updating rows");

        self.send(|http| {
            http.patch(url.clone())
                .header("Prefer", "return=minimal")
                .json(&body)
        })
        .await?;
        Ok(())
    }

    /// Invoke a named remote function.
    ///
    /// `POST /functions/v1/{name}`. Returns `None` for 204, an empty body,
    /// or a literal JSON `null`.
    pub async fn invoke(&self, name: &str, args: Option<&Value>) -> Result<Option<Value>, Error> {
        let url = self.function_url(name)?;
        let body = args.cloned().unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        debug!(function = name, "invoking function");

        let resp = self.send(|http| http.post(url.clone()).json(&body)).await?;
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&text)),
            body: text.clone(),
        })?;
        Ok((!value.is_null()).then_some(value))
    }
}
