use reqwest::{Client as HttpClient, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    Category, CreateTransaction, MonthlyHistory, Transaction, TransactionFilter,
    TransactionSummary,
};

/// REST client for the DevBills backend.
#[derive(Clone)]
pub struct Client {
    http: HttpClient,
    base_url: Url,
    token: Option<String>,
}

#[derive(Serialize)]
struct MonthQuery {
    month: u32,
    year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    months: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl Client {
    pub fn new(http: HttpClient, base_url: Url) -> Self {
        Self { http, base_url, token: None }
    }

    /// Id token sent as a bearer credential; `None` after sign-out.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    // ============= Transactions =============

    pub async fn get_transactions(&self, filter: &TransactionFilter) -> ApiResult<Vec<Transaction>> {
        self.get("transactions", Some(filter)).await
    }

    pub async fn get_transactions_summary(&self, month: u32, year: i32) -> ApiResult<TransactionSummary> {
        let query = MonthQuery { month, year, months: None };
        self.get("transactions/summary", Some(&query)).await
    }

    pub async fn get_transactions_monthly(
        &self,
        month: u32,
        year: i32,
        months: Option<u32>,
    ) -> ApiResult<MonthlyHistory> {
        let query = MonthQuery { month, year, months };
        self.get("transactions/historical", Some(&query)).await
    }

    pub async fn create_transaction(&self, dto: &CreateTransaction) -> ApiResult<Transaction> {
        let resp = self.send(Method::POST, "transactions", None::<&()>, Some(dto)).await?;
        decode(resp).await
    }

    pub async fn delete_transaction(&self, id: &str) -> ApiResult<()> {
        let path = format!("transactions/{id}");
        self.send(Method::DELETE, &path, None::<&()>, None::<&()>).await?;
        Ok(())
    }

    // ============= Categories =============

    pub async fn get_categories(&self) -> ApiResult<Vec<Category>> {
        self.get("categories", None::<&()>).await
    }

    // ============= Plumbing =============

    async fn get<T: DeserializeOwned, Q: Serialize>(&self, path: &str, query: Option<&Q>) -> ApiResult<T> {
        let resp = self.send(Method::GET, path, query, None::<&()>).await?;
        decode(resp).await
    }

    /// Joins `path` under the base URL, keeping any path prefix the base carries.
    fn url(&self, path: &str) -> ApiResult<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    async fn send<Q: Serialize, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: Option<&Q>,
        body: Option<&B>,
    ) -> ApiResult<Response> {
        let token = self.token.as_deref().ok_or(ApiError::Unauthenticated)?;
        let url = self.url(path)?;

        let mut req = self.http.request(method.clone(), url).bearer_auth(token);
        if let Some(query) = query {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        debug!(%method, path, %status, "backend request");

        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("request failed").to_string()
            });
        warn!(%method, path, %status, %message, "backend request failed");
        Err(ApiError::Server { status, message })
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> ApiResult<T> {
    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> Client {
        Client::new(HttpClient::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn joins_under_base_prefix() {
        let c = client("http://localhost:3001/api");
        assert_eq!(c.url("transactions/summary").unwrap().as_str(), "http://localhost:3001/api/transactions/summary");
        let c = client("http://localhost:3001");
        assert_eq!(c.url("/categories").unwrap().as_str(), "http://localhost:3001/categories");
    }

    #[tokio::test]
    async fn requests_need_a_token() {
        let c = client("http://127.0.0.1:9");
        let err = c.get_categories().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
    }
}
