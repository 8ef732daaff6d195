//! reqwest-backed [`Transport`].

use std::time::Duration;

use super::{ApiRequest, BoxFuture, Transport};
use crate::rate_limit::{DbQueryError, check_rate_limit_response};

/// Production transport over a shared connection pool.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client that sends `user_agent` on every request unless the
    /// request carries its own.
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get_json<'a>(
        &'a self,
        request: &'a ApiRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<serde_json::Value, DbQueryError>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .get(&request.url)
                .query(&request.query)
                .timeout(timeout);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let resp = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    DbQueryError::Transport(format!("timed out after {:?}", timeout))
                } else {
                    DbQueryError::Transport(e.to_string())
                }
            })?;

            check_rate_limit_response(&resp)?;
            let status = resp.status();
            if status.as_u16() == 404 {
                return Err(DbQueryError::NotFound);
            }
            if !status.is_success() {
                return Err(DbQueryError::Http(status.as_u16()));
            }

            resp.json::<serde_json::Value>()
                .await
                .map_err(|e| DbQueryError::Decode(e.to_string()))
        })
    }
}
