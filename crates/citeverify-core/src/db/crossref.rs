use super::{
    ApiRequest, BoxFuture, Candidate, DoiHit, Fetcher, SourceBackend, first_str, truncate_query,
};
use crate::rate_limit::DbQueryError;

pub const DEFAULT_BASE_URL: &str = "https://api.crossref.org/works";

const SEARCH_ROWS: usize = 3;

/// CrossRef REST API.
///
/// With a `mailto` the requests are routed to CrossRef's polite pool: the
/// address is sent both as a query parameter and in the User-Agent.
pub struct CrossRef {
    pub base_url: String,
    pub mailto: Option<String>,
    /// Base User-Agent; the mailto suffix is appended when configured.
    pub user_agent: String,
}

impl Default for CrossRef {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mailto: None,
            user_agent: crate::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrossRef {
    fn polite(&self, req: ApiRequest) -> ApiRequest {
        match self.mailto {
            Some(ref email) => req.query("mailto", email.clone()).header(
                "User-Agent",
                format!("{} (mailto:{})", self.user_agent, email),
            ),
            None => req,
        }
    }
}

impl SourceBackend for CrossRef {
    fn name(&self) -> &'static str {
        "CrossRef"
    }

    fn key(&self) -> &'static str {
        "crossref"
    }

    fn lookup_doi<'a>(
        &'a self,
        doi: &'a str,
        fetcher: &'a dyn Fetcher,
    ) -> BoxFuture<'a, Result<Option<DoiHit>, DbQueryError>> {
        Box::pin(async move {
            let url = format!("{}/{}", self.base_url, urlencoding::encode(doi));
            let data = match fetcher.fetch(self.polite(ApiRequest::get(url))).await {
                Ok(data) => data,
                Err(DbQueryError::NotFound) => return Ok(None),
                Err(e) => return Err(e),
            };

            let message = &data["message"];
            if !message.is_object() {
                return Ok(None);
            }
            Ok(Some(DoiHit {
                identifier: message["DOI"].as_str().map(String::from),
                title: first_str(&message["title"]).map(String::from),
            }))
        })
    }

    fn search_title<'a>(
        &'a self,
        title: &'a str,
        fetcher: &'a dyn Fetcher,
    ) -> BoxFuture<'a, Result<Vec<Candidate>, DbQueryError>> {
        Box::pin(async move {
            let req = self.polite(
                ApiRequest::get(self.base_url.clone())
                    .query("query.bibliographic", truncate_query(title, 200))
                    .query("rows", SEARCH_ROWS.to_string()),
            );

            let data = fetcher.fetch(req).await?;
            let items = data["message"]["items"]
                .as_array()
                .cloned()
                .unwrap_or_default();

            Ok(items
                .iter()
                .take(SEARCH_ROWS)
                .filter_map(|item| {
                    let found_title = first_str(&item["title"]).filter(|t| !t.is_empty())?;
                    Some(Candidate {
                        identifier: item["DOI"].as_str().map(String::from),
                        title: found_title.to_string(),
                    })
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{MockResponse, MockTransport, PassthroughFetcher};
    use serde_json::json;

    #[tokio::test]
    async fn doi_lookup_reads_message() {
        let transport = MockTransport::new(MockResponse::Json(json!({
            "status": "ok",
            "message": {"DOI": "10.1000/xyz123", "title": ["A Study of Things"]}
        })));
        let fetcher = PassthroughFetcher::new(&transport);

        let hit = CrossRef::default()
            .lookup_doi("10.1000/xyz123", &fetcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.identifier.as_deref(), Some("10.1000/xyz123"));
        assert_eq!(hit.title.as_deref(), Some("A Study of Things"));
        assert!(transport.requests()[0].url.ends_with("/works/10.1000%2Fxyz123"));
    }

    #[tokio::test]
    async fn doi_404_is_not_found() {
        let transport = MockTransport::new(MockResponse::Error(DbQueryError::NotFound));
        let fetcher = PassthroughFetcher::new(&transport);
        assert!(
            CrossRef::default()
                .lookup_doi("10.1/x", &fetcher)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn search_skips_untitled_items() {
        let transport = MockTransport::new(MockResponse::Json(json!({
            "message": {"items": [
                {"DOI": "10.1/a"},
                {"DOI": "10.1/b", "title": ["Second"]},
                {"DOI": "10.1/c", "title": []}
            ]}
        })));
        let fetcher = PassthroughFetcher::new(&transport);
        let candidates = CrossRef::default()
            .search_title("Second", &fetcher)
            .await
            .unwrap();
        assert_eq!(
            candidates,
            vec![Candidate {
                identifier: Some("10.1/b".into()),
                title: "Second".into()
            }]
        );
        assert_eq!(transport.requests()[0].query_value("rows"), Some("3"));
    }

    #[tokio::test]
    async fn mailto_enables_polite_pool() {
        let transport = MockTransport::new(MockResponse::Json(json!({"message": {"items": []}})));
        let fetcher = PassthroughFetcher::new(&transport);
        let crossref = CrossRef {
            mailto: Some("me@example.org".into()),
            user_agent: "citeverify/test".into(),
            ..CrossRef::default()
        };
        crossref.search_title("Anything", &fetcher).await.unwrap();

        let req = &transport.requests()[0];
        assert_eq!(req.query_value("mailto"), Some("me@example.org"));
        assert!(req.headers.iter().any(|(k, v)| {
            k == "User-Agent" && v == "citeverify/test (mailto:me@example.org)"
        }));
    }
}
