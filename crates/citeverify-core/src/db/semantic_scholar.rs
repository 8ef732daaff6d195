use super::{ApiRequest, BoxFuture, Candidate, DoiHit, Fetcher, SourceBackend, truncate_query};
use crate::rate_limit::DbQueryError;

pub const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";

const FIELDS: &str = "title,year,externalIds";
const SEARCH_LIMIT: usize = 3;

/// Semantic Scholar Academic Graph API.
pub struct SemanticScholar {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for SemanticScholar {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

impl SemanticScholar {
    fn with_key(&self, req: ApiRequest) -> ApiRequest {
        match self.api_key {
            Some(ref key) => req.header("x-api-key", key.clone()),
            None => req,
        }
    }
}

impl SourceBackend for SemanticScholar {
    fn name(&self) -> &'static str {
        "Semantic Scholar"
    }

    fn key(&self) -> &'static str {
        "semantic_scholar"
    }

    fn lookup_doi<'a>(
        &'a self,
        doi: &'a str,
        fetcher: &'a dyn Fetcher,
    ) -> BoxFuture<'a, Result<Option<DoiHit>, DbQueryError>> {
        Box::pin(async move {
            let url = format!(
                "{}/paper/DOI:{}",
                self.base_url,
                urlencoding::encode(doi)
            );
            let req = self.with_key(ApiRequest::get(url).query("fields", FIELDS));

            let data = match fetcher.fetch(req).await {
                Ok(data) => data,
                Err(DbQueryError::NotFound) => return Ok(None),
                Err(e) => return Err(e),
            };

            let Some(paper_id) = data["paperId"].as_str() else {
                return Ok(None);
            };
            Ok(Some(DoiHit {
                identifier: Some(paper_id.to_string()),
                title: data["title"].as_str().map(String::from),
            }))
        })
    }

    fn search_title<'a>(
        &'a self,
        title: &'a str,
        fetcher: &'a dyn Fetcher,
    ) -> BoxFuture<'a, Result<Vec<Candidate>, DbQueryError>> {
        Box::pin(async move {
            let req = self.with_key(
                ApiRequest::get(format!("{}/paper/search", self.base_url))
                    .query("query", truncate_query(title, 200))
                    .query("limit", SEARCH_LIMIT.to_string())
                    .query("fields", FIELDS),
            );

            let data = fetcher.fetch(req).await?;
            let papers = data["data"].as_array().cloned().unwrap_or_default();

            Ok(papers
                .iter()
                .take(SEARCH_LIMIT)
                .filter_map(|paper| {
                    let found_title = paper["title"].as_str().filter(|t| !t.is_empty())?;
                    Some(Candidate {
                        identifier: paper["paperId"].as_str().map(String::from),
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
    async fn doi_lookup_encodes_identifier() {
        let transport = MockTransport::new(MockResponse::Json(json!({
            "paperId": "abc123", "title": "A Study of Things"
        })));
        let fetcher = PassthroughFetcher::new(&transport);

        let hit = SemanticScholar::default()
            .lookup_doi("10.1000/xyz123", &fetcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.identifier.as_deref(), Some("abc123"));
        assert_eq!(hit.title.as_deref(), Some("A Study of Things"));
        assert!(
            transport.requests()[0]
                .url
                .ends_with("/paper/DOI:10.1000%2Fxyz123")
        );
    }

    #[tokio::test]
    async fn doi_404_is_not_found() {
        let transport = MockTransport::new(MockResponse::Error(DbQueryError::NotFound));
        let fetcher = PassthroughFetcher::new(&transport);
        let hit = SemanticScholar::default()
            .lookup_doi("10.1/missing", &fetcher)
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn doi_body_without_paper_id_is_not_found() {
        let transport = MockTransport::new(MockResponse::Json(json!({"error": "nope"})));
        let fetcher = PassthroughFetcher::new(&transport);
        let hit = SemanticScholar::default()
            .lookup_doi("10.1/missing", &fetcher)
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn search_returns_ranked_candidates() {
        let transport = MockTransport::new(MockResponse::Json(json!({
            "data": [
                {"paperId": "p1", "title": "Unrelated"},
                {"paperId": "p2", "title": ""},
                {"paperId": "p3", "title": "A Study of Things"},
                {"paperId": "p4", "title": "Beyond the limit"}
            ]
        })));
        let fetcher = PassthroughFetcher::new(&transport);
        let candidates = SemanticScholar {
            api_key: Some("k".into()),
            ..SemanticScholar::default()
        }
        .search_title("A Study of Things", &fetcher)
        .await
        .unwrap();

        let ids: Vec<_> = candidates
            .iter()
            .map(|c| c.identifier.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["p1", "p3"]);

        let req = &transport.requests()[0];
        assert_eq!(req.query_value("limit"), Some("3"));
        assert!(req.headers.iter().any(|(k, v)| k == "x-api-key" && v == "k"));
    }
}
