use super::{ApiRequest, BoxFuture, Candidate, DoiHit, Fetcher, SourceBackend};
use crate::rate_limit::DbQueryError;

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PubMed via NCBI E-utilities.
///
/// DOI lookup is an `esearch` restricted to the `[doi]` field. Title lookup
/// searches `[ti]` and fetches the summary of the single best hit only.
pub struct PubMed {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for PubMed {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

impl PubMed {
    fn request(&self, endpoint: &str) -> ApiRequest {
        let req = ApiRequest::get(format!("{}/{}", self.base_url, endpoint))
            .query("db", "pubmed")
            .query("retmode", "json");
        match self.api_key {
            Some(ref key) => req.query("api_key", key.clone()),
            None => req,
        }
    }

    async fn esearch(&self, term: String, fetcher: &dyn Fetcher) -> Result<Vec<String>, DbQueryError> {
        let data = fetcher
            .fetch(self.request("esearch.fcgi").query("term", term))
            .await?;
        Ok(data["esearchresult"]["idlist"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl SourceBackend for PubMed {
    fn name(&self) -> &'static str {
        "PubMed"
    }

    fn key(&self) -> &'static str {
        "pubmed"
    }

    fn lookup_doi<'a>(
        &'a self,
        doi: &'a str,
        fetcher: &'a dyn Fetcher,
    ) -> BoxFuture<'a, Result<Option<DoiHit>, DbQueryError>> {
        Box::pin(async move {
            let ids = self.esearch(format!("{}[doi]", doi), fetcher).await?;
            Ok(ids.into_iter().next().map(|pmid| DoiHit {
                identifier: Some(pmid),
                title: None,
            }))
        })
    }

    fn search_title<'a>(
        &'a self,
        title: &'a str,
        fetcher: &'a dyn Fetcher,
    ) -> BoxFuture<'a, Result<Vec<Candidate>, DbQueryError>> {
        Box::pin(async move {
            // E-utilities treats brackets and colons as query syntax.
            let clean: String = title
                .chars()
                .map(|c| {
                    if c.is_alphanumeric() || c.is_whitespace() {
                        c
                    } else {
                        ' '
                    }
                })
                .collect();

            let ids = self.esearch(format!("{}[ti]", clean), fetcher).await?;
            let Some(pmid) = ids.into_iter().next() else {
                return Ok(vec![]);
            };

            let data = fetcher
                .fetch(self.request("esummary.fcgi").query("id", pmid.clone()))
                .await?;
            let found_title = data["result"][pmid.as_str()]["title"]
                .as_str()
                .unwrap_or("")
                .to_string();

            if found_title.is_empty() {
                return Ok(vec![]);
            }

            Ok(vec![Candidate {
                identifier: Some(pmid),
                title: found_title,
            }])
        })
    }
}
