use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Config;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_keys: Option<ApiKeysConfig>,
    pub matching: Option<MatchingConfig>,
    pub network: Option<NetworkConfig>,
    pub sources: Option<SourcesConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub s2_api_key: Option<String>,
    pub crossref_mailto: Option<String>,
    pub ncbi_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub similarity_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub courtesy_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub num_workers: Option<usize>,
    pub parallel_sources: Option<bool>,
    pub deadline_secs: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub disabled: Option<Vec<String>>,
    pub pubmed_base_url: Option<String>,
    pub semantic_scholar_base_url: Option<String>,
    pub crossref_base_url: Option<String>,
}

/// Platform config directory path: `<config_dir>/citeverify/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("citeverify").join("config.toml"))
}

/// Load config by cascading CWD `.citeverify.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".citeverify.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

fn pick<S, T>(overlay: &Option<S>, base: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (bk, ok) = (&base.api_keys, &overlay.api_keys);
    let (bm, om) = (&base.matching, &overlay.matching);
    let (bn, on) = (&base.network, &overlay.network);
    let (bs, os) = (&base.sources, &overlay.sources);

    ConfigFile {
        api_keys: Some(ApiKeysConfig {
            s2_api_key: pick(ok, bk, |a| a.s2_api_key.clone()),
            crossref_mailto: pick(ok, bk, |a| a.crossref_mailto.clone()),
            ncbi_api_key: pick(ok, bk, |a| a.ncbi_api_key.clone()),
        }),
        matching: Some(MatchingConfig {
            similarity_threshold: pick(om, bm, |m| m.similarity_threshold),
        }),
        network: Some(NetworkConfig {
            courtesy_delay_ms: pick(on, bn, |n| n.courtesy_delay_ms),
            request_timeout_secs: pick(on, bn, |n| n.request_timeout_secs),
            max_retries: pick(on, bn, |n| n.max_retries),
            retry_backoff_ms: pick(on, bn, |n| n.retry_backoff_ms),
            num_workers: pick(on, bn, |n| n.num_workers),
            parallel_sources: pick(on, bn, |n| n.parallel_sources),
            deadline_secs: pick(on, bn, |n| n.deadline_secs),
            user_agent: pick(on, bn, |n| n.user_agent.clone()),
        }),
        sources: Some(SourcesConfig {
            disabled: pick(os, bs, |s| s.disabled.clone()),
            pubmed_base_url: pick(os, bs, |s| s.pubmed_base_url.clone()),
            semantic_scholar_base_url: pick(os, bs, |s| s.semantic_scholar_base_url.clone()),
            crossref_base_url: pick(os, bs, |s| s.crossref_base_url.clone()),
        }),
    }
}

impl ConfigFile {
    /// Overwrite the fields of `config` that this file sets.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ref keys) = self.api_keys {
            if let Some(ref k) = keys.s2_api_key {
                config.s2_api_key = Some(k.clone());
            }
            if let Some(ref m) = keys.crossref_mailto {
                config.crossref_mailto = Some(m.clone());
            }
            if let Some(ref k) = keys.ncbi_api_key {
                config.ncbi_api_key = Some(k.clone());
            }
        }

        if let Some(threshold) = self.matching.as_ref().and_then(|m| m.similarity_threshold) {
            config.similarity_threshold = threshold;
        }

        if let Some(ref net) = self.network {
            if let Some(ms) = net.courtesy_delay_ms {
                config.courtesy_delay = Duration::from_millis(ms);
            }
            if let Some(secs) = net.request_timeout_secs {
                config.request_timeout = Duration::from_secs(secs);
            }
            if let Some(n) = net.max_retries {
                config.max_retries = n;
            }
            if let Some(ms) = net.retry_backoff_ms {
                config.retry_backoff = Duration::from_millis(ms);
            }
            if let Some(n) = net.num_workers {
                config.num_workers = n;
            }
            if let Some(p) = net.parallel_sources {
                config.parallel_sources = p;
            }
            if let Some(secs) = net.deadline_secs {
                config.deadline = Some(Duration::from_secs(secs));
            }
            if let Some(ref ua) = net.user_agent {
                config.user_agent = ua.clone();
            }
        }

        if let Some(ref sources) = self.sources {
            if let Some(ref disabled) = sources.disabled {
                config.disabled_sources = disabled.clone();
            }
            if let Some(ref url) = sources.pubmed_base_url {
                config.pubmed_base_url = url.clone();
            }
            if let Some(ref url) = sources.semantic_scholar_base_url {
                config.semantic_scholar_base_url = url.clone();
            }
            if let Some(ref url) = sources.crossref_base_url {
                config.crossref_base_url = url.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_parses() {
        let toml_str = "[matching]\nsimilarity_threshold = 0.7\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.matching.unwrap().similarity_threshold, Some(0.7));
        assert!(parsed.api_keys.is_none());
    }

    #[test]
    fn merge_overlay_wins_and_base_fills_gaps() {
        let base: ConfigFile = toml::from_str(
            "[api_keys]\ns2_api_key = \"base-key\"\ncrossref_mailto = \"base@example.org\"\n\
             [network]\nmax_retries = 5\n",
        )
        .unwrap();
        let overlay: ConfigFile =
            toml::from_str("[api_keys]\ns2_api_key = \"cwd-key\"\n").unwrap();

        let merged = merge(base, overlay);
        let keys = merged.api_keys.unwrap();
        assert_eq!(keys.s2_api_key.as_deref(), Some("cwd-key"));
        assert_eq!(keys.crossref_mailto.as_deref(), Some("base@example.org"));
        assert_eq!(merged.network.unwrap().max_retries, Some(5));
    }

    #[test]
    fn apply_sets_only_present_fields() {
        let file: ConfigFile = toml::from_str(
            "[network]\ncourtesy_delay_ms = 1000\ndeadline_secs = 120\n\
             [sources]\ndisabled = [\"pubmed\"]\n",
        )
        .unwrap();
        let mut config = Config::default();
        file.apply_to(&mut config);

        assert_eq!(config.courtesy_delay, Duration::from_secs(1));
        assert_eq!(config.deadline, Some(Duration::from_secs(120)));
        assert_eq!(config.disabled_sources, vec!["pubmed".to_string()]);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.similarity_threshold, crate::DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn load_from_path_handles_missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from_path(&dir.path().join("absent.toml")).is_none());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "not = [valid").unwrap();
        assert!(load_from_path(&bad).is_none());

        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[api_keys]\nncbi_api_key = \"n\"\n").unwrap();
        let parsed = load_from_path(&good).unwrap();
        assert_eq!(parsed.api_keys.unwrap().ncbi_api_key.as_deref(), Some("n"));
    }
}
