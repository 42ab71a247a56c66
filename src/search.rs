//! Elasticsearch indices for sites using the `search_api_elasticsearch` module.
//!
//! Index machine names are read from the site's own database. Missing indices
//! are created empty; the caller reindexes when any were created.

use crate::config::StackSection;
use crate::process::{ProcessRunner, argv};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Contrib module whose presence in a built profile enables indexing.
pub const ELASTICSEARCH_MODULE: &str = "search_api_elasticsearch";

const INDEX_QUERY: &str = "SELECT sai.machine_name FROM search_api_index sai \
     INNER JOIN search_api_server sas ON sai.server = sas.machine_name \
     WHERE sas.class = 'search_api_elasticsearch_elastica_service'";

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index_exists(&self, base_url: &str, name: &str) -> Result<bool>;
    async fn create_index(&self, base_url: &str, name: &str) -> Result<()>;
}

/// [`SearchIndex`] speaking the Elasticsearch REST API.
#[derive(Debug, Clone, Default)]
pub struct ElasticsearchClient {
    client: reqwest::Client,
}

impl ElasticsearchClient {
    pub fn new() -> Self {
        Self::default()
    }
}

fn index_url(base_url: &str, name: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), name)
}

#[async_trait]
impl SearchIndex for ElasticsearchClient {
    async fn index_exists(&self, base_url: &str, name: &str) -> Result<bool> {
        let resp = self
            .client
            .head(index_url(base_url, name))
            .send()
            .await
            .with_context(|| format!("Failed to query index {}", name))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        resp.error_for_status()
            .with_context(|| format!("Elasticsearch returned error status for {}", name))?;
        Ok(true)
    }

    async fn create_index(&self, base_url: &str, name: &str) -> Result<()> {
        self.client
            .put(index_url(base_url, name))
            .send()
            .await
            .with_context(|| format!("Failed to create index {}", name))?
            .error_for_status()
            .with_context(|| format!("Elasticsearch refused to create {}", name))?;
        Ok(())
    }
}

pub fn index_name(database: &str, machine_name: &str) -> String {
    format!("elasticsearch_index_{}_{}", database, machine_name)
}

/// Creates the indices a site's database declares.
pub struct IndexProvisioner {
    runner: Arc<dyn ProcessRunner>,
    search: Arc<dyn SearchIndex>,
    stack: StackSection,
    timeout: Duration,
}

impl IndexProvisioner {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        search: Arc<dyn SearchIndex>,
        stack: StackSection,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            search,
            stack,
            timeout,
        }
    }

    /// Machine names of the Elasticsearch-backed indices configured in `database`.
    pub async fn discover(&self, database: &str, cwd: &Path) -> Result<Vec<String>> {
        let mut args = vec![
            "mysql".to_string(),
            format!("-h{}", self.stack.mysql_host),
            format!("-P{}", self.stack.mysql_port),
            format!("-u{}", self.stack.mysql_root_user),
        ];
        if !self.stack.mysql_root_password.is_empty() {
            args.push(format!("-p{}", self.stack.mysql_root_password));
        }
        args.extend(argv(["-N", "-B", "--database", database, "-e", INDEX_QUERY]));

        let output = self.runner.run(&args, cwd, self.timeout).await?;
        if !output.success() {
            bail!(
                "Could not read search indices from {}: {}",
                database,
                output.failure_reason()
            );
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Create every missing index. Returns the names that were created.
    pub async fn provision(&self, database: &str, cwd: &Path) -> Result<Vec<String>> {
        let base_url = self.stack.elasticsearch_base_url();
        let mut created = Vec::new();
        for machine_name in self.discover(database, cwd).await? {
            let name = index_name(database, &machine_name);
            if self.search.index_exists(&base_url, &name).await? {
                continue;
            }
            tracing::info!(index = %name, "creating empty search index");
            self.search.create_index(&base_url, &name).await?;
            created.push(name);
        }
        Ok(created)
    }

    /// Index all content through drush.
    pub async fn reindex(&self, www_dir: &Path) -> Result<()> {
        let output = self
            .runner
            .run(&argv(["drush", "-y", "search-api-index"]), www_dir, self.timeout)
            .await?;
        if !output.success() {
            bail!("Reindexing failed: {}", output.failure_reason());
        }
        Ok(())
    }
}
