//! Hosting API access.

use anyhow::{Context, Result};
use async_trait::async_trait;
use devsite_common::{Environment, Project};
use serde::Deserialize;

pub const API_TOKEN_ENV: &str = "DEVSITE_API_TOKEN";

#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn get_project(&self, id: &str) -> Result<Project>;

    /// `None` when the project has no such environment.
    async fn get_environment(&self, project: &Project, id: &str) -> Result<Option<Environment>>;
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    repository: Option<RepositoryResponse>,
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    url: String,
}

impl From<ProjectResponse> for Project {
    fn from(resp: ProjectResponse) -> Self {
        let region = resp
            .region
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();
        let project = Project::new(resp.id, resp.title, region);
        match resp.repository {
            Some(repo) => project.with_git_url(repo.url),
            None => project,
        }
    }
}

/// [`ApiClient`] for the hosting REST API, authenticated with a bearer token.
pub struct RestApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Token from `DEVSITE_API_TOKEN`, if set.
    pub fn from_env(base_url: impl Into<String>) -> Self {
        let token = std::env::var(API_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::warn!("{} is not set; API requests are unauthenticated", API_TOKEN_ENV);
        }
        Self::new(base_url, token)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .header("User-Agent", concat!("devsite/", env!("CARGO_PKG_VERSION")));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ApiClient for RestApiClient {
    async fn get_project(&self, id: &str) -> Result<Project> {
        let resp: ProjectResponse = self
            .get(&format!("/projects/{}", id))
            .send()
            .await
            .with_context(|| format!("Failed to request project {}", id))?
            .error_for_status()
            .with_context(|| format!("API returned error status for project {}", id))?
            .json()
            .await
            .with_context(|| format!("Failed to parse project {}", id))?;
        Ok(resp.into())
    }

    async fn get_environment(&self, project: &Project, id: &str) -> Result<Option<Environment>> {
        let resp = self
            .get(&format!("/projects/{}/environments/{}", project.id, id))
            .send()
            .await
            .with_context(|| format!("Failed to request environment {}", id))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let env = resp
            .error_for_status()
            .with_context(|| format!("API returned error status for environment {}", id))?
            .json::<Environment>()
            .await
            .with_context(|| format!("Failed to parse environment {}", id))?;
        Ok(Some(env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one request with `status` and a JSON `body`; return the request head.
    async fn serve_once(listener: TcpListener, status: &'static str, body: &'static str) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let n = socket.read(&mut buf).await.unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).to_string()
    }

    #[test]
    fn test_project_from_response() {
        let resp: ProjectResponse = serde_json::from_str(
            r#"{"id":"abc123","title":"Acme","region":"eu.platform.sh",
                "repository":{"url":"abc123@git.eu.platform.sh:abc123.git"}}"#,
        )
        .unwrap();
        let project: Project = resp.into();
        assert_eq!(project.region, "eu");
        assert_eq!(
            project.git_url.as_deref(),
            Some("abc123@git.eu.platform.sh:abc123.git")
        );
    }

    #[tokio::test]
    async fn test_get_project_sends_token() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/api", listener.local_addr().unwrap());
        let server = tokio::spawn(serve_once(
            listener,
            "200 OK",
            r#"{"id":"abc123","title":"Acme","region":"us"}"#,
        ));

        let client = RestApiClient::new(base, Some("secret-token".to_string()));
        let project = client.get_project("abc123").await.unwrap();
        assert_eq!(project, Project::new("abc123", "Acme", "us"));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/projects/abc123 HTTP/1.1"));
        assert!(
            request
                .to_lowercase()
                .contains("authorization: bearer secret-token")
        );
    }

    #[tokio::test]
    async fn test_missing_environment_is_none() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(serve_once(listener, "404 Not Found", "{}"));

        let client = RestApiClient::new(base, None);
        let env = client
            .get_environment(&Project::new("abc123", "Acme", "us"), "feature-y")
            .await
            .unwrap();
        assert!(env.is_none());
        assert!(
            server
                .await
                .unwrap()
                .starts_with("GET /projects/abc123/environments/feature-y")
        );
    }
}
