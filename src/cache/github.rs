/*!
 * Minimal GitHub REST client for the cache branch.
 *
 * Covers branch lookup, lazy branch creation through the git data API
 * (blob, tree, parentless commit, ref), zipball download, ref updates and
 * single-file uploads through the contents API.
 */

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

use crate::errors::CacheError;

const USER_AGENT: &str = concat!("sitelingo/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: ShaResponse,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: String,
}

/// A file read through the contents API
#[derive(Debug, Clone)]
pub struct RemoteFile {
    /// Blob SHA, required to overwrite the file
    pub sha: String,
    /// Decoded file content
    pub content: Vec<u8>,
}

/// Client for one repository
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubClient {
    /// Create a client for `owner/repo`
    pub fn new(
        api_base: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, self.owner, self.repo, path)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<reqwest::Response, CacheError> {
        debug!("GitHub {} {}", method, path);
        let mut request = self
            .client
            .request(method, self.url(path))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request
            .send()
            .await
            .map_err(|e| CacheError::Network(e.to_string()))
    }

    /// Send a request and fail on any non-success status
    async fn send_ok(&self, method: Method, path: &str, body: Option<Value>) -> Result<reqwest::Response, CacheError> {
        let response = self.send(method, path, body).await?;
        check_status(path, response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, CacheError> {
        self.send_ok(method, path, body)
            .await?
            .json::<T>()
            .await
            .map_err(|e| CacheError::Http {
                status: 200,
                endpoint: path.to_string(),
                message: format!("unexpected response body: {}", e),
            })
    }

    /// Whether `branch` exists; a 404 means it does not
    pub async fn branch_exists(&self, branch: &str) -> Result<bool, CacheError> {
        let path = format!("branches/{}", branch);
        let response = self.send(Method::GET, &path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(&path, response).await?;
        Ok(true)
    }

    /// Create `branch` pointing at a parentless commit holding a single `README.md`
    pub async fn create_orphan_branch(&self, branch: &str, readme: &str, message: &str) -> Result<String, CacheError> {
        let blob: ShaResponse = self
            .send_json(
                Method::POST,
                "git/blobs",
                Some(json!({ "content": readme, "encoding": "utf-8" })),
            )
            .await?;

        let tree: ShaResponse = self
            .send_json(
                Method::POST,
                "git/trees",
                Some(json!({
                    "tree": [{ "path": "README.md", "mode": "100644", "type": "blob", "sha": blob.sha }]
                })),
            )
            .await?;

        let commit: ShaResponse = self
            .send_json(
                Method::POST,
                "git/commits",
                Some(json!({ "message": message, "tree": tree.sha, "parents": [] })),
            )
            .await?;

        self.create_ref(branch, &commit.sha).await?;
        Ok(commit.sha)
    }

    /// Download the branch as a zip archive
    pub async fn download_zipball(&self, branch: &str) -> Result<Vec<u8>, CacheError> {
        let path = format!("zipball/{}", branch);
        let bytes = self
            .send_ok(Method::GET, &path, None)
            .await?
            .bytes()
            .await
            .map_err(|e| CacheError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Commit SHA a branch points at, `None` when it does not exist
    pub async fn get_ref(&self, branch: &str) -> Result<Option<String>, CacheError> {
        let path = format!("git/ref/heads/{}", branch);
        let response = self.send(Method::GET, &path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let reference: RefResponse = check_status(&path, response)
            .await?
            .json()
            .await
            .map_err(|e| CacheError::Network(e.to_string()))?;
        Ok(Some(reference.object.sha))
    }

    /// Create a branch ref
    pub async fn create_ref(&self, branch: &str, sha: &str) -> Result<(), CacheError> {
        self.send_ok(
            Method::POST,
            "git/refs",
            Some(json!({ "ref": format!("refs/heads/{}", branch), "sha": sha })),
        )
        .await?;
        Ok(())
    }

    /// Move a branch ref, optionally discarding its history
    pub async fn update_ref(&self, branch: &str, sha: &str, force: bool) -> Result<(), CacheError> {
        self.send_ok(
            Method::PATCH,
            &format!("git/refs/heads/{}", branch),
            Some(json!({ "sha": sha, "force": force })),
        )
        .await?;
        Ok(())
    }

    /// Delete a branch ref
    pub async fn delete_ref(&self, branch: &str) -> Result<(), CacheError> {
        self.send_ok(Method::DELETE, &format!("git/refs/heads/{}", branch), None)
            .await?;
        Ok(())
    }

    /// Read a file on `branch`, `None` when it does not exist
    pub async fn get_file(&self, path: &str, branch: &str) -> Result<Option<RemoteFile>, CacheError> {
        let endpoint = format!("contents/{}?ref={}", path, branch);
        let response = self.send(Method::GET, &endpoint, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let file: ContentResponse = check_status(&endpoint, response)
            .await?
            .json()
            .await
            .map_err(|e| CacheError::Network(e.to_string()))?;

        let encoded: String = file.content.chars().filter(|c| !c.is_whitespace()).collect();
        let content = BASE64.decode(encoded).map_err(|e| CacheError::Http {
            status: 200,
            endpoint,
            message: format!("invalid base64 content: {}", e),
        })?;
        Ok(Some(RemoteFile { sha: file.sha, content }))
    }

    /// Create or overwrite a file on `branch`
    pub async fn put_file(
        &self,
        path: &str,
        branch: &str,
        content: &[u8],
        message: &str,
        existing_sha: Option<&str>,
    ) -> Result<(), CacheError> {
        let mut body = json!({
            "message": message,
            "content": BASE64.encode(content),
            "branch": branch,
        });
        if let Some(sha) = existing_sha {
            body["sha"] = Value::String(sha.to_string());
        }
        self.send_ok(Method::PUT, &format!("contents/{}", path), Some(body))
            .await?;
        Ok(())
    }
}

async fn check_status(endpoint: &str, response: reqwest::Response) -> Result<reqwest::Response, CacheError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    Err(CacheError::Http {
        status: status.as_u16(),
        endpoint: endpoint.to_string(),
        message,
    })
}
