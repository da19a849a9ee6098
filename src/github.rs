use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::comment::ReviewComment;
use crate::core::prompt::PrDetails;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("invalid repository spec (expected owner/name): {0}")]
    InvalidRepo(String),

    #[error("GitHub token not found; set GITHUB_TOKEN")]
    MissingToken,
}

#[derive(Debug, Clone)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(spec: &str) -> Result<Self, GithubError> {
        match spec.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(GithubError::InvalidRepo(spec.to_string())),
        }
    }
}

/// Thin REST client for the three calls the reviewer makes: PR metadata,
/// raw diff, and review posting. Constructed once and passed by reference.
pub struct GithubClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

#[derive(Deserialize)]
struct PullMetadata {
    title: Option<String>,
    body: Option<String>,
}

#[derive(Serialize)]
struct ReviewRequest<'a> {
    body: &'a str,
    event: &'a str,
    comments: &'a [ReviewComment],
}

impl GithubClient {
    pub fn new(token: Option<String>) -> Result<Self, GithubError> {
        let token = token
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .ok_or(GithubError::MissingToken)?;
        Ok(Self {
            client: reqwest::Client::new(),
            token,
            base_url: "https://api.github.com".to_string(),
        })
    }

    #[cfg(test)]
    fn with_base_url(token: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.to_string(),
            base_url: base_url.to_string(),
        }
    }

    fn pull_url(&self, repo: &RepoRef, number: u64) -> String {
        format!(
            "{}/repos/{}/{}/pulls/{}",
            self.base_url, repo.owner, repo.name, number
        )
    }

    #[instrument(skip(self), fields(owner = %repo.owner, repo = %repo.name, pr = number))]
    pub async fn fetch_pr_details(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<PrDetails, GithubError> {
        debug!("fetching PR metadata");
        let metadata: PullMetadata = self
            .client
            .get(self.pull_url(repo, number))
            .header("User-Agent", "reviewbot")
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(PrDetails {
            title: metadata.title.unwrap_or_default(),
            description: metadata.body.unwrap_or_default(),
        })
    }

    #[instrument(skip(self), fields(owner = %repo.owner, repo = %repo.name, pr = number))]
    pub async fn fetch_diff(&self, repo: &RepoRef, number: u64) -> Result<String, GithubError> {
        debug!("fetching PR diff");
        let diff = self
            .client
            .get(self.pull_url(repo, number))
            .header("User-Agent", "reviewbot")
            .header("Accept", "application/vnd.github.diff")
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(diff_bytes = diff.len(), "received PR diff");
        Ok(diff)
    }

    /// Submits all comments as one batched, comment-only review.
    #[instrument(skip(self, comments), fields(owner = %repo.owner, repo = %repo.name, pr = number, count = comments.len()))]
    pub async fn post_review(
        &self,
        repo: &RepoRef,
        number: u64,
        comments: &[ReviewComment],
    ) -> Result<(), GithubError> {
        let request = ReviewRequest {
            body: "reviewbot automated review",
            event: "COMMENT",
            comments,
        };
        self.client
            .post(format!("{}/reviews", self.pull_url(repo, number)))
            .header("User-Agent", "reviewbot")
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        debug!("review posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repo_spec() {
        let repo = RepoRef::parse("rust-lang/cargo").unwrap();
        assert_eq!(repo.owner, "rust-lang");
        assert_eq!(repo.name, "cargo");
    }

    #[test]
    fn rejects_malformed_repo_spec() {
        assert!(RepoRef::parse("nodash").is_err());
        assert!(RepoRef::parse("/name").is_err());
        assert!(RepoRef::parse("owner/").is_err());
    }

    #[tokio::test]
    async fn posts_batched_review() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/o/r/pulls/5/reviews")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "event": "COMMENT",
                "comments": [{"path": "src/lib.rs", "position": 1, "body": "check"}]
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = GithubClient::with_base_url("t", &server.url());
        let repo = RepoRef::parse("o/r").unwrap();
        let comments = vec![ReviewComment {
            path: "src/lib.rs".to_string(),
            position: 1,
            body: "check".to_string(),
        }];
        client.post_review(&repo, 5, &comments).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetches_pr_details() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/pulls/7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"title": "Fix parser", "body": "handles empty hunks"}"#)
            .create_async()
            .await;

        let client = GithubClient::with_base_url("t", &server.url());
        let repo = RepoRef::parse("o/r").unwrap();
        let details = client.fetch_pr_details(&repo, 7).await.unwrap();
        assert_eq!(details.title, "Fix parser");
        assert_eq!(details.description, "handles empty hunks");
    }
}
