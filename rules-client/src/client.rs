use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::json;
use tracing::debug;

use crate::auth::TokenSource;
use crate::error::{normalize_failure, Result};
use crate::models::{
    latest_matching_ruleset, qualify_ruleset_name, release_name, CreateRulesetResponse,
    GetRulesetResponse, ListReleasesResponse, PageOfRulesets, Release, RulesetFile,
};

/// Client for the rules service REST surface. Holds no state beyond the
/// connection details; every operation is a single request, so the
/// client is safe to clone and call concurrently.
#[derive(Clone)]
pub struct RulesClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl RulesClient {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Every release in the project, as the service returns them.
    pub async fn list_releases(&self, project_id: &str) -> Result<Vec<Release>> {
        let url = format!("{}/v1/projects/{}/releases", self.base_url, project_id);
        debug!(project_id, "listing releases");
        let response = self.send(self.http.get(&url)).await?;
        let body: ListReleasesResponse = response.json().await?;
        Ok(body.releases)
    }

    /// Name of the ruleset bound to the most recent release for
    /// `service` (e.g. `cloud.firestore`). `None` means the service has
    /// never had a release in this project.
    pub async fn get_latest_ruleset_name(
        &self,
        project_id: &str,
        service: &str,
    ) -> Result<Option<String>> {
        let releases = self.list_releases(project_id).await?;
        let prefix = release_name(project_id, service);
        Ok(latest_matching_ruleset(releases, &prefix))
    }

    /// Source files of a named ruleset, in the order the service stores
    /// them. `name` is the full resource name assigned on creation.
    pub async fn get_ruleset_content(&self, name: &str) -> Result<Vec<RulesetFile>> {
        let url = format!("{}/v1/{}", self.base_url, name);
        debug!(name, "fetching ruleset content");
        let response = self.send(self.http.get(&url)).await?;
        let body: GetRulesetResponse = response.json().await?;
        Ok(body.source.files)
    }

    /// One page of the ruleset listing. The caller drives pagination by
    /// resubmitting the returned `next_page_token`.
    pub async fn list_rulesets(
        &self,
        project_id: &str,
        page_token: Option<&str>,
    ) -> Result<PageOfRulesets> {
        let url = format!("{}/v1/projects/{}/rulesets", self.base_url, project_id);
        let mut request = self.http.get(&url);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// Follows `nextPageToken` until the listing is exhausted and
    /// concatenates the pages.
    pub async fn list_all_rulesets(&self, project_id: &str) -> Result<Vec<serde_json::Value>> {
        let mut rulesets = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_rulesets(project_id, page_token.as_deref()).await?;
            rulesets.extend(page.rulesets);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(rulesets),
            }
        }
    }

    /// Creates a ruleset from `files` and returns its service-assigned
    /// name.
    pub async fn create_ruleset(
        &self,
        project_id: &str,
        files: &[RulesetFile],
    ) -> Result<String> {
        let url = format!("{}/v1/projects/{}/rulesets", self.base_url, project_id);
        let payload = json!({ "source": { "files": files } });
        debug!(project_id, count = files.len(), "creating ruleset");
        let response = self.send(self.http.post(&url).json(&payload)).await?;
        let body: CreateRulesetResponse = response.json().await?;
        Ok(body.name)
    }

    /// Deletes a ruleset by bare id or full resource name.
    pub async fn delete_ruleset(&self, project_id: &str, name: &str) -> Result<()> {
        let full_name = qualify_ruleset_name(project_id, name);
        let url = format!("{}/v1/{}", self.base_url, full_name);
        debug!(name = %full_name, "deleting ruleset");
        self.send(self.http.delete(&url)).await?;
        Ok(())
    }

    /// Binds a new release to `ruleset_name`. The service rejects
    /// duplicate release names; nothing is checked locally.
    pub async fn create_release(
        &self,
        project_id: &str,
        ruleset_name: &str,
        release_id: &str,
    ) -> Result<Release> {
        let url = format!("{}/v1/projects/{}/releases", self.base_url, project_id);
        let payload = json!({
            "name": release_name(project_id, release_id),
            "rulesetName": ruleset_name,
        });
        debug!(release_id, ruleset_name, "creating release");
        let response = self.send(self.http.post(&url).json(&payload)).await?;
        Ok(response.json().await?)
    }

    /// Repoints an existing release at `ruleset_name`. The service
    /// rejects unknown releases; nothing is checked locally.
    pub async fn update_release(
        &self,
        project_id: &str,
        ruleset_name: &str,
        release_id: &str,
    ) -> Result<Release> {
        let url = format!(
            "{}/v1/projects/{}/releases/{}",
            self.base_url, project_id, release_id
        );
        let payload = json!({
            "release": {
                "name": release_name(project_id, release_id),
                "rulesetName": ruleset_name,
            }
        });
        debug!(release_id, ruleset_name, "updating release");
        let response = self.send(self.http.patch(&url).json(&payload)).await?;
        Ok(response.json().await?)
    }

    /// Update first, create on failure. The fallback fires on any update
    /// failure, not just a missing release, so a create error can stand
    /// in for the update's.
    pub async fn update_or_create_release(
        &self,
        project_id: &str,
        ruleset_name: &str,
        release_id: &str,
    ) -> Result<Release> {
        match self
            .update_release(project_id, ruleset_name, release_id)
            .await
        {
            Ok(release) => Ok(release),
            Err(err) => {
                debug!(release_id, %err, "update failed, creating release instead");
                self.create_release(project_id, ruleset_name, release_id).await
            }
        }
    }

    /// Dry-run validation of `files`. The result shape varies by rule
    /// language, so the body is returned as raw JSON for the caller to
    /// interpret.
    pub async fn test_ruleset(
        &self,
        project_id: &str,
        files: &[RulesetFile],
    ) -> Result<serde_json::Value> {
        let url = format!("{}/v1/projects/{}:test", self.base_url, project_id);
        let payload = json!({ "source": { "files": files } });
        debug!(project_id, count = files.len(), "testing ruleset");
        let response = self.send(self.http.post(&url).json(&payload)).await?;
        Ok(response.json().await?)
    }

    // Attaches the bearer token, sends, and normalizes any non-200
    // answer. Success is exclusively HTTP 200.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        if response.status() == StatusCode::OK {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(normalize_failure(status, &body))
    }
}
