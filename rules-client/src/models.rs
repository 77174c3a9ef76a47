use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Wire types matching the JSON surface of the rules service.

/// One source file inside a ruleset. Serialized into request bodies
/// verbatim; the service never rewrites contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetFile {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetSource {
    pub files: Vec<RulesetFile>,
}

/// A mutable binding from a release name to a ruleset version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    #[serde(rename = "rulesetName")]
    pub ruleset_name: String,
    #[serde(rename = "createTime", skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(rename = "updateTime", skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

/// One page of a ruleset listing. Entries are opaque JSON objects and
/// are returned exactly as the service sent them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageOfRulesets {
    #[serde(default)]
    pub rulesets: Vec<serde_json::Value>,
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

// The service omits empty arrays, so `releases` defaults to empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ListReleasesResponse {
    #[serde(default)]
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GetRulesetResponse {
    pub source: RulesetSource,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateRulesetResponse {
    pub name: String,
}

/// Full resource name of a release, e.g.
/// `projects/my-project/releases/cloud.firestore`.
pub fn release_name(project_id: &str, release_id: &str) -> String {
    format!("projects/{}/releases/{}", project_id, release_id)
}

/// Qualifies a bare ruleset id into its full resource name. Names that
/// are already qualified pass through unchanged.
pub fn qualify_ruleset_name(project_id: &str, name: &str) -> String {
    if name.starts_with("projects/") {
        name.to_string()
    } else {
        format!("projects/{}/rulesets/{}", project_id, name)
    }
}

/// Ruleset name of the most recently updated release whose name starts
/// with `prefix`. Releases without an update time sort last.
pub fn latest_matching_ruleset(mut releases: Vec<Release>, prefix: &str) -> Option<String> {
    releases.sort_by(|a, b| b.update_time.cmp(&a.update_time));
    releases
        .into_iter()
        .find(|release| release.name.starts_with(prefix))
        .map(|release| release.ruleset_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(name: &str, ruleset: &str, updated: Option<&str>) -> Release {
        Release {
            name: name.to_string(),
            ruleset_name: ruleset.to_string(),
            create_time: None,
            update_time: updated.map(|t| t.parse().unwrap()),
        }
    }

    #[test]
    fn release_name_uses_fixed_format() {
        assert_eq!(
            release_name("demo", "cloud.firestore"),
            "projects/demo/releases/cloud.firestore"
        );
    }

    #[test]
    fn qualify_ruleset_name_leaves_full_names_alone() {
        assert_eq!(
            qualify_ruleset_name("demo", "projects/demo/rulesets/abc"),
            "projects/demo/rulesets/abc"
        );
        assert_eq!(
            qualify_ruleset_name("demo", "abc"),
            "projects/demo/rulesets/abc"
        );
    }

    #[test]
    fn latest_matching_picks_most_recent_update() {
        let releases = vec![
            release(
                "projects/demo/releases/cloud.firestore",
                "rulesets/A",
                Some("2025-03-01T00:00:00Z"),
            ),
            release(
                "projects/demo/releases/cloud.firestore",
                "rulesets/B",
                Some("2025-04-01T00:00:00Z"),
            ),
        ];
        let found =
            latest_matching_ruleset(releases, "projects/demo/releases/cloud.firestore");
        assert_eq!(found.as_deref(), Some("rulesets/B"));
    }

    #[test]
    fn latest_matching_returns_none_for_empty_list() {
        assert_eq!(
            latest_matching_ruleset(vec![], "projects/demo/releases/cloud.firestore"),
            None
        );
    }

    #[test]
    fn latest_matching_returns_none_without_prefix_match() {
        let releases = vec![release(
            "projects/demo/releases/cloud.storage",
            "rulesets/A",
            Some("2025-03-01T00:00:00Z"),
        )];
        assert_eq!(
            latest_matching_ruleset(releases, "projects/demo/releases/cloud.firestore"),
            None
        );
    }

    #[test]
    fn latest_matching_sorts_missing_timestamps_last() {
        let releases = vec![
            release("projects/demo/releases/cloud.firestore", "rulesets/old", None),
            release(
                "projects/demo/releases/cloud.firestore",
                "rulesets/new",
                Some("2025-01-01T00:00:00Z"),
            ),
        ];
        let found =
            latest_matching_ruleset(releases, "projects/demo/releases/cloud.firestore");
        assert_eq!(found.as_deref(), Some("rulesets/new"));
    }
}
