use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rules_client::{RulesClient, RulesetFile, StaticToken};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rules-cli", about = "Manage rulesets and releases on the rules service")]
struct Cli {
    /// Base URL of the rules service (falls back to RULES_API_URL).
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token for the service (falls back to RULES_API_TOKEN).
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lists every release in the project.
    Releases {
        #[arg(long)]
        project: String,
    },
    /// Shows the ruleset behind the most recent release for a service.
    Latest {
        #[arg(long)]
        project: String,
        /// Service identifier, e.g. cloud.firestore.
        #[arg(long)]
        service: String,
    },
    /// Lists rulesets, one page at a time or all pages at once.
    Rulesets {
        #[arg(long)]
        project: String,
        #[arg(long)]
        page_token: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// Prints the source files of a ruleset.
    Show {
        /// Full resource name, e.g. projects/demo/rulesets/abc123.
        name: String,
    },
    /// Uploads rule files and points a release at the new ruleset.
    Deploy {
        #[arg(long)]
        project: String,
        /// Release identifier, e.g. cloud.firestore.
        #[arg(long)]
        release: String,
        /// Rule source files, in evaluation order.
        files: Vec<PathBuf>,
    },
    /// Dry-run validation of rule files.
    Test {
        #[arg(long)]
        project: String,
        files: Vec<PathBuf>,
    },
    /// Deletes a ruleset by bare id or full resource name.
    Delete {
        #[arg(long)]
        project: String,
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = build_client(&cli)?;

    match cli.command {
        Commands::Releases { project } => {
            let releases = client.list_releases(&project).await?;
            if releases.is_empty() {
                println!("No releases in project '{}'.", project);
            }
            for release in releases {
                let updated = release
                    .update_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".into());
                println!("{}  ->  {}  (updated {})", release.name, release.ruleset_name, updated);
            }
        }
        Commands::Latest { project, service } => {
            match client.get_latest_ruleset_name(&project, &service).await? {
                Some(name) => println!("{}", name),
                None => println!("Service '{}' has no releases in project '{}'.", service, project),
            }
        }
        Commands::Rulesets { project, page_token, all } => {
            if all {
                let rulesets = client.list_all_rulesets(&project).await?;
                println!("{}", serde_json::to_string_pretty(&rulesets)?);
            } else {
                let page = client.list_rulesets(&project, page_token.as_deref()).await?;
                println!("{}", serde_json::to_string_pretty(&page)?);
            }
        }
        Commands::Show { name } => {
            for file in client.get_ruleset_content(&name).await? {
                println!("--- {} ---\n{}", file.name, file.content);
            }
        }
        Commands::Deploy { project, release, files } => {
            if files.is_empty() {
                bail!("deploy needs at least one rule file");
            }
            let sources = load_rule_files(&files)?;
            let ruleset_name = client.create_ruleset(&project, &sources).await?;
            let bound = client
                .update_or_create_release(&project, &ruleset_name, &release)
                .await?;
            println!("✅ Release '{}' now serves ruleset '{}'", bound.name, ruleset_name);
        }
        Commands::Test { project, files } => {
            if files.is_empty() {
                bail!("test needs at least one rule file");
            }
            let sources = load_rule_files(&files)?;
            let result = client.test_ruleset(&project, &sources).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Delete { project, name } => {
            client.delete_ruleset(&project, &name).await?;
            println!("✅ Deleted ruleset '{}'", name);
        }
    }

    Ok(())
}

fn build_client(cli: &Cli) -> Result<RulesClient> {
    let api_url = resolve(&cli.api_url, "RULES_API_URL")
        .context("no API URL: pass --api-url or set RULES_API_URL")?;
    let token = resolve(&cli.token, "RULES_API_TOKEN")
        .context("no bearer token: pass --token or set RULES_API_TOKEN")?;
    Ok(RulesClient::new(&api_url, Arc::new(StaticToken(token))))
}

fn resolve(flag: &Option<String>, var: &str) -> Option<String> {
    flag.clone().or_else(|| env::var(var).ok())
}

fn load_rule_files(paths: &[PathBuf]) -> Result<Vec<RulesetFile>> {
    paths.iter().map(|path| load_rule_file(path)).collect()
}

fn load_rule_file(path: &Path) -> Result<RulesetFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read rule file '{}'", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    Ok(RulesetFile { name, content })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_the_flag_over_the_environment() {
        env::set_var("RULES_CLI_TEST_VAR", "from-env");
        assert_eq!(
            resolve(&Some("from-flag".into()), "RULES_CLI_TEST_VAR").as_deref(),
            Some("from-flag")
        );
        assert_eq!(
            resolve(&None, "RULES_CLI_TEST_VAR").as_deref(),
            Some("from-env")
        );
        env::remove_var("RULES_CLI_TEST_VAR");
        assert_eq!(resolve(&None, "RULES_CLI_TEST_VAR"), None);
    }

    #[test]
    fn rule_files_keep_their_file_name() {
        let dir = env::temp_dir().join("rules-cli-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("firestore.rules");
        fs::write(&path, "service cloud.firestore {}").unwrap();

        let file = load_rule_file(&path).unwrap();
        assert_eq!(file.name, "firestore.rules");
        assert_eq!(file.content, "service cloud.firestore {}");

        fs::remove_file(&path).unwrap();
    }
}
