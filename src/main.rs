mod adapters;
mod config;
mod core;
mod github;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::llm::{create_client, GenerationConfig};
use crate::core::prompt::{PromptBuilder, PromptConfig};
use crate::core::review::ReviewOrchestrator;
use crate::github::{GithubClient, RepoRef};

#[derive(Parser)]
#[command(name = "reviewbot")]
#[command(about = "LLM-powered pull request reviewer with position-anchored inline comments", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    model: Option<String>,

    #[arg(long, global = true)]
    temperature: Option<f32>,

    #[arg(long, global = true)]
    max_tokens: Option<usize>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Review a pull request and print or post the resulting comments
    Review {
        #[arg(long, help = "Repository as owner/name")]
        repo: String,

        #[arg(long, help = "Pull request number")]
        pr: u64,

        #[arg(long, value_name = "GLOB", help = "Exclude files matching this glob (repeatable)")]
        exclude: Vec<String>,

        #[arg(long, help = "Post the comments as a review instead of printing them")]
        post: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = config::Config::load().unwrap_or_default();
    config.merge_with_cli(cli.model, cli.temperature, cli.max_tokens, Vec::new());

    match cli.command {
        Commands::Review {
            repo,
            pr,
            exclude,
            post,
        } => {
            config.exclude.extend(exclude);
            review_command(config, &repo, pr, post).await?;
        }
    }

    Ok(())
}

async fn review_command(config: config::Config, repo: &str, pr: u64, post: bool) -> Result<()> {
    let repo = RepoRef::parse(repo)?;
    let github = GithubClient::new(config.github_token.clone())?;

    info!("Reviewing {}/{} #{} with model {}", repo.owner, repo.name, pr, config.model);

    let details = github.fetch_pr_details(&repo, pr).await?;
    let diff_text = github.fetch_diff(&repo, pr).await?;
    if diff_text.is_empty() {
        println!("No changes in PR");
        return Ok(());
    }

    let files = core::diff::parse_diff(&diff_text)?;
    info!("Parsed {} file diffs", files.len());

    let generation = GenerationConfig {
        model: config.model.clone(),
        api_key: config.api_key.clone(),
        base_url: config.base_url.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    let llm = create_client(&generation)?;

    let orchestrator = ReviewOrchestrator::new(
        llm.as_ref(),
        config.retry.policy(),
        PromptBuilder::new(PromptConfig::default()),
        config.exclude_patterns()?,
    );

    let comments = match orchestrator.run(&files, &details).await {
        Ok(comments) => comments,
        Err(quota) => {
            // Nothing is posted on quota exhaustion; partial output would be
            // misleading and retrying wastes the remaining allowance.
            anyhow::bail!(
                "{quota}. The run was aborted before posting anything; \
                 check the account's quota and billing status before retrying."
            );
        }
    };

    if comments.is_empty() {
        println!("No review comments produced");
        return Ok(());
    }

    if post {
        github.post_review(&repo, pr, &comments).await?;
        println!(
            "Posted {} comments to {}/{} #{}",
            comments.len(),
            repo.owner,
            repo.name,
            pr
        );
    } else {
        println!("{}", serde_json::to_string_pretty(&comments)?);
    }

    Ok(())
}
