//! Postforge CLI - research a topic, write a post and illustrate it.
//!
//! Provides the `postforge` command, a thin front end over
//! [`postforge_orchestrator::Orchestrator`].

mod commands;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Target platform for the generated post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Twitter,
    #[value(name = "linkedin")]
    LinkedIn,
    Facebook,
    Instagram,
    Blog,
}

impl PlatformArg {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::LinkedIn => "linkedin",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Blog => "blog",
        }
    }
}

/// Voice of the generated post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToneArg {
    Informative,
    Persuasive,
    Casual,
    Professional,
    Enthusiastic,
}

impl ToneArg {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Informative => "informative",
            Self::Persuasive => "persuasive",
            Self::Casual => "casual",
            Self::Professional => "professional",
            Self::Enthusiastic => "enthusiastic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Postforge CLI - research-backed social media posts
///
/// Gathers facts about each topic, writes a platform-sized post from the most
/// relevant ones and generates an accompanying image.
#[derive(Parser, Debug)]
#[command(
    name = "postforge",
    author,
    version,
    about = "Postforge - research-backed social media posts",
    long_about = "Postforge researches a topic, writes a post sized for the target platform and generates an image for it.\nSeveral topics run as a batch."
)]
pub struct Args {
    /// Topics to write about
    #[arg(required = true)]
    pub topics: Vec<String>,

    /// Target platform
    #[arg(short, long, value_enum, default_value_t = PlatformArg::Twitter)]
    pub platform: PlatformArg,

    /// Tone of voice
    #[arg(short, long, value_enum, default_value_t = ToneArg::Informative)]
    pub tone: ToneArg,

    /// Number of facts to use (1-10)
    #[arg(long, default_value_t = 5)]
    pub max_facts: usize,

    /// Length hint in characters (50-2000), capped by the platform limit
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Skip image generation
    #[arg(long, conflicts_with = "require_image")]
    pub no_image: bool,

    /// Fail the run when the image cannot be generated
    #[arg(long)]
    pub require_image: bool,

    /// Do not ask for hashtags
    #[arg(long)]
    pub no_hashtags: bool,

    /// Call to action to include in the post
    #[arg(long)]
    pub call_to_action: Option<String>,

    /// Write results as pretty JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print results as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// OpenAI API key (overrides config and OPENAI_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Configuration file (defaults to ~/.postforge/config.toml then ./postforge.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum workflows running at once
    #[arg(long, default_value_t = 2)]
    pub concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Installs the global subscriber. `RUST_LOG` wins over `--log-level`.
fn init_tracing(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Before the subscriber, so RUST_LOG from .env applies.
    let dotenv = dotenvy::dotenv();
    init_tracing(&args.log_level, args.log_format)?;

    // A missing .env file is fine.
    if let Err(e) = dotenv
        && !e.not_found()
    {
        tracing::warn!(error = %e, "Could not load .env file");
    }

    commands::generate::execute(args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["postforge", "solar power"]).unwrap();
        assert_eq!(args.topics, vec!["solar power".to_string()]);
        assert_eq!(args.platform, PlatformArg::Twitter);
        assert_eq!(args.tone, ToneArg::Informative);
        assert_eq!(args.max_facts, 5);
        assert_eq!(args.concurrency, 2);
        assert!(!args.no_image);
    }

    #[test]
    fn test_value_enums_parse() {
        let args =
            Args::try_parse_from(["postforge", "a", "--platform", "linkedin", "--tone", "casual"])
                .unwrap();
        assert_eq!(args.platform.as_str(), "linkedin");
        assert_eq!(args.tone.as_str(), "casual");

        assert!(Args::try_parse_from(["postforge", "a", "--platform", "myspace"]).is_err());
        assert!(Args::try_parse_from(["postforge", "a", "--no-image", "--require-image"]).is_err());
        assert!(Args::try_parse_from(["postforge"]).is_err());
    }
}
