use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

use crate::domain::types::ContentFormat;

/// Command-line arguments for the Escriba binary.
#[derive(Debug, Parser)]
#[command(name = "escriba", version, about = "Escriba content ingestion service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "ESCRIBA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the revalidation webhook.
    Serve(Box<ServeArgs>),
    /// Convert and sanitize a content file, printing the resulting HTML.
    Render(RenderArgs),
    /// Audit a content file and print the validation report as JSON.
    Validate(ValidateArgs),
    /// Print the slug generated for the given text.
    Slug(SlugArgs),
    /// Build SEO metadata for a post stored as JSON.
    Seo(SeoArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the downstream revalidation endpoint.
    #[arg(long = "revalidate-forward-url", value_name = "URL")]
    pub revalidate_forward_url: Option<String>,

    /// Override the rate limit window size.
    #[arg(long = "rate-limit-window-seconds", value_name = "SECONDS")]
    pub rate_limit_window_seconds: Option<u64>,

    /// Override the rate limit request ceiling.
    #[arg(long = "rate-limit-max-requests", value_name = "COUNT")]
    pub rate_limit_max_requests: Option<u64>,

    /// Override the number of callers tracked by the rate limiter.
    #[arg(long = "rate-limit-capacity", value_name = "COUNT")]
    pub rate_limit_capacity: Option<usize>,

    /// Key rate limits on forwarding headers set by a trusted proxy.
    #[arg(
        long = "rate-limit-trust-forwarded-headers",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub rate_limit_trust_forwarded_headers: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Markdown,
    Html,
}

impl From<FormatArg> for ContentFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Markdown => ContentFormat::Markdown,
            FormatArg::Html => ContentFormat::Html,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Content file to render.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// Skip detection and treat the input as this format.
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub format: Option<FormatArg>,
}

#[derive(Debug, Args, Clone)]
pub struct ValidateArgs {
    /// Content file to audit.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// Skip detection and treat the input as this format.
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub format: Option<FormatArg>,
}

#[derive(Debug, Args, Clone)]
pub struct SlugArgs {
    /// Title or phrase to turn into a slug.
    #[arg(value_name = "TEXT", required = true, num_args = 1..)]
    pub text: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SeoArgs {
    /// JSON file holding a post record.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// Print only the Schema.org JSON-LD document.
    #[arg(long = "json-ld")]
    pub json_ld: bool,
}
