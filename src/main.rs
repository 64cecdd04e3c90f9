mod backends;
mod catalog;
mod chat;
mod cli;
mod config;
mod dispatch;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use backends::backends::BackendId;
use backends::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use cli::{chat::chat_cmd, list::list_cmd, ColorMode};
use utils::errors::configure_color;

#[derive(Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "modelmux")]
#[command(about = "A multi-backend dispatcher for chat models", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt to a model and print the reply
    Chat(ChatArgs),
    /// List the configured catalog
    List(ListArgs),
}

#[derive(Parser)]
pub(crate) struct ChatArgs {
    /// The model identifier to dispatch to
    #[arg(short, long)]
    pub model: String,
    /// Cap on the number of generated tokens
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
    /// Sampling temperature
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f64,
    /// A system message prepended to the conversation
    #[arg(short, long)]
    pub system: Option<String>,
    /// The prompt; read from stdin when omitted
    pub prompt: Option<String>,
}

/// Possible listings
#[derive(Subcommand)]
pub(crate) enum ListObject {
    /// Cataloged models
    Models(ListModelArgs),
    /// Backends
    Backends,
}

/// Output formats
#[derive(ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Parser)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    pub format: ListingFormat,
    /// List the specified object
    #[command(subcommand)]
    pub object: ListObject,
}

#[derive(Parser, Default)]
pub(crate) struct ListModelArgs {
    /// Limit the listing to the specified backend
    #[arg(short, long)]
    pub backend: Option<BackendId>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let color = ColorMode::resolve_auto(cli.color);
    configure_color(color);

    match &cli.command {
        Commands::Chat(args) => chat_cmd(args).await,
        Commands::List(args) => list_cmd(args).await,
    }
}
