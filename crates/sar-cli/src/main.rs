mod commands;
mod opts;
mod output;
mod util;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::apply::ApplyArgs;
use commands::ask::AskArgs;
use commands::tools::ToolsArgs;
use opts::AssistantOpts;

#[derive(Parser, Debug)]
#[command(name = "sar", version, about = "SAR landslide-risk assistant")]
struct Cli {
    #[command(flatten)]
    opts: AssistantOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat; Ctrl-C cancels the running answer
    Chat,

    /// Ask a single question and print the answer and map state
    Ask(AskArgs),

    /// Print the map commands as tool definitions
    Tools(ToolsArgs),

    /// Dispatch one map command against a headless map
    Apply(ApplyArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so .env values reach clap and `AssistantConfig::from_env`.
    util::load_dotenv()?;
    util::init_tracing();

    let cli = Cli::parse();
    let opts = &cli.opts;

    match cli.command {
        Command::Chat => commands::chat::cmd_chat(opts).await,
        Command::Ask(args) => commands::ask::cmd_ask(opts, &args).await,
        Command::Tools(args) => commands::tools::cmd_tools(&args),
        Command::Apply(args) => commands::apply::cmd_apply(opts, &args),
    }
}
