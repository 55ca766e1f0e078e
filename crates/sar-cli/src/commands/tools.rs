//! `sar tools` command.

use anyhow::Result;
use clap::Args;
use sar_agent::CommandRegistry;

use crate::output::print_json;

#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Pretty-print the JSON
    #[arg(long)]
    pub pretty: bool,
}

pub fn cmd_tools(args: &ToolsArgs) -> Result<()> {
    let definitions = CommandRegistry::standard().tool_definitions();
    print_json(&serde_json::to_value(definitions)?, args.pretty)
}
