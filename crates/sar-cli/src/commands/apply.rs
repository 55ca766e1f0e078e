//! `sar apply` command: run one map command without a model.

use anyhow::{Context, Result};
use clap::Args;
use sar_agent::ToolInvocation;
use serde_json::{Value, json};
use tracing::debug;

use crate::opts::AssistantOpts;
use crate::output::print_json;
use crate::util::Rig;

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Command name (e.g., focusMapOn)
    pub name: String,

    /// Arguments as a JSON object
    #[arg(default_value = "{}")]
    pub args: String,

    /// Pretty-print the JSON
    #[arg(long)]
    pub pretty: bool,
}

pub fn cmd_apply(opts: &AssistantOpts, args: &ApplyArgs) -> Result<()> {
    let arguments: Value = serde_json::from_str(&args.args).context("parse command arguments")?;
    let policy = opts.assistant_config()?.unknown_command_policy;
    let rig = Rig::new(policy);
    debug!(command = %args.name, %policy, "applying map command");

    let result = rig
        .dispatcher
        .dispatch(&ToolInvocation::new("cli", args.name.clone(), arguments));
    let output = json!({
        "result": result,
        "map": rig.map.state(),
        "section": rig.page.current_section(),
    });
    print_json(&output, args.pretty)
}
