//! `sar ask` command.

use anyhow::Result;
use clap::Args;
use sar_agent::ChatSession;
use tracing::info;

use crate::opts::AssistantOpts;
use crate::output::describe_map;
use crate::util::Rig;

use super::run_turn;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question for the assistant
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,
}

pub async fn cmd_ask(opts: &AssistantOpts, args: &AskArgs) -> Result<()> {
    let config = opts.assistant_config()?;
    let client = opts.llm_client()?;
    let rig = Rig::new(config.unknown_command_policy);
    let mut session = ChatSession::new(client, rig.dispatcher.clone(), config);

    let prompt = args.prompt.join(" ");
    let outcome = run_turn(&mut session, &prompt).await?;
    info!(finish = ?outcome.finish, steps = outcome.steps, "answered");
    println!("[map] {}", describe_map(&rig.map.state()));
    if let Some(section) = rig.page.current_section() {
        println!("[page] {section}");
    }
    Ok(())
}
