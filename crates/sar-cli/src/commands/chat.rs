//! `sar chat` interactive loop.

use anyhow::{Context, Result};
use sar_agent::ChatSession;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::opts::AssistantOpts;
use crate::output::describe_map;
use crate::util::Rig;

use super::run_turn;

const HELP: &str = "Commands: /map shows the map, /reset clears the conversation, /quit exits.";

pub async fn cmd_chat(opts: &AssistantOpts) -> Result<()> {
    let config = opts.assistant_config()?;
    let client = opts.llm_client()?;
    let rig = Rig::new(config.unknown_command_policy);
    eprintln!("SAR assistant ({}). {HELP}", config.model);
    let mut session = ChatSession::new(client, rig.dispatcher.clone(), config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await.context("read stdin")? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => {
                eprintln!("{HELP}");
                continue;
            }
            "/map" => {
                println!("[map] {}", describe_map(&rig.map.state()));
                continue;
            }
            "/reset" => {
                session.reset();
                eprintln!("conversation cleared");
                continue;
            }
            _ => {}
        }

        let scrolls_before = rig.page.scroll_history().len();
        match run_turn(&mut session, line).await {
            Ok(outcome) => {
                if !outcome.tool_results.is_empty() {
                    println!("[map] {}", describe_map(&rig.map.state()));
                }
            }
            // A failed turn leaves the session usable.
            Err(error) => eprintln!("error: {error:#}"),
        }
        for section in rig.page.scroll_history().iter().skip(scrolls_before) {
            println!("[page] scrolled to {section}");
        }
    }

    Ok(())
}
