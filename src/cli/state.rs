//! CLI handler for the processed-set state commands.

use crate::cli::{StateCliArgs, StateCommand};
use crate::global;
use crate::state::ProcessedSetStore;
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::io::{self, IsTerminal};

pub fn handle_state_command(args: StateCliArgs) -> Result<()> {
    let path = global::state_file()?;
    let mut store = ProcessedSetStore::load(path.clone());

    match args.command {
        StateCommand::List => {
            println!("Processed recordings: {} (from {})", store.len(), path.display());
            for entry in store.entries() {
                println!("  {}", entry);
            }
        }
        StateCommand::Forget { path: id } => {
            if store.forget(&id)? {
                println!("Forgot {} — it will be picked up on the next scan.", id.display());
            } else {
                println!("Not in the processed set: {}", id.display());
            }
        }
        StateCommand::Clear { force } => {
            if store.is_empty() {
                println!("Processed set is already empty.");
                return Ok(());
            }
            if !force {
                if !io::stdin().is_terminal() {
                    println!("Non-interactive session. Use --force to clear without confirmation.");
                    return Ok(());
                }
                let proceed = Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt(format!(
                        "Forget all {} processed recordings? They will be reprocessed.",
                        store.len()
                    ))
                    .default(false)
                    .interact()?;
                if !proceed {
                    println!("Clear cancelled.");
                    return Ok(());
                }
            }
            store.clear()?;
            println!("Processed set cleared.");
        }
    }

    Ok(())
}
