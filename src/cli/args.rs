use crate::ui::Category;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meetsync")]
#[command(about = "Process finished meeting recordings into your knowledge base", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub run: RunCliArgs,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(ClapArgs, Debug, Default)]
pub struct RunCliArgs {
    /// Single file or recording folder to process, bypassing the scan
    pub file: Option<PathBuf>,

    /// Context for the processor (participant names, jargon, ...)
    #[arg(long)]
    pub context: Option<String>,

    /// Content category applied to every item this run
    #[arg(long, value_enum)]
    pub category: Option<Category>,

    /// Run the processor's own batch import mode instead of scanning
    #[arg(long)]
    pub scan_imports: bool,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Inspect or edit the set of already-processed recordings
    State(StateCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct StateCliArgs {
    #[command(subcommand)]
    pub command: StateCommand,
}

#[derive(Subcommand, Debug)]
pub enum StateCommand {
    /// List every processed identifier
    List,
    /// Remove one identifier so the item is picked up again
    Forget {
        /// Identifier exactly as shown by `state list`
        path: PathBuf,
    },
    /// Drop the whole processed set
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
}
