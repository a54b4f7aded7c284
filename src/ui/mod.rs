//! Presentation boundary.
//!
//! The workflow only talks to a [`Presenter`]; the terminal
//! implementation lives here, and tests script their own. All output
//! delivery happens on the controller's loop, so implementations never
//! see interleaved calls.

use crate::scan::PendingItem;
use crate::workflow::RunSummary;
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use std::io::{self, IsTerminal, Write};

/// Content category passed to the external processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Category {
    /// Structured meeting notes (decisions, action items, timeline).
    #[default]
    Meeting,
    /// General talk/essay/documentary summary.
    Summary,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meeting => "meeting",
            Self::Summary => "summary",
        }
    }
}

/// Per-item configuration collected before a run.
#[derive(Debug, Clone, Default)]
pub struct ItemConfig {
    pub category: Category,
    /// Free-text hint (participants, jargon) for the processor.
    pub free_text: String,
}

impl ItemConfig {
    /// Serialize into the single `--context` string the external
    /// command understands.
    pub fn context_string(&self) -> String {
        let text = self.free_text.trim();
        if text.is_empty() {
            format!("type={}", self.category.as_str())
        } else {
            format!("type={}; {}", self.category.as_str(), text)
        }
    }
}

/// What the user decided for one queued item.
#[derive(Debug, Clone)]
pub enum ItemDecision {
    Process(ItemConfig),
    /// Leave the item unprocessed; it reappears on the next scan.
    Skip,
    /// Stop the whole workflow.
    Cancel,
}

pub trait Presenter: Send {
    fn show_status(&self, text: &str);
    /// Raw output chunk from the in-flight processor. Not line-aligned.
    fn append_output(&self, chunk: &str);
    fn request_item_config(&mut self, item: &PendingItem) -> Result<ItemDecision>;
    fn report_done(&self, summary: &RunSummary);
}

/// Interactive terminal presenter built on dialoguer.
pub struct TerminalPresenter {
    theme: ColorfulTheme,
    /// Set from CLI flags; when present, every item uses it without
    /// prompting.
    preset: Option<ItemConfig>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
            preset: None,
        }
    }

    pub fn with_preset(preset: ItemConfig) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            preset: Some(preset),
        }
    }

    fn print_item_header(&self, item: &PendingItem) {
        println!();
        println!("{}", "=".repeat(60));
        println!("Next: {} ({})", item.display_name, item.kind.as_str());
        if let Some(discovered_at) = item.discovered_at {
            println!("Created: {}", discovered_at.format("%Y-%m-%d %H:%M"));
        }
        println!("Path: {}", item.source_path.display());
        println!("{}", "=".repeat(60));
    }
}

impl Default for TerminalPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for TerminalPresenter {
    fn show_status(&self, text: &str) {
        println!("{}", text);
    }

    fn append_output(&self, chunk: &str) {
        print!("{}", chunk);
        let _ = io::stdout().flush();
    }

    fn request_item_config(&mut self, item: &PendingItem) -> Result<ItemDecision> {
        self.print_item_header(item);

        if let Some(preset) = &self.preset {
            return Ok(ItemDecision::Process(preset.clone()));
        }

        if !io::stdin().is_terminal() {
            // Non-interactive session: process everything with defaults.
            return Ok(ItemDecision::Process(ItemConfig::default()));
        }

        let options = [
            "Process as meeting notes",
            "Process as summary",
            "Skip this item",
            "Quit",
        ];
        let selection = Select::with_theme(&self.theme)
            .with_prompt("What would you like to do?")
            .items(&options)
            .default(0)
            .interact()?;

        let category = match selection {
            0 => Category::Meeting,
            1 => Category::Summary,
            2 => return Ok(ItemDecision::Skip),
            _ => return Ok(ItemDecision::Cancel),
        };

        let free_text: String = Input::with_theme(&self.theme)
            .with_prompt("Context (participants, jargon; empty for none)")
            .allow_empty(true)
            .interact_text()?;

        Ok(ItemDecision::Process(ItemConfig {
            category,
            free_text: free_text.trim().to_string(),
        }))
    }

    fn report_done(&self, summary: &RunSummary) {
        println!();
        println!("{}", "=".repeat(60));
        if summary.total() == 0 && !summary.cancelled {
            println!("No new recordings to process");
        } else {
            println!(
                "Processed {} | failed {} | skipped {}{}",
                summary.processed,
                summary.failed,
                summary.skipped,
                if summary.cancelled { " | cancelled" } else { "" },
            );
        }
        println!("{}", "=".repeat(60));
    }
}
