use std::io::{stdout, Write};
use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::Result;
use crate::runtime::DashboardView;
use crate::simulation::SimulatorState;

#[derive(Parser)]
#[command(name = "decisify")]
#[command(author = "Decisify Team")]
#[command(version)]
#[command(about = "Live-data polling and simulation engine for the Decisify dashboard", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration directory
    #[arg(short, long, default_value = "config", global = true, env = "DECISIFY_CONFIG_DIR")]
    pub config: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the dashboard engine against the configured endpoint
    Run {
        /// Start in demo mode
        #[arg(long)]
        demo: bool,
        /// JSON file persisting human decisions (overrides storage.path)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Do not read keyboard shortcuts from the terminal
        #[arg(long)]
        no_keys: bool,
    },
    /// Serve fabricated snapshots over HTTP
    Serve {
        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print one fabricated snapshot
    Snapshot {
        /// Pretty-print the JSON document
        #[arg(long)]
        pretty: bool,
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// Keeps the terminal in raw mode for as long as it lives
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Render one fabricated snapshot as JSON
pub fn render_snapshot(pretty: bool, seed: Option<u64>) -> Result<String> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let snapshot = SimulatorState::new().generate(&mut rng, Utc::now());
    let rendered = if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    };
    Ok(rendered)
}

/// One-line summary of the dashboard state
pub fn status_line(view: &DashboardView) -> String {
    let mode = if view.is_demo() {
        format!("DEMO {:?} {}x", view.demo_state, view.demo_speed.factor())
    } else {
        match view.origin {
            Some(origin) => format!("LIVE ({:?})", origin).to_uppercase(),
            None => "LIVE".to_string(),
        }
    };

    let mut line = format!("[{}] thoughts={} new={}", mode, view.thoughts.len(), view.new_thoughts.len());

    if let Some(snapshot) = &view.snapshot {
        if let Some(matrix) = &snapshot.triangulation_matrix {
            line.push_str(&format!(
                " alignment={:.2} ({})",
                matrix.overall_alignment, matrix.interpretation
            ));
        }
        if let Some(pm) = snapshot.perception.as_ref().and_then(|p| p.polymarket.as_ref()) {
            line.push_str(&format!(" odds={:.3}", pm.current_odds));
        }
        if let Some(proposal) = snapshot.current_proposal() {
            line.push_str(&format!(" proposal={}:{:?}", proposal.id, proposal.status));
        }
    }

    if view.is_loading {
        line.push_str(" loading");
    }
    if view.agent_thinking {
        line.push_str(" thinking");
    }
    if let Some(error) = &view.error {
        line.push_str(&format!(" error=\"{}\" retries={}", error, view.retry_count));
    }
    line
}

/// Print a view summary. Raw mode needs explicit carriage returns.
pub fn print_view(view: &DashboardView) -> Result<()> {
    let color = if view.error.is_some() {
        Color::Red
    } else if view.is_demo() {
        Color::Yellow
    } else {
        Color::Green
    };

    let mut out = stdout();
    execute!(
        out,
        SetForegroundColor(color),
        Print(status_line(view)),
        ResetColor,
        Print("\r\n")
    )?;
    out.flush()?;
    Ok(())
}
