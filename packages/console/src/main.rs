//! `vault`: sign in to the hosted project and print the dashboard, notes or
//! saved passwords of the signed-in user.

use anyhow::Context;
use api::{open_workspace, GoTrueIdentity, Settings};
use clap::{Parser, Subcommand};
use store::{IdentityProvider, NoteFilter, PasswordFilter, PriorityFilter};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "vault")]
#[command(about = "Notes and password vault client")]
struct Cli {
    #[arg(long, env = "VAULT_EMAIL")]
    email: String,

    #[arg(long, env = "VAULT_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Totals and the most recent notes
    Dashboard,
    /// List notes, optionally filtered
    Notes {
        #[arg(long, default_value = "")]
        search: String,
        /// high, medium, low or all
        #[arg(long, default_value = "all")]
        priority: String,
    },
    /// List saved passwords (secrets are never printed)
    Passwords {
        #[arg(long, default_value = "")]
        search: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new().context("failed to load settings")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let identity = GoTrueIdentity::new(&settings).context("failed to build auth client")?;
    let session = identity
        .authenticate(&cli.email, &cli.password)
        .await
        .context("sign-in failed")?;
    println!("Signed in as {}", session.user().display_name());

    let workspace = open_workspace(&settings, session).context("failed to open workspace")?;
    let summary = workspace.load().await.context("failed to load data")?;

    match cli.command.unwrap_or(Command::Dashboard) {
        Command::Dashboard => {
            let stats = &summary.stats;
            println!();
            println!("Total notes:      {}", stats.total_notes);
            println!("Completed:        {}", stats.completed_notes);
            println!("Pending:          {}", stats.pending_notes);
            println!("Saved passwords:  {}", stats.saved_passwords);
            println!("Completion rate:  {:.0}%", stats.completion_rate() * 100.0);
            println!();
            println!("Recent notes:");
            let today = chrono::Local::now().date_naive();
            for note in &summary.recent_notes {
                let mark = if note.completed { "x" } else { " " };
                println!(
                    "  [{mark}] {} ({}, {})",
                    note.title,
                    note.priority,
                    note.due_label(today)
                );
            }
        }
        Command::Notes { search, priority } => {
            let filter = NoteFilter {
                search,
                priority: PriorityFilter::parse(&priority),
            };
            for note in workspace.notes().filtered(&filter) {
                let mark = if note.completed { "x" } else { " " };
                println!("  [{mark}] {}  {}  {}", note.id, note.priority, note.title);
            }
        }
        Command::Passwords { search } => {
            println!("Categories: {}", workspace.suggested_categories().join(", "));
            for entry in workspace.passwords().filtered(&PasswordFilter::search(search)) {
                println!(
                    "  {}  {}  {}  {}",
                    entry.id,
                    entry.site_name,
                    entry.username,
                    entry.category.as_deref().unwrap_or("-")
                );
            }
        }
    }

    workspace.close();
    identity.sign_out().await.context("sign-out failed")?;
    info!("done");
    Ok(())
}
