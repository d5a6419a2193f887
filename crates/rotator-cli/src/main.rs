mod cmd_apply;
mod cmd_config;
mod cmd_init;
mod cmd_next;
mod cmd_serve;
mod cmd_status;
mod cmd_token;
mod context;

use clap::{Parser, Subcommand};

use cmd_config::ConfigCmd;
use cmd_token::TokenCmd;

#[derive(Parser)]
#[command(
    name = "rotator",
    version,
    about = "Pick, check and apply profile avatars kept in a GitHub repository"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create .rotator/config.json in the current directory
    Init {
        /// Repository owner (user or organization)
        #[arg(long)]
        owner: Option<String>,
        /// Repository name
        #[arg(long)]
        repo: Option<String>,
    },
    /// Read or change repository settings
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
    /// Manage the stored access token
    Token {
        #[command(subcommand)]
        cmd: TokenCmd,
    },
    /// Show the result of the latest update run
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the avatars in the repository
    Avatars {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent update runs
    History {
        /// Number of runs to show (defaults to config history_limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Select an avatar and apply it
    Apply {
        /// Avatar file name (e.g. cat.png)
        #[arg(conflicts_with = "random", required_unless_present = "random")]
        name: Option<String>,
        /// Pick one at random instead
        #[arg(long)]
        random: bool,
        /// Override the configured apply mode: record or dispatch
        #[arg(long)]
        mode: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which avatar the repository's selection record names
    Adopt,
    /// Download an avatar and check it is a valid image
    Probe {
        /// Avatar file name
        name: String,
    },
    /// Show upcoming scheduled update times
    Next {
        /// Schedule expression (defaults to config `schedule`)
        #[arg(long)]
        schedule: Option<String>,
        /// How many occurrences to list
        #[arg(long, default_value = "5")]
        count: usize,
    },
    /// Start the local dashboard
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value = "7420")]
        port: u16,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("ROTATOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let repo_root = std::env::current_dir()?;

    match cli.cmd {
        Command::Init { owner, repo } => {
            cmd_init::execute(&repo_root, owner.as_deref(), repo.as_deref())
        }
        Command::Config { cmd } => cmd_config::run(cmd, &repo_root),
        Command::Token { cmd } => cmd_token::run(cmd, &repo_root),
        Command::Status { json } => cmd_status::status(&repo_root, json),
        Command::Avatars { json } => cmd_status::avatars(&repo_root, json),
        Command::History { limit, json } => cmd_status::history(&repo_root, limit, json),
        Command::Apply {
            name,
            random,
            mode,
            json,
        } => cmd_apply::apply(
            &repo_root,
            cmd_apply::ApplyArgs {
                name,
                random,
                mode,
                json,
            },
        ),
        Command::Adopt => cmd_apply::adopt(&repo_root),
        Command::Probe { name } => cmd_apply::probe(&repo_root, &name),
        Command::Next { schedule, count } => {
            cmd_next::execute(&repo_root, schedule.as_deref(), count)
        }
        Command::Serve { bind, port } => cmd_serve::execute(&repo_root, &bind, port),
    }
}
