use clap::{Parser, Subcommand};

mod commands;
mod util;

use commands::a2a::{SendArgs, TaskCommands};
use commands::analyze::AnalyzeArgs;

#[derive(Parser)]
#[command(name = "rollout", version, about = "Operator CLI for the rollout analysis agent")]
struct Cli {
    /// Agent base URL
    #[arg(long, env = "ROLLOUT_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Skip pretty-printing (raw JSON for piping)
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check agent health
    Health,
    /// Run a synchronous canary analysis and print the decision
    Analyze(AnalyzeArgs),
    /// Send an A2A message and print the resulting task
    Send(SendArgs),
    /// A2A task operations
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url, cli.raw).await,
        Commands::Analyze(args) => commands::analyze::run(&cli.api_url, args, cli.raw).await,
        Commands::Send(args) => commands::a2a::send(&cli.api_url, args, cli.raw).await,
        Commands::Task { command } => commands::a2a::task(&cli.api_url, command, cli.raw).await,
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_task_cancel() {
        let cli = Cli::try_parse_from(["rollout", "task", "cancel", "t-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Task { command: TaskCommands::Cancel { ref id } } if id == "t-1"
        ));
    }

    #[test]
    fn analyze_requires_prompt() {
        assert!(Cli::try_parse_from(["rollout", "analyze"]).is_err());
        let cli = Cli::try_parse_from([
            "rollout", "analyze", "--prompt", "go", "-c", "namespace=shop", "--user-id", "u1",
        ])
        .unwrap();
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.context, ["namespace=shop"]);
        assert_eq!(args.user_id.as_deref(), Some("u1"));
    }
}
