pub mod commands;
pub mod utils;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::database::{DatabaseManager, TxSettings};

#[derive(Parser)]
#[command(name = "teamhealth")]
#[command(about = "Team Health CLI - administer hierarchy levels, reporting lines and team scopes")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Hierarchy level management")]
    Levels {
        #[command(subcommand)]
        cmd: commands::levels::LevelCommands,
    },

    #[command(about = "Reporting lines")]
    Org {
        #[command(subcommand)]
        cmd: commands::org::OrgCommands,
    },

    #[command(about = "Team supervisor chains")]
    Teams {
        #[command(subcommand)]
        cmd: commands::teams::TeamCommands,
    },

    #[command(about = "Team health dashboard for a manager")]
    Dashboard(commands::dashboard::DashboardArgs),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Pool and transaction settings for commands that talk to the store directly
pub struct CliContext {
    pub pool: PgPool,
    pub settings: TxSettings,
}

impl CliContext {
    async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = DatabaseManager::connect(&config.database)
            .await
            .context("failed to connect to database (is DATABASE_URL set?)")?;
        Ok(Self {
            pool,
            settings: TxSettings::from(&config.database),
        })
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let mut config = AppConfig::from_env();
    // migrations only run when asked for
    config.database.run_migrations = false;
    let ctx = CliContext::connect(&config).await?;

    match cli.command {
        Commands::Migrate => commands::migrate::handle(&ctx, output_format).await,
        Commands::Levels { cmd } => commands::levels::handle(cmd, &ctx, output_format).await,
        Commands::Org { cmd } => commands::org::handle(cmd, &ctx, output_format).await,
        Commands::Teams { cmd } => commands::teams::handle(cmd, &ctx, output_format).await,
        Commands::Dashboard(args) => commands::dashboard::handle(args, &ctx, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_commands() {
        let cli = Cli::try_parse_from(["teamhealth", "--json", "levels", "move", "2f1c0f9e-6f7a-4d65-9a51-3c1b0d3b9d11", "up"])
            .unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Levels {
                cmd: commands::levels::LevelCommands::Move { .. }
            }
        ));
    }

    #[test]
    fn dashboard_period_is_optional() {
        let cli = Cli::try_parse_from(["teamhealth", "dashboard", "--manager", "2f1c0f9e-6f7a-4d65-9a51-3c1b0d3b9d11"]).unwrap();
        match cli.command {
            Commands::Dashboard(args) => assert!(args.period.is_none()),
            _ => panic!("expected dashboard"),
        }
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(Cli::try_parse_from(["teamhealth", "org", "subordinates", "bob"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
