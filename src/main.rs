//! WildFly Bot - GitHub pull request policy enforcement
//!
//! Entry point for the webhook server and the maintenance commands.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{self, EnvFilter};
use wildfly_bot_core::{
    error::Result, validate, webhook::WebhookServer, BotConfig, BotError, GitHubClient,
    InstallationReconciler, LogMailer, Policy, PullRequestHandler,
};

#[derive(Parser)]
#[command(name = "wildfly-bot")]
#[command(about = "Pull request policy enforcement for GitHub repositories", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); WILDFLY_BOT__* variables override it
    #[arg(short, long, global = true, env = "WILDFLY_BOT_CONFIG")]
    config: Option<PathBuf>,

    /// Set log level
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Log side effects instead of performing them
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive GitHub webhook deliveries
    Serve {
        /// Listen address (overrides server.addr)
        #[arg(long)]
        addr: Option<String>,

        /// Skip the startup policy check of installed repositories
        #[arg(long)]
        no_reconcile: bool,
    },

    /// Validate the policy of every installed repository
    Reconcile,

    /// Validate a local policy file
    Check {
        /// Path to a wildfly-bot.yml file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::new(format!(
        "wildfly_bot={level},wildfly_bot_core={level},tower_http=warn",
        level = level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("WildFly Bot v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = BotConfig::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.dry_run = true;
    }
    if config.dry_run {
        info!("Dry-run mode: side effects are only logged");
    }

    match cli.command {
        Commands::Serve { addr, no_reconcile } => serve(config, addr, no_reconcile).await,
        Commands::Reconcile => {
            let summary = reconciler(&config)?.run().await?;
            println!("{}", summary);
            Ok(())
        }
        Commands::Check { file } => check(&config, &file),
    }
}

fn github(config: &BotConfig) -> Result<Arc<GitHubClient>> {
    Ok(Arc::new(GitHubClient::new(&config.github, &config.engine)?))
}

fn reconciler(config: &BotConfig) -> Result<InstallationReconciler> {
    Ok(InstallationReconciler::new(
        github(config)?,
        Arc::new(LogMailer::new()),
        config.engine.clone(),
        config.dry_run,
    ))
}

async fn serve(config: BotConfig, addr: Option<String>, no_reconcile: bool) -> Result<()> {
    let addr = match addr {
        Some(addr) => addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", addr, e))?,
        None => config.server.addr,
    };

    if config.server.reconcile_on_startup && !no_reconcile {
        let reconciler = reconciler(&config)?;
        tokio::spawn(async move {
            if let Err(e) = reconciler.run().await {
                error!("Startup policy check failed: {}", e);
            }
        });
    }

    let client = github(&config)?;
    let handler = PullRequestHandler::new(
        client.clone(),
        client,
        config.engine.clone(),
        config.dry_run,
    );

    WebhookServer::new(addr, Arc::new(handler), config.github.webhook_secret.clone())
        .serve()
        .await?;
    Ok(())
}

fn check(config: &BotConfig, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)?;
    let policy = match Policy::from_yaml(&text, &config.engine) {
        Ok(policy) => policy,
        Err(e) => {
            println!("{}: {}", file.display(), config.engine.unparsable_config_description);
            return Err(e);
        }
    };

    let report = validate(&policy);
    for rule in &policy.rules {
        debug!("{}", rule);
    }

    if report.is_valid() {
        println!(
            "{}: {} ({} rules, project key {})",
            file.display(),
            config.engine.valid_description,
            policy.rules.len(),
            policy.project_key
        );
        Ok(())
    } else {
        for problem in report.problems() {
            warn!("{}", problem);
            println!("- {}", problem);
        }
        Err(BotError::InvalidPolicy(report.problems_text()))
    }
}
