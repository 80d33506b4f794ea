//! smtp-agent - Alert notification agent
//!
//! Reads asset and alert events as JSON lines and mails asset contacts
//! when an alert needs their attention.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use smtp_agent::{
    AgentConfig, AgentRuntime, AlertEvent, AlertTracker, AssetEvent, BusEvent, EventOutcome, LogTransport,
    MailTransport, MessageComposer, MsmtpTransport, NotificationEngine,
};
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "smtp-agent")]
#[command(about = "Alert notification agent")]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "SMTP_AGENT_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "/etc/smtp-agent/config.toml")]
        config: PathBuf,

        /// Read events from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Log notifications instead of mailing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "/etc/smtp-agent/config.toml")]
        output: PathBuf,

        /// SMTP relay host
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Sender address
        #[arg(long, default_value = "")]
        from: String,
    },

    /// Print the notification an alert would produce
    Render {
        /// Rule name
        #[arg(long, default_value = "NY_RULE")]
        rule: String,

        /// Asset name
        #[arg(long, default_value = "QWERTY")]
        asset: String,

        /// Alert state
        #[arg(long, default_value = "ACTIVE")]
        state: String,

        /// Alert severity
        #[arg(long, default_value = "CRITICAL")]
        severity: String,

        /// Asset priority
        #[arg(long, default_value = "1")]
        priority: String,

        /// Alert description
        #[arg(long, default_value = "ASDFKLHJH")]
        description: String,
    },

    /// Mail a sample alert to check the mail setup
    SendTest {
        /// Path to config file
        #[arg(short, long, default_value = "/etc/smtp-agent/config.toml")]
        config: PathBuf,

        /// Recipient address
        #[arg(long)]
        to: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs)?;

    match cli.command {
        Commands::Run {
            config,
            input,
            dry_run,
        } => {
            run_agent(config, input, dry_run).await?;
        }

        Commands::InitConfig { output, host, from } => {
            init_config(output, host, from)?;
        }

        Commands::Render {
            rule,
            asset,
            state,
            severity,
            priority,
            description,
        } => {
            let alert = AlertEvent::new(rule, asset, state, severity).with_description(description);
            render(&alert, &priority)?;
        }

        Commands::SendTest { config, to } => {
            send_test(config, to)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) -> anyhow::Result<()> {
    let directive = if verbose {
        "smtp_agent=debug"
    } else {
        "smtp_agent=info"
    };
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    // stdout is reserved for command output
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    Ok(())
}

fn transport_for(config: &AgentConfig, dry_run: bool) -> Box<dyn MailTransport> {
    if dry_run {
        Box::new(LogTransport::new("dry-run"))
    } else {
        Box::new(MsmtpTransport::new(&config.mail))
    }
}

async fn run_agent(config_path: PathBuf, input: Option<PathBuf>, dry_run: bool) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting smtp-agent");

    let config = AgentConfig::load(&config_path)?;
    let transport = transport_for(&config, dry_run);
    info!(
        name = %config.name,
        transport = %transport.name(),
        host = %config.mail.host,
        queue_capacity = config.queue_capacity,
        "loaded config"
    );

    let engine = NotificationEngine::from_config(&config, transport);
    let runtime = AgentRuntime::new(engine, config.queue_capacity);

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
        Some(path) => {
            info!(input = %path.display(), "reading events from file");
            Box::new(BufReader::new(tokio::fs::File::open(&path).await?))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let summary = runtime.run(reader).await?;
    info!(
        events = summary.engine.events,
        dropped = summary.engine.dropped,
        sent = summary.engine.notifications_sent,
        "smtp-agent stopped"
    );

    Ok(())
}

fn init_config(output: PathBuf, host: String, from: String) -> anyhow::Result<()> {
    let mut config = AgentConfig::default();
    config.mail.host = host;
    config.mail.from = from;
    config.validate()?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, config.to_toml()?)?;

    println!("Config written to: {}", output.display());
    Ok(())
}

fn render(alert: &AlertEvent, priority: &str) -> anyhow::Result<()> {
    let asset = AssetEvent::new(
        alert.asset_name.clone(),
        Some(priority),
        Some("Contact"),
        Some("contact@example.com"),
    )
    .into_record()?;

    // Render through a tracker so the record is built exactly as at runtime.
    let mut tracker = AlertTracker::new();
    let (key, _) = tracker.ingest(alert, Utc::now());
    let record = tracker
        .get(&key)
        .ok_or_else(|| anyhow::anyhow!("alert {key} was not recorded"))?;

    let composer = MessageComposer::new();
    println!("Subject: {}", composer.render_subject(record, &asset, &key.rule_name));
    println!();
    println!("{}", composer.render_body(record, &asset, &key.rule_name));
    Ok(())
}

fn send_test(config_path: PathBuf, to: String) -> anyhow::Result<()> {
    let config = AgentConfig::load(&config_path)?;
    let mut engine = NotificationEngine::from_config(&config, transport_for(&config, false));

    let asset = AssetEvent::new("QWERTY", Some("1"), Some("smtp-agent test"), Some(to.as_str()));
    let alert = AlertEvent::new("NY_RULE", "QWERTY", "ACTIVE", "CRITICAL")
        .with_description("ASDFKLHJH")
        .with_timestamp(123_456)
        .with_actions("EMAIL");

    let now = Utc::now();
    engine.handle(BusEvent::Asset(asset), now);
    match engine.handle(BusEvent::Alert(alert), now) {
        EventOutcome::Notified => {
            println!("Test message sent to {to}");
            Ok(())
        }
        outcome => anyhow::bail!("test message was not sent: {outcome:?}"),
    }
}
