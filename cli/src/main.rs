use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use healthvault_sdk_core::{
    authorization_url, parse_notification, signout_url, ConnectOptions, DataType, HealthVaultConfig,
    HealthVaultConn, HttpTransport, ThingQuery,
};
use rand::rngs::OsRng;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "healthvault", version, about = "HealthVault platform client")]
struct Cli {
    /// JSON configuration file; `HV_*` environment variables are used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the shell URL that asks the user to authorize this application
    AuthUrl {
        #[arg(long)]
        callback: Option<String>,
        #[arg(long)]
        record: Option<String>,
    },
    /// Print the shell sign-out URL
    SignoutUrl {
        #[arg(long)]
        callback: Option<String>,
    },
    /// Fetch things of one type as JSON
    Things {
        kind: DataType,
        #[arg(long)]
        wctoken: String,
        #[arg(long)]
        max: Option<u32>,
    },
    /// Subscribe an https callback to changes of the given types
    Subscribe {
        url: String,
        #[arg(required = true)]
        kinds: Vec<DataType>,
    },
    /// List event subscriptions
    Subscriptions,
    /// Remove an event subscription
    Unsubscribe { id: String },
    /// Decode a change notification body from a file or stdin
    ParseNotification { file: Option<PathBuf> },
}

#[derive(Serialize)]
struct Subscription {
    id: String,
    notification_key: String,
}

fn load_config(path: Option<&PathBuf>) -> Result<HealthVaultConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(HealthVaultConfig::from_json_str(&json)?)
        }
        None => Ok(HealthVaultConfig::from_env()),
    }
}

fn open(
    config: HealthVaultConfig,
    options: ConnectOptions,
) -> Result<HealthVaultConn<HttpTransport>> {
    HealthVaultConn::from_config(config, options).context("connecting to HealthVault")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::AuthUrl { callback, record } => {
            let app_id = config.application_id()?;
            println!(
                "{}",
                authorization_url(
                    &config.shell_server,
                    &app_id.to_string(),
                    callback.as_deref(),
                    record.as_deref(),
                )
            );
        }
        Command::SignoutUrl { callback } => {
            let app_id = config.application_id()?;
            println!(
                "{}",
                signout_url(&config.shell_server, &app_id.to_string(), callback.as_deref())
            );
        }
        Command::Things { kind, wctoken, max } => {
            let mut conn = open(config, ConnectOptions::default().wctoken(wctoken))?;
            let mut query = ThingQuery::new(kind);
            if let Some(max) = max {
                query = query.max_results(max);
            }
            let records = conn.get_things(query)?;
            info!(kind = %kind, count = records.len(), "fetched things");
            print_json(&records)?;
        }
        Command::Subscribe { url, kinds } => {
            let mut conn = open(config, ConnectOptions::default())?;
            let (id, notification_key) = conn.subscribe_to_event(&url, &kinds, &mut OsRng)?;
            print_json(&Subscription {
                id,
                notification_key,
            })?;
        }
        Command::Subscriptions => {
            let mut conn = open(config, ConnectOptions::default())?;
            print_json(&conn.get_event_subscriptions()?)?;
        }
        Command::Unsubscribe { id } => {
            let mut conn = open(config, ConnectOptions::default())?;
            conn.unsubscribe_to_event(&id)?;
        }
        Command::ParseNotification { file } => {
            let body = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut body = String::new();
                    std::io::stdin().read_to_string(&mut body)?;
                    body
                }
            };
            print_json(&parse_notification(&body)?)?;
        }
    }

    Ok(())
}
