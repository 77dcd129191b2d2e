use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clouddns::config::Settings;
use clouddns::domains::{CreateDomain, Domain, DomainListOpts, UpdateDomain};
use clouddns::records::{CreateRecord, Record, RecordListOpts, UpdateRecord};
use clouddns::{secrets, CloudDns, Flow, Pager};

#[derive(Parser)]
#[command(name = "clouddns")]
#[command(about = "Rackspace Cloud DNS client - manage domains and records")]
#[command(version)]
struct Cli {
    /// Credentials profile to use
    #[arg(long, global = true, default_value = "default")]
    profile: String,

    /// Give up after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage domains
    Domain {
        #[command(subcommand)]
        action: DomainAction,
    },

    /// Manage records of a domain
    Record {
        /// Domain ID
        domain_id: u64,

        #[command(subcommand)]
        action: RecordAction,
    },

    /// Store API credentials for a profile
    SetKey,

    /// Delete stored API credentials for a profile
    DeleteKey,

    /// Show configuration file location and contents
    Config,
}

#[derive(Subcommand)]
enum DomainAction {
    /// List domains
    List {
        /// Only domains matching this name
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        limit: Limit,
    },

    /// Show a domain with its records
    Show { id: u64 },

    /// Create a domain
    Create {
        name: String,
        email: String,
        /// TTL for the SOA record
        #[arg(long, default_value_t = clouddns::domains::DEFAULT_DOMAIN_TTL)]
        ttl: u32,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Update a domain
    Update {
        id: u64,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        ttl: Option<u32>,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Delete a domain
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum RecordAction {
    /// List records
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        data: Option<String>,
        #[arg(long = "type")]
        record_type: Option<String>,

        #[command(flatten)]
        limit: Limit,
    },

    /// Show a record
    Show { id: String },

    /// Create a record
    Create {
        name: String,
        #[arg(value_name = "TYPE")]
        record_type: String,
        data: String,
        #[arg(long)]
        ttl: Option<u32>,
        #[arg(long)]
        comment: Option<String>,
        /// Priority for MX and SRV records
        #[arg(long)]
        priority: Option<u32>,
    },

    /// Update a record; name and data default to the current values
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        data: Option<String>,
        #[arg(long)]
        ttl: Option<u32>,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        priority: Option<u32>,
    },

    /// Delete a record
    Delete { id: String },
}

#[derive(Args)]
struct Limit {
    /// Stop after printing this many entries
    #[arg(long)]
    limit: Option<usize>,
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Cancel outstanding work on Ctrl+C or when the deadline passes.
fn cancel_on_shutdown(cancel: CancellationToken, timeout: Option<u64>) {
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C");
            }
            _ = deadline => {
                warn!("Timed out, cancelling");
            }
        }
        cancel.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Credential and config commands still work with a broken config file.
    let (settings, load_error) = Settings::load_or_default_from(&Settings::config_path());
    init_logging(&settings.client.log_level);

    if let Some(e) = load_error {
        if matches!(cli.command, Commands::Domain { .. } | Commands::Record { .. }) {
            return Err(e);
        }
        warn!("{:#}; using default settings", e);
    }

    match cli.command {
        Commands::SetKey => {
            use std::io::{self, Write};

            print!("Username: ");
            io::stdout().flush()?;
            let mut username = String::new();
            io::stdin().read_line(&mut username)?;
            let username = username.trim();

            let api_key = rpassword::prompt_password("API Key: ")?;

            secrets::store_credentials(&cli.profile, username, api_key.trim())?;
            println!("Credentials stored for profile: {}", cli.profile);
        }

        Commands::DeleteKey => {
            secrets::delete_credentials(&cli.profile)?;
            println!("Credentials deleted for profile: {}", cli.profile);
        }

        Commands::Config => {
            show_config(&settings)?;
        }

        Commands::Domain { action } => {
            let (client, cancel) = connect(&settings, &cli.profile, cli.timeout).await?;
            run_domain(&client, action, &cancel).await?;
        }

        Commands::Record { domain_id, action } => {
            let (client, cancel) = connect(&settings, &cli.profile, cli.timeout).await?;
            run_record(&client, domain_id, action, &cancel).await?;
        }
    }

    Ok(())
}

async fn connect(settings: &Settings, profile: &str, timeout: Option<u64>) -> Result<(CloudDns, CancellationToken)> {
    let creds = secrets::get_credentials(profile)?;
    let client = CloudDns::connect(&settings.client, &creds)
        .await
        .context("Failed to authenticate with the identity service")?
        .with_poll_options(settings.polling.poll_options());

    let cancel = CancellationToken::new();
    cancel_on_shutdown(cancel.clone(), timeout);

    Ok((client, cancel))
}

async fn run_domain(client: &CloudDns, action: DomainAction, cancel: &CancellationToken) -> Result<()> {
    match action {
        DomainAction::List { name, limit } => {
            let pager = client.list_domains(&DomainListOpts { name })?;
            print_listing(&pager, limit.limit, cancel, |d: &Domain| {
                format!("{}\t{}\t{}", d.id, d.name, d.email_address)
            })
            .await?;
        }

        DomainAction::Show { id } => {
            let domain = client.get_domain(id, cancel).await?;
            print_json(&domain)?;
        }

        DomainAction::Create {
            name,
            email,
            ttl,
            comment,
        } => {
            let opts = CreateDomain {
                name,
                email_address: email,
                ttl,
                comment,
            };
            let domain = client.create_domain(opts, cancel).await?;
            print_json(&domain)?;
        }

        DomainAction::Update {
            id,
            email,
            ttl,
            comment,
        } => {
            let opts = UpdateDomain {
                email_address: email,
                ttl,
                comment,
            };
            if opts.is_empty() {
                anyhow::bail!("Nothing to update: pass --email, --ttl or --comment");
            }
            client.update_domain(id, &opts, cancel).await?;
            println!("Domain {} updated", id);
        }

        DomainAction::Delete { id } => {
            client.delete_domain(id, cancel).await?;
            println!("Domain {} deleted", id);
        }
    }

    Ok(())
}

async fn run_record(
    client: &CloudDns,
    domain_id: u64,
    action: RecordAction,
    cancel: &CancellationToken,
) -> Result<()> {
    match action {
        RecordAction::List {
            name,
            data,
            record_type,
            limit,
        } => {
            let opts = RecordListOpts {
                name,
                data,
                record_type,
            };
            let pager = client.list_records(domain_id, &opts)?;
            print_listing(&pager, limit.limit, cancel, |r: &Record| {
                format!("{}\t{}\t{}\t{}\t{}", r.id, r.name, r.record_type, r.data, r.ttl)
            })
            .await?;
        }

        RecordAction::Show { id } => {
            let record = client.get_record(domain_id, &id, cancel).await?;
            print_json(&record)?;
        }

        RecordAction::Create {
            name,
            record_type,
            data,
            ttl,
            comment,
            priority,
        } => {
            let opts = CreateRecord {
                name,
                record_type,
                data,
                ttl,
                comment,
                priority,
            };
            let record = client.create_record(domain_id, &opts, cancel).await?;
            print_json(&record)?;
        }

        RecordAction::Update {
            id,
            name,
            data,
            ttl,
            comment,
            priority,
        } => {
            let mut opts = match (name, data) {
                (Some(name), Some(data)) => UpdateRecord {
                    name,
                    data,
                    ttl: None,
                    comment: None,
                    priority: None,
                },
                (name, data) => {
                    let current = client.get_record(domain_id, &id, cancel).await?;
                    let mut opts = UpdateRecord::from_record(&current);
                    if let Some(name) = name {
                        opts.name = name;
                    }
                    if let Some(data) = data {
                        opts.data = data;
                    }
                    opts
                }
            };
            opts.ttl = ttl;
            opts.comment = comment;
            opts.priority = priority;

            client.update_record(domain_id, &id, &opts, cancel).await?;
            println!("Record {} updated", id);
        }

        RecordAction::Delete { id } => {
            client.delete_record(domain_id, &id, cancel).await?;
            println!("Record {} deleted", id);
        }
    }

    Ok(())
}

async fn print_listing<T, F>(pager: &Pager, limit: Option<usize>, cancel: &CancellationToken, line: F) -> Result<()>
where
    T: serde::de::DeserializeOwned,
    F: Fn(&T) -> String,
{
    let mut printed = 0usize;

    pager
        .each_page(cancel, |page| {
            let entries = page
                .extract::<T>()
                .map_err(|e| clouddns::Error::Decode {
                    url: pager.start_url().to_string(),
                    source: e,
                })?;

            for entry in &entries {
                if limit.is_some_and(|max| printed >= max) {
                    return Ok(Flow::Stop);
                }
                println!("{}", line(entry));
                printed += 1;
            }

            if limit.is_some_and(|max| printed >= max) {
                Ok(Flow::Stop)
            } else {
                Ok(Flow::Continue)
            }
        })
        .await?;

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_config(settings: &Settings) -> Result<()> {
    let config_path = Settings::config_path();

    println!("Configuration file location: {}\n", config_path.display());

    if config_path.exists() {
        println!("Current configuration:\n");
    } else {
        println!("Configuration file not found, using defaults.");
        println!("Create a configuration file at the location above to override them.\n");
    }
    println!("{}", toml::to_string_pretty(settings)?);

    Ok(())
}
