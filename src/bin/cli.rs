//! partikv CLI Client
//!
//! One-shot commands against a partikv server.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use partikv::client::{verify_peer, Client, DatabaseClient};
use partikv::cluster::KvdbUri;
use partikv::kv::ExistencePolicy;
use partikv::protocol::{ClusterInfo, DatabaseInfo, DatabaseKind};
use partikv::{ClientConfig, KvError, Result};

/// partikv CLI
#[derive(Parser, Debug)]
#[command(name = "partikv-cli")]
#[command(about = "CLI for the partikv key-value store")]
#[command(version)]
struct Args {
    /// Server address; administrative commands need the local management port
    #[arg(short, long, default_value = "127.0.0.1:7079")]
    server: String,

    /// Seconds to wait for the connection and for each response
    #[arg(short, long, default_value = "5")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every database
    Show,

    /// Create a database
    Create {
        name: String,

        #[arg(short, long, value_enum, default_value = "versioned")]
        kind: Kind,

        /// Partition count (0 uses the server default)
        #[arg(short, long, default_value = "0")]
        partitions: u32,

        /// Topology entry as NAME=URI[,URI...]; repeatable
        #[arg(short, long = "cluster")]
        clusters: Vec<String>,
    },

    /// Enable a database
    Enable { name: String },

    /// Disable a database
    Disable { name: String },

    /// Drop a database and delete its data
    Drop { name: String },

    /// Read a key
    Get {
        database: String,
        key: String,

        /// Read this version (versioned databases)
        #[arg(long)]
        version: Option<i64>,

        /// The database is a conditional one
        #[arg(long, conflicts_with = "version")]
        conditional: bool,
    },

    /// Write a key
    Put {
        database: String,
        key: String,
        value: String,

        /// Version the key must currently be at (versioned databases)
        #[arg(long, allow_hyphen_values = true, required_unless_present = "policy")]
        expected: Option<i64>,

        /// EXISTING or NOT_EXISTING (conditional databases)
        #[arg(long, conflicts_with = "expected")]
        policy: Option<ExistencePolicy>,
    },

    /// Check whether a key exists
    Exists { database: String, key: String },

    /// Print a database's topology table
    Cluster { database: String },

    /// Compare a database's topology table with a peer's
    VerifyPeer {
        /// Local database whose table is compared
        database: String,

        /// Port of this node's management listener as listed in topology tables
        #[arg(long, default_value = "7079")]
        local_port: u16,

        /// Peer as kvdb://host:port/database
        remote: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Versioned,
    Conditional,
}

impl From<Kind> for DatabaseKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Versioned => DatabaseKind::Versioned,
            Kind::Conditional => DatabaseKind::Conditional,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = ClientConfig::builder()
        .request_timeout(Duration::from_secs(args.timeout))
        .retries(0)
        .build();

    let client = Client::connect(&args.server, config.clone())?;
    if !client.wait_connected(config.request_timeout) {
        return Err(KvError::Network(format!("could not connect to {}", args.server)));
    }
    let db = DatabaseClient::new(client);

    match args.command {
        Commands::Show => {
            for info in db.show_databases()? {
                print_info(&info);
            }
        }
        Commands::Create {
            name,
            kind,
            partitions,
            clusters,
        } => {
            let info = DatabaseInfo::new(name, kind.into())
                .partitions(partitions)
                .clusters(parse_clusters(&clusters)?);
            print_info(&db.create_database(&info)?);
        }
        Commands::Enable { name } => db.enable_database(&name)?,
        Commands::Disable { name } => db.disable_database(&name)?,
        Commands::Drop { name } => db.drop_database(&name)?,
        Commands::Get {
            database,
            key,
            version,
            conditional,
        } => {
            db.use_database(&database)?;
            if conditional {
                print_optional(db.get_value(key.as_bytes())?);
            } else if let Some(version) = version {
                print_optional(db.get_at(key.as_bytes(), version)?);
            } else {
                match db.get_latest(key.as_bytes())? {
                    Some(v) => println!("{}\t{}", v.version, String::from_utf8_lossy(&v.value)),
                    None => println!("(nil)"),
                }
            }
        }
        Commands::Put {
            database,
            key,
            value,
            expected,
            policy,
        } => {
            db.use_database(&database)?;
            match (expected, policy) {
                (_, Some(policy)) => {
                    db.put_conditional(key.as_bytes(), value.as_bytes(), policy)?;
                    println!("OK");
                }
                (Some(expected), None) => {
                    let version = db.put_versioned(key.as_bytes(), value.as_bytes(), expected)?;
                    println!("{}", version);
                }
                (None, None) => {
                    return Err(KvError::InvalidArgument(
                        "one of --expected or --policy is required".to_string(),
                    ))
                }
            }
        }
        Commands::Exists { database, key } => {
            db.use_database(&database)?;
            println!("{}", db.exists(key.as_bytes())?);
        }
        Commands::Cluster { database } => {
            db.use_database(&database)?;
            print_clusters(&db.cluster()?);
        }
        Commands::VerifyPeer {
            database,
            local_port,
            remote,
        } => {
            let remote = KvdbUri::parse(&remote)?;
            db.use_database(&database)?;
            let local_table = db.cluster()?;
            let matched = verify_peer(local_port, &local_table, &remote, config)?;
            println!("{}", if matched { "match" } else { "mismatch" });
        }
    }

    db.client().close();
    Ok(())
}

/// Parse `NAME=URI[,URI...]` entries
fn parse_clusters(entries: &[String]) -> Result<ClusterInfo> {
    entries.iter().try_fold(ClusterInfo::new(), |info, entry| {
        let (name, uris) = entry.split_once('=').ok_or_else(|| {
            KvError::InvalidArgument(format!("cluster entry must be NAME=URI[,URI...]: {}", entry))
        })?;
        let uris: Vec<&str> = uris.split(',').filter(|u| !u.is_empty()).collect();
        for uri in &uris {
            KvdbUri::parse(uri)?;
        }
        Ok(info.with_cluster(name, uris))
    })
}

fn print_info(info: &DatabaseInfo) {
    println!(
        "{}\t{:?}\tpartitions={}\t{}",
        info.name,
        info.kind,
        info.partitions,
        if info.enabled { "enabled" } else { "disabled" }
    );
    print_clusters(&info.clusters);
}

fn print_clusters(clusters: &ClusterInfo) {
    for (name, uris) in &clusters.clusters {
        println!("  {}: {}", name, uris.join(", "));
    }
}

fn print_optional(value: Option<Vec<u8>>) {
    match value {
        Some(value) => println!("{}", String::from_utf8_lossy(&value)),
        None => println!("(nil)"),
    }
}
