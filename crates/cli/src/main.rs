mod config;
mod error;

use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use policy::Address;
use runtime::script::spec_id;
use runtime::{CALLS_SPEC_ID, Counter, Ledger, Organization, calls, ids};
use storage::{Event, EventKind, EventStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Directory, Scenario};
use error::{Error, Result};

#[derive(Parser)]
#[command(name = "charter")]
#[command(about = "Bootstrap an organization and run permissioned scripts", long_about = None)]
#[command(version)]
struct Cli {
    /// Event database (defaults to events.db in the data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap an organization and run a scenario against it
    Run {
        /// Scenario file (TOML)
        scenario: PathBuf,
    },
    /// List committed transactions, newest first
    Transactions {
        /// Show only the last N transactions
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show audit records for a transaction
    Logs {
        /// Transaction ID (prefix match supported)
        #[arg(short, long)]
        tx: String,
        /// Filter by event kind (entry_set, permission_granted, script_call, ...)
        #[arg(short, long)]
        kind: Option<String>,
    },
    /// Decode a hex-encoded script
    Decode {
        /// Script bytes, optionally 0x-prefixed
        script: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let db_path = match cli.db {
        Some(path) => path,
        None => dirs_data_dir()
            .unwrap_or_else(|| ".charter".into())
            .join("events.db"),
    };

    match cli.command {
        Commands::Run { scenario } => cmd_run(&scenario, &db_path),
        Commands::Transactions { limit } => cmd_transactions(&db_path, limit),
        Commands::Logs { tx, kind } => cmd_logs(&db_path, &tx, kind.as_deref()),
        Commands::Decode { script } => cmd_decode(&script),
    }
}

fn cmd_run(scenario_path: &Path, db_path: &Path) -> Result<()> {
    let scenario = Scenario::load(scenario_path)?;

    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let store = EventStore::open(db_path)?;
    println!("Audit records stored at: {}", db_path.display());

    let mut ledger = Ledger::new().with_store(store);
    let creator = scenario.creator;
    let committed = Organization::bootstrap(&mut ledger, creator)?;
    let org = committed.value;
    println!("Organization: {} (tx {})", org.kernel, committed.tx_id);

    let host = org.install_script_host(&mut ledger, creator)?;

    let mut names = scenario.directory()?;
    names.insert("kernel", org.kernel)?;
    names.insert("acl", org.acl)?;
    names.insert("registry", org.registry)?;
    names.insert("host", host)?;
    for name in &scenario.counters {
        let counter = ledger.deploy(creator, Counter, &[])?;
        names.insert(name, counter)?;
    }

    let mut permissions = scenario
        .manifest
        .resolve(creator, |name| names.get(name))?;
    let has_execute = permissions
        .iter()
        .any(|spec| spec.target == host && spec.role == *ids::EXECUTE_ROLE);
    if !has_execute {
        permissions.push(policy::PermissionSpec {
            grantee: creator,
            target: host,
            role: *ids::EXECUTE_ROLE,
            manager: creator,
            predicates: Vec::new(),
        });
    }
    let receipt = org.apply_permissions(&mut ledger, creator, &permissions)?;
    info!(count = permissions.len(), tx = %receipt.tx_id, "permissions applied");
    print_names(&names);

    println!();
    for script in &scenario.scripts {
        if script.advance > 0 {
            ledger.advance_block(script.advance);
        }
        let sender = script.sender(&names, creator)?;
        let encoded = calls::encode(&script.actions(&names)?)?;
        let banned = script.banned(&names)?;

        let outcome = if banned.is_empty() {
            runtime::execute(&mut ledger, sender, host, &encoded)
        } else {
            runtime::execute_with_ban(&mut ledger, sender, host, &encoded, &banned)
        };
        match outcome {
            Ok(committed) => println!(
                "{}: ok (tx {}, output 0x{})",
                script.name,
                committed.tx_id,
                hex::encode(&committed.value)
            ),
            Err(e) => {
                warn!(script = %script.name, error = %e, "script reverted");
                println!("{}: reverted: {e}", script.name);
            }
        }
    }

    if !scenario.counters.is_empty() {
        println!();
        for name in &scenario.counters {
            let address = names.resolve(name)?;
            let value = Counter::value_of(&mut ledger, address)?;
            println!("{name:<16} {value}");
        }
    }

    Ok(())
}

fn print_names(names: &Directory) {
    for (name, address) in names.iter() {
        println!("  {name:<16} {address}");
    }
}

fn cmd_transactions(db_path: &Path, limit: usize) -> Result<()> {
    let store = open_store(db_path)?;
    let transactions = store.list_transactions()?;

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!("{:<36}  {:<20}  {:<8}  EVENTS", "TX ID", "TIME", "BLOCK");
    println!("{}", "-".repeat(80));

    for summary in transactions.into_iter().take(limit) {
        let time = Local
            .from_utc_datetime(&summary.timestamp.naive_utc())
            .format("%Y-%m-%d %H:%M");
        println!(
            "{:<36}  {:<20}  {:<8}  {}",
            summary.id.to_string(),
            time.to_string(),
            summary.block,
            summary.event_count
        );
    }

    Ok(())
}

fn cmd_logs(db_path: &Path, tx_prefix: &str, kind_filter: Option<&str>) -> Result<()> {
    let store = open_store(db_path)?;

    // Find transaction by prefix
    let transactions = store.list_transactions()?;
    let matching: Vec<_> = transactions
        .iter()
        .filter(|t| t.id.to_string().starts_with(tx_prefix))
        .collect();

    let tx_id = match matching.len() {
        0 => {
            return Err(Error::TransactionNotFound {
                prefix: tx_prefix.to_string(),
            });
        }
        1 => matching[0].id,
        _ => {
            return Err(Error::AmbiguousTransaction {
                prefix: tx_prefix.to_string(),
                matches: matching.iter().map(|t| t.id.to_string()).collect(),
            });
        }
    };

    let events = store.load_events(tx_id, kind_filter)?;

    if events.is_empty() {
        println!("No events found for transaction {tx_id}");
        return Ok(());
    }

    println!("Transaction: {tx_id}\n");

    for event in events {
        print_event(&event);
    }

    Ok(())
}

fn cmd_decode(input: &str) -> Result<()> {
    let script = hex::decode(input.trim().trim_start_matches("0x"))?;

    match spec_id(&script) {
        Some(CALLS_SPEC_ID) => {
            let actions = calls::decode(&script)?;
            println!("calls script, {} action(s)", actions.len());
            for (i, action) in actions.iter().enumerate() {
                let (selector, args) = action.payload.split_at(action.payload.len().min(4));
                println!(
                    "  {i:>3}  {}  selector 0x{}  args 0x{}",
                    action.target,
                    hex::encode(selector),
                    hex::encode(args)
                );
            }
        }
        Some(other) => println!("script with unknown spec id {other}"),
        None => println!("not a script: fewer than 4 bytes"),
    }

    Ok(())
}

fn print_event(event: &Event) {
    let time = Local
        .from_utc_datetime(&event.timestamp.naive_utc())
        .format("%H:%M:%S");
    let at = event.emitter;

    match &event.kind {
        EventKind::EntrySet {
            namespace,
            app_id,
            implementation,
        } => {
            let namespace = runtime::Namespace::from_id(namespace)
                .map(|ns| ns.name().to_string())
                .unwrap_or_else(|_| namespace.to_string());
            println!("[{time}] {at} SET APP {namespace}/{app_id} -> {implementation}");
        }
        EventKind::InstanceCreated {
            proxy,
            app_id,
            upgradeable,
        } => {
            let flavor = if *upgradeable { "upgradeable" } else { "pinned" };
            println!("[{time}] {at} NEW INSTANCE {proxy} ({flavor}) for {app_id}");
        }
        EventKind::PermissionCreated {
            target,
            role,
            manager,
        } => {
            println!("[{time}] {at} CREATE PERMISSION {role} on {target}, manager {manager}");
        }
        EventKind::PermissionGranted {
            grantee,
            target,
            role,
            predicates,
        } => {
            let conditions = if predicates.is_empty() {
                String::new()
            } else {
                format!(" when {predicates:?}")
            };
            println!("[{time}] {at} GRANT {role} on {target} to {grantee}{conditions}");
        }
        EventKind::PermissionRevoked {
            grantee,
            target,
            role,
        } => {
            println!("[{time}] {at} REVOKE {role} on {target} from {grantee}");
        }
        EventKind::ManagerChanged {
            target,
            role,
            manager,
        } => {
            println!("[{time}] {at} MANAGER {role} on {target} -> {manager}");
        }
        EventKind::PermissionFrozen { target, role } => {
            println!("[{time}] {at} BURN {role} on {target}");
        }
        EventKind::ExecutorRegistered { index, executor } => {
            println!("[{time}] {at} EXECUTOR #{index} registered: {executor}");
        }
        EventKind::ExecutorEnabled { index, executor } => {
            println!("[{time}] {at} EXECUTOR #{index} enabled: {executor}");
        }
        EventKind::ExecutorDisabled { index, executor } => {
            println!("[{time}] {at} EXECUTOR #{index} disabled: {executor}");
        }
        EventKind::ScriptCall {
            sender,
            source,
            target,
        } => {
            println!("[{time}] {at} SCRIPT CALL {source} -> {target} (sender {sender})");
        }
        EventKind::ScriptResult {
            executor,
            script,
            input,
            output,
        } => {
            println!(
                "[{time}] {at} SCRIPT RESULT via {executor}: {}B script, {}B input, output 0x{}",
                script.len(),
                input.len(),
                hex::encode(output)
            );
        }
    }
}

fn open_store(db_path: &Path) -> Result<EventStore> {
    if !db_path.exists() {
        return Err(Error::DatabaseNotFound {
            path: db_path.to_path_buf(),
        });
    }

    Ok(EventStore::open(db_path)?)
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/charter"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("charter"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("charter"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
