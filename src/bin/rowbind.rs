use clap::Parser;
use rowbind::config::{default_config_path, load_config, Config};
use rowbind::core::db::slot::{parse_type_list, Slot};
use rowbind::{Backend, ConnectParams, Connection, DbError, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Run one query and print its rows, one line per row.
#[derive(Debug, Parser)]
#[command(name = "rowbind", version, about, long_about = None)]
struct Args {
    /// TOML configuration file; defaults to the per-user config location
    #[arg(long, env = "ROWBIND_CONFIG", conflicts_with = "sqlite")]
    config: Option<PathBuf>,

    /// Query this SQLite database file instead of a configured backend
    #[arg(long, value_name = "PATH")]
    sqlite: Option<String>,

    /// Print each row as a JSON array
    #[arg(long)]
    json: bool,

    /// Comma separated column types: i(nt), s(tr), b(ool), t(ime), n(um), d(ay), c(hr)
    types: String,

    /// Query whose columns match the type list in order
    sql: String,
}

fn open_connection(args: &Args) -> Result<Connection> {
    if let Some(path) = &args.sqlite {
        let mut conn = Connection::new(Backend::Sqlite);
        conn.connect_with(ConnectParams::new(path.clone()))?;
        return Ok(conn);
    }
    let path = args
        .config
        .clone()
        .or_else(default_config_path)
        .ok_or_else(|| DbError::Config("no configuration directory available".to_string()))?;
    debug!("Using configuration {:?}", path);
    let config: Config = load_config(&path)?;
    config.open()
}

fn run(args: &Args) -> Result<u64> {
    let slots: Vec<Slot> = parse_type_list(&args.types)?
        .into_iter()
        .filter_map(Slot::for_type)
        .collect();
    let conn = open_connection(args)?;
    info!(backend = %conn.backend(), database = %conn.database_name(), "Connected");

    let mut rs = conn.create_row_set()?;
    for slot in &slots {
        rs.bind(slot.field_type(), slot.target())?;
    }
    rs.query(&args.sql)?;

    let mut rows = 0;
    while rs.get_next()?.is_row() {
        rows += 1;
        if args.json {
            let values: Vec<_> = slots.iter().map(Slot::to_json).collect();
            println!("{}", serde_json::Value::Array(values));
        } else {
            let values: Vec<String> = slots.iter().map(Slot::to_string).collect();
            println!("{}", values.join("\t"));
        }
    }
    Ok(rows)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(rows) => {
            info!(rows, "Query finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(code = e.code().id(), "{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
