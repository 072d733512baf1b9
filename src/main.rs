use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use datasync::config::{AppPaths, ConnectionRegistry};
use datasync::infra::import::{list_sheets, read_sheet};
use datasync::infra::mapping_store::MappingStore;
use datasync::infra::sqlite::repo::SqliteStore;
use datasync::infra::sqlite::schema::primary_key;
use datasync::logging::init_tracing;
use datasync::platform::worker::SerialWorker;
use datasync::usecase::ports::sheet::SheetData;
use datasync::usecase::ports::target::TargetStore;
use datasync::{
    CancelToken, ColumnMapping, ColumnPair, ReconciliationPlan, Selection, SyncControl,
    SyncSession,
};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose)?;
    let paths = AppPaths::resolve(cli.data_dir)?;

    match cli.command {
        Command::Sheets { file } => {
            for name in list_sheets(&file)? {
                println!("{name}");
            }
        }
        Command::Tables { target } => {
            let store = open_store(&paths, &target)?;
            for table in store.list_tables()? {
                println!("{table}");
            }
        }
        Command::Columns { target, table } => {
            let store = open_store(&paths, &target)?;
            let columns = store.describe_table(&table)?;
            if columns.is_empty() {
                bail!("table '{table}' not found");
            }
            for column in columns {
                let mut flags = Vec::new();
                if column.primary_key {
                    flags.push("primary key");
                }
                if column.not_null {
                    flags.push("not null");
                }
                if column.has_default {
                    flags.push("default");
                }
                println!(
                    "{}\t{}\t{}",
                    column.name,
                    column.declared_type,
                    flags.join(", ")
                );
            }
        }
        Command::Preview(args) => {
            let (mut session, sheet, store) = prepare(&paths, &args)?;
            let plan = session.generate_preview(&sheet, &store)?;
            print_plan(plan);
        }
        Command::Sync { args, yes } => {
            let (mut session, sheet, mut store) = prepare(&paths, &args)?;
            let plan = session.generate_preview(&sheet, &store)?;
            print_plan(plan);
            let counts = plan.counts();
            if counts.executable() == 0 {
                println!("nothing to apply");
                return Ok(());
            }
            if !yes && !confirm(counts.new_count, counts.update_count)? {
                println!("aborted");
                return Ok(());
            }

            let control = SyncControl {
                cancel: CancelToken::new(),
                on_progress: Some(Box::new(|current, total| {
                    tracing::debug!(current, total, "sync progress");
                })),
            };
            let result = SerialWorker::new()
                .run(|| session.execute(&mut store, &control))??
                .into_result()?;
            println!(
                "applied {} change(s): {} inserted, {} updated",
                result.applied_count, result.inserted, result.updated
            );
        }
        Command::Mapping(command) => run_mapping(&paths, command)?,
        Command::Connection(command) => run_connection(&paths, command)?,
    }

    Ok(())
}

fn run_mapping(paths: &AppPaths, command: MappingCommand) -> Result<()> {
    let store = MappingStore::new(paths.mappings_file());
    match command {
        MappingCommand::Save {
            name,
            table,
            columns,
        } => {
            let mapping = columns.to_mapping()?;
            store.save(&name, &table, &mapping)?;
            println!("saved mapping '{name}'");
        }
        MappingCommand::List {
            target,
            table,
            file,
            sheet,
        } => {
            let names = match (table, file) {
                (Some(table), Some(file)) => {
                    let target_store = open_store(paths, &target)?;
                    let target_columns: Vec<String> = target_store
                        .describe_table(&table)?
                        .into_iter()
                        .map(|column| column.name)
                        .collect();
                    let source_columns = read_sheet(&file, sheet.as_deref())?.headers;
                    store.compatible(&table, &source_columns, &target_columns)?
                }
                (None, None) => store.list_all()?,
                _ => bail!("--table and --file must be given together"),
            };
            for name in names {
                println!("{name}");
            }
        }
        MappingCommand::Show { name } => {
            let saved = store
                .load(&name)?
                .ok_or_else(|| anyhow!("no mapping named '{name}'"))?;
            println!("{}", serde_json::to_string_pretty(&saved)?);
        }
        MappingCommand::Delete { name } => {
            if !store.delete(&name)? {
                bail!("no mapping named '{name}'");
            }
            println!("deleted mapping '{name}'");
        }
    }
    Ok(())
}

fn run_connection(paths: &AppPaths, command: ConnectionCommand) -> Result<()> {
    let registry = ConnectionRegistry::new(paths.connections_file());
    match command {
        ConnectionCommand::Add { name, path } => {
            let path = path
                .canonicalize()
                .with_context(|| format!("database not found: {}", path.display()))?;
            registry.add(&name, &path)?;
            println!("added connection '{name}' -> {}", path.display());
        }
        ConnectionCommand::List => {
            for name in registry.available_connections()? {
                let profile = registry.get(&name)?;
                println!("{name}\t{}", profile.path.display());
            }
        }
        ConnectionCommand::Remove { name } => {
            if !registry.remove(&name)? {
                bail!("no connection named '{name}'");
            }
            println!("removed connection '{name}'");
        }
    }
    Ok(())
}

fn open_store(paths: &AppPaths, target: &TargetArgs) -> Result<SqliteStore> {
    let (db_path, _) = resolve_target(paths, target)?;
    Ok(SqliteStore::open(&db_path)?)
}

/// Database path plus the name the session records for it.
fn resolve_target(paths: &AppPaths, target: &TargetArgs) -> Result<(PathBuf, String)> {
    match (&target.db, &target.connection) {
        (Some(db), None) => Ok((db.clone(), db.display().to_string())),
        (None, Some(name)) => {
            let profile = ConnectionRegistry::new(paths.connections_file()).get(name)?;
            Ok((profile.path, name.clone()))
        }
        (Some(_), Some(_)) => bail!("use either --db or --connection, not both"),
        (None, None) => bail!("a target database is required (--db or --connection)"),
    }
}

fn prepare(
    paths: &AppPaths,
    args: &PlanArgs,
) -> Result<(SyncSession, SheetData, SqliteStore)> {
    let (db_path, connection) = resolve_target(paths, &args.target)?;
    let store = SqliteStore::open(&db_path)?;
    let sheet = read_sheet(&args.file, args.sheet.as_deref())?;
    let mapping = resolve_mapping(paths, args, &store)?;

    let mut session = SyncSession::new();
    session.select(Selection {
        source: args.file.display().to_string(),
        sheet: sheet.name.clone(),
        connection,
        table: args.table.clone(),
        mapping,
    });
    Ok((session, sheet, store))
}

/// Mapping from `--mapping NAME`, or from `--key`/`--map`. Without `--key`
/// the table's single-column primary key is matched by name.
fn resolve_mapping(
    paths: &AppPaths,
    args: &PlanArgs,
    store: &SqliteStore,
) -> Result<ColumnMapping> {
    if let Some(name) = &args.mapping {
        let saved = MappingStore::new(paths.mappings_file())
            .load(name)?
            .ok_or_else(|| anyhow!("no mapping named '{name}'"))?;
        if saved.table != args.table {
            bail!(
                "mapping '{name}' was saved for table '{}', not '{}'",
                saved.table,
                args.table
            );
        }
        return Ok(saved.to_mapping()?);
    }

    if args.columns.key.is_some() {
        return Ok(args.columns.to_mapping()?);
    }

    let key = match primary_key(store.connection(), &args.table)?.as_slice() {
        [column] => column.clone(),
        _ => bail!(
            "table '{}' has no single-column primary key; pass --key",
            args.table
        ),
    };
    let values = parse_pairs(&args.columns.map)?;
    Ok(ColumnMapping::new(ColumnPair::new(key.clone(), key), values)?)
}

fn parse_pairs(pairs: &[String]) -> Result<Vec<ColumnPair>> {
    pairs
        .iter()
        .map(|pair| ColumnPair::parse(pair).map_err(Into::into))
        .collect()
}

fn print_plan(plan: &ReconciliationPlan) {
    let counts = plan.counts();
    for row in plan.preview_rows() {
        println!(
            "{:<8}\t{}\t{}\t{}\t{}\t{}",
            row.highlight.label(),
            row.key,
            row.column,
            row.source_value,
            row.target_value,
            row.action
        );
    }
    println!(
        "{} new, {} update(s), {} invalid",
        counts.new_count, counts.update_count, counts.invalid_count
    );
    if counts.duplicate_target_keys > 0 {
        println!(
            "warning: {} table row(s) share a key with a later row",
            counts.duplicate_target_keys
        );
    }
    if counts.duplicate_source_keys > 0 {
        println!(
            "warning: {} spreadsheet row(s) repeat an earlier key",
            counts.duplicate_source_keys
        );
    }
    if counts.skipped_missing_key > 0 {
        println!(
            "warning: {} spreadsheet row(s) skipped for a blank key",
            counts.skipped_missing_key
        );
    }
}

fn confirm(new_count: usize, update_count: usize) -> Result<bool> {
    print!("Apply {new_count} insert(s) and {update_count} update(s)? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile spreadsheet rows against a database table."
)]
struct Cli {
    /// Directory holding saved mappings and connections.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the sheets of a workbook.
    Sheets { file: PathBuf },
    /// List the tables of the target database.
    Tables {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Describe the columns of a table.
    Columns {
        #[command(flatten)]
        target: TargetArgs,
        table: String,
    },
    /// Show the change set without touching the database.
    Preview(PlanArgs),
    /// Preview, confirm, and apply the change set in one transaction.
    Sync {
        #[command(flatten)]
        args: PlanArgs,
        /// Apply without asking for confirmation.
        #[arg(long)]
        yes: bool,
    },
    /// Manage saved column mappings.
    #[command(subcommand)]
    Mapping(MappingCommand),
    /// Manage named database connections.
    #[command(subcommand)]
    Connection(ConnectionCommand),
}

#[derive(Args)]
struct TargetArgs {
    /// SQLite database file.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Registered connection name.
    #[arg(long)]
    connection: Option<String>,
}

#[derive(Args)]
struct ColumnArgs {
    /// Key column pair as SOURCE=TARGET.
    #[arg(long)]
    key: Option<String>,

    /// Value column pair as SOURCE=TARGET; repeatable.
    #[arg(long = "map")]
    map: Vec<String>,
}

impl ColumnArgs {
    fn to_mapping(&self) -> Result<ColumnMapping> {
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| anyhow!("--key is required"))?;
        Ok(ColumnMapping::new(
            ColumnPair::parse(key)?,
            parse_pairs(&self.map)?,
        )?)
    }
}

#[derive(Args)]
struct PlanArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Spreadsheet file (.xlsx, .xls, .xlsm, .ods or .csv).
    #[arg(long)]
    file: PathBuf,

    /// Sheet name; defaults to the first sheet.
    #[arg(long)]
    sheet: Option<String>,

    /// Target table.
    #[arg(long)]
    table: String,

    #[command(flatten)]
    columns: ColumnArgs,

    /// Saved mapping to use instead of --key/--map.
    #[arg(long, conflicts_with_all = ["key", "map"])]
    mapping: Option<String>,
}

#[derive(Subcommand)]
enum MappingCommand {
    /// Save a mapping under a name.
    Save {
        name: String,
        #[arg(long)]
        table: String,
        #[command(flatten)]
        columns: ColumnArgs,
    },
    /// List saved mappings, or only those usable with a table and file.
    List {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        table: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Print a saved mapping as JSON.
    Show { name: String },
    /// Delete a saved mapping.
    Delete { name: String },
}

#[derive(Subcommand)]
enum ConnectionCommand {
    /// Register a SQLite database under a name.
    Add { name: String, path: PathBuf },
    /// List registered connections.
    List,
    /// Forget a registered connection.
    Remove { name: String },
}
