//! Command-line front end for the DermaCare procedure catalog.
//!
//! Every command prints one JSON envelope on stdout:
//! `{status, message, data, pagination?}`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use dermacare_core::import::{import_files, BatchStatus, ImportOptions};
use dermacare_core::model::{CatalogItem, EnumType, GlobalSettings, ProductKind};
use dermacare_core::pricing::{recalculate_all, recalculate_for_consumable, recalculate_for_element};
use dermacare_core::query::{
    filter_products, list_products, product_detail, search_procedures, sort_products, ClassFilter,
    Page, PageRequest, Pagination, ProcedureScope, ProductScope, SortField, SortOrder,
    DEFAULT_PAGE_SIZE,
};
use dermacare_core::repo::enum_repo::{EnumRepository, SqliteEnumRepository};
use dermacare_core::repo::item_repo::SqliteItemRepository;
use dermacare_core::{
    core_version, default_log_level, init_logging, open_db, schema_version, CatalogService,
    DeletionService,
};
use log::{error, info};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(
    name = "dermacare",
    version,
    about = "Procedure catalog import, pricing and queries"
)]
struct Cli {
    /// SQLite catalog database; created and migrated on first use.
    #[arg(long, env = "DERMACARE_DB", default_value = "dermacare.db")]
    db: PathBuf,

    /// Directory for rotating log files. Logging stays off when unset.
    #[arg(long, env = "DERMACARE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "DERMACARE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,
}

impl PageArgs {
    fn request(&self) -> Result<PageRequest> {
        Ok(PageRequest::new(self.page, self.page_size)?)
    }
}

#[derive(Debug, Args)]
struct ItemArgs {
    /// element|bundle|custom|sequence|consumable|procedure_info|standard_info|
    /// event_info|membership_info|standard|event|membership
    kind: String,

    id: i64,
}

impl ItemArgs {
    fn item(&self) -> Result<CatalogItem> {
        CatalogItem::parse(&self.kind, self.id)
            .ok_or_else(|| anyhow!("unknown item kind `{}`", self.kind))
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or migrate the database and report its schema version.
    Init,

    /// Import JSON sheets; file names select the target tables.
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Reprice the whole catalog after importing.
        #[arg(long, default_value_t = false)]
        recalculate: bool,
    },

    /// List lookup codes, optionally for one enum type.
    Enums {
        #[arg(long)]
        enum_type: Option<String>,
    },

    /// List products, standard before event, newest first.
    Products {
        /// all|standard|event
        #[arg(long, default_value = "all")]
        product_type: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Show one product with its expanded package.
    Product {
        /// standard|event
        kind: String,

        id: i64,
    },

    /// Search active procedures by name, class or description.
    Search {
        query: String,

        /// all|element|bundle|custom|sequence
        #[arg(long, default_value = "all")]
        procedure_type: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// List products sorted by price, name, date, type or discount.
    Sort {
        #[arg(long, default_value = "price")]
        sort_by: String,

        /// asc|desc
        #[arg(long, default_value = "asc")]
        order: String,

        #[arg(long, default_value = "all")]
        product_type: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// List products whose package reaches an element with the given classes.
    Filter {
        #[arg(long)]
        class_major: Option<String>,

        #[arg(long)]
        class_sub: Option<String>,

        #[arg(long)]
        class_detail: Option<String>,

        #[arg(long)]
        class_type: Option<String>,

        #[arg(long, default_value = "all")]
        product_type: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Recompute stored costs, for everything or for one item's dependents.
    Recalc {
        #[arg(long, conflicts_with = "element")]
        consumable: Option<i64>,

        #[arg(long)]
        element: Option<i64>,
    },

    /// Set labor rates per minute and reprice the catalog.
    Global {
        #[arg(long)]
        doc_rate: f64,

        #[arg(long)]
        aesthetician_rate: f64,
    },

    /// Show what references an item before deleting it.
    DeleteCheck(ItemArgs),

    /// Delete an item; referenced items need --force.
    Delete {
        #[command(flatten)]
        item: ItemArgs,

        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Activate an item, or deactivate it with --inactive.
    Release {
        #[command(flatten)]
        item: ItemArgs,

        #[arg(long, default_value_t = false)]
        inactive: bool,
    },
}

#[derive(Debug, Serialize)]
struct Envelope {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
}

struct Outcome {
    ok: bool,
    message: String,
    data: Value,
    pagination: Option<Pagination>,
}

impl Outcome {
    fn success(message: impl Into<String>, data: impl Serialize) -> Result<Self> {
        Ok(Self {
            ok: true,
            message: message.into(),
            data: serde_json::to_value(data)?,
            pagination: None,
        })
    }

    fn page<T: Serialize>(message: impl Into<String>, page: Page<T>) -> Result<Self> {
        Ok(Self {
            ok: true,
            message: message.into(),
            data: serde_json::to_value(page.items)?,
            pagination: Some(page.pagination),
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = start_logging(&cli) {
        eprintln!("warning: logging disabled: {err:#}");
    }

    let (code, envelope) = match run(&cli) {
        Ok(outcome) => (
            if outcome.ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            },
            Envelope {
                status: if outcome.ok { "success" } else { "error" },
                message: outcome.message,
                data: outcome.data,
                pagination: outcome.pagination,
            },
        ),
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err:#}");
            (
                ExitCode::FAILURE,
                Envelope {
                    status: "error",
                    message: format!("{err:#}"),
                    data: Value::Null,
                    pagination: None,
                },
            )
        }
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(encoded) => println!("{encoded}"),
        Err(err) => {
            eprintln!("failed to encode output: {err}");
            return ExitCode::FAILURE;
        }
    }
    code
}

fn start_logging(cli: &Cli) -> Result<()> {
    let Some(dir) = &cli.log_dir else {
        return Ok(());
    };
    let dir = absolute(dir)?;
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level, &dir)
        .with_context(|| format!("cannot start logging in {}", dir.display()))?;
    info!(
        "event=cli_start module=cli status=ok version={} command={:?}",
        core_version(),
        cli.command
    );
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("cannot resolve the working directory")?;
    Ok(cwd.join(path))
}

fn run(cli: &Cli) -> Result<Outcome> {
    let conn = open_db(&cli.db)
        .with_context(|| format!("cannot open catalog database {}", cli.db.display()))?;

    match &cli.command {
        Command::Init => Outcome::success(
            format!("catalog ready at {}", cli.db.display()),
            serde_json::json!({ "schema_version": schema_version() }),
        ),
        Command::Import { files, recalculate } => run_import(&conn, files, *recalculate),
        Command::Enums { enum_type } => {
            let repo = SqliteEnumRepository::try_new(&conn)?;
            let enum_type = enum_type.as_deref().map(EnumType::parse);
            let codes = repo.list_codes(enum_type.as_ref())?;
            Outcome::success(format!("{} code(s)", codes.len()), codes)
        }
        Command::Products { product_type, page } => {
            let scope = ProductScope::parse(product_type)?;
            let page = list_products(&conn, scope, page.request()?)?;
            Outcome::page("products listed", page)
        }
        Command::Product { kind, id } => {
            let kind = ProductKind::parse(kind)
                .ok_or_else(|| anyhow!("unknown product kind `{kind}`; expected standard|event"))?;
            let detail = product_detail(&conn, kind, *id)?;
            Outcome::success(format!("{} product {id}", kind.as_str()), detail)
        }
        Command::Search {
            query,
            procedure_type,
            page,
        } => {
            let scope = ProcedureScope::parse(procedure_type)?;
            let page = search_procedures(&conn, query, scope, page.request()?)?;
            Outcome::page(format!("search results for `{}`", query.trim()), page)
        }
        Command::Sort {
            sort_by,
            order,
            product_type,
            page,
        } => {
            let page = sort_products(
                &conn,
                SortField::parse(sort_by)?,
                SortOrder::parse(order)?,
                ProductScope::parse(product_type)?,
                page.request()?,
            )?;
            Outcome::page(format!("products sorted by {sort_by} {order}"), page)
        }
        Command::Filter {
            class_major,
            class_sub,
            class_detail,
            class_type,
            product_type,
            page,
        } => {
            let filter = ClassFilter {
                class_major: class_major.clone(),
                class_sub: class_sub.clone(),
                class_detail: class_detail.clone(),
                class_type: class_type.clone(),
            };
            let page = filter_products(
                &conn,
                &filter,
                ProductScope::parse(product_type)?,
                page.request()?,
            )?;
            Outcome::page("products filtered", page)
        }
        Command::Recalc {
            consumable,
            element,
        } => {
            let report = match (consumable, element) {
                (Some(id), _) => recalculate_for_consumable(&conn, *id)?,
                (None, Some(id)) => recalculate_for_element(&conn, *id)?,
                (None, None) => recalculate_all(&conn)?,
            };
            Outcome::success(format!("{} row(s) repriced", report.total()), report)
        }
        Command::Global {
            doc_rate,
            aesthetician_rate,
        } => {
            let service = CatalogService::try_new(&conn)?;
            let report = service.update_global_settings(&GlobalSettings {
                id: 1,
                doc_price_minute: *doc_rate,
                aesthetician_price_minute: *aesthetician_rate,
            })?;
            Outcome::success("labor rates updated", report)
        }
        Command::DeleteCheck(item) => {
            let service = DeletionService::new(SqliteItemRepository::try_new(&conn)?);
            let check = service.check(item.item()?)?;
            Outcome::success(format!("{} reference(s)", check.total_references), check)
        }
        Command::Delete { item, force } => {
            let service = DeletionService::new(SqliteItemRepository::try_new(&conn)?);
            let outcome = service.delete(item.item()?, *force)?;
            Outcome::success(format!("deleted {}", outcome.item), outcome)
        }
        Command::Release { item, inactive } => {
            let service = CatalogService::try_new(&conn)?;
            let change = service.set_release(item.item()?, !*inactive)?;
            Outcome::success(format!("release updated for {}", change.item), change)
        }
    }
}

fn run_import(conn: &Connection, files: &[PathBuf], recalculate: bool) -> Result<Outcome> {
    let report = import_files(conn, files, ImportOptions { recalculate });
    let message = format!(
        "{} of {} file(s) imported",
        report.successful_files, report.total_files
    );
    let ok = report.status == BatchStatus::Success;
    let mut outcome = Outcome::success(message, report)?;
    outcome.ok = ok;
    Ok(outcome)
}
