//! BrewHub operator CLI.
//!
//! # Usage
//!
//! ```bash
//! brewhub init
//! brewhub seed-categories
//! brewhub admin create --name "Owner" --phone 0901234567 --password secret1
//! brewhub user reset-password --phone 0901234567 --password secret2
//! brewhub menu search "cold brew"
//! brewhub report --from 2024-03-01 --to 2024-03-31
//! ```
//!
//! Commands run as the built-in system operator. Output is JSON on stdout.

use brewhub_core::db::Connection;
use brewhub_core::repo::catalog_repo::SqliteCatalogRepository;
use brewhub_core::repo::order_repo::SqliteOrderRepository;
use brewhub_core::repo::settings_repo::SqliteSettingsRepository;
use brewhub_core::repo::user_repo::{SqliteUserRepository, UserListQuery};
use brewhub_core::service::analytics_service::{AnalyticsQuery, AnalyticsService};
use brewhub_core::service::catalog_service::CatalogService;
use brewhub_core::service::settings_service::SettingsService;
use brewhub_core::service::user_service::UserService;
use brewhub_core::{search_menu, Actor, LogConfig, MenuSearchQuery};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::{CliConfig, Overrides};
use log::{error, info};
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

mod config;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "brewhub")]
#[command(author, version, about = "BrewHub store management tools")]
struct Cli {
    /// SQLite database file (overrides BREWHUB_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level (overrides BREWHUB_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Absolute log directory (overrides BREWHUB_LOG_DIR)
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the database
    Init,
    /// Insert the default menu categories
    SeedCategories,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Inspect the menu
    Menu {
        #[command(subcommand)]
        action: MenuAction,
    },
    /// Sales report for an inclusive date range
    Report {
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
    },
    /// Print current store settings
    Settings,
    /// Check core linkage
    Ping,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin account
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Set a new password for the account owning `phone`
    ResetPassword {
        #[arg(short, long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// List accounts
    List {
        #[arg(long)]
        include_archived: bool,
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand)]
enum MenuAction {
    /// List menu products, including unavailable ones
    List,
    /// Full-text search over the menu
    Search {
        text: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = CliConfig::load(Overrides {
        db_path: cli.db.clone(),
        log_level: cli.log_level.clone(),
        log_dir: cli.log_dir.clone(),
    });

    if let Some(log_dir) = &config.log_dir {
        let log_config = LogConfig {
            echo_warnings: true,
            ..LogConfig::new(config.log_level.as_str(), log_dir.as_str())
        };
        if let Err(err) = brewhub_core::init_logging_with(&log_config) {
            eprintln!("warning: {err}");
        }
    }

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &CliConfig) -> CliResult<()> {
    if let Commands::Ping = command {
        print_json(&json!({
            "ping": brewhub_core::ping(),
            "version": brewhub_core::core_version(),
        }))?;
        return Ok(());
    }

    let conn = brewhub_core::open_db(&config.db_path)?;
    let actor = Actor::system();

    match command {
        Commands::Ping => {}
        Commands::Init => {
            info!(
                "event=cli_init module=cli status=ok db_path={}",
                config.db_path.display()
            );
            print_json(&json!({ "db_path": config.db_path.display().to_string(), "ready": true }))?;
        }
        Commands::SeedCategories => {
            let service = CatalogService::new(SqliteCatalogRepository::try_new(&conn)?);
            let report = service.seed_default_categories(&actor)?;
            print_json(&json!({ "inserted": report.inserted, "skipped": report.skipped }))?;
        }
        Commands::Admin {
            action:
                AdminAction::Create {
                    name,
                    phone,
                    password,
                },
        } => {
            let service = UserService::new(SqliteUserRepository::try_new(&conn)?);
            let user = service.create_admin(&actor, &name, &phone, &password)?;
            print_json(&user)?;
        }
        Commands::User { action } => run_user(&conn, &actor, action)?,
        Commands::Menu { action } => run_menu(&conn, &actor, action)?,
        Commands::Report { from, to } => {
            let settings = SettingsService::new(SqliteSettingsRepository::try_new(&conn)?).load()?;
            let service = AnalyticsService::new(
                SqliteOrderRepository::try_new(&conn)?,
                SqliteUserRepository::try_new(&conn)?,
            );
            let query = AnalyticsQuery::new(from, to, settings.utc_offset());
            print_json(&service.report(&actor, &query)?)?;
        }
        Commands::Settings => {
            let settings = SettingsService::new(SqliteSettingsRepository::try_new(&conn)?).load()?;
            print_json(&settings)?;
        }
    }
    Ok(())
}

fn run_user(conn: &Connection, actor: &Actor, action: UserAction) -> CliResult<()> {
    let service = UserService::new(SqliteUserRepository::try_new(conn)?);
    match action {
        UserAction::ResetPassword { phone, password } => {
            let user = service.reset_password(actor, &phone, &password)?;
            print_json(&user)
        }
        UserAction::List {
            include_archived,
            limit,
        } => {
            let query = UserListQuery {
                include_archived,
                limit,
                ..UserListQuery::default()
            };
            print_json(&service.list_users(actor, &query)?)
        }
    }
}

fn run_menu(conn: &Connection, actor: &Actor, action: MenuAction) -> CliResult<()> {
    match action {
        MenuAction::List => {
            let service = CatalogService::new(SqliteCatalogRepository::try_new(conn)?);
            print_json(&service.list_menu(Some(actor), None)?)
        }
        MenuAction::Search { text, limit } => {
            let query = MenuSearchQuery {
                available_only: false,
                limit,
                ..MenuSearchQuery::new(text)
            };
            print_json(&search_menu(conn, &query)?)
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
