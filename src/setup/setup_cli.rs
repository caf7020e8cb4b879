use clap::{Parser, Subcommand};
use pathsite_backend::config::Config;
use pathsite_backend::helper::admin_helpers::MIN_PASSWORD_LENGTH;
use pathsite_backend::models::db_operations::{users_db_operations, DbError};
use pathsite_backend::models::Role;
use pathsite_backend::setup::db_setup;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial site setup and admin management.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates the site database and its tables.
    Setup,
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    /// Creates a user holding the admin role.
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        full_name: Option<String>,
    },
    List,
    ChangePassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        new_password: String,
    },
    /// Removes the admin role. The account itself is kept.
    Revoke {
        #[arg(long)]
        email: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_site_database(&config),
        },
        Commands::Admin { action } => match action {
            AdminAction::Create { email, password, full_name } => {
                create_admin_user(&config, email, password, full_name.as_deref());
            }
            AdminAction::List => list_admin_users(&config),
            AdminAction::ChangePassword { email, new_password } => {
                change_admin_password(&config, email, new_password);
            }
            AdminAction::Revoke { email } => revoke_admin(&config, email),
        },
    }
}

fn setup_site_database(config: &Config) {
    let db_path = config.site_db_path();
    println!("\nSetting up site database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create site database file.");
    match db_setup::setup_site_db(&mut conn) {
        Ok(_) => println!("✅ Site database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up site database: {}", e),
    }
}

fn open_site_db(config: &Config) -> Option<Connection> {
    let db_path = config.site_db_path();
    if !db_path.exists() {
        eprintln!("❌ Error: Site database not found at '{}'. Please run `setup_cli db setup` first.", db_path.display());
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error opening site database: {}", e);
            None
        }
    }
}

fn create_admin_user(config: &Config, email: &str, password: &str, full_name: Option<&str>) {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        eprintln!("❌ Error: Password must be at least {} characters.", MIN_PASSWORD_LENGTH);
        return;
    }
    let Some(mut conn) = open_site_db(config) else { return };

    let email = email.trim();
    match users_db_operations::create_identity_with_role(&mut conn, email, password, full_name, Some(Role::Admin)) {
        Ok(identity) => println!("✅ Admin user '{}' created successfully.", identity.email),
        Err(DbError::Conflict(_)) => {
            eprintln!("❌ Error: A user with email '{}' already exists.", email);
        }
        Err(e) => eprintln!("❌ Error creating admin user: {}", e),
    }
}

fn list_admin_users(config: &Config) {
    let Some(conn) = open_site_db(config) else { return };
    match users_db_operations::read_role_holder_emails(&conn, Role::Admin) {
        Ok(emails) => {
            println!("Listing Admin Users:");
            for email in emails {
                println!("- {}", email);
            }
        }
        Err(e) => eprintln!("❌ Error fetching admins: {}", e),
    }
}

fn change_admin_password(config: &Config, email: &str, new_password: &str) {
    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        eprintln!("❌ Error: Password must be at least {} characters.", MIN_PASSWORD_LENGTH);
        return;
    }
    let Some(conn) = open_site_db(config) else { return };
    match users_db_operations::change_password(&conn, email.trim(), new_password) {
        Ok(0) => eprintln!("❌ Error: No user with email '{}' found.", email),
        Ok(_) => println!("✅ Password for '{}' changed successfully.", email),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}

fn revoke_admin(config: &Config, email: &str) {
    let Some(conn) = open_site_db(config) else { return };
    let identity = match users_db_operations::read_identity_by_email(&conn, email.trim()) {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            eprintln!("❌ Error: No user with email '{}' found.", email);
            return;
        }
        Err(e) => {
            eprintln!("❌ Error looking up user: {}", e);
            return;
        }
    };
    match users_db_operations::remove_role(&conn, &identity.id, Role::Admin) {
        Ok(0) => println!("ℹ️ '{}' does not hold the admin role.", identity.email),
        Ok(_) => println!("✅ Admin role removed from '{}'.", identity.email),
        Err(e) => eprintln!("❌ Error removing admin role: {}", e),
    }
}
