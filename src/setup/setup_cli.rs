use blog_front::config::Config;
use blog_front::helper::sanitization_helpers::slugify;
use blog_front::models::db_operations::{taxonomy_db_operations, users_db_operations};
use blog_front::setup::db_setup;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial blog setup.", long_about = None)]
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
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    Topic {
        #[command(subcommand)]
        action: TopicAction,
    },
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "member", value_parser = ["admin", "member"])]
        role: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum TopicAction {
    Create {
        #[arg(long)]
        name: String,
        /// Defaults to the slugified name.
        #[arg(long)]
        slug: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum TagAction {
    Create {
        #[arg(long)]
        label: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action: DbAction::Setup } => setup_blog_database(&config),
        Commands::User { action } => match action {
            UserAction::Create { username, password, role } => create_user(&config, username, password, role),
            UserAction::List => list_users(&config),
        },
        Commands::Topic { action: TopicAction::Create { name, slug } } => {
            create_topic(&config, name, slug.as_deref())
        }
        Commands::Tag { action: TagAction::Create { label } } => create_tag(&config, label),
    }
}

fn setup_blog_database(config: &Config) {
    let db_path = config.blog_db_path();
    if db_path.exists() {
        println!("ℹ️ Blog database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up blog database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Error: Could not create database directory: {}", e);
            return;
        }
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Error: Could not create blog database file: {}", e);
            return;
        }
    };
    match db_setup::setup_blog_db(&mut conn) {
        Ok(_) => println!("✅ Blog database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up blog database: {}", e),
    }
}

/// Opens the existing blog database with foreign keys on, or reports why it can't.
fn open_blog_database(config: &Config) -> Option<Connection> {
    let db_path = config.blog_db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Blog database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    let conn = match Connection::open(&db_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Error opening blog database: {}", e);
            return None;
        }
    };
    if let Err(e) = conn.execute_batch("PRAGMA foreign_keys = ON;") {
        eprintln!("❌ Error enabling foreign keys: {}", e);
        return None;
    }
    Some(conn)
}

fn create_user(config: &Config, username: &str, password: &str, role: &str) {
    let Some(conn) = open_blog_database(config) else { return };
    match users_db_operations::create_user(&conn, username.trim(), password, role) {
        Ok(id) => println!("✅ User '{}' ({}) created with id {}.", username.trim(), role, id),
        Err(e) => eprintln!(
            "❌ Error creating user: {}. It might be because the username already exists.",
            e
        ),
    }
}

fn list_users(config: &Config) {
    let Some(conn) = open_blog_database(config) else { return };
    match users_db_operations::read_all_users(&conn) {
        Ok(users) => {
            println!("Listing Users:");
            for user in users {
                let status = if user.is_active { "active" } else { "suspended" };
                println!("- [{}] {} ({}, {})", user.id, user.username, user.role, status);
            }
        }
        Err(e) => eprintln!("❌ Error fetching users: {}", e),
    }
}

fn create_topic(config: &Config, name: &str, slug: Option<&str>) {
    let Some(conn) = open_blog_database(config) else { return };
    let slug = slugify(slug.unwrap_or(name));
    if slug.is_empty() {
        eprintln!("❌ Error: Topic slug would be empty. Pass --slug explicitly.");
        return;
    }
    match taxonomy_db_operations::create_topic(&conn, name.trim(), &slug) {
        Ok(topic) => println!("✅ Topic '{}' created with slug '{}' (id {}).", topic.name_topic, topic.slug_topic, topic.id),
        Err(e) => eprintln!("❌ Error creating topic: {}. The slug might already be taken.", e),
    }
}

fn create_tag(config: &Config, label: &str) {
    let Some(conn) = open_blog_database(config) else { return };
    match taxonomy_db_operations::create_tag(&conn, label.trim()) {
        Ok(tag) => println!("✅ Tag '{}' created with id {}.", tag.tag, tag.id),
        Err(e) => eprintln!("❌ Error creating tag: {}", e),
    }
}
