use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

// D-Bus proxy — `#[zbus::proxy]` generates `AttendanceProxy` with the
// daemon's well-known name and object path baked in.
#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn mark(
        &self,
        embedding: Vec<f64>,
        captured_at: &str,
        source: &str,
    ) -> zbus::Result<String>;
    async fn enroll(
        &self,
        identity: &str,
        display_name: &str,
        email: &str,
        department: &str,
        references: Vec<Vec<f64>>,
    ) -> zbus::Result<u32>;
    async fn unenroll(&self, identity: &str) -> zbus::Result<bool>;
    async fn list_identities(&self) -> zbus::Result<String>;
    async fn report(
        &self,
        identity: &str,
        period_from: &str,
        period_to: &str,
        status: &str,
    ) -> zbus::Result<String>;
    async fn summary(&self, limit: u32) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "rollcall attendance CLI")]
struct Cli {
    /// Connect to the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll an identity from a JSON file of reference embeddings
    Enroll {
        /// Identity id (e.g., badge number or username)
        id: String,
        /// Display name
        #[arg(short, long)]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        department: String,
        /// JSON file containing an array of embedding vectors
        #[arg(short = 'f', long)]
        references: PathBuf,
    },
    /// Remove an enrolled identity (attendance records are kept)
    Unenroll {
        /// Identity id to remove
        id: String,
    },
    /// List enrolled identities
    List,
    /// Feed one recognition event from a JSON embedding file
    Mark {
        /// JSON file containing a single embedding vector
        file: PathBuf,
        /// Capture timestamp, RFC 3339 (default: now)
        #[arg(long, default_value = "")]
        at: String,
        /// Camera / frame-source id
        #[arg(long, default_value = "")]
        source: String,
    },
    /// Show attendance records
    Report {
        #[arg(long, default_value = "")]
        identity: String,
        /// First period, e.g. 2025-06-01
        #[arg(long, default_value = "")]
        from: String,
        /// Last period (inclusive)
        #[arg(long, default_value = "")]
        to: String,
        #[arg(long, default_value = "")]
        status: String,
    },
    /// Show per-period attendance counts
    Summary {
        /// Number of periods to show
        #[arg(long, default_value_t = 14)]
        limit: u32,
    },
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = if cli.system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    }
    .context("connecting to D-Bus (is rollcalld running?)")?;
    let proxy = AttendanceProxy::new(&conn).await?;

    match cli.command {
        Commands::Enroll {
            id,
            name,
            email,
            department,
            references,
        } => {
            let vectors = read_vectors(&references)?;
            let count = proxy
                .enroll(&id, &name, &email, &department, vectors)
                .await?;
            println!("Enrolled {id} with {count} reference embedding(s)");
        }
        Commands::Unenroll { id } => {
            if proxy.unenroll(&id).await? {
                println!("Removed {id}");
            } else {
                println!("{id} is not enrolled");
            }
        }
        Commands::List => {
            print_pretty(&proxy.list_identities().await?)?;
        }
        Commands::Mark { file, at, source } => {
            let embedding = read_vector(&file)?;
            print_pretty(&proxy.mark(embedding, &at, &source).await?)?;
        }
        Commands::Report {
            identity,
            from,
            to,
            status,
        } => {
            print_pretty(&proxy.report(&identity, &from, &to, &status).await?)?;
        }
        Commands::Summary { limit } => {
            let raw = proxy.summary(limit).await?;
            let rows: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
            if rows.is_empty() {
                println!("No attendance records");
            }
            for row in rows {
                println!(
                    "{}: {} attendee(s)",
                    row["period"].as_str().unwrap_or("?"),
                    row["attendees"]
                );
            }
        }
        Commands::Status => {
            print_pretty(&proxy.status().await?)?;
        }
    }

    Ok(())
}

/// Read a JSON array of embedding vectors.
fn read_vectors(path: &Path) -> Result<Vec<Vec<f64>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Read a JSON file containing a single embedding vector.
fn read_vector(path: &Path) -> Result<Vec<f64>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_pretty(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
