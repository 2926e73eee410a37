use catalog::{migrations, Catalog, Config};
use clap::{Parser, Subcommand};

/// Manage the catalog database schema.
#[derive(Parser, Debug)]
#[command(name = "catalog", version, about)]
struct Args {
    /// Overrides DATABASE_URL.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations.
    Migrate,
    /// Revert the most recently applied migration.
    Rollback,
    /// List migrations and whether they are applied.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    let catalog = Catalog::connect(&config).await?;
    let migrator = catalog.database().migrator().register_all(migrations::all());

    match args.command {
        Command::Migrate => {
            let applied = migrator.run().await?;
            if applied.is_empty() {
                println!("No migrations to apply.");
            }
            for label in applied {
                println!("Applied {}", label);
            }
        }
        Command::Rollback => match migrator.rollback().await? {
            Some(label) => println!("Reverted {}", label),
            None => println!("No migrations to revert."),
        },
        Command::Status { json } => {
            let status = migrator.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                for entry in status {
                    match entry.applied {
                        Some(at) => println!("[X] {}.{} (applied {})", entry.app, entry.name, at.to_rfc3339()),
                        None => println!("[ ] {}.{}", entry.app, entry.name),
                    }
                }
            }
        }
    }

    catalog.database().close().await;
    Ok(())
}
