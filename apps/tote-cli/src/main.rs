//! # tote: Cart From the Terminal
//!
//! Each invocation opens the stored cart, applies one command, waits for the
//! cart to reach storage, and prints it.
//!
//! ## Usage
//!
//! ```bash
//! # Add one unit of product 3, with names and prices from a catalog
//! tote --catalog items.json add 3
//!
//! # Take one unit away, dropping the line at zero
//! tote remove-one 3
//!
//! # Drop the line entirely
//! tote remove 3
//!
//! # Print the cart as JSON
//! tote show --json
//! ```
//!
//! ## Logging
//! `RUST_LOG` controls output on stderr (default `warn,tote=info`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tote_core::{Catalog, ProductId};
use tote_storage::ToteConfig;
use tote_store::CartStore;

mod error;
mod render;

use error::{CliError, CliResult};

#[derive(Debug, Parser)]
#[command(name = "tote")]
#[command(author, version, about = "Persistent shopping cart")]
struct Cli {
    /// Config file (defaults to the platform config dir's tote.toml)
    #[arg(long, global = true, env = "TOTE_CONFIG")]
    config: Option<PathBuf>,

    /// Product catalog JSON used for names, prices and id checks
    #[arg(long, global = true, env = "TOTE_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the cart
    Show {
        /// Print the snapshot as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add one unit of a product
    Add { id: ProductId },
    /// Remove one unit of a product
    RemoveOne { id: ProductId },
    /// Remove a product's line entirely
    Remove { id: ProductId },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Command failed: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - ERROR: Command failures
/// - WARN: Storage problems the cart recovered from
/// - INFO: Startup, hydration, shutdown
/// - DEBUG: Each cart operation
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,tote=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> CliResult<String> {
    let config = ToteConfig::load(cli.config)?;
    let catalog = cli.catalog.as_deref().map(load_catalog).transpose()?;

    let store = CartStore::from_config(&config)?;
    let mut errors = store.persistence_errors();

    let mut json = false;
    match cli.command {
        Command::Show { json: as_json } => json = as_json,
        Command::Add { id } => {
            ensure_known(catalog.as_ref(), id)?;
            store.increase_cart_quantity(id);
        }
        Command::RemoveOne { id } => store.decrease_cart_quantity(id),
        Command::Remove { id } => store.remove_from_cart(id),
    }

    store.shutdown().await?;

    if let Some(failure) = errors.as_mut().and_then(|rx| rx.try_recv().ok()) {
        return Err(failure.into());
    }

    let snapshot = store.snapshot();
    if json {
        Ok(format!("{}\n", serde_json::to_string_pretty(&snapshot)?))
    } else {
        Ok(render::render_cart(&snapshot, catalog.as_ref()))
    }
}

fn load_catalog(path: &Path) -> CliResult<Catalog> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::CatalogRead {
        path: path.to_path_buf(),
        source,
    })?;
    let catalog = Catalog::from_json(&contents)?;
    info!(path = %path.display(), products = catalog.len(), "Catalog loaded");
    Ok(catalog)
}

/// Without a catalog any id is accepted.
fn ensure_known(catalog: Option<&Catalog>, id: ProductId) -> CliResult<()> {
    match catalog {
        Some(catalog) if !catalog.contains(id) => Err(CliError::UnknownProduct(id)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    /// Config file pointing the file backend into a temp dir.
    fn workspace(flush_mode: &str) -> (TempDir, PathBuf) {
        let tmp = tempdir().unwrap();
        let config = tmp.path().join("tote.toml");
        fs::write(
            &config,
            format!(
                "[storage]\nbackend = \"file\"\ndata_dir = {:?}\n\n[persistence]\nflush_mode = \"{flush_mode}\"\n",
                tmp.path().join("data")
            ),
        )
        .unwrap();
        (tmp, config)
    }

    fn cli(config: &Path, args: &[&str]) -> Cli {
        let mut argv = vec!["tote", "--config", config.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        let parsed = Cli::try_parse_from(["tote", "remove-one", "12"]).unwrap();
        assert!(matches!(parsed.command, Command::RemoveOne { id } if id == ProductId(12)));

        assert!(Cli::try_parse_from(["tote", "add", "abc"]).is_err());
        assert!(Cli::try_parse_from(["tote", "add", "-1"]).is_err());
    }

    #[tokio::test]
    async fn test_cart_survives_invocations() {
        for mode in ["immediate", "coalesced"] {
            let (_tmp, config) = workspace(mode);

            run(cli(&config, &["add", "3"])).await.unwrap();
            run(cli(&config, &["add", "3"])).await.unwrap();
            let out = run(cli(&config, &["add", "5"])).await.unwrap();
            assert_eq!(out, "Cart: 3 items\n  2 x #3\n  1 x #5\n");

            let out = run(cli(&config, &["remove-one", "3"])).await.unwrap();
            assert_eq!(out, "Cart: 2 items\n  1 x #3\n  1 x #5\n");

            let out = run(cli(&config, &["remove", "5"])).await.unwrap();
            assert_eq!(out, "Cart: 1 item\n  1 x #3\n");
        }
    }

    #[tokio::test]
    async fn test_show_json() {
        let (_tmp, config) = workspace("immediate");
        run(cli(&config, &["add", "9"])).await.unwrap();

        let out = run(cli(&config, &["show", "--json"])).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["cartQuantity"], 1);
        assert_eq!(value["isOpen"], false);
        assert_eq!(value["cartItems"][0]["id"], 9);
    }

    #[tokio::test]
    async fn test_unknown_product_rejected_with_catalog() {
        let (tmp, config) = workspace("immediate");
        let catalog = tmp.path().join("items.json");
        fs::write(
            &catalog,
            r#"[{"id":1,"name":"Book","price":10.99,"imgUrl":"/imgs/book.jpg"}]"#,
        )
        .unwrap();
        let catalog_arg = catalog.to_str().unwrap();

        let err = run(cli(&config, &["--catalog", catalog_arg, "add", "2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::UnknownProduct(ProductId(2))));

        let out = run(cli(&config, &["--catalog", catalog_arg, "add", "1"]))
            .await
            .unwrap();
        assert!(out.contains("Book"));
        assert!(out.ends_with("Total: $10.99\n"));
    }

    #[tokio::test]
    async fn test_missing_catalog_file() {
        let (tmp, config) = workspace("immediate");
        let missing = tmp.path().join("nope.json");

        let err = run(cli(&config, &["--catalog", missing.to_str().unwrap(), "show"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::CatalogRead { .. }));
    }

    #[tokio::test]
    async fn test_unwritable_storage_reported() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let config = tmp.path().join("tote.toml");
        fs::write(
            &config,
            format!(
                "[storage]\ndata_dir = {:?}\n\n[persistence]\nflush_mode = \"immediate\"\n",
                blocker
            ),
        )
        .unwrap();

        let err = run(cli(&config, &["add", "1"])).await.unwrap_err();
        assert!(matches!(err, CliError::Persist(_)));
    }
}
