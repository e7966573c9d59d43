//! # Pricing Engine CLI
//!
//! Runs the rule engine over an order file and prints a diagnostic report.
//!
//! ## Commands
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pricing run --order order.json [--rules-version v1.2] [--json]         │
//! │     order.json ──► validate ──► Engine::run_engine ──► report / JSON    │
//! │                                      ▲                                  │
//! │                     rules/<version>_rules.{json,yaml}                   │
//! │                                                                         │
//! │  pricing validate [VERSION...]                                          │
//! │     compiles packs (all in the rules dir when none given)               │
//! │                                                                         │
//! │  pricing config                                                         │
//! │     prints the effective configuration as TOML                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Exit Codes
//! - `0` - order approved / all packs valid
//! - `1` - error (bad input, missing pack, invalid pack, cancelled)
//! - `2` - order blocked by at least one guard

mod config;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pricing_core::validation::validate_order;
use pricing_core::{
    cancellation_pair, normalize_version, CompiledRulePack, Engine, EngineResult, Order,
    RulePackProvider, RunContext,
};
use pricing_packs::{read_pack_file, CachedRulePackProvider, FileRulePackProvider};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::report::DiagnosticReport;

/// Exit code for an order rejected by guards.
const EXIT_BLOCKED: u8 = 2;

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "pricing", version, about = "Pricing rule engine diagnostic tool")]
struct Cli {
    /// Config file (defaults to the platform config dir's pricing.toml)
    #[arg(long, global = true, env = "PRICING_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding <version>_rules.{json,yaml,yml} files
    #[arg(long, global = true)]
    rules_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Price an order and print the diagnostic report
    Run {
        /// Order JSON file
        #[arg(long, short)]
        order: PathBuf,

        /// Rules version (defaults to the order's rulesVersion, then config)
        #[arg(long = "rules-version", short = 'r')]
        rules_version: Option<String>,

        /// Correlation id (defaults to the order's, then a fresh UUID)
        #[arg(long)]
        correlation_id: Option<String>,

        /// Who asked for the run, recorded in logs
        #[arg(long)]
        requested_by: Option<String>,

        /// Print the raw engine result as JSON instead of the report
        #[arg(long)]
        json: bool,
    },

    /// Compile rule packs and report skipped rules
    Validate {
        /// Versions to check (all packs in the rules dir when omitted)
        versions: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

// =============================================================================
// Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = EngineConfig::load(cli.config.as_deref())
        .context("Failed to load pricing configuration")?;
    if let Some(dir) = cli.rules_dir {
        config.rules_dir = dir;
    }
    debug!(?config, "Configuration loaded");

    match cli.command {
        Command::Run {
            order,
            rules_version,
            correlation_id,
            requested_by,
            json,
        } => {
            let request = RunRequest {
                order_path: order,
                rules_version,
                correlation_id,
                requested_by,
            };
            let result = run(&config, request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", DiagnosticReport::new(&result));
            }

            if result.is_blocked() {
                Ok(ExitCode::from(EXIT_BLOCKED))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Command::Validate { versions } => {
            if validate(&config, &versions)? > 0 {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initializes the tracing subscriber. Logs go to stderr so stdout stays
/// parseable with `--json`.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=pricing_core=trace` - Trace the engine only
/// - Default: INFO, DEBUG for the pricing crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pricing=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// =============================================================================
// Run
// =============================================================================

struct RunRequest {
    order_path: PathBuf,
    rules_version: Option<String>,
    correlation_id: Option<String>,
    requested_by: Option<String>,
}

fn build_provider(config: &EngineConfig) -> Arc<dyn RulePackProvider> {
    let files = FileRulePackProvider::new(&config.rules_dir);
    if config.cache_packs {
        Arc::new(CachedRulePackProvider::new(files))
    } else {
        Arc::new(files)
    }
}

fn read_order(path: &Path) -> Result<Order> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read order file {}", path.display()))?;
    let order: Order = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse order file {}", path.display()))?;
    validate_order(&order).context("Order rejected")?;
    Ok(order)
}

/// Version precedence: flag, then the order's own, then config.
fn pick_version(flag: Option<&str>, order: &Order, config: &EngineConfig) -> String {
    match flag {
        Some(v) => normalize_version(v),
        None if !order.rules_version.trim().is_empty() => normalize_version(&order.rules_version),
        None => config.default_version(),
    }
}

fn pick_correlation_id(flag: Option<String>, order: &Order) -> String {
    flag.or_else(|| {
        let id = order.correlation_id.trim();
        (!id.is_empty()).then(|| id.to_string())
    })
    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Runs the engine on a blocking thread while Ctrl+C cancels between rules.
async fn run(config: &EngineConfig, request: RunRequest) -> Result<EngineResult> {
    let order = read_order(&request.order_path)?;
    let version = pick_version(request.rules_version.as_deref(), &order, config);

    let (handle, signal) = cancellation_pair();
    let mut ctx = RunContext::new(pick_correlation_id(request.correlation_id, &order))
        .with_cancellation(signal);
    if let Some(who) = request.requested_by {
        ctx = ctx.requested_by(who);
    }

    info!(
        order_id = %order.id,
        version = %version,
        correlation_id = %ctx.correlation_id,
        "Pricing order"
    );

    let engine = Engine::new(build_provider(config))
        .with_default_guard_message(config.default_guard_message.clone());

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            handle.cancel();
        }
    });

    let outcome =
        tokio::task::spawn_blocking(move || engine.run_engine(&ctx, &order, &version)).await;
    ctrl_c.abort();

    let result = outcome.context("Engine task panicked")??;
    Ok(result)
}

// =============================================================================
// Validate
// =============================================================================

/// Compiles each pack and prints one status line per version. Returns the
/// number of packs that failed.
fn validate(config: &EngineConfig, versions: &[String]) -> Result<usize> {
    let files = FileRulePackProvider::new(&config.rules_dir);

    let versions: Vec<String> = if versions.is_empty() {
        files.available_versions().with_context(|| {
            format!("Failed to list rules dir {}", config.rules_dir.display())
        })?
    } else {
        versions.iter().map(|v| normalize_version(v)).collect()
    };

    if versions.is_empty() {
        bail!("No rule packs found in {}", config.rules_dir.display());
    }

    let mut failures = 0;
    for version in &versions {
        match compile_version(&files, version) {
            Ok(pack) => {
                println!("OK    {} ({} rules)", version, pack.len());
                for skipped in pack.skipped() {
                    println!("      skipped: {}", skipped);
                }
                for rule in pack.rules().iter().filter(|r| r.logic.is_err()) {
                    println!("      malformed logic: {}", rule.id);
                }
            }
            Err(e) => {
                failures += 1;
                println!("FAIL  {}: {:#}", version, e);
            }
        }
    }

    Ok(failures)
}

fn compile_version(files: &FileRulePackProvider, version: &str) -> Result<CompiledRulePack> {
    let path = files.locate(version)?;
    let raw = read_pack_file(&path)?;
    Ok(CompiledRulePack::compile(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn order_with(version: &str, correlation_id: &str) -> Order {
        Order {
            rules_version: version.to_string(),
            correlation_id: correlation_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_version_precedence() {
        let config = EngineConfig::default();

        assert_eq!(pick_version(Some("1.2"), &order_with("v1.1", ""), &config), "v1.2");
        assert_eq!(pick_version(None, &order_with("1.1", ""), &config), "v1.1");
        assert_eq!(pick_version(None, &order_with(" ", ""), &config), "v1.0");
    }

    #[test]
    fn test_correlation_id_precedence() {
        assert_eq!(
            pick_correlation_id(Some("flag".into()), &order_with("", "order")),
            "flag"
        );
        assert_eq!(pick_correlation_id(None, &order_with("", "order")), "order");

        let generated = pick_correlation_id(None, &order_with("", ""));
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
    }

    #[test]
    fn test_read_order_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("order.json");
        std::fs::write(
            &path,
            r#"{"id":"o","items":[{"sku":"A","value":10.0,"qty":-1}]}"#,
        )
        .unwrap();

        assert!(read_order(&path).is_err());
    }

    #[test]
    fn test_demo_order_parses() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/order.json");
        let order = read_order(&path).unwrap();
        assert_eq!(order.id, "ORD-CLI-2024");
        assert_eq!(order.items.len(), 1);
    }

    #[tokio::test]
    async fn test_run_demo_order_against_shipped_rules() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
        let config = EngineConfig {
            rules_dir: root.join("rules"),
            ..Default::default()
        };
        let request = RunRequest {
            order_path: root.join("demos/order.json"),
            rules_version: None,
            correlation_id: None,
            requested_by: Some("test".into()),
        };

        let result = run(&config, request).await.unwrap();
        assert_eq!(result.rules_version, "v1.0");
        assert!(!result.is_blocked());
        assert!(result.authoritative_change);
    }

    #[test]
    fn test_validate_shipped_packs() {
        let config = EngineConfig {
            rules_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../rules"),
            ..Default::default()
        };
        assert_eq!(validate(&config, &[]).unwrap(), 0);
        assert_eq!(validate(&config, &["9.9".to_string()]).unwrap(), 1);
    }

    #[test]
    fn test_validate_empty_dir() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            rules_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(validate(&config, &[]).is_err());
    }
}
