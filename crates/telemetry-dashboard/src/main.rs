use std::future::Future;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use telemetry_dashboard::config::{self, DashboardConfig};
use telemetry_dashboard::dashboard::Dashboard;
use telemetry_dashboard::logging::init_logging;
use telemetry_dashboard::model::View;
use telemetry_dashboard::surface::RecordingSurface;
use telemetry_dashboard::transport::{HttpTransport, MemoryTransport, Transport};
use telemetry_dashboard::{Error, Result};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Args)]
struct Source {
    /// Dashboard config TOML (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serve endpoints from a JSON fixture instead of HTTP
    #[arg(long)]
    fixture: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive terminal dashboard with auto-refresh
    Tui {
        #[command(flatten)]
        source: Source,
    },
    /// Run one refresh cycle and print a view
    Snapshot {
        #[command(flatten)]
        source: Source,
        /// dashboard, cameras, environmental, energy or devices
        #[arg(long, default_value = "dashboard")]
        view: String,
        /// Entity tab to select in the view
        #[arg(long)]
        entity: Option<String>,
        /// Print the display model as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective config (after extends/imports and env overrides)
    Resolve {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    match args.cmd {
        Command::Tui { source } => {
            let cfg = load_config(source.config.as_deref())?;
            init_logging(&cfg.logging, true)?;
            let transport = transport(&cfg, source.fixture.as_deref())?;
            run_local(async move { telemetry_dashboard::ui::run_tui(&cfg, transport).await })
        }
        Command::Snapshot {
            source,
            view,
            entity,
            json,
        } => {
            let cfg = load_config(source.config.as_deref())?;
            init_logging(&cfg.logging, false)?;
            let transport = transport(&cfg, source.fixture.as_deref())?;
            let view: View = view.parse()?;
            run_local(cmd_snapshot(cfg, transport, view, entity, json))
        }
        Command::Resolve { config } => cmd_resolve(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<DashboardConfig> {
    let doc = config::load_or_default(path)?;
    let mut cfg = doc.dashboard()?;
    cfg.apply_env_overrides(|k| std::env::var(k).ok())?;
    Ok(cfg)
}

fn transport(cfg: &DashboardConfig, fixture: Option<&Path>) -> Result<Box<dyn Transport>> {
    Ok(match fixture {
        Some(path) => Box::new(MemoryTransport::from_fixture_file(path)?),
        None => Box::new(HttpTransport::new(&cfg.api.base_url, cfg.api.timeout())?),
    })
}

/// Everything shares one thread; loads are local tasks.
fn run_local<F>(fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::msg(format!("failed to start runtime: {e}")))?;
    tokio::task::LocalSet::new().block_on(&rt, fut)
}

async fn cmd_snapshot(
    cfg: DashboardConfig,
    transport: Box<dyn Transport>,
    view: View,
    entity: Option<String>,
    json: bool,
) -> Result<()> {
    let dashboard = Dashboard::from_config(&cfg, transport, RecordingSurface::new());
    dashboard.navigate(view);
    if let Some(id) = entity {
        let group = view
            .group()
            .ok_or_else(|| Error::msg(format!("view '{}' has no entity tabs", view.as_str())))?;
        dashboard.select_entity(group, &id)?;
    }
    let failures = dashboard.load_all().await;
    let model = dashboard.display_model();
    if json {
        println!("{}", serde_json::to_string_pretty(&model)?);
    } else {
        print!("{model}");
    }
    if failures > 0 {
        eprintln!("{failures} fetch(es) failed; see log output");
    }
    Ok(())
}

fn cmd_resolve(path: Option<&Path>) -> Result<()> {
    let cfg = load_config(path)?;
    let s = toml::to_string_pretty(&cfg)
        .map_err(|e| Error::msg(format!("failed to print config: {e}")))?;
    print!("{s}");
    Ok(())
}
