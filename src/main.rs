use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jira_flow::cache::{CacheStorage, NoopStorage, ResponseCache, SqliteStorage};
use jira_flow::config::Config;
use jira_flow::jira::client::JiraTransport;
use jira_flow::jira::search::PaginatedSearchClient;
use jira_flow::jira::types::SearchQuery;
use jira_flow::metrics::{MetricKind, MetricKindInfo, MetricSpec, MetricsEngine, StatusSide, TimeWindow};
use jira_flow::service::MetricsService;

type Service = MetricsService<JiraTransport, Box<dyn CacheStorage>>;

#[derive(Parser, Debug)]
#[command(name = "jflow")]
#[command(about = "Flow metrics (cycle time, throughput, work item age) from Jira changelogs")]
#[command(version)]
struct Cli {
  /// Path to config file (default: $XDG_CONFIG_HOME/jflow/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Mirror logs to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the available metric kinds
  Kinds,
  /// List status names seen in the changelog of matching issues
  Statuses {
    #[arg(long)]
    jql: String,
    #[arg(long, value_enum, default_value_t = Side::To)]
    side: Side,
  },
  /// List key, type and status of matching issues
  Issues {
    #[arg(long)]
    jql: String,
  },
  /// Compute a metric
  Metric {
    #[command(subcommand)]
    metric: MetricCommand,
  },
  /// Manage the response cache
  Cache {
    #[command(subcommand)]
    action: CacheCommand,
  },
  /// Check that Jira is reachable with the configured credentials
  Health,
}

#[derive(Subcommand, Debug)]
enum MetricCommand {
  CycleTime {
    #[command(flatten)]
    query: QueryArgs,
    #[arg(long)]
    start: String,
    #[arg(long)]
    end: String,
    /// Percentile 1-100 (default from config)
    #[arg(long)]
    percentile: Option<f64>,
    #[command(flatten)]
    window: WindowArgs,
  },
  Throughput {
    #[command(flatten)]
    query: QueryArgs,
    #[arg(long)]
    end: String,
    #[command(flatten)]
    window: WindowArgs,
  },
  Age {
    #[command(flatten)]
    query: QueryArgs,
    #[arg(long)]
    status: String,
    #[arg(long)]
    percentile: Option<f64>,
    #[command(flatten)]
    window: WindowArgs,
  },
  Changelog {
    #[command(flatten)]
    query: QueryArgs,
  },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  /// Remove every cached response
  Clear,
}

#[derive(Args, Debug)]
struct QueryArgs {
  #[arg(long)]
  jql: String,
  /// Extra fields to request alongside the changelog
  #[arg(long = "field")]
  fields: Vec<String>,
}

impl QueryArgs {
  fn to_query(&self) -> SearchQuery {
    SearchQuery::new(self.jql.clone()).with_extra_fields(self.fields.iter().cloned())
  }
}

#[derive(Args, Debug)]
struct WindowArgs {
  /// Window start (RFC 3339)
  #[arg(long)]
  from: DateTime<Utc>,
  /// Window end (RFC 3339)
  #[arg(long)]
  to: DateTime<Utc>,
}

impl WindowArgs {
  fn to_window(&self) -> Result<TimeWindow> {
    Ok(TimeWindow::new(self.from, self.to)?)
  }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Side {
  From,
  To,
}

impl From<Side> for StatusSide {
  fn from(side: Side) -> Self {
    match side {
      Side::From => StatusSide::From,
      Side::To => StatusSide::To,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Cli::parse();
  let _log_guard = init_logging(args.verbose)?;

  if let Command::Kinds = args.command {
    let kinds: Vec<MetricKindInfo> = MetricKind::ALL.into_iter().map(MetricKindInfo::from).collect();
    return print_json(&kinds);
  }

  let config = Config::load(args.config.as_deref())?;

  if let Command::Cache {
    action: CacheCommand::Clear,
  } = args.command
  {
    open_storage(&config)?.clear()?;
    tracing::info!("cache cleared");
    return Ok(());
  }

  let service = build_service(&config)?;
  let percentile = |p: Option<f64>| p.unwrap_or(config.metrics.default_percentile);

  match args.command {
    Command::Statuses { jql, side } => {
      let values = service
        .list_status_values(&SearchQuery::new(jql), side.into())
        .await?;
      print_json(&values)
    }
    Command::Issues { jql } => {
      let issues = service.search_issues(&SearchQuery::new(jql)).await?;
      print_json(&issues)
    }
    Command::Health => {
      service.health_check().await?;
      print_json(&serde_json::json!({ "status": "ok" }))
    }
    Command::Metric { metric } => {
      let (spec, query, window) = match metric {
        MetricCommand::CycleTime {
          query,
          start,
          end,
          percentile: p,
          window,
        } => (
          MetricSpec::CycleTime {
            start_status: start,
            end_status: end,
            percentile: percentile(p),
          },
          query.to_query(),
          window.to_window()?,
        ),
        MetricCommand::Throughput { query, end, window } => (
          MetricSpec::Throughput { end_status: end },
          query.to_query(),
          window.to_window()?,
        ),
        MetricCommand::Age {
          query,
          status,
          percentile: p,
          window,
        } => (
          MetricSpec::WorkItemAge {
            status,
            percentile: percentile(p),
          },
          query.to_query(),
          window.to_window()?,
        ),
        MetricCommand::Changelog { query } => {
          let now = Utc::now();
          (MetricSpec::ChangelogRaw, query.to_query(), TimeWindow::new(now, now)?)
        }
      };

      tracing::info!(metric = spec.kind().id(), jql = %query.jql, "computing metric");
      let output = service.compute_metric(&spec, &query, &window).await?;
      tracing::info!(rows = output.table.len(), malformed = output.malformed_entries, "metric computed");
      print_json(&output)
    }
    Command::Kinds | Command::Cache { .. } => Ok(()),
  }
}

fn open_storage(config: &Config) -> Result<Box<dyn CacheStorage>> {
  if !config.cache.enabled {
    return Ok(Box::new(NoopStorage));
  }
  let storage = match &config.cache.path {
    Some(path) => SqliteStorage::open_at(path)?,
    None => SqliteStorage::open()?,
  };
  Ok(Box::new(storage))
}

fn build_service(config: &Config) -> Result<Service> {
  let transport = JiraTransport::from_config(config)?;
  let cache =
    ResponseCache::new(open_storage(config)?).with_ttl(Duration::minutes(config.cache.ttl_minutes));
  let search = PaginatedSearchClient::new(transport, cache)
    .with_max_concurrent_pages(config.search.max_concurrent_pages);
  let engine = MetricsEngine::new().with_emission(config.metrics.emission);

  Ok(MetricsService::new(search, engine).with_malformed_timestamps(config.metrics.malformed_timestamps))
}

/// Log to a daily file under the data directory; stdout is reserved for results.
fn init_logging(verbose: bool) -> Result<WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("jflow")
    .join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let (file_writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "jflow.log"));
  let filter = EnvFilter::try_from_env("JFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  let stderr_layer = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(file_writer).with_ansi(false))
    .with(stderr_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;

  Ok(guard)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
