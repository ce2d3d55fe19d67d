// queryscope/src/main.rs
//
// queryscope: session reconstruction and automated-query detection over
// search query log exports.
//
// Modes:
//   sessions         print clean sessions (suspicious queries removed)
//   bad-sessions     print sessions with suspicious queries kept
//   suspicion        per-user suspiciousness report
//   groups           per-user verdicts over repeated query texts
//   interarrivals    gap summary for human users
//   export           write every result as JSONL into --output
//
// Usage:
//   queryscope --mode sessions --path logs/ --data-version diag_2014
//   queryscope --mode suspicion --path logs/ --rule typeahead --json
//   queryscope --mode export --path logs/ --output /tmp/queryscope_output

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use queryscope::engine::dispatcher::Dispatcher;
use queryscope::eval::{report, InterarrivalSummary, SuspicionReport};
use queryscope::workers::literal::RuleKind;
use queryscope::{AnalysisConfig, DataVersion, JsonFileSource, Pipeline, SessionView};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "queryscope",
    about   = "Session reconstruction and automated-query detection for search query logs",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, value_enum, default_value = "sessions")]
    mode: Mode,

    #[arg(long, help = "JSON export file, or a directory of .json/.jsonl files")]
    path: PathBuf,

    #[arg(long, default_value = "diag_2014",
          help = "Export layout: diag_2012, storm_2013 or diag_2014")]
    data_version: DataVersion,

    #[arg(long, help = "JSON analysis config; missing keys use defaults")]
    config: Option<PathBuf>,

    #[arg(long, help = "Session inactivity threshold in seconds (overrides config)")]
    threshold: Option<f64>,

    #[arg(long, default_value = "/tmp/queryscope_output",
          help = "Output directory (export mode)")]
    output: PathBuf,

    #[arg(long, value_enum, default_value = "literal",
          help = "Literal classification pass")]
    rule: Rule,

    #[arg(long, help = "Print reports as JSON instead of markdown")]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Sessions,
    BadSessions,
    Suspicion,
    Groups,
    Interarrivals,
    Export,
}

#[derive(Clone, Copy, ValueEnum)]
enum Rule {
    Literal,   // known housekeeping searches, autocomplete prefixes
    Typeahead, // raw "typeahead" substring
}

impl From<Rule> for RuleKind {
    fn from(r: Rule) -> Self {
        match r {
            Rule::Literal => RuleKind::Literal,
            Rule::Typeahead => RuleKind::Typeahead,
        }
    }
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    let cfg = match &cli.config {
        Some(p) => AnalysisConfig::from_json_file(p)
            .with_context(|| format!("loading config {}", p.display()))?,
        None => AnalysisConfig::standard(),
    };
    Ok(match cli.threshold {
        Some(secs) => cfg.with_session_threshold(secs),
        None => cfg,
    })
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("queryscope=info".parse()?))
        .compact().init();

    let cli    = Cli::parse();
    let cfg    = load_config(&cli)?;
    let source = JsonFileSource::new(cli.path.clone(), cli.data_version);
    let start  = Instant::now();

    info!("queryscope {} | path={} version={}",
          env!("CARGO_PKG_VERSION"), cli.path.display(), cli.data_version);

    let pipeline = Pipeline::new(cfg, cli.rule.into());
    let pass = pipeline
        .run(&source)
        .with_context(|| format!("analysing {}", cli.path.display()))?;

    match cli.mode {
        Mode::Sessions => print!("{}", report::sessions_text(&pass.users, SessionView::Clean)),
        Mode::BadSessions => {
            print!("{}", report::sessions_text(&pass.users, SessionView::WithSuspicious))
        }
        Mode::Suspicion => {
            let r = SuspicionReport::from_users(&pass.users);
            if cli.json {
                println!("{}", report::suspicion_json(&r));
            } else {
                print!("{}", report::suspicion_markdown(&r));
            }
        }
        Mode::Interarrivals => {
            let s = InterarrivalSummary::from_users(&pass.users, pipeline.system_accounts());
            if cli.json {
                println!("{}", report::interarrival_json(&s));
            } else {
                print!("{}", report::interarrival_markdown(&s));
            }
        }
        Mode::Export => {
            let dispatcher = Dispatcher::new(cli.output.clone())
                .with_context(|| format!("creating {}", cli.output.display()))?;
            dispatcher.export(&pass).await.context("writing outputs")?;
        }
        Mode::Groups => {
            let limit = pipeline.config().group_limit.unwrap_or(usize::MAX);
            for v in pass.verdicts.iter().take(limit) {
                println!("{}", serde_json::to_string(v)?);
            }
        }
    }

    info!("done in {:.2}s | {:?}", start.elapsed().as_secs_f64(), pass.stats);
    Ok(())
}
