//! GapDesk CLI — analysis, exit and window commands.
//!
//! Commands:
//! - `analyze` — run one full analysis cycle and print the gated decision
//! - `exit` — score an open position for exit
//! - `window` — show the trading-window regime at a given time
//! - `premium` — breakeven analysis of the closest in-the-money contracts
//! - `config show` — print the effective configuration as TOML

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use gapdesk_core::analyzers::Scored;
use gapdesk_core::data::{DataResolver, MarketFixture};
use gapdesk_core::domain::{PositionRecord, Signal, TradeType};
use gapdesk_core::premium::premium_efficiency;
use gapdesk_core::signals::ExitEvaluation;
use gapdesk_core::window::market_time_from_local;
use gapdesk_core::{
    build_resolver, check_trading_window, evaluate_exit, market_now, run_full_analysis,
    DecisionReport, EngineConfig, FeedMode, MarketTime,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gapdesk", about = "GapDesk — rule-based 0DTE signal engine")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML config file. Defaults to the built-in configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Data-source options shared by every command that reads the market.
#[derive(clap::Args)]
struct FeedArgs {
    /// Replay a captured market state (JSON) instead of live feeds.
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Offline mode: no network access, proxy data only.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Evaluate at this New York local time (YYYY-MM-DD HH:MM). Defaults to now.
    #[arg(long)]
    at: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full analysis cycle and print the decision.
    Analyze {
        #[command(flatten)]
        feed: FeedArgs,

        /// Print the full report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Score an open position for exit.
    Exit {
        #[command(flatten)]
        feed: FeedArgs,

        /// Position record (JSON). Mutually exclusive with the --entry-* flags.
        #[arg(long)]
        position: Option<PathBuf>,

        /// Entry signal, e.g. "STRONG LONG" or moderate_short.
        #[arg(long)]
        signal: Option<String>,

        /// Entry price of the position (option premium or share price).
        #[arg(long)]
        entry_price: Option<f64>,

        /// Entry time (RFC 3339). Defaults to the evaluation time.
        #[arg(long)]
        entry_time: Option<String>,

        /// Trade type: options or stock.
        #[arg(long, default_value = "options")]
        trade_type: String,

        /// Option strike.
        #[arg(long)]
        strike: Option<f64>,

        /// Underlying price at entry.
        #[arg(long)]
        underlying_entry: Option<f64>,

        /// Print the evaluation as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the trading-window regime.
    Window {
        /// New York local time (YYYY-MM-DD HH:MM). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Breakeven analysis of the closest in-the-money call and put.
    Premium {
        #[command(flatten)]
        feed: FeedArgs,
    },
    /// Configuration commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { feed, json } => run_analyze(&config, &feed, json),
        Commands::Exit {
            feed,
            position,
            signal,
            entry_price,
            entry_time,
            trade_type,
            strike,
            underlying_entry,
            json,
        } => {
            let now = eval_time(feed.at.as_deref())?;
            let position = match position {
                Some(path) => {
                    if signal.is_some() || entry_price.is_some() {
                        bail!("--position and the --entry-* flags are mutually exclusive");
                    }
                    load_position(&path)?
                }
                None => {
                    let Some(entry_price) = entry_price else {
                        bail!("one of --position or --entry-price is required");
                    };
                    PositionRecord {
                        signal: parse_signal(signal.as_deref().unwrap_or("STRONG LONG"))?,
                        entry_price,
                        entry_time: match entry_time {
                            Some(s) => DateTime::parse_from_rfc3339(&s)
                                .with_context(|| format!("invalid --entry-time '{s}'"))?
                                .with_timezone(&Utc),
                            None => now.with_timezone(&Utc),
                        },
                        trade_type: parse_trade_type(&trade_type)?,
                        strike,
                        underlying_entry,
                        targets: None,
                    }
                }
            };
            run_exit(&config, &feed, &position, now, json)
        }
        Commands::Window { at } => run_window(at.as_deref()),
        Commands::Premium { feed } => run_premium(&config, &feed),
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
        },
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::from_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn eval_time(at: Option<&str>) -> Result<MarketTime> {
    let Some(s) = at else {
        return Ok(market_now());
    };
    let local = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .with_context(|| format!("invalid --at '{s}' (expected YYYY-MM-DD HH:MM)"))?;
    match market_time_from_local(local) {
        Some(t) => Ok(t),
        None => bail!("'{s}' does not exist in New York local time"),
    }
}

fn resolver_for(config: &EngineConfig, feed: &FeedArgs) -> Result<DataResolver> {
    if feed.offline && feed.fixture.is_some() {
        bail!("--offline and --fixture are mutually exclusive");
    }
    let mode = match &feed.fixture {
        Some(path) => FeedMode::Fixture(
            MarketFixture::from_file(path)
                .with_context(|| format!("loading fixture {}", path.display()))?,
        ),
        None if feed.offline => FeedMode::Offline,
        None => FeedMode::Live,
    };
    Ok(build_resolver(config, mode)?)
}

/// Accepts the serialized labels ("STRONG LONG") and snake-case forms (strong_long).
fn parse_signal(s: &str) -> Result<Signal> {
    let label = s.trim().to_uppercase().replace(['_', '-'], " ");
    serde_json::from_value(serde_json::Value::String(label))
        .with_context(|| format!("unknown signal '{s}'"))
}

fn parse_trade_type(s: &str) -> Result<TradeType> {
    match s.to_ascii_lowercase().as_str() {
        "options" | "option" => Ok(TradeType::Options),
        "stock" => Ok(TradeType::Stock),
        _ => bail!("unknown trade type '{s}'. Valid: options, stock"),
    }
}

fn load_position(path: &Path) -> Result<PositionRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading position {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing position {}", path.display()))
}

// ── Commands ─────────────────────────────────────────────────────────

fn run_analyze(config: &EngineConfig, feed: &FeedArgs, json: bool) -> Result<()> {
    let now = eval_time(feed.at.as_deref())?;
    let resolver = resolver_for(config, feed)?;
    let report = run_full_analysis(&resolver, config, now);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report)?;
    }
    Ok(())
}

fn print_report(report: &DecisionReport) -> Result<()> {
    let d = &report.decision;
    let b = &d.breakdown;

    println!("{} @ {}", report.symbol, report.evaluated_at.format("%Y-%m-%d %H:%M %Z"));
    println!("Window: {}: {}", d.window.regime, d.window.message);
    println!();
    println!("{:<12} {:>8}  {}", "Analyzer", "Points", "Source");
    println!("{}", "-".repeat(32));
    let rows = [
        ("Gap", report.gap.result()),
        ("Internals", report.internals.result()),
        ("Sectors", report.sectors.result()),
        ("Technicals", report.technicals.result()),
        ("Trend", report.trend.result()),
    ];
    for (name, r) in rows {
        println!("{:<12} {:>+8.1}  {}", name, r.total_points(), r.data_source());
    }
    println!("{}", "-".repeat(32));
    println!(
        "Bullish {:.1} / Bearish {:.1} / Net {:+.1}",
        b.bullish_total, b.bearish_total, b.net
    );
    println!();
    println!("Decision:   {}", d.decision);
    println!("Raw signal: {} ({} confidence)", d.raw_signal, d.confidence);
    if let Some(warning) = &d.timing_warning {
        println!("Timing:     {warning}");
    }
    println!(
        "Targets:    up {:.2} ({:.0}%) / down {:.2} ({:.0}%)",
        report.targets.upside_target,
        report.targets.upside_probability,
        report.targets.downside_target,
        report.targets.downside_probability
    );
    println!("Data:       {}", report.data_quality);
    let proxied = report.proxied_analyzers();
    if !proxied.is_empty() {
        println!("Proxied:    {}", proxied.join(", "));
    }
    println!("Fingerprint: {}", report.fingerprint()?.short());
    Ok(())
}

fn run_exit(
    config: &EngineConfig,
    feed: &FeedArgs,
    position: &PositionRecord,
    now: MarketTime,
    json: bool,
) -> Result<()> {
    if !position.entry_price.is_finite() || position.entry_price <= 0.0 {
        bail!("entry price must be positive");
    }
    let resolver = resolver_for(config, feed)?;
    let evaluation = evaluate_exit(&resolver, config, position, now);

    if json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        print_exit(&evaluation);
    }
    Ok(())
}

fn print_exit(e: &ExitEvaluation) {
    println!("Exit signal: {} (urgency {})", e.signal, e.urgency);
    println!("Exit score:  {}/10", e.exit_score);
    println!(
        "P&L:         {:+.1}% ({:.2} -> {:.2})",
        e.pnl_pct, e.entry_value, e.current_value
    );
    println!("Underlying:  {:.2} [{}]", e.underlying_price, e.price_source);
    println!("Method:      {}", e.calculation_method);
    println!(
        "Clock:       {:.0} min to close, {:.1} h in trade",
        e.minutes_to_close, e.hours_in_trade
    );
    for w in &e.time_warnings {
        println!("  ! {w}");
    }
    for r in &e.reasons {
        println!("  - {r}");
    }
}

fn run_window(at: Option<&str>) -> Result<()> {
    let now = eval_time(at)?;
    let state = check_trading_window(&now);
    println!("{}", now.format("%Y-%m-%d %H:%M %Z"));
    println!("Regime:    {}", state.regime);
    println!("Tradeable: {}", if state.tradeable { "yes" } else { "no" });
    println!("{}", state.message);
    println!(
        "Breadth weight {:.1}: {}",
        state.breadth.weight, state.breadth.note
    );
    Ok(())
}

fn run_premium(config: &EngineConfig, feed: &FeedArgs) -> Result<()> {
    let now = eval_time(feed.at.as_deref())?;
    let resolver = resolver_for(config, feed)?;
    let Some(p) = premium_efficiency(&resolver, config, &now) else {
        bail!(
            "no live quote and option chain available for {}",
            config.underlying.symbol
        );
    };

    println!(
        "{} @ {:.2} [{}]",
        config.underlying.symbol, p.underlying_price, p.source
    );
    println!(
        "{:<5} {:>8} {:>8} {:>10} {:>8} {:>7}  {}",
        "Type", "Strike", "Premium", "Breakeven", "Move %", "Spread", "Assessment"
    );
    println!("{}", "-".repeat(70));
    for b in [&p.call, &p.put].into_iter().flatten() {
        println!(
            "{:<5} {:>8.2} {:>8.2} {:>10.2} {:>8.2} {:>7.2}  {}",
            b.option_type,
            b.strike,
            b.premium,
            b.breakeven_price,
            b.move_needed_pct,
            b.bid_ask_spread,
            b.assessment
        );
    }
    Ok(())
}
