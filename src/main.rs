use anyhow::{Context, Result};
use barreplay::metrics::summary::{FINAL_EQUITY, MAX_DRAWDOWN, SHARPE_RATIO, TOTAL_RETURN};
use barreplay::prelude::*;
use clap::{Parser, Subcommand};
use log::info;
use prettytable::{Cell, Row, Table};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "barreplay")]
#[command(about = "An event-driven backtesting engine over historical bars", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

//strategy and account options shared by every command
#[derive(clap::Args, Clone)]
struct StrategyArgs {
    //path to csv data file
    #[arg(long)]
    data: Option<PathBuf>,

    //symbol name for the data file
    #[arg(long, default_value = "ASSET")]
    symbol: String,

    //strategy type (rsi, sma)
    #[arg(long, default_value = "rsi")]
    strategy: String,

    //oscillator window (for rsi strategy)
    #[arg(long, default_value = "14")]
    window: usize,

    //oversold band (for rsi strategy)
    #[arg(long, default_value = "30")]
    oversold: f64,

    //overbought band (for rsi strategy)
    #[arg(long, default_value = "70")]
    overbought: f64,

    //fast sma window (for sma strategy)
    #[arg(long, default_value = "20")]
    fast: usize,

    //slow sma window (for sma strategy)
    #[arg(long, default_value = "50")]
    slow: usize,

    //initial capital
    #[arg(long, default_value = "100000")]
    capital: f64,

    //units per order
    #[arg(long, default_value = "1")]
    qty: f64,

    //commission as a fraction of notional
    #[arg(long, default_value = "0.001")]
    commission_rate: f64,

    //slippage as a fraction of notional
    #[arg(long, default_value = "0")]
    slippage_rate: f64,
}

#[derive(Subcommand)]
enum Commands {
    //run a single backtest
    Run {
        //json configuration file, replaces the command line options
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        args: StrategyArgs,

        //output path for the holdings history csv
        #[arg(long)]
        output_holdings_csv: Option<PathBuf>,

        //write the effective configuration to this json file
        #[arg(long)]
        save_config: Option<PathBuf>,
    },

    //run one independent backtest per window, in parallel
    Sweep {
        #[command(flatten)]
        args: StrategyArgs,

        //comma separated windows, eg 10,14,20
        #[arg(long, value_delimiter = ',', required = true)]
        windows: Vec<usize>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            args,
            output_holdings_csv,
            save_config,
        } => {
            let mut configuration = match config {
                Some(path) => BacktestConfiguration::from_json_file(&path)?,
                None => configuration_from_args(&args)?,
            };
            if output_holdings_csv.is_some() {
                configuration.output_holdings_csv = output_holdings_csv;
            }
            if let Some(path) = save_config {
                configuration.to_json_file(&path)?;
                info!("configuration saved to {:?}", path);
            }
            run_backtest(&configuration)?;
        }
        Commands::Sweep { args, windows } => {
            let configuration = configuration_from_args(&args)?;
            run_sweep(&configuration, &windows)?;
        }
    }

    Ok(())
}

fn configuration_from_args(args: &StrategyArgs) -> Result<BacktestConfiguration> {
    let data = args
        .data
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--data is required without --config"))?;

    let strategy_type = StrategyType::parse(&args.strategy)
        .ok_or_else(|| anyhow::anyhow!("Unknown strategy: {}", args.strategy))?;

    let strategy_params = match strategy_type {
        StrategyType::ThresholdCrossing => StrategyParams::Threshold(ThresholdParams {
            window: args.window,
            oversold: args.oversold,
            overbought: args.overbought,
        }),
        StrategyType::SmaCrossover => StrategyParams::Sma(SmaParams {
            fast_window: args.fast,
            slow_window: args.slow,
        }),
    };

    let mut configuration = BacktestConfiguration {
        initial_capital: args.capital,
        order_quantity: args.qty,
        commission_rate: args.commission_rate,
        slippage_rate: args.slippage_rate,
        strategy_params,
        ..BacktestConfiguration::default()
    };
    configuration.data.insert(args.symbol.clone(), data);
    Ok(configuration)
}

//loads the data and replays it once
fn execute(configuration: &BacktestConfiguration) -> Result<BacktestReport> {
    let feed = configuration
        .load_feed()
        .context("Failed to load bar data")?;

    let mut backtest = Backtest::with_cost_model(
        configuration.backtest_config(),
        feed,
        vec![configuration.build_strategy()?],
        Box::new(configuration.cost_model()),
    )?;

    Ok(backtest.run()?)
}

fn run_backtest(configuration: &BacktestConfiguration) -> Result<()> {
    println!("Barreplay Backtesting Engine");
    println!("============================\n");

    for (symbol, path) in &configuration.data {
        println!("Data: {} from {:?}", symbol, path);
    }
    println!("Strategy: {:?}", configuration.strategy_params);
    println!("Initial capital: {:.2}", configuration.initial_capital);
    println!(
        "Commission: {:.4}%  Slippage: {:.4}%\n",
        configuration.commission_rate * 100.0,
        configuration.slippage_rate * 100.0
    );

    let report = execute(configuration)?;

    println!("Backtest Results");
    println!("================\n");
    println!(
        "Events dispatched: {} market, {} signal, {} order, {} fill\n",
        report.stats.markets, report.stats.signals, report.stats.orders, report.stats.fills
    );
    match &report.metrics {
        Ok(metrics) => metrics.pretty_print_table(),
        Err(err) => println!("No metrics: {}", err),
    }

    if let Some(path) = &configuration.output_holdings_csv {
        save_holdings_csv(&report.holdings, path)?;
        println!("\nHoldings saved to {:?}", path);
    }

    Ok(())
}

fn run_sweep(base: &BacktestConfiguration, windows: &[usize]) -> Result<()> {
    info!("sweeping {} windows", windows.len());

    //bad windows are rejected before anything runs
    let configurations = windows
        .iter()
        .map(|&window| {
            let configuration = base
                .with_window(window)
                .with_context(|| format!("Invalid sweep window {}", window))?;
            Ok((window, configuration))
        })
        .collect::<Result<Vec<_>>>()?;

    //every window gets its own feed, strategy and portfolio
    let results: Vec<(usize, Result<BacktestReport>)> = configurations
        .par_iter()
        .map(|(window, configuration)| (*window, execute(configuration)))
        .collect();

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Window"),
        Cell::new("Final equity"),
        Cell::new("Total return"),
        Cell::new("Sharpe"),
        Cell::new("Max drawdown"),
        Cell::new("Fills"),
    ]));

    for (window, result) in results {
        let report = result.with_context(|| format!("Backtest failed for window {}", window))?;
        let metric = |name: &str| match &report.metrics {
            Ok(metrics) => metrics
                .get(name)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            Err(_) => "-".to_string(),
        };
        table.add_row(Row::new(vec![
            Cell::new(&window.to_string()),
            Cell::new(&metric(FINAL_EQUITY)),
            Cell::new(&metric(TOTAL_RETURN)),
            Cell::new(&metric(SHARPE_RATIO)),
            Cell::new(&metric(MAX_DRAWDOWN)),
            Cell::new(&report.stats.fills.to_string()),
        ]));
    }

    table.printstd();
    Ok(())
}

fn save_holdings_csv(holdings: &[HoldingsSnapshot], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let symbols: Vec<String> = holdings
        .first()
        .map(|h| h.positions.keys().cloned().collect())
        .unwrap_or_default();

    let mut header = vec!["timestamp".to_string()];
    for symbol in &symbols {
        header.push(format!("{}_position", symbol));
        header.push(format!("{}_value", symbol));
    }
    header.extend(
        ["cash", "commission", "slippage", "total", "returns", "equity_curve"]
            .iter()
            .map(|s| s.to_string()),
    );
    writer.write_record(&header)?;

    for snapshot in holdings {
        let mut record = vec![snapshot.timestamp.to_string()];
        for symbol in &symbols {
            record.push(snapshot.positions.get(symbol).copied().unwrap_or(0.0).to_string());
            record.push(snapshot.market_values.get(symbol).copied().unwrap_or(0.0).to_string());
        }
        record.push(snapshot.cash.to_string());
        record.push(snapshot.commission.to_string());
        record.push(snapshot.slippage.to_string());
        record.push(snapshot.total.to_string());
        record.push(snapshot.returns.to_string());
        record.push(snapshot.equity_curve.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
