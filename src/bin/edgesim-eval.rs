use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser};
use edgesim_eval::{
    eval_config::EvalConfig,
    get_terminal_width::get_terminal_width,
    log_line::{named_fields, record_line},
    log_tree::{Selection, TreeSelection},
    metric_table::{BuiltinTable, MetricIndexTable},
    pipeline::{EvaluateOptions, evaluate, extract},
    plot::PlotMode,
    run_date::{RUN_DATE_EXAMPLE, RunDate},
    utillib::logging::{LogLevelOpt, set_log_level},
};
use kstring::KString;
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const PROGRAM_NAME: &str = "edgesim-eval";
const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(clap::Parser, Debug)]
#[clap(next_line_help = true)]
#[clap(term_width = get_terminal_width(4))]
/// Evaluate the result logs of edge/cloud/mobile task offloading
/// simulation runs.
struct Opts {
    #[clap(flatten)]
    log_level: LogLevelOpt,

    /// Path to the configuration file (json5, json, ron, yml or yaml
    /// extension). Default: `edgesim-eval.*` in the current
    /// directory if present, otherwise built-in defaults.
    #[clap(long)]
    config: Option<PathBuf>,

    /// The subcommand to run. Use `--help` after the sub-command to
    /// get a list of the allowed options there.
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum PlotOpt {
    /// No charts
    None,
    /// Charts for all configured metrics against the device count
    Auto,
    /// One chart, for `--x` and `--y`
    Manual,
}

#[derive(clap::Args, Debug)]
struct SelectionOpts {
    /// The iteration to evaluate, or `all` (`0` is accepted as
    /// `all`, too)
    #[clap(long, default_value = "all")]
    ite: Selection,

    /// The policy to evaluate, or `all`
    #[clap(long, default_value = "all")]
    policy: Selection,

    /// The category (application) to evaluate, or `all`
    #[clap(long, default_value = "all")]
    category: Selection,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print version
    Version,

    /// List the built-in metric tables
    Tables,

    /// Extract and categorize the logs of the run at the given date
    /// and time, but do not evaluate them
    Extract {
        /// The date and time of the run, `DD-MM-YYYY_HH-MM`
        date_time: String,
    },

    /// Extract, categorize and evaluate the logs of the run at the
    /// given date and time
    Evaluate {
        #[clap(flatten)]
        selection: SelectionOpts,

        /// Which charts to draw
        #[clap(long, value_enum, default_value = "none")]
        plot: PlotOpt,

        /// The column for the x axis with `--plot manual`
        #[clap(long, default_value = "devices")]
        x: String,

        /// The column for the y axis with `--plot manual`
        #[clap(long)]
        y: Option<String>,

        /// Also write the tables to this Excel file
        #[clap(long)]
        excel: Option<PathBuf>,

        /// The metric table matching the log format (overrides the
        /// configuration file)
        #[clap(long, value_enum)]
        table: Option<BuiltinTable>,

        /// The date and time of the run, `DD-MM-YYYY_HH-MM`
        date_time: String,
    },

    /// Print the named fields of one log file (the file is not
    /// modified)
    Parse {
        /// The metric table matching the log format (overrides the
        /// configuration file)
        #[clap(long, value_enum)]
        table: Option<BuiltinTable>,

        /// Print a JSON object instead of tab-separated lines
        #[clap(long)]
        json: bool,

        logfile: PathBuf,
    },
}

/// Parse the run date argument, or print usage and exit.
fn run_date_or_exit(date_time: &str) -> RunDate {
    match date_time.parse() {
        Ok(date) => date,
        Err(e) => {
            eprintln!("{e}");
            eprintln!(
                "Invalid date format. Please use DD-MM-YYYY_HH-MM, e.g. {RUN_DATE_EXAMPLE}.\n"
            );
            eprintln!("{}", Opts::command().render_usage());
            std::process::exit(2);
        }
    }
}

fn metric_table(
    config: &EvalConfig,
    table: Option<BuiltinTable>,
) -> Result<std::sync::Arc<MetricIndexTable>> {
    if let Some(table) = table {
        Ok(MetricIndexTable::builtin(table))
    } else {
        config.metric_table.load()
    }
}

fn main() -> Result<()> {
    let Opts {
        log_level,
        config,
        command,
    } = Opts::parse();

    set_log_level(log_level.try_into()?);

    ctrlc::set_handler(|| {
        eprintln!("\n--- Exit ---");
        std::process::exit(130);
    })
    .context("installing the Ctrl-C handler")?;

    let load_config = || EvalConfig::load(config.as_ref());

    match command {
        Command::Version => println!("{PROGRAM_NAME} version {PROGRAM_VERSION}"),

        Command::Tables => {
            for table in BuiltinTable::ALL {
                let t = MetricIndexTable::builtin(table);
                println!("{table}\t{} metrics", t.len());
            }
        }

        Command::Extract { date_time } => {
            let date = run_date_or_exit(&date_time);
            let config = load_config()?;
            let Some(summary) = extract(&config, &date)? else {
                bail!("no simulation output found for {date}");
            };
            println!(
                "extracted {} iterations into {:?} ({} failed), {} log files moved",
                summary.iterations.len(),
                summary.date_dir,
                summary.failed,
                summary.categorized.moved
            );
        }

        Command::Evaluate {
            selection: SelectionOpts {
                ite,
                policy,
                category,
            },
            plot,
            x,
            y,
            excel,
            table,
            date_time,
        } => {
            let date = run_date_or_exit(&date_time);
            let plot = match plot {
                PlotOpt::None => PlotMode::None,
                PlotOpt::Auto => PlotMode::Auto,
                PlotOpt::Manual => {
                    let y = y.ok_or_else(|| anyhow!("`--plot manual` requires `--y`"))?;
                    PlotMode::Manual {
                        x: KString::from(x),
                        y: KString::from(y),
                    }
                }
            };
            let config = load_config()?;
            let metric_table = metric_table(&config, table)?;
            let options = EvaluateOptions {
                selection: TreeSelection {
                    ite,
                    policy,
                    category,
                },
                plot,
                excel,
            };
            let Some(summary) = evaluate(&config, metric_table, &date, &options)? else {
                bail!("nothing to evaluate for {date}");
            };
            for path in &summary.csv_files {
                println!("{}", path.to_string_lossy());
            }
            if let Some(excel) = &options.excel {
                println!("{}", excel.to_string_lossy());
            }
            println!(
                "{} log records, {} (policy, devices) groups, {} charts",
                summary.num_records, summary.num_mean_rows, summary.num_charts
            );
        }

        Command::Parse {
            table,
            json,
            logfile,
        } => {
            let config = load_config()?;
            let metric_table = metric_table(&config, table)?;
            let contents = std::fs::read_to_string(&logfile)
                .with_context(|| anyhow!("reading log file {logfile:?}"))?;
            let Some(line) = record_line(&contents) else {
                bail!("log file {logfile:?} is empty");
            };
            if json {
                let object: serde_json::Map<String, serde_json::Value> =
                    named_fields(&line, &metric_table)
                        .map(|(name, value)| {
                            let value = match value {
                                Some(v) => serde_json::Value::String(v.to_string()),
                                None => serde_json::Value::Null,
                            };
                            (name.to_string(), value)
                        })
                        .collect();
                println!("{}", serde_json::to_string_pretty(&object)?);
            } else {
                for (name, value) in named_fields(&line, &metric_table) {
                    println!("{name}\t{}", value.as_deref().unwrap_or(""));
                }
            }
        }
    }

    Ok(())
}
