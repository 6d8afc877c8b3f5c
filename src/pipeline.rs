//! The evaluation of one simulation run, from the compressed output
//! to tables and charts.
//!
//! `extract` covers getting the logs into the
//! `<date>/<iteration>/<policy>/<category>/` tree, `evaluate` runs
//! that and then everything from reading the tree back in to writing
//! the results.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use walkdir::WalkDir;

use crate::{
    aggregate::RecordTable,
    archive::{extract_archive, input_kind, iteration_name},
    categorize::{CategorizeStats, categorize_logs},
    eval_config::EvalConfig,
    info,
    io_utils::{
        div::{create_dir_if_not_exists, remove_dir_all_if_exists},
        temporary_file::TemporaryFile,
    },
    log_tree::{LogTree, OUTPUT_DIRS, TreeSelection},
    metric_table::MetricIndexTable,
    plot::{PlotMode, write_charts},
    run_date::RunDate,
    tables::{
        csv_table_view::csv_file_write, excel_table_view::excel_file_write, table_view::TableView,
    },
    utillib::natural_sort::natural_sort,
    warn,
};

/// The sub-directory of `<input_base>/<date>/` holding the output
/// files
pub const SOURCE_SUB_DIR: &str = "default_config";

/// Left by the simulator in the date directory, not needed
pub const PROGRESS_DIR: &str = "progress";

pub const CSV_DIR: &str = "csv";
pub const GRAPH_DIR: &str = "graph";

/// Where the simulator output for `date` is expected.
pub fn source_dir(config: &EvalConfig, date: &RunDate) -> PathBuf {
    config
        .input_base
        .join(date.dir_name())
        .join(SOURCE_SUB_DIR)
}

/// Where the evaluation of `date` goes.
pub fn date_dir(config: &EvalConfig, date: &RunDate) -> PathBuf {
    config.evaluation_dir.join(date.dir_name())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub date_dir: PathBuf,
    /// Names of the iteration directories created
    pub iterations: Vec<String>,
    /// Archives that could not be (fully) extracted
    pub failed: usize,
    pub categorized: CategorizeStats,
}

/// Whether `ite` can be used as an iteration directory in the date
/// directory: not empty (input files starting with a dot) and not one
/// of the directories the evaluation itself uses.
fn is_iteration_dir_name(ite: &str) -> bool {
    !ite.is_empty() && ite != PROGRESS_DIR && !OUTPUT_DIRS.contains(&ite)
}

/// The input files in `source`, naturally sorted by file name.
fn input_files(source: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(source).with_context(|| anyhow!("opening dir {source:?}"))? {
        let entry = entry.with_context(|| anyhow!("listing dir {source:?}"))?;
        let Ok(name) = entry.file_name().into_string() else {
            warn!("ignoring file with non-UTF-8 name {:?}", entry.path());
            continue;
        };
        if input_kind(&name).is_none() || !entry.path().is_file() {
            continue;
        }
        if !is_iteration_dir_name(iteration_name(&name)) {
            warn!(
                "ignoring input file {:?}, its name does not give a usable iteration name",
                entry.path()
            );
            continue;
        }
        names.push(name);
    }
    natural_sort(&mut names);
    Ok(names)
}

/// Copy (and for archives, extract) `source/file_name` into its
/// iteration directory below `date_dir`. Returns the iteration name
/// and whether it went without error.
fn import_input(source: &Path, file_name: &str, date_dir: &Path) -> Result<(String, bool)> {
    let ite = iteration_name(file_name).to_string();
    let ite_dir = date_dir.join(&ite);
    create_dir_if_not_exists(&ite_dir)?;
    let from = source.join(file_name);
    let to = ite_dir.join(file_name);
    std::fs::copy(&from, &to).with_context(|| anyhow!("copying {from:?} to {to:?}"))?;

    let is_archive = input_kind(file_name).is_some_and(|kind| kind.is_archive());
    if !is_archive {
        info!("copied log file {from:?} to {ite_dir:?}");
        return Ok((ite, true));
    }
    let copy = TemporaryFile::from(to);
    match extract_archive(copy.path(), &ite_dir) {
        Ok(()) => Ok((ite, true)),
        Err(e) => {
            warn!("error extracting {from:?}, skipping it: {e:#}");
            Ok((ite, false))
        }
    }
}

/// Remove what is left of a redundant `<ite>/<ite>` directory after
/// categorizing. Kept if it still holds log files (those that could
/// not be categorized).
fn remove_nested_ite_dir(ite_dir: &Path, ite: &str, config: &EvalConfig) -> Result<()> {
    let nested = ite_dir.join(ite);
    if !nested.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(&nested) {
        let entry = entry.with_context(|| anyhow!("walking dir {nested:?}"))?;
        let is_log = entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| config.filename_layout.is_log_file(name));
        if is_log {
            warn!("keeping nested dir {nested:?}, it contains uncategorized log files");
            return Ok(());
        }
    }
    remove_dir_all_if_exists(&nested)?;
    info!("removed nested dir {nested:?}");
    Ok(())
}

/// Recreate the date directory and fill it with the categorized logs
/// of the run. Returns None if there is no simulator output for
/// `date`.
pub fn extract(config: &EvalConfig, date: &RunDate) -> Result<Option<ExtractSummary>> {
    let source = source_dir(config, date);
    if !source.is_dir() {
        warn!("source directory {source:?} does not exist");
        return Ok(None);
    }

    let date_dir = date_dir(config, date);
    if remove_dir_all_if_exists(&date_dir)? {
        info!("removed previous evaluation dir {date_dir:?}");
    }
    std::fs::create_dir_all(&date_dir).with_context(|| anyhow!("creating dir {date_dir:?}"))?;

    let mut summary = ExtractSummary {
        date_dir: date_dir.clone(),
        ..Default::default()
    };
    for file_name in input_files(&source)? {
        let (ite, ok) = import_input(&source, &file_name, &date_dir)?;
        if !ok {
            summary.failed += 1;
        }
        if !summary.iterations.contains(&ite) {
            summary.iterations.push(ite);
        }
    }

    for ite in &summary.iterations {
        let ite_dir = date_dir.join(ite);
        let stats = categorize_logs(&ite_dir, &config.filename_layout)?;
        info!("categorized {ite_dir:?}: {stats:?}");
        summary.categorized += stats;
        remove_nested_ite_dir(&ite_dir, ite, config)?;
    }

    let progress = date_dir.join(PROGRESS_DIR);
    if remove_dir_all_if_exists(&progress)? {
        info!("removed {progress:?}");
    }

    Ok(Some(summary))
}

#[derive(Debug, Clone, Default)]
pub struct EvaluateOptions {
    pub selection: TreeSelection,
    pub plot: PlotMode,
    /// Also write the tables as worksheets of this Excel file
    pub excel: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateSummary {
    pub extract: ExtractSummary,
    pub num_records: usize,
    pub num_mean_rows: usize,
    /// Raw, sorted, means
    pub csv_files: [PathBuf; 3],
    pub num_charts: usize,
}

/// The names of the table files for `date` and `selection`.
pub fn csv_file_names(date: &RunDate, selection: &TreeSelection) -> [String; 3] {
    let date = date.dir_name();
    let part = selection.file_name_part();
    [
        format!("{date}_logs_{part}.csv"),
        format!("{date}_logs_sorted_{part}.csv"),
        format!("{date}_logs_mean_{part}.csv"),
    ]
}

/// Extract, then read, aggregate and write out the selected logs.
/// Returns None if there is no simulator output for `date` or it
/// contains no logs.
pub fn evaluate(
    config: &EvalConfig,
    metric_table: Arc<MetricIndexTable>,
    date: &RunDate,
    options: &EvaluateOptions,
) -> Result<Option<EvaluateSummary>> {
    let Some(extract_summary) = extract(config, date)? else {
        return Ok(None);
    };
    let date_dir = &extract_summary.date_dir;

    let tree = LogTree::read(date_dir, &config.filename_layout)?;
    if tree.is_empty() {
        warn!("no log files found in {date_dir:?}");
        return Ok(None);
    }
    let selected = tree.select(&options.selection)?;
    info!(
        "evaluating {} log files with metric table {:?}",
        selected.len(),
        metric_table.table_name()
    );

    let records = RecordTable::from_selected(&selected, metric_table);
    let sorted = records.sorted();
    let mut means = sorted.group_means();
    for derived in &config.derived_metrics {
        means.add_derived(derived);
    }

    let csv_dir = date_dir.join(CSV_DIR);
    create_dir_if_not_exists(&csv_dir)?;
    let [raw_name, sorted_name, mean_name] = csv_file_names(date, &options.selection);
    let csv_files = [
        csv_dir.join(raw_name),
        csv_dir.join(sorted_name),
        csv_dir.join(mean_name),
    ];
    let tables: [&dyn TableView; 3] = [&records, &sorted, &means];
    for (table, path) in tables.iter().zip(&csv_files) {
        csv_file_write(*table, path)?;
        info!("table {:?} saved to {path:?}", table.table_name());
    }

    if let Some(excel) = &options.excel {
        excel_file_write(tables, excel)?;
        info!("tables saved to {excel:?}");
    }

    let graph_dir = date_dir.join(GRAPH_DIR);
    let num_charts = if options.plot == PlotMode::None {
        0
    } else {
        create_dir_if_not_exists(&graph_dir)?;
        write_charts(&means, &options.plot, &config.plot, &graph_dir)?
    };

    Ok(Some(EvaluateSummary {
        num_records: records.records.len(),
        num_mean_rows: means.rows.len(),
        extract: extract_summary,
        csv_files,
        num_charts,
    }))
}
