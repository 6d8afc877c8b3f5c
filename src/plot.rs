//! Charts of the averaged metrics, one series per policy.
//!
//! Preparation (`prepare_chart`) is separate from drawing
//! (`draw_chart`): the prepared data is also what gets written to the
//! CSV file next to each chart.

use std::{borrow::Cow, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};
use genawaiter::rc::Gen;
use kstring::KString;
use plotters::prelude::*;

use crate::{
    aggregate::{MEAN_KEY_COLUMNS, MeanRow, MeanTable},
    info,
    io_utils::div::create_dir_if_not_exists,
    tables::{
        csv_table_view::csv_file_write,
        table_view::{ColumnFormatting, Highlight, TableView, format_number},
    },
    utillib::natural_sort::natural_sort,
    warn,
};

pub const DEVICES_COLUMN: &str = MEAN_KEY_COLUMNS[1];

const COMPLETED: &str = "num_of_completed_tasks(ALL)";
const FAILED: &str = "num_of_failed_tasks(ALL)";
const COMPLETED_PLUS_FAILED: &str = "num_of_completed_plus_failed_tasks(ALL)";

/// Shown as percentage of completed + failed tasks
const TASK_SHARE_METRICS: &[&str] = &[
    COMPLETED,
    FAILED,
    "num_of_uncompleted_tasks(ALL)",
    COMPLETED_PLUS_FAILED,
];

/// Shown as percentage of failed tasks
const FAILURE_REASON_METRICS: &[&str] = &[
    "num_of_failed_tasks_due_network(ALL)",
    "num_of_failed_tasks_due_vm_capacity(ALL)",
    "num_of_failed_tasks_due_mobility(ALL)",
];

const COMPLETION_Y_RANGE: (f64, f64) = (82., 101.);

/// Relative to the distance between two x positions
const BAR_GROUP_WIDTH: f64 = 0.8;

const CHART_SIZE: (u32, u32) = (1600, 1000);

const TITLES: &[(&str, &str)] = &[
    ("average_processing_time(ALL)_(sec)", "Average Processing Time (All) (sec)"),
    ("average_service_time(ALL)_(sec)", "Average Service Time (All) (sec)"),
    ("average_network_delay(ALL)_(sec)", "Average Network Delay (All) (sec)"),
    ("average_service_time(Cloud)_(sec)", "Average Service Time (Cloud) (sec)"),
    ("average_processing_time(Cloud)_(sec)", "Average Processing Time (Cloud) (sec)"),
    ("average_service_time(Edge)_(sec)", "Average Service Time (Edge) (sec)"),
    ("average_processing_time(Edge)_(sec)", "Average Processing Time (Edge) (sec)"),
    ("average_service_time(Mobile)_(sec)", "Average Service Time (Mobile) (sec)"),
    ("average_processing_time(Mobile)_(sec)", "Average Processing Time (Mobile) (sec)"),
    ("num_of_completed_tasks(ALL)", "Number of Completed Tasks (All)"),
    ("num_of_failed_tasks(ALL)", "Number of Failed Tasks (All)"),
    ("num_of_uncompleted_tasks(ALL)", "Number of Uncompleted Tasks (All)"),
    ("num_of_completed_tasks(Cloud)", "Number of Completed Tasks (Cloud)"),
    ("num_of_failed_tasks(Cloud)", "Number of Failed Tasks (Cloud)"),
    ("num_of_uncompleted_tasks(Cloud)", "Number of Uncompleted Tasks (Cloud)"),
    ("num_of_completed_tasks(Edge)", "Number of Completed Tasks (Edge)"),
    ("num_of_failed_tasks(Edge)", "Number of Failed Tasks (Edge)"),
    ("num_of_uncompleted_tasks(Edge)", "Number of Uncompleted Tasks (Edge)"),
    ("num_of_completed_tasks(Mobile)", "Number of Completed Tasks (Mobile)"),
    ("num_of_failed_tasks(Mobile)", "Number of Failed Tasks (Mobile)"),
    ("num_of_uncompleted_tasks(Mobile)", "Number of Uncompleted Tasks (Mobile)"),
    ("num_of_failed_tasks_due_network(ALL)", "Number of Failed Tasks Due to Network (All)"),
    ("num_of_failed_tasks_due_vm_capacity(ALL)", "Number of Failed Tasks Due to VM Capacity (All)"),
    ("num_of_failed_tasks_due_mobility(ALL)", "Number of Failed Tasks Due to Mobility (All)"),
    ("num_of_failed_tasks_due_network(Cloud)", "Number of Failed Tasks Due to Network (Cloud)"),
    ("num_of_failed_tasks_due_vm_capacity(Cloud)", "Number of Failed Tasks Due to VM Capacity (Cloud)"),
    ("num_of_failed_tasks_due_network(Edge)", "Number of Failed Tasks Due to Network (Edge)"),
    ("num_of_failed_tasks_due_vm_capacity(Edge)", "Number of Failed Tasks Due to VM Capacity (Edge)"),
    ("num_of_failed_tasks_due_network(Mobile)", "Number of Failed Tasks Due to Network (Mobile)"),
    ("num_of_failed_tasks_due_vm_capacity(Mobile)", "Number of Failed Tasks Due to VM Capacity (Mobile)"),
    ("num_of_completed_plus_failed_tasks(ALL)", "Number of Completed + Failed Tasks (All)"),
];

const AXIS_LABELS: &[(&str, &str)] = &[
    ("devices", "Number of MDs"),
    ("average_processing_time(ALL)_(sec)", "Processing Time (sec)"),
    ("average_service_time(ALL)_(sec)", "Service Time (sec)"),
    ("average_network_delay(ALL)_(sec)", "Network Delay (sec)"),
    ("average_service_time(Cloud)_(sec)", "Cloud Service Time (sec)"),
    ("average_processing_time(Cloud)_(sec)", "Cloud Processing Time (sec)"),
    ("average_service_time(Edge)_(sec)", "Edge Service Time (sec)"),
    ("average_processing_time(Edge)_(sec)", "Edge Processing Time (sec)"),
    ("average_service_time(Mobile)_(sec)", "Mobile Service Time (sec)"),
    ("average_processing_time(Mobile)_(sec)", "Mobile Processing Time (sec)"),
    ("num_of_completed_tasks(ALL)", "Completed Tasks"),
    ("num_of_failed_tasks(ALL)", "Failed Tasks"),
    ("num_of_uncompleted_tasks(ALL)", "Uncompleted Tasks"),
    ("num_of_completed_tasks(Cloud)", "Completed Tasks (Cloud)"),
    ("num_of_failed_tasks(Cloud)", "Failed Tasks (Cloud)"),
    ("num_of_uncompleted_tasks(Cloud)", "Uncompleted Tasks (Cloud)"),
    ("num_of_completed_tasks(Edge)", "Completed Tasks (Edge)"),
    ("num_of_failed_tasks(Edge)", "Failed Tasks (Edge)"),
    ("num_of_uncompleted_tasks(Edge)", "Uncompleted Tasks (Edge)"),
    ("num_of_completed_tasks(Mobile)", "Completed Tasks (Mobile)"),
    ("num_of_failed_tasks(Mobile)", "Failed Tasks (Mobile)"),
    ("num_of_uncompleted_tasks(Mobile)", "Uncompleted Tasks (Mobile)"),
    ("num_of_failed_tasks_due_network(ALL)", "Failed Tasks (Network)"),
    ("num_of_failed_tasks_due_vm_capacity(ALL)", "Failed Tasks (VM Capacity)"),
    ("num_of_failed_tasks_due_mobility(ALL)", "Failed Tasks (Mobility)"),
    ("num_of_failed_tasks_due_network(Cloud)", "Failed Tasks (Network - Cloud)"),
    ("num_of_failed_tasks_due_vm_capacity(Cloud)", "Failed Tasks (VM Capacity - Cloud)"),
    ("num_of_failed_tasks_due_network(Edge)", "Failed Tasks (Network - Edge)"),
    ("num_of_failed_tasks_due_vm_capacity(Edge)", "Failed Tasks (VM Capacity - Edge)"),
    ("num_of_failed_tasks_due_network(Mobile)", "Failed Tasks (Network - Mobile)"),
    ("num_of_failed_tasks_due_vm_capacity(Mobile)", "Failed Tasks (VM Capacity - Mobile)"),
    ("num_of_completed_plus_failed_tasks(ALL)", "Completed+Failed Tasks"),
];

fn lookup(mapping: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    mapping.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// A `#rrggbb` color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub u8, pub u8, pub u8);

impl FromStr for HexColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("color {s:?} must start with '#'"))?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            bail!("color {s:?} must be of the form #rrggbb");
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .with_context(|| anyhow!("parsing color {s:?}"))
        };
        Ok(HexColor(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl HexColor {
    fn rgb(self) -> RGBColor {
        RGBColor(self.0, self.1, self.2)
    }
}

fn strings(v: &[&'static str]) -> Vec<KString> {
    v.iter().map(|s| KString::from_static(s)).collect()
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PlotConfig {
    /// Display (and color) order of the policies; policies not listed
    /// are appended in natural order
    pub policy_order: Vec<KString>,
    /// `#rrggbb` colors, assigned by position in the policy order
    pub colors: Vec<String>,
    /// Metrics drawn as line charts, all others as bar charts
    pub line_metrics: Vec<KString>,
    /// The metrics charted in automatic mode, against `devices`
    pub auto_metrics: Vec<KString>,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            policy_order: strings(&[
                "ONLY_MOBILE",
                "ONLY_EDGE",
                "ONLY_CLOUD",
                "NETWORK_BASED",
                "UTILIZATION_BASED",
                "RANDOM",
                "EDGE_PRIORITY",
                "FUZZY_BASED",
                "FUZZY_COMPETITOR",
            ]),
            colors: [
                "#2b83ba", "#abdda4", "#fdae61", "#d7191c", "#8c564b", "#9467bd", "#ff7f0e",
                "#17becf", "#1f77b4", "#bcbd22",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            line_metrics: strings(&[
                "average_processing_time(ALL)_(sec)",
                "average_service_time(ALL)_(sec)",
                "average_network_delay(ALL)_(sec)",
                "average_service_time(Cloud)_(sec)",
                "average_processing_time(Cloud)_(sec)",
                "average_service_time(Edge)_(sec)",
                "average_processing_time(Edge)_(sec)",
                "average_service_time(Mobile)_(sec)",
                "average_processing_time(Mobile)_(sec)",
            ]),
            auto_metrics: strings(&[
                // ALL
                "num_of_completed_tasks(ALL)",
                "num_of_failed_tasks(ALL)",
                "num_of_uncompleted_tasks(ALL)",
                "num_of_failed_tasks_due_network(ALL)",
                "num_of_failed_tasks_due_vm_capacity(ALL)",
                "num_of_failed_tasks_due_mobility(ALL)",
                "average_service_time(ALL)_(sec)",
                "average_processing_time(ALL)_(sec)",
                "average_network_delay(ALL)_(sec)",
                // CLOUD
                "num_of_completed_tasks(Cloud)",
                "num_of_failed_tasks(Cloud)",
                "num_of_uncompleted_tasks(Cloud)",
                "average_service_time(Cloud)_(sec)",
                "average_processing_time(Cloud)_(sec)",
                "average_server_utilization(Cloud)_(%)",
                "num_of_failed_tasks_due_vm_capacity(Cloud)",
                // EDGE
                "num_of_completed_tasks(Edge)",
                "num_of_failed_tasks(Edge)",
                "num_of_uncompleted_tasks(Edge)",
                "average_service_time(Edge)_(sec)",
                "average_processing_time(Edge)_(sec)",
                "average_server_utilization(Edge)_(%)",
                "num_of_failed_tasks_due_vm_capacity(Edge)",
                // MOBILE
                "num_of_completed_tasks(Mobile)",
                "num_of_failed_tasks(Mobile)",
                "num_of_uncompleted_tasks(Mobile)",
                "average_service_time(Mobile)_(sec)",
                "average_processing_time(Mobile)_(sec)",
                "average_server_utilization(Mobile)_(%)",
                "num_of_failed_tasks_due_vm_capacity(Mobile)",
                // derived
                COMPLETED_PLUS_FAILED,
            ]),
        }
    }
}

impl PlotConfig {
    pub fn check(&self) -> Result<()> {
        if self.colors.is_empty() {
            bail!("plot config: need at least one color");
        }
        for color in &self.colors {
            color.parse::<HexColor>().context("plot config")?;
        }
        Ok(())
    }

    fn color(&self, i: usize) -> Result<HexColor> {
        if self.colors.is_empty() {
            bail!("plot config: need at least one color");
        }
        self.colors[i % self.colors.len()].parse()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlotMode {
    #[default]
    None,
    /// All `auto_metrics` that exist, against the device count
    Auto,
    /// One chart for the given columns
    Manual { x: KString, y: KString },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
}

/// The sub-directory a chart goes into, from the metric name.
pub fn bucket(y_col: &str) -> &'static str {
    if y_col.contains("ALL") {
        "ALL"
    } else if y_col.contains("Cloud") {
        "CLOUD"
    } else if y_col.contains("Edge") {
        "EDGE"
    } else if y_col.contains("Mobile") {
        "MOBILE"
    } else {
        "OTHERS"
    }
}

pub fn chart_file_stem(x_col: &str, y_col: &str) -> String {
    format!("{x_col}_per_{y_col}")
}

pub fn chart_title(y_col: &str) -> String {
    let title = lookup(TITLES, y_col).unwrap_or(y_col);
    let title = title.replace("(All)", "").replace("(ALL)", "");
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn axis_label(col: &str) -> &str {
    lookup(AXIS_LABELS, col).unwrap_or(col)
}

fn y_axis_label(y_col: &str) -> &str {
    match y_col {
        COMPLETED | COMPLETED_PLUS_FAILED => "Task Completion (%)",
        FAILED => "Task Failure (%)",
        _ if FAILURE_REASON_METRICS.contains(&y_col) => "Task Failure (%)",
        _ => axis_label(y_col),
    }
}

/// `part` as percentage of `total`, with a zero total counting as 1.
fn percentage(part: Option<f64>, total: Option<f64>) -> Option<f64> {
    let total = total?;
    let total = if total == 0. { 1. } else { total };
    Some(part? / total * 100.)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub policy: KString,
    pub color: HexColor,
    /// (x, y), in table order
    pub points: Vec<(f64, Option<f64>)>,
    /// Drawn inside the bars (completed share of the completed + failed
    /// chart)
    pub overlay: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub x_col: KString,
    pub y_col: KString,
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub y_range: Option<(f64, f64)>,
    /// The distinct x values, ascending
    pub x_values: Vec<f64>,
    pub series: Vec<ChartSeries>,
}

fn column_value(means: &MeanTable, row: &MeanRow, col: &str) -> Option<f64> {
    if col == DEVICES_COLUMN {
        Some(row.devices as f64)
    } else {
        means.value(row, col)
    }
}

fn has_column(means: &MeanTable, col: &str) -> bool {
    col == DEVICES_COLUMN || means.column_index(col).is_some()
}

/// The policies in display order with their color index.
fn ordered_policies<'m>(means: &'m MeanTable, config: &PlotConfig) -> Vec<(&'m str, usize)> {
    let present = means.policies();
    let mut ordered: Vec<(&str, usize)> = config
        .policy_order
        .iter()
        .enumerate()
        .filter_map(|(i, p)| present.iter().find(|q| **q == p.as_str()).map(|q| (*q, i)))
        .collect();
    let mut rest: Vec<&str> = present
        .iter()
        .copied()
        .filter(|p| !config.policy_order.iter().any(|q| q.as_str() == *p))
        .collect();
    natural_sort(&mut rest);
    let offset = config.policy_order.len();
    ordered.extend(rest.into_iter().enumerate().map(|(i, p)| (p, offset + i)));
    ordered
}

pub fn prepare_chart(
    means: &MeanTable,
    x_col: &str,
    y_col: &str,
    config: &PlotConfig,
) -> Result<ChartData> {
    for col in [x_col, y_col] {
        if !has_column(means, col) {
            bail!("no column {col:?} in the table of means");
        }
    }
    let kind = if config.line_metrics.iter().any(|m| m.as_str() == y_col) {
        ChartKind::Line
    } else {
        ChartKind::Bar
    };
    let is_share = TASK_SHARE_METRICS.contains(&y_col);
    let is_failure_reason = FAILURE_REASON_METRICS.contains(&y_col);

    let mut x_values: Vec<f64> = Vec::new();
    let mut series = Vec::new();
    for (policy, color_index) in ordered_policies(means, config) {
        let mut points = Vec::new();
        let mut overlay = Vec::new();
        for row in means.rows.iter().filter(|r| r.policy.as_str() == policy) {
            let Some(x) = column_value(means, row, x_col) else {
                continue;
            };
            let mut y = column_value(means, row, y_col);
            if kind == ChartKind::Bar {
                let completed = means.value(row, COMPLETED);
                let failed = means.value(row, FAILED);
                let total = completed.zip(failed).map(|(c, f)| c + f);
                if is_share {
                    y = percentage(y, total);
                    overlay.push(percentage(completed, total));
                } else if is_failure_reason {
                    y = percentage(y, failed);
                }
            }
            if !x_values.contains(&x) {
                x_values.push(x);
            }
            points.push((x, y));
        }
        series.push(ChartSeries {
            policy: KString::from_ref(policy),
            color: config.color(color_index)?,
            points,
            overlay: (y_col == COMPLETED_PLUS_FAILED && kind == ChartKind::Bar)
                .then_some(overlay),
        });
    }
    x_values.sort_by(f64::total_cmp);

    let y_range = match y_col {
        COMPLETED | COMPLETED_PLUS_FAILED if kind == ChartKind::Bar => Some(COMPLETION_Y_RANGE),
        _ => None,
    };

    Ok(ChartData {
        x_col: KString::from_ref(x_col),
        y_col: KString::from_ref(y_col),
        kind,
        title: chart_title(y_col),
        x_label: axis_label(x_col).into(),
        y_label: y_axis_label(y_col).into(),
        y_range,
        x_values,
        series,
    })
}

/// The plotted data, for the CSV file next to the chart.
impl TableView for ChartData {
    fn table_name(&self) -> Cow<'_, str> {
        "plot".into()
    }

    fn table_view_header(&self) -> Box<dyn AsRef<[(Cow<'static, str>, ColumnFormatting)]> + '_> {
        Box::new(vec![
            (
                Cow::Borrowed(MEAN_KEY_COLUMNS[0]),
                ColumnFormatting::String { width_chars: None },
            ),
            (Cow::Owned(self.x_col.to_string()), ColumnFormatting::Number),
            (Cow::Owned(self.y_col.to_string()), ColumnFormatting::Number),
        ])
    }

    fn table_view_body<'s>(
        &'s self,
    ) -> Box<dyn Iterator<Item = Cow<'s, [(Cow<'s, str>, Highlight)]>> + 's> {
        Box::new(
            Gen::new(|co| async move {
                for series in &self.series {
                    for (x, y) in &series.points {
                        let vals: Vec<(Cow<str>, Highlight)> = vec![
                            (series.policy.as_str().into(), Highlight::Neutral),
                            format_number(Some(*x)),
                            format_number(*y),
                        ];
                        co.yield_(vals.into()).await;
                    }
                }
            })
            .into_iter(),
        )
    }
}

fn y_bounds(chart: &ChartData) -> (f64, f64) {
    if let Some(range) = chart.y_range {
        return range;
    }
    let ys = chart
        .series
        .iter()
        .flat_map(|s| s.points.iter().filter_map(|(_, y)| *y));
    let (min, max) = ys.fold((0f64, 0f64), |(min, max), y| (min.min(y), max.max(y)));
    if max > min {
        (min * 1.1, max * 1.1)
    } else {
        (0., 1.)
    }
}

fn format_x(x: f64) -> String {
    format_number(Some(x)).0.into_owned()
}

/// Render the chart as SVG file.
pub fn draw_chart(chart: &ChartData, path: &Path) -> Result<()> {
    let draw_err = |e: &dyn std::fmt::Display| anyhow!("drawing chart {path:?}: {e}");

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| draw_err(&e))?;
    let (y_min, y_max) = y_bounds(chart);

    match chart.kind {
        ChartKind::Bar => {
            let n = chart.x_values.len().max(1);
            let x_values = chart.x_values.clone();
            let mut ctx = ChartBuilder::on(&root)
                .caption(&chart.title, ("sans-serif", 36))
                .margin(20)
                .set_label_area_size(LabelAreaPosition::Left, 90)
                .set_label_area_size(LabelAreaPosition::Bottom, 70)
                .build_cartesian_2d(-0.5..(n as f64 - 0.5), y_min..y_max)
                .map_err(|e| draw_err(&e))?;
            ctx.configure_mesh()
                .disable_x_mesh()
                .x_labels(n)
                .x_label_formatter(&|x| {
                    let i = x.round();
                    if (x - i).abs() < 1e-6 && i >= 0. && (i as usize) < x_values.len() {
                        format_x(x_values[i as usize])
                    } else {
                        String::new()
                    }
                })
                .x_desc(chart.x_label.as_str())
                .y_desc(chart.y_label.as_str())
                .label_style(("sans-serif", 22))
                .axis_desc_style(("sans-serif", 26))
                .draw()
                .map_err(|e| draw_err(&e))?;

            let num_series = chart.series.len().max(1);
            let bar_width = BAR_GROUP_WIDTH / num_series as f64;
            for (s, series) in chart.series.iter().enumerate() {
                let color = series.color.rgb();
                let offset = -BAR_GROUP_WIDTH / 2. + s as f64 * bar_width;
                let position = |x: f64| {
                    chart
                        .x_values
                        .iter()
                        .position(|v| *v == x)
                        .map(|i| i as f64 + offset)
                };
                let bar_style = if series.overlay.is_some() {
                    color.mix(0.5).filled()
                } else {
                    color.filled()
                };
                ctx.draw_series(series.points.iter().filter_map(|(x, y)| {
                    let left = position(*x)?;
                    Some(Rectangle::new(
                        [(left, y_min), (left + bar_width, (*y)?)],
                        bar_style,
                    ))
                }))
                .map_err(|e| draw_err(&e))?
                .label(series.policy.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 8), (x + 16, y + 8)], color.filled()));

                if let Some(overlay) = &series.overlay {
                    ctx.draw_series(series.points.iter().zip(overlay).filter_map(
                        |((x, _), y)| {
                            let left = position(*x)?;
                            Some(Rectangle::new(
                                [(left, y_min), (left + bar_width, (*y)?)],
                                color.filled(),
                            ))
                        },
                    ))
                    .map_err(|e| draw_err(&e))?;
                }
            }
            ctx.configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .label_font(("sans-serif", 22))
                .border_style(BLACK)
                .background_style(WHITE.mix(0.8))
                .draw()
                .map_err(|e| draw_err(&e))?;
        }
        ChartKind::Line => {
            let (x_min, x_max) = match (chart.x_values.first(), chart.x_values.last()) {
                (Some(first), Some(last)) if last > first => {
                    let pad = (last - first) * 0.05;
                    (first - pad, last + pad)
                }
                (Some(x), _) => (x - 1., x + 1.),
                _ => (0., 1.),
            };
            let mut ctx = ChartBuilder::on(&root)
                .caption(&chart.title, ("sans-serif", 36))
                .margin(20)
                .set_label_area_size(LabelAreaPosition::Left, 90)
                .set_label_area_size(LabelAreaPosition::Bottom, 70)
                .build_cartesian_2d(x_min..x_max, y_min..y_max)
                .map_err(|e| draw_err(&e))?;
            ctx.configure_mesh()
                .disable_x_mesh()
                .x_label_formatter(&|x| format_x(*x))
                .x_desc(chart.x_label.as_str())
                .y_desc(chart.y_label.as_str())
                .label_style(("sans-serif", 22))
                .axis_desc_style(("sans-serif", 26))
                .draw()
                .map_err(|e| draw_err(&e))?;

            for series in &chart.series {
                let color = series.color.rgb();
                let style = color.stroke_width(3);
                ctx.draw_series(
                    LineSeries::new(
                        series
                            .points
                            .iter()
                            .filter_map(|(x, y)| Some((*x, (*y)?))),
                        style,
                    )
                    .point_size(6),
                )
                .map_err(|e| draw_err(&e))?
                .label(series.policy.as_str())
                .legend(move |(x, y)| Circle::new((x + 8, y), 6, color.filled()));
            }
            ctx.configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .label_font(("sans-serif", 22))
                .border_style(BLACK)
                .background_style(WHITE.mix(0.8))
                .draw()
                .map_err(|e| draw_err(&e))?;
        }
    }

    root.present().map_err(|e| draw_err(&e))?;
    Ok(())
}

/// Draw the charts for `mode` into `graph_dir/<bucket>/`, each with a
/// CSV file of its data. Returns the number of charts drawn.
pub fn write_charts(
    means: &MeanTable,
    mode: &PlotMode,
    config: &PlotConfig,
    graph_dir: &Path,
) -> Result<usize> {
    let pairs: Vec<(&str, &str)> = match mode {
        PlotMode::None => return Ok(0),
        PlotMode::Auto => config
            .auto_metrics
            .iter()
            .filter_map(|y| {
                if has_column(means, y) {
                    Some((DEVICES_COLUMN, y.as_str()))
                } else {
                    warn!("no column {y:?} in the table of means, not charting it");
                    None
                }
            })
            .collect(),
        PlotMode::Manual { x, y } => vec![(x.as_str(), y.as_str())],
    };

    let mut num_charts = 0;
    for (x_col, y_col) in pairs {
        let chart = prepare_chart(means, x_col, y_col, config)?;
        let dir = graph_dir.join(bucket(y_col));
        create_dir_if_not_exists(&dir)?;
        let stem = chart_file_stem(x_col, y_col);
        let svg_path = dir.join(format!("{stem}.svg"));
        draw_chart(&chart, &svg_path)?;
        csv_file_write(&chart, &dir.join(format!("{stem}.csv")))?;
        info!("chart saved to {svg_path:?}");
        num_charts += 1;
    }
    Ok(num_charts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn means() -> MeanTable {
        let row = |policy: &'static str, devices, values: &[Option<f64>]| MeanRow {
            policy: KString::from_static(policy),
            devices,
            values: values.to_vec(),
        };
        MeanTable {
            columns: strings(&[
                COMPLETED,
                FAILED,
                "num_of_failed_tasks_due_mobility(ALL)",
                "average_service_time(ALL)_(sec)",
                COMPLETED_PLUS_FAILED,
            ]),
            rows: vec![
                row("CUSTOM", 100, &[Some(1.), Some(1.), Some(0.), Some(0.1), Some(2.)]),
                row("FUZZY_BASED", 100, &[Some(90.), Some(10.), Some(5.), Some(0.5), Some(100.)]),
                row("FUZZY_BASED", 200, &[Some(0.), Some(0.), Some(0.), None, Some(0.)]),
                row("ONLY_EDGE", 200, &[Some(3.), Some(1.), Some(1.), Some(0.7), Some(4.)]),
            ],
        }
    }

    #[test]
    fn t_bucket() {
        assert_eq!(bucket("num_of_completed_tasks(ALL)"), "ALL");
        assert_eq!(bucket("average_service_time(Cloud)_(sec)"), "CLOUD");
        assert_eq!(bucket("num_of_failed_tasks(Edge)"), "EDGE");
        assert_eq!(bucket("average_server_utilization(Mobile)_(%)"), "MOBILE");
        assert_eq!(bucket("average_overhead(ns)"), "OTHERS");
        assert_eq!(
            chart_file_stem("devices", "num_of_failed_tasks(Edge)"),
            "devices_per_num_of_failed_tasks(Edge)"
        );
    }

    #[test]
    fn t_titles() {
        assert_eq!(
            chart_title("average_service_time(ALL)_(sec)"),
            "Average Service Time (sec)"
        );
        assert_eq!(chart_title("num_of_failed_tasks(Edge)"), "Number of Failed Tasks (Edge)");
        assert_eq!(chart_title("foo(ALL)"), "foo");
        assert_eq!(axis_label("devices"), "Number of MDs");
        assert_eq!(y_axis_label(COMPLETED_PLUS_FAILED), "Task Completion (%)");
        assert_eq!(
            y_axis_label("num_of_failed_tasks_due_network(ALL)"),
            "Task Failure (%)"
        );
        assert_eq!(y_axis_label("xyz"), "xyz");
    }

    #[test]
    fn t_hex_color() {
        assert_eq!("#2b83ba".parse::<HexColor>().unwrap(), HexColor(0x2b, 0x83, 0xba));
        assert!("2b83ba".parse::<HexColor>().is_err());
        assert!("#2b83b".parse::<HexColor>().is_err());
        assert!("#2b83bx".parse::<HexColor>().is_err());
        PlotConfig::default().check().unwrap();
    }

    #[test]
    fn t_policy_order() {
        let m = means();
        let config = PlotConfig::default();
        assert_eq!(
            ordered_policies(&m, &config),
            [("ONLY_EDGE", 1), ("FUZZY_BASED", 7), ("CUSTOM", 9)]
        );
    }

    #[test]
    fn t_prepare_percentages() {
        let m = means();
        let config = PlotConfig::default();
        let chart = prepare_chart(&m, DEVICES_COLUMN, COMPLETED, &config).unwrap();
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(chart.y_range, Some(COMPLETION_Y_RANGE));
        assert_eq!(chart.y_label, "Task Completion (%)");
        assert_eq!(chart.x_values, [100., 200.]);
        let policies: Vec<&str> = chart.series.iter().map(|s| s.policy.as_str()).collect();
        assert_eq!(policies, ["ONLY_EDGE", "FUZZY_BASED", "CUSTOM"]);
        assert_eq!(chart.series[0].points, [(200., Some(75.))]);
        // zero total counts as 1
        assert_eq!(
            chart.series[1].points,
            [(100., Some(90.)), (200., Some(0.))]
        );
        assert_eq!(chart.series[0].color, HexColor(0xab, 0xdd, 0xa4));
        assert_eq!(chart.series[0].overlay, None);

        let chart =
            prepare_chart(&m, DEVICES_COLUMN, "num_of_failed_tasks_due_mobility(ALL)", &config)
                .unwrap();
        assert_eq!(chart.series[1].points[0], (100., Some(50.)));
        assert_eq!(chart.y_range, None);

        let chart = prepare_chart(&m, DEVICES_COLUMN, COMPLETED_PLUS_FAILED, &config).unwrap();
        assert_eq!(chart.series[1].points[0], (100., Some(100.)));
        assert_eq!(
            chart.series[1].overlay.as_deref(),
            Some([Some(90.), Some(0.)].as_slice())
        );
    }

    #[test]
    fn t_prepare_line() {
        let m = means();
        let config = PlotConfig::default();
        let chart =
            prepare_chart(&m, DEVICES_COLUMN, "average_service_time(ALL)_(sec)", &config).unwrap();
        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.title, "Average Service Time (sec)");
        assert_eq!(chart.series[1].points, [(100., Some(0.5)), (200., None)]);

        assert!(prepare_chart(&m, DEVICES_COLUMN, "nope", &config).is_err());

        // Manual mode with a metric as x axis
        let chart = prepare_chart(&m, FAILED, COMPLETED, &config).unwrap();
        assert_eq!(chart.x_values, [0., 1., 10.]);
    }

    #[test]
    fn t_chart_table_view() {
        let m = means();
        let chart = prepare_chart(&m, DEVICES_COLUMN, FAILED, &PlotConfig::default()).unwrap();
        let header = chart.table_view_header();
        let labels: Vec<&str> = (*header).as_ref().iter().map(|(l, _)| l.as_ref()).collect();
        assert_eq!(labels, ["policy_name", "devices", FAILED]);
        let rows: Vec<Vec<String>> = chart
            .table_view_body()
            .map(|row| row.iter().map(|(v, _)| v.to_string()).collect())
            .collect();
        assert_eq!(rows[0], ["ONLY_EDGE", "200", "25"]);
        assert_eq!(rows.len(), 4);
    }
}
