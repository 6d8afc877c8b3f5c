use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use edgesim_eval::{
    categorize::categorize_logs,
    eval_config::{EvalConfig, MetricTableConfig},
    log_tree::TreeSelection,
    pipeline::{EvaluateOptions, date_dir, evaluate},
    plot::PlotMode,
    run_date::RunDate,
};
use flate2::{Compression, write::GzEncoder};
use kstring::KString;

const DATE: &str = "15-06-2024_19-11";

fn log_name(policy: &str, devices: u32) -> String {
    format!("SIMRESULT_TWO_TIER_WITH_EO_{policy}_{devices}DEVICES_ALL_APPS_GENERIC.log")
}

/// Write a tar.gz file at `path` with the given (path in archive,
/// contents) entries.
fn write_tar_gz(path: &Path, entries: &[(String, &str)]) {
    let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

fn config(base: &Path) -> EvalConfig {
    let positions: BTreeMap<usize, KString> = [
        "num_of_completed_tasks(ALL)",
        "num_of_failed_tasks(ALL)",
        "average_service_time(ALL)_(sec)",
    ]
    .into_iter()
    .enumerate()
    .map(|(i, name)| (i, KString::from_static(name)))
    .collect();
    EvalConfig {
        input_base: base.join("output"),
        evaluation_dir: base.join("evaluation"),
        metric_table: MetricTableConfig::Custom {
            name: "three".into(),
            positions,
        },
        ..Default::default()
    }
}

fn setup_source(base: &Path) -> PathBuf {
    let source = base.join("output").join(DATE).join("default_config");
    std::fs::create_dir_all(&source).unwrap();
    write_tar_gz(
        &source.join("ite1.tar.gz"),
        &[
            (
                format!("ite1/{}", log_name("FUZZY_BASED", 100)),
                "header\n90;10\n0.5\n",
            ),
            (format!("ite1/{}", log_name("ONLY_EDGE", 100)), "h\n3;1;0.7"),
        ],
    );
    write_tar_gz(
        &source.join("ite2.tar.gz"),
        &[(log_name("FUZZY_BASED", 100), "h\n70;30;x\n")],
    );
    std::fs::write(source.join(log_name("FUZZY_BASED", 200)), "h\n1;1;1").unwrap();
    std::fs::write(source.join("broken.tar.gz"), "not an archive").unwrap();
    // macOS metadata companion, yields no iteration name
    std::fs::write(source.join("._ite1.tar.gz"), "junk").unwrap();
    std::fs::write(source.join("notes.txt"), "ignored").unwrap();
    source
}

fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (headers, rows)
}

#[test]
fn t_evaluate() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    setup_source(base);
    let config = config(base);
    let date: RunDate = DATE.parse().unwrap();
    let metric_table = config.metric_table.load().unwrap();

    // A left-over from a previous evaluation is removed
    let stale = date_dir(&config, &date).join("stale");
    std::fs::create_dir_all(&stale).unwrap();

    let options = EvaluateOptions {
        selection: TreeSelection::default(),
        plot: PlotMode::Manual {
            x: "devices".into(),
            y: "num_of_completed_tasks(ALL)".into(),
        },
        excel: Some(base.join("tables.xlsx")),
    };
    let summary = evaluate(&config, metric_table, &date, &options)
        .unwrap()
        .expect("there is output for the date");
    assert!(!stale.exists());

    let date_dir = date_dir(&config, &date);
    assert_eq!(summary.extract.date_dir, date_dir);
    assert_eq!(summary.extract.iterations.len(), 4);
    assert_eq!(summary.extract.failed, 1);
    assert_eq!(summary.extract.categorized.moved, 4);

    // Nothing was categorized into the date directory itself
    assert!(!date_dir.join("FUZZY_BASED").exists());
    assert!(!date_dir.join("ONLY_EDGE").exists());

    // ite1 was flattened, the archive copies are gone
    assert!(!date_dir.join("ite1/ite1").exists());
    assert!(!date_dir.join("ite1/ite1.tar.gz").exists());
    assert!(!date_dir.join("ite2/ite2.tar.gz").exists());
    assert!(
        date_dir
            .join("ite1/FUZZY_BASED/ALL_APPS_GENERIC")
            .join(log_name("FUZZY_BASED", 100))
            .is_file()
    );
    // Converted to single-line form
    assert_eq!(
        std::fs::read_to_string(
            date_dir
                .join("ite1/ONLY_EDGE/ALL_APPS_GENERIC")
                .join(log_name("ONLY_EDGE", 100))
        )
        .unwrap(),
        "3;1;0.7"
    );

    assert_eq!(summary.num_records, 4);
    let [raw, sorted, mean] = &summary.csv_files;
    assert_eq!(
        raw.file_name().unwrap().to_str().unwrap(),
        "15-06-2024_19-11_logs_all_ites_all_policies_all_categories.csv"
    );
    assert_eq!(raw.parent().unwrap(), date_dir.join("csv"));

    let (headers, rows) = read_csv(raw);
    assert_eq!(
        headers,
        [
            "ite",
            "policy_name",
            "devices",
            "category",
            "num_of_completed_tasks(ALL)",
            "num_of_failed_tasks(ALL)",
            "average_service_time(ALL)_(sec)"
        ]
    );
    let raw_ite = log_name("FUZZY_BASED", 200).replace(".log", "");
    assert_eq!(
        rows,
        [
            [raw_ite.as_str(), "FUZZY_BASED", "200", "ALL_APPS_GENERIC", "1", "1", "1"],
            ["ite1", "FUZZY_BASED", "100", "ALL_APPS_GENERIC", "90", "10", "0.5"],
            ["ite1", "ONLY_EDGE", "100", "ALL_APPS_GENERIC", "3", "1", "0.7"],
            ["ite2", "FUZZY_BASED", "100", "ALL_APPS_GENERIC", "70", "30", ""],
        ]
    );

    let (_, rows) = read_csv(sorted);
    let keys: Vec<(&str, &str, &str)> = rows
        .iter()
        .map(|r| (r[0].as_str(), r[1].as_str(), r[2].as_str()))
        .collect();
    assert_eq!(
        keys,
        [
            ("ite1", "FUZZY_BASED", "100"),
            ("ite2", "FUZZY_BASED", "100"),
            (raw_ite.as_str(), "FUZZY_BASED", "200"),
            ("ite1", "ONLY_EDGE", "100"),
        ]
    );

    let (headers, rows) = read_csv(mean);
    assert_eq!(headers[..2], ["policy_name", "devices"]);
    assert_eq!(
        headers.last().unwrap(),
        "num_of_completed_plus_failed_tasks(ALL)"
    );
    assert_eq!(
        rows,
        [
            ["FUZZY_BASED", "100", "80", "20", "0.5", "100"],
            ["FUZZY_BASED", "200", "1", "1", "1", "2"],
            ["ONLY_EDGE", "100", "3", "1", "0.7", "4"],
        ]
    );
    assert_eq!(summary.num_mean_rows, 3);

    assert!(base.join("tables.xlsx").is_file());
    assert_eq!(summary.num_charts, 1);
    let chart_dir = date_dir.join("graph/ALL");
    assert!(
        chart_dir
            .join("devices_per_num_of_completed_tasks(ALL).svg")
            .is_file()
    );
    let (headers, rows) = read_csv(&chart_dir.join("devices_per_num_of_completed_tasks(ALL).csv"));
    assert_eq!(
        headers,
        ["policy_name", "devices", "num_of_completed_tasks(ALL)"]
    );
    // Percentage of completed + failed, in the configured policy order
    assert_eq!(
        rows,
        [
            ["ONLY_EDGE", "100", "75"],
            ["FUZZY_BASED", "100", "80"],
            ["FUZZY_BASED", "200", "50"],
        ]
    );

    // Categorizing again changes nothing
    let stats = categorize_logs(&date_dir.join("ite1"), &config.filename_layout).unwrap();
    assert_eq!(stats.moved, 0);
    assert_eq!(stats.in_place, 2);
}

#[test]
fn t_evaluate_selection() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    setup_source(base);
    let config = config(base);
    let date: RunDate = DATE.parse().unwrap();

    let options = EvaluateOptions {
        selection: TreeSelection {
            ite: "ite1".parse().unwrap(),
            policy: "ONLY_EDGE".parse().unwrap(),
            category: "0".parse().unwrap(),
        },
        ..Default::default()
    };
    let summary = evaluate(&config, config.metric_table.load().unwrap(), &date, &options)
        .unwrap()
        .unwrap();
    assert_eq!(summary.num_records, 1);
    assert_eq!(summary.num_charts, 0);
    assert!(
        summary.csv_files[0]
            .to_str()
            .unwrap()
            .ends_with("_logs_ite1_ONLY_EDGE_all_categories.csv")
    );
    assert!(!date_dir(&config, &date).join("graph").exists());

    let options = EvaluateOptions {
        selection: TreeSelection {
            policy: "NO_SUCH_POLICY".parse().unwrap(),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(evaluate(&config, config.metric_table.load().unwrap(), &date, &options).is_err());
}
