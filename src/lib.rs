pub mod aggregate;
pub mod archive;
pub mod categorize;
pub mod config_file;
pub mod eval_config;
pub mod get_terminal_width;
pub mod io_utils;
pub mod log_filename;
pub mod log_line;
pub mod log_tree;
pub mod metric_table;
pub mod pipeline;
pub mod plot;
pub mod run_date;
pub mod tables;
pub mod utillib;
