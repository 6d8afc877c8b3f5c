//! Tabular output.
//!
//! [`table_view`](table_view.rs) defines the `TableView` trait, a
//! format independent tabular data representation, implemented by
//! the record and mean tables in [`aggregate`](../aggregate.rs).
//! [`csv_table_view`](csv_table_view.rs) and
//! [`excel_table_view`](excel_table_view.rs) serialise it.

pub mod csv_table_view;
pub mod excel_table_view;
pub mod table_view;
