use std::path::Path;

use anyhow::{Context, Result, anyhow};

use super::table_view::TableView;
use crate::io_utils::div::{add_extension, xrename};

/// Write the table as comma separated values with a header row,
/// atomically (via a ".tmp" file).
pub fn csv_file_write(table: &dyn TableView, file: &Path) -> Result<()> {
    let file_tmp =
        add_extension(file, "tmp").ok_or_else(|| anyhow!("path misses a filename: {file:?}"))?;
    {
        let mut writer = csv::Writer::from_path(&file_tmp)
            .with_context(|| anyhow!("opening {file_tmp:?} for writing"))?;

        let _titles = table.table_view_header();
        let titles = (*_titles).as_ref();
        writer
            .write_record(titles.iter().map(|(label, _)| label.as_bytes()))
            .with_context(|| anyhow!("writing header to {file_tmp:?}"))?;

        for row in table.table_view_body() {
            writer
                .write_record(row.iter().map(|(val, _)| val.as_bytes()))
                .with_context(|| anyhow!("writing row to {file_tmp:?}"))?;
        }
        writer
            .flush()
            .with_context(|| anyhow!("flushing {file_tmp:?}"))?;
    }
    xrename(&file_tmp, file)?;
    Ok(())
}
