use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rust_xlsxwriter::{Color, Format, FormatAlign, workbook::Workbook};

use super::table_view::{ColumnFormatting, Highlight, TableView};
use crate::io_utils::div::{add_extension, xrename};

/// How many characters to add to the automatic column width
/// calculation to try to avoid setting widths too small to accomodate
/// the strings in the cells.
const WIDTH_SAFETY_MARGIN_CHARS: f64 = 2.0;

/// Column titles (metric names) can be long, limit the width they
/// cause.
const MAX_TITLE_WIDTH_CHARS: usize = 30;

/// Write each table as a worksheet of one Excel file, atomically (via
/// a ".tmp" file).
pub fn excel_file_write<'t>(
    tables: impl IntoIterator<Item = &'t (dyn TableView + 't)>,
    file: &Path,
) -> Result<()> {
    let mut workbook = Workbook::new();

    for table in tables {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(table.table_name()).with_context(|| {
            anyhow!(
                "trying to use table name as worksheet name: {:?}",
                table.table_name()
            )
        })?;

        let _titles = table.table_view_header();
        let titles = (*_titles).as_ref();

        // Our own max width tracking, in characters
        let mut column_widths: Vec<usize> = titles.iter().map(|_| 1).collect();

        let mut rownum = 0;

        let title_format = Format::new().set_bold().set_text_wrap();
        for (i, (label, _column_formatting)) in titles.iter().enumerate() {
            let colnum = u16::try_from(i).with_context(|| anyhow!("too many columns for excel"))?;
            column_widths[i] = label.chars().count().min(MAX_TITLE_WIDTH_CHARS);
            worksheet
                .write_with_format(rownum, colnum, label.as_ref(), &title_format)
                .with_context(|| anyhow!("write title value {label:?}"))?;
        }
        worksheet
            .set_freeze_panes(1, 0)
            .with_context(|| anyhow!("freezing title row"))?;

        for row in table.table_view_body() {
            rownum += 1;
            for (i, (val, highlight)) in row.iter().enumerate() {
                let column_formatting = titles[i].1;
                let colnum =
                    u16::try_from(i).with_context(|| anyhow!("too many columns for excel"))?;

                let mut format = Format::new();
                match highlight {
                    Highlight::Neutral => (),
                    Highlight::Missing => {
                        format = format.set_background_color(Color::Silver);
                    }
                }

                column_widths[i] = column_widths[i].max(val.chars().count());

                match column_formatting {
                    ColumnFormatting::Number => {
                        format = format.set_align(FormatAlign::Right);
                        if let Ok(number) = val.parse::<f64>() {
                            worksheet
                                .write_number_with_format(rownum, colnum, number, &format)
                                .with_context(|| anyhow!("write number {number}"))?;
                        } else {
                            worksheet
                                .write_with_format(rownum, colnum, val.as_ref(), &format)
                                .with_context(|| anyhow!("write value {val:?}"))?;
                        }
                    }
                    ColumnFormatting::String { width_chars: _ } => {
                        worksheet
                            .write_with_format(rownum, colnum, val.as_ref(), &format)
                            .with_context(|| anyhow!("write value {val:?}"))?;
                    }
                }
            }
        }

        // Set column widths; the automatic fitting of this version of
        // rust_xlsxwriter works badly for numbers, thus use our own
        // character counting.
        for (i, (num_chars, (_label, column_formatting))) in
            column_widths.iter().zip(titles.iter()).enumerate()
        {
            let colnum = u16::try_from(i).with_context(|| anyhow!("too many columns for excel"))?;
            let width = match column_formatting {
                ColumnFormatting::String {
                    width_chars: Some(width_chars),
                } => *width_chars,
                _ => *num_chars as f64 + WIDTH_SAFETY_MARGIN_CHARS,
            };
            worksheet
                .set_column_width(colnum, width)
                .with_context(|| anyhow!("setting column width on column {colnum} to {width}"))?;
        }
    }

    let file_tmp =
        add_extension(file, "tmp").ok_or_else(|| anyhow!("path misses a filename: {file:?}"))?;
    workbook
        .save(&file_tmp)
        .with_context(|| anyhow!("saving to file {file_tmp:?}"))?;
    xrename(&file_tmp, file)?;

    Ok(())
}
