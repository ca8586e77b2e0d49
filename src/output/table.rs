use comfy_table::{Table, presets::NOTHING};

/// Spaces between columns, as kubectl prints them
const COLUMN_GAP: u16 = 3;

pub struct TableFormatter;

impl TableFormatter {
    /// Render an aligned, borderless table with a header row
    pub fn format(headers: &[String], rows: &[Vec<String>]) -> String {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_header(headers);

        for row in rows {
            table.add_row(row);
        }

        let last = headers.len().saturating_sub(1);
        for (idx, column) in table.column_iter_mut().enumerate() {
            let right = if idx == last { 0 } else { COLUMN_GAP };
            column.set_padding((0, right));
        }

        table.trim_fmt()
    }
}
