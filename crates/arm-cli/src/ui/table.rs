//! Plain tables for listing commands.

use comfy_table::presets::NOTHING;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};

/// Borderless table with bold headers.
pub fn table(headers: &[&str]) -> Table {
    let mut t = Table::new();
    t.load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    t
}

/// Two-column `field value` table for `info` commands.
pub fn fields<'a>(rows: impl IntoIterator<Item = (&'a str, String)>) -> Table {
    let mut t = Table::new();
    t.load_preset(NOTHING);
    for (field, value) in rows {
        t.add_row(vec![Cell::new(field).add_attribute(Attribute::Dim), Cell::new(value)]);
    }
    t
}

/// Print a table, or `empty` when it has no rows.
pub fn print(t: &Table, empty: &str) {
    if t.row_iter().next().is_none() {
        println!("{empty}");
    } else {
        println!("{t}");
    }
}
