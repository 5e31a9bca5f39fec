use super::sections::Section;
use crate::formatting::{FormattingConfig, ReportStyle};
use comfy_table::presets::{ASCII_FULL, UTF8_FULL};
use comfy_table::{Cell, ContentArrangement, Table};

/// Boxed tables, one per section, with coloured titles when enabled.
pub fn render_terminal(sections: &[Section], formatting: FormattingConfig) -> String {
    let style = ReportStyle::new(formatting);
    let mut out = String::new();
    for section in sections {
        out.push_str(&style.header(&section.title));
        out.push('\n');
        out.push_str(&section_table(section, &style).to_string());
        out.push('\n');
        for note in &section.notes {
            out.push_str(&style.dim(note));
            out.push('\n');
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn section_table(section: &Section, style: &ReportStyle) -> Table {
    let mut table = Table::new();
    table
        .load_preset(if style.unicode() { UTF8_FULL } else { ASCII_FULL })
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(section.header.iter().map(Cell::new));
    if style.color() {
        table.enforce_styling();
    }
    for row in &section.rows {
        table.add_row(row.iter().map(|text| style.cell(text)));
    }
    table
}
