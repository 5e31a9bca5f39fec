use super::sections::Section;
use comfy_table::presets::ASCII_MARKDOWN;
use comfy_table::Table;

pub fn render_markdown(title: &str, sections: &[Section]) -> String {
    let mut out = format!("# {title}\n");
    for section in sections {
        out.push_str(&format!("\n## {}\n\n", section.title));
        let mut table = Table::new();
        table
            .load_preset(ASCII_MARKDOWN)
            .set_header(section.header.iter().map(|h| escape(h)));
        for row in &section.rows {
            table.add_row(row.iter().map(|c| escape(c)));
        }
        out.push_str(&table.to_string());
        out.push('\n');
        if !section.notes.is_empty() {
            out.push('\n');
            for note in &section.notes {
                out.push_str(&format!("> {}\n", escape(note)));
            }
        }
    }
    out
}

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_markdown_has_headings_and_notes() {
        let section = Section {
            title: "Composite reliability".to_string(),
            header: vec!["Factor".to_string(), "CR".to_string()],
            rows: vec![vec!["F1".to_string(), "0.812".to_string()]],
            notes: vec!["a | b".to_string()],
        };
        let text = render_markdown("Report", &[section]);
        assert!(text.starts_with("# Report\n\n## Composite reliability\n\n"));
        assert!(text.contains("| F1"));
        assert!(text.contains("0.812"));
        assert_eq!(text.lines().last(), Some("> a \\| b"));
    }
}
