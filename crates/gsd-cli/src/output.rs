use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Column-aligned table. Widths count characters so status glyphs line up.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    print!("{}", format_table(headers, &rows));
}

pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let pad = |cell: &str, width: usize| {
        let fill = width.saturating_sub(cell.chars().count());
        format!("{cell}{}", " ".repeat(fill))
    };
    let line = |cells: Vec<String>| format!("{}\n", cells.join("  ").trim_end());

    let mut out = String::new();
    out.push_str(&line(
        headers
            .iter()
            .enumerate()
            .map(|(i, h)| pad(h, widths[i]))
            .collect(),
    ));
    out.push_str(&line(widths.iter().map(|&w| "-".repeat(w)).collect()));
    for row in rows {
        out.push_str(&line(
            row.iter()
                .enumerate()
                .map(|(i, cell)| pad(cell, widths.get(i).copied().unwrap_or(0)))
                .collect(),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_unicode_cells() {
        let out = format_table(
            &["", "PHASE"],
            &[
                vec!["●".to_string(), "1".to_string()],
                vec!["◐".to_string(), "2.1".to_string()],
            ],
        );
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "   PHASE");
        assert_eq!(lines[1], "-  -----");
        assert_eq!(lines[2], "●  1");
        assert_eq!(lines[3], "◐  2.1");
    }
}
