use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print left-aligned columns sized to their widest cell.
/// Cells are truncated to keep wide JSON values from wrapping the table.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    const MAX_CELL: usize = 60;

    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(|cell| truncate(cell, MAX_CELL)).collect())
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .fold(h.len(), usize::max)
        })
        .collect();

    let render = |cells: Vec<&str>| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:w$}"))
            .collect();
        println!("{}", line.join("  ").trim_end());
    };

    render(headers.to_vec());
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    render(rule.iter().map(String::as_str).collect());
    for row in &rows {
        render(row.iter().map(String::as_str).collect());
    }
}

fn truncate(cell: String, max: usize) -> String {
    if cell.chars().count() <= max {
        return cell;
    }
    let mut cut: String = cell.chars().take(max - 3).collect();
    cut.push_str("...");
    cut
}
