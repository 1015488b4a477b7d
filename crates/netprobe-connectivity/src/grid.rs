//! Column-aligned text grids with multi-line cells

/// Render a bordered grid.
///
/// Cells may contain newlines; every line of a row is printed and the row
/// grows to its tallest cell. With `row_lines` a separator is drawn between
/// every pair of rows, which keeps multi-line rows readable.
pub fn render_grid(header: &[String], rows: &[Vec<String>], row_lines: bool) -> String {
    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let mut widths = vec![0usize; columns];
    for row in std::iter::once(header).chain(rows.iter().map(Vec::as_slice)) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell_width(cell));
        }
    }

    let separator = separator_line(&widths);
    let mut out = String::new();
    out.push_str(&separator);
    push_row(&mut out, header, &widths);
    out.push_str(&separator);

    for (i, row) in rows.iter().enumerate() {
        push_row(&mut out, row, &widths);
        if row_lines || i + 1 == rows.len() {
            out.push_str(&separator);
        }
    }

    out
}

fn cell_width(cell: &str) -> usize {
    cell.lines().map(|l| l.chars().count()).max().unwrap_or(0)
}

fn separator_line(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line.push('\n');
    line
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let height = cells
        .iter()
        .map(|c| c.lines().count())
        .max()
        .unwrap_or(0)
        .max(1);

    for line_idx in 0..height {
        out.push('|');
        for (col, width) in widths.iter().enumerate() {
            let line = cells
                .get(col)
                .and_then(|c| c.lines().nth(line_idx))
                .unwrap_or("");
            let pad = width.saturating_sub(line.chars().count());
            out.push(' ');
            out.push_str(line);
            out.push_str(&" ".repeat(pad));
            out.push_str(" |");
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_line_grid() {
        let header = strings(&["", "a", "bb"]);
        let rows = vec![strings(&["a", ".", "X"]), strings(&["bb", "#", "."])];

        let expected = "\
+----+---+----+
|    | a | bb |
+----+---+----+
| a  | . | X  |
| bb | # | .  |
+----+---+----+
";
        assert_eq!(render_grid(&header, &rows, false), expected);
    }

    #[test]
    fn multi_line_cells_grow_the_row() {
        let header = strings(&["tcp/80\ntcp/81", "a"]);
        let rows = vec![strings(&["a", ". X"])];

        let expected = "\
+--------+-----+
| tcp/80 | a   |
| tcp/81 |     |
+--------+-----+
| a      | . X |
+--------+-----+
";
        assert_eq!(render_grid(&header, &rows, true), expected);
    }

    #[test]
    fn row_lines_separate_every_row() {
        let header = strings(&["", "a"]);
        let rows = vec![strings(&["a", "."]), strings(&["b", "X"])];
        let rendered = render_grid(&header, &rows, true);
        assert_eq!(rendered.matches("+---+---+").count(), 4);
    }

    #[test]
    fn header_only() {
        let rendered = render_grid(&strings(&["name"]), &[], false);
        assert_eq!(rendered, "+------+\n| name |\n+------+\n");
    }
}
