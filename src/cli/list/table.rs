use std::fmt::{self, Write};

/// A minimal left-aligned text table. Columns are sized to their widest
/// cell and separated by two spaces, so the output stays awk-friendly.
pub(super) struct Table {
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    print_header: bool,
}

impl Table {
    pub(super) fn new() -> Table {
        Table {
            header: None,
            rows: Vec::new(),
            print_header: true,
        }
    }

    pub(super) fn set_header(&mut self, cells: Vec<&str>) {
        debug_assert!(
            cells.iter().all(|c| !c.contains(char::is_whitespace)),
            "header cells must not contain whitespace"
        );

        self.header = Some(cells.into_iter().map(|c| c.to_string()).collect());
    }

    pub(super) fn add_row(&mut self, cells: Vec<String>) {
        if let Some(width) = self.width() {
            assert_eq!(cells.len(), width, "row width does not match the table");
        }

        self.rows.push(cells);
    }

    pub(super) fn show_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    fn width(&self) -> Option<usize> {
        self.header
            .as_ref()
            .map(|h| h.len())
            .or_else(|| self.rows.first().map(|r| r.len()))
    }

    fn visible_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        self.header
            .iter()
            .filter(|_| self.print_header)
            .chain(self.rows.iter())
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.width().unwrap_or(0)];

        for row in self.visible_rows() {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();

        for row in self.visible_rows() {
            for (i, cell) in row.iter().enumerate() {
                if i == row.len() - 1 {
                    f.write_str(cell)?;
                } else {
                    f.write_fmt(format_args!("{:<width$}  ", cell, width = widths[i]))?;
                }
            }

            f.write_char('\n')?;
        }

        Ok(())
    }
}
