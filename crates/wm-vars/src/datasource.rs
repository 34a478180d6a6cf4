//! Datasource row table
//!
//! Tabular content loaded through the injected loader when the
//! datasource-path variable is assigned. Column pseudo-variables
//! (`!COL1`, `!COL2`, ...) read from the row selected by the line
//! cursor.

use crate::error::{VarError, VarResult};

/// A loaded, delimiter-split row table
#[derive(Debug, Clone, Default)]
pub struct Datasource {
    rows: Vec<Vec<String>>,
}

impl Datasource {
    /// Split raw content into rows using the given field delimiter
    ///
    /// Fields may be double-quoted to contain the delimiter; a doubled
    /// quote inside a quoted field is a literal quote. A trailing empty
    /// line is ignored.
    pub fn parse(content: &str, delimiter: char) -> Self {
        let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
        let rows = normalized
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(|line| split_fields(line, delimiter))
            .collect();
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row by 1-based line cursor
    pub fn row(&self, line: usize) -> VarResult<&[String]> {
        if line == 0 || line > self.rows.len() {
            return Err(VarError::DatasourceLine(line));
        }
        Ok(&self.rows[line - 1])
    }

    /// Field by 1-based line cursor and 1-based column number
    pub fn column(&self, line: usize, column: usize) -> VarResult<&str> {
        let row = self.row(line)?;
        row.get(column - 1)
            .map(String::as_str)
            .ok_or(VarError::DatasourceColumn(column))
    }

    /// Number of columns in the row under the cursor
    pub fn column_count(&self, line: usize) -> VarResult<usize> {
        Ok(self.row(line)?.len())
    }
}

fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' && current.is_empty() {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_csv() {
        let ds = Datasource::parse("a,b,c\nd,e,f\n", ',');
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column(1, 1).unwrap(), "a");
        assert_eq!(ds.column(2, 3).unwrap(), "f");
    }

    #[test]
    fn test_custom_delimiter() {
        let ds = Datasource::parse("a;b\nc;d", ';');
        assert_eq!(ds.column(2, 2).unwrap(), "d");
    }

    #[test]
    fn test_quoted_field_with_delimiter() {
        let ds = Datasource::parse(r#""a,b",c"#, ',');
        assert_eq!(ds.column(1, 1).unwrap(), "a,b");
        assert_eq!(ds.column(1, 2).unwrap(), "c");
    }

    #[test]
    fn test_doubled_quote_is_literal() {
        let ds = Datasource::parse(r#""say ""hi""",x"#, ',');
        assert_eq!(ds.column(1, 1).unwrap(), "say \"hi\"");
    }

    #[test]
    fn test_line_out_of_range() {
        let ds = Datasource::parse("a,b", ',');
        assert!(matches!(ds.row(0), Err(VarError::DatasourceLine(0))));
        assert!(matches!(ds.row(2), Err(VarError::DatasourceLine(2))));
    }

    #[test]
    fn test_column_out_of_range() {
        let ds = Datasource::parse("a,b", ',');
        assert!(matches!(
            ds.column(1, 3),
            Err(VarError::DatasourceColumn(3))
        ));
    }

    #[test]
    fn test_crlf_content() {
        let ds = Datasource::parse("a,b\r\nc,d\r\n", ',');
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column_count(1).unwrap(), 2);
    }
}
