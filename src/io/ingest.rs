//! Tab-delimited table ingest.
//!
//! Rotation-curve tables come in two header conventions:
//!
//! - `HeaderStyle::Skip(n)`: the first `n` lines are headers/comments (the
//!   classic loader uses 3)
//! - `HeaderStyle::Hash`: `#` lines are comments, except a `#` line that
//!   mentions "rad", which names the columns
//!
//! Everything after that is tab-separated floats. Blank lines are ignored.
//! Conversion to typed inputs (`Curve`, `FitInput`) happens here, once, so the
//! numerical code only ever sees validated columns.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{Curve, FitInput, TableFormat};
use crate::error::{NerosError, Result};

/// How the header lines of a table are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStyle {
    Skip(usize),
    Hash,
}

impl From<TableFormat> for HeaderStyle {
    fn from(format: TableFormat) -> Self {
        match format {
            TableFormat::Skip3 => HeaderStyle::Skip(3),
            TableFormat::Hash => HeaderStyle::Hash,
        }
    }
}

/// A parsed numeric table. All rows have the same width.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// File stem of the source (galaxy name for rotation-curve tables).
    pub name: String,
    /// Column names from a `#` header line; empty when the file has none.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl Table {
    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// Interpret as a two-column `(radius, velocity)` reference curve.
    pub fn to_curve(&self) -> Result<Curve> {
        Curve::from_rows(&self.rows)
    }

    /// Interpret as a rotation-curve table (`Rad, Vobs, errV, Vgas, Vdisk, Vbul, ...`).
    pub fn to_fit_input(&self) -> Result<FitInput> {
        FitInput::from_rotmod_rows(&self.rows)
    }
}

/// Read and parse a table from disk.
pub fn read_table(path: &Path, style: HeaderStyle) -> Result<Table> {
    let text = fs::read_to_string(path)
        .map_err(|e| NerosError::Io(format!("failed to read '{}': {e}", path.display())))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_table(&name, &text, style)
        .map_err(|e| match e {
            NerosError::Parse(msg) => NerosError::Parse(format!("{}: {msg}", path.display())),
            other => other,
        })
}

/// Parse table text already in memory.
pub fn parse_table(name: &str, text: &str, style: HeaderStyle) -> Result<Table> {
    let mut columns = Vec::new();
    let mut body = String::with_capacity(text.len());
    let mut source_lines = Vec::new();

    let skip = match style {
        HeaderStyle::Skip(n) => n,
        HeaderStyle::Hash => 0,
    };
    for (idx, line) in text.lines().enumerate().skip(skip) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if style == HeaderStyle::Hash {
            if let Some(comment) = trimmed.strip_prefix('#') {
                if columns.is_empty() && comment.to_ascii_lowercase().contains("rad") {
                    columns = comment
                        .split(|c: char| c == '\t' || c.is_whitespace())
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                continue;
            }
        }
        body.push_str(trimmed);
        body.push('\n');
        source_lines.push(idx + 1);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let line = source_lines.get(i).copied().unwrap_or(0);
        let record =
            record.map_err(|e| NerosError::Parse(format!("line {line}: {e}")))?;
        let row = record
            .iter()
            .enumerate()
            .map(|(col, field)| {
                if field.is_empty() {
                    return Err(NerosError::Parse(format!(
                        "line {line}: empty field in column {}",
                        col + 1
                    )));
                }
                field.parse::<f64>().map_err(|e| {
                    NerosError::Parse(format!("line {line}: invalid number '{field}': {e}"))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(NerosError::Parse(format!(
                    "line {line}: expected {} columns, found {}",
                    first.len(),
                    row.len()
                )));
            }
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(NerosError::validation(format!("table '{name}' has no data rows")));
    }

    Ok(Table {
        name: name.to_string(),
        columns,
        rows,
    })
}

/// Non-hidden regular files in `dir`, sorted by path.
pub fn list_tables(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| NerosError::Io(format!("failed to list '{}': {e}", dir.display())))?;

    let mut out = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| NerosError::Io(format!("failed to list '{}': {e}", dir.display())))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_file() && !hidden {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROTMOD: &str = "# Distance = 10.0 Mpc\n\
        # Rad\tVobs\terrV\tVgas\tVdisk\tVbul\n\
        # kpc\tkm/s\tkm/s\tkm/s\tkm/s\tkm/s\n\
        0.5\t40.0\t5.0\t10.0\t30.0\t20.0\n\
        \n\
        1.0\t60.0\t4.0\t15.0\t45.0\t18.0\n\
        1.5\t70.0\t4.0\t18.0\t50.0\t15.0\n";

    #[test]
    fn skip_style_drops_leading_lines() {
        let table = parse_table("G1", ROTMOD, HeaderStyle::Skip(3)).unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.width(), 6);
        assert!(table.columns.is_empty());
        assert_eq!(table.rows[1], vec![1.0, 60.0, 4.0, 15.0, 45.0, 18.0]);
    }

    #[test]
    fn hash_style_reads_rad_header() {
        let table = parse_table("G1", ROTMOD, HeaderStyle::Hash).unwrap();
        assert_eq!(table.columns, vec!["Rad", "Vobs", "errV", "Vgas", "Vdisk", "Vbul"]);
        assert_eq!(table.rows.len(), 3);

        let input = table.to_fit_input().unwrap();
        assert_eq!(input.radius, vec![0.5, 1.0, 1.5]);
        assert_eq!(input.v_obs, vec![40.0, 60.0, 70.0]);
        assert_eq!(input.v_obs_error, vec![5.0, 4.0, 4.0]);
        assert_eq!(input.v_gas, vec![10.0, 15.0, 18.0]);
        assert_eq!(input.v_disk, vec![30.0, 45.0, 50.0]);
        assert_eq!(input.v_bulge, vec![20.0, 18.0, 15.0]);
    }

    #[test]
    fn reference_tables_need_two_columns() {
        let text = "h1\nh2\nh3\n1\t200\n2\t210\n3\t215\n";
        let table = parse_table("mw", text, HeaderStyle::Skip(3)).unwrap();
        let curve = table.to_curve().unwrap();
        assert_eq!(curve.len(), 3);

        let wide = parse_table("G1", ROTMOD, HeaderStyle::Hash).unwrap();
        assert!(matches!(wide.to_curve(), Err(NerosError::Validation(_))));
    }

    #[test]
    fn malformed_rows_are_parse_errors() {
        let text = "# rad\tv\n1\t200\n2\tabc\n";
        let err = parse_table("bad", text, HeaderStyle::Hash).unwrap_err();
        match err {
            NerosError::Parse(msg) => assert!(msg.contains("line 3"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }

        let ragged = "1\t200\n2\t210\t5\n";
        assert!(matches!(
            parse_table("ragged", ragged, HeaderStyle::Hash),
            Err(NerosError::Parse(_))
        ));

        assert!(matches!(
            parse_table("empty", "# only comments\n", HeaderStyle::Hash),
            Err(NerosError::Validation(_))
        ));
    }

    #[test]
    fn empty_fields_are_not_skipped() {
        let text = "# rad\tv\tverr\n1\t200\t5\n2\t\t5\n";
        match parse_table("gap", text, HeaderStyle::Hash).unwrap_err() {
            NerosError::Parse(msg) => {
                assert!(msg.contains("line 3"), "{msg}");
                assert!(msg.contains("column 2"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn list_tables_is_sorted_and_skips_hidden_files() {
        let dir = std::env::temp_dir().join(format!("neros-ingest-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["b_rotmod.dat", "a_rotmod.dat", ".hidden"] {
            fs::write(dir.join(name), "1\t2\n").unwrap();
        }

        let files = list_tables(&dir).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_rotmod.dat", "b_rotmod.dat"]);

        let table = read_table(&files[0], HeaderStyle::Hash).unwrap();
        assert_eq!(table.name, "a_rotmod");

        fs::remove_dir_all(&dir).unwrap();
    }
}
