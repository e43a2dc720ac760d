//! Matrix Market coordinate format reader/writer
//!
//! Reads `%%MatrixMarket matrix coordinate <field> <symmetry>` files into a
//! [`CooMatrix`], expanding symmetric storage to general form, and writes
//! general real coordinate files back out with 1-based indices.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{HarnessError, Result};
use crate::matrix::CooMatrix;

/// Upper bound on entries reserved up front from a header's declared count
const MAX_PREALLOCATED_ENTRIES: usize = 1 << 20;

/// Value field declared in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Real,
    Integer,
    Pattern,
}

/// Symmetry declared in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetry {
    General,
    Symmetric,
    SkewSymmetric,
}

/// Parsed banner line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub field: Field,
    pub symmetry: Symmetry,
}

impl Header {
    /// Parse the `%%MatrixMarket` banner line
    pub fn parse(line: &str) -> Result<Self> {
        let tokens: Vec<String> = line
            .split_whitespace()
            .map(|t| t.to_ascii_lowercase())
            .collect();
        if tokens.len() != 5 || tokens[0] != "%%matrixmarket" {
            return Err(HarnessError::input(format!(
                "invalid Matrix Market banner: '{}'",
                line.trim()
            )));
        }
        if tokens[1] != "matrix" || tokens[2] != "coordinate" {
            return Err(HarnessError::input(format!(
                "unsupported Matrix Market layout '{} {}' (only 'matrix coordinate')",
                tokens[1], tokens[2]
            )));
        }
        let field = match tokens[3].as_str() {
            "real" | "double" => Field::Real,
            "integer" => Field::Integer,
            "pattern" => Field::Pattern,
            other => {
                return Err(HarnessError::input(format!(
                    "unsupported Matrix Market field '{}'",
                    other
                )))
            }
        };
        let symmetry = match tokens[4].as_str() {
            "general" => Symmetry::General,
            "symmetric" => Symmetry::Symmetric,
            "skew-symmetric" => Symmetry::SkewSymmetric,
            other => {
                return Err(HarnessError::input(format!(
                    "unsupported Matrix Market symmetry '{}'",
                    other
                )))
            }
        };
        Ok(Self { field, symmetry })
    }
}

/// Matrix Market format reader/writer
pub struct MatrixMarketIO;

impl MatrixMarketIO {
    /// Read a matrix in Matrix Market coordinate format
    pub fn read_matrix<P: AsRef<Path>>(path: P) -> Result<CooMatrix> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            HarnessError::input(format!("failed to open {}: {}", path.display(), e))
        })?;
        Self::read_from(BufReader::new(file))
            .map_err(|e| match e {
                HarnessError::Input(msg) => {
                    HarnessError::input(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })
    }

    /// Read a matrix from any buffered reader
    pub fn read_from<R: BufRead>(reader: R) -> Result<CooMatrix> {
        let mut lines = reader.lines();

        let banner = match lines.next() {
            Some(line) => line?,
            None => return Err(HarnessError::input("empty Matrix Market file")),
        };
        let header = Header::parse(&banner)?;

        // Skip comments, then read the size line: rows cols nnz
        let mut size_line = None;
        for line in lines.by_ref() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('%') {
                continue;
            }
            size_line = Some(line);
            break;
        }
        let size_line = size_line.ok_or_else(|| HarnessError::input("missing size line"))?;
        let parts: Vec<&str> = size_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(HarnessError::input(format!(
                "invalid size line '{}'",
                size_line.trim()
            )));
        }
        let n_rows = parse_count(parts[0], "number of rows")?;
        let n_cols = parse_count(parts[1], "number of columns")?;
        let declared = parse_count(parts[2], "number of entries")?;

        if header.symmetry != Symmetry::General && n_rows != n_cols {
            return Err(HarnessError::input(format!(
                "symmetric storage declared for a non-square {}x{} matrix",
                n_rows, n_cols
            )));
        }

        // The declared count is untrusted until the entries are counted
        let capacity = declared
            .min(n_rows.saturating_mul(n_cols))
            .min(MAX_PREALLOCATED_ENTRIES);
        let mut row_idx = Vec::with_capacity(capacity);
        let mut col_idx = Vec::with_capacity(capacity);
        let mut values = Vec::with_capacity(capacity);
        let mut seen = 0usize;

        for line in lines {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('%') {
                continue;
            }

            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            let expected = if header.field == Field::Pattern { 2 } else { 3 };
            if parts.len() < expected {
                return Err(HarnessError::input(format!(
                    "entry {} has {} fields, expected {}",
                    seen + 1,
                    parts.len(),
                    expected
                )));
            }

            // Convert from 1-indexed to 0-indexed
            let row = parse_index(parts[0], n_rows, "row")?;
            let col = parse_index(parts[1], n_cols, "column")?;
            let val: f64 = if header.field == Field::Pattern {
                1.0
            } else {
                parts[2].parse().map_err(|_| {
                    HarnessError::input(format!("invalid value '{}'", parts[2]))
                })?
            };

            row_idx.push(row);
            col_idx.push(col);
            values.push(val);

            if row != col {
                match header.symmetry {
                    Symmetry::General => {}
                    Symmetry::Symmetric => {
                        row_idx.push(col);
                        col_idx.push(row);
                        values.push(val);
                    }
                    Symmetry::SkewSymmetric => {
                        row_idx.push(col);
                        col_idx.push(row);
                        values.push(-val);
                    }
                }
            }
            seen += 1;
        }

        if seen != declared {
            return Err(HarnessError::input(format!(
                "header declares {} entries but {} were found",
                declared, seen
            )));
        }

        CooMatrix::try_new(n_rows, n_cols, row_idx, col_idx, values)
    }

    /// Write a matrix in Matrix Market format (real, general, 1-based)
    pub fn write_matrix<P: AsRef<Path>>(path: P, matrix: &CooMatrix) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);

        writeln!(file, "%%MatrixMarket matrix coordinate real general")?;
        writeln!(file, "{} {} {}", matrix.n_rows, matrix.n_cols, matrix.nnz())?;

        for (r, c, v) in matrix.iter() {
            writeln!(file, "{} {} {}", r + 1, c + 1, v)?;
        }

        file.flush()?;
        Ok(())
    }
}

fn parse_count(token: &str, what: &str) -> Result<usize> {
    token
        .parse()
        .map_err(|_| HarnessError::input(format!("invalid {} '{}'", what, token)))
}

fn parse_index(token: &str, bound: usize, what: &str) -> Result<usize> {
    let one_based: usize = token
        .parse()
        .map_err(|_| HarnessError::input(format!("invalid {} index '{}'", what, token)))?;
    if one_based == 0 || one_based > bound {
        return Err(HarnessError::input(format!(
            "{} index {} outside 1..={}",
            what, one_based, bound
        )));
    }
    Ok(one_based - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    #[test]
    fn test_matrix_market_format() {
        let mtx_content = "%%MatrixMarket matrix coordinate real general\n\
                          % a comment\n\
                          3 3 5\n\
                          1 1 1.0\n\
                          1 3 2.0\n\
                          2 2 3.0\n\
                          3 1 4.0\n\
                          3 3 5.0\n";

        let matrix = MatrixMarketIO::read_from(Cursor::new(mtx_content)).unwrap();

        assert_eq!(matrix.n_rows, 3);
        assert_eq!(matrix.n_cols, 3);
        assert_eq!(matrix.nnz(), 5);
        assert_eq!(matrix.row_idx, vec![0, 0, 1, 2, 2]);
        assert_eq!(matrix.col_idx, vec![0, 2, 1, 0, 2]);
        assert_eq!(matrix.values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_symmetric_expansion() {
        let mtx = "%%MatrixMarket matrix coordinate real symmetric\n\
                   3 3 3\n\
                   1 1 4.0\n\
                   2 1 1.5\n\
                   3 2 2.5\n";
        let matrix = MatrixMarketIO::read_from(Cursor::new(mtx)).unwrap();

        assert_eq!(matrix.nnz(), 5);
        let entries: Vec<_> = matrix.iter().collect();
        assert!(entries.contains(&(1, 0, 1.5)));
        assert!(entries.contains(&(0, 1, 1.5)));
        assert!(entries.contains(&(2, 1, 2.5)));
        assert!(entries.contains(&(1, 2, 2.5)));
    }

    #[test]
    fn test_skew_symmetric_negates_mirror() {
        let mtx = "%%MatrixMarket matrix coordinate integer skew-symmetric\n\
                   2 2 1\n\
                   2 1 3\n";
        let matrix = MatrixMarketIO::read_from(Cursor::new(mtx)).unwrap();
        let entries: Vec<_> = matrix.iter().collect();
        assert_eq!(entries, vec![(1, 0, 3.0), (0, 1, -3.0)]);
    }

    #[test]
    fn test_pattern_values_are_one() {
        let mtx = "%%MatrixMarket matrix coordinate pattern general\n\
                   2 2 2\n\
                   1 2\n\
                   2 1\n";
        let matrix = MatrixMarketIO::read_from(Cursor::new(mtx)).unwrap();
        assert_eq!(matrix.values, vec![1.0, 1.0]);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let cases = [
            "",
            "not a banner\n1 1 1\n1 1 1\n",
            "%%MatrixMarket matrix array real general\n2 2\n1\n2\n3\n4\n",
            "%%MatrixMarket matrix coordinate complex general\n1 1 1\n1 1 1 0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 1.0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 1\n3 1 1.0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 1\n0 1 1.0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 1\n1 1 abc\n",
            "%%MatrixMarket matrix coordinate real symmetric\n2 3 1\n1 1 1.0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 18446744073709551615\n1 1 1.0\n",
            "%%MatrixMarket matrix coordinate real general\n100000 100000 100000000000\n1 1 1.0\n",
        ];
        for case in cases {
            let err = MatrixMarketIO::read_from(Cursor::new(case)).unwrap_err();
            assert!(
                matches!(err, HarnessError::Input(_)),
                "expected input error for {:?}, got {:?}",
                case,
                err
            );
        }
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = MatrixMarketIO::read_matrix("/definitely/not/here.mtx").unwrap_err();
        assert!(matches!(err, HarnessError::Input(_)));
    }

    #[test]
    fn test_write_then_read() {
        let matrix = CooMatrix::from_triplets(
            3,
            3,
            &[(0, 0, 1.0), (0, 2, 2.5), (1, 1, 3.0), (2, 0, -4.0)],
        );
        let temp_file = NamedTempFile::new().unwrap();
        MatrixMarketIO::write_matrix(temp_file.path(), &matrix).unwrap();

        let written = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(written.starts_with("%%MatrixMarket matrix coordinate real general\n3 3 4\n"));
        assert!(written.contains("1 3 2.5\n"));

        let loaded = MatrixMarketIO::read_matrix(temp_file.path()).unwrap();
        assert_eq!(loaded, matrix);
    }
}
