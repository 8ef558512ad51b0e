//! Local drain direction grids.
//!
//! Directions use the numeric-keypad convention, row 0 at the top:
//!
//! ```text
//! 7 8 9
//! 4 5 6
//! 1 2 3
//! ```
//!
//! Code 5 is a pit. `None` marks a cell outside the catchment.
use crate::error::NetworkError;

/// Keypad code of a pit.
pub const PIT: u8 = 5;

/// Row/column offset for a direction code, `None` for a pit.
pub fn offset(code: u8) -> Option<(isize, isize)> {
    match code {
        1 => Some((1, -1)),
        2 => Some((1, 0)),
        3 => Some((1, 1)),
        4 => Some((0, -1)),
        6 => Some((0, 1)),
        7 => Some((-1, -1)),
        8 => Some((-1, 0)),
        9 => Some((-1, 1)),
        _ => None,
    }
}

/// True for the four diagonal directions.
pub fn is_diagonal(code: u8) -> bool {
    matches!(code, 1 | 3 | 7 | 9)
}

/// Rectangular flow-direction raster with an implicit active-cell mask.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDirectionGrid {
    rows: usize,
    cols: usize,
    cell_size: f64,
    codes: Vec<Option<u8>>,
}

impl FlowDirectionGrid {
    /// Create a grid from row-major direction codes.
    pub fn new(
        rows: usize,
        cols: usize,
        cell_size: f64,
        codes: Vec<Option<u8>>,
    ) -> Result<Self, NetworkError> {
        let expected = rows * cols;
        if codes.len() != expected {
            return Err(NetworkError::ShapeMismatch {
                rows,
                cols,
                expected,
                actual: codes.len(),
            });
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(NetworkError::InvalidCellSize(cell_size));
        }
        for (i, code) in codes.iter().enumerate() {
            if let Some(c) = *code {
                if !(1..=9).contains(&c) {
                    return Err(NetworkError::InvalidDirectionCode {
                        row: i / cols,
                        col: i % cols,
                        code: c,
                    });
                }
            }
        }
        Ok(Self {
            rows,
            cols,
            cell_size,
            codes,
        })
    }

    /// Parse rows of whitespace-separated codes; `.` or `0` is inactive.
    pub fn parse(text: &str, cell_size: f64) -> Result<Self, NetworkError> {
        let mut rows = 0;
        let mut cols = 0;
        let mut codes = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let before = codes.len();
            for token in line.split_whitespace() {
                let code = match token {
                    "." | "0" => None,
                    t => Some(t.parse::<u8>().map_err(|_| {
                        NetworkError::InvalidDirectionCode {
                            row: rows,
                            col: codes.len() - before,
                            code: 0,
                        }
                    })?),
                };
                codes.push(code);
            }
            let width = codes.len() - before;
            if rows == 0 {
                cols = width;
            } else if width != cols {
                return Err(NetworkError::ShapeMismatch {
                    rows: rows + 1,
                    cols,
                    expected: (rows + 1) * cols,
                    actual: codes.len(),
                });
            }
            rows += 1;
        }
        Self::new(rows, cols, cell_size, codes)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cell edge length [m].
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn code(&self, row: usize, col: usize) -> Option<u8> {
        self.codes[row * self.cols + col]
    }

    pub fn n_active(&self) -> usize {
        self.codes.iter().filter(|c| c.is_some()).count()
    }

    /// Grid position a cell drains to, `None` for pits and off-grid targets.
    pub(crate) fn target(&self, row: usize, col: usize, code: u8) -> Option<(usize, usize)> {
        let (dr, dc) = offset(code)?;
        let r = row.checked_add_signed(dr)?;
        let c = col.checked_add_signed(dc)?;
        if r < self.rows && c < self.cols {
            Some((r, c))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_keypad() {
        assert_eq!(offset(2), Some((1, 0)));
        assert_eq!(offset(6), Some((0, 1)));
        assert_eq!(offset(7), Some((-1, -1)));
        assert_eq!(offset(PIT), None);
        assert!(is_diagonal(3));
        assert!(!is_diagonal(8));
    }

    #[test]
    fn parse_handles_mask() {
        let grid = FlowDirectionGrid::parse(
            "
            3 2 .
            6 5 4
            ",
            100.0,
        )
        .unwrap();
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.n_active(), 5);
        assert_eq!(grid.code(0, 2), None);
        assert_eq!(grid.code(1, 1), Some(PIT));
    }

    #[test]
    fn rejects_bad_code() {
        let err = FlowDirectionGrid::new(1, 2, 10.0, vec![Some(5), Some(12)]).unwrap_err();
        assert_eq!(
            err,
            NetworkError::InvalidDirectionCode {
                row: 0,
                col: 1,
                code: 12
            }
        );
    }

    #[test]
    fn rejects_ragged_rows() {
        assert!(FlowDirectionGrid::parse("6 5\n5", 10.0).is_err());
    }

    #[test]
    fn off_grid_target_is_none() {
        let grid = FlowDirectionGrid::new(1, 1, 10.0, vec![Some(8)]).unwrap();
        assert_eq!(grid.target(0, 0, 8), None);
        assert_eq!(grid.target(0, 0, PIT), None);
    }
}
