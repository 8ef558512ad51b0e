//! Drainage network: an immutable in-forest over active cells.
//!
//! Every active cell drains to at most one other cell; pits drain to
//! themselves and water leaving a pit leaves the catchment. The
//! upstream-before-downstream order is computed once at build time and reused
//! by every traversal.
pub mod ldd;
pub mod ops;

use std::collections::VecDeque;
use std::f64::consts::SQRT_2;

use smallvec::SmallVec;

use crate::error::{NetworkError, TopologyFault};
pub use ldd::FlowDirectionGrid;

/// Direct upstream neighbours. A raster cell has at most eight.
pub type Upstream = SmallVec<[usize; 8]>;

#[derive(Debug, Clone, PartialEq)]
pub struct DrainageNetwork {
    rows: usize,
    cols: usize,
    cell_size: f64,
    positions: Vec<(usize, usize)>,
    cell_index: Vec<Option<usize>>,
    downstream: Vec<usize>,
    upstream: Vec<Upstream>,
    order: Vec<usize>,
    upstream_count: Vec<usize>,
    drain_length: Vec<f64>,
}

impl DrainageNetwork {
    /// Build the network from a flow-direction grid.
    ///
    /// Cell ids are assigned to active cells in row-major order. Fails with
    /// `InvalidTopology` on cycles and on non-pit cells that point off the
    /// grid or into a masked cell.
    pub fn build(grid: &FlowDirectionGrid) -> Result<Self, NetworkError> {
        let (rows, cols) = (grid.rows(), grid.cols());
        let mut cell_index = vec![None; rows * cols];
        let mut positions = Vec::with_capacity(grid.n_active());
        for row in 0..rows {
            for col in 0..cols {
                if grid.code(row, col).is_some() {
                    cell_index[row * cols + col] = Some(positions.len());
                    positions.push((row, col));
                }
            }
        }
        if positions.is_empty() {
            return Err(NetworkError::Empty);
        }

        let cell_size = grid.cell_size();
        let mut downstream = Vec::with_capacity(positions.len());
        let mut drain_length = Vec::with_capacity(positions.len());
        for (id, &(row, col)) in positions.iter().enumerate() {
            let code = grid.code(row, col).unwrap_or(ldd::PIT);
            if code == ldd::PIT {
                downstream.push(id);
                drain_length.push(cell_size);
                continue;
            }
            let target = grid
                .target(row, col, code)
                .and_then(|(r, c)| cell_index[r * cols + c])
                .ok_or(NetworkError::InvalidTopology {
                    row,
                    col,
                    fault: TopologyFault::Dangling,
                })?;
            downstream.push(target);
            drain_length.push(if ldd::is_diagonal(code) {
                cell_size * SQRT_2
            } else {
                cell_size
            });
        }

        Self::from_links(rows, cols, cell_size, positions, cell_index, downstream, drain_length)
    }

    fn from_links(
        rows: usize,
        cols: usize,
        cell_size: f64,
        positions: Vec<(usize, usize)>,
        cell_index: Vec<Option<usize>>,
        downstream: Vec<usize>,
        drain_length: Vec<f64>,
    ) -> Result<Self, NetworkError> {
        let n = positions.len();
        let mut upstream: Vec<Upstream> = vec![Upstream::new(); n];
        for (cell, &down) in downstream.iter().enumerate() {
            if down != cell {
                upstream[down].push(cell);
            }
        }

        // Kahn's algorithm, seeded in id order so the result is deterministic.
        let mut pending: Vec<usize> = upstream.iter().map(|u| u.len()).collect();
        let mut queue: VecDeque<usize> = (0..n).filter(|&c| pending[c] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(cell) = queue.pop_front() {
            order.push(cell);
            let down = downstream[cell];
            if down != cell {
                pending[down] -= 1;
                if pending[down] == 0 {
                    queue.push_back(down);
                }
            }
        }
        if order.len() < n {
            let stuck = (0..n).find(|&c| pending[c] > 0).unwrap_or(0);
            let (row, col) = positions[stuck];
            return Err(NetworkError::InvalidTopology {
                row,
                col,
                fault: TopologyFault::Cycle,
            });
        }

        let mut upstream_count = vec![0usize; n];
        for &cell in &order {
            let down = downstream[cell];
            if down != cell {
                upstream_count[down] += upstream_count[cell] + 1;
            }
        }

        Ok(Self {
            rows,
            cols,
            cell_size,
            positions,
            cell_index,
            downstream,
            upstream,
            order,
            upstream_count,
            drain_length,
        })
    }

    /// A copy of the network with some cells redirected.
    ///
    /// Each edit `(cell, target)` makes `cell` drain to `target`; a target
    /// equal to the cell turns it into a pit. Drain lengths are kept. The
    /// result is checked for cycles again.
    pub fn rerouted(&self, edits: &[(usize, usize)]) -> Result<Self, NetworkError> {
        let n = self.n_cells();
        let mut downstream = self.downstream.clone();
        for &(cell, target) in edits {
            for id in [cell, target] {
                if id >= n {
                    return Err(NetworkError::CellOutOfRange { cell: id, n_cells: n });
                }
            }
            downstream[cell] = target;
        }
        Self::from_links(
            self.rows,
            self.cols,
            self.cell_size,
            self.positions.clone(),
            self.cell_index.clone(),
            downstream,
            self.drain_length.clone(),
        )
    }

    pub fn n_cells(&self) -> usize {
        self.positions.len()
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

    /// Cell area [m2].
    pub fn cell_area(&self) -> f64 {
        self.cell_size * self.cell_size
    }

    /// Upstream-before-downstream traversal order.
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    /// Downstream id of every cell, pits map to themselves.
    pub fn downstream_ids(&self) -> &[usize] {
        &self.downstream
    }

    /// Downstream neighbour, `None` for a pit.
    pub fn downstream(&self, cell: usize) -> Option<usize> {
        let down = self.downstream[cell];
        (down != cell).then_some(down)
    }

    pub fn is_pit(&self, cell: usize) -> bool {
        self.downstream[cell] == cell
    }

    pub fn pits(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_cells()).filter(|&c| self.is_pit(c))
    }

    /// Direct upstream neighbours.
    pub fn upstream(&self, cell: usize) -> &[usize] {
        &self.upstream[cell]
    }

    /// Number of cells draining through `cell`, excluding itself.
    pub fn upstream_count(&self, cell: usize) -> usize {
        self.upstream_count[cell]
    }

    /// Area draining through `cell`, including itself [m2].
    pub fn contributing_area(&self, cell: usize) -> f64 {
        (self.upstream_count[cell] + 1) as f64 * self.cell_area()
    }

    /// Flow path length from the cell centre to its downstream neighbour [m].
    pub fn drain_length(&self, cell: usize) -> f64 {
        self.drain_length[cell]
    }

    /// Grid (row, col) of a cell.
    pub fn position(&self, cell: usize) -> (usize, usize) {
        self.positions[cell]
    }

    /// Cell id at a grid position, `None` if masked or off-grid.
    pub fn cell_at(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.rows && col < self.cols {
            self.cell_index[row * self.cols + col]
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(text: &str) -> FlowDirectionGrid {
        FlowDirectionGrid::parse(text, 100.0).unwrap()
    }

    // -- Build --

    #[test]
    fn two_tributaries_into_one_pit() {
        // A (0,0) drains SE, B (0,2) drains SW, both into C (1,1).
        let net = DrainageNetwork::build(&grid(
            "
            3 . 1
            . 5 .
            ",
        ))
        .unwrap();
        let a = net.cell_at(0, 0).unwrap();
        let b = net.cell_at(0, 2).unwrap();
        let c = net.cell_at(1, 1).unwrap();
        assert_eq!(net.n_cells(), 3);
        assert_eq!(net.downstream(a), Some(c));
        assert_eq!(net.downstream(b), Some(c));
        assert_eq!(net.downstream(c), None);
        assert_eq!(net.topological_order(), &[a, b, c]);
        assert_eq!(net.upstream(c), &[a, b]);
        assert_eq!(net.upstream_count(c), 2);
        assert_eq!(net.contributing_area(c), 3.0 * 100.0 * 100.0);
        assert!((net.drain_length(a) - 100.0 * SQRT_2).abs() < 1e-9);
        assert_eq!(net.pits().collect::<Vec<_>>(), vec![c]);
    }

    #[test]
    fn build_is_idempotent() {
        let g = grid(
            "
            3 2 1
            6 2 4
            6 5 4
            ",
        );
        let first = DrainageNetwork::build(&g).unwrap();
        let second = DrainageNetwork::build(&g).unwrap();
        assert_eq!(first.topological_order(), second.topological_order());
        assert_eq!(first.downstream_ids(), second.downstream_ids());
        assert_eq!(first, second);
    }

    #[test]
    fn order_puts_upstream_first() {
        let net = DrainageNetwork::build(&grid(
            "
            2 2 2
            2 2 2
            6 6 5
            ",
        ))
        .unwrap();
        let mut seen = vec![false; net.n_cells()];
        for &cell in net.topological_order() {
            for &up in net.upstream(cell) {
                assert!(seen[up], "upstream {up} visited after {cell}");
            }
            seen[cell] = true;
        }
        assert_eq!(net.upstream_count(net.cell_at(2, 2).unwrap()), 8);
    }

    // -- Topology errors --

    #[test]
    fn cycle_is_invalid_topology() {
        let err = DrainageNetwork::build(&grid("6 4")).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::InvalidTopology {
                fault: TopologyFault::Cycle,
                ..
            }
        ));
    }

    #[test]
    fn direction_into_mask_is_dangling() {
        let err = DrainageNetwork::build(&grid("6 .")).unwrap_err();
        assert_eq!(
            err,
            NetworkError::InvalidTopology {
                row: 0,
                col: 0,
                fault: TopologyFault::Dangling
            }
        );
    }

    #[test]
    fn direction_off_grid_is_dangling() {
        let err = DrainageNetwork::build(&grid("8 5")).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::InvalidTopology {
                fault: TopologyFault::Dangling,
                ..
            }
        ));
    }

    #[test]
    fn fully_masked_grid_is_empty() {
        assert_eq!(
            DrainageNetwork::build(&grid(". .")).unwrap_err(),
            NetworkError::Empty
        );
    }

    // -- Rerouting --

    #[test]
    fn reroute_skips_a_cell() {
        // 0 -> 1 -> 2 (pit); reroute 0 straight to 2.
        let net = DrainageNetwork::build(&grid("6 6 5")).unwrap();
        let edited = net.rerouted(&[(0, 2)]).unwrap();
        assert_eq!(edited.downstream(0), Some(2));
        assert!(edited.upstream(1).is_empty());
        assert_eq!(edited.upstream_count(2), 2);
        assert_eq!(edited.drain_length(0), net.drain_length(0));
    }

    #[test]
    fn reroute_into_cycle_fails() {
        let net = DrainageNetwork::build(&grid("6 6 5")).unwrap();
        assert!(matches!(
            net.rerouted(&[(2, 0)]),
            Err(NetworkError::InvalidTopology {
                fault: TopologyFault::Cycle,
                ..
            })
        ));
        assert!(matches!(
            net.rerouted(&[(0, 9)]),
            Err(NetworkError::CellOutOfRange { cell: 9, .. })
        ));
    }
}
