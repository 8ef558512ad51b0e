//! Whole-network traversals over dense per-cell arrays.
//!
//! These replace the raster `accuflux`, `accucapacity`, `upstream` and
//! `ldddist` primitives with explicit walks along the precomputed order.
use super::DrainageNetwork;

impl DrainageNetwork {
    /// Sum each cell's own value with everything accumulated upstream of it.
    pub fn accumulate(&self, source: &[f64]) -> Vec<f64> {
        self.accumulate_with(source, |_, total| total)
    }

    /// Accumulation where `flux_fn(cell, total)` decides how much of a
    /// cell's accumulated total is passed on downstream.
    pub fn accumulate_with<F>(&self, source: &[f64], flux_fn: F) -> Vec<f64>
    where
        F: Fn(usize, f64) -> f64,
    {
        debug_assert_eq!(source.len(), self.n_cells());
        let mut total = source.to_vec();
        for &cell in self.topological_order() {
            if let Some(down) = self.downstream(cell) {
                total[down] += flux_fn(cell, total[cell]);
            }
        }
        total
    }

    /// Sum of `values` over the direct upstream neighbours of each cell.
    pub fn upstream_sum(&self, values: &[f64]) -> Vec<f64> {
        (0..self.n_cells())
            .map(|cell| self.upstream(cell).iter().map(|&u| values[u]).sum())
            .collect()
    }

    /// Capacity-limited transport of a stock along the network.
    ///
    /// In topological order each cell holds its own stock plus whatever was
    /// routed into it, and passes `min(capacity, held)` downstream. Returns
    /// `(outflow, new_stock)`. Outflow from a pit leaves the network, so the
    /// amount lost is the outflow summed over pits.
    pub fn route_with_capacity(&self, stock: &[f64], capacity: &[f64]) -> (Vec<f64>, Vec<f64>) {
        debug_assert_eq!(stock.len(), self.n_cells());
        debug_assert_eq!(capacity.len(), self.n_cells());
        let mut held = stock.to_vec();
        let mut outflow = vec![0.0; self.n_cells()];
        for &cell in self.topological_order() {
            let out = capacity[cell].min(held[cell]).max(0.0);
            outflow[cell] = out;
            held[cell] -= out;
            if let Some(down) = self.downstream(cell) {
                held[down] += out;
            }
        }
        (outflow, held)
    }

    /// Along-network distance from each cell down to the nearest marked cell.
    ///
    /// Marked cells are at distance zero. Cells whose downstream path never
    /// reaches a mark, or reaches it beyond `cap`, get `cap`.
    pub fn distance_to_marked(&self, marked: &[bool], cap: f64) -> Vec<f64> {
        let mut distance = vec![cap; self.n_cells()];
        for &cell in self.topological_order().iter().rev() {
            if marked[cell] {
                distance[cell] = 0.0;
            } else if let Some(down) = self.downstream(cell) {
                if distance[down] < cap {
                    distance[cell] = (distance[down] + self.drain_length(cell)).min(cap);
                }
            }
        }
        distance
    }

    /// The pit each cell ultimately drains to.
    pub fn outlets(&self) -> Vec<usize> {
        let mut outlet: Vec<usize> = (0..self.n_cells()).collect();
        for &cell in self.topological_order().iter().rev() {
            if let Some(down) = self.downstream(cell) {
                outlet[cell] = outlet[down];
            }
        }
        outlet
    }

    /// The first marked cell at or downstream of each cell, `None` when the
    /// path reaches a pit without passing one.
    pub fn downstream_marker(&self, marked: &[bool]) -> Vec<Option<usize>> {
        let mut marker = vec![None; self.n_cells()];
        for &cell in self.topological_order().iter().rev() {
            if marked[cell] {
                marker[cell] = Some(cell);
            } else if let Some(down) = self.downstream(cell) {
                marker[cell] = marker[down];
            }
        }
        marker
    }
}
