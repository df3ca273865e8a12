use crate::constants::*;
use crate::location::*;

/// A dense `rows x cols` array for per-cell data.
#[derive(Clone, Debug, PartialEq)]
pub struct GridArray<T: Copy> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Copy> GridArray<T> {
    pub fn new(rows: usize, cols: usize, initial: T) -> Self {
        GridArray {
            rows,
            cols,
            data: vec![initial; rows * cols],
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &T {
        &self.data[row * self.cols + col]
    }

    #[inline]
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut T {
        &mut self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        *self.get_mut(row, col) = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Location, &T)> {
        let cols = self.cols;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, v)| (Location::new(i / cols, i % cols), v))
    }
}

/// Occupied-cell counts per fixed-size block, so window scans can skip
/// blocks that hold no resource at all.
#[derive(Clone, Debug)]
struct OccupancySummary {
    block_cols: usize,
    counts: Vec<u32>,
}

impl OccupancySummary {
    fn new(rows: usize, cols: usize) -> Self {
        let block_rows = rows.div_ceil(SUMMARY_BLOCK_SIZE);
        let block_cols = cols.div_ceil(SUMMARY_BLOCK_SIZE);
        OccupancySummary {
            block_cols,
            counts: vec![0; block_rows * block_cols],
        }
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        (row / SUMMARY_BLOCK_SIZE) * self.block_cols + col / SUMMARY_BLOCK_SIZE
    }

    #[inline]
    fn block(&self, block_row: usize, block_col: usize) -> u32 {
        self.counts[block_row * self.block_cols + block_col]
    }
}

#[inline]
fn holds_resource(occupant: u32) -> bool {
    occupant != PATHWAY_ID && occupant != BLOCKED_ID
}

/// The occupant grid of a level. `1` is pathway, `0` is blocked, anything else
/// is a resource id.
#[derive(Clone, Debug)]
pub struct Grid {
    cells: GridArray<u32>,
    summary: OccupancySummary,
}

impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

impl Grid {
    /// An all-pathway grid.
    pub fn new(rows: usize, cols: usize) -> Self {
        Grid {
            cells: GridArray::new(rows, cols, PATHWAY_ID),
            summary: OccupancySummary::new(rows, cols),
        }
    }

    /// Build a grid from rows of occupant ids. Returns `None` if the rows are ragged.
    pub fn from_rows(rows: &[Vec<u32>]) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }

        let mut grid = Grid::new(height, width);
        for (r, row) in rows.iter().enumerate() {
            for (c, &occupant) in row.iter().enumerate() {
                grid.set(Location::new(r, c), occupant);
            }
        }
        Some(grid)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.cells.rows()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cells.cols()
    }

    #[inline]
    pub fn get(&self, loc: Location) -> u32 {
        *self.cells.get(loc.row(), loc.col())
    }

    #[inline]
    pub fn get_rc(&self, row: usize, col: usize) -> u32 {
        *self.cells.get(row, col)
    }

    /// Occupant at signed coordinates, or `None` outside the grid.
    #[inline]
    pub fn get_signed(&self, row: i64, col: i64) -> Option<u32> {
        Location::checked(row, col, self.rows(), self.cols()).map(|loc| self.get(loc))
    }

    #[inline]
    pub fn is_pathway(&self, loc: Location) -> bool {
        self.get(loc) == PATHWAY_ID
    }

    /// Overwrite one cell, keeping the occupancy summary current.
    pub fn set(&mut self, loc: Location, occupant: u32) {
        let previous = self.get(loc);
        if previous == occupant {
            return;
        }
        let block = self.summary.index(loc.row(), loc.col());
        if holds_resource(previous) {
            self.summary.counts[block] -= 1;
        }
        if holds_resource(occupant) {
            self.summary.counts[block] += 1;
        }
        self.cells.set(loc.row(), loc.col(), occupant);
    }

    pub fn count(&self, mut predicate: impl FnMut(u32) -> bool) -> usize {
        self.cells.iter().filter(|(_, &v)| predicate(v)).count()
    }

    /// Number of cells that are not pathway.
    pub fn non_pathway_count(&self) -> usize {
        self.count(|v| v != PATHWAY_ID)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Location, u32)> + '_ {
        self.cells.iter().map(|(loc, &v)| (loc, v))
    }

    pub fn to_rows(&self) -> Vec<Vec<u32>> {
        (0..self.rows())
            .map(|r| (0..self.cols()).map(|c| self.get_rc(r, c)).collect())
            .collect()
    }

    /// Visit every resource-holding cell inside the inclusive window
    /// `[row0, row1] x [col0, col1]` (clipped to the grid), skipping summary
    /// blocks with no resources. Stops and returns true as soon as `visit`
    /// returns true.
    pub fn any_resource_in_window<F>(
        &self,
        row0: i64,
        col0: i64,
        row1: i64,
        col1: i64,
        mut visit: F,
    ) -> bool
    where
        F: FnMut(Location, u32) -> bool,
    {
        if self.rows() == 0 || self.cols() == 0 {
            return false;
        }
        let row0 = row0.max(0) as usize;
        let col0 = col0.max(0) as usize;
        let row1 = row1.min(self.rows() as i64 - 1);
        let col1 = col1.min(self.cols() as i64 - 1);
        if row1 < row0 as i64 || col1 < col0 as i64 {
            return false;
        }
        let (row1, col1) = (row1 as usize, col1 as usize);

        for block_row in (row0 / SUMMARY_BLOCK_SIZE)..=(row1 / SUMMARY_BLOCK_SIZE) {
            for block_col in (col0 / SUMMARY_BLOCK_SIZE)..=(col1 / SUMMARY_BLOCK_SIZE) {
                if self.summary.block(block_row, block_col) == 0 {
                    continue;
                }

                let r_start = (block_row * SUMMARY_BLOCK_SIZE).max(row0);
                let r_end = ((block_row + 1) * SUMMARY_BLOCK_SIZE - 1).min(row1);
                let c_start = (block_col * SUMMARY_BLOCK_SIZE).max(col0);
                let c_end = ((block_col + 1) * SUMMARY_BLOCK_SIZE - 1).min(col1);

                for r in r_start..=r_end {
                    for c in c_start..=c_end {
                        let occupant = self.get_rc(r, c);
                        if holds_resource(occupant) && visit(Location::new(r, c), occupant) {
                            return true;
                        }
                    }
                }
            }
        }

        false
    }
}

/// Neighbor offsets for 8-directional adjacency.
pub const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
];

/// Neighbor offsets for 4-directional (orthogonal) adjacency.
pub const NEIGHBORS_4: [(i32, i32); 4] = [(-1, 0), (0, 1), (1, 0), (0, -1)];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_rejects_ragged_input() {
        assert!(Grid::from_rows(&[vec![1, 1], vec![1]]).is_none());

        let grid = Grid::from_rows(&[vec![1, 0, 1], vec![5, 1, 1]]).unwrap();
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.get(Location::new(1, 0)), 5);
        assert_eq!(grid.non_pathway_count(), 2);
        assert_eq!(grid.to_rows(), vec![vec![1, 0, 1], vec![5, 1, 1]]);
    }

    #[test]
    fn window_scan_is_clipped_and_skips_obstacles() {
        let mut grid = Grid::new(20, 20);
        grid.set(Location::new(0, 0), BLOCKED_ID);
        grid.set(Location::new(12, 17), 4);

        let mut seen = Vec::new();
        let found = grid.any_resource_in_window(-5, -5, 19, 25, |loc, id| {
            seen.push((loc, id));
            false
        });
        assert!(!found);
        assert_eq!(seen, vec![(Location::new(12, 17), 4)]);

        assert!(grid.any_resource_in_window(10, 15, 12, 17, |_, id| id == 4));
        assert!(!grid.any_resource_in_window(0, 0, 11, 19, |_, _| true));
    }

    #[test]
    fn summary_tracks_overwrites() {
        let mut grid = Grid::new(9, 9);
        let loc = Location::new(8, 8);
        grid.set(loc, 3);
        assert!(grid.any_resource_in_window(8, 8, 8, 8, |_, _| true));
        grid.set(loc, 2);
        grid.set(loc, PATHWAY_ID);
        assert!(!grid.any_resource_in_window(0, 0, 8, 8, |_, _| true));
    }
}
