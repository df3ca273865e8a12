use serde::*;

/// A grid cell, addressed by row and column.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
#[repr(transparent)]
pub struct Location {
    packed: u32,
}

impl Location {
    pub fn new(row: usize, col: usize) -> Self {
        debug_assert!(row <= u16::MAX as usize && col <= u16::MAX as usize);
        Location {
            packed: ((row as u32) << 16) | (col as u32 & 0xFFFF),
        }
    }

    /// Build a location from signed coordinates, returning `None` if it falls
    /// outside a `rows x cols` grid.
    #[inline]
    pub fn checked(row: i64, col: i64, rows: usize, cols: usize) -> Option<Self> {
        if row >= 0 && col >= 0 && (row as usize) < rows && (col as usize) < cols {
            Some(Location::new(row as usize, col as usize))
        } else {
            None
        }
    }

    #[inline]
    pub fn row(self) -> usize {
        (self.packed >> 16) as usize
    }

    #[inline]
    pub fn col(self) -> usize {
        (self.packed & 0xFFFF) as usize
    }

    /// Offset this location by a signed `(row, col)` delta without bounds checks.
    #[inline]
    pub fn offset(self, dr: i32, dc: i32) -> (i64, i64) {
        (self.row() as i64 + dr as i64, self.col() as i64 + dc as i64)
    }

    /// Chebyshev (king move) distance.
    pub fn distance_to(self, other: Self) -> u32 {
        let dr = (self.row() as i64 - other.row() as i64).unsigned_abs();
        let dc = (self.col() as i64 - other.col() as i64).unsigned_abs();
        dr.max(dc) as u32
    }
}

impl Serialize for Location {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (self.row(), self.col()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (row, col) = <(usize, usize)>::deserialize(deserializer)?;
        if row > u16::MAX as usize || col > u16::MAX as usize {
            return Err(de::Error::custom("location coordinate out of range"));
        }
        Ok(Location::new(row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_row_and_col() {
        let loc = Location::new(799, 3);
        assert_eq!(loc.row(), 799);
        assert_eq!(loc.col(), 3);
    }

    #[test]
    fn chebyshev_distance() {
        let a = Location::new(2, 2);
        assert_eq!(a.distance_to(Location::new(2, 2)), 0);
        assert_eq!(a.distance_to(Location::new(7, 4)), 5);
        assert_eq!(a.distance_to(Location::new(0, 8)), 6);
    }

    #[test]
    fn checked_rejects_out_of_bounds() {
        assert_eq!(Location::checked(-1, 0, 5, 5), None);
        assert_eq!(Location::checked(0, 5, 5, 5), None);
        assert_eq!(Location::checked(4, 4, 5, 5), Some(Location::new(4, 4)));
    }
}
