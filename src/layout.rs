// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Adaptive grid sizing

use serde::Serialize;

/// Column/row shape of the gallery grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridLayout {
    pub columns: usize,
    pub rows: usize,
}

impl GridLayout {
    /// Number of cells in the grid. Items beyond this wrap on the last row.
    pub fn capacity(&self) -> usize {
        self.columns * self.rows
    }

    /// Stylesheet class selecting the column count
    pub fn css_class(&self) -> String {
        format!("grid-cols-{}", self.columns)
    }
}

/// Map an item count to a grid shape.
///
/// Fixed threshold table; both dimensions never shrink as `count` grows and
/// the layout stops growing at 5x4.
pub fn layout(count: usize) -> GridLayout {
    let (columns, rows) = match count {
        0 | 1 => (1, 1),
        2 => (2, 1),
        3..=4 => (2, 2),
        5..=6 => (3, 2),
        7..=9 => (3, 3),
        10..=12 => (4, 3),
        13..=16 => (4, 4),
        _ => (5, 4),
    };
    GridLayout { columns, rows }
}
