use serde::Deserialize;

/// Options controlling pyramid construction.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PyramidOptions {
    /// Requested number of pyramid levels (>= 1).
    pub levels: usize,
    /// Smallest side length a level may have. Construction stops before a
    /// level that would be smaller.
    pub min_side: usize,
}

impl Default for PyramidOptions {
    fn default() -> Self {
        Self::new(3)
    }
}

impl PyramidOptions {
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            min_side: 8,
        }
    }

    pub fn with_min_side(mut self, min_side: usize) -> Self {
        self.min_side = min_side;
        self
    }
}
