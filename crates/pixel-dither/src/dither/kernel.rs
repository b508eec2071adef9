//! Error diffusion kernel definitions.
//!
//! Each kernel lists the not-yet-visited neighbors that receive a share of a
//! pixel's quantization error during a raster scan.

/// One share of a pixel's error: `weight / divisor` of it goes to the
/// neighbor at `(x + dx, y + dy)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tap {
    pub dx: i8,
    pub dy: u8,
    pub weight: u8,
}

const fn tap(dx: i8, dy: u8, weight: u8) -> Tap {
    Tap { dx, dy, weight }
}

/// An error diffusion kernel: a list of forward taps over a shared divisor.
///
/// Taps never point at an already visited pixel, so `dy == 0` implies
/// `dx > 0`. Atkinson's weights sum to 6/8 and lose the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernel {
    pub taps: &'static [Tap],
    pub divisor: u8,
}

impl Kernel {
    /// Rows a single pixel can reach, including its own.
    pub const fn rows(&self) -> usize {
        let mut deepest = 0;
        let mut i = 0;
        while i < self.taps.len() {
            if self.taps[i].dy > deepest {
                deepest = self.taps[i].dy;
            }
            i += 1;
        }
        deepest as usize + 1
    }

    /// Fraction of the error handed on to neighbors.
    pub fn propagation(&self) -> f32 {
        let total: u32 = self.taps.iter().map(|t| u32::from(t.weight)).sum();
        total as f32 / f32::from(self.divisor)
    }
}

/// Floyd-Steinberg kernel, 100% propagation.
///
/// ```text
///        X   7
///    3   5   1      (/16)
/// ```
pub const FLOYD_STEINBERG: Kernel = Kernel {
    taps: &[
        tap(1, 0, 7),  // right
        tap(-1, 1, 3), // bottom-left
        tap(0, 1, 5),  // bottom
        tap(1, 1, 1),  // bottom-right
    ],
    divisor: 16,
};

/// Atkinson kernel, 75% propagation.
///
/// ```text
///        X   1   1
///    1   1   1
///        1          (/8)
/// ```
pub const ATKINSON: Kernel = Kernel {
    taps: &[
        tap(1, 0, 1),
        tap(2, 0, 1),
        tap(-1, 1, 1),
        tap(0, 1, 1),
        tap(1, 1, 1),
        tap(0, 2, 1),
    ],
    divisor: 8,
};

/// Burkes kernel, 100% propagation.
///
/// ```text
///            X   8   4
///    2   4   8   4   2      (/32)
/// ```
pub const BURKES: Kernel = Kernel {
    taps: &[
        tap(1, 0, 8),
        tap(2, 0, 4),
        tap(-2, 1, 2),
        tap(-1, 1, 4),
        tap(0, 1, 8),
        tap(1, 1, 4),
        tap(2, 1, 2),
    ],
    divisor: 32,
};

/// Three-row Sierra kernel, 100% propagation.
///
/// ```text
///            X   5   3
///    2   4   5   4   2
///        2   3   2          (/32)
/// ```
pub const SIERRA: Kernel = Kernel {
    taps: &[
        tap(1, 0, 5),
        tap(2, 0, 3),
        tap(-2, 1, 2),
        tap(-1, 1, 4),
        tap(0, 1, 5),
        tap(1, 1, 4),
        tap(2, 1, 2),
        tap(-1, 2, 2),
        tap(0, 2, 3),
        tap(1, 2, 2),
    ],
    divisor: 32,
};
