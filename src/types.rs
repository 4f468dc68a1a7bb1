//! Shared types used across UNETILE.
//! Includes the axis alphabet (`Axis`), validated axis sequences (`AxisOrder`),
//! and the caller-facing tile-count request (`NTiles`).
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Semantic axis label.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Axis {
    /// Sample/batch
    S,
    /// Time
    T,
    /// Channel
    C,
    Z,
    Y,
    X,
}

impl Axis {
    pub const ALL: [Axis; 6] = [Axis::S, Axis::T, Axis::C, Axis::Z, Axis::Y, Axis::X];

    pub fn from_char(c: char) -> Option<Axis> {
        match c.to_ascii_uppercase() {
            'S' => Some(Axis::S),
            'T' => Some(Axis::T),
            'C' => Some(Axis::C),
            'Z' => Some(Axis::Z),
            'Y' => Some(Axis::Y),
            'X' => Some(Axis::X),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Axis::S => 'S',
            Axis::T => 'T',
            Axis::C => 'C',
            Axis::Z => 'Z',
            Axis::Y => 'Y',
            Axis::X => 'X',
        }
    }

    /// Axes that are downsampled by the network's pooling layers.
    pub fn is_pooled(self) -> bool {
        matches!(self, Axis::X | Axis::Y | Axis::Z | Axis::T)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// An ordered sequence of distinct axis labels, e.g. `ZYXC`.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct AxisOrder(Vec<Axis>);

impl AxisOrder {
    pub fn new(axes: Vec<Axis>) -> Result<Self> {
        for (i, a) in axes.iter().enumerate() {
            if axes[..i].contains(a) {
                return Err(Error::shape(format!(
                    "axis '{}' occurs more than once in '{}'",
                    a,
                    axes.iter().map(|a| a.as_char()).collect::<String>()
                )));
            }
        }
        Ok(Self(axes))
    }

    /// Parse and check that the order describes exactly `ndim` dimensions.
    pub fn parse_for_ndim(s: &str, ndim: usize) -> Result<Self> {
        let order: AxisOrder = s.parse()?;
        if order.len() != ndim {
            return Err(Error::shape(format!(
                "axes '{}' must have length {}, got {}",
                order,
                ndim,
                order.len()
            )));
        }
        Ok(order)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn axes(&self) -> &[Axis] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Axis> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.0.contains(&axis)
    }

    pub fn index_of(&self, axis: Axis) -> Option<usize> {
        self.0.iter().position(|&a| a == axis)
    }

    /// Copy of this order without the given labels, keeping relative order.
    pub fn without(&self, removed: &[Axis]) -> AxisOrder {
        AxisOrder(self.iter().filter(|a| !removed.contains(a)).collect())
    }

    /// Copy of this order with `axis` appended (no-op if already present).
    pub fn with_appended(&self, axis: Axis) -> AxisOrder {
        let mut axes = self.0.clone();
        if !axes.contains(&axis) {
            axes.push(axis);
        }
        AxisOrder(axes)
    }
}

impl FromStr for AxisOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let axes = s
            .chars()
            .map(|c| {
                Axis::from_char(c).ok_or_else(|| {
                    Error::shape(format!("invalid axis '{}' in '{}' (allowed: STCZYX)", c, s))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        AxisOrder::new(axes)
    }
}

impl fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for a in &self.0 {
            write!(f, "{}", a)?;
        }
        Ok(())
    }
}

/// Requested number of tiles, as supplied by a caller.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum NTiles {
    /// No initial tiling (all ones).
    #[default]
    None,
    /// Legacy form: a single count applied to the largest tiling axis.
    Scalar(usize),
    /// One entry per image axis.
    PerAxis(Vec<usize>),
}

impl From<Vec<usize>> for NTiles {
    fn from(v: Vec<usize>) -> Self {
        NTiles::PerAxis(v)
    }
}

impl From<&[usize]> for NTiles {
    fn from(v: &[usize]) -> Self {
        NTiles::PerAxis(v.to_vec())
    }
}

impl FromStr for NTiles {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(NTiles::None);
        }
        let parse = |t: &str| {
            t.trim()
                .parse::<usize>()
                .map_err(|_| Error::TilesParse(s.to_string()))
        };
        if s.contains(',') {
            let counts = s
                .trim_start_matches('(')
                .trim_end_matches(')')
                .split(',')
                .filter(|t| !t.trim().is_empty())
                .map(parse)
                .collect::<Result<Vec<_>>>()?;
            Ok(NTiles::PerAxis(counts))
        } else {
            Ok(NTiles::Scalar(parse(s)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_axes_case_insensitively() {
        let order: AxisOrder = "zyxc".parse().unwrap();
        assert_eq!(order.axes(), &[Axis::Z, Axis::Y, Axis::X, Axis::C]);
        assert_eq!(order.to_string(), "ZYXC");
    }

    #[test]
    fn rejects_duplicates_and_unknown_labels() {
        assert!(matches!("YXY".parse::<AxisOrder>(), Err(Error::ShapeMismatch(_))));
        assert!(matches!("YXQ".parse::<AxisOrder>(), Err(Error::ShapeMismatch(_))));
        assert!(AxisOrder::parse_for_ndim("YX", 3).is_err());
    }

    #[test]
    fn without_keeps_relative_order() {
        let order: AxisOrder = "TZYXC".parse().unwrap();
        assert_eq!(order.without(&[Axis::Z, Axis::T]).to_string(), "YXC");
    }

    #[test]
    fn parses_n_tiles_forms() {
        assert_eq!("none".parse::<NTiles>().unwrap(), NTiles::None);
        assert_eq!("4".parse::<NTiles>().unwrap(), NTiles::Scalar(4));
        assert_eq!(
            "2, 2,1".parse::<NTiles>().unwrap(),
            NTiles::PerAxis(vec![2, 2, 1])
        );
        assert!(matches!("2,x".parse::<NTiles>(), Err(Error::TilesParse(_))));
        assert!(matches!("-1".parse::<NTiles>(), Err(Error::TilesParse(_))));
    }
}
