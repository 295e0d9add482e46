use crate::error::{ConstructionError, Result};
use crate::section::{Coordinate, Section};
use serde::{Deserialize, Serialize};

/// Axis-aligned box: minimum corner plus size along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionBox {
    pub min: Coordinate,
    pub size: (i32, i32, i32),
}

impl SelectionBox {
    pub const INT_COUNT: usize = 6;

    pub fn new(min: Coordinate, size: (i32, i32, i32)) -> Self {
        Self { min, size }
    }

    /// Exclusive maximum corner, widened so it cannot overflow.
    pub fn max(&self) -> (i64, i64, i64) {
        (
            i64::from(self.min.0) + i64::from(self.size.0),
            i64::from(self.min.1) + i64::from(self.size.1),
            i64::from(self.min.2) + i64::from(self.size.2),
        )
    }

    pub fn to_ints(&self) -> [i32; Self::INT_COUNT] {
        [
            self.min.0,
            self.min.1,
            self.min.2,
            self.size.0,
            self.size.1,
            self.size.2,
        ]
    }

    /// Splits a flat `selection_boxes` array, six ints per box.
    pub fn from_ints(values: &[i32]) -> Result<Vec<Self>> {
        if values.len() % Self::INT_COUNT != 0 {
            return Err(ConstructionError::MalformedMetadata(format!(
                "selection_boxes holds {} ints, not a multiple of {}",
                values.len(),
                Self::INT_COUNT
            )));
        }
        Ok(values
            .chunks_exact(Self::INT_COUNT)
            .map(|v| Self::new((v[0], v[1], v[2]), (v[3], v[4], v[5])))
            .collect())
    }

    /// The smallest box containing every section, `None` when there are none.
    pub fn bounding<'a, I>(sections: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = &'a Section>,
    {
        let mut bounds: Option<([i64; 3], [i64; 3])> = None;
        for section in sections {
            let (x, y, z) = section.origin();
            let (sx, sy, sz) = section.shape();
            let min = [i64::from(x), i64::from(y), i64::from(z)];
            let max = [
                min[0] + i64::from(sx),
                min[1] + i64::from(sy),
                min[2] + i64::from(sz),
            ];
            bounds = Some(match bounds {
                None => (min, max),
                Some((lo, hi)) => (
                    [lo[0].min(min[0]), lo[1].min(min[1]), lo[2].min(min[2])],
                    [hi[0].max(max[0]), hi[1].max(max[1]), hi[2].max(max[2])],
                ),
            });
        }

        let Some((lo, hi)) = bounds else {
            return Ok(None);
        };
        let narrow = |value: i64| {
            i32::try_from(value).map_err(|_| {
                ConstructionError::MalformedSection(format!(
                    "Sections span beyond the 32-bit coordinate range ({})",
                    value
                ))
            })
        };
        Ok(Some(Self::new(
            (narrow(lo[0])?, narrow(lo[1])?, narrow(lo[2])?),
            (
                narrow(hi[0] - lo[0])?,
                narrow(hi[1] - lo[1])?,
                narrow(hi[2] - lo[2])?,
            ),
        )))
    }
}

/// Component-wise minimum of the boxes' minimum corners; index origins are stored
/// relative to it. `(0, 0, 0)` when there are no boxes.
pub fn declared_minimum(boxes: &[SelectionBox]) -> Coordinate {
    boxes
        .iter()
        .map(|b| b.min)
        .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.min(b.2)))
        .unwrap_or((0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn section(origin: Coordinate, shape: (u8, u8, u8)) -> Section {
        Section::new(origin, shape, None, Vec::new(), None).unwrap()
    }

    #[test]
    fn test_bounding_covers_sparse_sections() {
        let sections = vec![
            section((-16, 0, 0), (16, 16, 16)),
            section((32, 48, 16), (8, 16, 8)),
        ];
        let bounds = SelectionBox::bounding(&sections).unwrap().unwrap();
        assert_eq!(bounds.min, (-16, 0, 0));
        assert_eq!(bounds.size, (56, 64, 24));
    }

    #[test]
    fn test_bounding_empty() {
        assert_eq!(SelectionBox::bounding(&Vec::<Section>::new()).unwrap(), None);
    }

    #[test]
    fn test_ints_round_trip() {
        let boxes = vec![
            SelectionBox::new((0, 0, 0), (16, 16, 16)),
            SelectionBox::new((-5, 2, 9), (1, 2, 3)),
        ];
        let ints: Vec<i32> = boxes.iter().flat_map(SelectionBox::to_ints).collect();
        assert_eq!(ints.len(), 12);
        assert_eq!(SelectionBox::from_ints(&ints).unwrap(), boxes);
    }

    #[test]
    fn test_from_ints_rejects_partial_box() {
        assert_matches!(
            SelectionBox::from_ints(&[0, 0, 0, 1, 1]),
            Err(ConstructionError::MalformedMetadata(_))
        );
    }

    #[test]
    fn test_declared_minimum() {
        let boxes = vec![
            SelectionBox::new((4, -8, 0), (1, 1, 1)),
            SelectionBox::new((-2, 3, 7), (1, 1, 1)),
        ];
        assert_eq!(declared_minimum(&boxes), (-2, -8, 0));
        assert_eq!(declared_minimum(&[]), (0, 0, 0));
    }

    #[test]
    fn test_serde_json_form() {
        let b = SelectionBox::new((-16, 0, 32), (48, 16, 16));
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, r#"{"min":[-16,0,32],"size":[48,16,16]}"#);
        let back: SelectionBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn test_max_corner_does_not_overflow() {
        let b = SelectionBox::new((i32::MAX, 0, 0), (i32::MAX, 1, 1));
        assert_eq!(b.max().0, 2 * i64::from(i32::MAX));
    }
}
