//! Z-stacks of a single sample type and their maximum projection

use ndarray::{Array2, Axis};

use crate::acquisition::{AcquisitionError, Plane, Sample};

/// Ordered slices sharing one shape and one sample type
#[derive(Debug, Clone)]
pub enum ZStack {
    U8(Vec<Array2<u8>>),
    U16(Vec<Array2<u16>>),
    F32(Vec<Array2<f32>>),
}

/// Sample types a plane can be unwrapped into
trait PlaneSample: Sample {
    fn unwrap_plane(plane: Plane) -> Option<Array2<Self>>;
}

impl PlaneSample for u8 {
    fn unwrap_plane(plane: Plane) -> Option<Array2<Self>> {
        match plane {
            Plane::U8(a) => Some(a),
            _ => None,
        }
    }
}

impl PlaneSample for u16 {
    fn unwrap_plane(plane: Plane) -> Option<Array2<Self>> {
        match plane {
            Plane::U16(a) => Some(a),
            _ => None,
        }
    }
}

impl PlaneSample for f32 {
    fn unwrap_plane(plane: Plane) -> Option<Array2<Self>> {
        match plane {
            Plane::F32(a) => Some(a),
            _ => None,
        }
    }
}

impl ZStack {
    /// Stack planes in order; the first plane fixes shape and sample type
    pub fn from_planes(planes: Vec<Plane>) -> Result<Self, AcquisitionError> {
        let mut planes = planes.into_iter();
        let first = planes
            .next()
            .ok_or_else(|| AcquisitionError::Format("empty Z-stack".to_string()))?;

        Ok(match first {
            Plane::U8(a) => ZStack::U8(gather(a, planes)?),
            Plane::U16(a) => ZStack::U16(gather(a, planes)?),
            Plane::F32(a) => ZStack::F32(gather(a, planes)?),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            ZStack::U8(s) => s.len(),
            ZStack::U16(s) => s.len(),
            ZStack::F32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slice(&self, z: usize) -> Option<Plane> {
        match self {
            ZStack::U8(s) => s.get(z).cloned().map(Plane::U8),
            ZStack::U16(s) => s.get(z).cloned().map(Plane::U16),
            ZStack::F32(s) => s.get(z).cloned().map(Plane::F32),
        }
    }

    /// Per-pixel maximum over z, in the stack's own sample type
    pub fn max_projection(&self) -> Result<Plane, AcquisitionError> {
        Ok(match self {
            ZStack::U8(s) => Plane::U8(max_over_z(s)?),
            ZStack::U16(s) => Plane::U16(max_over_z(s)?),
            ZStack::F32(s) => Plane::F32(max_over_z(s)?),
        })
    }
}

fn gather<T: PlaneSample>(
    first: Array2<T>,
    rest: impl Iterator<Item = Plane>,
) -> Result<Vec<Array2<T>>, AcquisitionError> {
    let shape = first.dim();
    let mut slices = vec![first];

    for plane in rest {
        let (sample_type, dim) = (plane.sample_type(), plane.shape());
        let slice = T::unwrap_plane(plane)
            .filter(|s| s.dim() == shape)
            .ok_or_else(|| {
                AcquisitionError::Format(format!(
                    "slice {} is {} {:?}, expected {:?} like slice 0",
                    slices.len(),
                    sample_type,
                    dim,
                    shape
                ))
            })?;
        slices.push(slice);
    }

    Ok(slices)
}

/// Stack into `(nz, rows, cols)` and fold the z axis with `max`
fn max_over_z<T: Sample>(slices: &[Array2<T>]) -> Result<Array2<T>, AcquisitionError> {
    let views: Vec<_> = slices.iter().map(|s| s.view()).collect();
    let stacked = ndarray::stack(Axis(0), &views)
        .map_err(|e| AcquisitionError::Format(format!("cannot stack slices: {}", e)))?;

    Ok(stacked.fold_axis(Axis(0), T::LOWEST, |&acc, &v| if v > acc { v } else { acc }))
}
