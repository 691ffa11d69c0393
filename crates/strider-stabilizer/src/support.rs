//! Support polygon from the planned foot contacts.
//!
//! The contact configuration is a tagged variant carrying only the foot
//! transforms relevant to that mode; the polygon is assembled by free
//! functions over it.

use nalgebra::{Isometry3, Point3, Vector2};
use strider_core::error::NumericalError;
use strider_core::types::ReferenceTrajectorySample;
use strider_core::Foot;

/// Sole rectangle centred on the foot frame origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub length: f64,
    pub width: f64,
}

impl Footprint {
    /// Sole corners projected on the ground plane.
    pub fn corners(&self, pose: &Isometry3<f64>) -> [Vector2<f64>; 4] {
        let (hl, hw) = (self.length / 2.0, self.width / 2.0);
        [(hl, hw), (-hl, hw), (-hl, -hw), (hl, -hw)]
            .map(|(x, y)| (pose * Point3::new(x, y, 0.0)).coords.xy())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SupportState {
    DoubleSupport {
        left: Isometry3<f64>,
        right: Isometry3<f64>,
    },
    SingleSupport {
        foot: Foot,
        stance: Isometry3<f64>,
    },
    Flight,
}

impl SupportState {
    pub fn from_sample(sample: &ReferenceTrajectorySample) -> Self {
        match (sample.left_in_contact, sample.right_in_contact) {
            (true, true) => Self::DoubleSupport {
                left: sample.left_foot_pose,
                right: sample.right_foot_pose,
            },
            (true, false) => Self::SingleSupport {
                foot: Foot::Left,
                stance: sample.left_foot_pose,
            },
            (false, true) => Self::SingleSupport {
                foot: Foot::Right,
                stance: sample.right_foot_pose,
            },
            (false, false) => Self::Flight,
        }
    }

    pub const fn is_flight(&self) -> bool {
        matches!(self, Self::Flight)
    }
}

/// Corners of every sole in contact.
pub fn support_vertices(state: &SupportState, footprint: &Footprint) -> Vec<Vector2<f64>> {
    match state {
        SupportState::DoubleSupport { left, right } => footprint
            .corners(left)
            .into_iter()
            .chain(footprint.corners(right))
            .collect(),
        SupportState::SingleSupport { stance, .. } => footprint.corners(stance).to_vec(),
        SupportState::Flight => Vec::new(),
    }
}

fn cross(o: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Counter-clockwise convex hull (Andrew's monotone chain). Collinear points
/// are dropped.
pub fn convex_hull(points: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<Vector2<f64>> = Vec::with_capacity(pts.len() * 2);
    for p in &pts {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    // upper chain must not eat into the lower one
    let lower_len = hull.len() + 1;
    for p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}

/// `normal · p ≤ offset`, with a unit outward normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfPlane {
    pub normal: Vector2<f64>,
    pub offset: f64,
}

impl HalfPlane {
    pub fn signed_distance(&self, p: &Vector2<f64>) -> f64 {
        self.normal.dot(p) - self.offset
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupportPolygon {
    vertices: Vec<Vector2<f64>>,
    half_planes: Vec<HalfPlane>,
}

impl SupportPolygon {
    /// Fails for `Flight` and for degenerate footprints.
    pub fn from_state(state: &SupportState, footprint: &Footprint) -> Result<Self, NumericalError> {
        let vertices = convex_hull(&support_vertices(state, footprint));
        if vertices.len() < 3 {
            return Err(NumericalError::EmptySupport);
        }
        let half_planes = vertices
            .iter()
            .zip(vertices.iter().cycle().skip(1))
            .map(|(a, b)| {
                let edge = b - a;
                let normal = Vector2::new(edge.y, -edge.x).normalize();
                HalfPlane {
                    normal,
                    offset: normal.dot(a),
                }
            })
            .collect();
        Ok(Self {
            vertices,
            half_planes,
        })
    }

    pub fn vertices(&self) -> &[Vector2<f64>] {
        &self.vertices
    }

    pub fn half_planes(&self) -> &[HalfPlane] {
        &self.half_planes
    }

    pub fn contains(&self, p: &Vector2<f64>, tolerance: f64) -> bool {
        self.half_planes
            .iter()
            .all(|h| h.signed_distance(p) <= tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};
    use strider_core::types::Twist;
    use strider_core::StepPhase;

    const FOOT: Footprint = Footprint {
        length: 0.2,
        width: 0.1,
    };

    fn at(x: f64, y: f64) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::new(x, y, 0.0), UnitQuaternion::identity())
    }

    fn sample(left: bool, right: bool) -> ReferenceTrajectorySample {
        ReferenceTrajectorySample {
            left_foot_pose: at(0.0, 0.1),
            right_foot_pose: at(0.0, -0.1),
            left_foot_twist: Twist::zeros(),
            right_foot_twist: Twist::zeros(),
            left_in_contact: left,
            right_in_contact: right,
            is_left_fixed_frame: true,
            left_phase: StepPhase::Stance,
            right_phase: StepPhase::Stance,
            dcm_position: Vector2::zeros(),
            dcm_velocity: Vector2::zeros(),
            com_height: 0.53,
            com_height_velocity: 0.0,
        }
    }

    #[test]
    fn state_follows_contact_flags() {
        assert!(matches!(
            SupportState::from_sample(&sample(true, true)),
            SupportState::DoubleSupport { .. }
        ));
        assert!(matches!(
            SupportState::from_sample(&sample(false, true)),
            SupportState::SingleSupport {
                foot: Foot::Right,
                ..
            }
        ));
        assert!(SupportState::from_sample(&sample(false, false)).is_flight());
    }

    #[test]
    fn hull_drops_interior_points() {
        let pts = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(0.5, 0.5),
            Vector2::new(0.5, 0.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Vector2::new(0.5, 0.5)));
        // counter-clockwise: positive signed area
        let area: f64 = hull
            .iter()
            .zip(hull.iter().cycle().skip(1))
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<f64>()
            / 2.0;
        assert_relative_eq!(area, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn double_support_spans_both_feet() {
        let state = SupportState::from_sample(&sample(true, true));
        let poly = SupportPolygon::from_state(&state, &FOOT).unwrap();
        assert_eq!(poly.vertices().len(), 4);
        assert!(poly.contains(&Vector2::zeros(), 1e-9));
        assert!(poly.contains(&Vector2::new(0.1, -0.15), 1e-9));
        assert!(!poly.contains(&Vector2::new(0.11, 0.0), 1e-9));
        assert!(!poly.contains(&Vector2::new(0.0, 0.16), 1e-9));
    }

    #[test]
    fn single_support_is_the_stance_sole() {
        let state = SupportState::from_sample(&sample(true, false));
        let poly = SupportPolygon::from_state(&state, &FOOT).unwrap();
        assert!(poly.contains(&Vector2::new(0.05, 0.12), 1e-9));
        assert!(!poly.contains(&Vector2::zeros(), 1e-9));
    }

    #[test]
    fn yawed_foot_rotates_corners() {
        let pose = Isometry3::from_parts(
            Translation3::new(1.0, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );
        let state = SupportState::SingleSupport {
            foot: Foot::Left,
            stance: pose,
        };
        let poly = SupportPolygon::from_state(&state, &FOOT).unwrap();
        // Long axis now along y.
        assert!(poly.contains(&Vector2::new(1.0, 0.09), 1e-9));
        assert!(!poly.contains(&Vector2::new(1.09, 0.0), 1e-9));
    }

    #[test]
    fn flight_has_no_support() {
        let err = SupportPolygon::from_state(&SupportState::Flight, &FOOT).unwrap_err();
        assert_eq!(err, NumericalError::EmptySupport);
    }
}
