// THEORY:
// The `relations` module places every focal adhesion in the frame of its cell. Where
// `region_props` describes an object on its own, this module describes how it sits
// relative to the cell mask: how deep inside the cell it is, in which direction it
// lies from the cell centroid, and whether its long axis points along that radial
// direction or across it.
//
// Key principles:
// 1.  **Shared Frame**: object orientation and radial angle are both measured in the
//     image frame (x right, y down), so their difference is meaningful.
// 2.  **Undirected Axes**: an orientation is an axis, not a vector. Differences are
//     folded with a 180 degree period and then into [0, 90]: 0 means radial,
//     90 means tangential.
// 3.  **Stateless Utility**: pure functions of an object and a mask.

use crate::core_modules::cell_mask::CellMask;
use crate::core_modules::region_props::LabeledObject;

pub mod relations {
    use super::*;

    /// An object's measurements relative to its cell mask.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct CellRelation {
        /// Distance from the object centroid to the nearest mask boundary.
        pub border_distance_px: f64,
        /// Direction of the object centroid as seen from the mask centroid, in (-180, 180].
        pub angle_to_centroid_deg: f64,
        /// Angle between the object's axis and the radial direction, in [0, 90].
        pub relative_orientation_deg: f64,
    }

    /// Angle of the vector from `origin` to `point`, in degrees within (-180, 180].
    pub fn angle_to_centroid(point: (f64, f64), origin: (f64, f64)) -> f64 {
        let deg = (point.1 - origin.1).atan2(point.0 - origin.0).to_degrees();
        // atan2 already yields [-180, 180]; -180 is the same direction as 180.
        if deg <= -180.0 { deg + 360.0 } else { deg }
    }

    /// Folds the difference between two undirected axes into [0, 90].
    pub fn relative_orientation(orientation_deg: f64, angle_deg: f64) -> f64 {
        let diff = (orientation_deg - angle_deg).abs().rem_euclid(180.0);
        if diff > 90.0 { 180.0 - diff } else { diff }
    }

    /// Relates one object to the cell. With an empty mask every field is NaN.
    pub fn relate(object: &LabeledObject, mask: &CellMask) -> CellRelation {
        let border_distance_px = mask.distance_at(object.centroid.0, object.centroid.1);
        let Some(origin) = mask.centroid else {
            return CellRelation {
                border_distance_px: f64::NAN,
                angle_to_centroid_deg: f64::NAN,
                relative_orientation_deg: f64::NAN,
            };
        };

        let angle_to_centroid_deg = angle_to_centroid(object.centroid, origin);
        CellRelation {
            border_distance_px,
            angle_to_centroid_deg,
            relative_orientation_deg: relative_orientation(
                object.orientation_deg,
                angle_to_centroid_deg,
            ),
        }
    }
}
