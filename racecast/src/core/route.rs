use serde::{Deserialize, Serialize};

/// * `lat` - (deg) Latitude
/// * `lon` - (deg) Longitude
/// * `elevation` - (m) Elevation
/// * `dst_from_start` - (m) Distance along the route between the start line and the point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: f64,
    pub dst_from_start: f64,
}

impl RoutePoint {
    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// Route contains the route points grouped by stage. Points are sorted by distance from start
/// within each group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    groups: Vec<Vec<RoutePoint>>,
}

impl Route {
    pub fn new(groups: Vec<Vec<RoutePoint>>) -> Route {
        Route { groups }
    }

    pub fn groups(&self) -> &[Vec<RoutePoint>] {
        &self.groups
    }

    pub fn stage_count(&self) -> usize {
        self.groups.len()
    }

    pub fn point_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    /// The method returns the point with the given index in the flattened route.
    pub fn point(&self, global_index: usize) -> Option<&RoutePoint> {
        self.groups.iter().flatten().nth(global_index)
    }

    /// The method returns the coordinates of the first route point, (0, 0) for an empty route.
    pub fn start_coords(&self) -> (f64, f64) {
        self.groups
            .iter()
            .flatten()
            .next()
            .map_or((0.0, 0.0), RoutePoint::coords)
    }

    /// locate returns the index in the flattened route of the last point of the given stage
    /// that lies at or before the covered distance. The first point of the stage is returned if
    /// the distance is before all of them. None is returned if the stage has no point.
    pub fn locate(&self, stage_index: usize, covered_distance: f64) -> Option<usize> {
        let stage_points = self.groups.get(stage_index)?;
        if stage_points.is_empty() {
            return None;
        }

        let offset: usize = self.groups[..stage_index].iter().map(Vec::len).sum();
        let passed = stage_points.partition_point(|p| p.dst_from_start <= covered_distance);

        Some(offset + passed.saturating_sub(1))
    }

    /// position returns the coordinates of the point found by `locate`.
    pub fn position(&self, stage_index: usize, covered_distance: f64) -> Option<(f64, f64)> {
        let global_index = self.locate(stage_index, covered_distance)?;
        self.point(global_index).map(RoutePoint::coords)
    }
}
