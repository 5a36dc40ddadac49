use crate::core::route::{Route, RoutePoint};
use crate::core::stage::Stage;
use anyhow::Context;
use helpers::geo::haversine;
use std::fs::OpenOptions;
use std::io::BufReader;
use std::path::Path;

/// TrackPoint is one point of the route track, elevation is optional in GPX.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
}

/// read_route reads the GPX route file and groups its track points by stage.
pub fn read_route(filepath: &Path, stages: &[Stage]) -> anyhow::Result<Route> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!("Failed to open route file {}!", filepath.display()))?;

    let gpx = gpx::read(BufReader::new(fh))
        .context(format!("Failed to parse route file {}!", filepath.display()))?;
    let track_points = extract_track_points(&gpx);

    if track_points.is_empty() {
        anyhow::bail!("Route file {} does not contain any track point!", filepath.display());
    }

    Ok(group_route_points(&compute_distances(&track_points), stages))
}

/// extract_track_points flattens every segment of every track, in file order.
pub fn extract_track_points(gpx: &gpx::Gpx) -> Vec<TrackPoint> {
    let mut track_points = vec![];

    for track in gpx.tracks.iter() {
        for segment in track.segments.iter() {
            for point in segment.points.iter() {
                let coords = point.point();
                track_points.push(TrackPoint {
                    lat: coords.y(),
                    lon: coords.x(),
                    ele: point.elevation,
                });
            }
        }
    }

    track_points
}

/// compute_distances returns the route points with their distance (whole meters) from the first
/// point along the route.
pub fn compute_distances(points: &[TrackPoint]) -> Vec<RoutePoint> {
    let mut route_points = Vec::with_capacity(points.len());
    let mut total_distance = 0.0;

    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            let prev = &points[i - 1];
            total_distance += haversine((prev.lat, prev.lon), (point.lat, point.lon)) * 1000.0;
        }

        route_points.push(RoutePoint {
            lat: point.lat,
            lon: point.lon,
            elevation: point.ele.unwrap_or(0.0),
            dst_from_start: total_distance.trunc(),
        });
    }

    route_points
}

/// group_route_points assigns each point to the first stage whose end is not before it. Points
/// located after the end of the last stage are dropped.
pub fn group_route_points(points: &[RoutePoint], stages: &[Stage]) -> Route {
    let mut groups = Vec::with_capacity(stages.len());
    let mut remaining = points;

    for stage in stages.iter() {
        let stage_end = stage.dst_to_end();
        let count = remaining
            .iter()
            .take_while(|p| p.dst_from_start <= stage_end)
            .count();

        groups.push(remaining[..count].to_vec());
        remaining = &remaining[count..];
    }

    Route::new(groups)
}
