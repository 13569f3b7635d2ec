use crate::error::{SimError, SimResult};
use crate::math::{from_array, Point2d};
use std::path::PathBuf;

/// Something that can produce the ordered waypoints of a road network.
pub trait RoadNetworkSource {
    /// Loads the waypoints, in canonical route order.
    fn load_waypoints(&self) -> SimResult<Vec<Point2d>>;
}

/// Waypoints held in memory.
#[derive(Clone, Debug, Default)]
pub struct StaticWaypoints(pub Vec<Point2d>);

impl RoadNetworkSource for StaticWaypoints {
    fn load_waypoints(&self) -> SimResult<Vec<Point2d>> {
        Ok(self.0.clone())
    }
}

/// A JSON file holding an array of `[x, y]` pairs.
#[derive(Clone, Debug)]
pub struct JsonWaypointFile {
    pub path: PathBuf,
}

impl JsonWaypointFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RoadNetworkSource for JsonWaypointFile {
    fn load_waypoints(&self) -> SimResult<Vec<Point2d>> {
        let content = std::fs::read_to_string(&self.path)?;
        let coords: Vec<[f64; 2]> = serde_json::from_str(&content)?;
        if coords.is_empty() {
            return Err(SimError::RoadNetwork(format!(
                "{} contains no waypoints",
                self.path.display()
            )));
        }
        Ok(coords.into_iter().map(from_array).collect())
    }
}

/// A small two-road crossroads, useful for demos and tests.
pub fn crossroads_waypoints() -> Vec<Point2d> {
    [
        [50.0, 0.0],
        [50.0, 50.0],
        [0.0, 50.0],
        [0.0, 55.0],
        [50.0, 55.0],
        [50.0, 100.0],
        [55.0, 100.0],
        [55.0, 55.0],
        [100.0, 55.0],
        [100.0, 50.0],
        [55.0, 50.0],
        [55.0, 0.0],
    ]
    .into_iter()
    .map(from_array)
    .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_json_waypoints() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[[0, 0], [10.5, -3]]").unwrap();
        let waypoints = JsonWaypointFile::new(file.path()).load_waypoints().unwrap();
        assert_eq!(waypoints, vec![Point2d::new(0.0, 0.0), Point2d::new(10.5, -3.0)]);
    }

    #[test]
    fn empty_network_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        let result = JsonWaypointFile::new(file.path()).load_waypoints();
        assert!(matches!(result, Err(SimError::RoadNetwork(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = JsonWaypointFile::new("/nonexistent/network.json").load_waypoints();
        assert!(matches!(result, Err(SimError::Io(_))));
    }

    #[test]
    fn crossroads_has_twelve_waypoints() {
        let waypoints = crossroads_waypoints();
        assert_eq!(waypoints.len(), 12);
        assert_eq!(waypoints[0], Point2d::new(50.0, 0.0));
    }
}
