use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::models::LabeledRecord;
use crate::utils::constants::DEFAULT_ZOOM_START;
use crate::utils::coordinates::{mean_center, validate_coordinates};

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Badspot predictions</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
const map = L.map("map").setView(__CENTER__, __ZOOM__);
L.tileLayer("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", {
  maxZoom: 19,
  attribution: "&copy; OpenStreetMap contributors"
}).addTo(map);
const markers = __MARKERS__;
for (const m of markers) {
  L.circleMarker([m.lat, m.lon], {
    radius: 7,
    color: m.color,
    fillColor: m.color,
    fillOpacity: 0.8
  }).bindPopup(m.popup).addTo(map);
}
</script>
</body>
</html>
"#;

#[derive(Debug, Serialize)]
struct Marker {
    lat: f64,
    lon: f64,
    color: &'static str,
    popup: String,
}

/// A rendered, self-contained HTML map
#[derive(Debug, Clone)]
pub struct MapArtifact {
    pub html: String,
    /// (latitude, longitude)
    pub center: (f64, f64),
    pub marker_count: usize,
    /// Markers placed from coordinates outside the valid lat/lon range
    pub out_of_range: usize,
    /// Records left off the map for missing coordinates
    pub skipped: usize,
}

impl MapArtifact {
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.html)?;
        tracing::info!(path = %path.display(), markers = self.marker_count, "wrote map");
        Ok(())
    }
}

pub struct MapRenderer {
    zoom_start: u8,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self {
            zoom_start: DEFAULT_ZOOM_START,
        }
    }

    pub fn with_zoom_start(mut self, zoom_start: u8) -> Self {
        self.zoom_start = zoom_start;
        self
    }

    /// One marker per record with finite coordinates, red for badspots and green
    /// otherwise. Out-of-range coordinates still get a marker but are left out of the
    /// center, which is the mean of the valid positions. Returns `None` when no record
    /// can be placed.
    pub fn render(&self, records: &[LabeledRecord]) -> Result<Option<MapArtifact>> {
        let mut markers = Vec::with_capacity(records.len());
        let mut valid_points = Vec::with_capacity(records.len());

        for labeled in records {
            let Some((lat, lon)) = labeled.record.coordinates() else {
                continue;
            };
            if !lat.is_finite() || !lon.is_finite() {
                continue;
            }
            if validate_coordinates(lat, lon).is_ok() {
                valid_points.push((lat, lon));
            }
            markers.push(Marker {
                lat,
                lon,
                color: if labeled.prediction.is_badspot() { "red" } else { "green" },
                popup: popup_text(labeled),
            });
        }

        let skipped = records.len() - markers.len();
        if skipped > 0 {
            tracing::warn!(skipped, "records without coordinates left off the map");
        }
        let out_of_range = markers.len() - valid_points.len();
        if out_of_range > 0 {
            tracing::warn!(out_of_range, "records with out-of-range coordinates mapped as-is");
        }

        let all_points: Vec<(f64, f64)> = markers.iter().map(|m| (m.lat, m.lon)).collect();
        let Some(center) = mean_center(&valid_points).or_else(|| mean_center(&all_points)) else {
            return Ok(None);
        };

        // Keep "</script>" inside popup text from closing the script block
        let markers_json = serde_json::to_string(&markers)?.replace("</", "<\\/");
        let html = TEMPLATE
            .replace("__CENTER__", &format!("[{}, {}]", center.0, center.1))
            .replace("__ZOOM__", &self.zoom_start.to_string())
            .replace("__MARKERS__", &markers_json);

        Ok(Some(MapArtifact {
            html,
            center,
            marker_count: markers.len(),
            out_of_range,
            skipped,
        }))
    }
}

impl Default for MapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn popup_text(labeled: &LabeledRecord) -> String {
    let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| v.to_string());
    format!(
        "RSRP: {}<br>RSRQ: {}<br>Prediction: {}",
        show(labeled.record.rsrp),
        show(labeled.record.rsrq),
        labeled.prediction
    )
}
