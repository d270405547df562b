use nivaran_client::map::{Bounds, MapWidget, Marker, MarkerKind};
use nivaran_types::models::GeoPoint;

/// Map widget that renders to plain text lines.
#[derive(Default)]
pub struct TextMap {
    view: Option<(GeoPoint, u8)>,
    user: Option<GeoPoint>,
    radius_m: Option<f64>,
    bounds: Option<Bounds>,
    markers: Vec<Marker>,
}

impl MapWidget for TextMap {
    fn set_view(&mut self, center: GeoPoint, zoom: u8) {
        self.view = Some((center, zoom));
    }

    fn add_marker(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    fn clear_markers(&mut self) {
        self.markers.clear();
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.bounds = Some(bounds);
    }

    fn set_user_marker(&mut self, position: GeoPoint) {
        self.user = Some(position);
    }

    fn draw_radius(&mut self, _center: GeoPoint, radius_m: f64) {
        self.radius_m = Some(radius_m);
    }
}

impl TextMap {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some((center, zoom)) = self.view {
            out.push_str(&format!("view {:.4},{:.4} zoom {}\n", center.lat, center.lng, zoom));
        }
        if let Some(user) = self.user {
            let radius = self.radius_m.map(|m| format!(" within {:.0} m", m)).unwrap_or_default();
            out.push_str(&format!("you are at {:.4},{:.4}{}\n", user.lat, user.lng, radius));
        }
        if let Some(b) = self.bounds {
            out.push_str(&format!(
                "bounds {:.4},{:.4} .. {:.4},{:.4}\n",
                b.south_west.lat, b.south_west.lng, b.north_east.lat, b.north_east.lng
            ));
        }
        for marker in &self.markers {
            let icon = match marker.kind {
                MarkerKind::Ngo => "[NGO]",
                MarkerKind::Post => "[POST]",
            };
            out.push_str(&format!(
                "{} {} @ {:.4},{:.4}\n",
                icon, marker.popup.title, marker.position.lat, marker.position.lng
            ));
            for line in &marker.popup.lines {
                out.push_str(&format!("      {}\n", line));
            }
        }
        out
    }
}
