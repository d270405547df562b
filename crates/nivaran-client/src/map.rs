//! Marker rendering for NGOs and posts onto a pluggable map widget.

use nivaran_types::models::{GeoPoint, NearbyNgo, Post};

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Ngo,
    Post,
}

/// Popup content attached to a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub title: String,
    pub lines: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: uuid::Uuid,
    pub kind: MarkerKind,
    pub position: GeoPoint,
    pub popup: Popup,
}

/// Corners of the area a render should fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl Bounds {
    pub fn around(points: &[GeoPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self {
            south_west: *first,
            north_east: *first,
        };
        for p in &points[1..] {
            bounds.south_west.lat = bounds.south_west.lat.min(p.lat);
            bounds.south_west.lng = bounds.south_west.lng.min(p.lng);
            bounds.north_east.lat = bounds.north_east.lat.max(p.lat);
            bounds.north_east.lng = bounds.north_east.lng.max(p.lng);
        }
        Some(bounds)
    }
}

/// The drawing surface. Implemented by whatever renders the map.
pub trait MapWidget {
    fn set_view(&mut self, center: GeoPoint, zoom: u8);

    fn add_marker(&mut self, marker: Marker);

    fn clear_markers(&mut self);

    fn fit_bounds(&mut self, bounds: Bounds);

    fn set_user_marker(&mut self, position: GeoPoint);

    fn draw_radius(&mut self, center: GeoPoint, radius_m: f64);
}

pub fn format_distance(km: f64) -> String {
    format!("{:.2} km away", km)
}

/// Keeps the user position and rebuilds the marker set on every render.
pub struct MapOverlay<W: MapWidget> {
    widget: W,
    app: AppConfig,
    user_location: Option<GeoPoint>,
    markers: usize,
}

impl<W: MapWidget> MapOverlay<W> {
    /// Centers the widget on the configured default view.
    pub fn new(mut widget: W, app: AppConfig) -> Self {
        widget.set_view(app.map_center, app.map_zoom);
        Self {
            widget,
            app,
            user_location: None,
            markers: 0,
        }
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn marker_count(&self) -> usize {
        self.markers
    }

    pub fn user_location(&self) -> Option<GeoPoint> {
        self.user_location
    }

    pub fn set_user_location(&mut self, location: GeoPoint) {
        self.user_location = Some(location);
        self.widget.set_user_marker(location);
    }

    pub fn center_on(&mut self, location: GeoPoint) {
        self.widget.set_view(location, self.app.map_zoom);
    }

    /// Draws a circle of `radius_km` around the user. No-op without a location.
    pub fn draw_radius(&mut self, radius_km: f64) -> bool {
        let Some(center) = self.user_location else {
            return false;
        };
        let radius_km = self.app.clamp_radius(radius_km);
        self.widget.draw_radius(center, radius_km * 1000.0);
        true
    }

    pub fn render_ngos(&mut self, ngos: &[NearbyNgo]) {
        let markers: Vec<_> = ngos
            .iter()
            .map(|ngo| {
                let mut lines = Vec::new();
                if ngo.verified {
                    lines.push("Verified".to_string());
                }
                if let Some(rating) = ngo.rating {
                    lines.push(format!("Rating: {:.1}", rating));
                }
                if let Some(address) = &ngo.address {
                    lines.push(address.clone());
                }
                lines.push(format_distance(ngo.distance_km));

                Marker {
                    id: ngo.id,
                    kind: MarkerKind::Ngo,
                    position: GeoPoint::new(ngo.lat, ngo.lng),
                    popup: Popup {
                        title: ngo.name.clone(),
                        lines,
                        image_url: ngo.profile_image_url.clone(),
                    },
                }
            })
            .collect();
        self.replace_markers(markers);
    }

    /// Posts without coordinates are not drawn.
    pub fn render_posts(&mut self, posts: &[Post]) {
        let markers: Vec<_> = posts
            .iter()
            .filter_map(|post| {
                let position = post.location()?;
                let mut lines = vec![post.role.label().to_string()];
                if let Some(food_type) = &post.food_type {
                    lines.push(food_type.clone());
                }
                if let Some(quantity) = &post.quantity {
                    lines.push(quantity.clone());
                }
                if let Some(km) = post.distance_km.or_else(|| self.user_location.map(|u| u.distance_km(&position))) {
                    lines.push(format_distance(km));
                }

                Some(Marker {
                    id: post.id,
                    kind: MarkerKind::Post,
                    position,
                    popup: Popup {
                        title: post.title.clone(),
                        lines,
                        image_url: post.images.first().cloned(),
                    },
                })
            })
            .collect();
        self.replace_markers(markers);
    }

    fn replace_markers(&mut self, markers: Vec<Marker>) {
        self.widget.clear_markers();

        let mut points: Vec<GeoPoint> = markers.iter().map(|m| m.position).collect();
        self.markers = markers.len();
        for marker in markers {
            self.widget.add_marker(marker);
        }

        if points.is_empty() {
            return;
        }
        if let Some(user) = self.user_location {
            points.push(user);
        }
        if let Some(bounds) = Bounds::around(&points) {
            self.widget.fit_bounds(bounds);
        }
    }
}
