//! Static reference data: service-area states and cities, and poll categories.
//!
//! Built once on first use and never mutated.

use lazy_static::lazy_static;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub const ORIGIN: Coordinates = Coordinates { lat: 0.0, lon: 0.0 };
}

#[derive(Debug, Clone, Serialize)]
pub struct City {
    pub name: &'static str,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub name: &'static str,
    pub abbreviation: &'static str,
    pub cities: Vec<City>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub slug: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaceMatch {
    State { state: &'static str },
    City { city: &'static str, state: &'static str },
}

fn city(name: &'static str, lat: f64, lon: f64) -> City {
    City {
        name,
        coordinates: Some(Coordinates { lat, lon }),
    }
}

fn unplaced(name: &'static str) -> City {
    City { name, coordinates: None }
}

lazy_static! {
    static ref STATES: Vec<State> = vec![
        State {
            name: "Alaska",
            abbreviation: "AK",
            cities: vec![
                city("Anchorage", 61.2181, -149.9003),
                city("Fairbanks", 64.8378, -147.7164),
                city("Juneau", 58.3019, -134.4197),
                unplaced("Wasilla"),
            ],
        },
        State {
            name: "Arizona",
            abbreviation: "AZ",
            cities: vec![
                city("Phoenix", 33.4484, -112.0740),
                city("Scottsdale", 33.4942, -111.9261),
                city("Tucson", 32.2226, -110.9747),
                unplaced("Tempe"),
            ],
        },
        State {
            name: "California",
            abbreviation: "CA",
            cities: vec![
                city("Los Angeles", 34.0522, -118.2437),
                city("San Diego", 32.7157, -117.1611),
                city("San Francisco", 37.7749, -122.4194),
                city("Sacramento", 38.5816, -121.4944),
                unplaced("Anaheim"),
            ],
        },
        State {
            name: "Colorado",
            abbreviation: "CO",
            cities: vec![
                city("Denver", 39.7392, -104.9903),
                city("Colorado Springs", 38.8339, -104.8214),
                unplaced("Boulder"),
            ],
        },
        State {
            name: "Florida",
            abbreviation: "FL",
            cities: vec![
                city("Miami", 25.7617, -80.1918),
                city("Orlando", 28.5383, -81.3792),
                city("Tampa", 27.9506, -82.4572),
                unplaced("Jacksonville"),
            ],
        },
        State {
            name: "Georgia",
            abbreviation: "GA",
            cities: vec![city("Atlanta", 33.7490, -84.3880), unplaced("Savannah")],
        },
        State {
            name: "Illinois",
            abbreviation: "IL",
            cities: vec![city("Chicago", 41.8781, -87.6298), unplaced("Naperville"), unplaced("Springfield")],
        },
        State {
            name: "Nevada",
            abbreviation: "NV",
            cities: vec![city("Las Vegas", 36.1699, -115.1398), city("Reno", 39.5296, -119.8138)],
        },
        State {
            name: "New York",
            abbreviation: "NY",
            cities: vec![
                city("New York City", 40.7128, -74.0060),
                city("Buffalo", 42.8864, -78.8784),
                unplaced("Rochester"),
            ],
        },
        State {
            name: "Ohio",
            abbreviation: "OH",
            cities: vec![
                city("Columbus", 39.9612, -82.9988),
                city("Cleveland", 41.4993, -81.6944),
                unplaced("Cincinnati"),
            ],
        },
        State {
            name: "Texas",
            abbreviation: "TX",
            cities: vec![
                city("Houston", 29.7604, -95.3698),
                city("Dallas", 32.7767, -96.7970),
                city("Austin", 30.2672, -97.7431),
                city("San Antonio", 29.4241, -98.4936),
                unplaced("Fort Worth"),
                unplaced("El Paso"),
            ],
        },
        State {
            name: "Washington",
            abbreviation: "WA",
            cities: vec![city("Seattle", 47.6062, -122.3321), city("Spokane", 47.6588, -117.4260), unplaced("Tacoma")],
        },
    ];

    static ref CATEGORIES: Vec<Category> = vec![
        Category { slug: "prom", title: "Prom", icon: "Crown" },
        Category { slug: "weddings", title: "Weddings", icon: "Heart" },
        Category { slug: "bachelor-parties", title: "Bachelor Parties", icon: "PartyPopper" },
        Category { slug: "bachelorette-parties", title: "Bachelorette Parties", icon: "Sparkles" },
        Category { slug: "graduation", title: "Graduation", icon: "GraduationCap" },
        Category { slug: "concerts", title: "Concerts", icon: "Music" },
        Category { slug: "sporting-events", title: "Sporting Events", icon: "TrendingUp" },
        Category { slug: "corporate", title: "Corporate Travel", icon: "Briefcase" },
        Category { slug: "pricing", title: "Pricing", icon: "Car" },
        Category { slug: "fleet", title: "Fleet", icon: "Car" },
    ];
}

pub fn states() -> &'static [State] {
    &STATES
}

pub fn state(name: &str) -> Option<&'static State> {
    let name = name.trim();
    STATES
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name) || s.abbreviation.eq_ignore_ascii_case(name))
}

pub fn cities_in(state_name: &str) -> Option<Vec<&'static str>> {
    state(state_name).map(|s| s.cities.iter().map(|c| c.name).collect())
}

/// Coordinates for a city or state name we already know, without geocoding.
/// States resolve to their first placed city.
pub fn known_coordinates(place: &str) -> Option<Coordinates> {
    let place = place.trim();
    let by_city = STATES
        .iter()
        .flat_map(|s| s.cities.iter())
        .find(|c| c.name.eq_ignore_ascii_case(place))
        .and_then(|c| c.coordinates);

    by_city.or_else(|| state(place).and_then(|s| s.cities.iter().find_map(|c| c.coordinates)))
}

pub fn categories() -> &'static [Category] {
    &CATEGORIES
}

pub fn category(slug: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.slug.eq_ignore_ascii_case(slug.trim()))
}

/// States and cities whose names contain `query` (case-insensitive), at most `cap`.
pub fn match_places(query: &str, cap: usize) -> Vec<PlaceMatch> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let states = STATES
        .iter()
        .filter(|s| s.name.to_lowercase().contains(&needle))
        .map(|s| PlaceMatch::State { state: s.name });

    let cities = STATES.iter().flat_map(|s| {
        s.cities
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .map(move |c| PlaceMatch::City {
                city: c.name,
                state: s.name,
            })
    });

    states.chain(cities).take(cap).collect()
}
