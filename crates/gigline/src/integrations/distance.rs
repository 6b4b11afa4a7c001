//! Travel-distance estimates between two points.
//!
//! A route provider is consulted first under a fixed time budget; any failure or timeout
//! falls back to the great-circle distance. Whatever answer a provider-backed lookup settles
//! on is memoized per coordinate pair in a bounded table that lives as long as the process.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::DistanceConfig;
use crate::workflows::jobs::domain::Coordinates;

const EARTH_RADIUS_KM: f64 = 6371.0;
const KEY_SCALE: f64 = 100_000.0;

#[derive(Debug, thiserror::Error)]
pub enum DistanceError {
    #[error("route lookup failed: {0}")]
    Transport(String),
    #[error("route service answered with status {0}")]
    Status(u16),
    #[error("route service returned no route")]
    NoRoute,
    #[error("route lookup exceeded {0:?}")]
    Timeout(Duration),
}

/// External routing backend (OSRM, a maps API, ...).
#[async_trait]
pub trait RouteDistanceProvider: Send + Sync {
    async fn route_km(&self, from: Coordinates, to: Coordinates) -> Result<f64, DistanceError>;
}

/// Great-circle (haversine) distance in kilometers.
pub fn great_circle_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lng = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// OSRM-compatible `route/v1/driving` client.
#[derive(Debug, Clone)]
pub struct OsrmRouteProvider {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
}

impl OsrmRouteProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DistanceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DistanceError::Transport(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// OSRM expects `longitude,latitude` pairs separated by `;`.
    fn route_url(&self, from: Coordinates, to: Coordinates) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url, from.longitude, from.latitude, to.longitude, to.latitude
        )
    }
}

impl OsrmResponse {
    fn shortest_km(&self) -> Result<f64, DistanceError> {
        self.routes
            .first()
            .map(|route| route.distance / 1000.0)
            .ok_or(DistanceError::NoRoute)
    }
}

#[async_trait]
impl RouteDistanceProvider for OsrmRouteProvider {
    async fn route_km(&self, from: Coordinates, to: Coordinates) -> Result<f64, DistanceError> {
        let url = self.route_url(from, to);
        let response = self
            .client
            .get(&url)
            .query(&[("overview", "false")])
            .send()
            .await
            .map_err(|err| DistanceError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DistanceError::Status(status.as_u16()));
        }

        let body: OsrmResponse = response
            .json()
            .await
            .map_err(|err| DistanceError::Transport(err.to_string()))?;

        body.shortest_km()
    }
}

type PairKey = (i64, i64, i64, i64);

fn pair_key(from: Coordinates, to: Coordinates) -> PairKey {
    let scale = |value: f64| (value * KEY_SCALE).round() as i64;
    (
        scale(from.latitude),
        scale(from.longitude),
        scale(to.latitude),
        scale(to.longitude),
    )
}

/// Bounded memo table; the oldest entry is evicted first.
#[derive(Debug, Default)]
struct DistanceCache {
    capacity: usize,
    entries: HashMap<PairKey, f64>,
    order: VecDeque<PairKey>,
}

impl DistanceCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &PairKey) -> Option<f64> {
        self.entries.get(key).copied()
    }

    fn insert(&mut self, key: PairKey, km: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key, km).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Distance collaborator consumed when browsing jobs.
pub struct DistanceEstimator {
    provider: Option<Arc<dyn RouteDistanceProvider>>,
    timeout: Duration,
    cache: Mutex<DistanceCache>,
}

impl DistanceEstimator {
    pub fn new(
        provider: Option<Arc<dyn RouteDistanceProvider>>,
        timeout: Duration,
        cache_capacity: usize,
    ) -> Self {
        Self {
            provider,
            timeout,
            cache: Mutex::new(DistanceCache::new(cache_capacity)),
        }
    }

    /// Estimator that never leaves the process.
    pub fn great_circle_only() -> Self {
        let defaults = DistanceConfig::default();
        Self::new(None, defaults.timeout, defaults.cache_capacity)
    }

    pub fn from_config(config: &DistanceConfig) -> Result<Self, DistanceError> {
        let provider = match &config.router_url {
            Some(url) => Some(Arc::new(OsrmRouteProvider::new(url.clone(), config.timeout)?)
                as Arc<dyn RouteDistanceProvider>),
            None => None,
        };
        Ok(Self::new(provider, config.timeout, config.cache_capacity))
    }

    /// Kilometers between two points, rounded to one decimal place.
    pub async fn distance_km(&self, from: Coordinates, to: Coordinates) -> f64 {
        let key = pair_key(from, to);
        if let Some(km) = self.cached(&key) {
            return km;
        }

        let Some(provider) = self.provider.as_ref() else {
            return round_km(great_circle_km(from, to));
        };

        let lookup = tokio::time::timeout(self.timeout, provider.route_km(from, to)).await;
        let km = match lookup {
            Ok(Ok(km)) if km.is_finite() && km >= 0.0 => round_km(km),
            Ok(Ok(km)) => {
                debug!(km, "route provider returned an unusable distance; using great-circle");
                round_km(great_circle_km(from, to))
            }
            Ok(Err(err)) => {
                debug!(error = %err, "route lookup failed; using great-circle");
                round_km(great_circle_km(from, to))
            }
            Err(_) => {
                debug!(timeout = ?self.timeout, "route lookup timed out; using great-circle");
                round_km(great_circle_km(from, to))
            }
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, km);
        }
        km
    }

    fn cached(&self, key: &PairKey) -> Option<f64> {
        self.cache.lock().ok().and_then(|cache| cache.get(key))
    }

    pub fn cached_pairs(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for DistanceEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistanceEstimator")
            .field("provider", &self.provider.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn round_km(km: f64) -> f64 {
    (km * 10.0).round() / 10.0
}
