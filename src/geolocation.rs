//! Fixed-coordinate geolocation for distance checks.
//!
//! The coordinate is set on the session's browser context together with the
//! `geolocation` permission, so every page in the session, including ones loaded after a
//! reload, resolves `getCurrentPosition` to it without a prompt. It must be applied before
//! the page's "find nearby" control is used.

use serde::Deserialize;
use tracing::info;

use crate::error::{HarnessError, HarnessResult};
use crate::session::BrowserSession;

/// A coordinate pair with accuracy in metres
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
}

fn default_accuracy() -> f64 {
    100.0
}

impl Geolocation {
    /// Hitec City, Hyderabad
    pub const HITEC_CITY: Self = Self {
        latitude: 17.4435,
        longitude: 78.3772,
        accuracy: 100.0,
    };

    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> HarnessResult<Self> {
        let location = Self {
            latitude,
            longitude,
            accuracy,
        };
        location.validate()?;
        Ok(location)
    }

    fn validate(&self) -> HarnessResult<()> {
        let in_range = self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.accuracy.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy >= 0.0;
        if in_range {
            Ok(())
        } else {
            Err(HarnessError::Config(format!(
                "invalid coordinate ({}, {}) accuracy {}",
                self.latitude, self.longitude, self.accuracy
            )))
        }
    }
}

impl From<Geolocation> for playwright_rs::Geolocation {
    fn from(location: Geolocation) -> Self {
        Self {
            latitude: location.latitude,
            longitude: location.longitude,
            accuracy: Some(location.accuracy),
        }
    }
}

/// Make every later geolocation lookup in this session resolve to `location`
pub async fn set_location(session: &BrowserSession, location: Geolocation) -> HarnessResult<()> {
    location.validate()?;
    let context = session.page().context()?;
    context.grant_permissions(&["geolocation"], None).await?;
    context.set_geolocation(Some(location.into())).await?;
    info!(
        latitude = location.latitude,
        longitude = location.longitude,
        "geolocation set on browser context"
    );
    Ok(())
}
