//! Distance-filter activation sequence.
//!
//! Distance controls only mean something once the page knows where the user is:
//!
//! ```text
//! Unlocated --location applied--> LocationSet --nearby clicked--> NearbyComputing
//!     --indicator cleared / fallback elapsed--> NearbyReady
//! ```
//!
//! Distance toggles before `NearbyReady` are allowed but their counts are not asserted.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::catalog::{CatalogCard, FilterTarget};
use crate::error::{HarnessError, HarnessResult};
use crate::filters;
use crate::geolocation::{self, Geolocation};
use crate::locator;
use crate::session::BrowserSession;
use crate::wait::poll_until;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NearbyState {
    Unlocated,
    LocationSet,
    NearbyComputing,
    NearbyReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NearbyEvent {
    LocationApplied,
    NearbyActivated,
    ResultsReady,
}

/// Allowed transitions; anything else is a usage error
pub fn transition(state: NearbyState, event: NearbyEvent) -> HarnessResult<NearbyState> {
    use NearbyEvent::*;
    use NearbyState::*;

    match (state, event) {
        (Unlocated | LocationSet, LocationApplied) => Ok(LocationSet),
        (LocationSet, NearbyActivated) => Ok(NearbyComputing),
        (NearbyComputing, ResultsReady) => Ok(NearbyReady),
        (state, event) => Err(HarnessError::OutOfOrder(format!(
            "{event:?} is not valid in state {state:?}"
        ))),
    }
}

/// How the wait for nearby results ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySignal {
    /// The loading indicator was seen and then hidden
    IndicatorCleared(Duration),
    /// No indicator appeared; the fixed fallback delay was used
    FallbackDelay(Duration),
}

/// Drives one session through the activation sequence
#[derive(Debug)]
pub struct NearbySequence {
    state: NearbyState,
    location: Option<Geolocation>,
}

impl Default for NearbySequence {
    fn default() -> Self {
        Self::new()
    }
}

impl NearbySequence {
    pub fn new() -> Self {
        Self {
            state: NearbyState::Unlocated,
            location: None,
        }
    }

    pub fn state(&self) -> NearbyState {
        self.state
    }

    pub fn location(&self) -> Option<Geolocation> {
        self.location
    }

    pub fn is_ready(&self) -> bool {
        self.state == NearbyState::NearbyReady
    }

    fn advance(&mut self, event: NearbyEvent) -> HarnessResult<()> {
        self.state = transition(self.state, event)?;
        Ok(())
    }

    /// Pin the session's location, then give the page a moment to pick it up
    pub async fn set_location(
        &mut self,
        session: &BrowserSession,
        location: Geolocation,
    ) -> HarnessResult<()> {
        transition(self.state, NearbyEvent::LocationApplied)?;
        geolocation::set_location(session, location).await?;
        tokio::time::sleep(Duration::from_millis(session.waits().location_pause_ms)).await;
        self.location = Some(location);
        self.advance(NearbyEvent::LocationApplied)
    }

    /// Click the page's "find nearby" control
    pub async fn activate(&mut self, session: &BrowserSession) -> HarnessResult<()> {
        transition(self.state, NearbyEvent::NearbyActivated)?;
        let id = session.listing().nearby_control_id.ok_or_else(|| {
            HarnessError::not_found(format!("nearby control on {}", session.listing().path))
        })?;
        let control = locator::find_by_id(session, id).await?;
        control.locator.click(None).await?;
        self.advance(NearbyEvent::NearbyActivated)
    }

    /// Wait for the loading indicator to come and go, or for the fallback delay
    pub async fn wait_ready(&mut self, session: &BrowserSession) -> HarnessResult<ReadySignal> {
        transition(self.state, NearbyEvent::ResultsReady)?;
        let signal = wait_for_indicator(session, session.listing().loading_indicator_id).await?;
        self.advance(NearbyEvent::ResultsReady)?;
        info!(?signal, "nearby results ready");
        Ok(signal)
    }

    /// `activate` followed by `wait_ready`
    pub async fn find_nearby(&mut self, session: &BrowserSession) -> HarnessResult<ReadySignal> {
        self.activate(session).await?;
        self.wait_ready(session).await
    }

    /// Toggle the `[min_km, max_km]` distance control and return the visible set
    pub async fn toggle_distance(
        &self,
        session: &BrowserSession,
        min_km: u32,
        max_km: u32,
    ) -> HarnessResult<Vec<CatalogCard>> {
        if !self.is_ready() {
            warn!(
                state = ?self.state,
                "distance filter used before nearby results were ready; counts are not meaningful"
            );
        }
        filters::apply_filter(session, &FilterTarget::distance_range(min_km, max_km)).await
    }
}

async fn wait_for_indicator(
    session: &BrowserSession,
    indicator_id: Option<&str>,
) -> HarnessResult<ReadySignal> {
    let waits = session.waits();
    let fallback = Duration::from_millis(waits.nearby_fallback_ms);
    let Some(id) = indicator_id else {
        tokio::time::sleep(fallback).await;
        return Ok(ReadySignal::FallbackDelay(fallback));
    };

    let start = Instant::now();
    let appeared = poll_until(
        &format!("#{id} to appear"),
        Duration::from_millis(waits.nearby_appear_timeout_ms),
        waits.poll_interval(),
        || async move {
            locator::is_displayed_by_id(session, id)
                .await
                .map(|shown| shown.then_some(()))
        },
    )
    .await;

    match appeared {
        Ok(()) => {}
        Err(HarnessError::Timeout { .. }) => {
            warn!(indicator = id, "loading indicator never appeared; using fallback delay");
            tokio::time::sleep(fallback).await;
            return Ok(ReadySignal::FallbackDelay(fallback));
        }
        Err(e) => return Err(e),
    }

    poll_until(
        &format!("#{id} to disappear"),
        Duration::from_millis(waits.nearby_disappear_timeout_ms),
        waits.poll_interval(),
        || async move {
            locator::is_displayed_by_id(session, id)
                .await
                .map(|shown| (!shown).then_some(()))
        },
    )
    .await?;
    Ok(ReadySignal::IndicatorCleared(start.elapsed()))
}
