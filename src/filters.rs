//! Toggle filter controls and wait for the page to re-render.
//!
//! The filter state itself belongs to the page. These helpers never track what is
//! checked; callers re-read the visible set after every mutation.

use tracing::debug;

use crate::catalog::{CatalogCard, FilterTarget};
use crate::error::HarnessResult;
use crate::locator::{self, CardSelectors, Located};
use crate::session::BrowserSession;
use crate::wait::{Settled, settle};

/// Wait until the session's visible card count stops changing
pub async fn settle_render(session: &BrowserSession) -> HarnessResult<Settled> {
    let card_class = session.listing().card_class;
    settle(session.settle_policy(), || locator::visible_count(session, card_class)).await
}

/// Click a resolved control, then wait out the re-render
pub async fn toggle_filter(session: &BrowserSession, control: &Located) -> HarnessResult<()> {
    control.locator.click(None).await?;
    let settled = settle_render(session).await?;
    debug!(control = %control.description, ?settled, "filter toggled");
    Ok(())
}

/// Locate `target`, toggle it, and return the fresh visible set
pub async fn apply_filter(
    session: &BrowserSession,
    target: &FilterTarget,
) -> HarnessResult<Vec<CatalogCard>> {
    let control = locator::find_filter(session, target).await?;
    toggle_filter(session, &control).await?;
    current_cards(session).await
}

/// Click the page's single clear-filters control and wait out the re-render
pub async fn clear_all_filters(session: &BrowserSession) -> HarnessResult<()> {
    let clear = locator::find_by_id(session, session.listing().clear_control_id).await?;
    clear.locator.click(None).await?;
    let settled = settle_render(session).await?;
    debug!(?settled, "filters cleared");
    Ok(())
}

/// Visible set of the session's listing page
pub async fn current_cards(session: &BrowserSession) -> HarnessResult<Vec<CatalogCard>> {
    locator::visible_cards(session, &CardSelectors::from(session.listing())).await
}
