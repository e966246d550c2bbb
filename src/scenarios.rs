//! Filter-state checks against the listing pages.
//!
//! Each check runs inside one already-open session, captures its own baseline, and
//! returns a [`ScenarioReport`] with the counts it observed. A broken invariant comes
//! back as [`HarnessError::Invariant`].

use std::fmt;
use std::time::{Duration, Instant};

use futures::FutureExt;
use playwright_rs::Playwright;
use tracing::info;

use crate::catalog::{CatalogCard, FacetKey, FilterTarget, ListingPage};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::filters::{self, apply_filter, clear_all_filters, current_cards};
use crate::geolocation::Geolocation;
use crate::invariants::{self, expect};
use crate::locator::{self, css_ident};
use crate::nearby::{NearbySequence, ReadySignal};
use crate::session::BrowserSession;

pub const BIRYANI: &str = "Biryani & Hyderabadi";
pub const UNDER_200: &str = "Under ₹200";
pub const BUDGET_FRIENDLY: &str = "Budget Friendly (Under ₹200)";

/// Counts observed during one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub name: String,
    pub observations: Vec<(String, usize)>,
    pub notes: Vec<String>,
}

impl ScenarioReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observations: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn observe(&mut self, label: impl Into<String>, count: usize) -> &mut Self {
        self.observations.push((label.into(), count));
        self
    }

    pub fn note(&mut self, note: impl Into<String>) -> &mut Self {
        self.notes.push(note.into());
        self
    }

    pub fn count(&self, label: &str) -> Option<usize> {
        self.observations
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, n)| *n)
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (label, count) in &self.observations {
            write!(f, " | {label}={count}")?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

/// Wait for the first cards, read the visible set, and require it to be non-empty
pub async fn baseline(session: &BrowserSession) -> HarnessResult<Vec<CatalogCard>> {
    let listing = session.listing();
    locator::wait_for_cards_loaded(
        session,
        listing.card_class,
        Duration::from_millis(listing.load_timeout_ms),
    )
    .await?;
    let cards = current_cards(session).await?;
    invariants::non_empty_load(listing.path, cards.len())?;
    Ok(cards)
}

/// Toggle one control and require `0 < filtered <= initial`
pub async fn single_filter(
    session: &BrowserSession,
    target: &FilterTarget,
) -> HarnessResult<ScenarioReport> {
    let initial = baseline(session).await?.len();
    let filtered = apply_filter(session, target).await?.len();
    invariants::single_filter_reduction(&target.to_string(), initial, filtered)?;

    let mut report = ScenarioReport::new(format!("single filter {target}"));
    report.observe("initial", initial).observe("filtered", filtered);
    Ok(report)
}

/// Scenario A: food page, budget "Under ₹200"
pub async fn budget_under_200(session: &BrowserSession) -> HarnessResult<ScenarioReport> {
    let target = FilterTarget::label("budget-checkbox", UNDER_200);
    let mut report = single_filter(session, &target).await?;
    report.name = "A: food budget under ₹200".to_string();
    Ok(report)
}

/// Scenario B: cuisine then budget on the food page, bounded by each facet alone
pub async fn cuisine_and_budget(session: &BrowserSession) -> HarnessResult<ScenarioReport> {
    let cuisine = FilterTarget::attribute("cuisine-checkbox", "cuisine", BIRYANI);
    let budget = FilterTarget::label("budget-checkbox", BUDGET_FRIENDLY);

    let initial = baseline(session).await?;

    let budget_only = apply_filter(session, &budget).await?.len();
    clear_all_filters(session).await?;
    invariants::clear_restores(&initial, &current_cards(session).await?)?;

    let cuisine_only = apply_filter(session, &cuisine).await?.len();
    let both = apply_filter(session, &budget).await?.len();

    let initial = initial.len();
    invariants::single_filter_reduction(BIRYANI, initial, cuisine_only)?;
    invariants::single_filter_reduction(
        &format!("{BIRYANI} + {BUDGET_FRIENDLY}"),
        cuisine_only,
        both,
    )?;
    invariants::and_combination(
        (BIRYANI, cuisine_only),
        (BUDGET_FRIENDLY, budget_only),
        both,
    )?;

    let mut report = ScenarioReport::new("B: cuisine ∧ budget");
    report
        .observe("initial", initial)
        .observe("cuisine", cuisine_only)
        .observe("budget", budget_only)
        .observe("combined", both);
    Ok(report)
}

/// Scenario C: a reducing filter followed by clear restores the baseline exactly
pub async fn clear_restores_baseline(
    session: &BrowserSession,
    target: &FilterTarget,
) -> HarnessResult<ScenarioReport> {
    let initial = baseline(session).await?;
    let filtered = apply_filter(session, target).await?.len();
    invariants::strictly_reduces(&target.to_string(), initial.len(), filtered)?;

    clear_all_filters(session).await?;
    let restored = current_cards(session).await?;
    invariants::clear_restores(&initial, &restored)?;

    let mut report = ScenarioReport::new(format!("C: clear after {target}"));
    report
        .observe("initial", initial.len())
        .observe("filtered", filtered)
        .observe("restored", restored.len());
    Ok(report)
}

/// Location, nearby, ready: the prerequisite for any distance assertion
async fn reach_nearby_ready(
    session: &BrowserSession,
    location: Geolocation,
) -> HarnessResult<(NearbySequence, ReadySignal)> {
    let mut sequence = NearbySequence::new();
    sequence.set_location(session, location).await?;
    let signal = sequence.find_nearby(session).await?;
    Ok((sequence, signal))
}

fn note_signal(report: &mut ScenarioReport, signal: ReadySignal) {
    match signal {
        ReadySignal::IndicatorCleared(after) => {
            report.note(format!("loading indicator cleared after {after:?}"))
        }
        ReadySignal::FallbackDelay(delay) => {
            report.note(format!("no loading indicator; waited {delay:?}"))
        }
    };
}

/// Scenario D: distance range from a fixed coordinate is non-empty once nearby is ready
pub async fn distance_from_location(
    session: &BrowserSession,
    location: Geolocation,
    min_km: u32,
    max_km: u32,
) -> HarnessResult<ScenarioReport> {
    let initial = baseline(session).await?.len();
    let (sequence, signal) = reach_nearby_ready(session, location).await?;
    let filtered = sequence.toggle_distance(session, min_km, max_km).await?.len();

    let filter = format!("{min_km}-{max_km} km");
    invariants::single_filter_reduction(&filter, initial, filtered)?;

    let mut report = ScenarioReport::new(format!(
        "D: distance {filter} from ({}, {})",
        location.latitude, location.longitude
    ));
    report.observe("initial", initial).observe("filtered", filtered);
    note_signal(&mut report, signal);
    Ok(report)
}

/// After the nearby sequence the page still shows cards
pub async fn geolocation_nearby(
    session: &BrowserSession,
    location: Geolocation,
) -> HarnessResult<ScenarioReport> {
    baseline(session).await?;
    let (_, signal) = reach_nearby_ready(session, location).await?;
    let after = current_cards(session).await?.len();
    invariants::non_empty_load("nearby results", after)?;

    let mut report = ScenarioReport::new("nearby results");
    report.observe("after", after);
    note_signal(&mut report, signal);
    Ok(report)
}

/// 0–5 km may legitimately be empty; only the upper bound is asserted
pub async fn distance_within_5km(
    session: &BrowserSession,
    location: Geolocation,
) -> HarnessResult<ScenarioReport> {
    let initial = baseline(session).await?.len();
    let (sequence, _) = reach_nearby_ready(session, location).await?;
    let filtered = sequence.toggle_distance(session, 0, 5).await?.len();
    expect(filtered <= initial, || {
        format!("0-5 km: {filtered} visible cards exceeds the {initial} before filtering")
    })?;

    let mut report = ScenarioReport::new("distance within 5 km");
    report.observe("initial", initial).observe("filtered", filtered);
    if filtered == 0 {
        report.note("no places within 5 km of this location");
    }
    Ok(report)
}

/// Title fragment and every filter section are present and displayed
pub async fn page_smoke(session: &BrowserSession) -> HarnessResult<ScenarioReport> {
    let listing = session.listing();
    let title = session.title().await?;
    expect(title.contains(listing.title_fragment), || {
        format!("expected '{}' in title, got '{title}'", listing.title_fragment)
    })?;

    baseline(session).await?;
    for section in &listing.filter_sections {
        let shown = locator::is_displayed_by_id(session, section).await?;
        expect(shown, || format!("filter section #{section} is not displayed"))?;
    }

    let mut report = ScenarioReport::new(format!("smoke {}", listing.path));
    report.observe("filter sections", listing.filter_sections.len());
    Ok(report)
}

/// Cards render within the page's load budget
pub async fn load_within(session: &BrowserSession) -> HarnessResult<ScenarioReport> {
    let listing = session.listing();
    let budget = Duration::from_millis(listing.load_timeout_ms);
    let start = Instant::now();
    let present = locator::wait_for_cards_loaded(session, listing.card_class, budget).await?;
    let elapsed = start.elapsed();

    let mut report = ScenarioReport::new(format!("load {}", listing.path));
    report
        .observe("cards present", present)
        .note(format!("loaded in {elapsed:?} (budget {budget:?})"));
    Ok(report)
}

/// Every facet of the page generated at least one control
pub async fn filters_generated(session: &BrowserSession) -> HarnessResult<ScenarioReport> {
    baseline(session).await?;
    let listing = session.listing();
    let mut report = ScenarioReport::new(format!("filters generated {}", listing.path));
    for facet in &listing.facets {
        let n = locator::count(session, &format!("input.{}", css_ident(facet.class))).await?;
        expect(n > 0, || format!("no {} controls generated", facet.name))?;
        report.observe(facet.name, n);
    }
    Ok(report)
}

/// The results counter text changes after the first budget control is toggled
pub async fn results_count_updates(session: &BrowserSession) -> HarnessResult<ScenarioReport> {
    let listing = session.listing();
    let counter_id = listing
        .results_count_id
        .ok_or_else(|| HarnessError::not_found(format!("results counter on {}", listing.path)))?;
    let budget = listing
        .facet("budget")
        .ok_or_else(|| HarnessError::not_found(format!("budget facet on {}", listing.path)))?;

    baseline(session).await?;
    let counter = locator::find_by_id(session, counter_id).await?;
    let before = counter.locator.inner_text().await?;
    expect(before.chars().any(|c| c.is_ascii_digit()), || {
        format!("results counter '{before}' has no number")
    })?;

    let target = locator::facet_targets(session, budget)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| HarnessError::not_found("budget control to toggle"))?;
    apply_filter(session, &target).await?;

    let after = counter.locator.inner_text().await?;
    expect(after != before, || {
        format!("results counter stayed at '{before}' after filtering")
    })?;

    let mut report = ScenarioReport::new(format!("results counter updates on {target}"));
    report.note(format!("'{before}' -> '{after}'"));
    Ok(report)
}

/// Stack the first three controls of the page's first attribute facet.
///
/// Either a no-results message is displayed or some cards remain visible.
pub async fn restrictive_filters(session: &BrowserSession) -> HarnessResult<ScenarioReport> {
    let listing = session.listing();
    let facet = listing
        .facets
        .iter()
        .find(|f| matches!(f.key, FacetKey::Attributes(_)))
        .ok_or_else(|| HarnessError::not_found(format!("attribute facet on {}", listing.path)))?;

    baseline(session).await?;
    let targets = locator::facet_targets(session, facet).await?;
    let stacked = &targets[..targets.len().min(3)];
    for target in stacked {
        let control = locator::find_filter(session, target).await?;
        filters::toggle_filter(session, &control).await?;
    }

    let visible = current_cards(session).await?.len();
    let no_results = format!(".{}", css_ident(listing.no_results_class));
    let message_shown = locator::count(session, &no_results).await? > 0
        && session.page().locator(&no_results).await.is_visible().await?;
    expect(visible > 0 || message_shown, || {
        format!(
            "{} stacked {} filters left an empty page with no message",
            stacked.len(),
            facet.name
        )
    })?;

    let mut report = ScenarioReport::new(format!("restrictive {} filters", facet.name));
    report
        .observe("stacked", stacked.len())
        .observe("visible", visible);
    if message_shown {
        report.note("no-results message displayed");
    }
    Ok(report)
}

/// Checks selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    A,
    B,
    C,
    D,
    Smoke,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [Self::A, Self::B, Self::C, Self::D, Self::Smoke];

    pub fn parse(value: &str) -> Option<Vec<Scenario>> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a" => Some(vec![Self::A]),
            "b" => Some(vec![Self::B]),
            "c" => Some(vec![Self::C]),
            "d" => Some(vec![Self::D]),
            "smoke" => Some(vec![Self::Smoke]),
            "all" => Some(Self::ALL.to_vec()),
            _ => None,
        }
    }

    pub fn page(self) -> ListingPage {
        match self {
            Self::A | Self::B | Self::C => ListingPage::food(),
            Self::D | Self::Smoke => ListingPage::places(),
        }
    }
}

/// Run one scenario in its own browser session
pub async fn run(
    playwright: &Playwright,
    base_url: &str,
    config: &HarnessConfig,
    scenario: Scenario,
) -> HarnessResult<ScenarioReport> {
    let page = scenario.page();
    let report = BrowserSession::scoped(playwright, base_url, &page, config, |session| {
        async move {
            match scenario {
                Scenario::A => budget_under_200(session).await,
                Scenario::B => cuisine_and_budget(session).await,
                Scenario::C => {
                    let target = FilterTarget::label("budget-checkbox", UNDER_200);
                    clear_restores_baseline(session, &target).await
                }
                Scenario::D => {
                    distance_from_location(session, Geolocation::HITEC_CITY, 10, 20).await
                }
                Scenario::Smoke => page_smoke(session).await,
            }
        }
        .boxed_local()
    })
    .await?;
    info!(scenario = ?scenario, "{report}");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_renders_observations_then_notes() {
        let mut report = ScenarioReport::new("B: cuisine ∧ budget");
        report
            .observe("initial", 12)
            .observe("cuisine", 4)
            .observe("combined", 2)
            .note("settled after two reads");
        insta::assert_snapshot!(report.to_string(), @r"
        B: cuisine ∧ budget | initial=12 | cuisine=4 | combined=2
          note: settled after two reads
        ");
        assert_eq!(report.count("cuisine"), Some(4));
        assert_eq!(report.count("budget"), None);
    }

    #[test]
    fn scenario_names_parse() {
        assert_eq!(Scenario::parse("A"), Some(vec![Scenario::A]));
        assert_eq!(Scenario::parse(" smoke "), Some(vec![Scenario::Smoke]));
        assert_eq!(Scenario::parse("all").unwrap().len(), 5);
        assert_eq!(Scenario::parse("e"), None);
    }

    #[test]
    fn scenarios_target_the_right_page() {
        assert_eq!(Scenario::A.page().path, "food-places.html");
        assert_eq!(Scenario::C.page().path, "food-places.html");
        assert_eq!(Scenario::D.page().path, "index.html");
    }
}
