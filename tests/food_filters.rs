//! Food places page checks in a real browser.
//!
//! ## Setup
//! Install Playwright browsers: `npx playwright install`
//!
//! ## Running
//! - Default (chromium): `cargo nextest run food`
//! - Headed: `FACETCHECK_HEADLESS=0 cargo nextest run food`

mod common;

use std::time::Duration;

use facetcheck::catalog::{FilterTarget, ListingPage};
use facetcheck::error::HarnessError;
use facetcheck::filters::{apply_filter, current_cards};
use facetcheck::geolocation::Geolocation;
use facetcheck::locator::{self, CardSelectors};
use facetcheck::nearby::{NearbySequence, ReadySignal};
use facetcheck::scenarios::{self, BIRYANI, Scenario};
use facetcheck::session::BrowserSession;
use futures::FutureExt;

#[tokio::test]
async fn budget_under_200_narrows_without_emptying() {
    let Some((playwright, config, base_url)) = common::setup("scenario_a").await else {
        return;
    };
    let report = scenarios::run(&playwright, &base_url, &config, Scenario::A)
        .await
        .expect("budget filter check failed");
    assert_eq!(report.count("initial"), Some(11));
    assert_eq!(report.count("filtered"), Some(5));
}

#[tokio::test]
async fn cuisine_and_budget_combine_as_and() {
    let Some((playwright, config, base_url)) = common::setup("scenario_b").await else {
        return;
    };
    let report = scenarios::run(&playwright, &base_url, &config, Scenario::B)
        .await
        .expect("combined filter check failed");
    assert_eq!(report.count("cuisine"), Some(5));
    assert_eq!(report.count("budget"), Some(5));
    assert_eq!(report.count("combined"), Some(2));
}

#[tokio::test]
async fn clear_restores_food_baseline() {
    let Some((playwright, config, base_url)) = common::setup("scenario_c").await else {
        return;
    };
    let report = scenarios::run(&playwright, &base_url, &config, Scenario::C)
        .await
        .expect("clear check failed");
    assert_eq!(report.count("initial"), Some(11));
    assert_eq!(report.count("restored"), Some(11));
}

#[tokio::test]
async fn every_cuisine_filter_keeps_its_own_cards() {
    let Some((playwright, config, base_url)) = common::setup("cuisine_filters").await else {
        return;
    };
    for (cuisine, expected) in [
        (BIRYANI, 5),
        ("Street Food - Quick Bites", 3),
        ("Cafes & Bakeries", 3),
    ] {
        let target = FilterTarget::attribute("cuisine-checkbox", "cuisine", cuisine);
        let cards = BrowserSession::scoped(
            &playwright,
            &base_url,
            &ListingPage::food(),
            &config,
            move |s| {
                async move {
                    scenarios::baseline(s).await?;
                    apply_filter(s, &target).await
                }
                .boxed_local()
            },
        )
        .await
        .unwrap_or_else(|e| panic!("[{cuisine}] {e}"));

        assert_eq!(cards.len(), expected, "[{cuisine}]");
        assert!(
            cards.iter().all(|c| c.category == cuisine),
            "[{cuisine}] {cards:?}"
        );
    }
}

#[tokio::test]
async fn results_counter_follows_filters() {
    let Some((playwright, config, base_url)) = common::setup("results_count").await else {
        return;
    };
    let report = BrowserSession::scoped(
        &playwright,
        &base_url,
        &ListingPage::food(),
        &config,
        |s| async move { scenarios::results_count_updates(s).await }.boxed_local(),
    )
    .await
    .expect("results counter check failed");
    assert_eq!(
        report.name,
        "results counter updates on budget-checkbox labelled 'Budget Friendly (Under ₹200)'"
    );
    assert_eq!(
        report.notes,
        ["'Showing 11 of 11 food places' -> 'Showing 5 of 11 food places'"]
    );
}

#[tokio::test]
async fn food_page_smoke_and_generated_filters() {
    let Some((playwright, config, base_url)) = common::setup("food_smoke").await else {
        return;
    };
    let (smoke, generated) =
        BrowserSession::scoped(&playwright, &base_url, &ListingPage::food(), &config, |s| {
            async move {
                let smoke = scenarios::page_smoke(s).await?;
                Ok::<_, HarnessError>((smoke, scenarios::filters_generated(s).await?))
            }
            .boxed_local()
        })
        .await
        .expect("food page smoke failed");

    assert_eq!(smoke.count("filter sections"), Some(2));
    assert_eq!(generated.count("cuisine"), Some(3));
    assert_eq!(generated.count("budget"), Some(3));
}

#[tokio::test]
async fn budget_labels_and_cards_are_found_by_text() {
    let Some((playwright, config, base_url)) = common::setup("label_lookup").await else {
        return;
    };
    BrowserSession::scoped(&playwright, &base_url, &ListingPage::food(), &config, |s| {
        async move {
            scenarios::baseline(s).await?;

            let moderate =
                locator::find_filter_control_by_label(s, "budget-checkbox", "Moderate").await?;
            assert_eq!(moderate.selector, "input.budget-checkbox >> nth=1");

            let missing =
                locator::find_filter_control_by_label(s, "budget-checkbox", "Luxury").await;
            assert!(matches!(missing, Err(HarnessError::NotFound { .. })));

            let card = locator::find_card_by_name(s, "food-place-card", "Paradise").await?;
            let details = locator::card_details(s, &card, &CardSelectors::from(s.listing())).await?;
            assert_eq!(details.name, "Paradise Biryani");
            assert_eq!(details.category, BIRYANI);
            assert_eq!(details.price, "₹350 for two");
            assert!(details.distance.is_none());

            let before = current_cards(s).await?;
            assert_eq!(before.len(), 11);
            assert!(before.iter().any(|c| c.name == "Shah Ghouse" && c.price == "₹180 for two"));
            Ok::<_, HarnessError>(())
        }
        .boxed_local()
    })
    .await
    .expect("label lookups failed");
}

#[tokio::test]
async fn stacked_cuisines_never_empty_the_page_silently() {
    let Some((playwright, config, base_url)) = common::setup("restrictive_food").await else {
        return;
    };
    let report = BrowserSession::scoped(
        &playwright,
        &base_url,
        &ListingPage::food(),
        &config,
        |s| async move { scenarios::restrictive_filters(s).await }.boxed_local(),
    )
    .await
    .expect("restrictive filters check failed");
    assert_eq!(report.count("stacked"), Some(3));
    assert_eq!(report.count("visible"), Some(11));
}

#[tokio::test]
async fn nearby_without_indicator_waits_the_fallback_delay() {
    let Some((playwright, mut config, base_url)) = common::setup("food_nearby").await else {
        return;
    };
    config.waits.nearby_fallback_ms = 600;
    let (signal, visible) =
        BrowserSession::scoped(&playwright, &base_url, &ListingPage::food(), &config, |s| {
            async move {
                scenarios::baseline(s).await?;
                let mut sequence = NearbySequence::new();
                sequence.set_location(s, Geolocation::HITEC_CITY).await?;
                let signal = sequence.find_nearby(s).await?;
                assert!(sequence.is_ready());
                Ok::<_, HarnessError>((signal, current_cards(s).await?.len()))
            }
            .boxed_local()
        })
        .await
        .expect("food page nearby sequence failed");

    assert_eq!(signal, ReadySignal::FallbackDelay(Duration::from_millis(600)));
    assert_eq!(visible, 11);
}
