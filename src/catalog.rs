//! Listing-page contracts and the values the harness reads back from them.
//!
//! A [`ListingPage`] describes what the system under test promises to render: the card
//! class, the per-card sub-elements, the filter facets and the stable ids of the clear and
//! nearby controls. The harness never mutates cards; it only observes them.

use serde::Deserialize;

/// How a facet's controls are told apart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetKey {
    /// Each control carries its value in one or more `data-*` attributes
    Attributes(Vec<&'static str>),
    /// The distinguishing value only appears in the adjacent label text
    Label,
}

/// One independent filtering dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    /// Human-readable facet name used in messages
    pub name: &'static str,
    /// CSS class carried by every control of this facet
    pub class: &'static str,
    pub key: FacetKey,
}

/// Contract of one listing page of the system under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    /// Path relative to the document root
    pub path: &'static str,
    /// Fragment the document title must contain
    pub title_fragment: &'static str,
    pub card_class: &'static str,
    pub name_class: &'static str,
    pub category_class: &'static str,
    pub price_class: &'static str,
    pub distance_class: Option<&'static str>,
    pub facets: Vec<Facet>,
    /// Ids of the containers holding each facet's controls
    pub filter_sections: Vec<&'static str>,
    pub clear_control_id: &'static str,
    pub nearby_control_id: Option<&'static str>,
    pub loading_indicator_id: Option<&'static str>,
    pub results_count_id: Option<&'static str>,
    pub no_results_class: &'static str,
    /// Budget for the first cards to appear
    pub load_timeout_ms: u64,
}

impl ListingPage {
    /// Tourist places page: type, budget and distance facets
    pub fn places() -> Self {
        Self {
            path: "index.html",
            title_fragment: "City Quest",
            card_class: "destination-card",
            name_class: "destination-name",
            category_class: "place-type",
            price_class: "entry-fee",
            distance_class: Some("distance"),
            facets: vec![
                Facet {
                    name: "type",
                    class: "filter-checkbox",
                    key: FacetKey::Attributes(vec!["type"]),
                },
                Facet {
                    name: "budget",
                    class: "budget-filter-checkbox",
                    key: FacetKey::Attributes(vec!["min", "max"]),
                },
                Facet {
                    name: "distance",
                    class: "distance-filter-checkbox",
                    key: FacetKey::Attributes(vec!["min", "max"]),
                },
            ],
            filter_sections: vec![
                "filter-options",
                "budget-filter-options",
                "distance-filter-options",
            ],
            clear_control_id: "clear-filters",
            nearby_control_id: Some("find-nearby-btn"),
            loading_indicator_id: Some("loading-spinner"),
            results_count_id: None,
            no_results_class: "no-results",
            load_timeout_ms: 10_000,
        }
    }

    /// Food places page: cuisine facet plus label-matched budget ranges
    pub fn food() -> Self {
        Self {
            path: "food-places.html",
            title_fragment: "City Quest",
            card_class: "food-place-card",
            name_class: "restaurant-name",
            category_class: "place-type",
            price_class: "budget-badge",
            distance_class: None,
            facets: vec![
                Facet {
                    name: "cuisine",
                    class: "cuisine-checkbox",
                    key: FacetKey::Attributes(vec!["cuisine"]),
                },
                Facet {
                    name: "budget",
                    class: "budget-checkbox",
                    key: FacetKey::Label,
                },
            ],
            filter_sections: vec!["cuisine-filter-options", "budget-filter-options"],
            clear_control_id: "clear-filters",
            nearby_control_id: Some("show-nearby"),
            loading_indicator_id: None,
            results_count_id: Some("results-count"),
            no_results_class: "no-results",
            load_timeout_ms: 15_000,
        }
    }

    pub fn facet(&self, name: &str) -> Option<&Facet> {
        self.facets.iter().find(|f| f.name == name)
    }
}

/// A visible listing card as rendered by the page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogCard {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub distance: Option<String>,
}

/// Identifies one filter control on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTarget {
    /// Match `input.<facet_class>[data-<attr>='<value>']...` for every pair
    Attributes {
        facet_class: String,
        attrs: Vec<(String, String)>,
    },
    /// Match the first `input.<facet_class>` whose parent label contains `label`
    Label { facet_class: String, label: String },
}

impl FilterTarget {
    pub fn attribute(
        facet_class: impl Into<String>,
        attr: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Attributes {
            facet_class: facet_class.into(),
            attrs: vec![(attr.into(), value.into())],
        }
    }

    /// Add another attribute constraint; no effect on label targets
    pub fn and_attribute(mut self, attr: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Attributes { attrs, .. } = &mut self {
            attrs.push((attr.into(), value.into()));
        }
        self
    }

    pub fn label(facet_class: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Label {
            facet_class: facet_class.into(),
            label: label.into(),
        }
    }

    /// Distance range control, `[data-min][data-max]` in kilometres
    pub fn distance_range(min_km: u32, max_km: u32) -> Self {
        Self::attribute("distance-filter-checkbox", "min", min_km.to_string())
            .and_attribute("max", max_km.to_string())
    }

    pub fn facet_class(&self) -> &str {
        match self {
            Self::Attributes { facet_class, .. } | Self::Label { facet_class, .. } => facet_class,
        }
    }
}

impl std::fmt::Display for FilterTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attributes { facet_class, attrs } => {
                write!(f, "{facet_class}")?;
                for (attr, value) in attrs {
                    write!(f, "[{attr}={value}]")?;
                }
                Ok(())
            }
            Self::Label { facet_class, label } => write!(f, "{facet_class} labelled '{label}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_expose_their_facets() {
        let places = ListingPage::places();
        assert_eq!(places.facet("type").unwrap().class, "filter-checkbox");
        assert!(places.facet("cuisine").is_none());
        assert_eq!(places.filter_sections.len(), places.facets.len());

        let food = ListingPage::food();
        assert_eq!(food.facet("budget").unwrap().key, FacetKey::Label);
        assert!(food.loading_indicator_id.is_none());
    }

    #[test]
    fn distance_range_carries_both_bounds() {
        let target = FilterTarget::distance_range(10, 20);
        assert_eq!(target.facet_class(), "distance-filter-checkbox");
        assert_eq!(target.to_string(), "distance-filter-checkbox[min=10][max=20]");
    }

    #[test]
    fn and_attribute_ignores_label_targets() {
        let target =
            FilterTarget::label("budget-checkbox", "Under ₹200").and_attribute("min", "0");
        assert_eq!(target, FilterTarget::label("budget-checkbox", "Under ₹200"));
    }

    #[test]
    fn cards_decode_with_missing_optional_fields() {
        let card: CatalogCard = serde_json::from_str(r#"{"name":"Charminar"}"#).unwrap();
        assert_eq!(card.name, "Charminar");
        assert!(card.category.is_empty());
        assert!(card.distance.is_none());
    }
}
