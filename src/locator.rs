//! Semantic finders for listing cards and filter controls.
//!
//! Controls are located by CSS class plus `data-*` attributes, never by position. The
//! label-text fallback exists only for facets whose value is not exposed as an attribute
//! (budget ranges on the food page) and is the weakest lookup here.
//!
//! Every lookup retries up to the session's implicit wait before reporting `NotFound`.

use playwright_rs::Locator;
use tracing::debug;

use crate::catalog::{CatalogCard, Facet, FacetKey, FilterTarget};
use crate::error::{HarnessError, HarnessResult};
use crate::session::BrowserSession;
use crate::wait::poll_until;

/// An element resolved by one of the finders
pub struct Located {
    /// What was asked for, used in failure messages
    pub description: String,
    /// Playwright selector that resolves to the element
    pub selector: String,
    pub locator: Locator,
}

impl std::fmt::Debug for Located {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Located")
            .field("description", &self.description)
            .field("selector", &self.selector)
            .finish()
    }
}

/// Sub-elements read from each card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSelectors {
    pub card_class: String,
    pub name: String,
    pub category: Option<String>,
    pub price: Option<String>,
    pub distance: Option<String>,
}

impl CardSelectors {
    /// Only the card class is known; the name comes from the card heading
    pub fn new(card_class: impl Into<String>) -> Self {
        Self {
            card_class: card_class.into(),
            name: "h3".to_string(),
            category: None,
            price: None,
            distance: None,
        }
    }
}

impl From<&crate::catalog::ListingPage> for CardSelectors {
    fn from(page: &crate::catalog::ListingPage) -> Self {
        Self {
            card_class: page.card_class.to_string(),
            name: format!(".{}", css_ident(page.name_class)),
            category: Some(format!(".{}", css_ident(page.category_class))),
            price: Some(format!(".{}", css_ident(page.price_class))),
            distance: page.distance_class.map(|c| format!(".{}", css_ident(c))),
        }
    }
}

/// Escape a class or attribute name for use in a CSS selector
pub fn css_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, ch) in name.chars().enumerate() {
        let plain = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii();
        if plain && !(i == 0 && ch.is_ascii_digit()) {
            out.push(ch);
        } else if ch.is_ascii_digit() {
            out.push_str(&format!("\\3{ch} "));
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

/// Quote a value as a single-quoted CSS string
pub fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\a "),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Quote a value as an XPath 1.0 string literal
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// `input.<class>[data-<attr>='<value>']...`
pub fn attribute_selector(facet_class: &str, attrs: &[(String, String)]) -> String {
    let mut selector = format!("input.{}", css_ident(facet_class));
    for (attr, value) in attrs {
        selector.push_str(&format!("[data-{}={}]", css_ident(attr), css_string(value)));
    }
    selector
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn js_optional(value: Option<&String>) -> String {
    value.map_or_else(|| "null".to_string(), |v| js_string(v))
}

/// Number of elements matching `selector` right now
pub async fn count(session: &BrowserSession, selector: &str) -> HarnessResult<usize> {
    Ok(session.page().locator(selector).await.count().await?)
}

/// Retry until `selector` matches at least one element, within the implicit wait
async fn present(session: &BrowserSession, selector: &str, what: &str) -> HarnessResult<usize> {
    poll_until(
        what,
        session.implicit_wait(),
        session.waits().poll_interval(),
        || async move { count(session, selector).await.map(|n| (n > 0).then_some(n)) },
    )
    .await
    .map_err(|e| match e {
        HarnessError::Timeout { .. } => HarnessError::not_found(what),
        other => other,
    })
}

/// Resolve exactly one element matching `selector`
async fn unique(
    session: &BrowserSession,
    selector: String,
    what: String,
) -> HarnessResult<Located> {
    let n = present(session, &selector, &what).await?;
    if n > 1 {
        return Err(HarnessError::AmbiguousMatch { what, count: n });
    }
    let locator = session.page().locator(&selector).await;
    Ok(Located {
        description: what,
        selector,
        locator,
    })
}

/// The first card of `container_class` whose heading contains `name`
pub async fn find_card_by_name(
    session: &BrowserSession,
    container_class: &str,
    name: &str,
) -> HarnessResult<Located> {
    let selector = format!(
        "xpath=//*[contains(concat(' ', normalize-space(@class), ' '), {})]\
         [.//h3[contains(normalize-space(.), {})]]",
        xpath_literal(&format!(" {container_class} ")),
        xpath_literal(name),
    );
    let what = format!(".{container_class} named '{name}'");
    present(session, &selector, &what).await?;

    let selector = format!("{selector} >> nth=0");
    let locator = session.page().locator(&selector).await;
    Ok(Located {
        description: what,
        selector,
        locator,
    })
}

/// Structured data of a card resolved by [`find_card_by_name`]
pub async fn card_details(
    session: &BrowserSession,
    card: &Located,
    cards: &CardSelectors,
) -> HarnessResult<CatalogCard> {
    let text = |sub: &str| {
        let selector = format!("{} >> css={sub}", card.selector);
        async move {
            let inner = session.page().locator(&selector).await;
            if inner.count().await? == 0 {
                return Ok::<_, HarnessError>(None);
            }
            Ok(Some(inner.inner_text().await?.trim().to_string()))
        }
    };

    let name = text(&cards.name).await?.ok_or_else(|| {
        HarnessError::not_found(format!("{} inside {}", cards.name, card.description))
    })?;
    let category = match &cards.category {
        Some(sel) => text(sel).await?.unwrap_or_default(),
        None => String::new(),
    };
    let price = match &cards.price {
        Some(sel) => text(sel).await?.unwrap_or_default(),
        None => String::new(),
    };
    let distance = match &cards.distance {
        Some(sel) => text(sel).await?,
        None => None,
    };
    Ok(CatalogCard {
        name,
        category,
        price,
        distance,
    })
}

/// Block until at least one `.card_class` element exists, or fail with `Timeout`
pub async fn wait_for_cards_loaded(
    session: &BrowserSession,
    card_class: &str,
    timeout: std::time::Duration,
) -> HarnessResult<usize> {
    let selector = format!(".{}", css_ident(card_class));
    let selector = selector.as_str();
    let n = poll_until(
        selector,
        timeout,
        session.waits().poll_interval(),
        || async move { count(session, selector).await.map(|n| (n > 0).then_some(n)) },
    )
    .await?;
    debug!(card_class, present = n, "cards loaded");
    Ok(n)
}

/// Whether a card is rendered: connected, not hidden by style, and laid out
const SHOWN: &str = r#"(el) => {
    if (!el.isConnected) return false;
    const style = getComputedStyle(el);
    if (style.display === 'none') return false;
    if (style.visibility === 'hidden' || style.visibility === 'collapse') return false;
    if (typeof el.checkVisibility === 'function' && !el.checkVisibility()) return false;
    return el.getClientRects().length > 0;
  }"#;

fn visible_cards_script(cards: &CardSelectors) -> String {
    format!(
        r#"(() => {{
  const shown = {SHOWN};
  const text = (card, sel) => {{
    if (!sel) return null;
    const el = card.querySelector(sel);
    return el ? el.innerText.trim() : null;
  }};
  const cards = Array.from(document.getElementsByClassName({card}));
  return cards.filter(shown).map((card) => ({{
    name: text(card, {name}) ?? '',
    category: text(card, {category}) ?? '',
    price: text(card, {price}) ?? '',
    distance: text(card, {distance}),
  }}));
}})()"#,
        card = js_string(&cards.card_class),
        name = js_string(&cards.name),
        category = js_optional(cards.category.as_ref()),
        price = js_optional(cards.price.as_ref()),
        distance = js_optional(cards.distance.as_ref()),
    )
}

fn visible_count_script(card_class: &str) -> String {
    format!(
        r#"(() => {{
  const shown = {SHOWN};
  return Array.from(document.getElementsByClassName({card})).filter(shown).length;
}})()"#,
        card = js_string(card_class),
    )
}

/// Every card the page currently displays, in DOM order. Always re-read, never cached.
pub async fn visible_cards(
    session: &BrowserSession,
    cards: &CardSelectors,
) -> HarnessResult<Vec<CatalogCard>> {
    let visible: Vec<CatalogCard> = session
        .page()
        .evaluate::<(), _>(&visible_cards_script(cards), None)
        .await?;
    debug!(card_class = %cards.card_class, visible = visible.len(), "visible set read");
    Ok(visible)
}

/// Size of the visible set; cheaper than [`visible_cards`] for settle polling
pub async fn visible_count(session: &BrowserSession, card_class: &str) -> HarnessResult<usize> {
    // JS numbers may come back as floats
    let n: f64 = session
        .page()
        .evaluate::<(), _>(&visible_count_script(card_class), None)
        .await?;
    Ok(n as usize)
}

/// The unique control matching every `data-*` pair of `target`
pub async fn find_filter(
    session: &BrowserSession,
    target: &FilterTarget,
) -> HarnessResult<Located> {
    match target {
        FilterTarget::Attributes { facet_class, attrs } => {
            let selector = attribute_selector(facet_class, attrs);
            let what = selector.clone();
            unique(session, selector, what).await
        }
        FilterTarget::Label { facet_class, label } => {
            find_filter_control_by_label(session, facet_class, label).await
        }
    }
}

/// The unique `input.<facet_class>[data-<attr_name>='<attr_value>']`
pub async fn find_filter_control(
    session: &BrowserSession,
    facet_class: &str,
    attr_name: &str,
    attr_value: &str,
) -> HarnessResult<Located> {
    find_filter(
        session,
        &FilterTarget::attribute(facet_class, attr_name, attr_value),
    )
    .await
}

/// The first `input.<facet_class>` whose parent label text contains `label_substring`
pub async fn find_filter_control_by_label(
    session: &BrowserSession,
    facet_class: &str,
    label_substring: &str,
) -> HarnessResult<Located> {
    let candidates = format!("input.{}", css_ident(facet_class));
    let what = format!("{candidates} labelled '{label_substring}'");
    let n = present(session, &candidates, &what).await?;

    for i in 0..n {
        let label = session
            .page()
            .locator(&format!("{candidates} >> nth={i} >> xpath=.."))
            .await
            .inner_text()
            .await?;
        if label.contains(label_substring) {
            let selector = format!("{candidates} >> nth={i}");
            let locator = session.page().locator(&selector).await;
            return Ok(Located {
                description: what,
                selector,
                locator,
            });
        }
    }
    Err(HarnessError::not_found(what))
}

/// Every control of `facet` in DOM order, each as a target the finders resolve by value
pub async fn facet_targets(
    session: &BrowserSession,
    facet: &Facet,
) -> HarnessResult<Vec<FilterTarget>> {
    let controls = format!("input.{}", css_ident(facet.class));
    present(session, &controls, &format!("{} controls", facet.name)).await?;
    let targets = match &facet.key {
        FacetKey::Attributes(names) => {
            let script = format!(
                "Array.from(document.querySelectorAll({controls})).map((el) => \
                 {names}.map((name) => el.getAttribute('data-' + name)))",
                controls = js_string(&controls),
                names = serde_json::Value::from(names.clone()),
            );
            let rows: Vec<Vec<Option<String>>> =
                session.page().evaluate::<(), _>(&script, None).await?;
            attribute_targets(facet.class, names, rows)
        }
        FacetKey::Label => {
            let script = format!(
                "Array.from(document.querySelectorAll({controls})).map((el) => \
                 el.parentElement ? el.parentElement.innerText.trim() : '')",
                controls = js_string(&controls),
            );
            let labels: Vec<String> = session.page().evaluate::<(), _>(&script, None).await?;
            labels
                .into_iter()
                .filter(|label| !label.is_empty())
                .map(|label| FilterTarget::label(facet.class, label))
                .collect()
        }
    };
    if targets.is_empty() {
        return Err(HarnessError::Script(format!(
            "{controls} controls carry no usable {} values",
            facet.name
        )));
    }
    debug!(facet = facet.name, controls = targets.len(), "facet targets read");
    Ok(targets)
}

/// One target per control that carries every attribute in `names`
fn attribute_targets(
    facet_class: &str,
    names: &[&str],
    rows: Vec<Vec<Option<String>>>,
) -> Vec<FilterTarget> {
    rows.into_iter()
        .filter_map(|values| {
            let attrs = names
                .iter()
                .zip(values)
                .map(|(name, value)| value.map(|v| (name.to_string(), v)))
                .collect::<Option<Vec<_>>>()?;
            (attrs.len() == names.len()).then(|| FilterTarget::Attributes {
                facet_class: facet_class.to_string(),
                attrs,
            })
        })
        .collect()
}

/// The unique element with DOM id `id`
pub async fn find_by_id(session: &BrowserSession, id: &str) -> HarnessResult<Located> {
    let selector = format!("#{}", css_ident(id));
    let what = selector.clone();
    unique(session, selector, what).await
}

/// Whether the element with id `id` exists and is displayed; no implicit wait
pub async fn is_displayed_by_id(session: &BrowserSession, id: &str) -> HarnessResult<bool> {
    let selector = format!("#{}", css_ident(id));
    if count(session, &selector).await? == 0 {
        return Ok(false);
    }
    Ok(session.page().locator(&selector).await.is_visible().await?)
}
