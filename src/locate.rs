/// Ranked element lookup over an abstract page
///
/// Scraping a site we don't control means probing several selectors in order.
/// Everything selector-shaped goes through [`locate`] so the relay logic can be
/// exercised against a fake page.

/// Events the destination page's own scripts listen for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    Input,
    Change,
    KeyUp,
}

impl DomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::Change => "change",
            DomEvent::KeyUp => "keyup",
        }
    }
}

pub trait PageNode: Clone {
    fn text(&self) -> String;
    /// Live value of a form control; `None` for other elements
    fn value(&self) -> Option<String>;
    fn attr(&self, name: &str) -> Option<String>;
    fn is_checked(&self) -> bool;
    fn click(&self);
    fn focus(&self);
    fn set_value(&self, value: &str);
    fn dispatch(&self, event: DomEvent);
}

pub trait Page {
    type Node: PageNode;

    fn query_all(&self, selector: &str) -> Vec<Self::Node>;
    fn url(&self) -> String;

    fn exists(&self, selector: &str) -> bool {
        !self.query_all(selector).is_empty()
    }
}

/// One ranked way of finding an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// First element matching the selector
    Css(&'static str),
    /// Element whose text or aria-label contains one of the needles
    Text {
        selector: &'static str,
        needles: &'static [&'static str],
        ignore_case: bool,
    },
    /// Element whose attribute equals the value
    Attr {
        selector: &'static str,
        name: &'static str,
        value: &'static str,
    },
}

impl Locator {
    pub fn selector(&self) -> &'static str {
        match self {
            Locator::Css(selector) => selector,
            Locator::Text { selector, .. } => selector,
            Locator::Attr { selector, .. } => selector,
        }
    }

    fn accepts<N: PageNode>(&self, node: &N) -> bool {
        match self {
            Locator::Css(_) => true,
            Locator::Text { needles, ignore_case, .. } => {
                let haystacks = [node.text(), node.attr("aria-label").unwrap_or_default()];
                haystacks.iter().any(|hay| {
                    needles.iter().any(|needle| {
                        if *ignore_case {
                            hay.to_lowercase().contains(&needle.to_lowercase())
                        } else {
                            hay.contains(needle)
                        }
                    })
                })
            }
            Locator::Attr { name, value, .. } => node.attr(name).as_deref() == Some(*value),
        }
    }

    /// Every element this locator accepts, in document order
    pub fn find_all<P: Page>(&self, page: &P) -> Vec<P::Node> {
        page.query_all(self.selector())
            .into_iter()
            .filter(|node| self.accepts(node))
            .collect()
    }
}

/// First element found by the highest-ranked locator that finds anything
pub fn locate<P: Page>(page: &P, candidates: &[Locator]) -> Option<P::Node> {
    candidates.iter().find_map(|locator| {
        let found = locator.find_all(page).into_iter().next();
        if found.is_some() {
            log::debug!("Located element via {:?}", locator);
        }
        found
    })
}

/// Like [`locate`], but maps each candidate element and stops at the first `Some`
pub fn locate_map<P, R, F>(page: &P, candidates: &[Locator], mut f: F) -> Option<R>
where
    P: Page,
    F: FnMut(&P::Node) -> Option<R>,
{
    candidates
        .iter()
        .find_map(|locator| locator.find_all(page).iter().find_map(&mut f))
}

/// Value a scraper should read: live value, then the `value` attribute, then text
pub fn readable_text<N: PageNode>(node: &N) -> String {
    node.value()
        .filter(|v| !v.is_empty())
        .or_else(|| node.attr("value").filter(|v| !v.is_empty()))
        .unwrap_or_else(|| node.text())
}
