//! Presentation glue between search outcomes and a host page or terminal.

use console::Style;

use crate::search::matcher::{ResultItem, SearchResults};
use crate::search::session::SearchOutcome;
use crate::types::Location;

/// Where activating a result should take the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    /// Page path relative to the site root.
    pub page: String,
    pub anchor: Option<String>,
    /// Link as the search page emits it, with the site base applied.
    pub href: String,
}

/// Host-side collaborator that performs navigation.
pub trait Navigator {
    fn navigate(&mut self, target: &NavigationTarget);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTarget {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedItem {
    pub text: String,
    /// Link of the first target.
    pub href: String,
    /// One entry per overload, empty for plain items.
    pub targets: Vec<RenderedTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedGroup {
    pub title: &'static str,
    pub items: Vec<RenderedItem>,
    pub truncated: usize,
}

/// Holds the results currently on screen.
#[derive(Debug, Clone)]
pub struct ResultView {
    site_base: String,
    shown: Option<SearchResults>,
}

impl ResultView {
    pub fn new(site_base: impl Into<String>) -> Self {
        Self {
            site_base: site_base.into(),
            shown: None,
        }
    }

    pub fn shown(&self) -> Option<&SearchResults> {
        self.shown.as_ref()
    }

    /// Show `outcome` if it is newer than what is on screen.
    ///
    /// Returns whether the view changed. Stale outcomes never change it.
    pub fn apply(&mut self, outcome: SearchOutcome) -> bool {
        let SearchOutcome::Results(results) = outcome else {
            return false;
        };
        if let Some(current) = &self.shown {
            if results.generation <= current.generation {
                tracing::debug!(
                    generation = results.generation,
                    shown = current.generation,
                    "ignoring out-of-order results"
                );
                return false;
            }
        }
        self.shown = Some(results);
        true
    }

    pub fn clear(&mut self) {
        self.shown = None;
    }

    pub fn href(&self, location: &Location) -> String {
        format!("{}{}", self.site_base, location)
    }

    /// Groups and items ready to display.
    pub fn render(&self) -> Vec<RenderedGroup> {
        let Some(results) = &self.shown else {
            return Vec::new();
        };
        results
            .groups
            .iter()
            .map(|group| RenderedGroup {
                title: group.group.title(),
                items: group.items.iter().map(|item| self.render_item(item)).collect(),
                truncated: group.truncated,
            })
            .collect()
    }

    fn render_item(&self, item: &ResultItem) -> RenderedItem {
        let href = item
            .targets
            .first()
            .map(|t| self.href(&t.location))
            .unwrap_or_default();
        let targets = if item.is_overload_group() {
            item.targets
                .iter()
                .map(|t| RenderedTarget {
                    text: match &item.scope {
                        Some(scope) => format!("{scope}::{}", t.label),
                        None => t.label.clone(),
                    },
                    href: self.href(&t.location),
                })
                .collect()
        } else {
            Vec::new()
        };
        RenderedItem {
            text: item.name.clone(),
            href,
            targets,
        }
    }

    /// Resolve the `target`-th location of the `item`-th displayed item
    /// (counted across groups) and hand it to `navigator`.
    pub fn activate<N: Navigator + ?Sized>(
        &self,
        item: usize,
        target: usize,
        navigator: &mut N,
    ) -> Option<NavigationTarget> {
        let results = self.shown.as_ref()?;
        let location = &results.items().nth(item)?.targets.get(target)?.location;
        let nav = NavigationTarget {
            page: location.site_page().to_string(),
            anchor: location.anchor().map(str::to_string),
            href: self.href(location),
        };
        navigator.navigate(&nav);
        Some(nav)
    }
}

/// Plain-text rendering for the terminal.
///
/// `styled` forces colors on or off regardless of terminal detection.
pub fn format_terminal(results: &SearchResults, site_base: &str, styled: bool) -> String {
    let heading = Style::new().bold().cyan().force_styling(styled);
    let name = Style::new().bold().force_styling(styled);
    let dim = Style::new().dim().force_styling(styled);
    let warn = Style::new().yellow().force_styling(styled);

    let mut out = String::new();
    if results.is_empty() {
        out.push_str(&format!("No matches for `{}`\n", results.query));
    }
    for group in &results.groups {
        out.push_str(&format!("{}\n", heading.apply_to(group.group.title())));
        for item in &group.items {
            let scope = item
                .scope
                .as_deref()
                .map(|s| format!(" {}", dim.apply_to(s)))
                .unwrap_or_default();
            if item.is_overload_group() {
                out.push_str(&format!("  {}{}\n", name.apply_to(&item.name), scope));
                for target in &item.targets {
                    out.push_str(&format!(
                        "    {}  {}{}\n",
                        target.label,
                        site_base,
                        dim.apply_to(&target.location)
                    ));
                }
            } else if let Some(target) = item.targets.first() {
                out.push_str(&format!(
                    "  {}{}  {}{}\n",
                    name.apply_to(&item.name),
                    scope,
                    site_base,
                    dim.apply_to(&target.location)
                ));
            }
        }
        if group.truncated > 0 {
            out.push_str(&format!("  {}\n", dim.apply_to(format!("... {} more", group.truncated))));
        }
    }
    if results.is_degraded() {
        let parts: Vec<String> = results.degraded.iter().map(ToString::to_string).collect();
        out.push_str(&format!(
            "{}\n",
            warn.apply_to(format!("results incomplete: partitions {} failed to load", parts.join(", ")))
        ));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
