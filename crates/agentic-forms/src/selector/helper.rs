//! Lazily loaded unique-selector helper.
//!
//! The helper is an optional strategy: it is loaded at most once per
//! [`HelperCache`], concurrent callers share the in-flight load, and a failed
//! load is retried on the next call instead of being remembered.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use regex::Regex;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::css::{escape_attr_value, escape_identifier, is_stable_class, is_stable_id};
use crate::dom::{DomHost, NodeId};

/// Knobs passed to a helper on every call.
#[derive(Debug, Clone)]
pub struct HelperOptions {
    /// Class or attribute names matching any of these are never used.
    pub blacklist: Vec<Regex>,
    /// Attribute names the helper may build `[attr="value"]` tokens from.
    pub whitelist: Vec<String>,
    /// How many ancestors may be chained above the target.
    pub max_depth: usize,
    /// Upper bound on tokens tried per level.
    pub max_candidates: usize,
}

impl Default for HelperOptions {
    fn default() -> Self {
        let blacklist = [
            r"^data-reactid$",
            r"^data-v-",
            r"^_ng",
            r"^ng-",
            r"^style$",
            r"^value$",
            r"^(css|sc|jsx|svelte|emotion)-",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("helper blacklist regex is valid"))
        .collect();

        Self {
            blacklist,
            whitelist: [
                "data-testid",
                "data-cy",
                "data-test",
                "data-automation-id",
                "name",
                "autocomplete",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_depth: 4,
            max_candidates: 8,
        }
    }
}

impl HelperOptions {
    fn blocked(&self, name: &str) -> bool {
        self.blacklist.iter().any(|re| re.is_match(name))
    }
}

/// Produces one unique selector for an element.
#[async_trait(?Send)]
pub trait SelectorHelper {
    async fn generate(
        &self,
        host: &dyn DomHost,
        target: NodeId,
        options: &HelperOptions,
    ) -> anyhow::Result<String>;
}

/// Loads a [`SelectorHelper`] on first use.
#[async_trait(?Send)]
pub trait HelperLoader {
    async fn load(&self) -> anyhow::Result<Rc<dyn SelectorHelper>>;
}

/// Memoizes the first successful helper load.
pub struct HelperCache {
    loader: Option<Rc<dyn HelperLoader>>,
    helper: OnceCell<Rc<dyn SelectorHelper>>,
    attempts: Cell<usize>,
}

impl HelperCache {
    pub fn new(loader: Rc<dyn HelperLoader>) -> Self {
        Self {
            loader: Some(loader),
            helper: OnceCell::new(),
            attempts: Cell::new(0),
        }
    }

    /// A cache that never yields a helper.
    pub fn disabled() -> Self {
        Self {
            loader: None,
            helper: OnceCell::new(),
            attempts: Cell::new(0),
        }
    }

    /// Cache backed by the built-in [`PathFinder`].
    pub fn builtin() -> Self {
        Self::new(Rc::new(PathFinderLoader))
    }

    pub fn is_loaded(&self) -> bool {
        self.helper.initialized()
    }

    /// Number of load attempts started so far.
    pub fn load_attempts(&self) -> usize {
        self.attempts.get()
    }

    pub async fn get(&self) -> anyhow::Result<Rc<dyn SelectorHelper>> {
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| anyhow!("selector helper disabled"))?;

        let helper = self
            .helper
            .get_or_try_init(|| async {
                self.attempts.set(self.attempts.get() + 1);
                debug!("Loading selector helper");
                loader.load().await.inspect_err(|e| {
                    warn!("Selector helper failed to load: {e:#}");
                })
            })
            .await?;
        Ok(Rc::clone(helper))
    }
}

/// Loader for the built-in [`PathFinder`].
pub struct PathFinderLoader;

#[async_trait(?Send)]
impl HelperLoader for PathFinderLoader {
    async fn load(&self) -> anyhow::Result<Rc<dyn SelectorHelper>> {
        Ok(Rc::new(PathFinder))
    }
}

/// Shortest unique child-combinator path, walking up from the target.
///
/// At each level the tokens for the current element are tried from most to
/// least specific; the first one that makes the whole chain match only the
/// target wins. Otherwise the token with the fewest matches is kept and the
/// walk moves to the parent.
pub struct PathFinder;

impl PathFinder {
    fn tokens(host: &dyn DomHost, node: NodeId, options: &HelperOptions) -> Vec<String> {
        let Some(tag) = host.tag_name(node) else {
            return Vec::new();
        };
        let mut tokens = Vec::new();

        if !options.blocked("id") {
            if let Some(id) = host.attribute(node, "id").filter(|id| is_stable_id(id)) {
                tokens.push(format!("#{}", escape_identifier(&id)));
            }
        }
        for name in &options.whitelist {
            if options.blocked(name) {
                continue;
            }
            if let Some(value) = host.attribute(node, name).filter(|v| !v.is_empty()) {
                tokens.push(format!("{tag}[{name}=\"{}\"]", escape_attr_value(&value)));
            }
        }
        if !options.blocked("class") {
            let classes: Vec<String> = host
                .attribute(node, "class")
                .unwrap_or_default()
                .split_whitespace()
                .filter(|c| is_stable_class(c) && !options.blocked(c))
                .map(escape_identifier)
                .collect();
            if let Some(first) = classes.first() {
                tokens.push(format!("{tag}.{first}"));
            }
            if classes.len() > 1 {
                tokens.push(format!("{tag}.{}", classes[..2].join(".")));
            }
        }
        tokens.push(tag.clone());
        if let Some(n) = nth_of_type(host, node) {
            tokens.push(format!("{tag}:nth-of-type({n})"));
        }

        tokens.truncate(options.max_candidates.max(1));
        tokens
    }
}

#[async_trait(?Send)]
impl SelectorHelper for PathFinder {
    async fn generate(
        &self,
        host: &dyn DomHost,
        target: NodeId,
        options: &HelperOptions,
    ) -> anyhow::Result<String> {
        if !host.is_connected(target) {
            bail!("target is not attached");
        }

        let mut suffix = String::new();
        let mut current = Some(target);
        let mut level = 0;

        while let Some(node) = current {
            if level > options.max_depth {
                break;
            }
            let mut narrowest: Option<(usize, String)> = None;
            for token in Self::tokens(host, node, options) {
                let selector = format!("{token}{suffix}");
                let Ok(matches) = host.query_selector_all(&selector) else {
                    continue;
                };
                if matches.len() == 1 && matches[0] == target {
                    return Ok(selector);
                }
                if matches.contains(&target)
                    && narrowest.as_ref().map_or(true, |(n, _)| matches.len() < *n)
                {
                    narrowest = Some((matches.len(), token));
                }
            }
            let (_, token) = narrowest.ok_or_else(|| anyhow!("no token matches the target"))?;
            suffix = format!(" > {token}{suffix}");
            current = host.parent_element(node);
            level += 1;
        }

        bail!("no unique selector within {} ancestors", options.max_depth)
    }
}

/// 1-based position among element siblings sharing the tag.
pub(crate) fn nth_of_type(host: &dyn DomHost, node: NodeId) -> Option<usize> {
    let tag = host.tag_name(node)?;
    let parent = host.parent_element(node)?;
    let mut n = 0;
    for sibling in host.children(parent) {
        if host.tag_name(sibling).as_deref() == Some(tag.as_str()) {
            n += 1;
            if sibling == node {
                return Some(n);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use futures::future::join_all;
    use std::time::Duration;

    struct SlowLoader {
        calls: Cell<usize>,
        fail: bool,
    }

    #[async_trait(?Send)]
    impl HelperLoader for SlowLoader {
        async fn load(&self) -> anyhow::Result<Rc<dyn SelectorHelper>> {
            self.calls.set(self.calls.get() + 1);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                bail!("helper bundle missing");
            }
            Ok(Rc::new(PathFinder))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_load() {
        let loader = Rc::new(SlowLoader {
            calls: Cell::new(0),
            fail: false,
        });
        let cache = HelperCache::new(loader.clone());

        let results = join_all((0..5).map(|_| cache.get())).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(loader.calls.get(), 1);
        assert!(cache.is_loaded());

        cache.get().await.unwrap();
        assert_eq!(loader.calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_load_is_retried() {
        let loader = Rc::new(SlowLoader {
            calls: Cell::new(0),
            fail: true,
        });
        let cache = HelperCache::new(loader.clone());

        assert!(cache.get().await.is_err());
        assert!(cache.get().await.is_err());
        assert_eq!(loader.calls.get(), 2);
        assert_eq!(cache.load_attempts(), 2);
        assert!(!cache.is_loaded());
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        assert!(HelperCache::disabled().get().await.is_err());
    }

    #[tokio::test]
    async fn test_path_finder_prefers_stable_id() {
        let doc = HtmlDocument::from_html(r#"<form><input id="email"><input id="x"></form>"#);
        let target = doc.element_by_id("email").unwrap();
        let selector = PathFinder
            .generate(&doc, target, &HelperOptions::default())
            .await
            .unwrap();
        assert_eq!(selector, "#email");
    }

    #[tokio::test]
    async fn test_path_finder_climbs_ancestors() {
        let doc = HtmlDocument::from_html(
            r#"<div class="billing"><input></div><div class="shipping"><input></div>"#,
        );
        let target = doc.query_selector_all(".shipping input").unwrap()[0];
        let selector = PathFinder
            .generate(&doc, target, &HelperOptions::default())
            .await
            .unwrap();
        assert_eq!(selector, "div.shipping > input");
        assert_eq!(doc.query_selector_all(&selector).unwrap(), vec![target]);
    }

    #[tokio::test]
    async fn test_path_finder_skips_blacklisted_classes() {
        let doc = HtmlDocument::from_html(
            r#"<p><input class="css-1a2b3c"></p><p><input class="css-9z8y7x"></p>"#,
        );
        let target = doc.query_selector_all("input").unwrap()[1];
        let selector = PathFinder
            .generate(&doc, target, &HelperOptions::default())
            .await
            .unwrap();
        assert!(!selector.contains("css-"), "{selector}");
        assert_eq!(doc.query_selector_all(&selector).unwrap(), vec![target]);
    }

    #[tokio::test]
    async fn test_path_finder_ignores_type_and_role() {
        let doc = HtmlDocument::from_html(
            r#"<div><input type="text"></div><div><input type="email" role="textbox"></div>"#,
        );
        let target = doc.query_selector_all("input").unwrap()[1];
        let selector = PathFinder
            .generate(&doc, target, &HelperOptions::default())
            .await
            .unwrap();
        assert!(!selector.contains("type=") && !selector.contains("role="), "{selector}");
        assert_eq!(doc.query_selector_all(&selector).unwrap(), vec![target]);
    }

    #[tokio::test]
    async fn test_path_finder_rejects_detached() {
        let mut doc = HtmlDocument::from_html(r#"<input id="gone">"#);
        let target = doc.element_by_id("gone").unwrap();
        doc.remove(target);
        assert!(PathFinder
            .generate(&doc, target, &HelperOptions::default())
            .await
            .is_err());
    }
}
