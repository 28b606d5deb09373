//! Tab watcher: title changes on watched pages are forwarded so the peer
//! can rename what it already captured there.

use snare_network::RuleSet;
use snare_peer::TabUpdate;

/// A `/tab-update` for this change, if the tab URL is watched.
pub fn watch(rules: &RuleSet, tab_url: &str, title: Option<&str>) -> Option<TabUpdate> {
    let title = title?;
    if !rules.watches_tab(tab_url) {
        return None;
    }
    Some(TabUpdate {
        tab_url: tab_url.to_string(),
        tab_title: title.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use snare_network::RuleSource;

    fn rules() -> RuleSet {
        RuleSet::compile(&RuleSource {
            tab_watchers: vec!["youtube.com/watch".into()],
            ..Default::default()
        })
    }

    #[test]
    fn test_watched_title_change() {
        let update = watch(&rules(), "https://www.youtube.com/watch?v=1", Some("New")).unwrap();
        assert_eq!(update.tab_title, "New");
        assert_eq!(update.tab_url, "https://www.youtube.com/watch?v=1");
    }

    #[test]
    fn test_unwatched_or_no_title() {
        assert!(watch(&rules(), "https://example.com/", Some("New")).is_none());
        assert!(watch(&rules(), "https://www.youtube.com/watch?v=1", None).is_none());
        assert!(watch(&RuleSet::empty(), "https://www.youtube.com/watch?v=1", Some("x")).is_none());
    }
}
