//! Media event assembly: a captured request plus the tab and cookie
//! context the peer needs to fetch it again.

use crate::host::{cookie_header, Host, TabInfo};
use snare_network::CapturedRequest;
use snare_peer::MediaEvent;
use tracing::debug;

/// Look up tab and cookies, falling back to empty values.
pub async fn assemble(host: &dyn Host, captured: CapturedRequest) -> MediaEvent {
    let tab = if captured.tab_id >= 0 {
        host.get_tab(captured.tab_id).await.unwrap_or_else(|e| {
            debug!("Tab {} unavailable: {}", captured.tab_id, e);
            TabInfo::default()
        })
    } else {
        TabInfo::default()
    };

    let cookie = match host.get_cookies(&captured.url).await {
        Ok(cookies) => cookie_header(&cookies),
        Err(e) => {
            debug!("No cookies for {}: {}", captured.url, e);
            String::new()
        }
    };

    MediaEvent {
        url: captured.url,
        file: tab.title,
        request_headers: captured.request_headers,
        response_headers: captured.response_headers,
        cookie,
        method: captured.method,
        user_agent: host.user_agent(),
        tab_url: tab.url,
        tab_id: captured.tab_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use snare_network::{Headers, MatchRule};

    fn captured(tab_id: i64) -> CapturedRequest {
        CapturedRequest {
            url: "https://cdn.example/v.m3u8".into(),
            method: "GET".into(),
            tab_id,
            request_headers: [("Referer", "https://site.example/")].into_iter().collect(),
            response_headers: Headers::new(),
            rule: MatchRule::Extension,
        }
    }

    #[tokio::test]
    async fn test_assemble_with_tab() {
        let host = FakeHost::new();
        host.set_tab("Episode 1", "https://site.example/watch");
        host.set_cookies(&[("a", "1")]);

        let event = assemble(&host, captured(4)).await;

        assert_eq!(event.file, "Episode 1");
        assert_eq!(event.tab_url, "https://site.example/watch");
        assert_eq!(event.tab_id, "4");
        assert_eq!(event.cookie, "a=1");
        assert_eq!(event.user_agent, FakeHost::USER_AGENT);
        assert_eq!(event.request_headers.get("referer"), Some("https://site.example/"));
    }

    #[tokio::test]
    async fn test_closed_tab_still_delivers() {
        let host = FakeHost::new();
        host.fail_all();

        let event = assemble(&host, captured(4)).await;

        assert_eq!(event.file, "");
        assert_eq!(event.tab_url, "");
        assert_eq!(event.cookie, "");
        assert_eq!(event.url, "https://cdn.example/v.m3u8");
    }

    #[tokio::test]
    async fn test_background_request_skips_tab_lookup() {
        let host = FakeHost::new();
        let event = assemble(&host, captured(-1)).await;

        assert_eq!(event.tab_id, "-1");
        assert!(!host.calls().iter().any(|c| c.starts_with("tab:")));
    }
}
