//! The HTML pages served next to the metrics endpoints.

use call_metrics_core::{
    render::SAMPLE_INTERVAL,
    SessionId,
};
use url::Url;

const INDEX: &str = include_str!("pages/index.html");
const VIDEO_CALL: &str = include_str!("pages/video_call.html");
const VIDEO_METRICS: &str = include_str!("pages/video_metrics.html");

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn index(video_calls: &[SessionId]) -> String {
    let items = video_calls
        .iter()
        .map(|id| {
            let id = escape(id.as_str());
            format!("    <li><a href=\"/videocalls/{id}/metrics\">{id}</a></li>")
        })
        .collect::<Vec<_>>()
        .join("\n");
    INDEX.replace("{{video_calls}}", &items)
}

pub fn video_metrics(log_entry: &SessionId) -> String {
    VIDEO_METRICS.replace("{{log_entry}}", &escape(log_entry.as_str()))
}

pub fn video_call(call_url: &Url, invite_url: &str, participant_id: usize) -> String {
    VIDEO_CALL
        .replace("{{call_url}}", &escape(call_url.as_str()))
        .replace("{{invite_url}}", &escape(invite_url))
        .replace("{{participant_id}}", &participant_id.to_string())
        .replace("{{sample_interval_ms}}", &(SAMPLE_INTERVAL * 1000).to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn index_links_every_call() {
        let ids = ["2024_01_01_10_00_00", "2024_01_02_10_00_00"].map(|id| SessionId::parse(id).unwrap());
        let html = index(&ids);
        assert!(html.contains("<a href=\"/videocalls/2024_01_01_10_00_00/metrics\">2024_01_01_10_00_00</a>"));
        assert!(html.contains("/videocalls/2024_01_02_10_00_00/metrics"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn call_page_escapes_substitutions() {
        let url = Url::parse("https://example.daily.co/room?a=1&b=2").unwrap();
        let html = video_call(&url, "https://calls.example.com/<videocall>", 3);
        assert!(html.contains("data-call-url=\"https://example.daily.co/room?a=1&amp;b=2\""));
        assert!(html.contains("data-participant-id=\"3\""));
        assert!(html.contains("setInterval(postStats, 15000)"));
        assert!(html.contains("https://calls.example.com/&lt;videocall&gt;"));
        assert!(!html.contains("{{"));
    }
}
