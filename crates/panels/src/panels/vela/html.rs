//! Vela page scraping.
//!
//! The panel has no JSON listing endpoint; playlists are read off the
//! authenticated device page's HTML table. Rows without the expected column
//! markers are skipped rather than erroring: the page legitimately renders
//! with zero entries.

use std::sync::LazyLock;

use panel_types::{EntryId, PlaylistEntry};
use regex::Regex;
use tracing::debug;

use crate::error::PanelError;

/// Marker present only on the authenticated device page.
pub const AUTH_MARKER: &str = "Mac Address :";

static TBODY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tbody[^>]*>(.*?)</tbody>").unwrap());

static ROW_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        // The id/protection/type attributes all live on the row's action
        // button, so the optional type scan must not escape the tag.
        r#"(?is)<tr[^>]*>\s*<td[^>]*class="text-center"[^>]*>([^<]+)</td>\s*<td[^>]*class="text-center"[^>]*>(.*?)</td>\s*<td[^>]*class="text-center"[^>]*>.*?data-current_id="([^"]+)"[^>]*data-protected="([^"]+)"(?:[^>]*data-playlist_type="([^"]*)")?"#,
    )
    .unwrap()
});

/// Is this the authenticated device page (as opposed to the login form the
/// panel serves on the same path when the session is dead)?
pub fn is_authenticated_page(html: &str) -> bool {
    html.contains(AUTH_MARKER) && html.contains("Device Key :")
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Parse the playlist table out of the device page.
///
/// Fails when the page is not an authenticated device page at all; an
/// authenticated page without table rows parses to an empty list.
pub fn parse_entries(html: &str) -> Result<Vec<PlaylistEntry>, PanelError> {
    if !is_authenticated_page(html) {
        return Err(PanelError::MalformedResponse(
            "device page markers missing; session not authenticated".into(),
        ));
    }

    let Some(tbody) = TBODY_REGEX.captures(html).and_then(|c| c.get(1)) else {
        debug!("No tbody on device page; treating as zero entries");
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for caps in ROW_REGEX.captures_iter(tbody.as_str()) {
        let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        let url = caps
            .get(2)
            .map(|m| decode_entities(m.as_str().trim()))
            .unwrap_or_default();
        let Some(id) = caps.get(3).map(|m| m.as_str().trim()) else {
            continue;
        };
        let protected = caps.get(4).map(|m| m.as_str() == "1").unwrap_or(false);
        let kind = caps
            .get(5)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .unwrap_or("general");

        entries.push(PlaylistEntry {
            id: EntryId::text(id),
            name: name.to_string(),
            url,
            kind: kind.to_string(),
            protected,
            pin: String::new(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_HEAD: &str = "<html><body>Mac Address : 00:1a:79:aa:bb:cc  Device Key : 123456  Expiry date : 2027-01-01";

    fn row(name: &str, url: &str, id: &str, protected: &str, kind: Option<&str>) -> String {
        let kind_attr = kind
            .map(|k| format!(" data-playlist_type=\"{k}\""))
            .unwrap_or_default();
        format!(
            "<tr><td class=\"text-center\">{name}</td><td class=\"text-center\">{url}</td><td class=\"text-center\"><button data-current_id=\"{id}\" data-protected=\"{protected}\"{kind_attr}>edit</button></td></tr>"
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            "{PAGE_HEAD}<table class=\"table\"><tbody>{}</tbody></table></body></html>",
            rows.join("")
        )
    }

    #[test]
    fn parses_rows_with_all_fields() {
        let html = page(&[
            row("main", "http://cdn.example.com/get.php?u=1&amp;p=2", "77", "1", Some("m3u")),
            row("backup", "https://alt.example.com/x", "78", "0", None),
        ]);
        let entries = parse_entries(&html).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, EntryId::text("77"));
        assert_eq!(entries[0].url, "http://cdn.example.com/get.php?u=1&p=2");
        assert!(entries[0].protected);
        assert_eq!(entries[0].kind, "m3u");
        assert_eq!(entries[1].kind, "general");
        assert!(!entries[1].protected);
    }

    #[test]
    fn empty_tbody_is_zero_entries_not_an_error() {
        let html = page(&[]);
        assert!(parse_entries(&html).unwrap().is_empty());
    }

    #[test]
    fn missing_tbody_is_zero_entries() {
        let html = format!("{PAGE_HEAD}<p>no playlists yet</p></body></html>");
        assert!(parse_entries(&html).unwrap().is_empty());
    }

    #[test]
    fn rows_without_markers_are_skipped() {
        let html = page(&[
            "<tr><td>malformed row</td></tr>".to_string(),
            row("ok", "http://h/x", "9", "0", None),
        ]);
        let entries = parse_entries(&html).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ok");
    }

    #[test]
    fn login_page_is_rejected() {
        let html = "<html><h1><span>Manage</span> Your playlist</h1></html>";
        assert!(matches!(
            parse_entries(html),
            Err(PanelError::MalformedResponse(_))
        ));
    }

    #[test]
    fn authenticated_marker_detection() {
        assert!(is_authenticated_page(PAGE_HEAD));
        assert!(!is_authenticated_page("<html>please log in</html>"));
    }
}
