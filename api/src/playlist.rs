/// Wire format for the upstream channel playlist (extended M3U).
///
/// ```text
/// #EXTM3U
/// #EXTINF:-1 tvg-name="USA: NBA Boston Celtics" group-title="NBA",USA: NBA Boston Celtics
/// http://streams.example:8080/live/acct/key/10452.m3u8
/// ```
///
/// Only entries whose URL ends in a numeric stream id are kept.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub display_name: String,
    pub group: Option<String>,
    pub stream_id: u64,
    pub url: String,
}

pub fn parse_playlist(text: &str) -> Vec<PlaylistEntry> {
    let mut entries = Vec::new();
    let mut pending: Option<(String, Option<String>)> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if let Some(info) = line.strip_prefix("#EXTINF:") {
            pending = Some(parse_extinf(info));
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        // A URL line closes whatever #EXTINF preceded it.
        let Some((display_name, group)) = pending.take() else {
            continue;
        };
        if display_name.is_empty() {
            continue;
        }
        if let Some(stream_id) = trailing_stream_id(line) {
            entries.push(PlaylistEntry {
                display_name,
                group,
                stream_id,
                url: line.to_owned(),
            });
        }
    }

    entries
}

/// `.../live/acct/key/10452.m3u8?token=x` → 10452
pub fn trailing_stream_id(url: &str) -> Option<u64> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let stem = segment.split('.').next()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Split `-1 key="v",Display Name` into the display name and group-title.
fn parse_extinf(info: &str) -> (String, Option<String>) {
    let mut in_quotes = false;
    let mut split_at = None;
    for (i, c) in info.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                split_at = Some(i);
                break;
            }
            _ => {}
        }
    }

    let (attrs, name) = match split_at {
        Some(i) => (&info[..i], info[i + 1..].trim()),
        None => (info, ""),
    };

    let display_name = if name.is_empty() {
        attribute(attrs, "tvg-name").unwrap_or_default()
    } else {
        name.to_owned()
    };

    (display_name, attribute(attrs, "group-title").filter(|g| !g.is_empty()))
}

fn attribute(attrs: &str, key: &str) -> Option<String> {
    let needle = format!("{key}=\"");
    let start = attrs.find(&needle)? + needle.len();
    let len = attrs[start..].find('"')?;
    Some(attrs[start..start + len].trim().to_owned())
}
