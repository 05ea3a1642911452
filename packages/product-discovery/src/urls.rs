//! URL helpers shared by every discoverer.

use url::Url;

/// Normalize a URL for identity comparison.
///
/// Drops the query string, fragment and trailing slash. Scheme and host are
/// lowercased by the parser. Returns `None` for unparseable input.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.as_str().trim_end_matches('/').to_string())
}

/// Parse a site's base URL, assuming `https://` when no scheme is given.
pub fn parse_base_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let url = Url::parse(&with_scheme).ok()?;
    url.host_str()?;
    Some(url)
}

/// Join a path onto the site root (`/shop` → `https://host/shop`).
pub fn site_url(base: &Url, path: &str) -> Option<Url> {
    base.join(path).ok()
}

/// Whether two URLs point at the same host.
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

/// Resolve an `href` found on `page` into an absolute http(s) URL.
///
/// Anchors, `javascript:`, `mailto:` and `tel:` links resolve to `None`.
pub fn resolve_href(page: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }
    let resolved = page.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Turn the last path segment into a display name.
///
/// `/products/ethiopia-yirgacheffe_natural.html` → `Ethiopia Yirgacheffe Natural`.
pub fn title_from_slug(url: &Url) -> Option<String> {
    let segment = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()?;
    let stem = segment.split('.').next().unwrap_or(segment);

    let title = stem
        .split(|c| c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ");

    (!title.is_empty()).then_some(title)
}
