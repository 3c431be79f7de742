/// Turns a site URL into the key used for leaderboards and subscriptions.
///
/// The scheme and one trailing slash are removed and every run of
/// characters outside `[A-Za-z0-9.]` collapses into a single `-`.
///
/// # Examples
///
/// ```
/// use webscore_common::slug::url_slug;
///
/// assert_eq!(url_slug("https://www.example.org/"), "www.example.org");
/// assert_eq!(url_slug("http://example.org/a b/c?"), "example.org-a-b-c-");
/// ```
pub fn url_slug(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let rest = rest.strip_suffix('/').unwrap_or(rest);

    let mut slug = String::with_capacity(rest.len());
    let mut in_run = false;
    for c in rest.chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            slug.push(c);
            in_run = false;
        } else if !in_run {
            slug.push('-');
            in_run = true;
        }
    }
    slug
}
