//! Decisions behind in-app navigation, kept free of DOM types so they can be tested natively.

use url::Url;

/// Everything about an anchor click the interception rule looks at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClickContext {
    /// `MouseEvent.button`; only 0 (primary) is intercepted.
    pub button: i16,
    pub default_prevented: bool,
    /// Any of ctrl/meta/shift/alt held.
    pub modifier: bool,
    /// `target` attribute of the anchor.
    pub target: Option<String>,
    pub download: bool,
    /// `rel~="external"` or `data-external`.
    pub external: bool,
    /// `data-router-ignore`.
    pub opted_out: bool,
    pub href: Option<String>,
}

/// In-app location (`path?query#fragment`) to push for a click, or `None` to let the browser
/// handle it.
///
/// `current_href` is the full URL of the page the click happened on.
pub fn intercept_target(ctx: &ClickContext, current_href: &str) -> Option<String> {
    if ctx.button != 0 || ctx.default_prevented || ctx.modifier {
        return None;
    }
    if ctx.download || ctx.external || ctx.opted_out {
        return None;
    }
    if let Some(target) = ctx.target.as_deref().map(str::trim) {
        if !target.is_empty() && !target.eq_ignore_ascii_case("_self") {
            return None;
        }
    }

    let href = ctx.href.as_deref()?.trim();
    if href.is_empty() {
        return None;
    }

    // `href="#/news"` is a legacy in-app link, not an in-page anchor.
    if let Some(path) = legacy_fragment_path(href) {
        return Some(path);
    }

    let base = Url::parse(current_href).ok()?;
    let dest = base.join(href).ok()?;

    if !matches!(dest.scheme(), "http" | "https") {
        return None;
    }
    if dest.origin() != base.origin() {
        return None;
    }

    // Same document, only the fragment differs: plain anchor scroll.
    if dest.fragment().is_some() && dest.path() == base.path() && dest.query() == base.query() {
        return None;
    }

    Some(location_string(&dest))
}

/// `#/path?x` (or `#!/path`) -> `/path?x`. Anything else is an ordinary fragment.
pub fn legacy_fragment_path(hash: &str) -> Option<String> {
    let rest = hash.strip_prefix('#')?;
    let rest = rest.strip_prefix('!').unwrap_or(rest);
    if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}

fn location_string(url: &Url) -> String {
    let mut out = url.path().to_string();
    if let Some(q) = url.query() {
        out.push('?');
        out.push_str(q);
    }
    if let Some(f) = url.fragment() {
        out.push('#');
        out.push_str(f);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HERE: &str = "https://duma.example.gov/news/15?lang=ru";

    fn click(href: &str) -> ClickContext {
        ClickContext {
            href: Some(href.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_in_app_link_is_intercepted() {
        assert_eq!(
            intercept_target(&click("/documents/42"), HERE),
            Some("/documents/42".to_string())
        );
    }

    #[test]
    fn test_same_origin_absolute_and_relative_links() {
        assert_eq!(
            intercept_target(&click("https://duma.example.gov/deputies?page=2"), HERE),
            Some("/deputies?page=2".to_string())
        );
        assert_eq!(
            intercept_target(&click("16"), HERE),
            Some("/news/16".to_string())
        );
        assert_eq!(
            intercept_target(&click("../events/"), HERE),
            Some("/events/".to_string())
        );
        assert_eq!(
            intercept_target(&click("?lang=en"), HERE),
            Some("/news/15?lang=en".to_string())
        );
    }

    #[test]
    fn test_cross_origin_and_non_http_links_are_left_alone() {
        assert_eq!(intercept_target(&click("https://gosuslugi.example/"), HERE), None);
        assert_eq!(intercept_target(&click("//cdn.example.gov/x.pdf"), HERE), None);
        assert_eq!(intercept_target(&click("http://duma.example.gov/news"), HERE), None);
        assert_eq!(intercept_target(&click("mailto:info@example.gov"), HERE), None);
        assert_eq!(intercept_target(&click("tel:+70000000000"), HERE), None);
    }

    #[test]
    fn test_opt_outs() {
        let base = click("/documents/42");
        let cases = [
            ClickContext { button: 1, ..base.clone() },
            ClickContext { default_prevented: true, ..base.clone() },
            ClickContext { modifier: true, ..base.clone() },
            ClickContext { target: Some("_blank".to_string()), ..base.clone() },
            ClickContext { download: true, ..base.clone() },
            ClickContext { external: true, ..base.clone() },
            ClickContext { opted_out: true, ..base.clone() },
            ClickContext { href: None, ..base.clone() },
        ];
        for ctx in cases {
            assert_eq!(intercept_target(&ctx, HERE), None, "{ctx:?}");
        }

        let self_target = ClickContext { target: Some("_self".to_string()), ..base };
        assert_eq!(
            intercept_target(&self_target, HERE),
            Some("/documents/42".to_string())
        );
    }

    #[test]
    fn test_fragment_only_links_scroll_in_page() {
        assert_eq!(intercept_target(&click("#comments"), HERE), None);
        assert_eq!(
            intercept_target(&click("/documents/42#p3"), HERE),
            Some("/documents/42#p3".to_string())
        );
    }

    #[test]
    fn test_legacy_fragment_links() {
        assert_eq!(
            intercept_target(&click("#/committees/3"), HERE),
            Some("/committees/3".to_string())
        );
        assert_eq!(legacy_fragment_path("#/"), Some("/".to_string()));
        assert_eq!(legacy_fragment_path("#!/news?x=1"), Some("/news?x=1".to_string()));
        assert_eq!(legacy_fragment_path("#top"), None);
        assert_eq!(legacy_fragment_path("/news"), None);
        assert_eq!(legacy_fragment_path(""), None);
    }
}
