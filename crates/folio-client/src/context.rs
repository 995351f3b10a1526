use url::Url;

/// What the client knows about the page it is running on.
pub trait PageContext: Send + Sync {
    /// The visitor asked not to be tracked.
    fn do_not_track(&self) -> bool;
    fn href(&self) -> String;
    fn pathname(&self) -> String;
    fn title(&self) -> String;
    fn referrer(&self) -> String;
}

/// Fixed page values, for server-rendered or headless callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPageContext {
    pub href: String,
    pub pathname: String,
    pub title: String,
    pub referrer: String,
    pub do_not_track: bool,
}

impl StaticPageContext {
    /// Context for `href`, with the path taken from the URL. An unparseable
    /// `href` gets `/` as its path.
    pub fn new(href: impl Into<String>) -> Self {
        let href = href.into();
        let pathname = Url::parse(&href)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| "/".to_string());
        Self {
            href,
            pathname,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    pub fn with_do_not_track(mut self, do_not_track: bool) -> Self {
        self.do_not_track = do_not_track;
        self
    }
}

impl PageContext for StaticPageContext {
    fn do_not_track(&self) -> bool {
        self.do_not_track
    }

    fn href(&self) -> String {
        self.href.clone()
    }

    fn pathname(&self) -> String {
        self.pathname.clone()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn referrer(&self) -> String {
        self.referrer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pathname_is_derived_from_href() {
        let ctx = StaticPageContext::new("https://test.com/blog/post?x=1#top");
        assert_eq!(ctx.pathname(), "/blog/post");
        assert_eq!(ctx.href(), "https://test.com/blog/post?x=1#top");
        assert!(!ctx.do_not_track());
    }

    #[test]
    fn unparseable_href_defaults_to_root() {
        assert_eq!(StaticPageContext::new("not a url").pathname(), "/");
    }
}
