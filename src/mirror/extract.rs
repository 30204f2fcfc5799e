//! Extractor capability: locating the single media reference inside a fetched
//! document.
//!
//! Two source shapes are supported. HTML gallery pages are walked with an
//! ordered CSS selector rule list (most specific first, first hit wins); the
//! rule order is site behaviour and must stay reproducible, so it is data, not
//! control flow. JSON API pages are record arrays with a configurable URL
//! field.

use scraper::{Html, Selector};
use url::Url;

/// The kind of payload a reference points at. Drives the default file
/// extension and the `Sec-Fetch-Dest` hint sent with the payload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub(crate) fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Image => ".jpg",
            MediaKind::Video => ".mp4",
        }
    }

    pub(crate) fn fetch_dest(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// A resolved pointer to one remote payload plus its origin context.
/// `source_url` is always absolute; relative candidates are resolved against
/// the source base before this struct is built.
#[derive(Debug, Clone)]
pub(crate) struct MediaReference {
    source_url: String,
    kind: MediaKind,
    origin_index: u64,
    origin_document_url: String,
}

impl MediaReference {
    pub(crate) fn new(
        source_url: String,
        kind: MediaKind,
        origin_index: u64,
        origin_document_url: String,
    ) -> Self {
        MediaReference {
            source_url,
            kind,
            origin_index,
            origin_document_url,
        }
    }

    pub(crate) fn source_url(&self) -> &str {
        &self.source_url
    }

    pub(crate) fn kind(&self) -> MediaKind {
        self.kind
    }

    pub(crate) fn origin_index(&self) -> u64 {
        self.origin_index
    }

    pub(crate) fn origin_document_url(&self) -> &str {
        &self.origin_document_url
    }
}

/// Locates at most one media reference in a fetched document. Must be pure
/// with respect to pipeline state and must return absolute URLs only.
pub(crate) trait Extractor: Sync {
    fn extract(
        &self,
        document: &str,
        origin_index: u64,
        document_url: &str,
    ) -> Option<MediaReference>;
}

/// One entry of the ordered selector chain. When `embedded_url_param` is set
/// the matched attribute is an indirection (e.g. a next/image endpoint) and
/// the real path is carried in that query parameter.
pub(crate) struct SelectorRule {
    selector: Selector,
    kind: MediaKind,
    embedded_url_param: Option<String>,
}

impl SelectorRule {
    pub(crate) fn new(
        selector: &str,
        kind: MediaKind,
        embedded_url_param: Option<&str>,
    ) -> Result<Self, anyhow::Error> {
        let selector = Selector::parse(selector)
            .map_err(|e| anyhow::anyhow!("Invalid selector rule {selector:?}: {e}"))?;
        Ok(SelectorRule {
            selector,
            kind,
            embedded_url_param: embedded_url_param.map(str::to_string),
        })
    }
}

/// HTML source shape: one gallery page per index unit, probed with a fixed
/// specificity-ordered selector chain.
pub(crate) struct HtmlGalleryExtractor {
    base_url: Url,
    rules: Vec<SelectorRule>,
}

impl HtmlGalleryExtractor {
    pub(crate) fn new(base_url: &str, rules: Vec<SelectorRule>) -> Result<Self, anyhow::Error> {
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("Invalid source base URL {base_url:?}: {e}"))?;
        Ok(HtmlGalleryExtractor { base_url, rules })
    }

    /// The selector chain observed on the source site, verbatim. Image rules
    /// come first (the `src` is a next/image indirection whose `url` query
    /// parameter holds the real path), then progressively looser video rules.
    pub(crate) fn with_default_rules(base_url: &str) -> Result<Self, anyhow::Error> {
        let rules = vec![
            SelectorRule::new(
                r#"img.h-auto.w-full.rounded-xl[src*="/_next/image?url="]"#,
                MediaKind::Image,
                Some("url"),
            )?,
            SelectorRule::new(
                r#"img[data-nimg="1"][src*="/_next/image?url="]"#,
                MediaKind::Image,
                Some("url"),
            )?,
            SelectorRule::new(
                r#"img[src*="/_next/image?url="]"#,
                MediaKind::Image,
                Some("url"),
            )?,
            SelectorRule::new(
                "div.flex.flex-col.items-center.justify-center > figure > video > source[src]",
                MediaKind::Video,
                None,
            )?,
            SelectorRule::new(r#"video > source[src^="/uploads/"]"#, MediaKind::Video, None)?,
            SelectorRule::new(r#"video > source[src*=".mp4"]"#, MediaKind::Video, None)?,
            SelectorRule::new("video > source[src]", MediaKind::Video, None)?,
        ];
        Self::new(base_url, rules)
    }

    /// Resolves a matched `src` value to an absolute URL, unwrapping the
    /// embedded path first when the rule marks the attribute as an
    /// indirection.
    fn resolve_candidate(&self, raw: &str, rule: &SelectorRule) -> Option<String> {
        let candidate = match &rule.embedded_url_param {
            Some(param) => {
                let wrapper = self.base_url.join(raw).ok()?;
                let embedded = wrapper
                    .query_pairs()
                    .find(|(name, _)| name == param)
                    .map(|(_, value)| value.into_owned())?;
                if embedded.is_empty() {
                    return None;
                }
                embedded
            }
            None => raw.to_string(),
        };

        self.base_url.join(&candidate).ok().map(String::from)
    }
}

impl Extractor for HtmlGalleryExtractor {
    fn extract(
        &self,
        document: &str,
        origin_index: u64,
        document_url: &str,
    ) -> Option<MediaReference> {
        let parsed = Html::parse_document(document);

        for rule in &self.rules {
            let Some(element) = parsed.select(&rule.selector).next() else {
                continue;
            };
            let Some(raw) = element.attr("src") else {
                continue;
            };
            // A matched element whose attribute is unusable does not end the
            // chain; a looser rule may still hit.
            let Some(source_url) = self.resolve_candidate(raw, rule) else {
                continue;
            };

            return Some(MediaReference::new(
                source_url,
                rule.kind,
                origin_index,
                document_url.to_string(),
            ));
        }

        None
    }
}

/// JSON API source shape: one page is a record array (bare, or wrapped in a
/// `data` field); the first record passing the type filter with a usable URL
/// in the configured field wins. Mixed pages carry thumbnail records next to
/// the media record, so the filter matters: without it a thumbnail would be
/// returned under the wrong kind.
pub(crate) struct JsonApiExtractor {
    base_url: Url,
    url_field: String,
    record_filter: Option<(String, i64)>,
    kind: MediaKind,
}

impl JsonApiExtractor {
    pub(crate) fn new(
        base_url: &str,
        url_field: &str,
        record_filter: Option<(&str, i64)>,
        kind: MediaKind,
    ) -> Result<Self, anyhow::Error> {
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("Invalid source base URL {base_url:?}: {e}"))?;
        Ok(JsonApiExtractor {
            base_url,
            url_field: url_field.to_string(),
            record_filter: record_filter.map(|(field, value)| (field.to_string(), value)),
            kind,
        })
    }

    fn accepts(&self, record: &serde_json::Value) -> bool {
        match &self.record_filter {
            Some((field, expected)) => {
                record.get(field).and_then(|v| v.as_i64()) == Some(*expected)
            }
            None => true,
        }
    }
}

impl Extractor for JsonApiExtractor {
    fn extract(
        &self,
        document: &str,
        origin_index: u64,
        document_url: &str,
    ) -> Option<MediaReference> {
        let parsed: serde_json::Value = serde_json::from_str(document).ok()?;
        let records = match &parsed {
            serde_json::Value::Array(records) => records.as_slice(),
            serde_json::Value::Object(map) => map.get("data")?.as_array()?.as_slice(),
            _ => return None,
        };

        for record in records {
            if !self.accepts(record) {
                continue;
            }
            let Some(raw) = record.get(&self.url_field).and_then(|v| v.as_str()) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            let Ok(source_url) = self.base_url.join(raw) else {
                continue;
            };

            return Some(MediaReference::new(
                String::from(source_url),
                self.kind,
                origin_index,
                document_url.to_string(),
            ));
        }

        None
    }
}
