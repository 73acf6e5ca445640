//! Latest-version badge rewriting.
//!
//! # Responsibilities
//! - Extract the version metadata a rendered page carries
//! - Classify the displayed version against the latest known one
//! - Substitute the badge placeholders in the page body
//!
//! Everything here is pure and synchronous; the async plumbing around it
//! lives in `latest.rs`.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::bytes::{NoExpand, Regex, RegexBuilder};

/// Replaced by the badge CSS class, e.g. `DetailsHeader-latest`.
pub const LATEST_CLASS_PLACEHOLDER: &str = "$$GODISCOVERY_LATESTCLASS$$";

/// Replaced by the latest version string (possibly empty).
pub const LATEST_VERSION_PLACEHOLDER: &str = "$$GODISCOVERY_LATESTVERSION$$";

/// Prefix of every badge class value.
pub const LATEST_CLASS_PREFIX: &str = "DetailsHeader-";

// Group 1 = version, group 2 = module path, group 3 = package path.
// Unicode mode is off so `[^"]` matches any byte, valid UTF-8 or not.
static LATEST_INFO_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r#"data-version="([^"]*)" data-mpath="([^"]*)" data-ppath="([^"]*)""#)
        .unicode(false)
        .build()
        .unwrap()
});

static LATEST_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&regex::escape(LATEST_CLASS_PLACEHOLDER)).unwrap());

static LATEST_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&regex::escape(LATEST_VERSION_PLACEHOLDER)).unwrap());

/// Version metadata embedded in a rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestInfo {
    /// Version the page displays.
    pub version: String,
    /// Module the page belongs to.
    pub module_path: String,
    /// Package (or module root) the page displays.
    pub package_path: String,
}

impl LatestInfo {
    /// Find the first metadata triple in `body`.
    ///
    /// Later occurrences are ignored.
    pub fn extract(body: &[u8]) -> Option<Self> {
        let caps = LATEST_INFO_RE.captures(body)?;
        let group = |i: usize| {
            caps.get(i)
                .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
                .unwrap_or_default()
        };
        Some(Self {
            version: group(1),
            module_path: group(2),
            package_path: group(3),
        })
    }
}

/// Relationship between the displayed version and the latest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatestClass {
    /// The latest version could not be determined.
    Unknown,
    /// The page already shows the latest version.
    Latest,
    /// A newer (or at least different) version exists.
    GoToLatest,
}

impl LatestClass {
    /// Classify `version` against the resolver's answer.
    pub fn classify(version: &str, latest_version: &str) -> Self {
        if latest_version.is_empty() {
            LatestClass::Unknown
        } else if latest_version == version {
            LatestClass::Latest
        } else {
            LatestClass::GoToLatest
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LatestClass::Unknown => "unknown",
            LatestClass::Latest => "latest",
            LatestClass::GoToLatest => "goToLatest",
        }
    }

    /// Full CSS class value substituted into the page.
    pub fn css_class(&self) -> String {
        format!("{}{}", LATEST_CLASS_PREFIX, self.as_str())
    }
}

impl fmt::Display for LatestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace every badge placeholder in `body`.
///
/// The class placeholder is replaced first, then the version placeholder.
/// Each pass scans the original text only, so substituted values are never
/// matched again.
pub fn substitute<'a>(
    body: &'a [u8],
    class: LatestClass,
    latest_version: &str,
) -> Cow<'a, [u8]> {
    let css_class = class.css_class();
    let with_class = LATEST_CLASS_RE.replace_all(body, NoExpand(css_class.as_bytes()));
    if !LATEST_VERSION_RE.is_match(&with_class) {
        return with_class;
    }
    let version = NoExpand(latest_version.as_bytes());
    Cow::Owned(LATEST_VERSION_RE.replace_all(&with_class, version).into_owned())
}
