use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::constants::FILTER_FILE;
use crate::filter::DEFAULT_RULES;
use crate::helpers::atomic_file::{read_if_exists, write_if_absent};

const OVERLAY_HTML: &str = include_str!("../../assets/overlay.html");
const OVERLAY_CSS: &str = include_str!("../../assets/overlay.css");
const OVERLAY_JS: &str = include_str!("../../assets/overlay.js");
const USAGE_MD: &str = include_str!("../../assets/usage.md");

const STYLESHEET_LINK: &str = r#"<link rel="stylesheet" href="overlay.css">"#;
const SCRIPT_TAG: &str = r#"<script src="overlay.js"></script>"#;

/// Static files shipped with the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Asset {
    OverlayHtml,
    OverlayCss,
    OverlayJs,
    UsageMd,
}

impl Asset {
    pub fn file_name(&self) -> &'static str {
        match self {
            Asset::OverlayHtml => "overlay.html",
            Asset::OverlayCss => "overlay.css",
            Asset::OverlayJs => "overlay.js",
            Asset::UsageMd => "usage.md",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Asset::OverlayHtml => "text/html; charset=utf-8",
            Asset::OverlayCss => "text/css; charset=utf-8",
            Asset::OverlayJs => "text/javascript; charset=utf-8",
            Asset::UsageMd => "text/markdown; charset=utf-8",
        }
    }

    pub fn bundled(&self) -> &'static str {
        match self {
            Asset::OverlayHtml => OVERLAY_HTML,
            Asset::OverlayCss => OVERLAY_CSS,
            Asset::OverlayJs => OVERLAY_JS,
            Asset::UsageMd => USAGE_MD,
        }
    }
}

/// Replace the stylesheet link and script tag of an overlay page with inline copies
pub fn inline_page(html: &str, css: &str, js: &str) -> String {
    html.replace(STYLESHEET_LINK, &format!("<style>\n{}</style>", css))
        .replace(SCRIPT_TAG, &format!("<script>\n{}</script>", js))
}

/// Bundled assets with optional on-disk overrides from the output directory.
///
/// In single-file mode the stylesheet and script only exist inlined into the page.
#[derive(Debug, Clone)]
pub struct AssetStore {
    directory: Option<PathBuf>,
    single_file: bool,
}

impl AssetStore {
    pub fn new(directory: Option<PathBuf>, single_file: bool) -> Self {
        Self { directory, single_file }
    }

    /// Store that only ever returns the bundled copies
    pub fn bundled_only(single_file: bool) -> Self {
        Self::new(None, single_file)
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn single_file(&self) -> bool {
        self.single_file
    }

    /// Whether the asset exists as a file of its own
    pub fn is_served(&self, asset: Asset) -> bool {
        !(self.single_file && matches!(asset, Asset::OverlayCss | Asset::OverlayJs))
    }

    fn override_for(&self, asset: Asset) -> Option<String> {
        let path = self.directory.as_ref()?.join(asset.file_name());
        match read_if_exists(&path) {
            Ok(Some(data)) => Some(String::from_utf8_lossy(&data).into_owned()),
            Ok(None) => None,
            Err(e) => {
                debug!("Ignoring unreadable override {:?}: {}", path, e);
                None
            }
        }
    }

    fn raw(&self, asset: Asset) -> Cow<'static, str> {
        match self.override_for(asset) {
            Some(text) => Cow::Owned(text),
            None => Cow::Borrowed(asset.bundled()),
        }
    }

    /// Content of an asset, `None` when the asset is not served in the current mode
    pub fn get(&self, asset: Asset) -> Option<Cow<'static, str>> {
        if !self.is_served(asset) {
            return None;
        }
        if self.single_file && asset == Asset::OverlayHtml {
            let page = inline_page(
                &self.raw(Asset::OverlayHtml),
                &self.raw(Asset::OverlayCss),
                &self.raw(Asset::OverlayJs),
            );
            return Some(Cow::Owned(page));
        }
        Some(self.raw(asset))
    }

    /// Write the assets and the default filter rules into `directory` unless a copy is
    /// already present. Existing files are never touched.
    pub fn write_defaults(&self, directory: &Path) -> io::Result<Vec<PathBuf>> {
        let bundled = AssetStore::bundled_only(self.single_file);
        let mut written = Vec::new();

        for asset in Asset::iter().filter(|a| self.is_served(*a)) {
            let Some(content) = bundled.get(asset) else { continue };
            let path = directory.join(asset.file_name());
            if write_if_absent(&path, content.as_bytes())? {
                written.push(path);
            }
        }

        let rules = directory.join(FILTER_FILE);
        match write_if_absent(&rules, DEFAULT_RULES.as_bytes()) {
            Ok(true) => written.push(rules),
            Ok(false) => {}
            Err(e) => warn!("Could not write default filter rules to {:?}: {}", rules, e),
        }

        if !written.is_empty() {
            info!("Wrote {} default file(s) to {:?}", written.len(), directory);
        }
        Ok(written)
    }
}
