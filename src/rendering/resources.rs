use crate::prelude::{Arc, HashMap, HashSet};
use image::RgbaImage;

/// Decoded image shared between the cache, painters and tiles
pub type ImageHandle = Arc<RgbaImage>;

/// Kind of scalable image a url points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvgKind {
    /// A `.svg` file
    File,
    /// An inline `data:image/svg+xml` url
    DataUri,
}

/// Detect whether `url` refers to an SVG image
pub fn svg_kind(url: &str) -> Option<SvgKind> {
    if url.starts_with("data:image/svg+xml") {
        return Some(SvgKind::DataUri);
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path.rsplit_once('.').map(|(_, ext)| ext);
    match extension {
        Some(ext) if ext.eq_ignore_ascii_case("svg") => Some(SvgKind::File),
        _ => None,
    }
}

/// A resource request: url plus the pixel size the caller wants it at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ResourceKey {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_size(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            width: Some(width),
            height: Some(height),
        }
    }

    /// Key used to deduplicate fetches: url and requested size together
    pub fn composite(&self) -> String {
        let dim = |d: Option<u32>| d.map(|v| v.to_string()).unwrap_or_default();
        format!("{}-{}-{}", self.url, dim(self.width), dim(self.height))
    }

    pub fn is_valid(&self) -> bool {
        !self.url.is_empty()
    }

    pub fn svg_kind(&self) -> Option<SvgKind> {
        svg_kind(&self.url)
    }
}

impl From<&str> for ResourceKey {
    fn from(url: &str) -> Self {
        ResourceKey::new(url)
    }
}

/// A loaded resource; never modified after insertion
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub image: ImageHandle,
    pub width: u32,
    pub height: u32,
}

/// Loaded images of one renderer, plus the urls that failed permanently.
///
/// Entries never expire; the owning renderer drops the whole cache when its
/// layer is removed. A url is either loaded or errored, never both.
#[derive(Debug, Default, Clone)]
pub struct ResourceCache {
    resources: HashMap<String, ResourceEntry>,
    errors: HashSet<String>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `image` under `key`, replacing any previous entry or error marker
    pub fn add_resource(&mut self, key: &ResourceKey, image: ImageHandle) {
        if !key.is_valid() {
            #[cfg(feature = "debug")]
            log::debug!("ignoring resource with an empty url");
            return;
        }
        let entry = ResourceEntry {
            width: key.width.unwrap_or_else(|| image.width()),
            height: key.height.unwrap_or_else(|| image.height()),
            image,
        };
        self.errors.remove(&key.url);
        self.resources.insert(key.url.clone(), entry);
    }

    /// True when the key is cached or has permanently failed.
    ///
    /// With `strict`, a cached SVG smaller than the requested size does not
    /// count, so the caller reloads it at the larger size.
    pub fn is_resource_loaded(&self, key: &ResourceKey, strict: bool) -> bool {
        if !key.is_valid() {
            return false;
        }
        if self.errors.contains(&key.url) {
            return true;
        }
        let Some(entry) = self.resources.get(&key.url) else {
            return false;
        };
        if strict && key.svg_kind().is_some() {
            let too_narrow = key.width.is_some_and(|w| w > entry.width);
            let too_short = key.height.is_some_and(|h| h > entry.height);
            if too_narrow || too_short {
                return false;
            }
        }
        true
    }

    /// The cached image, or `None` when missing or errored
    pub fn get_image(&self, key: &ResourceKey) -> Option<ImageHandle> {
        if self.errors.contains(&key.url) {
            return None;
        }
        self.resources.get(&key.url).map(|entry| entry.image.clone())
    }

    pub fn entry(&self, key: &ResourceKey) -> Option<&ResourceEntry> {
        self.resources.get(&key.url)
    }

    /// Record a permanent failure so the key is never fetched again
    pub fn mark_error_resource(&mut self, key: &ResourceKey) {
        if !key.is_valid() {
            return;
        }
        self.resources.remove(&key.url);
        self.errors.insert(key.url.clone());
    }

    pub fn is_errored(&self, key: &ResourceKey) -> bool {
        self.errors.contains(&key.url)
    }

    /// Copy every resource of `other` into this cache; `other` wins on conflicts
    pub fn merge(&mut self, other: &ResourceCache) -> &mut Self {
        for (url, entry) in &other.resources {
            let key = ResourceKey::with_size(url.clone(), entry.width, entry.height);
            self.add_resource(&key, entry.image.clone());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(w: u32, h: u32, shade: u8) -> ImageHandle {
        Arc::new(RgbaImage::from_pixel(w, h, image::Rgba([shade, shade, shade, 255])))
    }

    #[test]
    fn test_error_marker_is_permanent() {
        let mut cache = ResourceCache::new();
        let key = ResourceKey::new("missing.png");

        cache.mark_error_resource(&key);

        assert!(cache.is_resource_loaded(&key, false));
        assert!(cache.is_resource_loaded(&key, true));
        assert!(cache.get_image(&key).is_none());
        assert_eq!(cache.error_count(), 1);
    }

    #[test]
    fn test_loaded_and_errored_are_exclusive() {
        let mut cache = ResourceCache::new();
        let key = ResourceKey::new("icon.png");

        cache.add_resource(&key, image(2, 2, 10));
        cache.mark_error_resource(&key);
        assert!(cache.get_image(&key).is_none());
        assert!(cache.is_empty());

        cache.add_resource(&key, image(2, 2, 10));
        assert!(!cache.is_errored(&key));
        assert!(cache.get_image(&key).is_some());
    }

    #[test]
    fn test_strict_check_rejects_small_svg() {
        let mut cache = ResourceCache::new();
        cache.add_resource(&ResourceKey::with_size("marker.svg", 20, 20), image(20, 20, 0));

        let larger = ResourceKey::with_size("marker.svg", 40, 40);
        assert!(cache.is_resource_loaded(&larger, false));
        assert!(!cache.is_resource_loaded(&larger, true));

        let smaller = ResourceKey::with_size("marker.svg", 10, 10);
        assert!(cache.is_resource_loaded(&smaller, true));
    }

    #[test]
    fn test_strict_check_ignores_raster_size() {
        let mut cache = ResourceCache::new();
        cache.add_resource(&ResourceKey::with_size("marker.png", 20, 20), image(20, 20, 0));
        assert!(cache.is_resource_loaded(&ResourceKey::with_size("marker.png", 40, 40), true));
    }

    #[test]
    fn test_merge_is_additive_and_last_writer_wins() {
        let mut a = ResourceCache::new();
        let mut b = ResourceCache::new();
        let only_a = ResourceKey::new("a.png");
        let only_b = ResourceKey::new("b.png");
        let shared = ResourceKey::new("shared.png");

        a.add_resource(&only_a, image(1, 1, 1));
        a.add_resource(&shared, image(1, 1, 2));
        b.add_resource(&only_b, image(1, 1, 3));
        let b_shared = image(1, 1, 4);
        b.add_resource(&shared, b_shared.clone());

        a.merge(&b);

        assert_eq!(a.len(), 3);
        assert!(a.get_image(&only_a).is_some());
        assert!(a.get_image(&only_b).is_some());
        assert!(Arc::ptr_eq(&a.get_image(&shared).unwrap(), &b_shared));
    }

    #[test]
    fn test_empty_url_is_never_loaded() {
        let mut cache = ResourceCache::new();
        let key = ResourceKey::new("");
        cache.add_resource(&key, image(1, 1, 0));
        cache.mark_error_resource(&key);
        assert!(!cache.is_resource_loaded(&key, false));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_svg_detection_with_non_ascii_urls() {
        assert_eq!(svg_kind("tiles/地图"), None);
        assert_eq!(svg_kind("标记/图标.svg"), Some(SvgKind::File));
        assert_eq!(svg_kind("图标.svg/地图"), None);

        let mut cache = ResourceCache::new();
        let key = ResourceKey::with_size("tiles/地图", 8, 8);
        cache.add_resource(&key, image(8, 8, 0));
        assert!(cache.is_resource_loaded(&key, true));
    }

    #[test]
    fn test_svg_detection() {
        assert_eq!(svg_kind("icons/pin.svg?v=2"), Some(SvgKind::File));
        assert_eq!(svg_kind("data:image/svg+xml;base64,AAA"), Some(SvgKind::DataUri));
        assert_eq!(svg_kind("tile.png"), None);
        assert_eq!(svg_kind("ICONS/PIN.SVG"), Some(SvgKind::File));
        assert_eq!(svg_kind("svg"), None);
        assert_eq!(
            ResourceKey::with_size("a.png", 1, 2).composite(),
            "a.png-1-2"
        );
        assert_eq!(ResourceKey::new("a.png").composite(), "a.png--");
    }
}
