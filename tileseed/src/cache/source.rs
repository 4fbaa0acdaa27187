//! Upstream map services that render a region into a single image.

use async_trait::async_trait;
use tileseed_core::{Bounds, CacheError, Srs};

/// A service that renders the map content of `bbox` as one image of
/// `width x height` pixels.
#[async_trait]
pub trait TileSource: Send + Sync {
	async fn fetch_map(&self, bbox: &Bounds, size: (u32, u32), srs: Srs) -> Result<Vec<u8>, CacheError>;
}

/// Fetches map images from an HTTP endpoint via a URL template.
///
/// The template may use the placeholders `{bbox}` (as `minx,miny,maxx,maxy`),
/// `{width}`, `{height}` and `{srs}`, which covers WMS-style GetMap
/// endpoints:
///
/// ```
/// use tileseed::cache::HttpSource;
///
/// let source = HttpSource::new(
///     "http://localhost/service?request=GetMap&bbox={bbox}&width={width}&height={height}&srs={srs}".to_string(),
/// );
/// ```
pub struct HttpSource {
	client: reqwest::Client,
	url_template: String,
}

impl HttpSource {
	pub fn new(url_template: String) -> HttpSource {
		HttpSource {
			client: reqwest::Client::new(),
			url_template,
		}
	}

	fn build_url(&self, bbox: &Bounds, (width, height): (u32, u32), srs: Srs) -> String {
		self
			.url_template
			.replace(
				"{bbox}",
				&format!("{},{},{},{}", bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max),
			)
			.replace("{width}", &width.to_string())
			.replace("{height}", &height.to_string())
			.replace("{srs}", &srs.to_string())
	}
}

#[async_trait]
impl TileSource for HttpSource {
	async fn fetch_map(&self, bbox: &Bounds, size: (u32, u32), srs: Srs) -> Result<Vec<u8>, CacheError> {
		let url = self.build_url(bbox, size, srs);
		log::debug!("fetching {url}");

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|error| CacheError::SourceTransient(format!("{url}: {error}")))?;
		let status = response.status();
		if status.is_server_error() {
			return Err(CacheError::SourceTransient(format!("{status} from {url}")));
		}
		if !status.is_success() {
			return Err(CacheError::SourceFatal(format!("{status} from {url}")));
		}
		let body = response
			.bytes()
			.await
			.map_err(|error| CacheError::SourceTransient(format!("{url}: {error}")))?;
		Ok(body.to_vec())
	}
}
