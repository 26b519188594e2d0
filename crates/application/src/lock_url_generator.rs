use plangate_core::{AppError, AppResult};
use plangate_domain::LockKey;
use url::Url;
use url::form_urlencoded::byte_serialize;

/// Builds links to the lock page of the server.
#[derive(Debug, Clone)]
pub struct LockUrlGenerator {
    base_url: String,
}

impl LockUrlGenerator {
    /// Creates a generator for one absolute base URL.
    pub fn new(base_url: &str) -> AppResult<Self> {
        let parsed = Url::parse(base_url).map_err(|error| {
            AppError::Validation(format!("invalid base url '{base_url}': {error}"))
        })?;

        if parsed.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "base url '{base_url}' cannot carry a path"
            )));
        }

        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_owned(),
        })
    }

    /// Returns `{base_url}/lock?id={query-escaped key}`.
    #[must_use]
    pub fn generate(&self, key: &LockKey) -> String {
        let escaped: String = byte_serialize(key.as_str().as_bytes()).collect();
        format!("{}/lock?id={escaped}", self.base_url)
    }
}
