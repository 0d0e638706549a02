use super::RequestsLoggingLevel;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Width in pixels of the thumbnails served from the cache.
    pub thumbnail_width: u32,
    pub content_cache_age_sec: usize,
    pub frontend_dir_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 8080,
            thumbnail_width: 400,
            content_cache_age_sec: 3600,
            frontend_dir_path: None,
        }
    }
}
