use bytes::Bytes;
use http::header::{ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, SERVER};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use tracing::{debug, error, instrument};

use super::content_type::content_type_for;
use super::path::archive_key;
use crate::archive::ArchiveSet;
use crate::cache::ContentCache;
use crate::error::{Error, Result};

/// `Server` header sent with every response.
pub const SERVER_NAME: &str = concat!("zipdoc/", env!("CARGO_PKG_VERSION"));

const FOUND_CACHE_CONTROL: &str = "max-age=600, public";

/// A file resolved for a request.
#[derive(Debug, Clone)]
pub struct Found {
    pub key: String,
    pub data: Bytes,
    pub from_cache: bool,
}

/// Shared per-server state: the archives, the cache, and response policy.
///
/// One instance is shared by every connection.
pub struct DocService {
    archives: ArchiveSet,
    cache: ContentCache,
    expose_errors: bool,
}

impl DocService {
    pub fn new(archives: ArchiveSet, cache: ContentCache) -> Self {
        Self {
            archives,
            cache,
            expose_errors: false,
        }
    }

    /// Include error details in 500 bodies (for local debugging).
    pub fn with_error_details(mut self, expose: bool) -> Self {
        self.expose_errors = expose;
        self
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn archives(&self) -> &ArchiveSet {
        &self.archives
    }

    /// Answer one HTTP request. Never fails: errors become 4xx/5xx responses.
    #[instrument(skip_all, fields(method = %req.method(), path = %req.uri().path()))]
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        drop(req);

        match self.lookup(&method, &path).await {
            Ok(found) => {
                debug!(key = %found.key, size = found.data.len(), cached = found.from_cache, "200");
                file_response(&found)
            }
            Err(err) => self.error_response(err),
        }
    }

    /// Resolve `method path` to file contents: cache first, then the
    /// archives in order. Fresh fetches are added to the cache.
    pub async fn lookup(&self, method: &Method, path: &str) -> Result<Found> {
        if *method != Method::GET {
            return Err(Error::MethodNotAllowed(method.clone()));
        }
        let key = archive_key(path)?;

        if let Some(data) = self.cache.try_get(&key) {
            return Ok(Found {
                key,
                data,
                from_cache: true,
            });
        }

        let Some(data) = self.archives.fetch(&key).await? else {
            return Err(Error::NotFound(key));
        };
        self.cache.put(&key, data.clone());

        Ok(Found {
            key,
            data,
            from_cache: false,
        })
    }

    fn error_response(&self, err: Error) -> Response<Full<Bytes>> {
        let status = err.status();
        let detail = if status.is_client_error() {
            debug!(%status, error = %err, "rejected");
            Some(err.to_string())
        } else {
            error!(%status, error = %err, "request failed");
            self.expose_errors.then(|| err.to_string())
        };

        let mut response = error_page(status, detail.as_deref());
        if matches!(err, Error::MethodNotAllowed(_)) {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET"));
        }
        response
    }
}

fn file_response(found: &Found) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(found.data.clone()));
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&found.key)),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(found.data.len()));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(FOUND_CACHE_CONTROL));
    headers.insert(SERVER, HeaderValue::from_static(SERVER_NAME));
    response
}

fn error_page(status: StatusCode, detail: Option<&str>) -> Response<Full<Bytes>> {
    let title = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );
    let message = detail.map(escape_html).unwrap_or_default();
    let body = format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body><h1>{title}</h1><p>{message}</p></body></html>\n"
    );

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(SERVER, HeaderValue::from_static(SERVER_NAME));
    response
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
