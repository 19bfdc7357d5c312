use std::borrow::Cow;

use crate::error::{Error, Result};

/// Served for requests to `/`.
pub const INDEX_PAGE: &str = "index.html";

/// Map a request path (query already removed) to an archive-relative key.
///
/// `/` becomes `index.html`; otherwise the single leading slash is dropped
/// and the rest percent-decoded. Keys with `..` segments or NUL bytes are
/// refused so lookups cannot climb out of an archive's prefix.
pub fn archive_key(path: &str) -> Result<String> {
    if path == "/" {
        return Ok(INDEX_PAGE.to_string());
    }

    let Some(rest) = path.strip_prefix('/') else {
        return Err(Error::BadPath(format!("{path:?} is not an absolute path")));
    };

    let decoded: Cow<'_, str> = urlencoding::decode(rest)
        .map_err(|_| Error::BadPath(format!("{path:?} does not decode to UTF-8")))?;

    if decoded.contains('\0') {
        return Err(Error::BadPath(format!("{path:?} contains a NUL byte")));
    }
    if decoded.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(Error::BadPath(format!("{path:?} contains a '..' segment")));
    }

    Ok(decoded.into_owned())
}
