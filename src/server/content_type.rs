/// `Content-Type` for a served path, from a fixed suffix table.
pub fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".html") || path.ends_with(".xhtml") {
        "text/html; charset=utf-8"
    } else if path.ends_with(".css") {
        "text/css"
    } else if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".js") {
        "application/javascript"
    } else {
        "text/plain"
    }
}
