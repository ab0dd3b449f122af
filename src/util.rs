/// Ensures the base URL ends with exactly one `/`.
pub(crate) fn normalize_base_url(base: &str) -> String {
    format!("{}/", base.trim_end_matches('/'))
}

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}{}", normalize_base_url(base), path.trim_start_matches('/'))
}

pub(crate) fn guess_filename_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    safe_file_name(path)
}

/// Pulls a filename out of a `Content-Disposition` header value.
///
/// Only the last path component is kept, so a server cannot point the
/// download outside the target directory.
pub(crate) fn filename_from_disposition(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|part| {
        let name = part.strip_prefix("filename=")?;
        safe_file_name(name.trim_matches('"'))
    })
}

/// Final component of `name`, split on both `/` and `\`. Empty, `.` and `..`
/// are rejected.
fn safe_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    match last {
        "" | "." | ".." => None,
        _ => Some(last.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_single_trailing_slash() {
        assert_eq!(normalize_base_url("http://host"), "http://host/");
        assert_eq!(normalize_base_url("http://host/"), "http://host/");
        assert_eq!(normalize_base_url("http://host//"), "http://host/");
    }

    #[test]
    fn urljoin_with_and_without_slash() {
        assert_eq!(urljoin("http://host", "data/v1/"), "http://host/data/v1/");
        assert_eq!(urljoin("http://host/", "data/v1/"), "http://host/data/v1/");
        assert_eq!(urljoin("http://host/", "/data/v1/"), "http://host/data/v1/");
        assert_eq!(urljoin("http://host/", "https://other/x"), "https://other/x");
    }

    #[test]
    fn filename_from_url_ignores_query() {
        assert_eq!(
            guess_filename_from_url("https://dl.example/a/b/scene.tif?token=1").as_deref(),
            Some("scene.tif")
        );
        assert_eq!(guess_filename_from_url("https://dl.example/a/"), None);
    }

    #[test]
    fn filename_from_content_disposition() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="img.tif""#).as_deref(),
            Some("img.tif")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn disposition_filename_cannot_leave_directory() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="/etc/x""#).as_deref(),
            Some("x")
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="../x""#).as_deref(),
            Some("x")
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="..\\..\\x.tif""#).as_deref(),
            Some("x.tif")
        );
        assert_eq!(filename_from_disposition(r#"attachment; filename="..""#), None);
        assert_eq!(filename_from_disposition(r#"attachment; filename="a/""#), None);
    }
}
