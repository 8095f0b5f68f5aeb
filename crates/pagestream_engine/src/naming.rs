use uuid::Uuid;

/// Deterministic artifact id for a URL: UUIDv5 in the DNS namespace.
///
/// The same URL always maps to the same id, so a re-run overwrites its previous artifact.
pub fn stable_id(url: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, url.as_bytes())
        .hyphenated()
        .to_string()
}

/// Host (and port) of the URL, empty when it has none or does not parse.
pub fn domain(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        },
        Err(_) => String::new(),
    }
}

/// `{id}.{extension}`
pub fn artifact_file_name(id: &str, extension: &str) -> String {
    format!("{id}.{extension}")
}
