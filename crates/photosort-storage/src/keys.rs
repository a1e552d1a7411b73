//! Composite key construction.
//!
//! Record keys are `"{project}|{path}"`. The separator never appears in
//! project names (validated by the CLI); paths may contain it, so parsing
//! splits on the first separator only.

/// Build a record key.
pub fn record_key(project: &str, path: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(project.len() + 1 + path.len());
    key.extend_from_slice(project.as_bytes());
    key.push(b'|');
    key.extend_from_slice(path.as_bytes());
    key
}

/// The scan prefix covering every record of a project.
pub fn record_prefix(project: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(project.len() + 1);
    prefix.extend_from_slice(project.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Split a record key into `(project, path)`.
///
/// Returns `None` for keys without a separator or with non-UTF-8 parts.
pub fn parse_record_key(key: &[u8]) -> Option<(String, String)> {
    let sep = key.iter().position(|&b| b == b'|')?;
    let project = std::str::from_utf8(&key[..sep]).ok()?;
    let path = std::str::from_utf8(&key[sep + 1..]).ok()?;
    Some((project.to_string(), path.to_string()))
}
