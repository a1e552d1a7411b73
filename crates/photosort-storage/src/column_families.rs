//! Column family definitions.

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Embedding records, keyed by `"{project}|{path}"`.
pub const CF_RECORDS: &str = "records";

/// Project manifests, one value per project keyed by project name.
pub const CF_MANIFESTS: &str = "manifests";

/// All column family names.
pub const CF_NAMES: [&str; 2] = [CF_RECORDS, CF_MANIFESTS];

/// Options for the records column family: prefix-scanned, point-read
/// rarely, so favor bigger blocks.
fn records_options() -> Options {
    let mut opts = Options::default();
    opts.set_prefix_extractor(rocksdb::SliceTransform::create(
        "project_prefix",
        project_prefix,
        None,
    ));
    opts
}

/// Extract the `"{project}|"` prefix for prefix bloom filters.
fn project_prefix(key: &[u8]) -> &[u8] {
    match key.iter().position(|&b| b == b'|') {
        Some(i) => &key[..=i],
        None => key,
    }
}

/// Descriptors for every column family, in a stable order.
pub fn cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_RECORDS, records_options()),
        ColumnFamilyDescriptor::new(CF_MANIFESTS, Options::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_extractor_stops_at_separator() {
        assert_eq!(project_prefix(b"proj|a/b.jpg"), b"proj|");
        assert_eq!(project_prefix(b"no-separator"), b"no-separator");
    }

    #[test]
    fn descriptors_cover_all_names() {
        assert_eq!(cf_descriptors().len(), CF_NAMES.len());
    }
}
