//! Target catalog: the set of named points polled each cycle.
//!
//! Either the built-in monitoring list or a `City,Lat,Lon` CSV file. The file
//! is re-read at the start of every cycle, so edits take effect on the next
//! cycle rather than mid-batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while resolving the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog unavailable: cannot read {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Catalog unavailable: {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },
}

/// A named geographic point to poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Target {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// Where the targets for a cycle come from.
#[derive(Debug, Clone)]
pub enum TargetCatalog {
    Static(Vec<Target>),
    File(PathBuf),
}

impl TargetCatalog {
    /// Pick the catalog from configuration: a file if one is given, otherwise
    /// the built-in monitoring list.
    pub fn from_config(targets_file: Option<&Path>) -> Self {
        match targets_file {
            Some(path) => TargetCatalog::File(path.to_path_buf()),
            None => TargetCatalog::Static(builtin_targets()),
        }
    }

    /// Resolve the ordered target list for one cycle.
    pub fn resolve(&self) -> Result<Vec<Target>, CatalogError> {
        match self {
            TargetCatalog::Static(targets) => Ok(targets.clone()),
            TargetCatalog::File(path) => load_targets_from_file(path),
        }
    }
}

/// Default monitoring nodes.
pub fn builtin_targets() -> Vec<Target> {
    vec![
        Target::new("Sudan (Khartoum)", 15.5007, 32.5599),
        Target::new("New Delhi (India)", 28.6139, 77.2090),
        Target::new("London (UK)", 51.5074, -0.1278),
        Target::new("Beijing (China)", 39.9042, 116.4074),
        Target::new("Dubai (UAE)", 25.276987, 55.296249),
        Target::new("Ukraine (Kyiv)", 50.4501, 30.5234),
    ]
}

/// Load targets from a CSV file with at least `City`, `Lat` and `Lon` columns.
///
/// Rows whose coordinates do not parse are skipped with a warning, and a
/// repeated city name keeps its first occurrence. Coordinates are not
/// range-checked here: out-of-range points are reported per target by the
/// fetcher.
pub fn load_targets_from_file(path: &Path) -> Result<Vec<Target>, CatalogError> {
    let unavailable = |source: csv::Error| CatalogError::Unavailable {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(unavailable)?;

    let headers = reader.headers().map_err(unavailable)?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| CatalogError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let city_idx = column("City")?;
    let lat_idx = column("Lat")?;
    let lon_idx = column("Lon")?;

    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for (row, record) in reader.records().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = row + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Catalog {}: skipping unreadable line {}: {}", path.display(), line, e);
                continue;
            }
        };

        let name = record.get(city_idx).unwrap_or_default();
        if name.is_empty() {
            tracing::warn!("Catalog {}: skipping line {} with empty City", path.display(), line);
            continue;
        }

        let coords = (
            record.get(lat_idx).and_then(|v| v.parse::<f64>().ok()),
            record.get(lon_idx).and_then(|v| v.parse::<f64>().ok()),
        );
        let (Some(latitude), Some(longitude)) = coords else {
            tracing::warn!(
                "Catalog {}: skipping '{}' on line {}: unparsable coordinates",
                path.display(),
                name,
                line
            );
            continue;
        };

        if !seen.insert(name.to_string()) {
            tracing::warn!(
                "Catalog {}: duplicate target '{}' on line {}, keeping the first",
                path.display(),
                name,
                line
            );
            continue;
        }

        targets.push(Target::new(name, latitude, longitude));
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_catalog(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_builtin_targets() {
        let targets = builtin_targets();
        assert_eq!(targets.len(), 6);
        assert_eq!(targets[0].name, "Sudan (Khartoum)");
        assert_eq!(targets[2], Target::new("London (UK)", 51.5074, -0.1278));
    }

    #[test]
    fn test_static_catalog_preserves_order() {
        let catalog = TargetCatalog::Static(vec![
            Target::new("B", 1.0, 1.0),
            Target::new("A", 2.0, 2.0),
        ]);
        let names: Vec<String> = catalog.resolve().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_from_config_without_file_uses_builtin() {
        let catalog = TargetCatalog::from_config(None);
        assert_eq!(catalog.resolve().unwrap(), builtin_targets());
    }

    #[test]
    fn test_load_targets_from_file() {
        let file = write_catalog(
            "City,Lat,Lon,Population\n\
             Cairo,30.0444,31.2357,9500000\n\
             Tokyo (Japan), 35.6762 , 139.6503,37000000\n",
        );
        let targets = load_targets_from_file(file.path()).unwrap();
        assert_eq!(
            targets,
            vec![
                Target::new("Cairo", 30.0444, 31.2357),
                Target::new("Tokyo (Japan)", 35.6762, 139.6503),
            ]
        );
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let file = write_catalog("Lon,City,Lat\n-0.1278,London,51.5074\n");
        let targets = load_targets_from_file(file.path()).unwrap();
        assert_eq!(targets, vec![Target::new("London", 51.5074, -0.1278)]);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let file = write_catalog(
            "City,Lat,Lon\n\
             Nowhere,north,east\n\
             ,1.0,2.0\n\
             Riyadh,24.7136,46.6753\n",
        );
        let targets = load_targets_from_file(file.path()).unwrap();
        assert_eq!(targets, vec![Target::new("Riyadh", 24.7136, 46.6753)]);
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let file = write_catalog("City,Lat,Lon\nRome,41.9028,12.4964\nRome,0.0,0.0\n");
        let targets = load_targets_from_file(file.path()).unwrap();
        assert_eq!(targets, vec![Target::new("Rome", 41.9028, 12.4964)]);
    }

    #[test]
    fn test_out_of_range_coordinates_are_kept() {
        let file = write_catalog("City,Lat,Lon\nMars,123.0,400.0\n");
        let targets = load_targets_from_file(file.path()).unwrap();
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn test_header_only_file_is_empty_catalog() {
        let file = write_catalog("City,Lat,Lon\n");
        assert!(load_targets_from_file(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_column_is_unavailable() {
        let file = write_catalog("City,Latitude,Longitude\nCairo,30.0,31.2\n");
        let err = load_targets_from_file(file.path()).unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn { ref column, .. } if column == "Lat"));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = TargetCatalog::File(dir.path().join("absent.csv"));
        let err = catalog.resolve().unwrap_err();
        assert!(matches!(err, CatalogError::Unavailable { .. }));
    }
}
