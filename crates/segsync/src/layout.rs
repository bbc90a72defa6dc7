use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sync::SyncError;

/// Directory under the base dir holding lookup tables and profiles.
pub const PROFILES_DIR: &str = "profiles2";
/// Directory under the base dir holding live segments.
pub const SEGMENTS_DIR: &str = "segments4";
pub const SEGMENT_SUFFIX: &str = ".rd5";
pub const DELTA_SUFFIX: &str = ".df5";
pub const TEMP_SUFFIX: &str = "_tmp";
pub const DIFF_SUFFIX: &str = "_diff";

/// Normalise a caller-supplied segment name to its bare form (`E5_N45`).
///
/// Accepts names with or without the `.rd5` suffix. Rejects anything that
/// could escape the segments directory.
pub fn segment_name(raw: &str) -> Result<&str, SyncError> {
    let name = raw.strip_suffix(SEGMENT_SUFFIX).unwrap_or(raw);
    if !is_plain_file_name(name) {
        return Err(SyncError::InvalidName(raw.to_owned()));
    }
    Ok(name)
}

/// Validate a lookup or profile file name. It must stay inside `profiles2/`.
pub fn ancillary_name(raw: &str) -> Result<&str, SyncError> {
    if !is_plain_file_name(raw) {
        return Err(SyncError::InvalidName(raw.to_owned()));
    }
    Ok(raw)
}

fn is_plain_file_name(name: &str) -> bool {
    !(name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\'))
}

/// Join a base URL and a relative part with exactly one `/` between them.
pub fn join_url(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    format!("{base}/{relative}")
}

/// Append a suffix to the final path component (`x.rd5` -> `x.rd5_tmp`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// The on-disk paths involved in one segment update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPaths {
    /// Bare segment name, e.g. `E5_N45`.
    pub name: String,
    /// The committed file consumers read.
    pub live: PathBuf,
    /// Candidate replacement, promoted only after verification.
    pub temp: PathBuf,
    /// Downloaded delta, removed at the end of every attempt.
    pub delta: PathBuf,
}

/// Local storage layout rooted at a base directory.
///
/// - `base/profiles2/<file>` for lookups and profiles
/// - `base/segments4/<name>.rd5` for live segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLayout {
    base_dir: PathBuf,
}

impl LocalLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.base_dir.join(PROFILES_DIR)
    }

    pub fn segments_dir(&self) -> PathBuf {
        self.base_dir.join(SEGMENTS_DIR)
    }

    pub fn ancillary_path(&self, file_name: &str) -> PathBuf {
        self.profiles_dir().join(file_name)
    }

    pub fn segment(&self, name: &str) -> SegmentPaths {
        let live = self.segments_dir().join(format!("{name}{SEGMENT_SUFFIX}"));
        SegmentPaths {
            name: name.to_owned(),
            temp: with_suffix(&live, TEMP_SUFFIX),
            delta: with_suffix(&live, DIFF_SUFFIX),
            live,
        }
    }
}

/// Server-side object addressed by the hash of the current local file.
///
/// Only valid while the local file still hashes to `hash`; if it changes in
/// between, the server is expected to answer "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaReference {
    pub segment: String,
    pub hash: String,
}

impl DeltaReference {
    pub fn new(segment: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            hash: hash.into(),
        }
    }

    /// `diff/<name>/<hash>.df5`, relative to the segment base URL.
    pub fn relative_path(&self) -> String {
        format!("diff/{}/{}{DELTA_SUFFIX}", self.segment, self.hash)
    }
}

/// Where things live on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLayout {
    pub lookup_url: String,
    pub profiles_url: String,
    pub segment_url: String,
}

impl RemoteLayout {
    pub fn lookup(&self, file_name: &str) -> String {
        join_url(&self.lookup_url, file_name)
    }

    pub fn profile(&self, file_name: &str) -> String {
        join_url(&self.profiles_url, file_name)
    }

    pub fn segment(&self, name: &str) -> String {
        join_url(&self.segment_url, &format!("{name}{SEGMENT_SUFFIX}"))
    }

    pub fn delta(&self, reference: &DeltaReference) -> String {
        join_url(&self.segment_url, &reference.relative_path())
    }
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self {
            lookup_url: "https://brouter.de/brouter/profiles2/".into(),
            profiles_url: "https://brouter.de/brouter/profiles2/".into(),
            segment_url: "https://brouter.de/brouter/segments4/".into(),
        }
    }
}

/// The small well-known files refreshed before segments.
///
/// Lookups are always refetched; profiles only when a local copy exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncillaryFiles {
    #[serde(default)]
    pub lookups: Vec<String>,
    #[serde(default)]
    pub profiles: Vec<String>,
}

impl AncillaryFiles {
    /// Lookup names, empty entries skipped.
    pub fn lookups(&self) -> impl Iterator<Item = &str> {
        self.lookups.iter().map(String::as_str).filter(|f| !f.is_empty())
    }

    /// Profile names, empty entries skipped.
    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(String::as_str).filter(|f| !f.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_paths_use_suffixes() {
        let layout = LocalLayout::new("/data/brouter");
        let paths = layout.segment("E5_N45");

        assert_eq!(paths.name, "E5_N45");
        assert_eq!(paths.live, PathBuf::from("/data/brouter/segments4/E5_N45.rd5"));
        assert_eq!(
            paths.temp,
            PathBuf::from("/data/brouter/segments4/E5_N45.rd5_tmp")
        );
        assert_eq!(
            paths.delta,
            PathBuf::from("/data/brouter/segments4/E5_N45.rd5_diff")
        );
    }

    #[test]
    fn ancillary_files_live_in_profiles_dir() {
        let layout = LocalLayout::new("/data/brouter");
        assert_eq!(
            layout.ancillary_path("lookups.dat"),
            PathBuf::from("/data/brouter/profiles2/lookups.dat")
        );
    }

    #[test]
    fn segment_name_strips_suffix() {
        assert_eq!(segment_name("E5_N45.rd5").unwrap(), "E5_N45");
        assert_eq!(segment_name("W10_S5").unwrap(), "W10_S5");
    }

    #[test]
    fn segment_name_rejects_traversal() {
        assert!(segment_name("../etc/passwd").is_err());
        assert!(segment_name("a/b").is_err());
        assert!(segment_name("").is_err());
        assert!(segment_name(".rd5").is_err());
    }

    #[test]
    fn ancillary_name_must_be_plain() {
        assert_eq!(ancillary_name("lookups.dat").unwrap(), "lookups.dat");
        assert!(ancillary_name("../lookups.dat").is_err());
        assert!(ancillary_name("sub/trekking.brf").is_err());
    }

    #[test]
    fn join_url_inserts_single_slash() {
        assert_eq!(join_url("http://h/segments4/", "x.rd5"), "http://h/segments4/x.rd5");
        assert_eq!(join_url("http://h/segments4", "x.rd5"), "http://h/segments4/x.rd5");
        assert_eq!(join_url("http://h/segments4/", "/x.rd5"), "http://h/segments4/x.rd5");
    }

    #[test]
    fn remote_urls() {
        let remote = RemoteLayout {
            lookup_url: "http://h/profiles2".into(),
            profiles_url: "http://h/profiles2/".into(),
            segment_url: "http://h/segments4/".into(),
        };

        assert_eq!(remote.lookup("lookups.dat"), "http://h/profiles2/lookups.dat");
        assert_eq!(remote.profile("trekking.brf"), "http://h/profiles2/trekking.brf");
        assert_eq!(remote.segment("E5_N45"), "http://h/segments4/E5_N45.rd5");

        let reference = DeltaReference::new("E5_N45", "abc123");
        assert_eq!(
            remote.delta(&reference),
            "http://h/segments4/diff/E5_N45/abc123.df5"
        );
    }

    #[test]
    fn ancillary_iterators_skip_empty_names() {
        let files = AncillaryFiles {
            lookups: vec!["lookups.dat".into(), String::new()],
            profiles: vec![String::new(), "car-fast.brf".into()],
        };
        assert_eq!(files.lookups().collect::<Vec<_>>(), vec!["lookups.dat"]);
        assert_eq!(files.profiles().collect::<Vec<_>>(), vec!["car-fast.brf"]);
    }
}
