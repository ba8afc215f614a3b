//! Destination path derivation and duplicate-name resolution.
//!
//! Every destination handed out by a [`PathPlanner`] is registered in its
//! [`DestinationIndex`], so no two moves of one plan can target the same
//! path, and nothing planned overwrites a file that already existed when the
//! scan ran.

use crate::classifier::Classifier;
use crate::date_resolver::DateBucket;
use crate::plan::SortMode;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

/// Longest absolute destination path, in characters, that will be planned.
pub const MAX_PATH_LEN: usize = 260;

/// Destinations already taken, in the plan being built or on disk.
#[derive(Debug, Default)]
pub struct DestinationIndex {
    claimed: HashSet<PathBuf>,
    probe_disk: bool,
}

impl DestinationIndex {
    /// An index that also treats anything present on disk as claimed.
    pub fn new() -> Self {
        Self {
            claimed: HashSet::new(),
            probe_disk: true,
        }
    }

    /// An index that only knows about explicit claims.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, path: &Path) -> bool {
        self.claimed.contains(path) || (self.probe_disk && fs::symlink_metadata(path).is_ok())
    }

    /// Registers `path`. Returns false if it was already registered.
    pub fn claim(&mut self, path: PathBuf) -> bool {
        self.claimed.insert(path)
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// A planned destination exceeded [`MAX_PATH_LEN`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTooLong {
    pub path: PathBuf,
    pub len: usize,
}

/// Computes non-colliding destinations below a root.
pub struct PathPlanner<'a> {
    root: PathBuf,
    classifier: &'a Classifier,
    index: DestinationIndex,
    max_path_len: usize,
}

impl<'a> PathPlanner<'a> {
    pub fn new(root: &Path, classifier: &'a Classifier, index: DestinationIndex) -> Self {
        Self {
            root: root.to_path_buf(),
            classifier,
            index,
            max_path_len: MAX_PATH_LEN,
        }
    }

    pub fn with_max_path_len(mut self, max_path_len: usize) -> Self {
        self.max_path_len = max_path_len;
        self
    }

    /// Plans the destination of one file and claims it.
    ///
    /// The folder part depends on `mode`: `{category}`, `{year}/{month}` or
    /// `{category}/{year}/{month}`. An `Unknown` bucket contributes a single
    /// `Unknown` folder instead of a year and month.
    ///
    /// # Errors
    ///
    /// Returns [`PathTooLong`] if the first free destination is longer than
    /// the configured limit; nothing is claimed in that case.
    pub fn plan_file(
        &mut self,
        file_name: &OsStr,
        category: &str,
        bucket: DateBucket,
        mode: SortMode,
    ) -> Result<PathBuf, PathTooLong> {
        let mut folder = self.root.clone();
        if mode.uses_category() {
            folder.push(category);
        }
        if mode.uses_date() {
            for segment in bucket.segments() {
                folder.push(segment);
            }
        }

        let classifier = self.classifier;
        let (stem, ext) = split_os_name(file_name, |name| classifier.split_extension(name));
        self.claim_first_free(&folder, &stem, ext.as_deref())
    }

    /// Plans the destination of a whole folder moved as one unit.
    ///
    /// Folder names are never split at a dot; numbering goes at the end.
    pub fn plan_folder(
        &mut self,
        folder_name: &OsStr,
        bucket: DateBucket,
    ) -> Result<PathBuf, PathTooLong> {
        let mut parent = self.root.clone();
        for segment in bucket.segments() {
            parent.push(segment);
        }
        self.claim_first_free(&parent, folder_name, None)
    }

    fn claim_first_free(
        &mut self,
        parent: &Path,
        stem: &OsStr,
        ext: Option<&OsStr>,
    ) -> Result<PathBuf, PathTooLong> {
        let index = &self.index;
        let candidate = first_free(parent, stem, ext, |path| index.is_claimed(path));

        let len = candidate.to_string_lossy().chars().count();
        if len > self.max_path_len {
            return Err(PathTooLong {
                path: candidate,
                len,
            });
        }

        self.index.claim(candidate.clone());
        Ok(candidate)
    }
}

/// Builds `{stem}_{counter}.{ext}`.
///
/// ```
/// use dirsort::path_planner::numbered_name;
/// use std::ffi::OsStr;
///
/// assert_eq!(numbered_name(OsStr::new("photo"), Some(OsStr::new("jpg")), 1), "photo_1.jpg");
/// assert_eq!(numbered_name(OsStr::new("Makefile"), None, 2), "Makefile_2");
/// ```
pub fn numbered_name(stem: &OsStr, ext: Option<&OsStr>, counter: usize) -> OsString {
    let mut name = stem.to_os_string();
    name.push(format!("_{}", counter));
    if let Some(ext) = ext {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Returns `path` if it is free, otherwise the first free `_1`, `_2`, …
/// variant.
///
/// `extension` is the suffix the planner split off when it numbered the
/// name (`tar.gz` for `site.tar.gz`), so later renumbering at execution or
/// restore time yields the same shape. Without one, or if the name does not
/// end in it, the number goes at the very end.
pub fn next_free_path(
    path: &Path,
    extension: Option<&str>,
    is_taken: impl Fn(&Path) -> bool,
) -> PathBuf {
    let Some(file_name) = path.file_name() else {
        return path.to_path_buf();
    };
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let (stem, ext) = split_os_name(file_name, |name| split_at_extension(name, extension));
    first_free(parent, &stem, ext.as_deref(), is_taken)
}

/// Like [`next_free_path`], but numbers at the very end of the name, the way
/// folder units are numbered.
pub fn next_free_folder_path(path: &Path, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    let Some(folder_name) = path.file_name() else {
        return path.to_path_buf();
    };
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    first_free(parent, folder_name, None, is_taken)
}

/// Splits at the last dot, ignoring a leading dot and a trailing dot.
pub fn split_last_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < file_name.len() => {
            (&file_name[..dot], Some(&file_name[dot + 1..]))
        }
        _ => (file_name, None),
    }
}

fn split_at_extension<'n>(name: &'n str, extension: Option<&str>) -> (&'n str, Option<&'n str>) {
    let Some(ext) = extension else {
        return (name, None);
    };
    if name.len() <= ext.len() + 1 {
        return (name, None);
    }
    let dot = name.len() - ext.len() - 1;
    if name.as_bytes()[dot] == b'.' && name[dot + 1..].eq_ignore_ascii_case(ext) {
        (&name[..dot], Some(&name[dot + 1..]))
    } else {
        (name, None)
    }
}

fn split_os_name<F>(name: &OsStr, split: F) -> (OsString, Option<OsString>)
where
    F: for<'n> Fn(&'n str) -> (&'n str, Option<&'n str>),
{
    match name.to_str() {
        Some(name) => {
            let (stem, ext) = split(name);
            (OsString::from(stem), ext.map(OsString::from))
        }
        // Non-UTF-8 names are numbered at the end
        None => (name.to_os_string(), None),
    }
}

fn first_free(
    parent: &Path,
    stem: &OsStr,
    ext: Option<&OsStr>,
    is_taken: impl Fn(&Path) -> bool,
) -> PathBuf {
    let mut original = stem.to_os_string();
    if let Some(ext) = ext {
        original.push(".");
        original.push(ext);
    }

    let candidate = parent.join(&original);
    if !is_taken(&candidate) {
        return candidate;
    }

    let mut counter = 1;
    loop {
        let candidate = parent.join(numbered_name(stem, ext, counter));
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;

    fn dated(year: i32, month: u32) -> DateBucket {
        DateBucket::Dated { year, month }
    }

    #[test]
    fn test_plan_by_type() {
        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(Path::new("/data"), &classifier, DestinationIndex::in_memory());

        let dest = planner
            .plan_file(OsStr::new("a.png"), "Images", dated(2024, 3), SortMode::ByType)
            .unwrap();
        assert_eq!(dest, PathBuf::from("/data/Images/a.png"));
    }

    #[test]
    fn test_plan_by_date() {
        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(Path::new("/data"), &classifier, DestinationIndex::in_memory());

        let dest = planner
            .plan_file(OsStr::new("a.png"), "Images", dated(2024, 3), SortMode::ByDate)
            .unwrap();
        assert_eq!(dest, PathBuf::from("/data/2024/03-March/a.png"));
    }

    #[test]
    fn test_plan_by_both() {
        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(Path::new("/data"), &classifier, DestinationIndex::in_memory());

        let dest = planner
            .plan_file(OsStr::new("a.png"), "Images", dated(2024, 3), SortMode::ByBoth)
            .unwrap();
        assert_eq!(dest, PathBuf::from("/data/Images/2024/03-March/a.png"));
    }

    #[test]
    fn test_unknown_bucket() {
        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(Path::new("/data"), &classifier, DestinationIndex::in_memory());

        let by_date = planner
            .plan_file(OsStr::new("a.png"), "Images", DateBucket::Unknown, SortMode::ByDate)
            .unwrap();
        let by_both = planner
            .plan_file(OsStr::new("b.png"), "Images", DateBucket::Unknown, SortMode::ByBoth)
            .unwrap();
        assert_eq!(by_date, PathBuf::from("/data/Unknown/a.png"));
        assert_eq!(by_both, PathBuf::from("/data/Images/Unknown/b.png"));
    }

    #[test]
    fn test_duplicate_names_are_numbered() {
        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(Path::new("/data"), &classifier, DestinationIndex::in_memory());

        let first = planner
            .plan_file(OsStr::new("photo.jpg"), "Images", dated(2024, 1), SortMode::ByBoth)
            .unwrap();
        let second = planner
            .plan_file(OsStr::new("photo.jpg"), "Images", dated(2024, 1), SortMode::ByBoth)
            .unwrap();
        let third = planner
            .plan_file(OsStr::new("photo.jpg"), "Images", dated(2024, 1), SortMode::ByBoth)
            .unwrap();

        assert_eq!(first.file_name().unwrap(), "photo.jpg");
        assert_eq!(second.file_name().unwrap(), "photo_1.jpg");
        assert_eq!(third.file_name().unwrap(), "photo_2.jpg");
    }

    #[test]
    fn test_numbering_keeps_compound_extension() {
        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(Path::new("/data"), &classifier, DestinationIndex::in_memory());

        planner
            .plan_file(OsStr::new("site.tar.gz"), "Archives", dated(2024, 1), SortMode::ByType)
            .unwrap();
        let second = planner
            .plan_file(OsStr::new("site.tar.gz"), "Archives", dated(2024, 1), SortMode::ByType)
            .unwrap();
        assert_eq!(second.file_name().unwrap(), "site_1.tar.gz");
    }

    #[test]
    fn test_same_name_in_different_buckets_does_not_collide() {
        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(Path::new("/data"), &classifier, DestinationIndex::in_memory());

        let a = planner
            .plan_file(OsStr::new("photo.jpg"), "Images", dated(2024, 1), SortMode::ByBoth)
            .unwrap();
        let b = planner
            .plan_file(OsStr::new("photo.jpg"), "Images", dated(2024, 2), SortMode::ByBoth)
            .unwrap();
        assert_eq!(a.file_name(), b.file_name());
        assert_ne!(a, b);
    }

    #[test]
    fn test_existing_file_on_disk_is_claimed() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Images")).unwrap();
        fs::write(root.join("Images").join("photo.jpg"), "existing").unwrap();

        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(root, &classifier, DestinationIndex::new());
        let dest = planner
            .plan_file(OsStr::new("photo.jpg"), "Images", dated(2024, 1), SortMode::ByType)
            .unwrap();
        assert_eq!(dest, root.join("Images").join("photo_1.jpg"));
    }

    #[test]
    fn test_path_too_long_is_not_claimed() {
        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(Path::new("/data"), &classifier, DestinationIndex::in_memory())
            .with_max_path_len(20);

        let long_name = "a".repeat(30) + ".txt";
        let err = planner
            .plan_file(OsStr::new(&long_name), "Documents", dated(2024, 1), SortMode::ByType)
            .unwrap_err();
        assert!(err.len > 20);

        let ok = planner
            .plan_file(OsStr::new("b.txt"), "Documents", dated(2024, 1), SortMode::ByType)
            .unwrap();
        assert_eq!(ok, PathBuf::from("/data/Documents/b.txt"));
        assert_eq!(planner.index.len(), 1);
    }

    #[test]
    fn test_plan_folder_numbers_at_end() {
        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(Path::new("/data"), &classifier, DestinationIndex::in_memory());

        let first = planner.plan_folder(OsStr::new("trip.v2"), dated(2023, 7)).unwrap();
        let second = planner.plan_folder(OsStr::new("trip.v2"), dated(2023, 7)).unwrap();
        assert_eq!(first, PathBuf::from("/data/2023/07-July/trip.v2"));
        assert_eq!(second, PathBuf::from("/data/2023/07-July/trip.v2_1"));
    }

    #[test]
    fn test_next_free_path() {
        let taken: HashSet<PathBuf> = [PathBuf::from("/d/a.txt"), PathBuf::from("/d/a_1.txt")]
            .into_iter()
            .collect();
        let free = next_free_path(Path::new("/d/a.txt"), Some("txt"), |p| taken.contains(p));
        assert_eq!(free, PathBuf::from("/d/a_2.txt"));

        let untouched = next_free_path(Path::new("/d/b.txt"), Some("txt"), |p| taken.contains(p));
        assert_eq!(untouched, PathBuf::from("/d/b.txt"));
    }

    #[test]
    fn test_next_free_path_keeps_compound_extension() {
        let taken: HashSet<PathBuf> = [PathBuf::from("/d/site.tar.gz")].into_iter().collect();
        let free = next_free_path(Path::new("/d/site.tar.gz"), Some("tar.gz"), |p| {
            taken.contains(p)
        });
        assert_eq!(free, PathBuf::from("/d/site_1.tar.gz"));
    }

    #[test]
    fn test_next_free_path_matches_planner_numbering() {
        let classifier = Classifier::default();
        let mut planner = PathPlanner::new(Path::new("/d"), &classifier, DestinationIndex::in_memory());
        planner
            .plan_file(OsStr::new("site.tar.gz"), "Archives", DateBucket::Unknown, SortMode::ByType)
            .unwrap();
        let planned = planner
            .plan_file(OsStr::new("site.tar.gz"), "Archives", DateBucket::Unknown, SortMode::ByType)
            .unwrap();

        let (_, ext) = classifier.split_extension("site.tar.gz");
        let taken = PathBuf::from("/d/Archives/site.tar.gz");
        let renumbered = next_free_path(&taken, ext, |p| p == taken.as_path());
        assert_eq!(renumbered, planned);
    }

    #[test]
    fn test_next_free_path_without_extension_numbers_at_end() {
        let taken: HashSet<PathBuf> = [PathBuf::from("/d/Makefile"), PathBuf::from("/d/x.bin")]
            .into_iter()
            .collect();
        let free = next_free_path(Path::new("/d/Makefile"), None, |p| taken.contains(p));
        assert_eq!(free, PathBuf::from("/d/Makefile_1"));

        // A recorded extension that does not match the name is ignored
        let free = next_free_path(Path::new("/d/x.bin"), Some("gz"), |p| taken.contains(p));
        assert_eq!(free, PathBuf::from("/d/x.bin_1"));
    }

    #[test]
    fn test_next_free_folder_path() {
        let taken: HashSet<PathBuf> = [PathBuf::from("/d/album.2020")].into_iter().collect();
        let free = next_free_folder_path(Path::new("/d/album.2020"), |p| taken.contains(p));
        assert_eq!(free, PathBuf::from("/d/album.2020_1"));
    }

    #[test]
    fn test_split_last_extension() {
        assert_eq!(split_last_extension("a.tar.gz"), ("a.tar", Some("gz")));
        assert_eq!(split_last_extension(".profile"), (".profile", None));
        assert_eq!(split_last_extension("dot."), ("dot.", None));
    }
}
