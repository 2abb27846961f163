//! Glob enumeration over the source tree.
//!
//! Patterns use gitignore syntax relative to a root directory: `*` stops at
//! `/`, `**` crosses directories and a leading `!` removes earlier matches.
//! A pattern without a slash matches a file name at any depth unless the set
//! is [anchored](PatternSet::anchored).
//!
//! Traversal is sorted by file name so enumeration order (and therefore any
//! digest computed over it) is stable for a given tree.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;
use rustc_hash::FxHashSet;

/// Compiled set of glob patterns anchored at a root directory.
#[derive(Debug, Clone)]
pub struct PatternSet {
    root: PathBuf,
    matcher: Gitignore,
    roots: Vec<PathBuf>,
    /// Walk depth per root; `None` when a `**` pattern starts there.
    depths: Vec<Option<usize>>,
}

impl PatternSet {
    /// Gitignore semantics: `*.png` matches `a.png` and `icons/b.png`.
    pub fn new(root: &Path, patterns: &[String]) -> Result<Self, ignore::Error> {
        Self::compile(root, patterns.iter().map(|p| Cow::Borrowed(p.as_str())))
    }

    /// Every pattern is relative to `root`: `*.css` matches only files
    /// directly inside it.
    pub fn anchored(root: &Path, patterns: &[String]) -> Result<Self, ignore::Error> {
        Self::compile(root, patterns.iter().map(|p| anchor(p)))
    }

    fn compile<'a>(
        root: &Path,
        patterns: impl Iterator<Item = Cow<'a, str>>,
    ) -> Result<Self, ignore::Error> {
        let mut builder = GitignoreBuilder::new(root);
        let mut roots: Vec<PathBuf> = Vec::new();
        let mut depths: Vec<Option<usize>> = Vec::new();
        for pattern in patterns {
            builder.add_line(None, &pattern)?;
            if pattern.starts_with('!') {
                continue;
            }
            let dir = root.join(static_root(&pattern));
            let depth = walk_depth(&pattern);
            match roots.iter().position(|r| *r == dir) {
                Some(i) => depths[i] = depths[i].zip(depth).map(|(a, b)| a.max(b)),
                None => {
                    roots.push(dir);
                    depths.push(depth);
                }
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            matcher: builder.build()?,
            roots,
            depths,
        })
    }

    /// Absolute directories that can contain matches, in pattern order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Whether a file path (absolute, or relative to the root) is selected.
    pub fn is_match(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.matcher.matched(relative, false).is_ignore()
    }
}

/// Prefix a pattern with `/` so gitignore matches it from the root only.
fn anchor(pattern: &str) -> Cow<'_, str> {
    let (negate, body) = match pattern.strip_prefix('!') {
        Some(body) => ("!", body),
        None => ("", pattern),
    };
    if body.starts_with('/') {
        return Cow::Borrowed(pattern);
    }
    let body = body.trim_start_matches("./");
    Cow::Owned(format!("{negate}/{body}"))
}

/// Components a walk from the static root must descend to reach a match.
fn walk_depth(pattern: &str) -> Option<usize> {
    let components: Vec<&str> = pattern
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    if components.iter().any(|c| c.contains("**")) {
        return None;
    }
    let fixed = static_root(pattern).components().count();
    Some(components.len().saturating_sub(fixed))
}

/// Leading directory components of a pattern that contain no glob syntax.
///
/// `src/js/**/*.js` gives `src/js`; `*.css` gives an empty path. A pattern
/// naming a literal file gives that file's parent.
pub fn static_root(pattern: &str) -> PathBuf {
    let pattern = pattern.trim_start_matches('/');
    let mut components: Vec<&str> = pattern.split('/').collect();
    let is_literal = |c: &&str| !c.contains(['*', '?', '[', '{']);
    if components.iter().all(is_literal) {
        components.pop();
    }
    components
        .into_iter()
        .take_while(|c| is_literal(c))
        .filter(|c| !c.is_empty() && *c != ".")
        .collect()
}

/// Enumerate files under `root` matching `patterns`, anchored at `root`.
///
/// Files are grouped by static root in pattern order, sorted within each
/// group, and never repeated. Anything under `exclude` is skipped. Missing
/// directories yield nothing.
pub fn collect_files(
    root: &Path,
    patterns: &[String],
    exclude: &Path,
) -> Result<Vec<PathBuf>, ignore::Error> {
    let set = PatternSet::anchored(root, patterns)?;
    let mut seen = FxHashSet::default();
    let mut files = Vec::new();
    for (dir, depth) in set.roots.iter().zip(&set.depths) {
        for path in walk_sorted(dir, *depth) {
            if !path.starts_with(exclude) && set.is_match(&path) && seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

/// Every regular file below `dir`, depth-first, sorted by name.
pub(crate) fn walk_sorted(dir: &Path, max_depth: Option<usize>) -> impl Iterator<Item = PathBuf> + use<> {
    let walker = dir.is_dir().then(|| {
        let walker = WalkDir::new(dir).sort(true).skip_hidden(false);
        match max_depth {
            Some(depth) => walker.max_depth(depth),
            None => walker,
        }
    });
    walker
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file.as_bytes()).unwrap();
        }
        dir
    }

    fn relative(root: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn dist(dir: &TempDir) -> PathBuf {
        dir.path().join("dist")
    }

    #[test]
    fn test_static_root() {
        assert_eq!(static_root("src/js/**/*.js"), PathBuf::from("src/js"));
        assert_eq!(static_root("*.css"), PathBuf::new());
        assert_eq!(static_root("styles/main.css"), PathBuf::from("styles"));
        assert_eq!(static_root("./lib/*.js"), PathBuf::from("lib"));
        assert_eq!(static_root("/a/{b,c}/x.js"), PathBuf::from("a"));
    }

    #[test]
    fn test_collect_sorted() {
        let dir = tree(&["js/b.js", "js/a.js", "js/sub/c.js", "js/readme.md"]);
        let files = collect_files(dir.path(), &["js/**/*.js".into()], &dist(&dir)).unwrap();
        assert_eq!(relative(dir.path(), files), ["js/a.js", "js/b.js", "js/sub/c.js"]);
    }

    #[test]
    fn test_collect_pattern_order_and_dedup() {
        let dir = tree(&["vendor/lib.js", "app/main.js"]);
        let patterns = vec!["vendor/*.js".into(), "app/*.js".into(), "vendor/lib.js".into()];
        let files = collect_files(dir.path(), &patterns, &dist(&dir)).unwrap();
        assert_eq!(relative(dir.path(), files), ["vendor/lib.js", "app/main.js"]);
    }

    #[test]
    fn test_collect_negation() {
        let dir = tree(&["css/a.css", "css/b.css"]);
        let patterns = vec!["css/*.css".into(), "!css/b.css".into()];
        let files = collect_files(dir.path(), &patterns, &dist(&dir)).unwrap();
        assert_eq!(relative(dir.path(), files), ["css/a.css"]);
    }

    #[test]
    fn test_collect_missing_dir_is_empty() {
        let dir = tree(&[]);
        let files = collect_files(dir.path(), &["nope/*.js".into()], &dist(&dir)).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_basename_pattern_matches_any_depth() {
        let dir = tree(&["img/logo.png", "img/icons/a.svg", "img/LICENSE"]);
        let set = PatternSet::new(&dir.path().join("img"), &["*.*".into()]).unwrap();
        assert!(set.is_match(&dir.path().join("img/icons/a.svg")));
        assert!(!set.is_match(&dir.path().join("img/LICENSE")));
    }

    #[test]
    fn test_slashless_pattern_stays_at_top_level() {
        let dir = tree(&["a.css", "dist/site.css", "node_modules/x/y.css", "css/b.css"]);
        let files = collect_files(dir.path(), &["*.css".into()], &dist(&dir)).unwrap();
        assert_eq!(relative(dir.path(), files), ["a.css"]);
    }

    #[test]
    fn test_output_dir_never_collected() {
        let dir = tree(&["css/a.css", "dist/site.css"]);
        let files = collect_files(dir.path(), &["**/*.css".into()], &dist(&dir)).unwrap();
        assert_eq!(relative(dir.path(), files), ["css/a.css"]);
    }

    #[test]
    fn test_anchor() {
        assert_eq!(anchor("*.css"), "/*.css");
        assert_eq!(anchor("!./b.css"), "!/b.css");
        assert_eq!(anchor("/x/*.js"), "/x/*.js");
        assert_eq!(walk_depth("*.css"), Some(1));
        assert_eq!(walk_depth("src/js/*.js"), Some(1));
        assert_eq!(walk_depth("src/*/x.js"), Some(2));
        assert_eq!(walk_depth("src/**/*.js"), None);
    }
}
