//! Filesystem walking and per-directory package classification.
//!
//! Builds the [`PackageTree`] described in the data model: one [`Entry`] per directory
//! under the scanned root, either a successfully classified [`Package`] or a [`Problem`]
//! recording why it could not be classified.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use walkdir::WalkDir;

use crate::utils::read_header;

/// Why a directory could not be classified as a single [`Package`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// A source file's header could not be read or contained no package declaration.
    Parse {
        /// Human-readable reason.
        reason: String,
    },
    /// More than one package name was declared among the directory's non-ignored files.
    MultiplePackages {
        /// The distinct package names found, sorted.
        names: Vec<String>,
    },
    /// A file imported a path with a leading `.` or `..` (other than the lone `.`).
    LocalImports {
        /// The offending import paths.
        offending: Vec<String>,
    },
    /// Two files in the directory declared different canonical-import comments.
    ConflictingCanonical {
        /// The distinct canonical comments found, sorted.
        comments: Vec<String>,
    },
    /// A file's canonical-import comment disagreed with the path's synthesized import
    /// path.
    NonCanonicalRoot {
        /// What the file's comment declared.
        declared: String,
        /// The import path implied by the file's location.
        actual: String,
    },
}

/// A successfully classified package: one Go-style package spanning a single directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// The declared package name (not necessarily the last path element).
    pub name: String,
    /// The synthesized import path (import root + directory path).
    pub import_path: String,
    /// The canonical-import comment, if any file declared one.
    pub canonical_comment: Option<String>,
    /// Import paths used by non-test files, sorted and deduplicated.
    pub imports: Vec<String>,
    /// Additional import paths used only by test files, sorted and deduplicated.
    pub test_imports: Vec<String>,
}

/// One directory's classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// The directory holds a single well-formed package.
    Package(Package),
    /// The directory could not be classified.
    Problem(Problem),
}

/// A rooted map from import path to classification, produced by [`walk`].
#[derive(Debug, Clone, Default)]
pub struct PackageTree {
    /// The logical prefix attached to the filesystem root.
    pub import_root: String,
    /// Classification results, keyed by import path.
    pub entries: BTreeMap<String, Entry>,
}

struct ParsedFile {
    package_name: String,
    canonical_comment: Option<String>,
    imports: Vec<String>,
    is_test: bool,
    has_ignore_tag: bool,
}

/// Walks `fs_root`, classifying every directory as a [`Package`] or [`Problem`] and
/// attaching `import_root` as the logical prefix.
///
/// Directories named `vendor` or `Godeps`, or beginning with `.`, are pruned before
/// descending (`filter_entry` skips reading their contents entirely).
#[must_use]
pub fn walk(fs_root: &Path, import_root: &str) -> PackageTree {
    let mut entries = BTreeMap::new();

    let walker = WalkDir::new(fs_root).into_iter().filter_entry(|entry| !is_pruned(entry.file_name().to_string_lossy().as_ref()) || entry.depth() == 0);

    let mut dirs: Vec<std::path::PathBuf> = Vec::new();
    for entry in walker.filter_map(Result::ok) {
        if entry.file_type().is_dir() {
            dirs.push(entry.path().to_path_buf());
        }
    }

    for dir in dirs {
        let relative = dir.strip_prefix(fs_root).unwrap_or(&dir);
        let import_path = join_import_path(import_root, relative);
        if let Some(mut classification) = classify_directory(&dir) {
            if let Entry::Package(package) = &mut classification {
                package.import_path = import_path.clone();
                if let Some(declared) = &package.canonical_comment {
                    if declared != &import_path {
                        classification = Entry::Problem(Problem::NonCanonicalRoot {
                            declared: declared.clone(),
                            actual: import_path.clone(),
                        });
                    }
                }
            }
            entries.insert(import_path, classification);
        }
    }

    PackageTree { import_root: import_root.to_string(), entries }
}

fn is_pruned(name: &str) -> bool {
    name == "vendor" || name == "Godeps" || name.starts_with('.')
}

fn join_import_path(import_root: &str, relative: &Path) -> String {
    let suffix = relative.to_string_lossy().replace('\\', "/");
    if suffix.is_empty() {
        import_root.to_string()
    } else {
        format!("{import_root}/{suffix}")
    }
}

fn classify_directory(dir: &Path) -> Option<Entry> {
    let go_files: Vec<std::path::PathBuf> = match std::fs::read_dir(dir) {
        Ok(read_dir) => read_dir
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "go"))
            .collect(),
        Err(_) => return None,
    };
    if go_files.is_empty() {
        return None;
    }

    let mut parsed = Vec::new();
    for file in &go_files {
        match read_header(file).ok().and_then(|header| parse_file(&header, file)) {
            Some(p) => parsed.push(p),
            None => {
                return Some(Entry::Problem(Problem::Parse {
                    reason: format!("could not find a package declaration in {}", file.display()),
                }));
            }
        }
    }

    let primary_names: Vec<&str> = parsed
        .iter()
        .filter(|p| !p.has_ignore_tag || p.package_name != "main")
        .map(|p| p.package_name.as_str())
        .collect();
    let mut distinct: Vec<&str> = primary_names.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() > 1 {
        return Some(Entry::Problem(Problem::MultiplePackages {
            names: distinct.into_iter().map(String::from).collect(),
        }));
    }
    let Some(&package_name) = distinct.first() else {
        return Some(Entry::Problem(Problem::Parse { reason: "directory has no non-ignored package files".into() }));
    };

    let mut local_imports = Vec::new();
    let mut imports = Vec::new();
    let mut test_imports = Vec::new();
    let mut canonical_comments: Vec<String> = Vec::new();

    for file in &parsed {
        for import in &file.imports {
            if is_local_import(import) {
                local_imports.push(import.clone());
            } else if file.is_test {
                test_imports.push(import.clone());
            } else {
                imports.push(import.clone());
            }
        }
        if let Some(comment) = &file.canonical_comment {
            if !canonical_comments.contains(comment) {
                canonical_comments.push(comment.clone());
            }
        }
    }

    if !local_imports.is_empty() {
        local_imports.sort();
        local_imports.dedup();
        return Some(Entry::Problem(Problem::LocalImports { offending: local_imports }));
    }
    if canonical_comments.len() > 1 {
        canonical_comments.sort();
        return Some(Entry::Problem(Problem::ConflictingCanonical { comments: canonical_comments }));
    }

    imports.sort();
    imports.dedup();
    test_imports.sort();
    test_imports.dedup();

    Some(Entry::Package(Package {
        name: package_name.to_string(),
        import_path: String::new(), // filled in by caller, which knows the directory's import path
        canonical_comment: canonical_comments.into_iter().next(),
        imports,
        test_imports,
    }))
}

fn is_local_import(path: &str) -> bool {
    path != "." && (path.starts_with("./") || path.starts_with("../") || path == "..")
}

fn parse_file(header: &str, path: &Path) -> Option<ParsedFile> {
    static PACKAGE_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    static IMPORT_LINE_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    static CANONICAL_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    static BUILD_TAG_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();

    let package_re = PACKAGE_RE.get_or_init(|| Regex::new(r"(?m)^package\s+(\w+)\s*(//\s*import\s+\"([^\"]+)\")?").unwrap());
    let import_line_re = IMPORT_LINE_RE.get_or_init(|| Regex::new(r#""([^"]+)""#).unwrap());
    let canonical_re = CANONICAL_RE.get_or_init(|| Regex::new(r#"import\s+\"([^\"]+)\""#).unwrap());
    let build_tag_re = BUILD_TAG_RE.get_or_init(|| Regex::new(r"(?m)^//\s*\+build\s+ignore|^//go:build\s+ignore").unwrap());

    let captures = package_re.captures(header)?;
    let package_name = captures.get(1)?.as_str().to_string();
    let canonical_comment = captures.get(3).map(|m| m.as_str().to_string());
    let _ = canonical_re;

    let mut imports = Vec::new();
    if let Some(import_block_start) = header.find("import") {
        for line in header[import_block_start..].lines().take(64) {
            if let Some(m) = import_line_re.captures(line) {
                imports.push(m[1].to_string());
            }
        }
    }

    let is_test = path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with("_test.go"));
    let has_ignore_tag = build_tag_re.is_match(header);

    Some(ParsedFile { package_name, canonical_comment, imports, is_test, has_ignore_tag })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn classifies_a_simple_package() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "main.go",
            "package widget\n\nimport (\n\t\"fmt\"\n\t\"example.com/other\"\n)\n",
        );
        let tree = walk(dir.path(), "example.com/widget");
        let entry = tree.entries.get("example.com/widget").unwrap();
        match entry {
            Entry::Package(p) => {
                assert_eq!(p.name, "widget");
                assert_eq!(p.imports, vec!["example.com/other".to_string(), "fmt".to_string()]);
            }
            other => panic!("expected a package, got {other:?}"),
        }
    }

    #[test]
    fn flags_local_imports() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.go", "package widget\n\nimport \"./sibling\"\n");
        let tree = walk(dir.path(), "example.com/widget");
        assert!(matches!(tree.entries.get("example.com/widget"), Some(Entry::Problem(Problem::LocalImports { .. }))));
    }

    #[test]
    fn flags_conflicting_package_names() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.go", "package widget\n");
        write(dir.path(), "b.go", "package gadget\n");
        let tree = walk(dir.path(), "example.com/widget");
        assert!(matches!(
            tree.entries.get("example.com/widget"),
            Some(Entry::Problem(Problem::MultiplePackages { .. }))
        ));
    }

    #[test]
    fn ignore_tagged_main_does_not_conflict() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "lib.go", "package widget\n");
        write(dir.path(), "gen.go", "//go:build ignore\n\npackage main\n\nimport \"os\"\n");
        let tree = walk(dir.path(), "example.com/widget");
        match tree.entries.get("example.com/widget") {
            Some(Entry::Package(p)) => assert_eq!(p.name, "widget"),
            other => panic!("expected a package, got {other:?}"),
        }
    }

    #[test]
    fn vendor_and_dot_directories_are_pruned() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.go", "package widget\n");
        let vendor = dir.path().join("vendor/dep");
        fs::create_dir_all(&vendor).unwrap();
        write(&vendor, "dep.go", "package dep\n");
        let hidden = dir.path().join(".hidden");
        fs::create_dir_all(&hidden).unwrap();
        write(&hidden, "h.go", "package hidden\n");

        let tree = walk(dir.path(), "example.com/widget");
        assert_eq!(tree.entries.len(), 1);
        assert!(tree.entries.contains_key("example.com/widget"));
    }
}
