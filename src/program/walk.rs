//
//  walk.rs
//  routegraph
//
//  Created by hak (tharun)
//

use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;

/// Directories that are never analysed, even without .gitignore.
pub const BUILTIN_IGNORE: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    ".git",
    ".svn",
    ".hg",
    ".next",
    ".nuxt",
    ".output",
    ".turbo",
    ".wrangler",
    ".cache",
    "coverage",
];

/// Whether `path` passes through a built-in or configured ignored directory
/// below `base`. Components of `base` itself are not checked.
pub fn is_ignored(path: &Path, base: &Path, extra: &[String]) -> bool {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_str().unwrap_or("");
            BUILTIN_IGNORE.contains(&name) || extra.iter().any(|e| e == name)
        }
        _ => false,
    })
}

/// Whether `path` has one of the analysed extensions.
pub fn has_source_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e == ext))
}

/// All analysable files under `locations`, sorted and de-duplicated.
///
/// Respects .gitignore and a `.routegraphignore` file.
pub fn source_files(locations: &[PathBuf], extensions: &[String], ignore: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = locations
        .iter()
        .flat_map(|location| {
            WalkBuilder::new(location)
                .hidden(true)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .add_custom_ignore_filename(".routegraphignore")
                .build()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
                .filter(|entry| !is_ignored(entry.path(), location, ignore))
                .filter(|entry| has_source_extension(entry.path(), extensions))
                .map(|entry| entry.into_path())
        })
        .collect();
    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["ts".to_string(), "js".to_string()]
    }

    #[test]
    fn test_source_files_skips_ignored_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/routes")).unwrap();
        fs::create_dir_all(root.join("node_modules/hono")).unwrap();
        fs::create_dir_all(root.join("generated")).unwrap();
        fs::write(root.join("src/index.ts"), "").unwrap();
        fs::write(root.join("src/routes/users.ts"), "").unwrap();
        fs::write(root.join("src/readme.md"), "").unwrap();
        fs::write(root.join("node_modules/hono/index.js"), "").unwrap();
        fs::write(root.join("generated/api.ts"), "").unwrap();

        let files = source_files(&[root.to_path_buf()], &exts(), &["generated".to_string()]);
        let rel: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["src/index.ts", "src/routes/users.ts"]);
    }

    #[test]
    fn test_is_ignored() {
        let base = Path::new("/p");
        assert!(is_ignored(Path::new("/p/node_modules/x.ts"), base, &[]));
        assert!(is_ignored(Path::new("/p/tmp/x.ts"), base, &["tmp".to_string()]));
        assert!(!is_ignored(Path::new("/p/src/x.ts"), base, &[]));
        assert!(!is_ignored(Path::new("/build/app/src/x.ts"), Path::new("/build/app"), &[]));
        assert!(is_ignored(Path::new("/build/app/dist/x.ts"), Path::new("/build/app"), &[]));
    }

    #[test]
    fn test_project_under_ignored_ancestor() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("build/app/src");
        fs::create_dir_all(src.join("dist")).unwrap();
        fs::write(src.join("index.ts"), "").unwrap();
        fs::write(src.join("dist/bundle.js"), "").unwrap();

        let files = source_files(&[src.clone()], &exts(), &[]);
        assert_eq!(files, vec![src.join("index.ts")]);
    }
}
