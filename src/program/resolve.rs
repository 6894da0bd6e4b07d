//
//  resolve.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Module specifier resolution: project files first, then installed
//! packages under `node_modules`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use super::typescript::{TypeScriptProgram, COMPONENT};
use super::ResolvedModule;
use crate::graph::PackageIdentity;

/// Extensions tried, in order, for extension-less specifiers.
const JS_TS_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "d.ts", "js", "jsx", "mjs", "cjs"];

#[derive(Debug, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
}

impl TypeScriptProgram {
    pub(super) fn resolve_specifier(&self, specifier: &str, from: &Path) -> Option<ResolvedModule> {
        let specifier = specifier
            .split(['?', '#'])
            .next()
            .unwrap_or(specifier)
            .trim();
        if specifier.is_empty() {
            return None;
        }

        if is_relative(specifier) {
            let base = from.parent().unwrap_or_else(|| Path::new(""));
            let joined = if specifier.starts_with('/') {
                PathBuf::from(specifier)
            } else {
                base.join(specifier)
            };
            let resolved = self.local_candidates(&clean_path(&joined))?;
            return Some(ResolvedModule {
                is_external: false,
                resolved_file: Some(resolved),
                package_name: None,
                package_version: None,
            });
        }

        let name = package_name(specifier)?;
        let (manifest, identity) = self.find_package(&name, from)?;
        Some(ResolvedModule {
            is_external: true,
            resolved_file: Some(manifest),
            package_name: Some(identity.name),
            package_version: identity.version,
        })
    }

    fn local_candidates(&self, base: &Path) -> Option<PathBuf> {
        let exists = |p: &Path| self.has_file(p) || p.is_file();
        let raw = base.as_os_str().to_string_lossy().to_string();

        if let Some(ext) = base.extension().and_then(|e| e.to_str()) {
            if exists(base) {
                return Some(base.to_path_buf());
            }
            // `./users.js` written against `users.ts`
            let swapped: &[&str] = match ext {
                "js" | "jsx" => &["ts", "tsx"],
                "mjs" => &["mts"],
                "cjs" => &["cts"],
                _ => &[],
            };
            for candidate in swapped.iter().map(|e| base.with_extension(e)) {
                if exists(&candidate) {
                    return Some(candidate);
                }
            }
        }

        JS_TS_EXTENSIONS
            .iter()
            .map(|ext| PathBuf::from(format!("{raw}.{ext}")))
            .chain(JS_TS_EXTENSIONS.iter().map(|ext| base.join(format!("index.{ext}"))))
            .find(|candidate| exists(candidate))
    }

    /// Nearest `node_modules/<name>/package.json` above `from`.
    fn find_package(&self, name: &str, from: &Path) -> Option<(PathBuf, PackageIdentity)> {
        let mut dir = from.parent();
        while let Some(current) = dir {
            let package_dir = current.join("node_modules").join(name);
            if let Some(identity) = self.package_identity(&package_dir, name) {
                return Some((package_dir.join("package.json"), identity));
            }
            dir = current.parent();
        }
        None
    }

    fn package_identity(&self, package_dir: &Path, fallback: &str) -> Option<PackageIdentity> {
        if let Ok(cache) = self.packages.lock() {
            if let Some(cached) = cache.get(package_dir) {
                return cached.clone();
            }
        }

        let identity = fs::read_to_string(package_dir.join("package.json"))
            .ok()
            .map(|raw| match serde_json::from_str::<PackageJson>(&raw) {
                Ok(manifest) => PackageIdentity {
                    name: manifest.name.unwrap_or_else(|| fallback.to_string()),
                    version: manifest.version,
                },
                Err(e) => {
                    self.diagnostics.debug(
                        COMPONENT,
                        format!("unreadable package.json in {}: {e}", package_dir.display()),
                    );
                    PackageIdentity {
                        name: fallback.to_string(),
                        version: None,
                    }
                }
            });

        if let Ok(mut cache) = self.packages.lock() {
            cache.insert(package_dir.to_path_buf(), identity.clone());
        }
        identity
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// Package part of a bare specifier: `hono/cors` -> `hono`,
/// `@hono/zod-openapi/x` -> `@hono/zod-openapi`. Builtins have none.
pub(crate) fn package_name(specifier: &str) -> Option<String> {
    if specifier.starts_with("node:") {
        return None;
    }
    let mut parts = specifier.split('/');
    let first = parts.next()?;
    if first.starts_with('@') {
        let second = parts.next()?;
        Some(format!("{first}/{second}"))
    } else {
        Some(first.to_string())
    }
}

/// Lexically normalise `.` and `..` components.
pub(crate) fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramModel;
    use tempfile::tempdir;

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("hono").as_deref(), Some("hono"));
        assert_eq!(package_name("hono/cors").as_deref(), Some("hono"));
        assert_eq!(package_name("@hono/zod-openapi").as_deref(), Some("@hono/zod-openapi"));
        assert_eq!(package_name("node:fs"), None);
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/p/src/./a/../b.ts")), PathBuf::from("/p/src/b.ts"));
    }

    #[test]
    fn test_relative_resolution_against_snapshots() {
        let program = TypeScriptProgram::from_sources(
            "/p",
            [
                ("/p/src/index.ts", ""),
                ("/p/src/routes/index.ts", ""),
                ("/p/src/users.ts", ""),
            ],
        )
        .unwrap();
        let from = Path::new("/p/src/index.ts");

        let routes = program.resolve_module("./routes", from).unwrap();
        assert!(!routes.is_external);
        assert_eq!(routes.resolved_file, Some(PathBuf::from("/p/src/routes/index.ts")));

        let users = program.resolve_module("./users.js", from).unwrap();
        assert_eq!(users.resolved_file, Some(PathBuf::from("/p/src/users.ts")));

        assert!(program.resolve_module("./missing", from).is_none());
    }

    #[test]
    fn test_external_package_identity() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("node_modules/hono")).unwrap();
        fs::write(
            root.join("node_modules/hono/package.json"),
            r#"{ "name": "hono", "version": "4.6.3" }"#,
        )
        .unwrap();
        let program = TypeScriptProgram::new(root);
        let from = root.join("src/index.ts");

        let hono = program.resolve_module("hono/cors", &from).unwrap();
        assert!(hono.is_external);
        assert_eq!(hono.package_name.as_deref(), Some("hono"));
        assert_eq!(hono.package_version.as_deref(), Some("4.6.3"));

        assert!(program.resolve_module("left-pad", &from).is_none());
        assert!(program.resolve_module("node:fs", &from).is_none());
    }
}
