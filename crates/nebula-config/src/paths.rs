//! Translation between virtual paths (`res://`, `user://`) and OS paths.

use std::path::{Path, PathBuf};

/// Scheme for project-relative paths.
pub const RES_SCHEME: &str = "res://";
/// Scheme for per-user writable data.
pub const USER_SCHEME: &str = "user://";

/// Returns `true` if `path` starts with an alphanumeric scheme followed by `://`.
pub fn has_scheme(path: &str) -> bool {
    match path.find("://") {
        Some(p) if p > 0 => path[..p].bytes().all(|b| b.is_ascii_alphanumeric()),
        _ => false,
    }
}

/// Returns `true` for rooted paths, drive paths and scheme paths.
pub fn is_absolute_path(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || path.contains(":/") || path.contains(":\\")
}

/// Normalizes a path: backslashes become `/`, repeated slashes and `.`
/// segments are removed, `..` cancels the previous segment. A scheme, a
/// leading `/` or a drive prefix is kept as-is.
pub fn simplify_path(path: &str) -> String {
    let (drive, rest) = split_drive(path);
    let drive = drive.replace('\\', "/");
    let rest = rest.replace('\\', "/");

    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    format!("{drive}{}", parts.join("/"))
}

fn split_drive(path: &str) -> (&str, &str) {
    if has_scheme(path) {
        let end = path.find("://").map_or(0, |p| p + 3);
        return path.split_at(end);
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return path.split_at(1);
    }
    let colon = path.find(":/").or_else(|| path.find(":\\"));
    let slash = path.find(['/', '\\']);
    match (colon, slash) {
        (Some(c), Some(s)) if c < s => path.split_at(c + 2),
        _ => ("", path),
    }
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Maps virtual paths to OS paths and back for one resource root.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    resource_path: String,
    user_data_dir: String,
}

impl PathResolver {
    /// Creates a resolver. Either directory may be empty.
    pub fn new(resource_path: impl Into<String>, user_data_dir: impl Into<String>) -> Self {
        Self {
            resource_path: resource_path.into(),
            user_data_dir: user_data_dir.into(),
        }
    }

    /// The directory `res://` maps to.
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// Converts an OS path into `res://` form when it lies inside the resource
    /// root. Paths outside the root and paths that already carry a scheme are
    /// returned simplified but otherwise unchanged. Returns an empty string if
    /// the path cannot be localized.
    pub fn localize(&self, path: &str) -> String {
        let path = simplify_path(path);
        if path.is_empty() {
            return path;
        }
        if self.resource_path.is_empty()
            || (is_absolute_path(&path) && !path.starts_with(self.resource_path.as_str()))
        {
            return path;
        }
        if has_scheme(&path) {
            return path;
        }

        if let Some(cwd) = self.existing_dir(&path) {
            // Compare with trailing slashes so `/my/project` does not claim
            // `/my/project_data`.
            let res_path = with_trailing_slash(&self.resource_path);
            let cwd = with_trailing_slash(&cwd);
            if !cwd.starts_with(&res_path) {
                return path;
            }
            return cwd.replacen(&res_path, RES_SCHEME, 1);
        }

        let Some(mut sep) = path.rfind('/') else {
            return format!("{RES_SCHEME}{path}");
        };
        let parent_local = self.localize(&path[..sep]);
        if parent_local.is_empty() {
            return String::new();
        }
        // Only drop the separator when the parent already ends with one.
        if parent_local.ends_with('/') {
            sep += 1;
        }
        format!("{parent_local}{}", &path[sep..])
    }

    /// Replaces a `res://` or `user://` prefix with the directory it maps to.
    /// With an unset directory the scheme is stripped. Other paths are
    /// returned unchanged.
    pub fn globalize(&self, path: &str) -> String {
        if let Some(rest) = path.strip_prefix(RES_SCHEME) {
            return expand(&self.resource_path, rest);
        }
        if let Some(rest) = path.strip_prefix(USER_SCHEME) {
            return expand(&self.user_data_dir, rest);
        }
        path.to_string()
    }

    /// Resolves `path` as a directory on disk, relative paths against the
    /// resource root. Returns the canonical directory with `/` separators.
    fn existing_dir(&self, path: &str) -> Option<String> {
        let candidate = if is_absolute_path(path) {
            PathBuf::from(path)
        } else {
            Path::new(&self.resource_path).join(path)
        };
        let canonical = std::fs::canonicalize(candidate).ok()?;
        if !canonical.is_dir() {
            return None;
        }
        Some(canonical.to_string_lossy().replace('\\', "/"))
    }
}

fn expand(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_string()
    } else {
        format!("{dir}/{rest}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> (tempfile::TempDir, PathResolver, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("textures/ui")).unwrap();
        std::fs::write(root.join("textures/ui/button.png"), b"png").unwrap();
        let root = root.to_string_lossy().replace('\\', "/");
        let resolver = PathResolver::new(root.clone(), "/home/player/.local/share/nebula");
        (dir, resolver, root)
    }

    #[test]
    fn test_simplify_path() {
        assert_eq!(simplify_path("/a/./b//c/../d"), "/a/b/d");
        assert_eq!(simplify_path("res://a/../b"), "res://b");
        assert_eq!(simplify_path("C:\\games\\demo\\"), "C:/games/demo");
        assert_eq!(simplify_path("../x"), "../x");
        assert_eq!(simplify_path("a/b/../../.."), "..");
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("res://icon.png"));
        assert!(has_scheme("http2://host"));
        assert!(!has_scheme("://nothing"));
        assert!(!has_scheme("my-scheme://x"));
        assert!(!has_scheme("/plain/path"));
    }

    #[test]
    fn test_localize_existing_file_and_dir() {
        let (_dir, resolver, root) = project();
        assert_eq!(resolver.localize(&root), "res://");
        assert_eq!(resolver.localize(&format!("{root}/textures")), "res://textures/");
        assert_eq!(
            resolver.localize(&format!("{root}/textures/ui/button.png")),
            "res://textures/ui/button.png"
        );
    }

    #[test]
    fn test_localize_nested_missing_directories() {
        let (_dir, resolver, root) = project();
        assert_eq!(resolver.localize(&format!("{root}/new")), "res://new");
        assert_eq!(
            resolver.localize(&format!("{root}/new/deeper/file.tres")),
            "res://new/deeper/file.tres"
        );
        assert_eq!(
            resolver.localize(&format!("{root}/textures/missing/file.png")),
            "res://textures/missing/file.png"
        );
    }

    #[test]
    fn test_localize_relative_path() {
        let (_dir, resolver, _root) = project();
        assert_eq!(resolver.localize("textures/ui"), "res://textures/ui/");
        assert_eq!(resolver.localize("./textures/ui/button.png"), "res://textures/ui/button.png");
        assert_eq!(resolver.localize("scene.tscn"), "res://scene.tscn");
    }

    #[test]
    fn test_localize_sibling_with_shared_prefix_is_not_local() {
        let (dir, resolver, root) = project();
        let sibling = format!("{root}_data");
        std::fs::create_dir_all(&sibling).unwrap();
        assert_eq!(resolver.localize(&sibling), sibling);
        std::fs::remove_dir_all(&sibling).unwrap();
        drop(dir);
    }

    #[test]
    fn test_localize_passthrough() {
        let (_dir, resolver, _root) = project();
        assert_eq!(resolver.localize("user://save.dat"), "user://save.dat");
        assert_eq!(resolver.localize("/somewhere/else.txt"), "/somewhere/else.txt");
        assert_eq!(resolver.localize(""), "");

        let unset = PathResolver::default();
        assert_eq!(unset.localize("a/./b"), "a/b");
    }

    #[test]
    fn test_globalize() {
        let resolver = PathResolver::new("/games/demo", "/home/p/data");
        assert_eq!(resolver.globalize("res://icon.png"), "/games/demo/icon.png");
        assert_eq!(resolver.globalize("user://save.dat"), "/home/p/data/save.dat");
        assert_eq!(resolver.globalize("http://example.com"), "http://example.com");

        let unset = PathResolver::default();
        assert_eq!(unset.globalize("res://icon.png"), "icon.png");
        assert_eq!(unset.globalize("user://save.dat"), "save.dat");
    }

    #[test]
    fn test_globalize_inverts_localize_under_root() {
        let (_dir, resolver, root) = project();
        for rel in ["textures/ui/button.png", "textures/ui", "new/deeper/file.tres", "top.cfg"] {
            let absolute = format!("{root}/{rel}");
            let local = resolver.localize(&absolute);
            assert!(local.starts_with(RES_SCHEME), "{rel} -> {local}");
            assert_eq!(simplify_path(&resolver.globalize(&local)), absolute);
        }
    }
}
