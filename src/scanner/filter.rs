//! Model-file recognition and junk exclusion.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::config::{DEFAULT_EXCLUDE_PATTERNS, DEFAULT_MODEL_EXTENSIONS};
use crate::Result;

/// Format names for well-known extensions, used for log fields only.
const FORMAT_NAMES: &[(&str, &str)] = &[
    ("stl", "stereolithography"),
    ("obj", "wavefront"),
    ("3mf", "3d-manufacturing"),
    ("ply", "polygon"),
    ("gltf", "gltf"),
    ("glb", "gltf"),
    ("fbx", "filmbox"),
    ("dae", "collada"),
    ("3ds", "3ds"),
    ("amf", "additive-manufacturing"),
    ("off", "object-file-format"),
    ("step", "step"),
    ("stp", "step"),
    ("iges", "iges"),
    ("igs", "iges"),
    ("blend", "blender"),
    ("scad", "openscad"),
    ("f3d", "fusion360"),
    ("lys", "lychee"),
    ("lyt", "lychee"),
    ("ctb", "chitubox"),
    ("chitubox", "chitubox"),
    ("gcode", "gcode"),
];

/// Decides which files are model assets and which never reach grouping.
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: Vec<String>,
    excludes: Option<Gitignore>,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_MODEL_EXTENSIONS
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
            excludes: None,
        }
    }
}

impl FileFilter {
    /// Filter recognizing `extensions` (case-insensitive, no leading dot).
    #[must_use]
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            excludes: None,
        }
    }

    /// Add gitignore-style exclusion patterns, matched relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if patterns are invalid.
    pub fn with_excludes<S: AsRef<str>>(mut self, root: &Path, patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            self.excludes = None;
            return Ok(self);
        }

        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns {
            builder
                .add_line(None, pattern.as_ref())
                .map_err(|e| crate::Error::config(format!("invalid exclude pattern: {e}")))?;
        }

        let gitignore = builder
            .build()
            .map_err(|e| crate::Error::config(format!("failed to build excludes: {e}")))?;

        self.excludes = Some(gitignore);
        Ok(self)
    }

    /// Default extensions plus the default exclusions for `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in patterns fail to compile.
    pub fn defaults_for(root: &Path) -> Result<Self> {
        Self::default().with_excludes(root, DEFAULT_EXCLUDE_PATTERNS)
    }

    /// Whether the file has a recognized model extension.
    #[must_use]
    pub fn is_model_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
    }

    /// Format name for a model file, if it is one.
    #[must_use]
    pub fn detect_format(&self, path: &Path) -> Option<&'static str> {
        if !self.is_model_file(path) {
            return None;
        }
        let ext = path.extension()?.to_str()?.to_lowercase();
        Some(
            FORMAT_NAMES
                .iter()
                .find(|(e, _)| *e == ext)
                .map_or("other", |(_, name)| *name),
        )
    }

    /// Whether the file, or any folder above it, matches an exclusion.
    ///
    /// `path` must be inside the root given to [`Self::with_excludes`].
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excludes.as_ref().is_some_and(|gi| {
            gi.matched_path_or_any_parents(path, false).is_ignore()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_model_file() {
        let filter = FileFilter::default();
        assert!(filter.is_model_file(Path::new("part.stl")));
        assert!(filter.is_model_file(Path::new("model/file.obj")));
        assert!(filter.is_model_file(Path::new("model/file.OBJ")));
        assert!(filter.is_model_file(Path::new("model/file.Obj")));
        assert!(filter.is_model_file(Path::new("print.3mf")));
        assert!(!filter.is_model_file(Path::new("README.txt")));
        assert!(!filter.is_model_file(Path::new("images/preview.png")));
        assert!(!filter.is_model_file(Path::new("stl")));
    }

    #[test]
    fn test_custom_extensions() {
        let filter = FileFilter::new(&[".STL", "xyz"]);
        assert!(filter.is_model_file(Path::new("a.stl")));
        assert!(filter.is_model_file(Path::new("a.xyz")));
        assert!(!filter.is_model_file(Path::new("a.obj")));
    }

    #[test]
    fn test_detect_format() {
        let filter = FileFilter::default();
        assert_eq!(
            filter.detect_format(Path::new("a.STL")),
            Some("stereolithography")
        );
        assert_eq!(filter.detect_format(Path::new("a.glb")), Some("gltf"));
        assert_eq!(filter.detect_format(Path::new("a.png")), None);

        let custom = FileFilter::new(&["xyz"]);
        assert_eq!(custom.detect_format(Path::new("a.xyz")), Some("other"));
    }

    #[test]
    fn test_default_excludes() {
        let root = Path::new("/library");
        let filter = FileFilter::defaults_for(root).unwrap();

        assert!(filter.is_excluded(Path::new("/library/model/.DS_Store")));
        assert!(filter.is_excluded(Path::new("/library/model/Thumbs.db")));
        assert!(filter.is_excluded(Path::new("/library/__MACOSX/model/._part.stl")));
        assert!(filter.is_excluded(Path::new("/library/.git/config")));
        assert!(!filter.is_excluded(Path::new("/library/model/part.stl")));
        assert!(!filter.is_excluded(Path::new("/library/model/README.txt")));
    }

    #[test]
    fn test_no_excludes() {
        let filter = FileFilter::default()
            .with_excludes::<&str>(Path::new("/library"), &[])
            .unwrap();
        assert!(!filter.is_excluded(Path::new("/library/model/.DS_Store")));
    }

    #[test]
    fn test_custom_excludes() {
        let root = Path::new("/library");
        let filter = FileFilter::default()
            .with_excludes(root, &["*.bak", "drafts/"])
            .unwrap();

        assert!(filter.is_excluded(Path::new("/library/model/part.stl.bak")));
        assert!(filter.is_excluded(Path::new("/library/model/drafts/part.stl")));
        assert!(!filter.is_excluded(Path::new("/library/model/part.stl")));
    }
}
