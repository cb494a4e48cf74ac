//! Container paths (`ST_Loc`).
//!
//! A container path is an absolute, `/`-separated location inside the
//! package, independent of the host filesystem. Relative locations found in
//! XML parts are resolved against the directory of the part that holds them.

use std::fmt;

/// Absolute location of a file inside an OFD package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerPath(String);

impl ContainerPath {
    /// Create a container path, normalising separators, `.` and `..` segments.
    ///
    /// Relative input is treated as relative to the package root.
    ///
    /// ```
    /// use ofd_oxide::container::ContainerPath;
    ///
    /// let p = ContainerPath::new("Doc_0\\Pages/../Document.xml");
    /// assert_eq!(p.as_str(), "/Doc_0/Document.xml");
    /// ```
    pub fn new(path: &str) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for seg in path.split(['/', '\\']) {
            match seg {
                "" | "." => {},
                ".." => {
                    segments.pop();
                },
                s => segments.push(s),
            }
        }
        ContainerPath(format!("/{}", segments.join("/")))
    }

    /// The package root.
    pub fn root() -> Self {
        ContainerPath("/".to_string())
    }

    /// Resolve `loc` the way OFD resolves `ST_Loc` values.
    ///
    /// Absolute locations are taken as-is; relative ones are resolved against
    /// `base_dir`.
    ///
    /// ```
    /// use ofd_oxide::container::ContainerPath;
    ///
    /// let base = ContainerPath::new("/Doc_0/Signs");
    /// assert_eq!(ContainerPath::resolve(&base, "Sign_0/Signature.xml").as_str(),
    ///            "/Doc_0/Signs/Sign_0/Signature.xml");
    /// assert_eq!(ContainerPath::resolve(&base, "/OFD.xml").as_str(), "/OFD.xml");
    /// ```
    pub fn resolve(base_dir: &ContainerPath, loc: &str) -> Self {
        let loc = loc.trim();
        if loc.starts_with('/') || loc.starts_with('\\') {
            ContainerPath::new(loc)
        } else {
            ContainerPath::new(&format!("{}/{}", base_dir.0, loc))
        }
    }

    /// Path string, always starting with `/`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path without the leading `/`, as used for ZIP entry names.
    pub fn relative(&self) -> &str {
        &self.0[1..]
    }

    /// Whether this is the package root.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Parent directory; the root is its own parent.
    pub fn parent(&self) -> ContainerPath {
        match self.0.rfind('/') {
            Some(0) | None => ContainerPath::root(),
            Some(idx) => ContainerPath(self.0[..idx].to_string()),
        }
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// File name without its extension.
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    /// Append a child segment.
    pub fn join(&self, child: &str) -> ContainerPath {
        ContainerPath::new(&format!("{}/{}", self.0, child))
    }

    /// Whether `self` lies inside directory `dir` (or equals it).
    pub fn starts_with(&self, dir: &ContainerPath) -> bool {
        dir.is_root()
            || self.0 == dir.0
            || (self.0.starts_with(&dir.0) && self.0.as_bytes().get(dir.0.len()) == Some(&b'/'))
    }
}

impl fmt::Display for ContainerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerPath {
    fn from(s: &str) -> Self {
        ContainerPath::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalisation() {
        assert_eq!(ContainerPath::new("OFD.xml").as_str(), "/OFD.xml");
        assert_eq!(ContainerPath::new("/a//b/./c").as_str(), "/a/b/c");
        assert_eq!(ContainerPath::new("/a/../../b").as_str(), "/b");
        assert_eq!(ContainerPath::new("").as_str(), "/");
    }

    #[test]
    fn test_parent_and_names() {
        let p = ContainerPath::new("/Doc_0/Pages/Page_0/Content.xml");
        assert_eq!(p.parent().as_str(), "/Doc_0/Pages/Page_0");
        assert_eq!(p.file_name(), "Content.xml");
        assert_eq!(p.file_stem(), "Content");
        assert_eq!(ContainerPath::new("/OFD.xml").parent(), ContainerPath::root());
        assert_eq!(ContainerPath::new("/.hidden").file_stem(), ".hidden");
        assert_eq!(p.relative(), "Doc_0/Pages/Page_0/Content.xml");
    }

    #[test]
    fn test_resolve_relative_with_dotdot() {
        let base = ContainerPath::new("/Doc_0/Signs/Sign_0");
        assert_eq!(
            ContainerPath::resolve(&base, "../../Document.xml").as_str(),
            "/Doc_0/Document.xml"
        );
    }

    #[test]
    fn test_starts_with() {
        let dir = ContainerPath::new("/Doc_0/Signs");
        assert!(ContainerPath::new("/Doc_0/Signs/Sign_0/Seal.esl").starts_with(&dir));
        assert!(!ContainerPath::new("/Doc_0/SignsX/a").starts_with(&dir));
        assert!(ContainerPath::new("/anything").starts_with(&ContainerPath::root()));
    }
}
