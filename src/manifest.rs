use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ManifestError, Result};
use crate::graph::ManifestGraph;

/// A package declaration: the platforms it supports, the products it exposes
/// and the targets those products are assembled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Manifest {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_version: Option<String>,

    #[serde(default)]
    pub platforms: Vec<Platform>,

    #[serde(default)]
    pub products: Vec<Product>,

    #[serde(default)]
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Platform {
    pub name: String,
    pub min_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Product {
    pub name: String,

    #[serde(default)]
    pub kind: ProductKind,

    #[serde(default)]
    pub linkage: Linkage,

    /// Root targets; their transitive closure forms the product.
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    #[default]
    Library,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    #[default]
    Automatic,
    Static,
    Dynamic,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Library => "library",
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Linkage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Target {
    pub name: String,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Target {
    /// A target without its own sources only exists to pull in its dependencies.
    pub fn is_aggregate(&self) -> bool {
        self.path.is_none()
    }
}

/// A dotted numeric version such as `9.0`, `10.9` or `11`.
///
/// The text is kept as written; ordering goes through a normalized
/// `major.minor.patch` form so `9` and `9.0.0` compare equal.
#[derive(Debug, Clone)]
pub struct PlatformVersion {
    text: String,
    normalized: semver::Version,
}

impl PlatformVersion {
    pub fn parse(owner: &str, text: &str) -> Result<Self> {
        let invalid = |reason: &str| ManifestError::InvalidVersion {
            owner: owner.to_string(),
            version: text.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = text.split('.').collect();
        if text.is_empty() || parts.len() > 3 {
            return Err(invalid("expected one to three dot-separated numbers"));
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("components must be non-negative integers"));
            }
            *slot = part
                .parse()
                .map_err(|e: std::num::ParseIntError| invalid(&e.to_string()))?;
        }

        Ok(Self {
            text: text.to_string(),
            normalized: semver::Version::new(numbers[0], numbers[1], numbers[2]),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn normalized(&self) -> &semver::Version {
        &self.normalized
    }
}

impl PartialEq for PlatformVersion {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for PlatformVersion {}

impl PartialOrd for PlatformVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlatformVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for PlatformVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for PlatformVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse("version", &text).map_err(serde::de::Error::custom)
    }
}

impl Platform {
    pub fn version(&self) -> Result<PlatformVersion> {
        PlatformVersion::parse(&self.name, &self.min_version)
    }
}

impl Manifest {
    /// Loads and validates a manifest. Files ending in `.toml` are read as
    /// TOML, everything else as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let manifest = if is_toml {
            Self::from_toml_str(&content)?
        } else {
            Self::from_json_str(&content)?
        };

        debug!(
            path = %path.display(),
            package = %manifest.name,
            targets = manifest.targets.len(),
            "loaded manifest"
        );

        Ok(manifest)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every load-time invariant: names, versions, uniqueness,
    /// reference resolution and acyclicity.
    pub fn validate(&self) -> Result<()> {
        self.index().map(|_| ())
    }

    /// Validates the manifest and interns it into an index-based graph.
    pub fn index(&self) -> Result<ManifestGraph<'_>> {
        if self.name.is_empty() {
            return Err(ManifestError::EmptyName { kind: "package" });
        }

        if let Some(tools_version) = &self.tools_version {
            PlatformVersion::parse("toolsVersion", tools_version)?;
        }

        self.validate_platforms()?;
        check_unique("product", self.products.iter().map(|p| p.name.as_str()))?;
        check_unique("target", self.targets.iter().map(|t| t.name.as_str()))?;

        ManifestGraph::build(self)
    }

    fn validate_platforms(&self) -> Result<()> {
        if self.platforms.is_empty() {
            return Err(ManifestError::NoPlatformsDeclared);
        }

        let mut seen = HashSet::new();
        for platform in &self.platforms {
            if platform.name.is_empty() {
                return Err(ManifestError::EmptyName { kind: "platform" });
            }
            platform.version()?;

            if !seen.insert(platform.name.to_ascii_lowercase()) {
                return Err(ManifestError::DuplicateName {
                    kind: "platform",
                    name: platform.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Case-insensitive platform lookup.
    pub fn platform(&self, name: &str) -> Option<&Platform> {
        self.platforms
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn product(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.name == name)
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Combines two declarations of the same package.
    ///
    /// Platforms declared identically on both sides collapse into one.
    /// Anything else declared twice is a `DuplicateName`.
    pub fn merge(mut self, other: Manifest) -> Result<Manifest> {
        if self.name != other.name {
            return Err(ManifestError::PackageNameMismatch {
                left: self.name,
                right: other.name,
            });
        }

        if let Some(theirs) = other.tools_version {
            match &self.tools_version {
                Some(ours) => {
                    let same = PlatformVersion::parse("toolsVersion", ours)?
                        == PlatformVersion::parse("toolsVersion", &theirs)?;
                    if !same {
                        return Err(ManifestError::DuplicateName {
                            kind: "toolsVersion",
                            name: theirs,
                        });
                    }
                }
                None => self.tools_version = Some(theirs),
            }
        }

        for platform in other.platforms {
            match self.platform(&platform.name) {
                Some(existing) if existing.version()? == platform.version()? => {
                    debug!(platform = %platform.name, "merged identical platform declaration");
                }
                Some(_) => {
                    return Err(ManifestError::DuplicateName {
                        kind: "platform",
                        name: platform.name,
                    });
                }
                None => self.platforms.push(platform),
            }
        }

        self.products.extend(other.products);
        self.targets.extend(other.targets);

        self.validate()?;
        Ok(self)
    }

    /// Checks that every target with its own sources points at something on
    /// disk, relative to `root`.
    pub fn verify_paths(&self, root: &Path) -> Result<()> {
        for target in &self.targets {
            if let Some(path) = &target.path {
                let full_path = root.join(path);
                if !full_path.exists() {
                    return Err(ManifestError::MissingPath {
                        target: target.name.clone(),
                        path: full_path,
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_unique<'a>(kind: &'static str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ManifestError::EmptyName { kind });
        }
        if !seen.insert(name) {
            return Err(ManifestError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPCENTER_JSON: &str = include_str!("../demos/appcenter/Package.json");
    const APPCENTER_TOML: &str = include_str!("../demos/appcenter/Package.toml");

    fn minimal() -> Manifest {
        Manifest {
            name: "Demo".to_string(),
            tools_version: None,
            platforms: vec![Platform {
                name: "iOS".to_string(),
                min_version: "9.0".to_string(),
            }],
            products: vec![Product {
                name: "Demo".to_string(),
                kind: ProductKind::Library,
                linkage: Linkage::Automatic,
                targets: vec!["Core".to_string()],
            }],
            targets: vec![Target {
                name: "Core".to_string(),
                dependencies: Vec::new(),
                path: Some(PathBuf::from("Core")),
            }],
        }
    }

    #[test]
    fn test_parse_demo_json() {
        let manifest = Manifest::from_json_str(APPCENTER_JSON).unwrap();

        assert_eq!(manifest.name, "AppCenter");
        assert_eq!(manifest.tools_version.as_deref(), Some("5.0"));
        assert_eq!(manifest.platforms.len(), 3);
        assert_eq!(manifest.platform("macos").unwrap().min_version, "10.9");
        assert_eq!(manifest.products[0].kind, ProductKind::Library);

        let framework = manifest.target("AppCenter iOS Framework").unwrap();
        assert_eq!(framework.dependencies.len(), 8);
        assert!(!framework.is_aggregate());
    }

    #[test]
    fn test_toml_and_json_agree() {
        let from_json = Manifest::from_json_str(APPCENTER_JSON).unwrap();
        let from_toml = Manifest::from_toml_str(APPCENTER_TOML).unwrap();
        assert_eq!(from_json, from_toml);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Manifest::from_json_str(
            r#"{"name": "X", "platforms": [], "products": [], "targets": [], "swiftLanguageVersions": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Json(_)));
    }

    #[test]
    fn test_kind_and_linkage_display_matches_serde() {
        for linkage in [Linkage::Automatic, Linkage::Static, Linkage::Dynamic] {
            let json = serde_json::to_string(&linkage).unwrap();
            assert_eq!(json, format!("\"{linkage}\""));
        }
        let json = serde_json::to_string(&ProductKind::Library).unwrap();
        assert_eq!(json, format!("\"{}\"", ProductKind::Library));
    }

    #[test]
    fn test_platform_version_parsing() {
        let v = PlatformVersion::parse("iOS", "9.0").unwrap();
        assert_eq!(v.as_str(), "9.0");
        assert_eq!(v.normalized(), &semver::Version::new(9, 0, 0));

        assert_eq!(
            PlatformVersion::parse("iOS", "9").unwrap(),
            PlatformVersion::parse("iOS", "9.0.0").unwrap()
        );
        assert!(
            PlatformVersion::parse("macOS", "10.9").unwrap()
                < PlatformVersion::parse("macOS", "10.13").unwrap()
        );

        for bad in ["", "9.", "v9", "9.0.0.1", "nine", "-1.0"] {
            let err = PlatformVersion::parse("iOS", bad).unwrap_err();
            assert!(matches!(err, ManifestError::InvalidVersion { .. }), "{bad}");
        }
    }

    #[test]
    fn test_invalid_platform_version() {
        let mut manifest = minimal();
        manifest.platforms[0].min_version = "nine".to_string();

        let err = manifest.validate().unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidVersion { ref owner, .. } if owner == "iOS"
        ));
    }

    #[test]
    fn test_no_platforms() {
        let mut manifest = minimal();
        manifest.platforms.clear();
        assert!(matches!(
            manifest.validate().unwrap_err(),
            ManifestError::NoPlatformsDeclared
        ));
    }

    #[test]
    fn test_duplicate_names() {
        let mut manifest = minimal();
        manifest.targets.push(manifest.targets[0].clone());
        let err = manifest.validate().unwrap_err();
        assert!(matches!(
            err,
            ManifestError::DuplicateName { kind: "target", ref name } if name == "Core"
        ));

        let mut manifest = minimal();
        manifest.products.push(manifest.products[0].clone());
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateName { kind: "product", .. }));

        let mut manifest = minimal();
        manifest.platforms.push(Platform {
            name: "IOS".to_string(),
            min_version: "12.0".to_string(),
        });
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateName { kind: "platform", .. }));
    }

    #[test]
    fn test_empty_target_name() {
        let mut manifest = minimal();
        manifest.targets[0].name.clear();
        assert!(matches!(
            manifest.validate().unwrap_err(),
            ManifestError::EmptyName { kind: "target" }
        ));
    }

    #[test]
    fn test_merge_near_duplicates_is_duplicate_name() {
        let left = Manifest::from_json_str(APPCENTER_JSON).unwrap();
        let right = Manifest::from_toml_str(APPCENTER_TOML).unwrap();

        let err = left.merge(right).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateName { kind: "product", .. }));
    }

    #[test]
    fn test_merge_disjoint() {
        let left = minimal();
        let right = Manifest {
            name: "Demo".to_string(),
            tools_version: Some("5.0".to_string()),
            platforms: vec![
                Platform {
                    name: "ios".to_string(),
                    min_version: "9".to_string(),
                },
                Platform {
                    name: "tvOS".to_string(),
                    min_version: "11.0".to_string(),
                },
            ],
            products: vec![Product {
                name: "DemoExtras".to_string(),
                kind: ProductKind::Library,
                linkage: Linkage::Static,
                targets: vec!["Extras".to_string()],
            }],
            targets: vec![Target {
                name: "Extras".to_string(),
                dependencies: vec!["Core".to_string()],
                path: None,
            }],
        };

        let merged = left.merge(right).unwrap();
        assert_eq!(merged.tools_version.as_deref(), Some("5.0"));
        assert_eq!(merged.platforms.len(), 2);
        assert_eq!(merged.products.len(), 2);
        assert_eq!(merged.targets.len(), 2);
    }

    #[test]
    fn test_merge_conflicting_platform_floor() {
        let mut right = minimal();
        right.products.clear();
        right.targets.clear();
        right.platforms[0].min_version = "11.0".to_string();

        let err = minimal().merge(right).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateName { kind: "platform", .. }));
    }

    #[test]
    fn test_merge_conflicting_tools_version() {
        let mut left = minimal();
        left.tools_version = Some("5.0".to_string());

        let mut right = minimal();
        right.tools_version = Some("5.9".to_string());
        right.products[0].name = "DemoExtras".to_string();
        right.targets[0].name = "Extras".to_string();
        right.products[0].targets = vec!["Extras".to_string()];

        let err = left.clone().merge(right.clone()).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::DuplicateName { kind: "toolsVersion", ref name } if name == "5.9"
        ));

        right.tools_version = Some("5".to_string());
        let merged = left.merge(right).unwrap();
        assert_eq!(merged.tools_version.as_deref(), Some("5.0"));
    }

    #[test]
    fn test_invalid_tools_version() {
        let mut manifest = minimal();
        manifest.tools_version = Some("five".to_string());

        let err = manifest.validate().unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidVersion { ref owner, .. } if owner == "toolsVersion"
        ));
    }

    #[test]
    fn test_merge_package_mismatch() {
        let mut right = minimal();
        right.name = "Other".to_string();
        assert!(matches!(
            minimal().merge(right).unwrap_err(),
            ManifestError::PackageNameMismatch { .. }
        ));
    }

    #[test]
    fn test_from_path_and_verify_paths() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("Package.json");
        fs::write(&manifest_path, minimal().to_json_string().unwrap()).unwrap();

        let manifest = Manifest::from_path(&manifest_path).unwrap();
        assert_eq!(manifest, minimal());

        let err = manifest.verify_paths(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::MissingPath { ref target, .. } if target == "Core"));

        fs::create_dir(dir.path().join("Core")).unwrap();
        manifest.verify_paths(dir.path()).unwrap();
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::from_path(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
