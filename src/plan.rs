use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::manifest::{Linkage, PlatformVersion, ProductKind};

pub const DEFAULT_OUT_DIR: &str = ".packplan/cache";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPlan {
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_version: Option<String>,
    pub products: Vec<ProductPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPlan {
    pub name: String,
    pub kind: ProductKind,
    pub linkage: Linkage,
    pub units: Vec<BuildUnit>,
}

/// One build pass: a platform and the targets to assemble for it, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildUnit {
    pub platform: String,
    pub min_version: PlatformVersion,
    pub sdk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_target_var: Option<String>,
    pub targets: Vec<ResolvedTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTarget {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl BuildPlan {
    pub fn product(&self, name: &str) -> Option<&ProductPlan> {
        self.products.iter().find(|p| p.name == name)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize build plan to JSON")
    }

    /// Human-readable listing, one block per product and platform.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Package: {}", self.package);

        for product in &self.products {
            let _ = writeln!(out, "\nProduct: {} ({}, {})", product.name, product.kind, product.linkage);

            for unit in &product.units {
                let _ = write!(out, "  {} >= {} [sdk: {}", unit.platform, unit.min_version, unit.sdk);
                if let Some(var) = &unit.deployment_target_var {
                    let _ = write!(out, ", {}={}", var, unit.min_version);
                }
                let _ = writeln!(out, "]");

                for (position, target) in unit.targets.iter().enumerate() {
                    let location = target
                        .path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "aggregate".to_string());
                    let _ = writeln!(out, "    {}. {} ({})", position + 1, target.name, location);
                }
            }
        }

        out
    }
}

impl ProductPlan {
    pub fn unit(&self, platform: &str) -> Option<&BuildUnit> {
        self.units
            .iter()
            .find(|u| u.platform.eq_ignore_ascii_case(platform))
    }
}

impl BuildUnit {
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Stores resolved plans where the external build tool picks them up.
pub struct PlanWriter {
    out_dir: PathBuf,
}

impl PlanWriter {
    pub fn new() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
        }
    }

    pub fn with_out_dir(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }

    pub fn plan_path(&self, package: &str) -> PathBuf {
        self.out_dir.join(format!("{}-plan.json", package))
    }

    pub fn write_plan(&self, plan: &BuildPlan) -> Result<PathBuf> {
        let plan_path = self.plan_path(&plan.package);

        if let Some(plan_parent) = plan_path.parent() {
            fs::create_dir_all(plan_parent)
                .with_context(|| format!("Failed to create plan directory: {}", plan_parent.display()))?;
        }

        let plan_json = plan.to_json_string()?;

        fs::write(&plan_path, plan_json)
            .with_context(|| format!("Failed to write plan to {}", plan_path.display()))?;

        info!(path = %plan_path.display(), "wrote build plan");

        Ok(plan_path)
    }

    pub fn read_plan(&self, plan_path: &Path) -> Result<BuildPlan> {
        let plan_content = fs::read_to_string(plan_path)
            .with_context(|| format!("Failed to read plan from {}", plan_path.display()))?;

        let plan: BuildPlan = serde_json::from_str(&plan_content)
            .with_context(|| format!("Failed to parse plan JSON from {}", plan_path.display()))?;

        Ok(plan)
    }
}

impl Default for PlanWriter {
    fn default() -> Self {
        Self::new()
    }
}
