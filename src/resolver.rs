//! Turns a manifest into a [`BuildPlan`].
//!
//! Resolution is a pure function of the manifest: it validates everything up
//! front and either returns a complete plan or the first configuration error.

use tracing::debug;

use crate::error::{ManifestError, Result};
use crate::graph::{ManifestGraph, TargetId};
use crate::manifest::{Manifest, Platform, PlatformVersion};
use crate::plan::{BuildPlan, BuildUnit, ProductPlan, ResolvedTarget};
use crate::platform_mapping::PlatformMapping;

#[derive(Debug, Default, Clone)]
pub struct Resolver {
    platforms: Vec<String>,
    product: Option<String>,
    mapping: PlatformMapping,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the plan to these platforms (case-insensitive). Empty means all.
    pub fn with_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = platforms.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the plan to a single product.
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn resolve(&self, manifest: &Manifest) -> Result<BuildPlan> {
        let graph = manifest.index()?;
        let platforms = self.select_platforms(manifest)?;

        if let Some(name) = &self.product {
            if manifest.product(name).is_none() {
                return Err(ManifestError::UnknownProduct(name.clone()));
            }
        }

        let mut products = Vec::new();
        for (product, roots) in graph.products() {
            if self.product.as_ref().is_some_and(|wanted| *wanted != product.name) {
                continue;
            }

            let targets = resolve_targets(&graph, &graph.closure(roots)?);
            debug!(
                product = %product.name,
                targets = targets.len(),
                platforms = platforms.len(),
                "resolved product"
            );

            let units = platforms
                .iter()
                .map(|(platform, min_version)| BuildUnit {
                    platform: platform.name.clone(),
                    min_version: min_version.clone(),
                    sdk: self.mapping.sdk_or_default(&platform.name),
                    deployment_target_var: self
                        .mapping
                        .deployment_target_var(&platform.name)
                        .map(str::to_string),
                    targets: targets.clone(),
                })
                .collect();

            products.push(ProductPlan {
                name: product.name.clone(),
                kind: product.kind,
                linkage: product.linkage,
                units,
            });
        }

        Ok(BuildPlan {
            package: manifest.name.clone(),
            tools_version: manifest.tools_version.clone(),
            products,
        })
    }

    /// Requested platforms in manifest order, paired with their parsed floors.
    fn select_platforms<'m>(
        &self,
        manifest: &'m Manifest,
    ) -> Result<Vec<(&'m Platform, PlatformVersion)>> {
        for requested in &self.platforms {
            if manifest.platform(requested).is_none() {
                return Err(ManifestError::UnknownPlatform(requested.clone()));
            }
        }

        manifest
            .platforms
            .iter()
            .filter(|p| {
                self.platforms.is_empty()
                    || self
                        .platforms
                        .iter()
                        .any(|wanted| p.name.eq_ignore_ascii_case(wanted))
            })
            .map(|p| Ok((p, p.version()?)))
            .collect()
    }
}

fn resolve_targets(graph: &ManifestGraph<'_>, order: &[TargetId]) -> Vec<ResolvedTarget> {
    order
        .iter()
        .map(|&id| {
            let target = graph.target(id);
            ResolvedTarget {
                name: target.name.clone(),
                path: target.path.clone(),
                dependencies: target.dependencies.clone(),
            }
        })
        .collect()
}
