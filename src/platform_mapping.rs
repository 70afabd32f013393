use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    pub name: &'static str,
    pub sdk: &'static str,
    pub deployment_target_var: &'static str,
}

#[derive(Debug, Clone)]
pub struct PlatformMapping {
    platforms: HashMap<String, PlatformInfo>,
}

impl PlatformMapping {
    pub fn new() -> Self {
        let mut mapping = HashMap::new();

        let known = [
            PlatformInfo {
                name: "iOS",
                sdk: "iphoneos",
                deployment_target_var: "IPHONEOS_DEPLOYMENT_TARGET",
            },
            PlatformInfo {
                name: "macOS",
                sdk: "macosx",
                deployment_target_var: "MACOSX_DEPLOYMENT_TARGET",
            },
            PlatformInfo {
                name: "tvOS",
                sdk: "appletvos",
                deployment_target_var: "TVOS_DEPLOYMENT_TARGET",
            },
            PlatformInfo {
                name: "watchOS",
                sdk: "watchos",
                deployment_target_var: "WATCHOS_DEPLOYMENT_TARGET",
            },
            PlatformInfo {
                name: "visionOS",
                sdk: "xros",
                deployment_target_var: "XROS_DEPLOYMENT_TARGET",
            },
        ];

        for info in known {
            mapping.insert(info.name.to_ascii_lowercase(), info);
        }

        Self {
            platforms: mapping,
        }
    }

    /// Case-insensitive lookup by platform family name.
    pub fn map_platform(&self, platform: &str) -> Option<&PlatformInfo> {
        self.platforms.get(&platform.to_ascii_lowercase())
    }

    /// SDK name, falling back to the lower-cased platform name for families
    /// this table does not know.
    pub fn sdk_or_default(&self, platform: &str) -> String {
        self.map_platform(platform)
            .map(|info| info.sdk.to_string())
            .unwrap_or_else(|| platform.to_ascii_lowercase())
    }

    pub fn deployment_target_var(&self, platform: &str) -> Option<&'static str> {
        self.map_platform(platform)
            .map(|info| info.deployment_target_var)
    }

    pub fn supported_platforms(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.platforms.values().map(|info| info.name).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PlatformMapping {
    fn default() -> Self {
        Self::new()
    }
}
