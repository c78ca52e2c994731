use crate::scan::RipRelative;

/// Scanner defaults applied when a target or signature leaves them unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Section searched when a target names none
    pub default_section: String,
    /// Instruction layout used by `scan_base_default`
    pub rip_relative: RipRelative,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            default_section: ".text".to_string(),
            rip_relative: RipRelative::LEA,
        }
    }
}

impl ScanConfig {
    /// Create a new configuration builder
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }
}

/// Builder for ScanConfig
#[derive(Debug, Clone, Default)]
pub struct ScanConfigBuilder {
    default_section: Option<String>,
    rip_relative: Option<RipRelative>,
}

impl ScanConfigBuilder {
    /// Set the section searched by default
    pub fn default_section<S: Into<String>>(mut self, section: S) -> Self {
        self.default_section = Some(section.into());
        self
    }

    /// Set the displacement layout used for base resolution
    pub fn rip_relative(mut self, rip: RipRelative) -> Self {
        self.rip_relative = Some(rip);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ScanConfig {
        let default = ScanConfig::default();
        ScanConfig {
            default_section: self.default_section.unwrap_or(default.default_section),
            rip_relative: self.rip_relative.unwrap_or(default.rip_relative),
        }
    }
}
