use std::{fs::read_to_string, path::Path};

use eyre::Context;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// One pass against the previous frame's pyramid.
    Single,
    /// Cull, draw, rebuild, then reocclude triangles and meshes against fresh depth.
    TwoPhase,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CullConfiguration {
    pub mode: Mode,
    /// Disables the depth pyramid tests, leaving frustum and backface culling.
    pub occlusion: bool,
    pub clear_color: [f32; 4],
}

impl CullConfiguration {
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        serde_json::from_str(json).wrap_err("could not parse cull configuration")
    }

    pub fn load(path: &Path) -> eyre::Result<Self> {
        let json = read_to_string(path)
            .wrap_err_with(|| format!("could not read {}", path.display()))?;
        Self::from_json(&json)
    }
}

impl Default for CullConfiguration {
    fn default() -> Self {
        Self {
            mode: Mode::TwoPhase,
            occlusion: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let configuration = CullConfiguration::from_json(r#"{ "mode": "single" }"#).unwrap();
        assert_eq!(configuration.mode, Mode::Single);
        assert!(configuration.occlusion);
        assert_eq!(configuration.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn parses_every_field() {
        let configuration = CullConfiguration::from_json(
            r#"{ "mode": "two-phase", "occlusion": false, "clear-color": [0.5, 0.5, 0.5, 1.0] }"#,
        )
        .unwrap();
        assert_eq!(
            configuration,
            CullConfiguration {
                mode: Mode::TwoPhase,
                occlusion: false,
                clear_color: [0.5, 0.5, 0.5, 1.0],
            }
        );
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(CullConfiguration::from_json(r#"{ "mode": "triple" }"#).is_err());
    }
}
