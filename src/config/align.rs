use crate::cost::CostConfig;
use crate::error::{AlignError, Result};
use crate::minimize::MinimizerConfig;
use crate::optimizer::AlignParams;
use nalgebra::Matrix3;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration of the `align_demo` tool.
#[derive(Clone, Debug, Deserialize)]
pub struct AlignToolConfig {
    pub moving: PathBuf,
    pub fixed: PathBuf,
    /// Optional mask image; non-zero pixels count. Must match `fixed`.
    #[serde(default)]
    pub mask: Option<PathBuf>,
    /// Row-major full-resolution fixed → moving matrix seeding the search.
    #[serde(default)]
    pub initial_transform: Option<[[f64; 3]; 3]>,
    #[serde(default)]
    pub params: AlignParams,
    #[serde(default)]
    pub cost: CostConfig,
    #[serde(default)]
    pub minimizer: MinimizerConfig,
    pub output: AlignOutputConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AlignOutputConfig {
    pub aligned_image: PathBuf,
    #[serde(default)]
    pub report_json: Option<PathBuf>,
}

impl AlignToolConfig {
    pub fn initial_matrix(&self) -> Option<Matrix3<f64>> {
        self.initial_transform
            .map(|rows| Matrix3::from_fn(|r, c| rows[r][c]))
    }
}

pub fn load_config(path: &Path) -> Result<AlignToolConfig> {
    let data = fs::read_to_string(path)
        .map_err(|e| AlignError::io(format!("failed to read config {}: {e}", path.display())))?;
    parse_config(&data)
}

pub fn parse_config(json: &str) -> Result<AlignToolConfig> {
    let config: AlignToolConfig = serde_json::from_str(json)?;
    config.params.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::RegionMi;
    use crate::geometry::TransformKind;

    #[test]
    fn parses_minimal_and_full_configs() {
        let minimal = parse_config(
            r#"{"moving": "m.png", "fixed": "f.png", "output": {"aligned_image": "out/a.png"}}"#,
        )
        .expect("minimal config");
        assert!(minimal.mask.is_none());
        assert_eq!(minimal.cost, CostConfig::default());
        assert!(minimal.initial_matrix().is_none());

        let full = parse_config(
            r#"{
                "moving": "m.png",
                "fixed": "f.png",
                "mask": "k.png",
                "initial_transform": [[1, 0, 5], [0, 1, -3], [0, 0, 1]],
                "params": {"transform": "similarity", "pyramid": {"levels": 4}},
                "cost": {"type": "region_mi", "radius": 2},
                "minimizer": {"type": "differential_evolution", "popsize": 10},
                "output": {"aligned_image": "a.png", "report_json": "r.json"}
            }"#,
        )
        .expect("full config");
        assert_eq!(full.params.transform, TransformKind::Similarity);
        match &full.cost {
            CostConfig::RegionMi(c) => assert_eq!((c.radius, c.nbins), (2, RegionMi::default().nbins)),
            other => panic!("unexpected cost {other:?}"),
        }
        let m = full.initial_matrix().expect("matrix");
        assert_eq!((m[(0, 2)], m[(1, 2)]), (5.0, -3.0));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let err = parse_config(
            r#"{"moving": "m", "fixed": "f", "params": {"pyramid": {"levels": 0}}, "output": {"aligned_image": "a"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AlignError::InvalidConfiguration(_)));
        assert!(matches!(parse_config("{"), Err(AlignError::Json(_))));
    }
}
