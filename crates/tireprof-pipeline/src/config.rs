use serde::{Deserialize, Serialize};
use tireprof_core::{Aggregate, Real};
use tireprof_linear::{CylinderFitOptions, MIN_RIM_POINTS};

use crate::frame::{HistogramPeak, ReferenceStrategy, WeightedCentroid};
use crate::PipelineError;

/// Accepted number of manual rim picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RimPointPolicy {
    pub min: usize,
    pub max: usize,
}

impl Default for RimPointPolicy {
    fn default() -> Self {
        Self { min: 3, max: 10 }
    }
}

/// How the 12 o'clock direction is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceConfig {
    HistogramPeak {
        bins: usize,
        smoothing: usize,
        min_prominence: Real,
        min_peak_ratio: Real,
    },
    WeightedCentroid {
        min_resultant: Real,
    },
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        let peak = HistogramPeak::default();
        ReferenceConfig::HistogramPeak {
            bins: peak.bins,
            smoothing: peak.smoothing,
            min_prominence: peak.min_prominence,
            min_peak_ratio: peak.min_peak_ratio,
        }
    }
}

impl ReferenceConfig {
    pub fn to_strategy(&self) -> Box<dyn ReferenceStrategy + Send + Sync> {
        match *self {
            ReferenceConfig::HistogramPeak {
                bins,
                smoothing,
                min_prominence,
                min_peak_ratio,
            } => Box::new(HistogramPeak {
                bins,
                smoothing,
                min_prominence,
                min_peak_ratio,
            }),
            ReferenceConfig::WeightedCentroid { min_resultant } => {
                Box::new(WeightedCentroid { min_resultant })
            }
        }
    }
}

/// Every tunable of a profile run. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Circumferential band width (metres of arc).
    pub tape_width: Real,
    /// Cylinder inlier cutoff (metres).
    pub ransac_threshold: Real,
    pub ransac_max_iterations: usize,
    pub min_inlier_fraction: Real,
    pub ransac_confidence: Real,
    /// Neighbourhood size for normal estimation.
    pub normal_neighbors: usize,
    /// Half-width of the axial window around the tread center (metres).
    pub outer_band: Real,
    /// Axial position of the window center relative to the fitted tread center.
    pub axial_center: Real,
    pub nbins: usize,
    pub aggregate: Aggregate,
    /// RANSAC seed; `None` draws one and records it in the report.
    pub seed: Option<u64>,
    /// Pre-downsampling voxel edge, applied by the loader.
    pub voxel: Option<Real>,
    /// Drop band points farther than this from the fitted radius.
    pub max_radial_deviation: Option<Real>,
    pub rim_points: RimPointPolicy,
    /// Baseline RMSE above which a warning is logged.
    pub rim_rmse_warning: Real,
    pub reference: ReferenceConfig,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            tape_width: 0.02,
            ransac_threshold: 0.003,
            ransac_max_iterations: 5000,
            min_inlier_fraction: 0.5,
            ransac_confidence: 0.999,
            normal_neighbors: 12,
            outer_band: 0.05,
            axial_center: 0.0,
            nbins: 200,
            aggregate: Aggregate::Max,
            seed: None,
            voxel: None,
            max_radial_deviation: None,
            rim_points: RimPointPolicy::default(),
            rim_rmse_warning: 0.002,
            reference: ReferenceConfig::default(),
        }
    }
}

fn positive(name: &str, value: Real) -> Result<(), PipelineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PipelineError::InvalidConfig(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

impl ProfilerConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        positive("tape_width", self.tape_width)?;
        positive("ransac_threshold", self.ransac_threshold)?;
        positive("outer_band", self.outer_band)?;
        if !self.axial_center.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "axial_center must be finite".to_string(),
            ));
        }
        if self.ransac_max_iterations == 0 {
            return Err(PipelineError::InvalidConfig(
                "ransac_max_iterations must be positive".to_string(),
            ));
        }
        if self.nbins == 0 {
            return Err(PipelineError::InvalidConfig(
                "nbins must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("min_inlier_fraction", self.min_inlier_fraction),
            ("ransac_confidence", self.ransac_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if let Some(voxel) = self.voxel {
            positive("voxel", voxel)?;
        }
        if let Some(dev) = self.max_radial_deviation {
            positive("max_radial_deviation", dev)?;
        }
        if self.rim_points.min < MIN_RIM_POINTS || self.rim_points.min > self.rim_points.max {
            return Err(PipelineError::InvalidConfig(format!(
                "rim_points must satisfy {} <= min <= max, got min={} max={}",
                MIN_RIM_POINTS, self.rim_points.min, self.rim_points.max
            )));
        }
        match self.reference {
            ReferenceConfig::HistogramPeak { bins, .. } if bins < 8 => {
                return Err(PipelineError::InvalidConfig(format!(
                    "reference histogram needs at least 8 bins, got {bins}"
                )));
            }
            ReferenceConfig::WeightedCentroid { min_resultant }
                if !(0.0..=1.0).contains(&min_resultant) =>
            {
                return Err(PipelineError::InvalidConfig(format!(
                    "min_resultant must be in [0, 1], got {min_resultant}"
                )));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn cylinder_options(&self) -> CylinderFitOptions {
        CylinderFitOptions {
            distance_threshold: self.ransac_threshold,
            max_iterations: self.ransac_max_iterations,
            min_inlier_fraction: self.min_inlier_fraction,
            confidence: self.ransac_confidence,
            normal_neighbors: self.normal_neighbors,
            ..CylinderFitOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ProfilerConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ProfilerConfig = serde_json::from_str(
            r#"{"tape_width": 0.03, "nbins": 50, "aggregate": "median",
                "reference": {"kind": "weighted_centroid", "min_resultant": 0.2}}"#,
        )
        .unwrap();
        assert_eq!(cfg.tape_width, 0.03);
        assert_eq!(cfg.nbins, 50);
        assert_eq!(cfg.aggregate, Aggregate::Median);
        assert_eq!(cfg.outer_band, 0.05);
        assert_eq!(cfg.rim_points, RimPointPolicy { min: 3, max: 10 });
        assert_eq!(
            cfg.reference,
            ReferenceConfig::WeightedCentroid { min_resultant: 0.2 }
        );
        cfg.validate().unwrap();
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad = [
            ProfilerConfig {
                tape_width: 0.0,
                ..ProfilerConfig::default()
            },
            ProfilerConfig {
                nbins: 0,
                ..ProfilerConfig::default()
            },
            ProfilerConfig {
                min_inlier_fraction: 1.5,
                ..ProfilerConfig::default()
            },
            ProfilerConfig {
                rim_points: RimPointPolicy { min: 2, max: 10 },
                ..ProfilerConfig::default()
            },
            ProfilerConfig {
                rim_points: RimPointPolicy { min: 6, max: 5 },
                ..ProfilerConfig::default()
            },
            ProfilerConfig {
                voxel: Some(-1.0),
                ..ProfilerConfig::default()
            },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(PipelineError::InvalidConfig(_))));
        }
    }
}
