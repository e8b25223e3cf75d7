use crate::cli::AnalyzeArgs;
use crate::error::{CliError, Result};
use hydrocorr::core::analysis::smoothing::WindowKind;
use hydrocorr::core::models::layout::{MoleculeLayout, Site};
use hydrocorr::engine::config::{
    AnalysisConfig, AnalysisConfigBuilder, CacheConfig, CacheValidation, HistogramConfig,
    MarkerConfig, PairDistributionConfig, SmoothingConfig,
};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_TIMESTEP_FS: f64 = 2.0;
pub const DEFAULT_MAX_FRAMES: usize = 10001;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialTrajectoryConfig {
    #[serde(rename = "timestep-fs")]
    timestep_fs: Option<f64>,
    #[serde(rename = "max-frames")]
    max_frames: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialMoleculeConfig {
    species: Option<Vec<String>>,
    masses: Option<Vec<f64>>,
    charges: Option<Vec<f64>>,
    count: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSmoothingConfig {
    window: Option<String>,
    length: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialHistogramConfig {
    start: Option<f64>,
    end: Option<f64>,
    edges: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialPairDistributionConfig {
    start: Option<f64>,
    end: Option<f64>,
    edges: Option<usize>,
    #[serde(rename = "box-length")]
    box_length: Option<f64>,
    #[serde(rename = "frame-stride")]
    frame_stride: Option<usize>,
    #[serde(rename = "include-self-pairs")]
    include_self_pairs: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialCacheValidation {
    ContentHash,
    FileName,
}

impl FromStr for PartialCacheValidation {
    type Err = CliError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "content-hash" => Ok(Self::ContentHash),
            "file-name" => Ok(Self::FileName),
            other => Err(CliError::Config(format!(
                "Invalid cache validation '{}'. Expected 'content-hash' or 'file-name'.",
                other
            ))),
        }
    }
}

impl From<PartialCacheValidation> for CacheValidation {
    fn from(p: PartialCacheValidation) -> Self {
        match p {
            PartialCacheValidation::ContentHash => CacheValidation::ContentHash,
            PartialCacheValidation::FileName => CacheValidation::FileName,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialCacheConfig {
    enabled: Option<bool>,
    validation: Option<PartialCacheValidation>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialMarkerConfig {
    suffix: Option<String>,
    #[serde(rename = "write-on-completion")]
    write_on_completion: Option<bool>,
}

/// Analysis settings as read from a TOML file; every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialAnalysisConfig {
    trajectory: Option<PartialTrajectoryConfig>,
    molecule: Option<PartialMoleculeConfig>,
    smoothing: Option<PartialSmoothingConfig>,
    #[serde(rename = "bond-length")]
    bond_length: Option<PartialHistogramConfig>,
    #[serde(rename = "pair-distribution")]
    pair_distribution: Option<PartialPairDistributionConfig>,
    cache: Option<PartialCacheConfig>,
    markers: Option<PartialMarkerConfig>,
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn parse_list<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<Vec<T>> {
    value
        .split(',')
        .map(|item| parse_value(key, item.trim(), kind))
        .collect()
}

impl PartialAnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Resolves the final configuration: CLI flags, then `--set` values,
    /// then the file, then built-in defaults.
    pub fn merge_with_cli(mut self, args: &AnalyzeArgs) -> Result<AnalysisConfig> {
        self.apply_set_values(&args.set_values)?;
        debug!("Configuration after --set overrides: {:?}", &self);

        let trajectory = self.trajectory.take().unwrap_or_default();
        let timestep_fs = args
            .timestep
            .or(trajectory.timestep_fs)
            .unwrap_or(DEFAULT_TIMESTEP_FS);
        let max_frames = args
            .max_frames
            .or(trajectory.max_frames)
            .unwrap_or(DEFAULT_MAX_FRAMES);

        let mut cache = CacheConfig::default();
        if let Some(file_cache) = self.cache.take() {
            cache.enabled = file_cache.enabled.unwrap_or(cache.enabled);
            if let Some(validation) = file_cache.validation {
                cache.validation = validation.into();
            }
        }
        if args.no_cache {
            cache.enabled = false;
        }

        AnalysisConfigBuilder::new()
            .timestep_fs(timestep_fs)
            .max_frames(max_frames)
            .layout(Self::merge_layout(self.molecule.take())?)
            .smoothing(Self::merge_smoothing(self.smoothing.take())?)
            .bond_histogram(Self::merge_histogram(
                self.bond_length.take(),
                HistogramConfig::BOND_LENGTH,
            ))
            .pair_distribution(Self::merge_pair_distribution(
                self.pair_distribution.take(),
            ))
            .cache(cache)
            .markers(Self::merge_markers(self.markers.take()))
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_layout(molecule: Option<PartialMoleculeConfig>) -> Result<MoleculeLayout> {
        let Some(molecule) = molecule else {
            return Ok(MoleculeLayout::default());
        };
        let count = molecule.count;
        match (molecule.species, molecule.masses, molecule.charges) {
            (None, None, None) => {
                MoleculeLayout::new(MoleculeLayout::water(None).sites().to_vec(), count)
                    .map_err(|e| CliError::Config(e.to_string()))
            }
            (Some(species), Some(masses), Some(charges)) => {
                if species.len() != masses.len() || species.len() != charges.len() {
                    return Err(CliError::Config(format!(
                        "molecule.species, masses and charges must have equal lengths (got {}, {}, {})",
                        species.len(),
                        masses.len(),
                        charges.len()
                    )));
                }
                let sites = species
                    .iter()
                    .zip(masses)
                    .zip(charges)
                    .map(|((s, m), q)| Site::new(s, m, q))
                    .collect();
                MoleculeLayout::new(sites, count).map_err(|e| CliError::Config(e.to_string()))
            }
            _ => Err(CliError::Config(
                "molecule.species, masses and charges must be given together".to_string(),
            )),
        }
    }

    fn merge_smoothing(smoothing: Option<PartialSmoothingConfig>) -> Result<SmoothingConfig> {
        let defaults = SmoothingConfig::default();
        let Some(smoothing) = smoothing else {
            return Ok(defaults);
        };
        let window = match smoothing.window {
            Some(name) => name
                .parse::<WindowKind>()
                .map_err(|e| CliError::Config(e.to_string()))?,
            None => defaults.window,
        };
        Ok(SmoothingConfig {
            window,
            length: smoothing.length.unwrap_or(defaults.length),
        })
    }

    fn merge_histogram(
        partial: Option<PartialHistogramConfig>,
        defaults: HistogramConfig,
    ) -> HistogramConfig {
        let partial = partial.unwrap_or_default();
        HistogramConfig {
            start: partial.start.unwrap_or(defaults.start),
            end: partial.end.unwrap_or(defaults.end),
            edges: partial.edges.unwrap_or(defaults.edges),
        }
    }

    fn merge_pair_distribution(
        partial: Option<PartialPairDistributionConfig>,
    ) -> PairDistributionConfig {
        let defaults = PairDistributionConfig::default();
        let partial = partial.unwrap_or_default();
        PairDistributionConfig {
            bins: HistogramConfig {
                start: partial.start.unwrap_or(defaults.bins.start),
                end: partial.end.unwrap_or(defaults.bins.end),
                edges: partial.edges.unwrap_or(defaults.bins.edges),
            },
            box_length: partial.box_length.unwrap_or(defaults.box_length),
            frame_stride: partial.frame_stride.unwrap_or(defaults.frame_stride),
            include_self_pairs: partial
                .include_self_pairs
                .unwrap_or(defaults.include_self_pairs),
        }
    }

    fn merge_markers(partial: Option<PartialMarkerConfig>) -> MarkerConfig {
        let defaults = MarkerConfig::default();
        let partial = partial.unwrap_or_default();
        MarkerConfig {
            suffix: partial.suffix.unwrap_or(defaults.suffix),
            write_on_completion: partial
                .write_on_completion
                .unwrap_or(defaults.write_on_completion),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        if set_values.is_empty() {
            return Ok(());
        }
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "trajectory.timestep-fs" => {
                    self.trajectory
                        .get_or_insert_with(Default::default)
                        .timestep_fs = Some(parse_value(key, value_str, "float")?);
                }
                "trajectory.max-frames" => {
                    self.trajectory
                        .get_or_insert_with(Default::default)
                        .max_frames = Some(parse_value(key, value_str, "integer")?);
                }
                "molecule.species" => {
                    self.molecule.get_or_insert_with(Default::default).species =
                        Some(value_str.split(',').map(|s| s.trim().to_string()).collect());
                }
                "molecule.masses" => {
                    self.molecule.get_or_insert_with(Default::default).masses =
                        Some(parse_list(key, value_str, "float")?);
                }
                "molecule.charges" => {
                    self.molecule.get_or_insert_with(Default::default).charges =
                        Some(parse_list(key, value_str, "float")?);
                }
                "molecule.count" => {
                    self.molecule.get_or_insert_with(Default::default).count =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "smoothing.window" => {
                    self.smoothing.get_or_insert_with(Default::default).window =
                        Some(value_str.to_string());
                }
                "smoothing.length" => {
                    self.smoothing.get_or_insert_with(Default::default).length =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "bond-length.start" => {
                    self.bond_length.get_or_insert_with(Default::default).start =
                        Some(parse_value(key, value_str, "float")?);
                }
                "bond-length.end" => {
                    self.bond_length.get_or_insert_with(Default::default).end =
                        Some(parse_value(key, value_str, "float")?);
                }
                "bond-length.edges" => {
                    self.bond_length.get_or_insert_with(Default::default).edges =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "pair-distribution.start" => {
                    self.pair_distribution
                        .get_or_insert_with(Default::default)
                        .start = Some(parse_value(key, value_str, "float")?);
                }
                "pair-distribution.end" => {
                    self.pair_distribution
                        .get_or_insert_with(Default::default)
                        .end = Some(parse_value(key, value_str, "float")?);
                }
                "pair-distribution.edges" => {
                    self.pair_distribution
                        .get_or_insert_with(Default::default)
                        .edges = Some(parse_value(key, value_str, "integer")?);
                }
                "pair-distribution.box-length" => {
                    self.pair_distribution
                        .get_or_insert_with(Default::default)
                        .box_length = Some(parse_value(key, value_str, "float")?);
                }
                "pair-distribution.frame-stride" => {
                    self.pair_distribution
                        .get_or_insert_with(Default::default)
                        .frame_stride = Some(parse_value(key, value_str, "integer")?);
                }
                "pair-distribution.include-self-pairs" => {
                    self.pair_distribution
                        .get_or_insert_with(Default::default)
                        .include_self_pairs = Some(parse_value(key, value_str, "boolean")?);
                }
                "cache.enabled" => {
                    self.cache.get_or_insert_with(Default::default).enabled =
                        Some(parse_value(key, value_str, "boolean")?);
                }
                "cache.validation" => {
                    self.cache.get_or_insert_with(Default::default).validation =
                        Some(value_str.parse()?);
                }
                "markers.suffix" => {
                    self.markers.get_or_insert_with(Default::default).suffix =
                        Some(value_str.to_string());
                }
                "markers.write-on-completion" => {
                    self.markers
                        .get_or_insert_with(Default::default)
                        .write_on_completion = Some(parse_value(key, value_str, "boolean")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unknown configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_config_file(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("hydrocorr.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn analyze_args(extra: &[&str]) -> AnalyzeArgs {
        let mut argv = vec!["hydrocorr", "analyze", "runs"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Analyze(args) => args,
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let config = PartialAnalysisConfig::default()
            .merge_with_cli(&analyze_args(&[]))
            .unwrap();

        assert_eq!(config.timestep_fs, DEFAULT_TIMESTEP_FS);
        assert_eq!(config.max_frames, DEFAULT_MAX_FRAMES);
        assert_eq!(config.smoothing, SmoothingConfig::default());
        assert_eq!(config.bond_histogram, HistogramConfig::BOND_LENGTH);
        assert_eq!(config.pair_distribution, PairDistributionConfig::default());
        assert!(config.cache.enabled);
        assert_eq!(config.markers.suffix, "dd");
    }

    #[test]
    fn file_values_are_loaded_and_merged_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config_file(
            &dir,
            r#"
            [trajectory]
            timestep-fs = 0.5

            [smoothing]
            window = "blackman"
            length = 21

            [pair-distribution]
            box-length = 24.8
            include-self-pairs = true

            [cache]
            validation = "file-name"
            "#,
        );

        let config = PartialAnalysisConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&analyze_args(&[]))
            .unwrap();

        assert_eq!(config.timestep_fs, 0.5);
        assert_eq!(config.max_frames, DEFAULT_MAX_FRAMES);
        assert_eq!(config.smoothing.window, WindowKind::Blackman);
        assert_eq!(config.smoothing.length, 21);
        assert_eq!(config.pair_distribution.box_length, 24.8);
        assert!(config.pair_distribution.include_self_pairs);
        assert_eq!(config.pair_distribution.frame_stride, 10);
        assert_eq!(config.cache.validation, CacheValidation::FileName);
    }

    #[test]
    fn cli_overrides_set_values_which_override_the_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config_file(
            &dir,
            r#"
            [trajectory]
            timestep-fs = 0.5
            max-frames = 500

            [markers]
            suffix = "done"
            "#,
        );

        let args = analyze_args(&[
            "--timestep",
            "1.0",
            "-S",
            "trajectory.timestep-fs=4.0",
            "trajectory.max-frames=800",
            "markers.suffix=ok",
        ]);
        let config = PartialAnalysisConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.timestep_fs, 1.0);
        assert_eq!(config.max_frames, 800);
        assert_eq!(config.markers.suffix, "ok");
    }

    #[test]
    fn no_cache_flag_disables_the_snapshot_cache() {
        let config = PartialAnalysisConfig::default()
            .merge_with_cli(&analyze_args(&["--no-cache"]))
            .unwrap();
        assert!(!config.cache.enabled);
    }

    #[test]
    fn custom_molecule_layout_is_built_from_parallel_lists() {
        let args = analyze_args(&[
            "-S",
            "molecule.species=O,D,D",
            "molecule.masses=15.9994,2.0141,2.0141",
            "molecule.charges=-0.8476,0.4238,0.4238",
            "molecule.count=216",
        ]);
        let config = PartialAnalysisConfig::default()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.layout.sites_per_molecule(), 3);
        assert_eq!(config.layout.sites()[1].species, "D");
        assert_eq!(config.layout.sites()[1].mass, 2.0141);
        assert_eq!(config.layout.configured_molecule_count(), Some(216));
    }

    #[test]
    fn molecule_lists_of_unequal_length_are_rejected() {
        let args = analyze_args(&[
            "-S",
            "molecule.species=O,H,H",
            "molecule.masses=15.9994,1.008",
            "molecule.charges=-1.0,0.5,0.5",
        ]);
        let result = PartialAnalysisConfig::default().merge_with_cli(&args);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn molecule_count_alone_keeps_the_water_sites() {
        let args = analyze_args(&["-S", "molecule.count=64"]);
        let config = PartialAnalysisConfig::default()
            .merge_with_cli(&args)
            .unwrap();
        assert_eq!(config.layout.sites(), MoleculeLayout::water(None).sites());
        assert_eq!(config.layout.configured_molecule_count(), Some(64));
    }

    #[test]
    fn unknown_keys_are_rejected_in_files_and_overrides() {
        let dir = TempDir::new().unwrap();
        let path = write_config_file(&dir, "[smoothing]\nwidth = 3\n");
        assert!(matches!(
            PartialAnalysisConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));

        let result = PartialAnalysisConfig::default()
            .merge_with_cli(&analyze_args(&["-S", "smoothing.width=3"]));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn malformed_override_values_are_rejected() {
        for set in [
            "trajectory.max-frames=many",
            "smoothing.window=gaussian",
            "cache.validation=mtime",
            "timestep",
        ] {
            let result =
                PartialAnalysisConfig::default().merge_with_cli(&analyze_args(&["-S", set]));
            assert!(matches!(result, Err(CliError::Config(_))), "{}", set);
        }
    }

    #[test]
    fn invalid_merged_values_surface_as_config_errors() {
        let result = PartialAnalysisConfig::default()
            .merge_with_cli(&analyze_args(&["-S", "smoothing.length=10"]));
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
