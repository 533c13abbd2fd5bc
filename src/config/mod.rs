//! Configuration management for WeatherBot
//!
//! Loads from YAML files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub strategy: StrategyConfig,
    pub guard: ForecastGuardConfig,
    /// Monitored locations keyed by name
    #[serde(default)]
    pub locations: HashMap<String, LocationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Bot version tag for logging
    pub tag: String,
    /// Dry run mode (signals are logged, never acted on)
    pub dry_run: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let model = FitWeights::default();
        let res = ResonanceConfig::default();
        let ph = PhasedConfig::default();
        let guard = ForecastGuardConfig::default();

        let mut builder = Config::builder()
            .set_default("bot.tag", env!("CARGO_PKG_VERSION"))?
            .set_default("bot.dry_run", true)?
            // Fit model defaults
            .set_default("strategy.model.w1", model.w1)?
            .set_default("strategy.model.w2", model.w2)?
            .set_default("strategy.model.bias", model.bias)?
            // Resonance strategy defaults
            .set_default(
                "strategy.resonance.max_source_divergence",
                res.max_source_divergence,
            )?
            .set_default("strategy.resonance.avoidance_width", res.avoidance_width)?
            .set_default(
                "strategy.resonance.require_forecast_drop",
                res.require_forecast_drop,
            )?
            .set_default(
                "strategy.resonance.min_resonance_sources",
                res.min_resonance_sources as i64,
            )?
            .set_default(
                "strategy.resonance.total_required_drops",
                res.total_required_drops as i64,
            )?
            .set_default(
                "strategy.resonance.require_anchor_drop",
                res.require_anchor_drop,
            )?
            .set_default("strategy.resonance.peak_hour_start", res.peak_hour_start)?
            .set_default("strategy.resonance.peak_hour_end", res.peak_hour_end)?
            // Phased strategy defaults
            .set_default("strategy.phased.force_buy_time", ph.force_buy_time)?
            .set_default("strategy.phased.peak_trigger_start", ph.peak_trigger_start)?
            .set_default(
                "strategy.phased.outlier_detection_enabled",
                ph.outlier_detection_enabled,
            )?
            .set_default("strategy.phased.outlier_threshold", ph.outlier_threshold)?
            // Forecast guard defaults
            .set_default("guard.enabled", guard.enabled)?
            .set_default("guard.fail_safe", guard.fail_safe)?
            .set_default("guard.anchor_lock_streak", guard.anchor_lock_streak as i64)?
            .set_default(
                "guard.recalc_interval_secs",
                guard.recalc_interval_secs as i64,
            )?
            .set_default(
                "guard.risk_source_threshold",
                guard.risk_source_threshold as i64,
            )?
            .set_default("guard.peak_threshold_c", guard.peak_threshold_c)?
            .set_default("guard.peak_min_points", guard.peak_min_points as i64)?
            .set_default("guard.peak_prominence_c", guard.peak_prominence_c)?
            .set_default("guard.peak_passed_minutes", guard.peak_passed_minutes)?
            .set_default("guard.unlock_anchor_drop_c", guard.unlock_anchor_drop_c)?
            .set_default("guard.unlock_aux_drop_c", guard.unlock_aux_drop_c)?
            .set_default(
                "guard.unlock_future_warming_c",
                guard.unlock_future_warming_c,
            )?;

        for (key, phase) in [
            ("phase1", &ph.phase1),
            ("phase2", &ph.phase2),
            ("phase3", &ph.phase3),
        ] {
            let prefix = format!("strategy.phased.{}", key);
            builder = builder
                .set_default(format!("{}.start", prefix), phase.start)?
                .set_default(
                    format!("{}.required_resonance", prefix),
                    phase.required_resonance as i64,
                )?
                .set_default(
                    format!("{}.required_duration", prefix),
                    phase.required_duration as i64,
                )?
                .set_default(format!("{}.depth", prefix), phase.depth)?
                .set_default(format!("{}.anchor_required", prefix), phase.anchor_required)?;
        }

        let config = builder
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (WEATHERBOT_*)
            .add_source(Environment::with_prefix("WEATHERBOT").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Look up a location by name
    pub fn location(&self, name: &str) -> Option<&LocationConfig> {
        self.locations.get(name)
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        let mut locations: Vec<&str> = self.locations.keys().map(String::as_str).collect();
        locations.sort_unstable();
        format!(
            "bot={} locations={:?} dry_run={} fit=({:.3},{:.3},{:+.2}) force_buy={:.2} guard={}",
            self.bot.tag,
            locations,
            self.bot.dry_run,
            self.strategy.model.w1,
            self.strategy.model.w2,
            self.strategy.model.bias,
            self.strategy.phased.force_buy_time,
            if self.guard.enabled { "on" } else { "off" }
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
