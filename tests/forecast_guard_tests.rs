//! Tests for the Forecast Guard

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use mockall::mock;
    use weatherbot::config::{ForecastGuardConfig, LocationConfig, StrategyConfig};
    use weatherbot::oracle::{BoundedHistory, ReadingState};
    use weatherbot::risk::{
        ForecastError, ForecastGuard, ForecastPoint, ForecastSource, StaticForecast,
    };
    use weatherbot::strategy::evaluate_phased_strategy;
    use weatherbot::types::Signal;

    mock! {
        pub Source {}

        impl ForecastSource for Source {
            fn name(&self) -> &'static str;
            fn hourly_forecast(
                &self,
                location: &LocationConfig,
            ) -> Result<Vec<ForecastPoint>, ForecastError>;
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 12, h, m, 0).unwrap()
    }

    fn curve(temps: &[(u32, f64)]) -> Vec<ForecastPoint> {
        temps
            .iter()
            .map(|&(h, t)| ForecastPoint::new(at(h, 0), t))
            .collect()
    }

    /// Afternoon plateau at 10.0, dip to 9.0, night rebound back to 10.0 at 19:00
    fn rebound_curve() -> Vec<ForecastPoint> {
        curve(&[
            (12, 9.0),
            (13, 10.0),
            (14, 10.0),
            (15, 10.0),
            (16, 9.5),
            (17, 9.0),
            (18, 9.5),
            (19, 10.0),
            (20, 9.6),
            (21, 9.2),
            (22, 8.0),
            (23, 7.0),
        ])
    }

    /// Same rebound, but the night stays above the risk line until 23:00
    fn late_rebound_curve() -> Vec<ForecastPoint> {
        curve(&[
            (12, 9.0),
            (13, 10.0),
            (14, 10.0),
            (15, 10.0),
            (16, 9.5),
            (17, 9.0),
            (18, 9.5),
            (19, 10.0),
            (20, 9.6),
            (21, 9.2),
            (22, 9.0),
            (23, 8.9),
        ])
    }

    /// Rebound whose tail warms again after 22:00
    fn rewarming_curve() -> Vec<ForecastPoint> {
        let mut points = rebound_curve();
        if let Some(last) = points.last_mut() {
            last.temp_c = 8.6;
        }
        points
    }

    fn cooling_curve() -> Vec<ForecastPoint> {
        curve(&[
            (12, 9.0),
            (14, 10.0),
            (16, 9.8),
            (17, 9.6),
            (18, 9.4),
            (19, 9.2),
            (20, 9.0),
            (22, 8.0),
        ])
    }

    fn source(
        name: &'static str,
        points: Vec<ForecastPoint>,
        calls: usize,
    ) -> Box<dyn ForecastSource> {
        let mut mock = MockSource::new();
        mock.expect_name().return_const(name);
        mock.expect_hourly_forecast()
            .times(calls)
            .returning(move |_| Ok(points.clone()));
        Box::new(mock)
    }

    /// Serves `curves` one per fetch, repeating the last one
    fn sequenced(name: &'static str, curves: Vec<Vec<ForecastPoint>>) -> Box<dyn ForecastSource> {
        let mut mock = MockSource::new();
        let mut fetches = 0usize;
        mock.expect_name().return_const(name);
        mock.expect_hourly_forecast().returning(move |_| {
            let idx = fetches.min(curves.len() - 1);
            fetches += 1;
            Ok(curves[idx].clone())
        });
        Box::new(mock)
    }

    fn failing(name: &'static str) -> Box<dyn ForecastSource> {
        let mut mock = MockSource::new();
        mock.expect_name().return_const(name);
        mock.expect_hourly_forecast().returning(move |_| {
            Err(ForecastError::Unavailable {
                source_name: name.to_string(),
                reason: "HTTP 503".to_string(),
            })
        });
        Box::new(mock)
    }

    fn london() -> LocationConfig {
        LocationConfig::new("EGLC", 51.5048, 0.0495, 0.0)
    }

    fn state(anchor: Option<f64>) -> ReadingState {
        let mut state = ReadingState::default();
        state.anchor_current = anchor;
        state.running_max_anchor = 10.0;
        state
    }

    fn cooling_state(anchor: f64) -> ReadingState {
        let mut state = state(Some(anchor));
        state.anchor_history = BoundedHistory::from(vec![anchor + 1.0, anchor + 0.6, anchor]);
        state.aux_a_history = BoundedHistory::from(vec![anchor + 1.2, anchor + 0.8, anchor + 0.4]);
        state
    }

    // ============================================================================
    // Lock / unlock hysteresis
    // ============================================================================

    #[test]
    fn test_lock_holds_until_window_end_plus_grace() {
        let mut guard = ForecastGuard::new(
            ForecastGuardConfig::default(),
            vec![
                source("alpha", rebound_curve(), 3),
                source("beta", rebound_curve(), 3),
            ],
        );

        let result = guard.assess_at(at(15, 0), "london", &state(Some(10.0)), &london());
        assert!(result.locked);
        assert_eq!(result.risk_count, 2);
        assert!(result.reason.starts_with("Risky forecast sources 2"));
        assert_eq!(result.latest_risky_window_end, Some(at(21, 0)));
        assert_eq!(result.risky_sources(), vec!["alpha", "beta"]);
        let entry = guard.entry("london").unwrap();
        assert_eq!(entry.lock_peak_anchor_time, Some(at(21, 0)));

        // Cooling confirmed but still inside the grace period
        let result = guard.assess_at(at(21, 30), "london", &cooling_state(9.0), &london());
        assert!(result.locked);

        let result = guard.assess_at(at(22, 30), "london", &cooling_state(8.0), &london());
        assert!(!result.locked);
        assert!(result.reason.starts_with("Unlocked"));
        assert!(!guard.entry("london").unwrap().locked);
    }

    #[test]
    fn test_unlock_requires_measured_cooling() {
        let mut guard = ForecastGuard::new(
            ForecastGuardConfig::default(),
            vec![
                source("alpha", rebound_curve(), 2),
                source("beta", rebound_curve(), 2),
            ],
        );

        assert!(guard.assess_at(at(15, 0), "london", &state(Some(10.0)), &london()).locked);

        // Past the grace period, anchor cooling but no auxiliary confirmation
        let mut warm = state(Some(8.0));
        warm.anchor_history = BoundedHistory::from(vec![9.0, 8.6, 8.0]);
        warm.aux_a_history = BoundedHistory::from(vec![8.0, 8.2, 8.4]);
        let result = guard.assess_at(at(22, 30), "london", &warm, &london());
        assert!(result.locked);
    }

    #[test]
    fn test_single_risky_source_does_not_lock() {
        let cfg = ForecastGuardConfig {
            risk_source_threshold: 1,
            ..Default::default()
        };
        let mut guard = ForecastGuard::new(
            cfg,
            vec![
                source("alpha", rebound_curve(), 1),
                source("beta", cooling_curve(), 1),
            ],
        );

        let result = guard.assess_at(at(15, 0), "london", &state(Some(10.0)), &london());
        assert_eq!(result.risk_count, 1);
        assert!(!result.locked);
        assert!(result.sources["beta"].window.is_none());
    }

    #[test]
    fn test_lock_reference_only_moves_forward() {
        let curves = vec![rebound_curve(), late_rebound_curve(), rebound_curve()];
        let mut guard = ForecastGuard::new(
            ForecastGuardConfig::default(),
            vec![
                sequenced("alpha", curves.clone()),
                sequenced("beta", curves),
            ],
        );

        assert!(guard.assess_at(at(15, 0), "london", &state(Some(10.0)), &london()).locked);
        assert_eq!(
            guard.entry("london").unwrap().lock_peak_anchor_time,
            Some(at(21, 0))
        );

        let result = guard.assess_at(at(16, 0), "london", &state(Some(9.5)), &london());
        assert!(result.locked);
        assert_eq!(result.latest_risky_window_end, Some(at(23, 0)));
        assert_eq!(
            guard.entry("london").unwrap().lock_peak_anchor_time,
            Some(at(23, 0))
        );

        // Earlier-ending window on the next refresh leaves the reference alone
        let result = guard.assess_at(at(17, 0), "london", &state(Some(9.0)), &london());
        assert!(result.locked);
        assert_eq!(result.latest_risky_window_end, Some(at(21, 0)));
        assert_eq!(
            guard.entry("london").unwrap().lock_peak_anchor_time,
            Some(at(23, 0))
        );
    }

    #[test]
    fn test_unlock_requires_forecast_cooling() {
        let curves = vec![rebound_curve(), rewarming_curve()];
        let mut guard = ForecastGuard::new(
            ForecastGuardConfig::default(),
            vec![
                sequenced("alpha", curves.clone()),
                sequenced("beta", curves),
            ],
        );

        assert!(guard.assess_at(at(15, 0), "london", &state(Some(10.0)), &london()).locked);

        // Grace period over and measurements cooling, forecasts warm 0.6 by 23:00
        let result = guard.assess_at(at(22, 30), "london", &cooling_state(8.0), &london());
        assert!(result.locked);
        assert!(result.max_2h_warming.unwrap() > 0.5);
        assert!(guard.entry("london").unwrap().locked);
    }

    #[test]
    fn test_extreme_durations_do_not_panic() {
        let cfg = ForecastGuardConfig {
            recalc_interval_secs: 10_000_000_000_000_000,
            peak_passed_minutes: i64::MAX,
            ..Default::default()
        };
        let mut guard = ForecastGuard::new(
            cfg,
            vec![
                source("alpha", rebound_curve(), 1),
                source("beta", rebound_curve(), 1),
            ],
        );
        assert_eq!(guard.config().peak_passed_minutes, i64::MAX);

        assert!(guard.assess_at(at(15, 0), "london", &state(Some(10.0)), &london()).locked);

        // Cached report is kept and the unlock deadline is never reached
        let result = guard.assess_at(at(23, 30), "london", &cooling_state(7.0), &london());
        assert!(result.locked);
        assert_eq!(
            guard.entry("london").unwrap().last_refresh_time,
            Some(at(15, 0))
        );
    }

    // ============================================================================
    // Memoization and degradation
    // ============================================================================

    #[test]
    fn test_report_reused_within_interval() {
        let mut guard = ForecastGuard::new(
            ForecastGuardConfig::default(),
            vec![
                source("alpha", cooling_curve(), 1),
                source("beta", cooling_curve(), 1),
            ],
        );

        for minute in [0, 10, 29] {
            let result = guard.assess_at(at(15, minute), "london", &state(Some(9.8)), &london());
            assert!(!result.locked);
            assert_eq!(result.available_sources, 2);
        }
    }

    #[test]
    fn test_locations_keep_separate_entries() {
        let mut guard = ForecastGuard::new(
            ForecastGuardConfig::default(),
            vec![
                source("alpha", cooling_curve(), 2),
                source("beta", cooling_curve(), 2),
            ],
        );

        guard.assess_at(at(15, 0), "london", &state(Some(9.8)), &london());
        guard.assess_at(at(15, 5), "paris", &state(Some(9.8)), &london());
        assert!(guard.entry("london").is_some());
        assert!(guard.entry("paris").is_some());
    }

    #[test]
    fn test_partial_fetch_failure_keeps_remaining_sources() {
        let mut guard = ForecastGuard::new(
            ForecastGuardConfig::default(),
            vec![source("alpha", cooling_curve(), 1), failing("beta")],
        );

        let result = guard.assess_at(at(15, 0), "london", &state(Some(9.8)), &london());
        assert_eq!(result.available_sources, 1);
        assert!(!result.locked);
        let report = guard.entry("london").unwrap().cached_report.clone().unwrap();
        assert_eq!(report.failed_sources, vec!["beta".to_string()]);
    }

    #[test]
    fn test_total_fetch_failure_degrades_to_zero_risk() {
        let cfg = ForecastGuardConfig {
            fail_safe: false,
            ..Default::default()
        };
        let mut guard = ForecastGuard::new(cfg, vec![failing("alpha"), failing("beta")]);

        let result = guard.assess_at(at(15, 0), "london", &state(Some(9.8)), &london());
        assert!(!result.locked);
        assert_eq!(result.risk_count, 0);
        assert!(result.reason.starts_with("Guard fetch failed"));
        assert!(result.reason.contains("HTTP 503"));
    }

    // ============================================================================
    // Missing anchor fail-safe
    // ============================================================================

    #[test]
    fn test_missing_anchor_never_consults_sources() {
        // No forecast expectation: any fetch would panic
        let mut silent = MockSource::new();
        silent.expect_name().return_const("silent");
        let sources: Vec<Box<dyn ForecastSource>> = vec![Box::new(silent)];
        let mut guard = ForecastGuard::new(ForecastGuardConfig::default(), sources);

        let streaks: Vec<(bool, Option<u32>)> = (0..4)
            .map(|i| {
                let r = guard.assess_at(at(15, i), "london", &state(None), &london());
                (r.locked, r.anchor_miss_streak)
            })
            .collect();

        assert_eq!(
            streaks,
            vec![
                (false, Some(1)),
                (false, Some(2)),
                (true, Some(3)),
                (true, Some(4)),
            ]
        );
    }

    // ============================================================================
    // Kernel integration
    // ============================================================================

    #[test]
    fn test_locked_guard_vetoes_force_buy() {
        let mut guard = ForecastGuard::new(
            ForecastGuardConfig::default(),
            vec![
                source("alpha", rebound_curve(), 1),
                source("beta", rebound_curve(), 1),
            ],
        );
        let mut reading = state(Some(10.0));
        reading.local_hour = 17.0;

        let verdict = guard.assess_at(at(17, 0), "london", &reading, &london());
        let cfg = StrategyConfig::default();
        let decision = evaluate_phased_strategy(
            &reading,
            &cfg,
            reading.daily_max_anchor(),
            false,
            Some(&verdict),
        );
        assert_eq!(decision.signal(), Signal::Wait);
        assert!(decision.reason().contains("LOCKED"));
    }

    #[test]
    fn test_disabled_guard_is_transparent() {
        let cfg = ForecastGuardConfig {
            enabled: false,
            ..Default::default()
        };
        let mut guard = ForecastGuard::new(
            cfg,
            vec![Box::new(StaticForecast::new("alpha", rebound_curve()))],
        );
        let mut reading = state(Some(10.0));
        reading.local_hour = 17.0;

        let verdict = guard.assess_at(at(17, 0), "london", &reading, &london());
        assert!(!verdict.enabled);
        let decision = evaluate_phased_strategy(
            &reading,
            &StrategyConfig::default(),
            reading.daily_max_anchor(),
            false,
            Some(&verdict),
        );
        assert_eq!(decision.signal(), Signal::BuyForce);
    }

    #[test]
    fn test_guard_result_serializes() {
        let mut guard = ForecastGuard::new(
            ForecastGuardConfig::default(),
            vec![
                source("alpha", rebound_curve(), 1),
                source("beta", cooling_curve(), 1),
            ],
        );
        let result = guard.assess_at(at(15, 0), "london", &state(Some(10.0)), &london());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["locked"], false);
        assert_eq!(json["risk_count"], 1);
        assert_eq!(json["sources"]["alpha"]["risky"], true);
        assert_eq!(json["sources"]["alpha"]["window"]["duration_points"], 5);
    }
}
