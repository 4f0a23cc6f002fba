//! Fluctuation alert evaluation
//!
//! Runs on the sync task after a successful write. The rolling average is
//! recomputed at most once per calendar day and persisted so it survives
//! restarts; everything else is re-derived from the repository and the config
//! store on every evaluation, so a crash only delays the next evaluation.

use crate::config::ConfigStore;
use crate::db::models::NewRate;
use crate::db::resource::{days_before, SortOrder};
use crate::db::ForexDb;
use crate::error::Result;
use crate::events::{AlertNotification, Event, EventBus, FluctuationDirection};
use std::sync::Arc;

/// Percentage deviation of `current` from `average`, as a magnitude plus
/// direction. The raw value frames the current rate as a percentage of the
/// average, so a rise comes out negative and is flipped to `Positive` here.
/// `None` when either input is non-positive (undefined, not evaluable).
pub fn fluctuation(current: f64, average: f64) -> Option<(f64, FluctuationDirection)> {
    if current <= 0.0 || average <= 0.0 {
        return None;
    }
    let raw = 100.0 - (current * 100.0 / average);
    if raw < 0.0 {
        Some((-raw, FluctuationDirection::Positive))
    } else {
        Some((raw, FluctuationDirection::Negative))
    }
}

/// Evaluates the configured alert against each sync cycle's fresh data
pub struct AlertEvaluator {
    db: Arc<ForexDb>,
    config: Arc<ConfigStore>,
    events: EventBus,
}

impl AlertEvaluator {
    pub fn new(db: Arc<ForexDb>, config: Arc<ConfigStore>, events: EventBus) -> Self {
        Self { db, config, events }
    }

    /// Evaluate the alert against the rows a sync cycle just wrote.
    ///
    /// `today` is the cycle's normalized date. Does nothing when no alert is
    /// configured, the alert is disabled, notifications are off, or the
    /// tracked pair is not among the fresh rows.
    pub fn evaluate(&self, fresh: &[NewRate], today: i64) -> Result<()> {
        let Some(alert) = self.config.alert() else {
            return Ok(());
        };
        if !alert.enabled || !alert.notifications_enabled {
            tracing::debug!("Alert disabled, skipping evaluation");
            return Ok(());
        }

        let Some(current) = fresh
            .iter()
            .find(|r| r.from_code == alert.from_code && r.to_code == alert.to_code)
            .map(|r| r.value)
        else {
            tracing::debug!(
                "Tracked pair {}_{} absent from this cycle",
                alert.from_code,
                alert.to_code
            );
            return Ok(());
        };

        if alert.average_day != Some(today) {
            self.recompute_average(&alert.from_code, &alert.to_code, alert.period_days, today)?;
        }

        // Re-read: the recompute above may have just persisted a fresh value.
        let Some(average) = self.config.alert().and_then(|a| a.rate_average) else {
            tracing::debug!("No rolling average available yet");
            return Ok(());
        };

        let Some((magnitude, direction)) = fluctuation(current, average) else {
            tracing::debug!("Fluctuation undefined for current={current} average={average}");
            return Ok(());
        };

        if magnitude > alert.threshold {
            tracing::info!(
                "Alert raised for {}_{}: fluctuation {:.2}% ({:?})",
                alert.from_code,
                alert.to_code,
                magnitude,
                direction
            );
            self.events.publish(Event::Alert(AlertNotification {
                from_code: alert.from_code,
                to_code: alert.to_code,
                direction,
                fluctuation: magnitude,
            }));
        }

        Ok(())
    }

    /// Walk the tracked pair newest-first, averaging at most `period` rows
    /// and stopping at the first row older than `today - period` days.
    fn recompute_average(&self, from: &str, to: &str, period: i64, today: i64) -> Result<()> {
        let cutoff = days_before(today, period);
        let mut sum = 0.0;
        let mut count: i64 = 0;

        self.db
            .scan_pair_rates(from, to, SortOrder::DateDesc, |row| {
                if row.date < cutoff {
                    return false;
                }
                sum += row.value;
                count += 1;
                count < period
            })?;

        if count > 0 {
            let average = sum / count as f64;
            tracing::debug!("Rolling average for {from}_{to} over {count} rows: {average:.4}");
            self.config.set_rate_average(average, today)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertConfig;
    use crate::db::models::NewCurrency;
    use crate::db::resource::{normalize_date, days_before};

    const DAY: i64 = 24 * 60 * 60 * 1000;

    fn currency(code: &str) -> NewCurrency {
        NewCurrency {
            code: code.to_string(),
            name: code.to_string(),
            symbol: "$".to_string(),
            country_code: code[..2].to_string(),
            country_name: code.to_string(),
            country_flag_url: format!("https://flagcdn.com/w320/{}.png", &code[..2]),
        }
    }

    fn fresh(from: &str, to: &str, date: i64, value: f64) -> Vec<NewRate> {
        vec![NewRate {
            from_code: from.to_string(),
            to_code: to.to_string(),
            date,
            value,
        }]
    }

    fn alert_config(average: Option<f64>, average_day: Option<i64>) -> AlertConfig {
        AlertConfig {
            enabled: true,
            from_code: "USD".into(),
            to_code: "ZAR".into(),
            period_days: 30,
            threshold: 5.0,
            notifications_enabled: true,
            rate_average: average,
            average_day,
        }
    }

    fn evaluator() -> (AlertEvaluator, tokio::sync::broadcast::Receiver<Event>) {
        let events = EventBus::new();
        let rx = events.subscribe();
        let db = Arc::new(ForexDb::open_in_memory(events.clone()).unwrap());
        db.insert_currency(&currency("USD")).unwrap();
        db.insert_currency(&currency("ZAR")).unwrap();
        let config = Arc::new(ConfigStore::in_memory());
        (AlertEvaluator::new(db, config, events), rx)
    }

    fn next_alert(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Option<AlertNotification> {
        while let Ok(event) = rx.try_recv() {
            if let Event::Alert(n) = event {
                return Some(n);
            }
        }
        None
    }

    #[test]
    fn fluctuation_sign_convention() {
        // Rate fell to 90% of the average.
        assert_eq!(
            fluctuation(90.0, 100.0),
            Some((10.0, FluctuationDirection::Negative))
        );
        // Rate rose to 110%: the negative raw value flips to Positive.
        let (magnitude, direction) = fluctuation(110.0, 100.0).unwrap();
        assert!((magnitude - 10.0).abs() < 1e-9);
        assert_eq!(direction, FluctuationDirection::Positive);
        assert_eq!(fluctuation(0.0, 100.0), None);
        assert_eq!(fluctuation(100.0, -1.0), None);
        // A 1% rise is a real fluctuation, not the undefined case.
        let (magnitude, direction) = fluctuation(101.0, 100.0).unwrap();
        assert!((magnitude - 1.0).abs() < 1e-9);
        assert_eq!(direction, FluctuationDirection::Positive);
    }

    #[test]
    fn raises_when_rate_fell_past_threshold() {
        let (evaluator, mut rx) = evaluator();
        let today = normalize_date(1_700_000_000_000);
        evaluator
            .config
            .set_alert(alert_config(Some(15.0), Some(today)))
            .unwrap();

        evaluator
            .evaluate(&fresh("USD", "ZAR", today, 14.1), today)
            .unwrap();

        let notification = next_alert(&mut rx).expect("expected an alert");
        assert_eq!(notification.from_code, "USD");
        assert_eq!(notification.to_code, "ZAR");
        assert_eq!(notification.direction, FluctuationDirection::Negative);
        assert!((notification.fluctuation - 6.0).abs() < 1e-9);
    }

    #[test]
    fn raises_positive_direction_when_rate_rose() {
        let (evaluator, mut rx) = evaluator();
        let today = normalize_date(1_700_000_000_000);
        evaluator
            .config
            .set_alert(alert_config(Some(100.0), Some(today)))
            .unwrap();

        evaluator
            .evaluate(&fresh("USD", "ZAR", today, 110.0), today)
            .unwrap();

        let notification = next_alert(&mut rx).expect("expected an alert");
        assert_eq!(notification.direction, FluctuationDirection::Positive);
        assert!((notification.fluctuation - 10.0).abs() < 1e-9);
    }

    #[test]
    fn raises_on_one_percent_rise_past_a_smaller_threshold() {
        let (evaluator, mut rx) = evaluator();
        let today = normalize_date(1_700_000_000_000);
        let mut alert = alert_config(Some(100.0), Some(today));
        alert.threshold = 0.5;
        evaluator.config.set_alert(alert).unwrap();

        evaluator
            .evaluate(&fresh("USD", "ZAR", today, 101.0), today)
            .unwrap();

        let notification = next_alert(&mut rx).expect("expected an alert");
        assert_eq!(notification.direction, FluctuationDirection::Positive);
        assert!((notification.fluctuation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn silent_when_disabled() {
        let (evaluator, mut rx) = evaluator();
        let today = normalize_date(1_700_000_000_000);
        let mut alert = alert_config(Some(15.0), Some(today));
        alert.enabled = false;
        evaluator.config.set_alert(alert).unwrap();

        evaluator
            .evaluate(&fresh("USD", "ZAR", today, 1.0), today)
            .unwrap();

        assert!(next_alert(&mut rx).is_none());
    }

    #[test]
    fn threshold_is_exclusive() {
        let (evaluator, mut rx) = evaluator();
        let today = normalize_date(1_700_000_000_000);
        evaluator
            .config
            .set_alert(alert_config(Some(100.0), Some(today)))
            .unwrap();

        // Fluctuation exactly 5.0 against threshold 5.0: no alert.
        evaluator
            .evaluate(&fresh("USD", "ZAR", today, 95.0), today)
            .unwrap();

        assert!(next_alert(&mut rx).is_none());
    }

    #[test]
    fn silent_for_untracked_pair() {
        let (evaluator, mut rx) = evaluator();
        let today = normalize_date(1_700_000_000_000);
        evaluator
            .config
            .set_alert(alert_config(Some(15.0), Some(today)))
            .unwrap();

        evaluator
            .evaluate(&fresh("USD", "EUR", today, 1.0), today)
            .unwrap();

        assert!(next_alert(&mut rx).is_none());
    }

    #[test]
    fn recomputes_average_once_per_day() {
        let (evaluator, _rx) = evaluator();
        let today = normalize_date(1_700_000_000_000);
        for (i, value) in [14.0, 15.0, 16.0].iter().enumerate() {
            evaluator
                .db
                .insert_rate(&NewRate {
                    from_code: "USD".into(),
                    to_code: "ZAR".into(),
                    date: today - i as i64 * DAY,
                    value: *value,
                })
                .unwrap();
        }
        // Average stamped yesterday, so this evaluation recomputes it.
        evaluator
            .config
            .set_alert(alert_config(Some(999.0), Some(today - DAY)))
            .unwrap();

        evaluator
            .evaluate(&fresh("USD", "ZAR", today, 14.0), today)
            .unwrap();

        let alert = evaluator.config.alert().unwrap();
        assert_eq!(alert.rate_average, Some(15.0));
        assert_eq!(alert.average_day, Some(today));
    }

    #[test]
    fn average_scan_stops_at_period_cutoff() {
        let (evaluator, _rx) = evaluator();
        let today = normalize_date(1_700_000_000_000);
        let mut alert = alert_config(None, None);
        alert.period_days = 2;
        evaluator.config.set_alert(alert).unwrap();

        // Two rows inside the 2-day window, one just outside it.
        for (date, value) in [
            (today, 10.0),
            (today - DAY, 20.0),
            (days_before(today, 2) - DAY, 500.0),
        ] {
            evaluator
                .db
                .insert_rate(&NewRate {
                    from_code: "USD".into(),
                    to_code: "ZAR".into(),
                    date,
                    value,
                })
                .unwrap();
        }

        evaluator
            .evaluate(&fresh("USD", "ZAR", today, 10.0), today)
            .unwrap();

        assert_eq!(evaluator.config.alert().unwrap().rate_average, Some(15.0));
    }

    #[test]
    fn no_average_no_alert() {
        let (evaluator, mut rx) = evaluator();
        let today = normalize_date(1_700_000_000_000);
        // No cached rows to average over and no stored value.
        evaluator.config.set_alert(alert_config(None, None)).unwrap();

        evaluator
            .evaluate(&fresh("USD", "ZAR", today, 14.1), today)
            .unwrap();

        assert!(next_alert(&mut rx).is_none());
        assert!(evaluator.config.alert().unwrap().rate_average.is_none());
    }
}
