use std::sync::Arc;

use analysis_core::{
    AnalysisError, BarProvider, FeatureSnapshot, Market, SnapshotStore, UniverseSymbol,
};
use chrono::{Duration, NaiveDate};

use crate::calculator::compute_snapshot;

/// Calendar-day lookback fetched per symbol; wide enough to cover the 200
/// trading days the longest indicator needs.
const LOOKBACK_CALENDAR_DAYS: i64 = 300;

/// Per-symbol failure recorded during a universe pass
#[derive(Debug, Clone)]
pub struct SymbolError {
    pub symbol: String,
    pub market: Market,
    pub message: String,
}

/// Outcome of a whole-universe feature pass. Failures never abort the pass;
/// they are collected here.
#[derive(Debug, Clone, Default)]
pub struct UniversePassSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<SymbolError>,
}

/// Computes and stores daily feature snapshots for symbols in the universe
pub struct FeatureFactory {
    provider: Arc<dyn BarProvider>,
    store: Arc<dyn SnapshotStore>,
}

impl FeatureFactory {
    pub fn new(provider: Arc<dyn BarProvider>, store: Arc<dyn SnapshotStore>) -> Self {
        Self { provider, store }
    }

    /// Fetch the bar window, compute the snapshot for `run_date`, and upsert
    /// it. Short or missing history is a degenerate success (null fields);
    /// provider/store failures are returned with symbol context attached.
    pub async fn calculate_for_symbol(
        &self,
        symbol: &str,
        market: Market,
        run_date: NaiveDate,
    ) -> Result<FeatureSnapshot, AnalysisError> {
        if !self.provider.supports_market(market) {
            return Err(AnalysisError::Configuration(format!(
                "Bar provider does not support market {market}"
            )));
        }

        tracing::debug!("Calculating features for {symbol} ({market}) on {run_date}");

        let start = run_date - Duration::days(LOOKBACK_CALENDAR_DAYS);
        let bars = self
            .provider
            .get_daily_bars(symbol, market, start, run_date)
            .await
            .map_err(|e| e.with_symbol(symbol, market))?;

        if bars.is_empty() {
            tracing::warn!("No bars found for {symbol} ({market})");
        }

        let previous = self
            .store
            .latest_snapshot_before(symbol, market, run_date)
            .await
            .map_err(|e| e.with_symbol(symbol, market))?;

        let snapshot = compute_snapshot(symbol, market, run_date, &bars, previous.as_ref());

        self.store
            .put_snapshot(&snapshot)
            .await
            .map_err(|e| e.with_symbol(symbol, market))?;

        tracing::debug!("Features stored for {symbol} ({market})");
        Ok(snapshot)
    }

    /// One pass over the universe. A failing symbol is recorded and skipped;
    /// the pass always runs to completion.
    pub async fn calculate_for_universe(
        &self,
        run_date: NaiveDate,
        universe: &[UniverseSymbol],
    ) -> UniversePassSummary {
        tracing::info!(
            "Starting feature calculation for {} symbols on {run_date}",
            universe.len()
        );

        let mut summary = UniversePassSummary {
            total: universe.len(),
            ..Default::default()
        };

        for entry in universe {
            match self
                .calculate_for_symbol(&entry.symbol, entry.market, run_date)
                .await
            {
                Ok(_) => summary.successful += 1,
                Err(err) => {
                    summary.failed += 1;
                    summary.errors.push(SymbolError {
                        symbol: entry.symbol.clone(),
                        market: entry.market,
                        message: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Feature calculation complete: {} successful, {} failed out of {} total",
            summary.successful,
            summary.failed,
            summary.total
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Bar;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticBarProvider {
        bars: HashMap<String, Vec<Bar>>,
    }

    #[async_trait]
    impl BarProvider for StaticBarProvider {
        fn supports_market(&self, market: Market) -> bool {
            market == Market::Us
        }

        async fn get_daily_bars(
            &self,
            symbol: &str,
            _market: Market,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<Bar>, AnalysisError> {
            if symbol == "BROKEN" {
                return Err(AnalysisError::UpstreamUnavailable(
                    "bar feed timed out".to_string(),
                ));
            }
            Ok(self
                .bars
                .get(symbol)
                .map(|bars| {
                    bars.iter()
                        .filter(|b| b.date >= start && b.date <= end)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct MemorySnapshotStore {
        inner: Mutex<HashMap<(String, Market, NaiveDate), FeatureSnapshot>>,
    }

    #[async_trait]
    impl SnapshotStore for MemorySnapshotStore {
        async fn get_snapshot(
            &self,
            symbol: &str,
            market: Market,
            date: NaiveDate,
        ) -> Result<Option<FeatureSnapshot>, AnalysisError> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.get(&(symbol.to_string(), market, date)).cloned())
        }

        async fn latest_snapshot_before(
            &self,
            symbol: &str,
            market: Market,
            date: NaiveDate,
        ) -> Result<Option<FeatureSnapshot>, AnalysisError> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .values()
                .filter(|s| s.symbol == symbol && s.market == market && s.date < date)
                .max_by_key(|s| s.date)
                .cloned())
        }

        async fn snapshots_in_range(
            &self,
            symbol: &str,
            market: Market,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<FeatureSnapshot>, AnalysisError> {
            let inner = self.inner.lock().unwrap();
            let mut result: Vec<_> = inner
                .values()
                .filter(|s| {
                    s.symbol == symbol && s.market == market && s.date >= start && s.date <= end
                })
                .cloned()
                .collect();
            result.sort_by_key(|s| s.date);
            Ok(result)
        }

        async fn snapshots_on(
            &self,
            date: NaiveDate,
            market: Option<Market>,
        ) -> Result<Vec<FeatureSnapshot>, AnalysisError> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .values()
                .filter(|s| s.date == date && market.map_or(true, |m| s.market == m))
                .cloned()
                .collect())
        }

        async fn put_snapshot(&self, snapshot: &FeatureSnapshot) -> Result<(), AnalysisError> {
            let mut inner = self.inner.lock().unwrap();
            inner.insert(
                (snapshot.symbol.clone(), snapshot.market, snapshot.date),
                snapshot.clone(),
            );
            Ok(())
        }
    }

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap() + chrono::Duration::days(offset)
    }

    fn trending_bars(days: usize) -> Vec<Bar> {
        let mut close = 50.0_f64;
        (0..days)
            .map(|i| {
                close *= 1.004;
                Bar {
                    date: day(i as i64 - days as i64 + 1),
                    open: close,
                    high: close * 1.01,
                    low: close * 0.99,
                    close,
                    volume: 500_000.0,
                }
            })
            .collect()
    }

    fn factory_with(symbols: &[(&str, Vec<Bar>)]) -> (FeatureFactory, Arc<MemorySnapshotStore>) {
        let provider = Arc::new(StaticBarProvider {
            bars: symbols
                .iter()
                .map(|(s, b)| (s.to_string(), b.clone()))
                .collect(),
        });
        let store = Arc::new(MemorySnapshotStore::default());
        (FeatureFactory::new(provider, store.clone()), store)
    }

    #[tokio::test]
    async fn calculates_and_stores_snapshot() {
        let (factory, store) = factory_with(&[("AAPL", trending_bars(250))]);

        let snapshot = factory
            .calculate_for_symbol("AAPL", Market::Us, day(0))
            .await
            .unwrap();
        assert!(snapshot.sma_200.is_some());

        let stored = store
            .get_snapshot("AAPL", Market::Us, day(0))
            .await
            .unwrap();
        assert_eq!(stored, Some(snapshot));
    }

    #[tokio::test]
    async fn unsupported_market_fails_fast() {
        let (factory, _) = factory_with(&[("AAPL", trending_bars(10))]);

        let err = factory
            .calculate_for_symbol("AAPL", Market::Tase, day(0))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Configuration(_)));
    }

    #[tokio::test]
    async fn missing_history_is_degenerate_success() {
        let (factory, _) = factory_with(&[]);

        let snapshot = factory
            .calculate_for_symbol("GHOST", Market::Us, day(0))
            .await
            .unwrap();
        assert_eq!(snapshot.close_price, None);
        assert_eq!(snapshot.rsi_14, None);
    }

    #[tokio::test]
    async fn universe_pass_collects_errors_without_aborting() {
        let (factory, _) = factory_with(&[
            ("AAPL", trending_bars(250)),
            ("MSFT", trending_bars(250)),
        ]);

        let universe = vec![
            UniverseSymbol { symbol: "AAPL".to_string(), market: Market::Us },
            UniverseSymbol { symbol: "BROKEN".to_string(), market: Market::Us },
            UniverseSymbol { symbol: "MSFT".to_string(), market: Market::Us },
        ];

        let summary = factory.calculate_for_universe(day(0), &universe).await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].symbol, "BROKEN");
        assert!(summary.errors[0].message.contains("BROKEN (US)"));
    }

    #[tokio::test]
    async fn second_run_uses_previous_snapshot_for_macd_state() {
        let bars = trending_bars(250);
        let (factory, _) = factory_with(&[("AAPL", bars)]);

        let first = factory
            .calculate_for_symbol("AAPL", Market::Us, day(-1))
            .await
            .unwrap();
        assert_eq!(first.macd_histogram, None);

        let second = factory
            .calculate_for_symbol("AAPL", Market::Us, day(0))
            .await
            .unwrap();
        assert!(second.macd_histogram.is_some());
    }
}
