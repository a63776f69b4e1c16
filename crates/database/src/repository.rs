use crate::error::DbError;
use crate::store::{
    CounterSink, ReportSink, SnapshotSink, SnapshotSource, StatsSource, StrategySource,
    SymbolStatsSink,
};
use async_trait::async_trait;
use core_types::{
    ActivityReport, CounterUpdate, InstrumentPrice, MarketSnapshot, OutcomeCounters, PositionHit,
    StrategyConfig, TRACKED_POSITIONS, TradeOutcome,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::{QueryBuilder, Row};
use std::future::Future;
use std::time::Duration;

/// The `DbRepository` provides the PostgreSQL implementation of every
/// collaborator trait. Reads and writes carry separate deadlines.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl DbRepository {
    pub fn new(pool: PgPool, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            pool,
            read_timeout,
            write_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn bounded<T, F>(
        &self,
        limit: Duration,
        operation: &'static str,
        fut: F,
    ) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::error!(operation, ?limit, "Database call timed out.");
                Err(DbError::Timeout(operation))
            }
        }
    }

    /// Inserts or replaces a strategy row. Used when seeding new configurations.
    pub async fn upsert_strategy(&self, strategy: &StrategyConfig) -> Result<(), DbError> {
        let query = sqlx::query(
            r#"
            INSERT INTO strategies (name, short_window, long_window, momentum_threshold,
                trade_duration_minutes, take_profit_pct, stop_loss_pct, account_balance,
                fees_total, tested)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (name) DO UPDATE SET
                short_window = EXCLUDED.short_window,
                long_window = EXCLUDED.long_window,
                momentum_threshold = EXCLUDED.momentum_threshold,
                trade_duration_minutes = EXCLUDED.trade_duration_minutes,
                take_profit_pct = EXCLUDED.take_profit_pct,
                stop_loss_pct = EXCLUDED.stop_loss_pct,
                account_balance = EXCLUDED.account_balance,
                fees_total = EXCLUDED.fees_total,
                tested = EXCLUDED.tested
            "#,
        )
        .bind(&strategy.name)
        .bind(window_to_db(strategy.short_window)?)
        .bind(window_to_db(strategy.long_window)?)
        .bind(strategy.momentum_threshold)
        .bind(strategy.trade_duration_minutes)
        .bind(strategy.take_profit_pct)
        .bind(strategy.stop_loss_pct)
        .bind(strategy.account_balance)
        .bind(strategy.fees_total)
        .bind(strategy.tested)
        .execute(&self.pool);

        self.bounded(self.write_timeout, "upsert_strategy", query).await?;
        Ok(())
    }
}

#[async_trait]
impl SymbolStatsSink for DbRepository {
    async fn record_positions(&self, hits: &[PositionHit]) -> Result<(), DbError> {
        let mut rows = Vec::with_capacity(hits.len());
        for hit in hits {
            // Postgres arrays are 1-based.
            let slot = i32::try_from(hit.position + 1).map_err(|_| {
                DbError::InvalidRow(format!("position {} is out of range", hit.position))
            })?;
            let mut initial = vec![0i32; TRACKED_POSITIONS.max(hit.position + 1)];
            initial[hit.position] = 1;
            rows.push((hit.symbol.as_str(), initial, slot));
        }

        let pool = &self.pool;
        let apply = async move {
            let mut tx = pool.begin().await?;
            for (symbol, initial, slot) in &rows {
                sqlx::query(
                    r#"
                    INSERT INTO symbol_stats (symbol, position_counts)
                    VALUES ($1, $2)
                    ON CONFLICT (symbol) DO UPDATE SET
                        position_counts[$3] = COALESCE(symbol_stats.position_counts[$3], 0) + 1
                    "#,
                )
                .bind(*symbol)
                .bind(initial)
                .bind(*slot)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        };

        self.bounded(self.write_timeout, "record_positions", apply).await
    }
}

fn window_to_db(window: usize) -> Result<i32, DbError> {
    i32::try_from(window)
        .map_err(|_| DbError::InvalidRow(format!("window {window} is out of range")))
}

fn count_from_db(row: &PgRow, column: &str) -> Result<u32, DbError> {
    let value: i32 = row.try_get(column)?;
    u32::try_from(value).map_err(|_| DbError::InvalidRow(format!("{column} is negative")))
}

fn strategy_from_row(row: &PgRow) -> Result<StrategyConfig, DbError> {
    let short: i32 = row.try_get("short_window")?;
    let long: i32 = row.try_get("long_window")?;
    let to_window = |value: i32, column: &str| {
        usize::try_from(value).map_err(|_| DbError::InvalidRow(format!("{column} is negative")))
    };

    Ok(StrategyConfig {
        name: row.try_get("name")?,
        short_window: to_window(short, "short_window")?,
        long_window: to_window(long, "long_window")?,
        momentum_threshold: row.try_get("momentum_threshold")?,
        trade_duration_minutes: row.try_get("trade_duration_minutes")?,
        take_profit_pct: row.try_get("take_profit_pct")?,
        stop_loss_pct: row.try_get("stop_loss_pct")?,
        account_balance: row.try_get("account_balance")?,
        fees_total: row.try_get("fees_total")?,
        tested: row.try_get("tested")?,
        counters: OutcomeCounters {
            wins: count_from_db(row, "win_count")?,
            losses: count_from_db(row, "loss_count")?,
            timeout_gains: count_from_db(row, "timeout_gain_count")?,
            timeout_losses: count_from_db(row, "timeout_loss_count")?,
            net_gains: count_from_db(row, "net_gain_count")?,
            net_losses: count_from_db(row, "net_loss_count")?,
        },
    })
}

#[async_trait]
impl SnapshotSource for DbRepository {
    async fn read_snapshot(&self, timestamp: i64) -> Result<MarketSnapshot, DbError> {
        let query = sqlx::query(
            r#"
            SELECT symbol, price, percentage_change
            FROM historic_prices
            WHERE timestamp = $1
            ORDER BY id ASC
            "#,
        )
        .bind(timestamp)
        .fetch_all(&self.pool);

        let rows = self.bounded(self.read_timeout, "read_snapshot", query).await?;
        let prices = rows
            .iter()
            .map(|row| {
                Ok(InstrumentPrice {
                    symbol: row.try_get("symbol")?,
                    price: row.try_get("price")?,
                    percentage_change: row.try_get::<Option<Decimal>, _>("percentage_change")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(MarketSnapshot::new(timestamp, prices))
    }
}

#[async_trait]
impl SnapshotSink for DbRepository {
    async fn write_prices(
        &self,
        timestamp: i64,
        prices: Vec<InstrumentPrice>,
    ) -> Result<(), DbError> {
        if prices.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO historic_prices (timestamp, symbol, price, percentage_change) ",
        );
        builder.push_values(prices.iter(), |mut b, price| {
            b.push_bind(timestamp)
                .push_bind(&price.symbol)
                .push_bind(&price.price)
                .push_bind(price.percentage_change);
        });
        builder.push(
            " ON CONFLICT (timestamp, symbol) DO UPDATE SET \
             price = EXCLUDED.price, percentage_change = EXCLUDED.percentage_change",
        );

        let query = builder.build().execute(&self.pool);
        self.bounded(self.write_timeout, "write_prices", query).await?;
        Ok(())
    }
}

#[async_trait]
impl StatsSource for DbRepository {
    async fn latest_liquidity(&self, symbol: &str) -> Result<Option<String>, DbError> {
        let query = sqlx::query(
            r#"
            SELECT liquidity_estimate
            FROM ticker_stats
            WHERE symbol = $1
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool);

        let row = self.bounded(self.read_timeout, "latest_liquidity", query).await?;
        match row {
            Some(row) => Ok(row.try_get::<Option<String>, _>("liquidity_estimate")?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StrategySource for DbRepository {
    async fn list_untested(&self) -> Result<Vec<StrategyConfig>, DbError> {
        let query = sqlx::query(
            r#"
            SELECT name, short_window, long_window, momentum_threshold, trade_duration_minutes,
                   take_profit_pct, stop_loss_pct, account_balance, fees_total, tested,
                   win_count, loss_count, timeout_gain_count, timeout_loss_count,
                   net_gain_count, net_loss_count
            FROM strategies
            WHERE tested = FALSE
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool);

        let rows = self.bounded(self.read_timeout, "list_untested", query).await?;
        rows.iter().map(strategy_from_row).collect()
    }
}

#[async_trait]
impl ReportSink for DbRepository {
    async fn write_trade_outcome(&self, outcome: &TradeOutcome) -> Result<(), DbError> {
        let query = sqlx::query(
            r#"
            INSERT INTO trade_outcome_reports (outcome_id, timestamp, strategy_name, symbol,
                percentage_change, updated_balance, fee, outcome, elapsed_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (outcome_id) DO NOTHING
            "#,
        )
        .bind(outcome.outcome_id)
        .bind(outcome.timestamp)
        .bind(&outcome.strategy_name)
        .bind(&outcome.symbol)
        .bind(outcome.percentage_change)
        .bind(outcome.updated_balance)
        .bind(outcome.fee)
        .bind(outcome.outcome.as_str())
        .bind(outcome.elapsed_ms)
        .execute(&self.pool);

        self.bounded(self.write_timeout, "write_trade_outcome", query).await?;
        Ok(())
    }

    async fn write_activity_report(&self, report: &ActivityReport) -> Result<(), DbError> {
        let pairs_count = i32::try_from(report.pairs_count)
            .map_err(|_| DbError::InvalidRow("pairs_count is out of range".to_string()))?;

        let query = sqlx::query(
            r#"
            INSERT INTO activity_reports (timestamp, pairs_count, avg_gain, top_a_gain, top_b_gain, top_c_gain)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(report.timestamp)
        .bind(pairs_count)
        .bind(report.avg_gain)
        .bind(report.top_a_gain)
        .bind(report.top_b_gain)
        .bind(report.top_c_gain)
        .execute(&self.pool);

        self.bounded(self.write_timeout, "write_activity_report", query).await?;
        Ok(())
    }
}

#[async_trait]
impl CounterSink for DbRepository {
    async fn update_counters(&self, update: &CounterUpdate) -> Result<(), DbError> {
        let flags = &update.flags;
        let patch = &update.patch;
        let short = patch.short_window.map(window_to_db).transpose()?;
        let long = patch.long_window.map(window_to_db).transpose()?;

        // One statement so counters and patched fields move together.
        let query = sqlx::query(
            r#"
            UPDATE strategies SET
                win_count = win_count + $2,
                loss_count = loss_count + $3,
                timeout_gain_count = timeout_gain_count + $4,
                timeout_loss_count = timeout_loss_count + $5,
                net_gain_count = net_gain_count + $6,
                net_loss_count = net_loss_count + $7,
                short_window = COALESCE($8, short_window),
                long_window = COALESCE($9, long_window),
                momentum_threshold = COALESCE($10, momentum_threshold),
                trade_duration_minutes = COALESCE($11, trade_duration_minutes),
                take_profit_pct = COALESCE($12, take_profit_pct),
                stop_loss_pct = COALESCE($13, stop_loss_pct),
                account_balance = COALESCE($14, account_balance),
                fees_total = COALESCE($15, fees_total),
                tested = COALESCE($16, tested)
            WHERE name = $1
            "#,
        )
        .bind(&update.strategy_name)
        .bind(i32::from(flags.win))
        .bind(i32::from(flags.loss))
        .bind(i32::from(flags.timeout_gain))
        .bind(i32::from(flags.timeout_loss))
        .bind(i32::from(flags.net_gain))
        .bind(i32::from(flags.net_loss))
        .bind(short)
        .bind(long)
        .bind(patch.momentum_threshold)
        .bind(patch.trade_duration_minutes)
        .bind(patch.take_profit_pct)
        .bind(patch.stop_loss_pct)
        .bind(patch.account_balance)
        .bind(patch.fees_total)
        .bind(patch.tested)
        .execute(&self.pool);

        let result = self.bounded(self.write_timeout, "update_counters", query).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(update.strategy_name.clone()));
        }
        Ok(())
    }
}
