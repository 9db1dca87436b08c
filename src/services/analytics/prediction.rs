//! Short-horizon price prediction (component F). Grounded on
//! `AIAnalyticsService.predict_price` and `_calculate_rsi`: moving averages,
//! Wilder-style RSI, momentum, and a volume-confirmation check blended into
//! a scalar signal in `[-1, 1]`.

use super::stats::{mean, stdev};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

const MIN_TRADES_FOR_PREDICTION: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionDirection {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricePrediction {
    pub symbol: String,
    pub current_price: Decimal,
    pub predicted_price: Decimal,
    pub predicted_change_pct: f64,
    pub direction: PredictionDirection,
    pub confidence: f64,
    pub horizon_minutes: i64,
    pub signal: f64,
    pub rsi_14: f64,
    pub sma_20: f64,
    pub sma_50: f64,
    pub bollinger_width: f64,
}

fn sma(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period {
        return None;
    }
    Some(mean(&prices[prices.len() - period..]))
}

/// Wilder-style RSI over the last 14 deltas. All losses zero ⇒ 100; all
/// gains zero and no losses (flat series) ⇒ 50; otherwise the classical
/// relative-strength formula.
fn rsi14(prices: &[f64]) -> f64 {
    const PERIOD: usize = 14;
    if prices.len() <= PERIOD {
        return 50.0;
    }
    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let recent = &deltas[deltas.len() - PERIOD..];
    let gains: f64 = recent.iter().filter(|d| **d > 0.0).sum();
    let losses: f64 = recent.iter().filter(|d| **d < 0.0).map(|d| d.abs()).sum();
    let avg_gain = gains / PERIOD as f64;
    let avg_loss = losses / PERIOD as f64;

    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

fn decimal_from_f64(v: f64) -> Decimal {
    Decimal::try_from(v).unwrap_or_default()
}

fn neutral(symbol: &str, current_price: f64, horizon_minutes: i64) -> PricePrediction {
    PricePrediction {
        symbol: symbol.to_string(),
        current_price: decimal_from_f64(current_price),
        predicted_price: decimal_from_f64(current_price),
        predicted_change_pct: 0.0,
        direction: PredictionDirection::Neutral,
        confidence: 0.0,
        horizon_minutes,
        signal: 0.0,
        rsi_14: 50.0,
        sma_20: current_price,
        sma_50: current_price,
        bollinger_width: 0.0,
    }
}

/// `prices_chronological`/`volumes_chronological` must be oldest-first over
/// the prediction window (24h). Fewer than 50 trades yields a neutral,
/// zero-confidence prediction rather than extrapolating from thin data.
pub fn predict_price(
    symbol: &str,
    prices_chronological: &[(DateTime<Utc>, f64)],
    volumes_chronological: &[f64],
    horizon_minutes: i64,
) -> PricePrediction {
    if prices_chronological.len() < MIN_TRADES_FOR_PREDICTION {
        let current = prices_chronological.last().map(|(_, p)| *p).unwrap_or(0.0);
        return neutral(symbol, current, horizon_minutes);
    }

    let prices: Vec<f64> = prices_chronological.iter().map(|(_, p)| *p).collect();
    let current_price = *prices.last().unwrap();

    let sma_20 = sma(&prices, 20).unwrap_or(current_price);
    let sma_50 = sma(&prices, 50).unwrap_or(current_price);
    let rsi_14 = rsi14(&prices);

    let n = prices.len();
    let momentum_pct = if n > 10 {
        (prices[n - 1] - prices[n - 11]) / prices[n - 11].max(1e-9) * 100.0
    } else {
        0.0
    };

    let bollinger_width = {
        let window = &prices[prices.len() - 20..];
        let m = mean(window);
        let sd = stdev(window, m);
        if m.abs() > 1e-9 {
            4.0 * sd / m
        } else {
            0.0
        }
    };

    let short_volume = if volumes_chronological.len() >= 10 {
        mean(&volumes_chronological[volumes_chronological.len() - 10..])
    } else {
        mean(volumes_chronological)
    };
    let long_volume = mean(volumes_chronological);
    let volume_trend_up = short_volume > long_volume;
    let price_trend_up = n > 10 && prices[n - 1] > prices[n - 11];

    let mut signal = if sma_20 > sma_50 { 0.2 } else { -0.2 };
    if rsi_14 < 30.0 {
        signal += 0.3;
    } else if rsi_14 > 70.0 {
        signal -= 0.3;
    }
    signal += (momentum_pct / 100.0).clamp(-0.3, 0.3);
    if volume_trend_up {
        signal += if price_trend_up { 0.1 } else { -0.1 };
    }
    signal = signal.clamp(-1.0, 1.0);

    let predicted_change_pct = signal * (horizon_minutes as f64 / 60.0) * 0.5;
    let predicted_price = current_price * (1.0 + predicted_change_pct / 100.0);

    let direction = if signal > 0.2 {
        PredictionDirection::Bullish
    } else if signal < -0.2 {
        PredictionDirection::Bearish
    } else {
        PredictionDirection::Neutral
    };
    let confidence = match direction {
        PredictionDirection::Neutral => 0.5,
        _ => (0.5 + signal.abs()).min(0.85),
    };

    PricePrediction {
        symbol: symbol.to_string(),
        current_price: decimal_from_f64(current_price),
        predicted_price: decimal_from_f64(predicted_price),
        predicted_change_pct,
        direction,
        confidence,
        horizon_minutes,
        signal,
        rsi_14,
        sma_20,
        sma_50,
        bollinger_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_is_one_hundred_for_strictly_increasing_prices() {
        let prices: Vec<f64> = (1..=20).map(|n| n as f64).collect();
        assert_eq!(rsi14(&prices), 100.0);
    }

    #[test]
    fn rsi_is_zero_for_strictly_decreasing_prices() {
        let prices: Vec<f64> = (1..=20).rev().map(|n| n as f64).collect();
        assert_eq!(rsi14(&prices), 0.0);
    }

    #[test]
    fn rsi_is_fifty_for_constant_prices() {
        let prices = vec![100.0; 20];
        assert_eq!(rsi14(&prices), 50.0);
    }

    #[test]
    fn fewer_than_fifty_trades_yields_neutral_zero_confidence() {
        let now = Utc::now();
        let prices: Vec<(DateTime<Utc>, f64)> = (0..10).map(|i| (now, 100.0 + i as f64)).collect();
        let prediction = predict_price("ETH-USDT", &prices, &[1.0; 10], 60);
        assert_eq!(prediction.direction, PredictionDirection::Neutral);
        assert_eq!(prediction.confidence, 0.0);
    }

    #[test]
    fn strong_uptrend_with_volume_confirmation_predicts_bullish() {
        let now = Utc::now();
        let prices: Vec<(DateTime<Utc>, f64)> =
            (0..60).map(|i| (now, 100.0 + i as f64 * 2.0)).collect();
        let mut volumes = vec![1.0; 50];
        volumes.extend(vec![5.0; 10]);
        let prediction = predict_price("ETH-USDT", &prices, &volumes, 60);
        assert_eq!(prediction.direction, PredictionDirection::Bullish);
        assert!(prediction.confidence > 0.5);
    }
}
