use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_FEE_PERCENTAGE: u32 = 12;
const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 10;

/// Platform configuration consumed by the booking engine.
///
/// The fee percentage is read once at startup and baked into each booking's
/// monetary breakdown at creation time, so later configuration changes never
/// retroactively alter existing bookings.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Platform fee in percent of the rental total (default 12).
    pub platform_fee_percentage: Decimal,
    /// Upper bound for a single payment-provider call.
    #[serde(skip, default = "default_payment_timeout")]
    pub payment_timeout: Duration,
}

fn default_payment_timeout() -> Duration {
    Duration::from_secs(DEFAULT_PAYMENT_TIMEOUT_SECS)
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            platform_fee_percentage: Decimal::from(DEFAULT_FEE_PERCENTAGE),
            payment_timeout: default_payment_timeout(),
        }
    }
}

impl PlatformConfig {
    /// Reads the configuration from the environment, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// Recognized variables: `PLATFORM_FEE_PERCENTAGE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("PLATFORM_FEE_PERCENTAGE")
            && let Ok(pct) = raw.trim().parse::<Decimal>()
        {
            config.platform_fee_percentage = pct;
        }
        config
    }
}
