use crate::gate::LoginGateConfig;
use crate::mfa::{TotpConfig, DEFAULT_BACKUP_CODE_COUNT};
use chrono::Duration;
use std::num::NonZeroU64;

/// Settings for the TOTP engine, enrollment and login gate.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub totp: TotpConfig,
    pub gate: LoginGateConfig,
    pub backup_code_count: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            totp: TotpConfig::default(),
            gate: LoginGateConfig::default(),
            backup_code_count: DEFAULT_BACKUP_CODE_COUNT,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let totp = TotpConfig {
            issuer: std::env::var("TOTP_ISSUER").unwrap_or(defaults.totp.issuer),
            skew: env_parse("TOTP_SKEW_STEPS").unwrap_or(defaults.totp.skew),
            step: env_parse("TOTP_STEP_SECONDS")
                .and_then(NonZeroU64::new)
                .unwrap_or(defaults.totp.step),
            ..defaults.totp
        };

        let gate = LoginGateConfig {
            challenge_ttl: challenge_ttl(env_parse("MFA_CHALLENGE_TTL_SECONDS"))
                .unwrap_or(defaults.gate.challenge_ttl),
            max_second_factor_attempts: env_parse("MFA_MAX_ATTEMPTS")
                .unwrap_or(defaults.gate.max_second_factor_attempts),
        };

        Self {
            totp,
            gate,
            backup_code_count: env_parse("BACKUP_CODE_COUNT").unwrap_or(defaults.backup_code_count),
        }
    }
}

/// Positive TTLs that fit a `Duration`; anything else falls back to the default.
fn challenge_ttl(seconds: Option<i64>) -> Option<Duration> {
    seconds.filter(|s| *s > 0).and_then(Duration::try_seconds)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.totp.digits, 6);
        assert_eq!(config.totp.step.get(), 30);
        assert_eq!(config.totp.skew, 1);
        assert_eq!(config.gate.challenge_ttl, Duration::minutes(5));
        assert_eq!(config.backup_code_count, 10);
    }

    #[test]
    fn test_challenge_ttl_bounds() {
        assert_eq!(challenge_ttl(Some(90)), Some(Duration::seconds(90)));
        assert_eq!(challenge_ttl(None), None);
        assert_eq!(challenge_ttl(Some(0)), None);
        assert_eq!(challenge_ttl(Some(-30)), None);
        // Beyond what chrono can represent
        assert_eq!(challenge_ttl(Some(i64::MAX)), None);
    }
}
