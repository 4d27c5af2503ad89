use crate::error::{AuthError, Result};
use base32::Alphabet;
use chrono::{DateTime, Utc};
use image::Luma;
use qrcode::QrCode;
use rand::{rngs::OsRng, RngCore};
use std::num::NonZeroU64;
use subtle::{Choice, ConstantTimeEq};
use totp_lite::{totp_custom, Sha1};

const SECRET_BYTES: usize = 20; // 160 bits, the RFC 4226 recommendation
const BASE32: Alphabet = Alphabet::Rfc4648 { padding: false };

/// Configuration for TOTP generation and verification.
#[derive(Debug, Clone)]
pub struct TotpConfig {
    /// Issuer name shown in authenticator apps.
    pub issuer: String,
    /// Number of digits in a code.
    pub digits: u32,
    /// Time step in seconds.
    pub step: NonZeroU64,
    /// Adjacent steps accepted on either side of the current one.
    pub skew: u8,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            issuer: "Curio".to_string(),
            digits: 6,
            step: NonZeroU64::new(30).unwrap_or(NonZeroU64::MIN),
            skew: 1,
        }
    }
}

impl TotpConfig {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            ..Default::default()
        }
    }

    pub fn skew(mut self, skew: u8) -> Self {
        self.skew = skew;
        self
    }

    /// Fails for a zero step, which has no time windows.
    pub fn step(mut self, seconds: u64) -> Result<Self> {
        self.step = NonZeroU64::new(seconds).ok_or_else(|| {
            AuthError::ConfigurationError("TOTP step must be at least one second".to_string())
        })?;
        Ok(self)
    }

    pub fn digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }
}

/// Base32-encoded shared secret.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret(String);

impl TotpSecret {
    /// Parse a stored or user-supplied secret. Case and spaces are ignored.
    pub fn from_base32(encoded: &str) -> Result<Self> {
        let normalized: String = encoded
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match base32::decode(BASE32, &normalized) {
            Some(bytes) if !bytes.is_empty() => Ok(Self(normalized)),
            _ => Err(AuthError::InvalidSecret("Invalid secret format".to_string())),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(base32::encode(BASE32, bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        base32::decode(BASE32, &self.0)
            .ok_or_else(|| AuthError::InvalidSecret("Invalid secret format".to_string()))
    }
}

impl std::fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TotpSecret(..)")
    }
}

/// Generates secrets and computes/verifies time-based codes (RFC 6238, HMAC-SHA1).
#[derive(Debug, Clone)]
pub struct TotpEngine {
    config: TotpConfig,
}

impl Default for TotpEngine {
    fn default() -> Self {
        Self::new(TotpConfig::default())
    }
}

impl TotpEngine {
    pub fn new(config: TotpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TotpConfig {
        &self.config
    }

    /// Generate a random secret from the OS entropy source.
    ///
    /// Fails with [`AuthError::EntropyUnavailable`] instead of falling back to
    /// a weaker generator.
    pub fn generate_secret(&self) -> Result<TotpSecret> {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(TotpSecret::from_bytes(&bytes))
    }

    /// Code for the time step containing `time` (unix seconds).
    pub fn current_code(&self, secret: &TotpSecret, time: u64) -> Result<String> {
        let key = secret.to_bytes()?;
        Ok(self.code_for(&key, time))
    }

    /// Check `submitted` against the current step and `skew` steps either side.
    ///
    /// Every window is compared in constant time and no comparison short-circuits.
    /// Malformed input is a mismatch, not an error.
    pub fn verify_code(&self, secret: &TotpSecret, submitted: &str, time: u64) -> Result<bool> {
        let code: String = submitted.chars().filter(|c| !c.is_whitespace()).collect();
        if code.len() != self.config.digits as usize || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let key = secret.to_bytes()?;
        let skew = i64::from(self.config.skew);
        let step = i64::try_from(self.config.step.get()).unwrap_or(i64::MAX);

        let mut matched = Choice::from(0);
        for offset in -skew..=skew {
            let Some(check_time) = offset
                .checked_mul(step)
                .and_then(|delta| time.checked_add_signed(delta))
            else {
                continue;
            };
            let expected = self.code_for(&key, check_time);
            matched |= expected.as_bytes().ct_eq(code.as_bytes());
        }

        Ok(matched.into())
    }

    /// `otpauth://` URI understood by authenticator apps.
    pub fn provisioning_uri(&self, secret: &TotpSecret, account_name: &str) -> String {
        format!(
            "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
            urlencoding::encode(&self.config.issuer),
            urlencoding::encode(account_name),
            secret.as_str(),
            urlencoding::encode(&self.config.issuer),
            self.config.digits,
            self.config.step
        )
    }

    fn code_for(&self, key: &[u8], time: u64) -> String {
        totp_custom::<Sha1>(self.config.step.get(), self.config.digits, key, time)
    }
}

/// Render a provisioning URI as a PNG QR code.
pub fn generate_qr_code(totp_uri: &str) -> Result<Vec<u8>> {
    let qr = QrCode::new(totp_uri.as_bytes())
        .map_err(|e| AuthError::Internal(format!("QR code generation failed: {}", e)))?;

    let image = qr.render::<Luma<u8>>().min_dimensions(256, 256).build();

    let mut png_bytes = Vec::new();
    image::DynamicImage::ImageLuma8(image)
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| AuthError::Internal(format!("PNG encoding failed: {}", e)))?;

    Ok(png_bytes)
}

/// Unix seconds for `now`, clamped at the epoch.
pub fn unix_time(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_secret() -> TotpSecret {
        TotpSecret::from_base32("JBSWY3DPEHPK3PXP").unwrap()
    }

    #[test]
    fn test_generate_secret() {
        let engine = TotpEngine::default();
        let secret = engine.generate_secret().unwrap();

        // 20 bytes encode to 32 base32 characters
        assert_eq!(secret.as_str().len(), 32);
        assert_eq!(secret.to_bytes().unwrap().len(), SECRET_BYTES);
        assert_ne!(secret, engine.generate_secret().unwrap());
    }

    #[test]
    fn test_known_secret_vectors() {
        let engine = TotpEngine::default();
        let secret = example_secret();

        assert_eq!(engine.current_code(&secret, 0).unwrap(), "282760");
        assert_eq!(engine.current_code(&secret, 29).unwrap(), "282760");
        assert_eq!(engine.current_code(&secret, 30).unwrap(), "996554");
    }

    #[test]
    fn test_rfc6238_sha1_vectors() {
        let engine = TotpEngine::default();
        let secret = TotpSecret::from_bytes(b"12345678901234567890");

        assert_eq!(engine.current_code(&secret, 59).unwrap(), "287082");
        assert_eq!(engine.current_code(&secret, 1_111_111_109).unwrap(), "081804");
        assert_eq!(engine.current_code(&secret, 1_234_567_890).unwrap(), "005924");
        assert_eq!(engine.current_code(&secret, 2_000_000_000).unwrap(), "279037");
    }

    #[test]
    fn test_verify_current_code() {
        let engine = TotpEngine::default();
        let secret = engine.generate_secret().unwrap();
        let time = 1_700_000_010;

        let code = engine.current_code(&secret, time).unwrap();
        assert!(engine.verify_code(&secret, &code, time).unwrap());
    }

    #[test]
    fn test_clock_skew_window() {
        let engine = TotpEngine::default();
        let secret = example_secret();

        for time in [1_700_000_000, 1_700_000_010, 1_700_000_029] {
            let code = engine.current_code(&secret, time).unwrap();
            assert!(engine.verify_code(&secret, &code, time + 29).unwrap());
            assert!(engine.verify_code(&secret, &code, time - 29).unwrap());
            assert!(!engine.verify_code(&secret, &code, time + 61).unwrap());
            assert!(!engine.verify_code(&secret, &code, time - 61).unwrap());
        }
    }

    #[test]
    fn test_zero_skew_rejects_adjacent_step() {
        let engine = TotpEngine::new(TotpConfig::default().skew(0));
        let secret = example_secret();
        let time = 1_700_000_010;

        let code = engine.current_code(&secret, time).unwrap();
        assert!(engine.verify_code(&secret, &code, time).unwrap());
        assert!(!engine.verify_code(&secret, &code, time + 30).unwrap());
    }

    #[test]
    fn test_zero_step_rejected() {
        let result = TotpConfig::default().step(0);
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }

    #[test]
    fn test_custom_step() {
        let engine = TotpEngine::new(TotpConfig::default().step(60).unwrap());
        let secret = TotpSecret::from_bytes(b"12345678901234567890");

        // Same code for the whole minute, new one at the next
        let code = engine.current_code(&secret, 60).unwrap();
        assert_eq!(engine.current_code(&secret, 119).unwrap(), code);
        assert_ne!(engine.current_code(&secret, 120).unwrap(), code);
        assert!(engine.provisioning_uri(&secret, "curator@example.com").contains("period=60"));
    }

    #[test]
    fn test_huge_step_does_not_overflow() {
        let engine = TotpEngine::new(TotpConfig::default().step(u64::MAX).unwrap());
        let secret = example_secret();

        let code = engine.current_code(&secret, 1_700_000_010).unwrap();
        assert!(engine.verify_code(&secret, &code, 1_700_000_010).unwrap());
    }

    #[test]
    fn test_malformed_codes_rejected() {
        let engine = TotpEngine::default();
        let secret = example_secret();

        assert!(!engine.verify_code(&secret, "", 0).unwrap());
        assert!(!engine.verify_code(&secret, "28276", 0).unwrap());
        assert!(!engine.verify_code(&secret, "2827600", 0).unwrap());
        assert!(!engine.verify_code(&secret, "28276a", 0).unwrap());
        assert!(!engine.verify_code(&secret, "ABCD-EFGH", 0).unwrap());
    }

    #[test]
    fn test_code_with_spaces() {
        let engine = TotpEngine::default();
        assert!(engine.verify_code(&example_secret(), "282 760", 10).unwrap());
    }

    #[test]
    fn test_invalid_secret() {
        assert!(TotpSecret::from_base32("not base32!").is_err());
        assert!(TotpSecret::from_base32("").is_err());
        // Lowercase and grouped input is accepted
        assert_eq!(
            TotpSecret::from_base32("jbsw y3dp ehpk 3pxp").unwrap(),
            example_secret()
        );
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        assert_eq!(format!("{:?}", example_secret()), "TotpSecret(..)");
    }

    #[test]
    fn test_provisioning_uri() {
        let engine = TotpEngine::new(TotpConfig::new("Curio"));
        let uri = engine.provisioning_uri(&example_secret(), "curator@example.com");

        assert!(uri.starts_with("otpauth://totp/Curio:curator%40example.com?"));
        assert!(uri.contains("secret=JBSWY3DPEHPK3PXP"));
        assert!(uri.contains("issuer=Curio"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }

    #[test]
    fn test_qr_code_is_png() {
        let engine = TotpEngine::default();
        let uri = engine.provisioning_uri(&example_secret(), "curator@example.com");
        let png = generate_qr_code(&uri).unwrap();

        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
