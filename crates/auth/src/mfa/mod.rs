pub mod backup_codes;
pub mod service;
pub mod totp;

pub use backup_codes::{
    generate_backup_codes, hash_backup_code, normalize_backup_code, verify_backup_code,
    DEFAULT_BACKUP_CODE_COUNT,
};
pub use service::{MfaService, TotpEnrollment};
pub use totp::{generate_qr_code, unix_time, TotpConfig, TotpEngine, TotpSecret};
