use std::time::Duration;

use serde::Deserialize;

fn default_max_attempts() -> u32 {
    3
}

fn default_issuer_domain() -> String {
    "localhost".into()
}

fn default_storage_timeout_ms() -> u64 {
    5_000
}

fn default_activation_capability() -> String {
    "MfaActivatedIdentity".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_port() -> u16 {
    8000
}

fn default_bg_color_hex() -> String {
    "#FFF".into()
}

fn default_fg_color_hex() -> String {
    "#000".into()
}

/// Runtime options, read from `TOTPGUARD_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Failed attempts allowed per identity and time step before lockout.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Issuer shown in authenticator apps.
    #[serde(default = "default_issuer_domain")]
    pub issuer_domain: String,
    /// Encrypt newly provisioned secrets with the configured cipher.
    #[serde(default)]
    pub shall_encrypt: bool,
    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,
    /// Capability granted by a successful activation.
    #[serde(default = "default_activation_capability")]
    pub activation_capability: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// QR code background; empty means white.
    #[serde(default = "default_bg_color_hex")]
    pub bg_color_hex: String,
    /// QR code modules; empty means black.
    #[serde(default = "default_fg_color_hex")]
    pub fg_color_hex: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            issuer_domain: default_issuer_domain(),
            shall_encrypt: false,
            storage_timeout_ms: default_storage_timeout_ms(),
            activation_capability: default_activation_capability(),
            log_level: default_log_level(),
            port: default_port(),
            bg_color_hex: default_bg_color_hex(),
            fg_color_hex: default_fg_color_hex(),
        }
    }
}

impl Settings {
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_variables() {
        let settings: Settings = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.issuer_domain, "localhost");
        assert!(!settings.shall_encrypt);
        assert_eq!(settings.storage_timeout(), Duration::from_millis(5_000));
        assert_eq!(settings.bg_color_hex, "#FFF");
        assert_eq!(settings.fg_color_hex, "#000");
    }

    #[test]
    fn variables_override_defaults() {
        let vars = vec![
            ("MAX_ATTEMPTS".to_string(), "5".to_string()),
            ("ISSUER_DOMAIN".to_string(), "example.org".to_string()),
            ("SHALL_ENCRYPT".to_string(), "true".to_string()),
            ("FG_COLOR_HEX".to_string(), "#336699".to_string()),
        ];
        let settings: Settings = envy::from_iter(vars).unwrap();
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.issuer_domain, "example.org");
        assert!(settings.shall_encrypt);
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.fg_color_hex, "#336699");
    }
}
