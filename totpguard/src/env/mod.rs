mod settings;

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;

use crate::error::Result;

pub use settings::Settings;

/// Prefix shared by every variable read through [`parse`].
pub const ENV_PREFIX: &str = "TOTPGUARD_";

static ENV_LOADED: OnceCell<()> = OnceCell::new();

/// Deserializes `T` from `TOTPGUARD_*` variables, loading the `.env` file once beforehand.
pub fn parse<T>() -> Result<T>
where
    T: DeserializeOwned,
{
    ENV_LOADED.get_or_init(read_env_file);

    Ok(envy::prefixed(ENV_PREFIX).from_env::<T>()?)
}

/// Reads `KEY=VALUE` lines from `$ENV_FILE` (default `.env`). Variables already present in the
/// process environment win. A missing default file is not an error.
fn read_env_file() {
    let explicit = std::env::var("ENV_FILE").ok();
    let env_file = explicit.clone().unwrap_or(".env".into());

    let content = match std::fs::read_to_string(&env_file) {
        Ok(content) => content,
        Err(err) => {
            if explicit.is_some() {
                tracing::warn!(env.file = env_file, error.message = %err, "could not read env file");
            }
            return;
        }
    };

    for (key, value) in parse_lines(&content) {
        if std::env::var_os(key).is_none() {
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
}

fn parse_lines(content: &str) -> impl Iterator<Item = (&str, &str)> {
    content.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let mut parts = line.splitn(2, '=');
        let key = parts.next()?.trim();
        let value = parts.next()?.trim();
        (!key.is_empty()).then_some((key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_lines_skip_comments_and_blanks() {
        let content = "# comment\n\nTOTPGUARD_MAX_ATTEMPTS = 5\nBROKEN\nTOTPGUARD_ISSUER_DOMAIN=a=b\n";
        let pairs: Vec<_> = parse_lines(content).collect();
        assert_eq!(
            pairs,
            [
                ("TOTPGUARD_MAX_ATTEMPTS", "5"),
                ("TOTPGUARD_ISSUER_DOMAIN", "a=b")
            ]
        );
    }
}
