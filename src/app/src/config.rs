use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use ti_exchanges_loopring::LoopringConfig;
use tracing::warn;

/// Process settings, taken from the environment on top of the built-in defaults.
pub struct AppConfig {
    pub loopring: LoopringConfig,
    pub pairs: Option<Vec<String>>,
}

impl AppConfig {
    pub fn from_env() -> AppConfig {
        AppConfig::from_vars(&std::env::vars().collect())
    }

    fn from_vars(vars: &HashMap<String, String>) -> AppConfig {
        let mut loopring = LoopringConfig::default();

        if let Some(url) = vars.get("LOOPRING_WS_URL") {
            loopring.ws_url = url.clone();
        }
        if let Some(url) = vars.get("LOOPRING_KEY_URL") {
            loopring.key_url = url.clone();
        }
        if let Some(url) = vars.get("LOOPRING_MARKETS_URL") {
            loopring.markets_url = url.clone();
        }
        if let Some(secs) = parse(vars, "LOOPRING_READ_TIMEOUT_SECS") {
            loopring.read_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse(vars, "LOOPRING_MAX_RECONNECT_ATTEMPTS") {
            loopring.max_reconnect_attempts = attempts;
        }
        if let Some(decimals) = vars.get("LOOPRING_DECIMALS") {
            for entry in decimals.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                match entry.split_once(':').map(|(s, d)| (s.trim(), d.trim().parse::<u32>())) {
                    Some((symbol, Ok(exponent))) if !symbol.is_empty() => {
                        loopring.decimals.insert(symbol, exponent)
                    }
                    _ => warn!("Ignoring invalid decimals entry '{entry}'"),
                }
            }
        }

        let pairs = vars.get("LOOPRING_PAIRS").map(|p| {
            p.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        AppConfig { loopring, pairs }
    }
}

fn parse<T: FromStr>(vars: &HashMap<String, String>, name: &str) -> Option<T> {
    let value = vars.get(name)?;
    match T::from_str(value.trim()) {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid value '{value}' for {name}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_without_env() {
        let config = AppConfig::from_vars(&HashMap::new());

        assert_eq!(config.loopring.ws_url, "wss://ws.api3.loopring.io/v3/ws");
        assert!(config.pairs.is_none());
    }

    #[test_case("LRC-ETH", vec!["LRC-ETH"])]
    #[test_case("LRC-ETH, LRC-USDT", vec!["LRC-ETH", "LRC-USDT"])]
    #[test_case("LRC-ETH,,", vec!["LRC-ETH"])]
    fn pairs_whitelist(value: &str, expected: Vec<&str>) {
        let config = AppConfig::from_vars(&vars(&[("LOOPRING_PAIRS", value)]));

        assert_eq!(config.pairs.unwrap(), expected);
    }

    #[test]
    fn decimals_extend_the_built_in_table() {
        let config = AppConfig::from_vars(&vars(&[(
            "LOOPRING_DECIMALS",
            "NEW:9, LRC:6,bad,:4,X:minus",
        )]));
        let decimals = &config.loopring.decimals;

        assert_eq!(decimals.get("NEW"), Some(9));
        assert_eq!(decimals.get("LRC"), Some(6));
        assert_eq!(decimals.get("X"), None);
        assert_eq!(decimals.get("ETH"), Some(18));
        assert_eq!(decimals.len(), LoopringConfig::default().decimals.len() + 1);
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_vars(&vars(&[
            ("LOOPRING_WS_URL", "wss://localhost/ws"),
            ("LOOPRING_READ_TIMEOUT_SECS", "5"),
            ("LOOPRING_MAX_RECONNECT_ATTEMPTS", "not-a-number"),
        ]));

        assert_eq!(config.loopring.ws_url, "wss://localhost/ws");
        assert_eq!(config.loopring.read_timeout, Duration::from_secs(5));
        assert_eq!(
            config.loopring.max_reconnect_attempts,
            LoopringConfig::default().max_reconnect_attempts
        );
    }
}
