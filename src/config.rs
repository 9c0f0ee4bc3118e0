use std::str::FromStr;

use serde::Deserialize;

/// Knobs for resolution and generation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Hard bound on resolution passes (pure resolution) or draw rounds
    /// (generation). Hitting it is reported as exhaustion.
    pub max_rounds: usize,
    /// Upper bound on drawn list lengths.
    pub max_list_len: usize,
    pub order: PassOrder,
}

impl Default for Config {
    fn default() -> Self {
        Config { max_rounds: 8, max_list_len: 8, order: PassOrder::Declared }
    }
}

/// Field order within one resolution pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassOrder {
    /// Declaration order; later fields see earlier write-backs.
    #[default]
    Declared,
    /// Dependencies first; fields caught in cycles follow in declaration order.
    Topological,
}

impl FromStr for PassOrder {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "declared" => Ok(PassOrder::Declared),
            "topological" => Ok(PassOrder::Topological),
            other => Err(format!("unknown pass order `{other}` (expected `declared` or `topological`)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"order": "topological"}"#).unwrap();
        assert_eq!(config, Config { order: PassOrder::Topological, ..Config::default() });
        assert!(serde_json::from_str::<Config>(r#"{"rounds": 3}"#).is_err());
        assert_eq!("declared".parse::<PassOrder>(), Ok(PassOrder::Declared));
    }
}
