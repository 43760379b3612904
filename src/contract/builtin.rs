use crate::contract::SmartContract;
use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Emits `Random Number: N` with N uniform in 1..=100.
#[derive(Debug, Clone)]
pub struct RandomNumberGenerator {
    name: String,
}

impl RandomNumberGenerator {
    pub fn new() -> Self {
        Self { name: "RandomNumberGenerator".to_string() }
    }
}

impl Default for RandomNumberGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SmartContract for RandomNumberGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self) -> String {
        let n: u32 = rand::thread_rng().gen_range(1..=100);
        format!("Random Number: {}", n)
    }
}

/// A deployed script. Its code text is recorded verbatim on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptContract {
    name: String,
    code: String,
}

impl ScriptContract {
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl SmartContract for ScriptContract {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self) -> String {
        self.code.clone()
    }
}

/// Deploy a script contract under `name`.
pub fn deploy(name: impl Into<String>, code: impl Into<String>) -> ScriptContract {
    ScriptContract { name: name.into(), code: code.into() }
}

/// Contract selection from config or command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    #[default]
    Random,
    Script,
    None,
}

impl ContractKind {
    /// Build the selected contract. `Script` needs the code text.
    pub fn build(self, script: Option<&str>) -> Option<Arc<dyn SmartContract>> {
        match self {
            ContractKind::Random => Some(Arc::new(RandomNumberGenerator::new())),
            ContractKind::Script => {
                let code = script.unwrap_or_default();
                Some(Arc::new(deploy("Script", code)))
            }
            ContractKind::None => None,
        }
    }
}

impl FromStr for ContractKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(ContractKind::Random),
            "script" => Ok(ContractKind::Script),
            "none" => Ok(ContractKind::None),
            other => Err(format!("unknown contract kind: {}", other)),
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContractKind::Random => "random",
            ContractKind::Script => "script",
            ContractKind::None => "none",
        };
        f.write_str(s)
    }
}
