//! Import table for the generated artifact

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

/// Module specifier -> imported symbols, deduplicated and sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportTable {
    modules: BTreeMap<String, BTreeSet<String>>,
}

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `symbol` is imported from `module`
    pub fn add(&mut self, module: impl Into<String>, symbol: impl Into<String>) {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(symbol.into());
    }

    pub fn merge(&mut self, other: ImportTable) {
        for (module, symbols) in other.modules {
            self.modules.entry(module).or_default().extend(symbols);
        }
    }

    /// Module a symbol is imported from, if any
    pub fn module_of(&self, symbol: &str) -> Option<&str> {
        self.modules
            .iter()
            .find(|(_, symbols)| symbols.contains(symbol))
            .map(|(module, _)| module.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// One `import {...} from "..."` line per module
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (module, symbols) in &self.modules {
            let symbols: Vec<&str> = symbols.iter().map(String::as_str).collect();
            out.push_str("// prettier-ignore\n");
            out.push_str(&format!(
                "import {{{}}} from {}\n",
                symbols.join(", "),
                Value::from(module.as_str())
            ));
        }
        out
    }
}
