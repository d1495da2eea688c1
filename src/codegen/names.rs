//! Name Allocation Pass
//!
//! Turns raw names (endpoint ids, schema names) into unique, syntactically
//! valid TypeScript identifiers. One allocator lives for exactly one
//! generation pass.
//!
//! Normalization is a swappable [`NameStyle`]; collision handling is not.
//! The first request for a base name is always returned unsuffixed, later
//! ones get the smallest positive integer suffix still free.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

/// Identifiers owned by the artifact itself
pub const RESERVED_IDENTIFIERS: &[&str] = &["GET_MAP", "POST_MAP"];

// =============================================================================
// Name Styles
// =============================================================================

/// Normalization strategy applied before collision handling
pub trait NameStyle: Debug + Send + Sync {
    fn normalize(&self, raw: &str) -> String;
}

/// Strips separators and capitalizes the letter following each one.
///
/// `example.get_example` becomes `ExampleGetExample`. A leading digit is
/// prefixed with `_`; a name with no usable characters becomes `Anonymous`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PascalCase;

impl NameStyle for PascalCase {
    fn normalize(&self, raw: &str) -> String {
        let mut result = String::with_capacity(raw.len());
        let mut capitalize_next = true;

        for c in raw.chars() {
            if !c.is_ascii_alphanumeric() {
                capitalize_next = true;
            } else if capitalize_next {
                result.push(c.to_ascii_uppercase());
                capitalize_next = false;
            } else {
                result.push(c);
            }
        }

        if result.is_empty() {
            return "Anonymous".to_string();
        }
        if result.starts_with(|c: char| c.is_ascii_digit()) {
            result.insert(0, '_');
        }
        result
    }
}

// =============================================================================
// Name Allocator
// =============================================================================

/// Hands out identifiers that are unique within one generation pass
#[derive(Debug)]
pub struct NameAllocator {
    style: Box<dyn NameStyle>,

    /// Every identifier handed out or reserved so far
    allocated: HashSet<String>,

    /// base name -> last suffix tried
    counters: HashMap<String, usize>,
}

impl NameAllocator {
    /// Allocator using [`PascalCase`]
    pub fn new() -> Self {
        Self::with_style(PascalCase)
    }

    pub fn with_style(style: impl NameStyle + 'static) -> Self {
        let mut allocator = Self {
            style: Box::new(style),
            allocated: HashSet::new(),
            counters: HashMap::new(),
        };
        for ident in RESERVED_IDENTIFIERS {
            allocator.reserve(*ident);
        }
        allocator
    }

    /// Claim an identifier verbatim. Returns `false` if it was already taken.
    pub fn reserve(&mut self, ident: impl Into<String>) -> bool {
        self.allocated.insert(ident.into())
    }

    /// Normalize `raw` and return a fresh identifier for it
    pub fn allocate(&mut self, raw: &str) -> String {
        let base = self.style.normalize(raw);
        if self.allocated.insert(base.clone()) {
            return base;
        }

        let counter = self.counters.entry(base.clone()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}{}", base, counter);
            if self.allocated.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    pub fn contains(&self, ident: &str) -> bool {
        self.allocated.contains(ident)
    }
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new()
    }
}
