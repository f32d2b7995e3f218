//! Collaborator reachability and the integration level derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of one health probe: which collaborators answered in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reachability {
    pub llm: bool,
    pub design_service: bool,
    pub execution_service: bool,
}

impl Reachability {
    pub fn new(llm: bool, design_service: bool, execution_service: bool) -> Self {
        Self {
            llm,
            design_service,
            execution_service,
        }
    }

    /// Everything reachable
    pub fn all() -> Self {
        Self::new(true, true, true)
    }

    /// Nothing reachable
    pub fn none() -> Self {
        Self::default()
    }

    pub fn reachable_count(&self) -> usize {
        [self.llm, self.design_service, self.execution_service]
            .iter()
            .filter(|up| **up)
            .count()
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |up: bool| if up { "up" } else { "down" };
        write!(
            f,
            "llm={} design={} execution={}",
            mark(self.llm),
            mark(self.design_service),
            mark(self.execution_service)
        )
    }
}

/// Degradation tier for one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationLevel {
    /// All three collaborators reachable
    Full,
    /// Some, but not all, collaborators reachable
    Partial,
    /// No collaborator reachable
    Basic,
}

impl IntegrationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationLevel::Full => "full",
            IntegrationLevel::Partial => "partial",
            IntegrationLevel::Basic => "basic",
        }
    }
}

impl fmt::Display for IntegrationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reachable_count() {
        assert_eq!(Reachability::none().reachable_count(), 0);
        assert_eq!(Reachability::all().reachable_count(), 3);
        assert_eq!(Reachability::new(true, false, true).reachable_count(), 2);
    }

    #[test]
    fn test_reachability_display() {
        let r = Reachability::new(true, false, true);
        assert_eq!(r.to_string(), "llm=up design=down execution=up");
    }

    #[test]
    fn test_level_serialization() {
        assert_eq!(serde_json::to_string(&IntegrationLevel::Partial).unwrap(), "\"partial\"");
        assert_eq!(
            serde_json::from_str::<IntegrationLevel>("\"basic\"").unwrap(),
            IntegrationLevel::Basic
        );
    }
}
