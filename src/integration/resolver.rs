use crate::domain::{IntegrationLevel, Reachability};

/// Map a probe result to an integration level.
///
/// Full requires every collaborator, Basic means none answered, anything in
/// between is Partial.
pub fn resolve(reachability: &Reachability) -> IntegrationLevel {
    match reachability.reachable_count() {
        3 => IntegrationLevel::Full,
        0 => IntegrationLevel::Basic,
        _ => IntegrationLevel::Partial,
    }
}
