//! Session identity
//!
//! Usernames are chosen by clients, are not unique and never reach the
//! registry, so every accepted connection gets its own [`SessionId`].

use std::fmt;

use uuid::Uuid;

/// Registry key for one accepted connection
///
/// Assigned when the session is constructed and never reused, even if the
/// same peer reconnects from the same address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// First eight hex digits, enough to tell sessions apart in log lines
    pub fn short(&self) -> String {
        let mut simple = self.0.simple().to_string();
        simple.truncate(8);
        simple
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

// Logs carry the short form; Debug keeps the full UUID.
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_reconnects_get_fresh_ids() {
        let ids: HashSet<SessionId> = (0..64).map(|_| SessionId::new()).collect();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn test_display_is_short_tag() {
        let id = SessionId::new();
        let tag = id.to_string();
        assert_eq!(tag.len(), 8);
        assert!(id.as_uuid().simple().to_string().starts_with(&tag));
    }

    #[test]
    fn test_debug_keeps_full_uuid() {
        let id = SessionId::new();
        assert_eq!(format!("{id:?}"), format!("SessionId({})", id.as_uuid()));
    }
}
