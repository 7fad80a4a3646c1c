//! Conversation-to-session mapping with legacy-key migration.
//!
//! A conversation key pairs a front-end conversation scope with an agent id;
//! the thread map stores the agent-native session id negotiated for that
//! pair. Earlier releases keyed threads by scope alone, so resolution also
//! consults the legacy key and migrates hits forward.
//!
//! These are pure in-memory operations. The caller owns persistence of the
//! maps after any mutating call.

use std::collections::BTreeMap;

/// Conversation key → agent-native session id.
pub type ThreadMap = BTreeMap<String, String>;

/// Conversation key → number of turns run.
pub type TurnCounters = BTreeMap<String, u64>;

/// Separator between scope and agent id in canonical keys. Scopes are
/// front-end-owned opaque strings and must not contain it.
const KEY_SEPARATOR: &str = "::";

/// Outcome of resolving a conversation against the thread map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Canonical key the conversation maps to.
    pub key: String,
    /// Previously negotiated session id, when one exists.
    pub session_id: Option<String>,
    /// True when the id was found under the legacy key and moved forward.
    pub migrated: bool,
}

/// Canonical key for a conversation scope + agent pairing.
///
/// The same logical pair always normalizes to the same key.
pub fn conversation_key(scope: &str, agent_id: &str) -> String {
    format!("{scope}{KEY_SEPARATOR}{agent_id}")
}

/// Resolve the session id for a conversation.
///
/// This is a read with a possible write: on a canonical-key miss the legacy
/// (scope-only) key is consulted, and a hit there is copied under the
/// canonical key and deleted from the legacy slot. The migration happens at
/// most once per key; callers should persist the map when `migrated` is true.
pub fn resolve(map: &mut ThreadMap, scope: &str, agent_id: &str) -> Resolution {
    let key = conversation_key(scope, agent_id);

    if let Some(session_id) = map.get(&key) {
        return Resolution {
            session_id: Some(session_id.clone()),
            key,
            migrated: false,
        };
    }

    if let Some(session_id) = map.remove(scope) {
        map.insert(key.clone(), session_id.clone());
        return Resolution {
            key,
            session_id: Some(session_id),
            migrated: true,
        };
    }

    Resolution {
        key,
        session_id: None,
        migrated: false,
    }
}

/// Forget the stored session for a conversation.
///
/// Removes both the canonical and the legacy entry; returns whether anything
/// was removed.
pub fn clear(map: &mut ThreadMap, scope: &str, agent_id: &str) -> bool {
    let canonical = map.remove(&conversation_key(scope, agent_id)).is_some();
    let legacy = map.remove(scope).is_some();
    canonical || legacy
}

/// Record one more turn for a key and return the new count.
pub fn bump_turn(counters: &mut TurnCounters, key: &str) -> u64 {
    let count = counters.entry(key.to_string()).or_insert(0);
    *count += 1;
    *count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_resolves_to_no_session() {
        let mut map = ThreadMap::new();
        let resolution = resolve(&mut map, "chat-1", "codex");
        assert_eq!(resolution.key, "chat-1::codex");
        assert_eq!(resolution.session_id, None);
        assert!(!resolution.migrated);
        assert!(map.is_empty());
    }

    #[test]
    fn persisted_id_resolves_unchanged() {
        let mut map = ThreadMap::new();
        map.insert(conversation_key("chat-1", "codex"), "t1".into());
        let resolution = resolve(&mut map, "chat-1", "codex");
        assert_eq!(resolution.session_id.as_deref(), Some("t1"));
        assert!(!resolution.migrated);
    }

    // Ensures a legacy-only entry migrates exactly once, as a side effect
    // of resolution.
    #[test]
    fn legacy_entry_migrates_once() {
        let mut map = ThreadMap::new();
        map.insert("chat-1".into(), "legacy-session".into());

        let first = resolve(&mut map, "chat-1", "codex");
        assert_eq!(first.session_id.as_deref(), Some("legacy-session"));
        assert!(first.migrated);
        assert!(!map.contains_key("chat-1"), "legacy key must be deleted");
        assert_eq!(
            map.get("chat-1::codex").map(String::as_str),
            Some("legacy-session")
        );

        let second = resolve(&mut map, "chat-1", "codex");
        assert_eq!(second.session_id.as_deref(), Some("legacy-session"));
        assert!(!second.migrated);
    }

    // Ensures a canonical hit shadows any lingering legacy value.
    #[test]
    fn canonical_entry_wins_over_legacy() {
        let mut map = ThreadMap::new();
        map.insert("chat-1".into(), "stale".into());
        map.insert(conversation_key("chat-1", "codex"), "current".into());

        let resolution = resolve(&mut map, "chat-1", "codex");
        assert_eq!(resolution.session_id.as_deref(), Some("current"));
        assert!(!resolution.migrated);
        // The stale legacy entry stays untouched for other agents to migrate.
        assert!(map.contains_key("chat-1"));
    }

    #[test]
    fn same_scope_different_agents_are_distinct() {
        let mut map = ThreadMap::new();
        map.insert(conversation_key("chat-1", "codex"), "t-codex".into());
        map.insert(conversation_key("chat-1", "claude"), "t-claude".into());

        assert_eq!(
            resolve(&mut map, "chat-1", "codex").session_id.as_deref(),
            Some("t-codex")
        );
        assert_eq!(
            resolve(&mut map, "chat-1", "claude").session_id.as_deref(),
            Some("t-claude")
        );
    }

    #[test]
    fn clear_removes_canonical_and_legacy() {
        let mut map = ThreadMap::new();
        map.insert("chat-1".into(), "legacy".into());
        map.insert(conversation_key("chat-1", "codex"), "current".into());

        assert!(clear(&mut map, "chat-1", "codex"));
        assert!(map.is_empty());
        assert!(!clear(&mut map, "chat-1", "codex"));
    }

    #[test]
    fn bump_turn_counts_from_one() {
        let mut counters = TurnCounters::new();
        assert_eq!(bump_turn(&mut counters, "k"), 1);
        assert_eq!(bump_turn(&mut counters, "k"), 2);
        assert_eq!(bump_turn(&mut counters, "other"), 1);
    }
}
