//! Actor name registry
//!
//! TigerStyle: One actor per name, any number of names per actor, all
//! released on death.

use coact_core::constants::ACTOR_NAME_LENGTH_BYTES_MAX;
use coact_core::error::{Error, Result};
use coact_core::ActorId;
use std::collections::{BTreeSet, HashMap};

/// Names owned by one scheduler
#[derive(Debug, Default)]
pub(crate) struct Registry {
    by_name: HashMap<String, ActorId>,
    by_actor: HashMap<ActorId, BTreeSet<String>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "must not be empty".into(),
            });
        }
        if name.len() > ACTOR_NAME_LENGTH_BYTES_MAX {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: format!(
                    "{} bytes exceeds limit of {} bytes",
                    name.len(),
                    ACTOR_NAME_LENGTH_BYTES_MAX
                ),
            });
        }
        Ok(())
    }

    /// Bind `name` to `actor`
    ///
    /// An actor may hold several names. Registering the name an actor already
    /// holds is a no-op.
    pub(crate) fn register(&mut self, name: &str, actor: ActorId) -> Result<()> {
        Self::validate_name(name)?;

        if let Some(holder) = self.by_name.get(name) {
            if *holder == actor {
                return Ok(());
            }
            return Err(Error::NameTaken {
                name: name.to_string(),
                holder: *holder,
            });
        }

        self.by_name.insert(name.to_string(), actor);
        self.by_actor
            .entry(actor)
            .or_default()
            .insert(name.to_string());

        debug_assert_eq!(
            self.by_name.len(),
            self.by_actor.values().map(BTreeSet::len).sum::<usize>()
        );
        Ok(())
    }

    pub(crate) fn whereis(&self, name: &str) -> Option<ActorId> {
        self.by_name.get(name).copied()
    }

    /// Names held by `actor`, sorted
    pub(crate) fn names_of(&self, actor: ActorId) -> Vec<String> {
        self.by_actor
            .get(&actor)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn unregister(&mut self, name: &str) -> Option<ActorId> {
        let actor = self.by_name.remove(name)?;
        if let Some(names) = self.by_actor.get_mut(&actor) {
            names.remove(name);
            if names.is_empty() {
                self.by_actor.remove(&actor);
            }
        }
        Some(actor)
    }

    /// Release every name `actor` holds
    pub(crate) fn remove_actor(&mut self, actor: ActorId) -> Vec<String> {
        let names = self.by_actor.remove(&actor).unwrap_or_default();
        for name in &names {
            self.by_name.remove(name);
        }
        names.into_iter().collect()
    }

    /// All registered names, sorted
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn clear(&mut self) {
        self.by_name.clear();
        self.by_actor.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_whereis() {
        let mut registry = Registry::new();
        registry.register("logger", ActorId::new(1)).unwrap();

        assert_eq!(registry.whereis("logger"), Some(ActorId::new(1)));
        assert_eq!(registry.names_of(ActorId::new(1)), vec!["logger".to_string()]);
        assert_eq!(registry.whereis("missing"), None);
    }

    #[test]
    fn test_register_taken_name() {
        let mut registry = Registry::new();
        registry.register("logger", ActorId::new(1)).unwrap();
        registry.register("logger", ActorId::new(1)).unwrap();

        let err = registry.register("logger", ActorId::new(2)).unwrap_err();
        assert!(matches!(err, Error::NameTaken { holder, .. } if holder == ActorId::new(1)));
    }

    #[test]
    fn test_actor_holds_several_names() {
        let mut registry = Registry::new();
        registry.register("b", ActorId::new(1)).unwrap();
        registry.register("a", ActorId::new(1)).unwrap();

        assert_eq!(registry.whereis("a"), Some(ActorId::new(1)));
        assert_eq!(registry.whereis("b"), Some(ActorId::new(1)));
        assert_eq!(
            registry.names_of(ActorId::new(1)),
            vec!["a".to_string(), "b".to_string()]
        );

        assert_eq!(registry.unregister("a"), Some(ActorId::new(1)));
        assert_eq!(registry.names_of(ActorId::new(1)), vec!["b".to_string()]);
    }

    #[test]
    fn test_invalid_names() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.register("", ActorId::new(1)),
            Err(Error::InvalidName { .. })
        ));

        let long = "x".repeat(ACTOR_NAME_LENGTH_BYTES_MAX + 1);
        assert!(matches!(
            registry.register(&long, ActorId::new(1)),
            Err(Error::InvalidName { .. })
        ));
    }

    #[test]
    fn test_remove_actor_and_unregister() {
        let mut registry = Registry::new();
        registry.register("a", ActorId::new(1)).unwrap();
        registry.register("c", ActorId::new(1)).unwrap();
        registry.register("b", ActorId::new(2)).unwrap();

        assert_eq!(
            registry.remove_actor(ActorId::new(1)),
            vec!["a".to_string(), "c".to_string()]
        );
        assert_eq!(registry.whereis("a"), None);
        assert_eq!(registry.whereis("c"), None);
        assert!(registry.remove_actor(ActorId::new(1)).is_empty());
        assert_eq!(registry.unregister("b"), Some(ActorId::new(2)));
        assert_eq!(registry.unregister("b"), None);
        assert!(registry.names().is_empty());
    }
}
