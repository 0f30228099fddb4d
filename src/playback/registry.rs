use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serenity::model::id::GuildId;

use super::error::PlaybackError;
use super::player::Player;

/// Registro de sesiones por guild.
pub type PlayerRegistry = Registry<Arc<Player>>;

/// Tabla concurrente guild → sesión con propiedad exclusiva: para una
/// misma guild exactamente un `add` concurrente gana, lo que impide dos
/// sesiones simultáneas uniéndose al mismo canal de voz.
pub struct Registry<S> {
    sessions: DashMap<GuildId, S>,
}

impl<S: Clone> Registry<S> {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Busca la sesión de una guild. Nunca crea.
    pub fn get(&self, guild_id: GuildId) -> Option<S> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    /// Registra una sesión nueva; falla si la guild ya tiene una.
    pub fn add(&self, guild_id: GuildId, session: S) -> Result<(), PlaybackError> {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(_) => Err(PlaybackError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Da de baja la sesión de una guild; falla si no existe.
    pub fn delete(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        match self.sessions.remove(&guild_id) {
            Some(_) => Ok(()),
            None => Err(PlaybackError::DoesntExist),
        }
    }
}

impl Registry<Arc<Player>> {
    /// Pide el fin de todas las sesiones activas (shutdown).
    pub fn stop_all(&self) {
        for session in self.sessions.iter() {
            session.value().stop();
        }
    }
}

impl<S: Clone> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_get_delete_roundtrip() {
        let registry: Registry<u64> = Registry::new();
        let guild = GuildId::new(1);

        assert!(registry.get(guild).is_none());
        registry.add(guild, 7).unwrap();
        assert_eq!(registry.get(guild), Some(7));
        registry.delete(guild).unwrap();
        assert!(registry.get(guild).is_none());
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let registry: Registry<u64> = Registry::new();
        let guild = GuildId::new(1);

        registry.add(guild, 1).unwrap();
        let err = registry.add(guild, 2).unwrap_err();
        assert!(matches!(err, PlaybackError::AlreadyExists));
        // la sesión original sigue intacta
        assert_eq!(registry.get(guild), Some(1));
    }

    #[test]
    fn delete_absent_key_fails_and_leaves_table_unchanged() {
        let registry: Registry<u64> = Registry::new();
        registry.add(GuildId::new(1), 1).unwrap();

        let err = registry.delete(GuildId::new(2)).unwrap_err();
        assert!(matches!(err, PlaybackError::DoesntExist));
        assert_eq!(registry.get(GuildId::new(1)), Some(1));
    }

    #[test]
    fn concurrent_adds_same_key_exactly_one_wins() {
        let registry = std::sync::Arc::new(Registry::<usize>::new());
        let guild = GuildId::new(42);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.add(guild, i).is_ok())
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn adds_for_different_guilds_do_not_interfere() {
        let registry: Registry<u64> = Registry::new();
        for id in 1..=8 {
            registry.add(GuildId::new(id), id).unwrap();
        }
        for id in 1..=8 {
            assert_eq!(registry.get(GuildId::new(id)), Some(id));
        }
    }
}
