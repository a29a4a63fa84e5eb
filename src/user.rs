//! Per-channel user list.
//!
//! Users are kept ordered by nick under the owning server's casemapping,
//! which is passed to every operation rather than stored; a server's
//! CASEMAPPING can change and the list discipline follows it.

use crate::casemap::{irc_cmp, irc_ncmp, Casemap};
use crate::error::UserError;
use crate::mode::Mode;

/// A channel member.
#[derive(Debug, Clone)]
pub struct User {
    pub nick: String,
    pub prfxmodes: Mode,
}

impl User {
    /// The user's visible nick prefix, if any PREFIX mode is set.
    pub fn prefix(&self) -> Option<char> {
        self.prfxmodes.prefix
    }
}

/// Nick-ordered list of channel members.
#[derive(Debug, Clone, Default)]
pub struct UserList {
    users: Vec<User>,
}

impl UserList {
    fn position(&self, cm: Casemap, nick: &str) -> Result<usize, usize> {
        self.users
            .binary_search_by(|u| irc_cmp(cm, &u.nick, nick))
    }

    /// Number of users.
    pub fn count(&self) -> usize {
        self.users.len()
    }

    /// Add a user; duplicate nicks under the casemapping fail.
    pub fn add(&mut self, cm: Casemap, nick: &str, prfxmodes: Mode) -> Result<(), UserError> {
        match self.position(cm, nick) {
            Ok(_) => Err(UserError::Duplicate),
            Err(at) => {
                self.users.insert(
                    at,
                    User {
                        nick: nick.to_string(),
                        prfxmodes,
                    },
                );
                Ok(())
            }
        }
    }

    /// Remove a user by nick.
    pub fn del(&mut self, cm: Casemap, nick: &str) -> Result<(), UserError> {
        match self.position(cm, nick) {
            Ok(at) => {
                self.users.remove(at);
                Ok(())
            }
            Err(_) => Err(UserError::NotFound),
        }
    }

    /// Replace a user by name, maintaining modes; fails when the new
    /// nick is already present.
    pub fn rpl(&mut self, cm: Casemap, nick_old: &str, nick_new: &str) -> Result<(), UserError> {
        let old = self.position(cm, nick_old).map_err(|_| UserError::NotFound)?;

        if self.position(cm, nick_new).is_ok() {
            return Err(UserError::Duplicate);
        }

        let prfxmodes = self.users[old].prfxmodes;
        self.users.remove(old);

        self.add(cm, nick_new, prfxmodes)
    }

    /// Look up a user by nick.
    pub fn get(&self, cm: Casemap, nick: &str) -> Option<&User> {
        self.position(cm, nick).ok().map(|at| &self.users[at])
    }

    /// Mutable lookup by nick.
    pub fn get_mut(&mut self, cm: Casemap, nick: &str) -> Option<&mut User> {
        match self.position(cm, nick) {
            Ok(at) => Some(&mut self.users[at]),
            Err(_) => None,
        }
    }

    /// First user whose nick starts with the first `len` bytes of
    /// `prefix`, for completion.
    pub fn get_prefix(&self, cm: Casemap, prefix: &str, len: usize) -> Option<&User> {
        let start = self
            .users
            .partition_point(|u| irc_ncmp(cm, &u.nick, prefix, len) == std::cmp::Ordering::Less);

        self.users.get(start).filter(|u| {
            irc_ncmp(cm, &u.nick, prefix, len) == std::cmp::Ordering::Equal
        })
    }

    /// Iterate users in nick order.
    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.iter()
    }

    /// Remove all users.
    pub fn clear(&mut self) {
        self.users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{ModeCfg, ModeSet};

    const CM: Casemap = Casemap::Rfc1459;

    #[test]
    fn test_add_del() {
        let mut ul = UserList::default();

        assert!(ul.add(CM, "alice", Mode::default()).is_ok());
        assert!(ul.add(CM, "bob", Mode::default()).is_ok());
        assert_eq!(ul.count(), 2);

        assert_eq!(ul.add(CM, "ALICE", Mode::default()), Err(UserError::Duplicate));

        assert!(ul.del(CM, "Alice").is_ok());
        assert_eq!(ul.count(), 1);
        assert_eq!(ul.del(CM, "alice"), Err(UserError::NotFound));
    }

    #[test]
    fn test_casemapped_dedup() {
        let mut ul = UserList::default();

        assert!(ul.add(CM, "[nick]", Mode::default()).is_ok());
        assert_eq!(
            ul.add(CM, "{nick}", Mode::default()),
            Err(UserError::Duplicate)
        );

        /* distinct names under ascii mapping */
        let mut ul = UserList::default();
        assert!(ul.add(Casemap::Ascii, "[nick]", Mode::default()).is_ok());
        assert!(ul.add(Casemap::Ascii, "{nick}", Mode::default()).is_ok());
    }

    #[test]
    fn test_rpl_keeps_modes() {
        let mut ul = UserList::default();
        let cfg = ModeCfg::default();

        let mut m = Mode::default();
        m.prfxmode_set(&cfg, 'o', ModeSet::On).unwrap();

        ul.add(CM, "old", m).unwrap();
        ul.add(CM, "other", Mode::default()).unwrap();

        assert_eq!(ul.rpl(CM, "missing", "new"), Err(UserError::NotFound));
        assert_eq!(ul.rpl(CM, "old", "other"), Err(UserError::Duplicate));

        assert!(ul.rpl(CM, "old", "new").is_ok());
        assert!(ul.get(CM, "old").is_none());

        let u = ul.get(CM, "new").unwrap();
        assert!(u.prfxmodes.is_set('o'));
        assert_eq!(u.prefix(), Some('@'));
    }

    #[test]
    fn test_get_prefix() {
        let mut ul = UserList::default();

        ul.add(CM, "nick", Mode::default()).unwrap();
        ul.add(CM, "nicole", Mode::default()).unwrap();
        ul.add(CM, "bob", Mode::default()).unwrap();

        assert_eq!(ul.get_prefix(CM, "NIC", 3).unwrap().nick, "nick");
        assert_eq!(ul.get_prefix(CM, "nico", 4).unwrap().nick, "nicole");
        assert!(ul.get_prefix(CM, "x", 1).is_none());
    }

    #[test]
    fn test_iter_ordered() {
        let mut ul = UserList::default();

        for nick in ["delta", "alpha", "charlie", "bravo"] {
            ul.add(CM, nick, Mode::default()).unwrap();
        }

        let nicks: Vec<_> = ul.iter().map(|u| u.nick.as_str()).collect();
        assert_eq!(nicks, vec!["alpha", "bravo", "charlie", "delta"]);
    }
}
