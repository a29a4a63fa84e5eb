//! Channel entities and the per-server channel list.

use crate::buffer::Buffer;
use crate::casemap::{irc_eq, Casemap};
use crate::input::Input;
use crate::mode::Mode;
use crate::user::UserList;

/// Channel activity types, in order of precedence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Activity {
    #[default]
    Default,
    /// Join/Part/Quit activity.
    JoinPartQuit,
    /// Chat activity.
    Active,
    /// Current nick mentioned.
    Pinged,
}

/// Kind of buffer a channel represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// The client's default buffer.
    Rirc,
    /// Server message buffer.
    Server,
    /// Joined channel buffer.
    Channel,
    /// Private message buffer.
    Privmsg,
}

/// A single conversation buffer with its members, modes and input line.
pub struct Channel {
    pub name: String,
    pub kind: ChannelKind,
    pub activity: Activity,
    pub joined: bool,
    pub parted: bool,
    pub chanmodes: Mode,
    pub chanmodes_str: String,
    pub users: UserList,
    pub buffer: Buffer,
    pub input: Input,
}

impl Channel {
    pub fn new(name: &str, kind: ChannelKind) -> Channel {
        Channel {
            name: name.to_string(),
            kind,
            activity: Activity::Default,
            joined: false,
            parted: false,
            chanmodes: Mode::default(),
            chanmodes_str: String::new(),
            users: UserList::default(),
            buffer: Buffer::new(),
            input: Input::new(),
        }
    }

    /// Clear membership state: modes, users, joined flag, activity.
    /// The buffer and input persist.
    pub fn reset(&mut self) {
        self.chanmodes.reset();
        self.chanmodes_str.clear();
        self.users.clear();
        self.joined = false;
        self.activity = Activity::Default;
    }

    /// Leave the channel: reset and mark parted.
    pub fn part(&mut self) {
        self.reset();
        self.parted = true;
    }

    /// Raise activity, never lowering precedence.
    pub fn touch_activity(&mut self, activity: Activity) {
        self.activity = self.activity.max(activity);
    }
}

/// Channels in insertion order with casemapped name lookup.
#[derive(Default)]
pub struct ChannelList {
    channels: Vec<Channel>,
}

impl ChannelList {
    /// Number of channels.
    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// Append a channel, returning its index.
    pub fn add(&mut self, c: Channel) -> usize {
        self.channels.push(c);
        self.channels.len() - 1
    }

    /// Remove the channel at `index`.
    pub fn del(&mut self, index: usize) -> Channel {
        self.channels.remove(index)
    }

    /// Find a channel index by name under the server's casemapping.
    pub fn get(&self, cm: Casemap, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| irc_eq(cm, &c.name, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.iter_mut()
    }

    pub fn index(&self, i: usize) -> &Channel {
        &self.channels[i]
    }

    pub fn index_mut(&mut self, i: usize) -> &mut Channel {
        &mut self.channels[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{ModeCfg, ModeSet};

    #[test]
    fn test_list_lookup() {
        let mut cl = ChannelList::default();

        cl.add(Channel::new("#alpha", ChannelKind::Channel));
        cl.add(Channel::new("#[beta]", ChannelKind::Channel));

        assert_eq!(cl.get(Casemap::Rfc1459, "#ALPHA"), Some(0));
        assert_eq!(cl.get(Casemap::Rfc1459, "#{beta}"), Some(1));
        assert_eq!(cl.get(Casemap::Ascii, "#{beta}"), None);
        assert_eq!(cl.get(Casemap::Rfc1459, "#gamma"), None);
    }

    #[test]
    fn test_insertion_order() {
        let mut cl = ChannelList::default();

        for name in ["#z", "#a", "#m"] {
            cl.add(Channel::new(name, ChannelKind::Channel));
        }

        let names: Vec<_> = cl.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["#z", "#a", "#m"]);
    }

    #[test]
    fn test_part_resets() {
        let cfg = ModeCfg::default();
        let mut c = Channel::new("#chan", ChannelKind::Channel);

        c.joined = true;
        c.chanmodes.chanmode_set(&cfg, 't', ModeSet::On).unwrap();
        c.users
            .add(Casemap::Rfc1459, "nick", Mode::default())
            .unwrap();
        c.activity = Activity::Pinged;
        c.buffer.push(crate::buffer::LineType::Chat, "nick", "hi", None);

        c.part();

        assert!(c.parted);
        assert!(!c.joined);
        assert!(!c.chanmodes.is_set('t'));
        assert_eq!(c.users.count(), 0);
        assert_eq!(c.activity, Activity::Default);
        assert_eq!(c.buffer.size(), 1);
    }

    #[test]
    fn test_activity_precedence() {
        let mut c = Channel::new("#chan", ChannelKind::Channel);

        c.touch_activity(Activity::Pinged);
        c.touch_activity(Activity::Active);
        assert_eq!(c.activity, Activity::Pinged);
    }
}
