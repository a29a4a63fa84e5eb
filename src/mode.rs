//! Channel, user and prefix mode state.
//!
//! A [`Mode`] packs the 52 flag letters `[a-zA-Z]` into two `u32`
//! bitfields plus a cached display prefix. Which flags are valid, which
//! consume parameters, and how flags map to user prefixes is a property
//! of the server and lives in [`ModeCfg`], configured from RFC 2811/2812
//! defaults and the 004/005 numerics.

use crate::error::ModeError;

/// RPL_NAMREPLY channel flags: `@` secret, `*` private, `=` other.
const PREFIX_SECRET: char = '@';
const PREFIX_PRIVATE: char = '*';
const PREFIX_OTHER: char = '=';

/// Direction of a mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSet {
    On,
    Off,
}

/// Classification of a chanmode flag under a given configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanModeType {
    /// Sets/unsets a channel flag, no parameter.
    Chanmode,
    /// Sets/unsets a channel flag, consumes a parameter.
    ChanmodeParam,
    /// Sets/unsets a mode on a named user, consumes the nick.
    Prefix,
    /// Flag letter not configured.
    InvalidFlag,
    /// No `+`/`-` seen before the flag.
    InvalidSet,
}

/// Map a flag letter to its bit, or 0 for non-letters.
fn flag_bit(c: char) -> u32 {
    match c {
        'a'..='z' => 1 << (c as u32 - 'a' as u32),
        'A'..='Z' => 1 << (c as u32 - 'A' as u32),
        _ => 0,
    }
}

/// A set of mode flags with a cached display prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mode {
    pub lower: u32,
    pub upper: u32,
    pub prefix: Option<char>,
}

impl Mode {
    /// Test whether a flag is set.
    pub fn is_set(&self, flag: char) -> bool {
        let bit = flag_bit(flag);

        match flag {
            'a'..='z' => self.lower & bit != 0,
            'A'..='Z' => self.upper & bit != 0,
            _ => false,
        }
    }

    fn set_bit(&mut self, flag: char, set: ModeSet) {
        let bit = flag_bit(flag);

        let field = match flag {
            'a'..='z' => &mut self.lower,
            'A'..='Z' => &mut self.upper,
            _ => return,
        };

        match set {
            ModeSet::On => *field |= bit,
            ModeSet::Off => *field &= !bit,
        }
    }

    /// Clear all flags and the cached prefix.
    pub fn reset(&mut self) {
        *self = Mode::default();
    }

    /// Set/unset a chanmode flag.
    ///
    /// Only CHANMODE subtypes B, C, D set flags for the channel; subtype A
    /// list modes are accepted but record nothing. The flags `s` (secret)
    /// and `p` (private) are mutually exclusive (RFC 2811, 4.2.6): setting
    /// `s` clears `p`, and `p` writes are silently ignored while `s` is
    /// set. Both are reflected in the channel prefix rather than the flag
    /// string.
    pub fn chanmode_set(
        &mut self,
        cfg: &ModeCfg,
        flag: char,
        set: ModeSet,
    ) -> Result<(), ModeError> {
        if !cfg.chanmodes.is_set(flag) {
            return Err(ModeError::InvalidFlag);
        }

        if cfg.subtype_a.is_set(flag) {
            return Ok(());
        }

        match flag {
            'p' => {
                if self.is_set('s') {
                    return Ok(());
                }

                self.set_bit('p', set);
                self.prefix = Some(match set {
                    ModeSet::On => PREFIX_PRIVATE,
                    ModeSet::Off => PREFIX_OTHER,
                });
            }
            's' => {
                self.set_bit('s', set);
                self.set_bit('p', ModeSet::Off);
                self.prefix = Some(match set {
                    ModeSet::On => PREFIX_SECRET,
                    ModeSet::Off => PREFIX_OTHER,
                });
            }
            _ => self.set_bit(flag, set),
        }

        Ok(())
    }

    /// Set/unset a prefix mode flag and recompute the display prefix.
    ///
    /// The visible prefix is the highest-precedence (leftmost in PREFIX)
    /// symbol among the set flags.
    pub fn prfxmode_set(
        &mut self,
        cfg: &ModeCfg,
        flag: char,
        set: ModeSet,
    ) -> Result<(), ModeError> {
        if !cfg.prefix.from.contains(flag) {
            return Err(ModeError::InvalidFlag);
        }

        self.set_bit(flag, set);

        self.prefix = cfg
            .prefix
            .from
            .chars()
            .zip(cfg.prefix.to.chars())
            .find(|&(f, _)| self.is_set(f))
            .map(|(_, t)| t);

        Ok(())
    }

    /// Set/unset a usermode flag.
    pub fn usermode_set(
        &mut self,
        cfg: &ModeCfg,
        flag: char,
        set: ModeSet,
    ) -> Result<(), ModeError> {
        if !cfg.usermodes.is_set(flag) {
            return Err(ModeError::InvalidFlag);
        }

        self.set_bit(flag, set);

        Ok(())
    }

    /// Apply a RPL_NAMREPLY channel flag: `@` sets `s`, `*` sets `p`,
    /// `=` sets neither.
    ///
    /// Prefixes may override by precedence but are silently ignored
    /// otherwise: while secret, everything is ignored; while private,
    /// only `@` is accepted.
    pub fn chanmode_prefix(&mut self, flag: char) -> Result<(), ModeError> {
        if self.prefix == Some(PREFIX_SECRET) {
            return Ok(());
        }

        if self.prefix == Some(PREFIX_PRIVATE) && flag != PREFIX_SECRET {
            return Ok(());
        }

        match flag {
            PREFIX_SECRET => {
                self.set_bit('p', ModeSet::Off);
                self.set_bit('s', ModeSet::On);
            }
            PREFIX_PRIVATE => {
                self.set_bit('p', ModeSet::On);
            }
            PREFIX_OTHER => (),
            _ => return Err(ModeError::InvalidPrefix),
        }

        self.prefix = Some(flag);

        Ok(())
    }

    /// Apply a nick prefix symbol, e.g. with `PREFIX=(ov)@+`, `@` sets
    /// flag `o` and `+` sets flag `v`.
    pub fn prfxmode_prefix(&mut self, cfg: &ModeCfg, prefix: char) -> Result<(), ModeError> {
        let flag = cfg
            .prefix
            .to
            .chars()
            .zip(cfg.prefix.from.chars())
            .find(|&(t, _)| t == prefix)
            .map(|(_, f)| f)
            .ok_or(ModeError::InvalidPrefix)?;

        self.prfxmode_set(cfg, flag, ModeSet::On)
    }
}

/// Kind of printable mode string to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeStrKind {
    /// `s`/`p` are omitted, reflected in the channel prefix instead.
    Chanmode,
    Usermode,
    Prfxmode,
}

/// Write the set flags as a printable string, `a..z` then `A..Z`.
pub fn mode_str(m: &Mode, kind: ModeStrKind) -> String {
    let skip: &[char] = match kind {
        ModeStrKind::Chanmode => &['s', 'p'],
        _ => &[],
    };

    let mut out = String::new();

    for c in ('a'..='z').chain('A'..='Z') {
        if m.is_set(c) && !skip.contains(&c) {
            out.push(c);
        }
    }

    out
}

/// PREFIX mapping from flag letters to nick prefix symbols, leftmost
/// highest precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMap {
    pub from: String,
    pub to: String,
}

/// Server mode configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeCfg {
    /// Valid chanmode flag letters.
    pub chanmodes: Mode,
    /// Valid usermode flag letters.
    pub usermodes: Mode,
    /// CHANMODES subtype A: list modes, parameter always.
    pub subtype_a: Mode,
    /// CHANMODES subtype B: parameter always.
    pub subtype_b: Mode,
    /// CHANMODES subtype C: parameter when setting.
    pub subtype_c: Mode,
    /// CHANMODES subtype D: no parameter.
    pub subtype_d: Mode,
    /// PREFIX flag-to-symbol map.
    pub prefix: PrefixMap,
    /// MODES: maximum parameterized changes per MODE command.
    pub modes_max: u32,
}

impl Default for ModeCfg {
    /// RFC 2811/2812 defaults.
    ///
    /// Chanmodes (RFC 2811, section 4), usermodes (RFC 2812, 3.1.5),
    /// MODES=3 (RFC 2811, 3.2.3), PREFIX per numeric 319's `o`,`v` to
    /// `@`,`+` mapping.
    fn default() -> Self {
        let mut cfg = ModeCfg {
            chanmodes: Mode::default(),
            usermodes: Mode::default(),
            subtype_a: Mode::default(),
            subtype_b: Mode::default(),
            subtype_c: Mode::default(),
            subtype_d: Mode::default(),
            prefix: PrefixMap {
                from: "ov".to_string(),
                to: "@+".to_string(),
            },
            modes_max: 3,
        };

        cfg.set_chanmodes("OovaimnqpsrtklbeI").unwrap();
        cfg.set_usermodes("aiwroOs").unwrap();
        cfg.set_subtypes("beI,k,l,aimnqpsrtO").unwrap();

        cfg
    }
}

/// Collect flag letters into a mode set, skipping invalid and duplicate
/// letters.
fn collect_flags(s: &str) -> Mode {
    let mut m = Mode::default();

    for c in s.chars() {
        if flag_bit(c) == 0 || m.is_set(c) {
            continue;
        }
        m.set_bit(c, ModeSet::On);
    }

    m
}

impl ModeCfg {
    /// Configure valid chanmodes from the 004 string.
    pub fn set_chanmodes(&mut self, s: &str) -> Result<(), ModeError> {
        self.chanmodes = collect_flags(s);
        Ok(())
    }

    /// Configure valid usermodes from the 004 string.
    pub fn set_usermodes(&mut self, s: &str) -> Result<(), ModeError> {
        self.usermodes = collect_flags(s);
        Ok(())
    }

    /// Configure CHANMODES subtypes from the comma-separated 005 value,
    /// e.g. `"abc,d,ef,xyz"` sets A = a|b|c, B = d, C = e|f, D = x|y|z.
    ///
    /// Missing groups are empty; more than three commas reject.
    pub fn set_subtypes(&mut self, s: &str) -> Result<(), ModeError> {
        let mut groups = [Mode::default(); 4];
        let mut seen = Mode::default();
        let mut commas = 0;

        for c in s.chars() {
            if c == ',' {
                commas += 1;
                if commas > 3 {
                    return Err(ModeError::InvalidConfig);
                }
                continue;
            }

            if flag_bit(c) == 0 || seen.is_set(c) {
                continue;
            }

            seen.set_bit(c, ModeSet::On);
            groups[commas].set_bit(c, ModeSet::On);
        }

        [self.subtype_a, self.subtype_b, self.subtype_c, self.subtype_d] = groups;

        Ok(())
    }

    /// Configure PREFIX from the 005 `(letters)symbols` value.
    ///
    /// Letters and symbols must be the same length, symbols printable,
    /// letters valid flags, no duplicates. On failure the mapping is
    /// cleared.
    pub fn set_prefix(&mut self, s: &str) -> Result<(), ModeError> {
        match self.parse_prefix(s) {
            Some(map) => {
                self.prefix = map;
                Ok(())
            }
            None => {
                self.prefix = PrefixMap {
                    from: String::new(),
                    to: String::new(),
                };
                Err(ModeError::InvalidConfig)
            }
        }
    }

    fn parse_prefix(&self, s: &str) -> Option<PrefixMap> {
        let rest = s.strip_prefix('(')?;
        let (from, to) = rest.split_once(')')?;

        if from.is_empty() || from.len() != to.len() {
            return None;
        }

        let mut seen = Mode::default();

        for (f, t) in from.chars().zip(to.chars()) {
            if flag_bit(f) == 0 || seen.is_set(f) {
                return None;
            }
            if !t.is_ascii_graphic() {
                return None;
            }
            seen.set_bit(f, ModeSet::On);
        }

        Some(PrefixMap {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Configure MODES from the 005 value; valid values are `[1, 99]`.
    pub fn set_modes(&mut self, s: &str) -> Result<(), ModeError> {
        if s.is_empty() || s.len() > 2 || !s.bytes().all(|c| c.is_ascii_digit()) {
            return Err(ModeError::InvalidConfig);
        }

        let modes: u32 = s.parse().map_err(|_| ModeError::InvalidConfig)?;

        if modes == 0 {
            return Err(ModeError::InvalidConfig);
        }

        self.modes_max = modes;

        Ok(())
    }

    /// Classify a chanmode flag: prefix modes and subtypes A, B and
    /// C-when-setting take a parameter; C-when-unsetting and D do not.
    pub fn chanmode_type(&self, set: Option<ModeSet>, flag: char) -> ChanModeType {
        let Some(set) = set else {
            return ChanModeType::InvalidSet;
        };

        if self.chanmodes.is_set(flag) {
            if self.prefix.from.contains(flag) {
                return ChanModeType::Prefix;
            }

            if self.subtype_a.is_set(flag) || self.subtype_b.is_set(flag) {
                return ChanModeType::ChanmodeParam;
            }

            if self.subtype_c.is_set(flag) {
                return match set {
                    ModeSet::On => ChanModeType::ChanmodeParam,
                    ModeSet::Off => ChanModeType::Chanmode,
                };
            }

            if self.subtype_d.is_set(flag) {
                return ChanModeType::Chanmode;
            }
        }

        ChanModeType::InvalidFlag
    }
}
