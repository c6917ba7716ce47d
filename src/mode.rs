//! IRC mode-string parsing keyed by server-advertised categories.
//!
//! Channel mode letters are classified by the server into four categories
//! via the `CHANMODES` ISUPPORT token (plus `PREFIX` modes, which behave
//! like category B). The category decides whether a letter consumes an
//! argument:
//!
//! - A: list modes (bans, exceptions) - argument in both directions
//! - B: argument in both directions
//! - C: argument only when set
//! - D: never an argument
//!
//! # Reference
//! - Modern IRC documentation: <https://modern.ircdocs.horse/#mode-message>

use std::collections::HashMap;
use std::fmt;

/// Mode category per the `CHANMODES` classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModeCategory {
    /// List mode; always takes an argument.
    A,
    /// Always takes an argument, set and unset.
    B,
    /// Takes an argument only when set.
    C,
    /// Never takes an argument.
    D,
}

/// Map from mode letter to its category.
pub type ModeCategories = HashMap<char, ModeCategory>;

/// A single mode with its category and optional argument.
///
/// Equality considers only the letter, so a `+k secret` and a bare `k`
/// compare equal inside a channel's mode set.
#[derive(Clone, Debug, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mode {
    /// The classification the server advertised for this letter.
    pub category: ModeCategory,
    /// The mode letter.
    pub letter: char,
    /// The consumed argument, if the category called for one.
    pub arg: Option<String>,
}

impl Mode {
    /// Create a mode with no argument.
    pub fn new(category: ModeCategory, letter: char) -> Self {
        Mode {
            category,
            letter,
            arg: None,
        }
    }

    /// Create a mode carrying an argument.
    pub fn with_arg(category: ModeCategory, letter: char, arg: impl Into<String>) -> Self {
        Mode {
            category,
            letter,
            arg: Some(arg.into()),
        }
    }
}

impl PartialEq for Mode {
    fn eq(&self, other: &Self) -> bool {
        self.letter == other.letter
    }
}

impl std::hash::Hash for Mode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.letter.hash(state);
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter)
    }
}

/// A mode with its direction.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModeChange {
    /// Mode is being set (`+`).
    Set(Mode),
    /// Mode is being unset (`-`).
    Unset(Mode),
}

impl ModeChange {
    /// The mode being changed.
    pub fn mode(&self) -> &Mode {
        match self {
            Self::Set(m) | Self::Unset(m) => m,
        }
    }

    /// Returns true for `+`.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

/// Whether a letter consumes an argument in the given direction.
fn consumes_arg(category: ModeCategory, set: bool) -> bool {
    match category {
        ModeCategory::A | ModeCategory::B => true,
        ModeCategory::C => set,
        ModeCategory::D => false,
    }
}

/// Parse a mode word sequence (`["+sk-l", "key", ...]`) into changes.
///
/// The first word is the letter string; the rest are arguments consumed
/// left-to-right as the categories demand. Letters absent from the map
/// default to category D. An argument underrun invalidates the whole
/// message: the result is empty.
pub fn parse_mode_string(words: &[&str], categories: &ModeCategories) -> Vec<ModeChange> {
    let Some((letters, rest)) = words.split_first() else {
        return Vec::new();
    };

    let mut args = rest.iter();
    let mut set = true;
    let mut changes = Vec::new();

    for c in letters.chars() {
        match c {
            '+' => set = true,
            '-' => set = false,
            letter => {
                let category = categories
                    .get(&letter)
                    .copied()
                    .unwrap_or(ModeCategory::D);
                let arg = if consumes_arg(category, set) {
                    match args.next() {
                        Some(a) => Some((*a).to_owned()),
                        None => return Vec::new(),
                    }
                } else {
                    None
                };
                let mode = Mode {
                    category,
                    letter,
                    arg,
                };
                changes.push(if set {
                    ModeChange::Set(mode)
                } else {
                    ModeChange::Unset(mode)
                });
            }
        }
    }

    changes
}

/// Serialize mode changes back to a canonical mode word sequence.
///
/// Consecutive changes with the same sign share one sign character;
/// arguments follow the letter string in consumption order.
pub fn to_mode_string(changes: &[ModeChange]) -> String {
    let mut letters = String::new();
    let mut args = Vec::new();
    let mut current: Option<bool> = None;

    for change in changes {
        let set = change.is_set();
        if current != Some(set) {
            letters.push(if set { '+' } else { '-' });
            current = Some(set);
        }
        letters.push(change.mode().letter);
        if let Some(arg) = &change.mode().arg {
            args.push(arg.as_str());
        }
    }

    for arg in args {
        letters.push(' ');
        letters.push_str(arg);
    }

    letters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> ModeCategories {
        // A representative channel map: b list, k always-arg, l set-arg
        [
            ('b', ModeCategory::A),
            ('k', ModeCategory::B),
            ('l', ModeCategory::C),
            ('s', ModeCategory::D),
            ('n', ModeCategory::D),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_category_argument_consumption() {
        let changes = parse_mode_string(&["-sk+nl", "secret", "4"], &categories());
        assert_eq!(changes.len(), 4);

        assert_eq!(changes[0], ModeChange::Unset(Mode::new(ModeCategory::D, 's')));
        assert_eq!(
            changes[1],
            ModeChange::Unset(Mode::with_arg(ModeCategory::B, 'k', "secret"))
        );
        assert_eq!(changes[1].mode().arg.as_deref(), Some("secret"));
        assert_eq!(changes[2], ModeChange::Set(Mode::new(ModeCategory::D, 'n')));
        assert_eq!(changes[3].mode().arg.as_deref(), Some("4"));
        assert_eq!(changes[3].mode().category, ModeCategory::C);
    }

    #[test]
    fn test_c_mode_unset_takes_no_arg() {
        let changes = parse_mode_string(&["-l"], &categories());
        assert_eq!(changes.len(), 1);
        assert!(changes[0].mode().arg.is_none());
    }

    #[test]
    fn test_underrun_invalidates_whole_message() {
        // +k needs an argument; its absence voids the n change too
        assert!(parse_mode_string(&["+nk"], &categories()).is_empty());
        assert!(parse_mode_string(&["+bb", "one!*@*"], &categories()).is_empty());
    }

    #[test]
    fn test_unknown_letter_defaults_to_d() {
        let changes = parse_mode_string(&["+x"], &categories());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].mode().category, ModeCategory::D);
        assert!(changes[0].mode().arg.is_none());
    }

    #[test]
    fn test_no_leading_sign_means_set() {
        let changes = parse_mode_string(&["i"], &ModeCategories::new());
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_set());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_mode_string(&[], &categories()).is_empty());
        assert!(parse_mode_string(&[""], &categories()).is_empty());
    }

    #[test]
    fn test_surplus_arguments_ignored() {
        let changes = parse_mode_string(&["+s", "stray"], &categories());
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_mode_equality_by_letter() {
        let a = Mode::with_arg(ModeCategory::B, 'k', "secret");
        let b = Mode::new(ModeCategory::D, 'k');
        assert_eq!(a, b);
    }

    #[test]
    fn test_roundtrip() {
        for s in ["-sk+nl secret 4", "+ib *!*@spam.example", "+s", "-nt"] {
            let words: Vec<&str> = s.split(' ').collect();
            let changes = parse_mode_string(&words, &categories());
            assert_eq!(to_mode_string(&changes), s, "roundtrip of {:?}", s);
        }
    }
}
