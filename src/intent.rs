//! Fixed-rule intent matching for follow-up commands.
//!
//! Rules are tried in order and the first hit wins. Text is lower-cased and
//! transliterated to ASCII first, so recognizers that drop accents ("va para a
//! sala") and ones that keep them ("vá para a sala") land on the same rule.

use deunicode::deunicode;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Stop,
    FollowPerson,
    Navigate { room: String },
    Introduce,
    Joke,
    Status,
    MakeSad,
    MakeHappy,
}

/// Slot-free discriminant of [`Intent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Stop,
    FollowPerson,
    Navigate,
    Introduce,
    Joke,
    Status,
    MakeSad,
    MakeHappy,
}

impl IntentKind {
    pub const ALL: [IntentKind; 8] = [
        IntentKind::Stop,
        IntentKind::FollowPerson,
        IntentKind::Navigate,
        IntentKind::Introduce,
        IntentKind::Joke,
        IntentKind::Status,
        IntentKind::MakeSad,
        IntentKind::MakeHappy,
    ];
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::Stop => IntentKind::Stop,
            Intent::FollowPerson => IntentKind::FollowPerson,
            Intent::Navigate { .. } => IntentKind::Navigate,
            Intent::Introduce => IntentKind::Introduce,
            Intent::Joke => IntentKind::Joke,
            Intent::Status => IntentKind::Status,
            Intent::MakeSad => IntentKind::MakeSad,
            Intent::MakeHappy => IntentKind::MakeHappy,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Stop => write!(f, "stop"),
            Intent::FollowPerson => write!(f, "follow_person"),
            Intent::Navigate { room } => write!(f, "navigate{{room={}}}", room),
            Intent::Introduce => write!(f, "introduce"),
            Intent::Joke => write!(f, "joke"),
            Intent::Status => write!(f, "status"),
            Intent::MakeSad => write!(f, "make_sad"),
            Intent::MakeHappy => write!(f, "make_happy"),
        }
    }
}

enum Matcher {
    Pattern(Regex),
    AnyOf(&'static [&'static str]),
}

struct Rule {
    kind: IntentKind,
    matcher: Matcher,
}

fn pattern(re: &str) -> Matcher {
    // Patterns are compile-time literals; a bad one is a programming error.
    Matcher::Pattern(Regex::new(re).expect("invalid intent pattern"))
}

lazy_static! {
    static ref RULES: Vec<Rule> = vec![
        Rule {
            kind: IntentKind::Stop,
            matcher: pattern(r"\b(pare|parar|stop|chega)\b"),
        },
        Rule {
            kind: IntentKind::FollowPerson,
            matcher: Matcher::AnyOf(&["me siga", "siga-me", "me acompanha", "me acompanhar"]),
        },
        Rule {
            kind: IntentKind::Navigate,
            matcher: pattern(
                r"\bva\s+para\s+a?\s*(?P<room>cozinha|sala|quarto|banheiro|garagem|entrada)",
            ),
        },
        Rule {
            kind: IntentKind::Introduce,
            matcher: Matcher::AnyOf(&[
                "quem e voce",
                "se apresente",
                "como voce se chama",
            ]),
        },
        Rule {
            kind: IntentKind::Joke,
            matcher: Matcher::AnyOf(&["piada"]),
        },
        Rule {
            kind: IntentKind::Status,
            matcher: Matcher::AnyOf(&["como voce esta", "tudo bem", "como vai"]),
        },
        Rule {
            kind: IntentKind::MakeSad,
            matcher: Matcher::AnyOf(&["triste", "chateado", "poxa", "pena", "decepcionado"]),
        },
        Rule {
            kind: IntentKind::MakeHappy,
            matcher: Matcher::AnyOf(&["feliz", "contente", "legal", "bom trabalho", "mandou bem"]),
        },
    ];
}

/// Lower-cases and strips diacritics.
pub fn normalize(text: &str) -> String {
    deunicode(&text.to_lowercase())
}

/// Maps an utterance to an intent, or `None` when no rule matches.
pub fn parse_intent(text: &str) -> Option<Intent> {
    let t = normalize(text);
    if t.trim().is_empty() {
        return None;
    }

    for rule in RULES.iter() {
        let hit = match &rule.matcher {
            Matcher::Pattern(re) => re.captures(&t).map(|caps| {
                caps.name("room")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            }),
            Matcher::AnyOf(phrases) => phrases
                .iter()
                .any(|p| t.contains(p))
                .then(String::new),
        };

        if let Some(slot) = hit {
            return Some(match rule.kind {
                IntentKind::Stop => Intent::Stop,
                IntentKind::FollowPerson => Intent::FollowPerson,
                IntentKind::Navigate => Intent::Navigate { room: slot },
                IntentKind::Introduce => Intent::Introduce,
                IntentKind::Joke => Intent::Joke,
                IntentKind::Status => Intent::Status,
                IntentKind::MakeSad => Intent::MakeSad,
                IntentKind::MakeHappy => Intent::MakeHappy,
            });
        }
    }

    None
}
