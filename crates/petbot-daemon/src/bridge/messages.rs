use std::time::Duration;

use irc::proto::{Command, Message, Response};

use crate::registry::presence::strip_mode_prefix;

/// Italic toggle that brackets every narrative pet line.
pub const ITALIC: char = '\x1D';
pub const CTCP_DELIM: char = '\x01';

/// Departure reason servers use for cloak/host changes.
pub const HOST_CHANGE_REASON: &str = "Changing host";

/// Everything the bot reacts to, already lifted off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A plain PRIVMSG. `channel` is `None` for private messages.
    Chat {
        nick: String,
        channel: Option<String>,
        text: String,
    },
    /// A CTCP ACTION (`/me ...`), payload without the framing.
    Action {
        nick: String,
        channel: Option<String>,
        text: String,
    },
    Join {
        nick: String,
        channel: String,
    },
    Part {
        nick: String,
        channel: String,
        reason: Option<String>,
    },
    Quit {
        nick: String,
        reason: Option<String>,
    },
    NickChange {
        old: String,
        new: String,
    },
    Names {
        channel: String,
        nicks: Vec<String>,
    },
    NamesEnd {
        channel: String,
    },
}

impl HostEvent {
    pub fn from_message(message: &Message) -> Option<Self> {
        let source = message.source_nickname().map(str::to_string);
        match &message.command {
            Command::PRIVMSG(target, text) => {
                let nick = source?;
                let channel = is_channel(target).then(|| target.clone());
                match parse_ctcp_action(text) {
                    Some(action) => Some(Self::Action {
                        nick,
                        channel,
                        text: action.to_string(),
                    }),
                    None if text.starts_with(CTCP_DELIM) => None,
                    None => Some(Self::Chat {
                        nick,
                        channel,
                        text: text.clone(),
                    }),
                }
            }
            Command::JOIN(channels, _, _) => {
                let nick = source?;
                let channel = channels.split(',').next()?.to_string();
                Some(Self::Join { nick, channel })
            }
            Command::PART(channels, reason) => Some(Self::Part {
                nick: source?,
                channel: channels.split(',').next()?.to_string(),
                reason: reason.clone(),
            }),
            Command::KICK(channel, nick, reason) => Some(Self::Part {
                nick: nick.clone(),
                channel: channel.clone(),
                reason: reason.clone(),
            }),
            Command::QUIT(reason) => Some(Self::Quit {
                nick: source?,
                reason: reason.clone(),
            }),
            Command::NICK(new) => Some(Self::NickChange {
                old: source?,
                new: new.clone(),
            }),
            Command::Response(Response::RPL_NAMREPLY, args) => {
                // <me> <symbol> <channel> :<nicks>
                let channel = args.get(2)?.clone();
                let nicks = args
                    .get(3)
                    .map(|list| {
                        list.split_whitespace()
                            .map(|nick| strip_mode_prefix(nick).to_string())
                            .filter(|nick| !nick.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();
                Some(Self::Names { channel, nicks })
            }
            Command::Response(Response::RPL_ENDOFNAMES, args) => Some(Self::NamesEnd {
                channel: args.get(1)?.clone(),
            }),
            _ => None,
        }
    }
}

/// A line to deliver, optionally after a delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub target: String,
    pub text: String,
    pub delay: Option<Duration>,
}

impl Outgoing {
    pub fn to(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            text: text.into(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Option<Duration>) -> Self {
        self.delay = delay;
        self
    }
}

pub fn is_channel(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

/// `\x1D*<name> <text>*\x1D`, the narrative format used for every pet line.
pub fn format_action(name: &str, text: &str) -> String {
    format!("{ITALIC}*{name} {text}*{ITALIC}")
}

/// Wraps `text` as a CTCP ACTION so clients render it as `/me`.
pub fn ctcp_action(text: &str) -> String {
    format!("{CTCP_DELIM}ACTION {text}{CTCP_DELIM}")
}

/// Payload of a CTCP ACTION, tolerating a missing closing delimiter.
pub fn parse_ctcp_action(text: &str) -> Option<&str> {
    let body = text.strip_prefix(CTCP_DELIM)?.strip_prefix("ACTION")?;
    let body = body.strip_suffix(CTCP_DELIM).unwrap_or(body);
    Some(body.strip_prefix(' ').unwrap_or(body))
}

/// Host and cloak changes show up as a quit but are not real departures.
pub fn is_meaningful_departure(reason: Option<&str>) -> bool {
    !reason.is_some_and(|r| r.trim().eq_ignore_ascii_case(HOST_CHANGE_REASON))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(raw: &str) -> Option<HostEvent> {
        let message: Message = raw.parse().unwrap();
        HostEvent::from_message(&message)
    }

    #[test]
    fn test_format_action_bytes() {
        assert_eq!(
            format_action("Fido", "wags").as_bytes(),
            b"\x1D*Fido wags*\x1D"
        );
    }

    #[test]
    fn test_channel_chat() {
        assert_eq!(
            event(":carol!c@host PRIVMSG #test :hey Fido\r\n"),
            Some(HostEvent::Chat {
                nick: "carol".into(),
                channel: Some("#test".into()),
                text: "hey Fido".into(),
            })
        );
    }

    #[test]
    fn test_ctcp_action_detected() {
        assert_eq!(
            event(":carol!c@host PRIVMSG #test :\x01ACTION pets Fido\x01\r\n"),
            Some(HostEvent::Action {
                nick: "carol".into(),
                channel: Some("#test".into()),
                text: "pets Fido".into(),
            })
        );
        assert_eq!(event(":carol!c@host PRIVMSG petbot :\x01VERSION\x01\r\n"), None);
    }

    #[test]
    fn test_private_message_has_no_channel() {
        match event(":carol!c@host PRIVMSG petbot :.listpets\r\n") {
            Some(HostEvent::Chat { channel, .. }) => assert_eq!(channel, None),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_membership_events() {
        assert_eq!(
            event(":alice!a@host JOIN #test\r\n"),
            Some(HostEvent::Join {
                nick: "alice".into(),
                channel: "#test".into(),
            })
        );
        assert_eq!(
            event(":alice!a@host QUIT :Changing host\r\n"),
            Some(HostEvent::Quit {
                nick: "alice".into(),
                reason: Some("Changing host".into()),
            })
        );
        assert_eq!(
            event(":op!o@host KICK #test alice :bye\r\n"),
            Some(HostEvent::Part {
                nick: "alice".into(),
                channel: "#test".into(),
                reason: Some("bye".into()),
            })
        );
    }

    #[test]
    fn test_names_reply() {
        assert_eq!(
            event(":server 353 petbot = #test :@alice +bob carol\r\n"),
            Some(HostEvent::Names {
                channel: "#test".into(),
                nicks: vec!["alice".into(), "bob".into(), "carol".into()],
            })
        );
        assert_eq!(
            event(":server 366 petbot #test :End of /NAMES list.\r\n"),
            Some(HostEvent::NamesEnd {
                channel: "#test".into()
            })
        );
    }

    #[test]
    fn test_departure_reason() {
        assert!(!is_meaningful_departure(Some("Changing host")));
        assert!(is_meaningful_departure(Some("Ping timeout")));
        assert!(is_meaningful_departure(None));
    }

    #[test]
    fn test_ctcp_round_trip() {
        assert_eq!(parse_ctcp_action(&ctcp_action("purrs")), Some("purrs"));
        assert_eq!(parse_ctcp_action("\x01ACTION waves"), Some("waves"));
        assert_eq!(parse_ctcp_action("hello"), None);
    }
}
