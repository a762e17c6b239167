// command.rs - commands
//
// mini-irc-server - simple IRC server
// Copyright (C) 2022  Mateusz Szpakowski
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 2.1 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA  02110-1301  USA

use const_table::const_table;
use std::error::Error;
use std::fmt;

use crate::config::{validate_channel, validate_username};

#[derive(Clone, Copy, Debug)]
pub(crate) enum MessageError {
    Empty,
    WrongSource,
    NoCommand,
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::Empty => write!(f, "Message is empty"),
            MessageError::WrongSource => write!(f, "Wrong source syntax"),
            MessageError::NoCommand => write!(f, "No command"),
        }
    }
}

impl Error for MessageError {}

#[derive(PartialEq, Eq, Debug)]
pub(crate) struct Message<'a> {
    pub(crate) source: Option<&'a str>,
    pub(crate) command: &'a str,
    pub(crate) params: Vec<&'a str>,
}

fn validate_source(s: &str) -> bool {
    if s.contains(':') {
        false
    } else {
        let excl = s.find('!');
        let atchar = s.find('@');
        if let Some(excl_pos) = excl {
            if let Some(atchar_pos) = atchar {
                return excl_pos < atchar_pos;
            }
        }
        true
    }
}

impl<'a> Message<'a> {
    pub(crate) fn from_shared_str(input: &'a str) -> Result<Self, MessageError> {
        let trimmed = input.trim_start();

        if trimmed.len() != 0 {
            // start_pos after ':' if exists - to skip ':' before source
            let start_pos = if trimmed.bytes().next() == Some(b':') { 1 } else { 0 };
            let (rest, last_param) = if let Some((rest, lp)) = trimmed[start_pos..].split_once(':')
            {
                // get rest. add first character length to rest length.
                (&trimmed[0..rest.len() + start_pos], Some(lp))
            } else {
                (trimmed, None)
            };

            let mut rest_words = rest.split_ascii_whitespace();
            // find source
            let source = if rest.bytes().next() == Some(b':') {
                let s = &rest_words.next().unwrap()[1..];
                if !validate_source(s) {
                    return Err(MessageError::WrongSource);
                }
                Some(s)
            } else {
                None
            };
            let command = if let Some(cmd) = rest_words.next() {
                cmd
            } else {
                return Err(MessageError::NoCommand);
            };

            let mut params = rest_words.collect::<Vec<_>>();
            if let Some(lp) = last_param {
                params.push(lp); // add last parameter
            }

            Ok(Message {
                source,
                command,
                params,
            })
        } else {
            Err(MessageError::Empty)
        }
    }

    // format message with given source - for relaying client commands.
    pub(crate) fn to_string_with_source(&self, source: &str) -> String {
        let mut out = String::new();
        out.push(':');
        out.push_str(source);
        out.push(' ');
        out.push_str(self.command);
        if let Some((last, rest)) = self.params.split_last() {
            for p in rest {
                out.push(' ');
                out.push_str(p);
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                out.push_str(" :");
            } else {
                out.push(' ');
            }
            out.push_str(last);
        }
        out
    }
}

#[const_table]
pub enum CommandId {
    CommandName { pub(crate) name: &'static str },
    CAPId = CommandName { name: "CAP" },
    PASSId = CommandName { name: "PASS" },
    NICKId = CommandName { name: "NICK" },
    USERId = CommandName { name: "USER" },
    PINGId = CommandName { name: "PING" },
    PONGId = CommandName { name: "PONG" },
    QUITId = CommandName { name: "QUIT" },
    JOINId = CommandName { name: "JOIN" },
    PARTId = CommandName { name: "PART" },
    TOPICId = CommandName { name: "TOPIC" },
    INVITEId = CommandName { name: "INVITE" },
    KICKId = CommandName { name: "KICK" },
    MODEId = CommandName { name: "MODE" },
    PRIVMSGId = CommandName { name: "PRIVMSG" },
    WHOId = CommandName { name: "WHO" },
    WHOISId = CommandName { name: "WHOIS" },
    WHOWASId = CommandName { name: "WHOWAS" },
    AWAYId = CommandName { name: "AWAY" },
}

use CommandId::*;

#[derive(Clone, Debug)]
pub(crate) enum CommandError {
    UnknownCommand(String),
    UnknownSubcommand(CommandId, String),
    NeedMoreParams(CommandId),
    ParameterDoesntMatch(CommandId, usize),
    WrongParameter(CommandId, usize),
}

use CommandError::*;

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownCommand(s) => write!(f, "Unknown command '{}'", s),
            UnknownSubcommand(cmd, scmd) => {
                write!(f, "Unknown subcommand '{}' in command '{}'", scmd, cmd.name)
            }
            NeedMoreParams(s) => write!(f, "Command '{}' needs more parameters", s.name),
            ParameterDoesntMatch(s, i) => {
                write!(f, "Parameter {} doesn't match for command '{}'", i, s.name)
            }
            WrongParameter(s, i) => write!(f, "Wrong parameter {} in command '{}'", i, s.name),
        }
    }
}

impl Error for CommandError {}

#[derive(PartialEq, Eq, Debug)]
pub(crate) enum CapCommand {
    LS,
    LIST,
    REQ,
    END,
}

#[derive(PartialEq, Eq, Debug)]
pub(crate) enum Command<'a> {
    CAP {
        subcommand: CapCommand,
        caps: Option<Vec<&'a str>>,
    },
    PASS {
        password: &'a str,
    },
    NICK {
        nickname: &'a str,
    },
    USER {
        username: &'a str,
        hostname: &'a str,
        servername: &'a str,
        realname: &'a str,
    },
    PING {
        token: &'a str,
    },
    PONG {
        token: &'a str,
    },
    QUIT {
        reason: Option<&'a str>,
    },
    JOIN {
        channels: Vec<&'a str>,
        keys: Option<Vec<&'a str>>,
    },
    PART {
        channels: Vec<&'a str>,
        reason: Option<&'a str>,
    },
    TOPIC {
        channel: &'a str,
        topic: Option<&'a str>,
    },
    INVITE {
        nickname: &'a str,
        channel: &'a str,
    },
    KICK {
        channel: &'a str,
        users: Vec<&'a str>,
        comment: Option<&'a str>,
    },
    MODE {
        target: &'a str,
        modestring: Option<&'a str>,
        mode_args: Vec<&'a str>,
    },
    PRIVMSG {
        targets: Vec<&'a str>,
        text: &'a str,
    },
    WHO {
        mask: &'a str,
    },
    WHOIS {
        nickmasks: Vec<&'a str>,
    },
    WHOWAS {
        nickname: &'a str,
        count: Option<usize>,
    },
    AWAY {
        text: Option<&'a str>,
    },
}

use Command::*;

impl<'a> Command<'a> {
    fn parse_from_message(message: &Message<'a>) -> Result<Self, CommandError> {
        // command words are matched case-insensitively
        match message.command.to_ascii_uppercase().as_str() {
            "CAP" => {
                if message.params.len() >= 1 {
                    let mut param_it = message.params.iter();
                    let subcommand = match *param_it.next().unwrap() {
                        "LS" => CapCommand::LS,
                        "LIST" => CapCommand::LIST,
                        "REQ" => CapCommand::REQ,
                        "END" => CapCommand::END,
                        _ => {
                            return Err(UnknownSubcommand(CAPId, message.params[0].to_string()))
                        }
                    };
                    let caps = if subcommand == CapCommand::REQ {
                        param_it
                            .next()
                            .map(|x| x.split_ascii_whitespace().collect::<Vec<_>>())
                    } else {
                        None
                    };
                    Ok(CAP { subcommand, caps })
                } else {
                    Err(NeedMoreParams(CAPId))
                }
            }
            "PASS" => {
                if message.params.len() >= 1 {
                    Ok(PASS {
                        password: message.params[0],
                    })
                } else {
                    Err(NeedMoreParams(PASSId))
                }
            }
            "NICK" => {
                if message.params.len() >= 1 {
                    Ok(NICK {
                        nickname: message.params[0],
                    })
                } else {
                    Err(NeedMoreParams(NICKId))
                }
            }
            "USER" => {
                if message.params.len() >= 4 {
                    Ok(USER {
                        username: message.params[0],
                        hostname: message.params[1],
                        servername: message.params[2],
                        realname: message.params[3],
                    })
                } else {
                    Err(NeedMoreParams(USERId))
                }
            }
            "PING" => {
                if message.params.len() >= 1 {
                    Ok(PING {
                        token: message.params[0],
                    })
                } else {
                    Err(NeedMoreParams(PINGId))
                }
            }
            "PONG" => {
                if message.params.len() >= 1 {
                    Ok(PONG {
                        token: message.params[0],
                    })
                } else {
                    Err(NeedMoreParams(PONGId))
                }
            }
            "QUIT" => Ok(QUIT {
                reason: message.params.iter().next().map(|x| *x),
            }),
            "JOIN" => {
                if message.params.len() >= 1 {
                    let mut param_it = message.params.iter();
                    let channels = param_it.next().unwrap().split(',').collect::<Vec<_>>();
                    let keys_opt = param_it.next().map(|x| x.split(',').collect::<Vec<_>>());
                    if let Some(ref keys) = keys_opt {
                        if keys.len() != channels.len() {
                            return Err(ParameterDoesntMatch(JOINId, 1));
                        }
                    }
                    Ok(JOIN {
                        channels,
                        keys: keys_opt,
                    })
                } else {
                    Err(NeedMoreParams(JOINId))
                }
            }
            "PART" => {
                if message.params.len() >= 1 {
                    let mut param_it = message.params.iter();
                    let channels = param_it.next().unwrap().split(',').collect::<Vec<_>>();
                    let reason = param_it.next().map(|x| *x);
                    Ok(PART { channels, reason })
                } else {
                    Err(NeedMoreParams(PARTId))
                }
            }
            "TOPIC" => {
                if message.params.len() >= 1 {
                    let mut param_it = message.params.iter();
                    let channel = param_it.next().unwrap();
                    let topic = param_it.next().map(|x| *x);
                    Ok(TOPIC { channel, topic })
                } else {
                    Err(NeedMoreParams(TOPICId))
                }
            }
            "INVITE" => {
                if message.params.len() >= 2 {
                    Ok(INVITE {
                        nickname: message.params[0],
                        channel: message.params[1],
                    })
                } else {
                    Err(NeedMoreParams(INVITEId))
                }
            }
            "KICK" => {
                if message.params.len() >= 2 {
                    let mut param_it = message.params.iter();
                    let channel = param_it.next().unwrap();
                    let users = param_it.next().unwrap().split(',').collect::<Vec<_>>();
                    let comment = param_it.next().map(|x| *x);
                    Ok(KICK {
                        channel,
                        users,
                        comment,
                    })
                } else {
                    Err(NeedMoreParams(KICKId))
                }
            }
            "MODE" => {
                if message.params.len() >= 1 {
                    let mut param_it = message.params.iter();
                    let target = param_it.next().unwrap();
                    let modestring = param_it.next().map(|x| *x);
                    let mode_args = param_it.map(|x| *x).collect::<Vec<_>>();
                    Ok(MODE {
                        target,
                        modestring,
                        mode_args,
                    })
                } else {
                    Err(NeedMoreParams(MODEId))
                }
            }
            "PRIVMSG" => {
                if message.params.len() >= 2 {
                    Ok(PRIVMSG {
                        targets: message.params[0].split(',').collect::<Vec<_>>(),
                        text: message.params[1],
                    })
                } else {
                    Err(NeedMoreParams(PRIVMSGId))
                }
            }
            "WHO" => {
                if message.params.len() >= 1 {
                    Ok(WHO {
                        mask: message.params[0],
                    })
                } else {
                    Err(NeedMoreParams(WHOId))
                }
            }
            "WHOIS" => {
                if message.params.len() >= 1 {
                    Ok(WHOIS {
                        nickmasks: message.params[0].split(',').collect::<Vec<_>>(),
                    })
                } else {
                    Err(NeedMoreParams(WHOISId))
                }
            }
            "WHOWAS" => {
                if message.params.len() >= 1 {
                    let mut param_it = message.params.iter();
                    let nickname = param_it.next().unwrap();
                    let count = param_it.next().map(|x| x.parse()).transpose();
                    match count {
                        Err(_) => Err(WrongParameter(WHOWASId, 1)),
                        Ok(c) => Ok(WHOWAS { nickname, count: c }),
                    }
                } else {
                    Err(NeedMoreParams(WHOWASId))
                }
            }
            "AWAY" => Ok(AWAY {
                text: message.params.iter().next().map(|x| *x),
            }),
            s => Err(UnknownCommand(s.to_string())),
        }
    }

    pub(crate) fn from_message(message: &Message<'a>) -> Result<Self, CommandError> {
        let cmd = Self::parse_from_message(message)?;
        cmd.validate()?;
        Ok(cmd)
    }

    fn validate(&self) -> Result<(), CommandError> {
        match self {
            USER { username, .. } => {
                validate_username(username).map_err(|_| WrongParameter(USERId, 0))
            }
            JOIN { channels, .. } => channels
                .iter()
                .try_for_each(|ch| validate_channel(ch))
                .map_err(|_| WrongParameter(JOINId, 0)),
            PART { channels, .. } => channels
                .iter()
                .try_for_each(|ch| validate_channel(ch))
                .map_err(|_| WrongParameter(PARTId, 0)),
            TOPIC { channel, .. } => {
                validate_channel(channel).map_err(|_| WrongParameter(TOPICId, 0))
            }
            INVITE { nickname, channel } => {
                validate_username(nickname).map_err(|_| WrongParameter(INVITEId, 0))?;
                validate_channel(channel).map_err(|_| WrongParameter(INVITEId, 1))
            }
            KICK { channel, users, .. } => {
                validate_channel(channel).map_err(|_| WrongParameter(KICKId, 0))?;
                users
                    .iter()
                    .try_for_each(|u| validate_username(u))
                    .map_err(|_| WrongParameter(KICKId, 1))
            }
            PRIVMSG { targets, .. } => targets
                .iter()
                .try_for_each(|n| validate_username(n).or(validate_channel(n)))
                .map_err(|_| WrongParameter(PRIVMSGId, 0)),
            WHOIS { nickmasks } => nickmasks
                .iter()
                .try_for_each(|n| validate_username(n))
                .map_err(|_| WrongParameter(WHOISId, 0)),
            WHOWAS { nickname, .. } => {
                validate_username(nickname).map_err(|_| WrongParameter(WHOWASId, 0))
            }
            _ => Ok(()),
        }
    }
}
