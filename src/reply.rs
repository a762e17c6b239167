// reply.rs - replies
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

// replies

use std::fmt;

#[derive(Clone)]
pub(crate) struct WhoIsChannelStruct<'a> {
    pub(crate) prefix: String,
    pub(crate) channel: &'a str,
}

#[derive(Clone)]
pub(crate) struct NameReplyStruct<'a> {
    pub(crate) prefix: String,
    pub(crate) nick: &'a str,
}

// all replies used by this IRC server.
pub(crate) enum Reply<'a> {
    RplWelcome001 {
        client: &'a str,
        networkname: &'a str,
        nick: &'a str,
        user: &'a str,
        host: &'a str,
    },
    RplYourHost002 {
        client: &'a str,
        servername: &'a str,
        version: &'a str,
    },
    RplCreated003 {
        client: &'a str,
        datetime: &'a str,
    },
    RplMyInfo004 {
        client: &'a str,
        servername: &'a str,
        version: &'a str,
        avail_chmodes: &'a str,
    },
    RplAway301 {
        client: &'a str,
        nick: &'a str,
        message: &'a str,
    },
    RplUnAway305 {
        client: &'a str,
    },
    RplNowAway306 {
        client: &'a str,
    },
    RplWhoIsUser311 {
        client: &'a str,
        nick: &'a str,
        username: &'a str,
        host: &'a str,
        realname: &'a str,
    },
    RplWhoIsServer312 {
        client: &'a str,
        nick: &'a str,
        server: &'a str,
        server_info: &'a str,
    },
    RplWhoWasUser314 {
        client: &'a str,
        nick: &'a str,
        username: &'a str,
        host: &'a str,
        realname: &'a str,
    },
    RplEndOfWho315 {
        client: &'a str,
        mask: &'a str,
    },
    RplWhoIsIdle317 {
        client: &'a str,
        nick: &'a str,
        secs: u64,
        signon: u64,
    },
    RplEndOfWhoIs318 {
        client: &'a str,
        nick: &'a str,
    },
    RplWhoIsChannels319 {
        client: &'a str,
        nick: &'a str,
        channels: &'a [WhoIsChannelStruct<'a>],
    },
    RplChannelModeIs324 {
        client: &'a str,
        channel: &'a str,
        modestring: &'a str,
    },
    RplNoTopic331 {
        client: &'a str,
        channel: &'a str,
    },
    RplTopic332 {
        client: &'a str,
        channel: &'a str,
        topic: &'a str,
    },
    RplTopicWhoTime333 {
        client: &'a str,
        channel: &'a str,
        nick: &'a str,
        setat: u64,
    },
    RplInviting341 {
        client: &'a str,
        nick: &'a str,
        channel: &'a str,
    },
    RplWhoReply352 {
        client: &'a str,
        channel: &'a str,
        username: &'a str,
        host: &'a str,
        server: &'a str,
        nick: &'a str,
        flags: &'a str,
        hopcount: usize,
        realname: &'a str,
    },
    RplNameReply353 {
        client: &'a str,
        symbol: &'a str,
        channel: &'a str,
        replies: &'a [NameReplyStruct<'a>],
    },
    RplEndOfNames366 {
        client: &'a str,
        channel: &'a str,
    },
    RplEndOfBanList368 {
        client: &'a str,
        channel: &'a str,
    },
    RplEndOfWhoWas369 {
        client: &'a str,
        nick: &'a str,
    },
    ErrNoSuchNick401 {
        client: &'a str,
        nick: &'a str,
    },
    ErrNoSuchChannel403 {
        client: &'a str,
        channel: &'a str,
    },
    ErrTooManyChannels405 {
        client: &'a str,
        channel: &'a str,
    },
    ErrWasNoSuchNick406 {
        client: &'a str,
        nick: &'a str,
    },
    ErrNoRecipient411 {
        client: &'a str,
        command: &'a str,
    },
    ErrNoTextToSend412 {
        client: &'a str,
    },
    ErrInputTooLong417 {
        client: &'a str,
    },
    ErrUnknownCommand421 {
        client: &'a str,
        command: &'a str,
    },
    ErrErroneusNickname432 {
        client: &'a str,
        nick: &'a str,
    },
    ErrNicknameInUse433 {
        client: &'a str,
        nick: &'a str,
    },
    ErrUserNotInChannel441 {
        client: &'a str,
        nick: &'a str,
        channel: &'a str,
    },
    ErrNotOnChannel442 {
        client: &'a str,
        channel: &'a str,
    },
    ErrUserOnChannel443 {
        client: &'a str,
        nick: &'a str,
        channel: &'a str,
    },
    ErrNotRegistered451 {
        client: &'a str,
    },
    ErrNeedMoreParams461 {
        client: &'a str,
        command: &'a str,
    },
    ErrAlreadyRegistered462 {
        client: &'a str,
    },
    ErrPasswdMismatch464 {
        client: &'a str,
    },
    ErrChannelIsFull471 {
        client: &'a str,
        channel: &'a str,
    },
    ErrUnknownMode472 {
        client: &'a str,
        modechar: char,
    },
    ErrInviteOnlyChan473 {
        client: &'a str,
        channel: &'a str,
    },
    ErrBadChannelKey475 {
        client: &'a str,
        channel: &'a str,
    },
    ErrChanOpPrivsNeeded482 {
        client: &'a str,
        channel: &'a str,
    },
    ErrInvalidKey525 {
        client: &'a str,
        target_chan: &'a str,
    },
    ErrInvalidModeParam696 {
        client: &'a str,
        target: &'a str,
        modechar: char,
        param: &'a str,
        description: &'a str,
    },
}

use Reply::*;

impl<'a> fmt::Display for Reply<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RplWelcome001 {
                client,
                networkname,
                nick,
                user,
                host,
            } => write!(
                f,
                "001 {} :Welcome to the {} Network, {}!{}@{}",
                client, networkname, nick, user, host
            ),
            RplYourHost002 {
                client,
                servername,
                version,
            } => write!(
                f,
                "002 {} :Your host is {}, running version {}",
                client, servername, version
            ),
            RplCreated003 { client, datetime } => {
                write!(f, "003 {} :This server was created {}", client, datetime)
            }
            RplMyInfo004 {
                client,
                servername,
                version,
                avail_chmodes,
            } => write!(
                f,
                "004 {} {} {} {}",
                client, servername, version, avail_chmodes
            ),
            RplAway301 {
                client,
                nick,
                message,
            } => write!(f, "301 {} {} :{}", client, nick, message),
            RplUnAway305 { client } => write!(
                f,
                "305 {} :You are no longer marked as being away",
                client
            ),
            RplNowAway306 { client } => {
                write!(f, "306 {} :You have been marked as being away", client)
            }
            RplWhoIsUser311 {
                client,
                nick,
                username,
                host,
                realname,
            } => write!(
                f,
                "311 {} {} {} {} * :{}",
                client, nick, username, host, realname
            ),
            RplWhoIsServer312 {
                client,
                nick,
                server,
                server_info,
            } => write!(f, "312 {} {} {} :{}", client, nick, server, server_info),
            RplWhoWasUser314 {
                client,
                nick,
                username,
                host,
                realname,
            } => write!(
                f,
                "314 {} {} {} {} * :{}",
                client, nick, username, host, realname
            ),
            RplEndOfWho315 { client, mask } => {
                write!(f, "315 {} {} :End of WHO list", client, mask)
            }
            RplWhoIsIdle317 {
                client,
                nick,
                secs,
                signon,
            } => write!(
                f,
                "317 {} {} {} {} :seconds idle, signon time",
                client, nick, secs, signon
            ),
            RplEndOfWhoIs318 { client, nick } => {
                write!(f, "318 {} {} :End of /WHOIS list", client, nick)
            }
            RplWhoIsChannels319 {
                client,
                nick,
                channels,
            } => {
                write!(f, "319 {} {} :", client, nick)?;
                for (i, c) in channels.iter().enumerate() {
                    if i != 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}{}", c.prefix, c.channel)?;
                }
                Ok(())
            }
            RplChannelModeIs324 {
                client,
                channel,
                modestring,
            } => write!(f, "324 {} {} {}", client, channel, modestring),
            RplNoTopic331 { client, channel } => {
                write!(f, "331 {} {} :No topic is set", client, channel)
            }
            RplTopic332 {
                client,
                channel,
                topic,
            } => write!(f, "332 {} {} :{}", client, channel, topic),
            RplTopicWhoTime333 {
                client,
                channel,
                nick,
                setat,
            } => write!(f, "333 {} {} {} {}", client, channel, nick, setat),
            RplInviting341 {
                client,
                nick,
                channel,
            } => write!(f, "341 {} {} {}", client, nick, channel),
            RplWhoReply352 {
                client,
                channel,
                username,
                host,
                server,
                nick,
                flags,
                hopcount,
                realname,
            } => write!(
                f,
                "352 {} {} {} {} {} {} {} :{} {}",
                client, channel, username, host, server, nick, flags, hopcount, realname
            ),
            RplNameReply353 {
                client,
                symbol,
                channel,
                replies,
            } => {
                write!(f, "353 {} {} {} :", client, symbol, channel)?;
                for (i, r) in replies.iter().enumerate() {
                    if i != 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}{}", r.prefix, r.nick)?;
                }
                Ok(())
            }
            RplEndOfNames366 { client, channel } => {
                write!(f, "366 {} {} :End of /NAMES list", client, channel)
            }
            RplEndOfBanList368 { client, channel } => {
                write!(f, "368 {} {} :End of channel ban list", client, channel)
            }
            RplEndOfWhoWas369 { client, nick } => {
                write!(f, "369 {} {} :End of WHOWAS", client, nick)
            }
            ErrNoSuchNick401 { client, nick } => {
                write!(f, "401 {} {} :No such nick/channel", client, nick)
            }
            ErrNoSuchChannel403 { client, channel } => {
                write!(f, "403 {} {} :No such channel", client, channel)
            }
            ErrTooManyChannels405 { client, channel } => write!(
                f,
                "405 {} {} :You have joined too many channels",
                client, channel
            ),
            ErrWasNoSuchNick406 { client, nick } => {
                write!(f, "406 {} {} :There was no such nickname", client, nick)
            }
            ErrNoRecipient411 { client, command } => {
                write!(f, "411 {} :No recipient given ({})", client, command)
            }
            ErrNoTextToSend412 { client } => write!(f, "412 {} :No text to send", client),
            ErrInputTooLong417 { client } => {
                write!(f, "417 {} :Input line was too long", client)
            }
            ErrUnknownCommand421 { client, command } => {
                write!(f, "421 {} {} :Unknown command", client, command)
            }
            ErrErroneusNickname432 { client, nick } => {
                write!(f, "432 {} {} :Erroneus nickname", client, nick)
            }
            ErrNicknameInUse433 { client, nick } => {
                write!(f, "433 {} {} :Nickname is already in use", client, nick)
            }
            ErrUserNotInChannel441 {
                client,
                nick,
                channel,
            } => write!(
                f,
                "441 {} {} {} :They aren't on that channel",
                client, nick, channel
            ),
            ErrNotOnChannel442 { client, channel } => {
                write!(f, "442 {} {} :You're not on that channel", client, channel)
            }
            ErrUserOnChannel443 {
                client,
                nick,
                channel,
            } => write!(f, "443 {} {} {} :is already on channel", client, nick, channel),
            ErrNotRegistered451 { client } => {
                write!(f, "451 {} :You have not registered", client)
            }
            ErrNeedMoreParams461 { client, command } => {
                write!(f, "461 {} {} :Not enough parameters", client, command)
            }
            ErrAlreadyRegistered462 { client } => {
                write!(f, "462 {} :You may not reregister", client)
            }
            ErrPasswdMismatch464 { client } => write!(f, "464 {} :Password incorrect", client),
            ErrChannelIsFull471 { client, channel } => {
                write!(f, "471 {} {} :Cannot join channel (+l)", client, channel)
            }
            ErrUnknownMode472 { client, modechar } => write!(
                f,
                "472 {} {} :is unknown mode char to me",
                client, modechar
            ),
            ErrInviteOnlyChan473 { client, channel } => {
                write!(f, "473 {} {} :Cannot join channel (+i)", client, channel)
            }
            ErrBadChannelKey475 { client, channel } => {
                write!(f, "475 {} {} :Cannot join channel (+k)", client, channel)
            }
            ErrChanOpPrivsNeeded482 { client, channel } => {
                write!(f, "482 {} {} :You're not channel operator", client, channel)
            }
            ErrInvalidKey525 {
                client,
                target_chan,
            } => write!(f, "525 {} {} :Key is not well-formed", client, target_chan),
            ErrInvalidModeParam696 {
                client,
                target,
                modechar,
                param,
                description,
            } => write!(
                f,
                "696 {} {} {} {} :{}",
                client, target, modechar, param, description
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_replies_to_string() {
        assert_eq!(
            "001 mati :Welcome to the IRCnetwork Network, mati!~mat@127.0.0.1",
            RplWelcome001 {
                client: "mati",
                networkname: "IRCnetwork",
                nick: "mati",
                user: "~mat",
                host: "127.0.0.1"
            }
            .to_string()
        );
        assert_eq!(
            "324 mati #hall +itk secret",
            RplChannelModeIs324 {
                client: "mati",
                channel: "#hall",
                modestring: "+itk secret"
            }
            .to_string()
        );
        assert_eq!(
            "353 mati = #hall :@greg bobby",
            RplNameReply353 {
                client: "mati",
                symbol: "=",
                channel: "#hall",
                replies: &[
                    NameReplyStruct {
                        prefix: "@".to_string(),
                        nick: "greg"
                    },
                    NameReplyStruct {
                        prefix: "".to_string(),
                        nick: "bobby"
                    }
                ]
            }
            .to_string()
        );
        assert_eq!(
            "319 mati greg :@#hall #garden",
            RplWhoIsChannels319 {
                client: "mati",
                nick: "greg",
                channels: &[
                    WhoIsChannelStruct {
                        prefix: "@".to_string(),
                        channel: "#hall"
                    },
                    WhoIsChannelStruct {
                        prefix: "".to_string(),
                        channel: "#garden"
                    }
                ]
            }
            .to_string()
        );
        assert_eq!(
            "412 mati :No text to send",
            ErrNoTextToSend412 { client: "mati" }.to_string()
        );
        assert_eq!(
            "472 mati z :is unknown mode char to me",
            ErrUnknownMode472 {
                client: "mati",
                modechar: 'z'
            }
            .to_string()
        );
        assert_eq!(
            "696 mati #hall l abc :invalid limit",
            ErrInvalidModeParam696 {
                client: "mati",
                target: "#hall",
                modechar: 'l',
                param: "abc",
                description: "invalid limit"
            }
            .to_string()
        );
    }
}
