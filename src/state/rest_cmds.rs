// rest_cmds.rs - message and query commands
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

use super::*;
use std::error::Error;

impl super::MainState {
    pub(super) async fn process_privmsg<'a>(
        &self,
        conn_state: &mut ConnState,
        targets: Vec<&'a str>,
        text: &'a str,
    ) -> Result<(), Box<dyn Error>> {
        let client = conn_state.user_state.client_name();
        let user_nick = conn_state.user_state.nick.as_ref().unwrap();

        // blank body fails the whole command before any delivery
        if text.trim().is_empty() || text == ":" {
            if targets
                .first()
                .map_or(true, |t| t.is_empty() || t.starts_with(':'))
            {
                self.feed_msg(
                    &mut conn_state.stream,
                    ErrNoRecipient411 {
                        client,
                        command: "PRIVMSG",
                    },
                )
                .await?;
            } else {
                self.feed_msg(&mut conn_state.stream, ErrNoTextToSend412 { client })
                    .await?;
            }
            return Ok(());
        }

        let mut something_done = false;
        {
            let state = self.state.read().await;

            // each target is delivered independently - one failure never
            // aborts the rest of the batch
            for target in targets.iter().copied().collect::<HashSet<_>>() {
                let msg_str = format!("PRIVMSG {} :{}", target, text);
                if validate_channel(target).is_ok() {
                    // channel target. sender membership is deliberately not
                    // required for sending to a channel.
                    if let Some(chanobj) = state.channels.get(target) {
                        for nick in chanobj.users.keys() {
                            if nick != user_nick {
                                state.users.get(nick).unwrap().send_msg_display(
                                    &conn_state.user_state.source,
                                    msg_str.as_str(),
                                )?;
                            }
                        }
                        something_done = true;
                    } else {
                        self.feed_msg(
                            &mut conn_state.stream,
                            ErrNoSuchChannel403 {
                                client,
                                channel: target,
                            },
                        )
                        .await?;
                    }
                } else if let Some(cur_user) = state.users.get(target) {
                    if cur_user.nick == *user_nick {
                        // message to self is silently skipped
                        continue;
                    }
                    cur_user
                        .send_msg_display(&conn_state.user_state.source, msg_str.as_str())?;
                    something_done = true;
                    if let Some(ref away) = cur_user.away {
                        self.feed_msg(
                            &mut conn_state.stream,
                            RplAway301 {
                                client,
                                nick: target,
                                message: away,
                            },
                        )
                        .await?;
                    }
                } else {
                    self.feed_msg(
                        &mut conn_state.stream,
                        ErrNoSuchNick401 {
                            client,
                            nick: target,
                        },
                    )
                    .await?;
                }
            }
        }

        if something_done {
            let mut state = self.state.write().await;
            let user = state.users.get_mut(user_nick).unwrap();
            user.last_activity = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs();
        }
        Ok(())
    }

    pub(super) async fn process_away<'a>(
        &self,
        conn_state: &mut ConnState,
        text: Option<&'a str>,
    ) -> Result<(), Box<dyn Error>> {
        let client = conn_state.user_state.client_name();
        let mut state = self.state.write().await;
        let user_nick = conn_state.user_state.nick.as_ref().unwrap();
        let user = state.users.get_mut(user_nick).unwrap();
        if let Some(t) = text {
            user.away = Some(t.to_string());
            self.feed_msg(&mut conn_state.stream, RplNowAway306 { client })
                .await?;
        } else {
            user.away = None;
            self.feed_msg(&mut conn_state.stream, RplUnAway305 { client })
                .await?;
        }
        Ok(())
    }

    async fn send_who_info<'a>(
        &self,
        conn_state: &mut ConnState,
        channel: Option<(&'a str, &ChannelUserModes)>,
        user: &User,
    ) -> Result<(), Box<dyn Error>> {
        let client = conn_state.user_state.client_name();
        let mut flags = String::new();
        if user.away.is_some() {
            flags.push('G');
        } else {
            flags.push('H');
        }
        if let Some((_, chum)) = channel {
            flags += &chum.prefix();
        }
        self.feed_msg(
            &mut conn_state.stream,
            RplWhoReply352 {
                client,
                channel: channel.map(|(c, _)| c).unwrap_or("*"),
                username: &user.name,
                host: &user.hostname,
                server: &self.config.name,
                nick: &user.nick,
                flags: &flags,
                hopcount: 0,
                realname: &user.realname,
            },
        )
        .await?;
        Ok(())
    }

    pub(super) async fn process_who<'a>(
        &self,
        conn_state: &mut ConnState,
        mask: &'a str,
    ) -> Result<(), Box<dyn Error>> {
        let state = self.state.read().await;

        if mask.contains('*') || mask.contains('?') {
            for u in state.users.values() {
                if match_wildcard(mask, &u.nick)
                    || match_wildcard(mask, &u.source)
                    || match_wildcard(mask, &u.realname)
                {
                    self.send_who_info(conn_state, None, u).await?;
                }
            }
        } else if validate_channel(mask).is_ok() {
            if let Some(channel) = state.channels.get(mask) {
                for (nick, chum) in &channel.users {
                    self.send_who_info(
                        conn_state,
                        Some((&channel.name, chum)),
                        state.users.get(nick).unwrap(),
                    )
                    .await?;
                }
            }
        } else if let Some(arg_user) = state.users.get(mask) {
            self.send_who_info(conn_state, None, arg_user).await?;
        }
        let client = conn_state.user_state.client_name();
        self.feed_msg(&mut conn_state.stream, RplEndOfWho315 { client, mask })
            .await?;
        Ok(())
    }

    pub(super) async fn process_whois<'a>(
        &self,
        conn_state: &mut ConnState,
        nickmasks: Vec<&'a str>,
    ) -> Result<(), Box<dyn Error>> {
        let client = conn_state.user_state.client_name();
        let state = self.state.read().await;

        let mut nicks = Vec::new();
        for nickmask in &nickmasks {
            if nickmask.contains('*') || nickmask.contains('?') {
                // wildcard - collect matching nicks
                for nick in state.users.keys() {
                    if match_wildcard(nickmask, nick) && !nicks.contains(nick) {
                        nicks.push(nick.clone());
                    }
                }
            } else if state.users.contains_key(*nickmask) {
                if !nicks.contains(&nickmask.to_string()) {
                    nicks.push(nickmask.to_string());
                }
            } else {
                self.feed_msg(
                    &mut conn_state.stream,
                    ErrNoSuchNick401 {
                        client,
                        nick: nickmask,
                    },
                )
                .await?;
            }
        }

        for nick in &nicks {
            let arg_user = state.users.get(nick).unwrap();
            self.feed_msg(
                &mut conn_state.stream,
                RplWhoIsUser311 {
                    client,
                    nick,
                    username: &arg_user.name,
                    host: &arg_user.hostname,
                    realname: &arg_user.realname,
                },
            )
            .await?;
            self.feed_msg(
                &mut conn_state.stream,
                RplWhoIsServer312 {
                    client,
                    nick,
                    server: &self.config.name,
                    server_info: "This is IRC server",
                },
            )
            .await?;
            let channel_replies = arg_user
                .channels
                .iter()
                .map(|chname| {
                    let ch = state.channels.get(chname).unwrap();
                    WhoIsChannelStruct {
                        prefix: ch.users.get(nick).unwrap().prefix(),
                        channel: &ch.name,
                    }
                })
                .collect::<Vec<_>>();
            for chr_chunk in channel_replies.chunks(30) {
                self.feed_msg(
                    &mut conn_state.stream,
                    RplWhoIsChannels319 {
                        client,
                        nick,
                        channels: chr_chunk,
                    },
                )
                .await?;
            }
            self.feed_msg(
                &mut conn_state.stream,
                RplWhoIsIdle317 {
                    client,
                    nick,
                    secs: SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .unwrap()
                        .as_secs()
                        - arg_user.last_activity,
                    signon: arg_user.signon,
                },
            )
            .await?;
        }
        self.feed_msg(
            &mut conn_state.stream,
            RplEndOfWhoIs318 {
                client,
                nick: &nickmasks.join(","),
            },
        )
        .await?;
        Ok(())
    }

    pub(super) async fn process_whowas<'a>(
        &self,
        conn_state: &mut ConnState,
        nickname: &'a str,
        count: Option<usize>,
    ) -> Result<(), Box<dyn Error>> {
        let client = conn_state.user_state.client_name();
        let state = self.state.read().await;

        if let Some(hist) = state.nick_histories.get(nickname) {
            let hist_count = match count {
                Some(c) if c > 0 => c,
                _ => hist.len(),
            };
            for entry in hist.iter().rev().take(hist_count) {
                self.feed_msg(
                    &mut conn_state.stream,
                    RplWhoWasUser314 {
                        client,
                        nick: nickname,
                        username: &entry.username,
                        host: &entry.hostname,
                        realname: &entry.realname,
                    },
                )
                .await?;
                let signon_str = NaiveDateTime::from_timestamp_opt(entry.signon as i64, 0)
                    .map(|dt| DateTime::<Utc>::from_utc(dt, Utc).to_string())
                    .unwrap_or_default();
                self.feed_msg(
                    &mut conn_state.stream,
                    RplWhoIsServer312 {
                        client,
                        nick: nickname,
                        server: &self.config.name,
                        server_info: &format!("Logged in at {}", signon_str),
                    },
                )
                .await?;
            }
        } else {
            self.feed_msg(
                &mut conn_state.stream,
                ErrWasNoSuchNick406 {
                    client,
                    nick: nickname,
                },
            )
            .await?;
        }
        self.feed_msg(
            &mut conn_state.stream,
            RplEndOfWhoWas369 {
                client,
                nick: nickname,
            },
        )
        .await?;
        Ok(())
    }
}
