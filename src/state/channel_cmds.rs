// channel_cmds.rs - channel commands
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
    pub(super) async fn process_join<'a>(
        &self,
        conn_state: &mut ConnState,
        channels: Vec<&'a str>,
        keys_opt: Option<Vec<&'a str>>,
    ) -> Result<(), Box<dyn Error>> {
        let mut statem = self.state.write().await;
        let state = &mut *statem;
        let user_nick = conn_state.user_state.nick.as_ref().unwrap().clone();

        for (i, chname_str) in channels.iter().enumerate() {
            let client = conn_state.user_state.client_name();
            let (do_join, create) = if let Some(channel) = state.channels.get(*chname_str) {
                if channel.users.contains_key(&user_nick) {
                    // already in channel - nothing to do
                    (false, false)
                } else {
                    let mut do_join = true;
                    if let Some(ref key) = channel.modes.key {
                        let given = keys_opt.as_ref().map(|keys| keys[i]);
                        if given != Some(key.as_str()) {
                            self.feed_msg(
                                &mut conn_state.stream,
                                ErrBadChannelKey475 {
                                    client,
                                    channel: chname_str,
                                },
                            )
                            .await?;
                            do_join = false;
                        }
                    }
                    if do_join && channel.modes.invite_only {
                        let invited = state
                            .users
                            .get(&user_nick)
                            .unwrap()
                            .invited_to
                            .contains(*chname_str);
                        if !invited {
                            self.feed_msg(
                                &mut conn_state.stream,
                                ErrInviteOnlyChan473 {
                                    client,
                                    channel: chname_str,
                                },
                            )
                            .await?;
                            do_join = false;
                        }
                    }
                    if do_join {
                        if let Some(limit) = channel.modes.client_limit {
                            if channel.users.len() >= limit as usize {
                                self.feed_msg(
                                    &mut conn_state.stream,
                                    ErrChannelIsFull471 {
                                        client,
                                        channel: chname_str,
                                    },
                                )
                                .await?;
                                do_join = false;
                            }
                        }
                    }
                    (do_join, false)
                }
            } else {
                // channel created lazily on first join
                (true, true)
            };

            let do_join = if let Some(max_joins) = self.config.max_joins {
                if do_join && state.users.get(&user_nick).unwrap().channels.len() >= max_joins {
                    self.feed_msg(
                        &mut conn_state.stream,
                        ErrTooManyChannels405 {
                            client,
                            channel: chname_str,
                        },
                    )
                    .await?;
                    false
                } else {
                    do_join
                }
            } else {
                do_join
            };

            if do_join {
                if create {
                    state.channels.insert(
                        chname_str.to_string(),
                        Channel::new(chname_str.to_string(), user_nick.clone()),
                    );
                } else {
                    state
                        .channels
                        .get_mut(*chname_str)
                        .unwrap()
                        .add_user(&user_nick);
                }
                {
                    let user = state.users.get_mut(&user_nick).unwrap();
                    user.channels.insert(chname_str.to_string());
                    // outstanding invite is consumed by the join
                    user.invited_to.remove(*chname_str);
                    user.last_activity = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .unwrap()
                        .as_secs();
                }

                // send messages
                let join_msg = format!("JOIN {}", chname_str);
                self.feed_msg_source(
                    &mut conn_state.stream,
                    &conn_state.user_state.source,
                    join_msg.as_str(),
                )
                .await?;
                let chanobj = state.channels.get(*chname_str).unwrap();
                if let Some(ref topic) = chanobj.topic {
                    self.feed_msg(
                        &mut conn_state.stream,
                        RplTopic332 {
                            client,
                            channel: chname_str,
                            topic: &topic.topic,
                        },
                    )
                    .await?;
                }
                self.send_names_from_channel(conn_state, chanobj).await?;
                for nick in chanobj.users.keys() {
                    if nick != &user_nick {
                        state
                            .users
                            .get(nick)
                            .unwrap()
                            .send_msg_display(&conn_state.user_state.source, join_msg.as_str())?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn send_names_from_channel(
        &self,
        conn_state: &mut ConnState,
        channel: &Channel,
    ) -> Result<(), Box<dyn Error>> {
        let client = conn_state.user_state.client_name();
        const NAMES_COUNT: usize = 20;

        let mut name_chunk = Vec::with_capacity(NAMES_COUNT);
        for (nick, chum) in &channel.users {
            name_chunk.push(NameReplyStruct {
                prefix: chum.prefix(),
                nick: nick.as_str(),
            });
            if name_chunk.len() == NAMES_COUNT {
                self.feed_msg(
                    &mut conn_state.stream,
                    RplNameReply353 {
                        client,
                        symbol: "=",
                        channel: &channel.name,
                        replies: &name_chunk,
                    },
                )
                .await?;
                name_chunk.clear();
            }
        }
        if name_chunk.len() != 0 {
            // last chunk
            self.feed_msg(
                &mut conn_state.stream,
                RplNameReply353 {
                    client,
                    symbol: "=",
                    channel: &channel.name,
                    replies: &name_chunk,
                },
            )
            .await?;
        }
        self.feed_msg(
            &mut conn_state.stream,
            RplEndOfNames366 {
                client,
                channel: &channel.name,
            },
        )
        .await?;
        Ok(())
    }

    pub(super) async fn process_part<'a>(
        &self,
        conn_state: &mut ConnState,
        channels: Vec<&'a str>,
        reason: Option<&'a str>,
    ) -> Result<(), Box<dyn Error>> {
        let client = conn_state.user_state.client_name();
        let mut statem = self.state.write().await;
        let state = &mut *statem;
        let user_nick = conn_state.user_state.nick.as_ref().unwrap().clone();

        for channel in &channels {
            if let Some(chanobj) = state.channels.get_mut(*channel) {
                if chanobj.users.contains_key(&user_nick) {
                    let part_msg = if let Some(r) = reason {
                        format!("PART {} :{}", channel, r)
                    } else {
                        format!("PART {}", channel)
                    };
                    for nick in chanobj.users.keys() {
                        state
                            .users
                            .get(nick)
                            .unwrap()
                            .send_msg_display(&conn_state.user_state.source, part_msg.as_str())?;
                    }
                    chanobj.remove_user(&user_nick);
                    if chanobj.users.is_empty() {
                        // channel dies with its last member
                        state.channels.remove(*channel);
                    }
                    state
                        .users
                        .get_mut(&user_nick)
                        .unwrap()
                        .channels
                        .remove(*channel);
                } else {
                    self.feed_msg(&mut conn_state.stream, ErrNotOnChannel442 { client, channel })
                        .await?;
                }
            } else {
                self.feed_msg(
                    &mut conn_state.stream,
                    ErrNoSuchChannel403 { client, channel },
                )
                .await?;
            }
        }
        Ok(())
    }

    pub(super) async fn process_topic<'a>(
        &self,
        conn_state: &mut ConnState,
        channel: &'a str,
        topic_opt: Option<&'a str>,
        msg: &'a Message<'a>,
    ) -> Result<(), Box<dyn Error>> {
        let client = conn_state.user_state.client_name();

        if let Some(topic) = topic_opt {
            let mut state = self.state.write().await;
            let user_nick = conn_state.user_state.nick.as_ref().unwrap();

            let do_change_topic = if let Some(chanobj) = state.channels.get(channel) {
                if chanobj.users.contains_key(user_nick) {
                    // only operators may set topic on a topic-restricted channel
                    if !chanobj.modes.protected_topic || chanobj.is_operator(user_nick) {
                        true
                    } else {
                        self.feed_msg(
                            &mut conn_state.stream,
                            ErrChanOpPrivsNeeded482 { client, channel },
                        )
                        .await?;
                        false
                    }
                } else {
                    self.feed_msg(&mut conn_state.stream, ErrNotOnChannel442 { client, channel })
                        .await?;
                    false
                }
            } else {
                self.feed_msg(
                    &mut conn_state.stream,
                    ErrNoSuchChannel403 { client, channel },
                )
                .await?;
                false
            };

            if do_change_topic {
                let user_nick = user_nick.clone();
                let chanobj = state.channels.get_mut(channel).unwrap();
                if topic.len() != 0 {
                    chanobj.topic = Some(ChannelTopic::new_with_nick(
                        topic.to_string(),
                        user_nick.clone(),
                    ));
                } else {
                    chanobj.topic = None;
                }
                let chanobj = state.channels.get(channel).unwrap();
                for cu in chanobj.users.keys() {
                    state
                        .users
                        .get(cu)
                        .unwrap()
                        .send_message(msg, &conn_state.user_state.source)?;
                }
            }
        } else {
            // read
            let state = self.state.read().await;
            if let Some(chanobj) = state.channels.get(channel) {
                let user_nick = conn_state.user_state.nick.as_ref().unwrap();

                if chanobj.users.contains_key(user_nick) {
                    if let Some(ref topic) = chanobj.topic {
                        self.feed_msg(
                            &mut conn_state.stream,
                            RplTopic332 {
                                client,
                                channel,
                                topic: &topic.topic,
                            },
                        )
                        .await?;
                        self.feed_msg(
                            &mut conn_state.stream,
                            RplTopicWhoTime333 {
                                client,
                                channel,
                                nick: &topic.nick,
                                setat: topic.set_time,
                            },
                        )
                        .await?;
                    } else {
                        self.feed_msg(&mut conn_state.stream, RplNoTopic331 { client, channel })
                            .await?;
                    }
                } else {
                    self.feed_msg(&mut conn_state.stream, ErrNotOnChannel442 { client, channel })
                        .await?;
                }
            } else {
                self.feed_msg(
                    &mut conn_state.stream,
                    ErrNoSuchChannel403 { client, channel },
                )
                .await?;
            }
        }
        Ok(())
    }

    pub(super) async fn process_invite<'a>(
        &self,
        conn_state: &mut ConnState,
        nickname: &'a str,
        channel: &'a str,
        msg: &'a Message<'a>,
    ) -> Result<(), Box<dyn Error>> {
        let mut state = self.state.write().await;
        let user_nick = conn_state.user_state.nick.as_ref().unwrap();
        let client = conn_state.user_state.client_name();

        let do_invite = if let Some(chanobj) = state.channels.get(channel) {
            if chanobj.users.contains_key(user_nick) {
                // on invite-only channels only operators may invite
                let do_invite2 = if chanobj.modes.invite_only && !chanobj.is_operator(user_nick) {
                    self.feed_msg(
                        &mut conn_state.stream,
                        ErrChanOpPrivsNeeded482 { client, channel },
                    )
                    .await?;
                    false
                } else {
                    true
                };
                if do_invite2 {
                    if chanobj.users.contains_key(nickname) {
                        self.feed_msg(
                            &mut conn_state.stream,
                            ErrUserOnChannel443 {
                                client,
                                nick: nickname,
                                channel,
                            },
                        )
                        .await?;
                        false
                    } else {
                        true
                    }
                } else {
                    false
                }
            } else {
                self.feed_msg(&mut conn_state.stream, ErrNotOnChannel442 { client, channel })
                    .await?;
                false
            }
        } else {
            self.feed_msg(
                &mut conn_state.stream,
                ErrNoSuchChannel403 { client, channel },
            )
            .await?;
            false
        };

        if do_invite {
            if let Some(invited) = state.users.get_mut(nickname) {
                invited.invited_to.insert(channel.to_string());
                self.feed_msg(
                    &mut conn_state.stream,
                    RplInviting341 {
                        client,
                        nick: nickname,
                        channel,
                    },
                )
                .await?;
                invited.send_message(msg, &conn_state.user_state.source)?;
            } else {
                self.feed_msg(
                    &mut conn_state.stream,
                    ErrNoSuchNick401 {
                        client,
                        nick: nickname,
                    },
                )
                .await?;
            }
        }
        Ok(())
    }

    pub(super) async fn process_kick<'a>(
        &self,
        conn_state: &mut ConnState,
        channel: &'a str,
        kick_users: Vec<&'a str>,
        comment: Option<&'a str>,
    ) -> Result<(), Box<dyn Error>> {
        let mut statem = self.state.write().await;
        let state = &mut *statem;
        let user_nick = conn_state.user_state.nick.as_ref().unwrap().clone();
        let client = conn_state.user_state.client_name();

        if let Some(chanobj) = state.channels.get_mut(channel) {
            if chanobj.users.contains_key(&user_nick) {
                if chanobj.is_operator(&user_nick) {
                    for kick_user in &kick_users {
                        let ku = kick_user.to_string();
                        if chanobj.users.contains_key(&ku) {
                            // kicked user gets the KICK message too
                            let kick_msg = format!(
                                "KICK {} {} :{}",
                                channel,
                                ku,
                                comment.unwrap_or("Kicked")
                            );
                            for nick in chanobj.users.keys() {
                                state.users.get(nick).unwrap().send_msg_display(
                                    &conn_state.user_state.source,
                                    kick_msg.as_str(),
                                )?;
                            }
                            chanobj.remove_user(&ku);
                            state.users.get_mut(&ku).unwrap().channels.remove(channel);
                        } else {
                            self.feed_msg(
                                &mut conn_state.stream,
                                ErrUserNotInChannel441 {
                                    client,
                                    nick: kick_user,
                                    channel,
                                },
                            )
                            .await?;
                        }
                    }
                } else {
                    self.feed_msg(
                        &mut conn_state.stream,
                        ErrChanOpPrivsNeeded482 { client, channel },
                    )
                    .await?;
                }
            } else {
                self.feed_msg(&mut conn_state.stream, ErrNotOnChannel442 { client, channel })
                    .await?;
            }
        } else {
            self.feed_msg(
                &mut conn_state.stream,
                ErrNoSuchChannel403 { client, channel },
            )
            .await?;
        }
        Ok(())
    }
}
