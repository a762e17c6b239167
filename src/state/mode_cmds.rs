// mode_cmds.rs - channel mode command
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

// number of arguments the mode string expects. 'k' and 'l' take one argument
// when set, none when unset, 'o' takes one for both signs.
fn mode_args_expected(modestring: &str) -> usize {
    let mut count = 0;
    let mut mode_set = true;
    for c in modestring.chars() {
        match c {
            '+' => mode_set = true,
            '-' => mode_set = false,
            'k' | 'l' => {
                if mode_set {
                    count += 1;
                }
            }
            'o' => count += 1,
            _ => (),
        }
    }
    count
}

// sign in effect at given position - the nearest preceding '+' or '-'
fn mode_sign_at(modestring: &str, pos: usize) -> char {
    modestring[..pos]
        .chars()
        .rev()
        .find(|c| *c == '+' || *c == '-')
        .unwrap_or('+')
}

fn has_duplicate_flags(modestring: &str) -> bool {
    let mut seen = [false; 128];
    for c in modestring.chars() {
        if c == '+' || c == '-' {
            continue;
        }
        let idx = c as usize;
        if idx < 128 {
            if seen[idx] {
                return true;
            }
            seen[idx] = true;
        }
    }
    false
}

// assign arguments to flags that consume them, in token order.
fn map_mode_args<'a>(modestring: &str, mode_args: &[&'a str]) -> HashMap<char, &'a str> {
    let mut map = HashMap::new();
    let mut arg_it = mode_args.iter();
    let mut mode_set = true;
    for c in modestring.chars() {
        match c {
            '+' => mode_set = true,
            '-' => mode_set = false,
            'k' | 'l' => {
                if mode_set {
                    if let Some(a) = arg_it.next() {
                        map.insert(c, *a);
                    }
                }
            }
            'o' => {
                if let Some(a) = arg_it.next() {
                    map.insert(c, *a);
                }
            }
            _ => (),
        }
    }
    map
}

fn broadcast_to_channel(
    users: &HashMap<String, User>,
    channel: &Channel,
    source: &str,
    change: &str,
) -> Result<(), tokio::sync::mpsc::error::SendError<String>> {
    for nick in channel.users.keys() {
        users.get(nick).unwrap().send_msg_display(source, change)?;
    }
    Ok(())
}

impl super::MainState {
    pub(super) async fn process_mode<'a>(
        &self,
        conn_state: &mut ConnState,
        target: &'a str,
        modestring_opt: Option<&'a str>,
        mode_args: Vec<&'a str>,
    ) -> Result<(), Box<dyn Error>> {
        let client = conn_state.user_state.client_name();
        let user_nick = conn_state.user_state.nick.as_ref().unwrap().clone();
        let mut statem = self.state.write().await;
        let state = &mut *statem;

        if validate_channel(target).is_err() {
            // user modes are not kept - "+i" on itself is silently ignored
            if target == user_nick && modestring_opt == Some("+i") {
                return Ok(());
            }
            self.feed_msg(
                &mut conn_state.stream,
                ErrNoSuchChannel403 {
                    client,
                    channel: target,
                },
            )
            .await?;
            return Ok(());
        }

        let chanobj = if let Some(ch) = state.channels.get_mut(target) {
            ch
        } else {
            self.feed_msg(
                &mut conn_state.stream,
                ErrNoSuchChannel403 {
                    client,
                    channel: target,
                },
            )
            .await?;
            return Ok(());
        };

        // query form - report composed mode string, no mutation
        let modestring = match modestring_opt {
            None => {
                let ms = chanobj.modes.to_string();
                self.feed_msg(
                    &mut conn_state.stream,
                    RplChannelModeIs324 {
                        client,
                        channel: target,
                        modestring: &ms,
                    },
                )
                .await?;
                return Ok(());
            }
            Some(ms) => ms,
        };

        // ban lists are not kept - answer the query with an empty list
        if modestring == "b" {
            self.feed_msg(
                &mut conn_state.stream,
                RplEndOfBanList368 {
                    client,
                    channel: target,
                },
            )
            .await?;
            return Ok(());
        }

        if !chanobj.users.contains_key(&user_nick) {
            self.feed_msg(
                &mut conn_state.stream,
                ErrNotOnChannel442 {
                    client,
                    channel: target,
                },
            )
            .await?;
            return Ok(());
        }
        if !chanobj.is_operator(&user_nick) {
            self.feed_msg(
                &mut conn_state.stream,
                ErrChanOpPrivsNeeded482 {
                    client,
                    channel: target,
                },
            )
            .await?;
            return Ok(());
        }

        // a mode delta has at least two characters and begins with a sign
        if modestring.len() < 2
            || (modestring.as_bytes()[0] != b'+' && modestring.as_bytes()[0] != b'-')
        {
            let ms = chanobj.modes.to_string();
            self.feed_msg(
                &mut conn_state.stream,
                RplChannelModeIs324 {
                    client,
                    channel: target,
                    modestring: &ms,
                },
            )
            .await?;
            return Ok(());
        }
        if has_duplicate_flags(modestring)
            || mode_args.len() != mode_args_expected(modestring)
        {
            self.feed_msg(
                &mut conn_state.stream,
                ErrNeedMoreParams461 {
                    client,
                    command: "MODE",
                },
            )
            .await?;
            return Ok(());
        }

        let args = map_mode_args(modestring, &mode_args);
        let source = conn_state.user_state.source.clone();

        // flags are applied in fixed evaluation order ('i', 't', 'k', 'o',
        // 'l'), each independently. setting an already-set value is a silent
        // no-op. only a real change is broadcast.
        if let Some(pos) = modestring.find('i') {
            let sign = mode_sign_at(modestring, pos);
            let changed = if sign == '+' && !chanobj.modes.invite_only {
                chanobj.modes.invite_only = true;
                true
            } else if sign == '-' && chanobj.modes.invite_only {
                chanobj.modes.invite_only = false;
                true
            } else {
                false
            };
            if changed {
                let change = format!("MODE {} {}i", target, sign);
                broadcast_to_channel(&state.users, chanobj, &source, &change)?;
            }
        }

        if let Some(pos) = modestring.find('t') {
            let sign = mode_sign_at(modestring, pos);
            let changed = if sign == '+' && !chanobj.modes.protected_topic {
                chanobj.modes.protected_topic = true;
                true
            } else if sign == '-' && chanobj.modes.protected_topic {
                chanobj.modes.protected_topic = false;
                true
            } else {
                false
            };
            if changed {
                let change = format!("MODE {} {}t", target, sign);
                broadcast_to_channel(&state.users, chanobj, &source, &change)?;
            }
        }

        if let Some(pos) = modestring.find('k') {
            let sign = mode_sign_at(modestring, pos);
            if sign == '+' {
                let key = *args.get(&'k').unwrap();
                if validate_password(key).is_err() {
                    self.feed_msg(
                        &mut conn_state.stream,
                        ErrInvalidKey525 {
                            client,
                            target_chan: target,
                        },
                    )
                    .await?;
                } else if chanobj.modes.key.as_deref() != Some(key) {
                    chanobj.modes.key = Some(key.to_string());
                    let change = format!("MODE {} +k {}", target, key);
                    broadcast_to_channel(&state.users, chanobj, &source, &change)?;
                }
            } else if chanobj.modes.key.is_some() {
                chanobj.modes.key = None;
                let change = format!("MODE {} -k", target);
                broadcast_to_channel(&state.users, chanobj, &source, &change)?;
            }
        }

        if let Some(pos) = modestring.find('o') {
            let sign = mode_sign_at(modestring, pos);
            let arg = *args.get(&'o').unwrap();
            // the target must be connected and a member of the channel,
            // otherwise only this flag is skipped
            if !state.users.contains_key(arg) {
                self.feed_msg(
                    &mut conn_state.stream,
                    ErrNoSuchNick401 { client, nick: arg },
                )
                .await?;
            } else if !chanobj.users.contains_key(arg) {
                self.feed_msg(
                    &mut conn_state.stream,
                    ErrUserNotInChannel441 {
                        client,
                        nick: arg,
                        channel: target,
                    },
                )
                .await?;
            } else {
                let changed = if sign == '+' && !chanobj.is_operator(arg) {
                    chanobj.add_operator(arg);
                    true
                } else if sign == '-' && chanobj.is_operator(arg) {
                    chanobj.remove_operator(arg);
                    true
                } else {
                    false
                };
                if changed {
                    let change = format!("MODE {} {}o {}", target, sign, arg);
                    broadcast_to_channel(&state.users, chanobj, &source, &change)?;
                }
            }
        }

        if let Some(pos) = modestring.find('l') {
            let sign = mode_sign_at(modestring, pos);
            if sign == '+' {
                let arg = *args.get(&'l').unwrap();
                let limit = if arg.bytes().all(|c| c.is_ascii_digit()) {
                    arg.parse::<i32>().ok().filter(|l| *l > 0)
                } else {
                    None
                };
                if let Some(limit) = limit {
                    if chanobj.modes.client_limit != Some(limit) {
                        chanobj.modes.client_limit = Some(limit);
                        let change = format!("MODE {} +l {}", target, arg);
                        broadcast_to_channel(&state.users, chanobj, &source, &change)?;
                    }
                } else {
                    self.feed_msg(
                        &mut conn_state.stream,
                        ErrInvalidModeParam696 {
                            client,
                            target,
                            modechar: 'l',
                            param: arg,
                            description: "invalid limit",
                        },
                    )
                    .await?;
                }
            } else if chanobj.modes.client_limit.is_some() {
                chanobj.modes.client_limit = None;
                let change = format!("MODE {} -l", target);
                broadcast_to_channel(&state.users, chanobj, &source, &change)?;
            }
        }

        // the first unrecognized letter aborts scanning. flags applied above
        // stay applied - apply what is understood, then stop.
        for c in modestring.chars().skip(1) {
            match c {
                'i' | 't' | 'k' | 'o' | 'l' | '+' | '-' => (),
                _ => {
                    self.feed_msg(
                        &mut conn_state.stream,
                        ErrUnknownMode472 {
                            client,
                            modechar: c,
                        },
                    )
                    .await?;
                    break;
                }
            }
        }

        Ok(())
    }
}
