// conn_cmds.rs - connection commands
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
use std::sync::atomic::Ordering;

impl super::MainState {
    // complete registration if password (when required), nick and username are
    // all known. commands may arrive in any order - this is called after each
    // of them sets its own field.
    async fn authenticate(&self, conn_state: &mut ConnState) -> Result<(), Box<dyn Error>> {
        {
            let user_state = &conn_state.user_state;
            if user_state.registered || user_state.nick.is_none() || user_state.name.is_none() {
                return Ok(());
            }
            if self.config.password.is_some() && !user_state.password_verified {
                return Ok(());
            }
        }

        let user_nick = conn_state.user_state.nick.clone().unwrap();
        {
            let mut state = self.state.write().await;
            if state.users.contains_key(&user_nick) {
                // if nick already used
                let client = conn_state.user_state.client_name();
                self.feed_msg(
                    &mut conn_state.stream,
                    ErrNicknameInUse433 {
                        client,
                        nick: &user_nick,
                    },
                )
                .await?;
                return Ok(());
            }
            let user = User::new(&conn_state.user_state, conn_state.sender.take().unwrap());
            state.add_user(user);
        }
        conn_state.user_state.registered = true;

        {
            // send welcome burst to the new user
            let user_state = &conn_state.user_state;
            let client = user_state.client_name();
            self.feed_msg(
                &mut conn_state.stream,
                RplWelcome001 {
                    client,
                    networkname: &self.config.network,
                    nick: user_state.nick.as_deref().unwrap_or_default(),
                    user: user_state.name.as_deref().unwrap_or_default(),
                    host: &user_state.hostname,
                },
            )
            .await?;
            self.feed_msg(
                &mut conn_state.stream,
                RplYourHost002 {
                    client,
                    servername: &self.config.name,
                    version: concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")),
                },
            )
            .await?;
            self.feed_msg(
                &mut conn_state.stream,
                RplCreated003 {
                    client,
                    datetime: &self.created,
                },
            )
            .await?;
            self.feed_msg(
                &mut conn_state.stream,
                RplMyInfo004 {
                    client,
                    servername: &self.config.name,
                    version: concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")),
                    avail_chmodes: "itklo",
                },
            )
            .await?;
        }

        // run ping waker for this connection
        conn_state.run_ping_waker(&self.config);
        info!("Auth succeed for {}", conn_state.user_state.source);
        Ok(())
    }

    pub(super) async fn process_cap<'a>(
        &self,
        conn_state: &mut ConnState,
        subcommand: CapCommand,
        caps: Option<Vec<&'a str>>,
    ) -> Result<(), Box<dyn Error>> {
        // capability negotiation is not implemented - acknowledge and refuse.
        match subcommand {
            CapCommand::LS => self.feed_msg(&mut conn_state.stream, "CAP * LS :").await?,
            CapCommand::LIST => {
                self.feed_msg(&mut conn_state.stream, "CAP * LIST :")
                    .await?
            }
            CapCommand::REQ => {
                if let Some(cs) = caps {
                    self.feed_msg(
                        &mut conn_state.stream,
                        format!("CAP * NAK :{}", cs.join(" ")),
                    )
                    .await?
                }
            }
            CapCommand::END => {}
        };
        Ok(())
    }

    pub(super) async fn process_pass<'a>(
        &self,
        conn_state: &mut ConnState,
        pass: &'a str,
    ) -> Result<(), Box<dyn Error>> {
        if conn_state.user_state.registered || conn_state.user_state.password_verified {
            // PASS resent after success
            let client = conn_state.user_state.client_name();
            self.feed_msg(&mut conn_state.stream, ErrAlreadyRegistered462 { client })
                .await?;
        } else if let Some(ref password_hash) = self.config.password {
            if argon2_verify_password_async(pass.to_string(), password_hash.clone())
                .await
                .is_ok()
            {
                conn_state.user_state.password_verified = true;
                self.authenticate(conn_state).await?;
            } else {
                info!("Password mismatch for {}", conn_state.user_state.source);
                let client = conn_state.user_state.client_name();
                self.feed_msg(&mut conn_state.stream, ErrPasswdMismatch464 { client })
                    .await?;
            }
        } else {
            // no server password configured - the step is skippable
            conn_state.user_state.password_verified = true;
            self.authenticate(conn_state).await?;
        }
        Ok(())
    }

    pub(super) async fn process_nick<'a>(
        &self,
        conn_state: &mut ConnState,
        nick: &'a str,
        msg: &'a Message<'a>,
    ) -> Result<(), Box<dyn Error>> {
        if validate_nickname(nick).is_err() || nick.len() > self.config.max_nickname_len {
            let client = conn_state.user_state.client_name();
            self.feed_msg(&mut conn_state.stream, ErrErroneusNickname432 { client, nick })
                .await?;
            return Ok(());
        }

        if !conn_state.user_state.registered {
            if !self.state.read().await.users.contains_key(nick) {
                conn_state.user_state.set_nick(nick.to_string());
                self.authenticate(conn_state).await?;
            } else {
                let client = conn_state.user_state.client_name();
                self.feed_msg(&mut conn_state.stream, ErrNicknameInUse433 { client, nick })
                    .await?;
            }
        } else {
            let mut statem = self.state.write().await;
            let state = &mut *statem;
            let old_nick = conn_state.user_state.nick.as_ref().unwrap().to_string();
            if nick != old_nick {
                // if new nick is not used by other
                if !state.users.contains_key(nick) {
                    let old_source = conn_state.user_state.source.clone();
                    let mut user = state.users.remove(&old_nick).unwrap();
                    conn_state.user_state.set_nick(nick.to_string());
                    user.update_nick(&conn_state.user_state);
                    for ch in &user.channels {
                        state
                            .channels
                            .get_mut(ch)
                            .unwrap()
                            .rename_user(&old_nick, nick.to_string());
                    }
                    // keep nick history for WHOWAS
                    state.insert_to_nick_history(&old_nick, user.history_entry.clone());
                    state.users.insert(nick.to_string(), user);

                    for u in state.users.values() {
                        u.send_message(msg, &old_source)?;
                    }
                } else {
                    // if nick in use
                    let client = conn_state.user_state.client_name();
                    self.feed_msg(&mut conn_state.stream, ErrNicknameInUse433 { client, nick })
                        .await?;
                }
            }
        }
        Ok(())
    }

    pub(super) async fn process_user<'a>(
        &self,
        conn_state: &mut ConnState,
        username: &'a str,
        _: &'a str,
        _: &'a str,
        realname: &'a str,
    ) -> Result<(), Box<dyn Error>> {
        if !conn_state.user_state.registered {
            conn_state.user_state.set_name(username.to_string());
            conn_state.user_state.realname = Some(realname.to_string());
            self.authenticate(conn_state).await?;
        } else {
            let client = conn_state.user_state.client_name();
            self.feed_msg(&mut conn_state.stream, ErrAlreadyRegistered462 { client })
                .await?;
        }
        Ok(())
    }

    pub(super) async fn process_ping<'a>(
        &self,
        conn_state: &mut ConnState,
        token: &'a str,
    ) -> Result<(), Box<dyn Error>> {
        self.feed_msg(
            &mut conn_state.stream,
            format!("PONG {} :{}", self.config.name, token),
        )
        .await?;
        Ok(())
    }

    pub(super) async fn process_pong<'a>(
        &self,
        conn_state: &mut ConnState,
        _: &'a str,
    ) -> Result<(), Box<dyn Error>> {
        if let Some(notifier) = conn_state.pong_notifier.take() {
            // pong timeout may already be gone
            let _ = notifier.send(());
        }
        let mut state = self.state.write().await;
        let user_nick = conn_state.user_state.nick.as_ref().unwrap();
        if let Some(user) = state.users.get_mut(user_nick) {
            user.last_activity = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs();
        }
        Ok(())
    }

    pub(super) async fn process_quit<'a>(
        &self,
        conn_state: &mut ConnState,
        reason: Option<&'a str>,
    ) -> Result<(), Box<dyn Error>> {
        if conn_state.user_state.registered {
            let state = self.state.read().await;
            let user_nick = conn_state.user_state.nick.as_ref().unwrap();
            if let Some(user) = state.users.get(user_nick) {
                let quit_msg = format!("QUIT :{}", reason.unwrap_or("Client Quit"));
                let mut notified = HashSet::new();
                for chname in &user.channels {
                    if let Some(channel) = state.channels.get(chname) {
                        for nick in channel.users.keys() {
                            if nick != user_nick && notified.insert(nick.clone()) {
                                state
                                    .users
                                    .get(nick)
                                    .unwrap()
                                    .send_msg_display(
                                        &conn_state.user_state.source,
                                        quit_msg.as_str(),
                                    )?;
                            }
                        }
                    }
                }
            }
        }
        conn_state.quit.store(1, Ordering::SeqCst);
        info!("User {} quit", conn_state.user_state.source);
        self.feed_msg(&mut conn_state.stream, "ERROR :Closing connection")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::super::test::*;
    use super::*;

    #[tokio::test]
    async fn test_auth_nick_user_order() {
        let (main_state, handle, port) = run_test_server(MainConfig::default()).await;

        {
            let mut line_stream = connect_to_test(port).await;
            line_stream.send("NICK mati".to_string()).await.unwrap();
            line_stream
                .send("USER mat 8 * :MatiSzpaki".to_string())
                .await
                .unwrap();

            assert_eq!(
                ":irc.irc 001 mati :Welcome to the IRCnetwork \
                    Network, mati!~mat@127.0.0.1"
                    .to_string(),
                line_stream.next().await.unwrap().unwrap()
            );
            assert_eq!(
                concat!(
                    ":irc.irc 002 mati :Your host is irc.irc, running \
                    version ",
                    env!("CARGO_PKG_NAME"),
                    "-",
                    env!("CARGO_PKG_VERSION")
                )
                .to_string(),
                line_stream.next().await.unwrap().unwrap()
            );
            assert_eq!(
                format!(
                    ":irc.irc 003 mati :This server was created {}",
                    main_state.created
                ),
                line_stream.next().await.unwrap().unwrap()
            );
            assert_eq!(
                concat!(
                    ":irc.irc 004 mati irc.irc ",
                    env!("CARGO_PKG_NAME"),
                    "-",
                    env!("CARGO_PKG_VERSION"),
                    " itklo"
                )
                .to_string(),
                line_stream.next().await.unwrap().unwrap()
            );
            line_stream.send("QUIT :Bye".to_string()).await.unwrap();
        }

        {
            // reversed order - registration completes the same way
            let mut line_stream = connect_to_test(port).await;
            line_stream
                .send("USER mat2 8 * :MatiSzpaki2".to_string())
                .await
                .unwrap();
            line_stream.send("NICK mati2".to_string()).await.unwrap();

            assert_eq!(
                ":irc.irc 001 mati2 :Welcome to the IRCnetwork \
                    Network, mati2!~mat2@127.0.0.1"
                    .to_string(),
                line_stream.next().await.unwrap().unwrap()
            );
            line_stream.send("QUIT :Bye".to_string()).await.unwrap();
        }

        quit_test_server(main_state, handle).await;
    }

    #[tokio::test]
    async fn test_auth_with_caps() {
        let (main_state, handle, port) = run_test_server(MainConfig::default()).await;

        let mut line_stream = connect_to_test(port).await;
        line_stream.send("CAP LS 302".to_string()).await.unwrap();
        line_stream.send("NICK mati".to_string()).await.unwrap();
        line_stream
            .send("USER mat 8 * :MatiSzpaki".to_string())
            .await
            .unwrap();
        line_stream
            .send("CAP REQ :multi-prefix".to_string())
            .await
            .unwrap();
        line_stream.send("CAP END".to_string()).await.unwrap();

        assert_eq!(
            ":irc.irc CAP * LS :".to_string(),
            line_stream.next().await.unwrap().unwrap()
        );
        assert_eq!(
            ":irc.irc 001 mati :Welcome to the IRCnetwork \
                Network, mati!~mat@127.0.0.1"
                .to_string(),
            line_stream.next().await.unwrap().unwrap()
        );
        for _ in 1..4 {
            line_stream.next().await.unwrap().unwrap();
        }
        assert_eq!(
            ":irc.irc CAP * NAK :multi-prefix".to_string(),
            line_stream.next().await.unwrap().unwrap()
        );
        line_stream.send("QUIT :Bye".to_string()).await.unwrap();

        quit_test_server(main_state, handle).await;
    }

    #[tokio::test]
    async fn test_auth_with_password() {
        let mut config = MainConfig::default();
        config.password = Some(argon2_hash_password("blamblam"));
        let (main_state, handle, port) = run_test_server(config).await;

        for (pass, succeed) in [(Some("blamblam2"), false), (Some("blamblam"), true)] {
            let mut line_stream = connect_to_test(port).await;

            if let Some(p) = pass {
                line_stream.send(format!("PASS {}", p)).await.unwrap();
            }
            line_stream.send("NICK mati".to_string()).await.unwrap();
            line_stream
                .send("USER mat 8 * :MatiSzpaki".to_string())
                .await
                .unwrap();

            if succeed {
                assert_eq!(
                    ":irc.irc 001 mati :Welcome to the IRCnetwork \
                        Network, mati!~mat@127.0.0.1"
                        .to_string(),
                    line_stream.next().await.unwrap().unwrap(),
                    "AuthTrial: {:?}",
                    pass
                );
            } else {
                assert_eq!(
                    ":irc.irc 464 * :Password incorrect".to_string(),
                    line_stream.next().await.unwrap().unwrap(),
                    "AuthTrial: {:?}",
                    pass
                );
            }
            line_stream.send("QUIT :Bye".to_string()).await.unwrap();
        }

        quit_test_server(main_state, handle).await;
    }

    #[tokio::test]
    async fn test_auth_with_password_last() {
        let mut config = MainConfig::default();
        config.password = Some(argon2_hash_password("blamblam"));
        let (main_state, handle, port) = run_test_server(config).await;

        // PASS arrives after NICK and USER - registration completes the
        // instant all three preconditions hold.
        let mut line_stream = connect_to_test(port).await;
        line_stream.send("NICK mati".to_string()).await.unwrap();
        line_stream
            .send("USER mat 8 * :MatiSzpaki".to_string())
            .await
            .unwrap();
        line_stream
            .send("PASS blamblam".to_string())
            .await
            .unwrap();
        assert_eq!(
            ":irc.irc 001 mati :Welcome to the IRCnetwork \
                Network, mati!~mat@127.0.0.1"
                .to_string(),
            line_stream.next().await.unwrap().unwrap()
        );
        line_stream.send("QUIT :Bye".to_string()).await.unwrap();

        quit_test_server(main_state, handle).await;
    }

    #[tokio::test]
    async fn test_auth_nick_collision() {
        let (main_state, handle, port) = run_test_server(MainConfig::default()).await;

        let mut line_stream = login_to_test_and_skip(port, "mati", "mat", "MatiSzpaki").await;

        // second client with the same nickname
        let mut line_stream2 = connect_to_test(port).await;
        line_stream2.send("NICK mati".to_string()).await.unwrap();
        assert_eq!(
            ":irc.irc 433 * mati :Nickname is already in use".to_string(),
            line_stream2.next().await.unwrap().unwrap()
        );
        // first registration is unaffected - the first client still works
        line_stream.send("PING :checkup".to_string()).await.unwrap();
        assert_eq!(
            ":irc.irc PONG irc.irc :checkup".to_string(),
            line_stream.next().await.unwrap().unwrap()
        );

        // second client can pick other nickname
        line_stream2.send("NICK mati2".to_string()).await.unwrap();
        line_stream2
            .send("USER mat2 8 * :MatiSzpaki2".to_string())
            .await
            .unwrap();
        assert_eq!(
            ":irc.irc 001 mati2 :Welcome to the IRCnetwork \
                Network, mati2!~mat2@127.0.0.1"
                .to_string(),
            line_stream2.next().await.unwrap().unwrap()
        );

        line_stream.send("QUIT :Bye".to_string()).await.unwrap();
        line_stream2.send("QUIT :Bye".to_string()).await.unwrap();
        quit_test_server(main_state, handle).await;
    }

    #[tokio::test]
    async fn test_auth_bad_nickname() {
        let (main_state, handle, port) = run_test_server(MainConfig::default()).await;

        let mut line_stream = connect_to_test(port).await;
        line_stream.send("NICK 7mati".to_string()).await.unwrap();
        assert_eq!(
            ":irc.irc 432 * 7mati :Erroneus nickname".to_string(),
            line_stream.next().await.unwrap().unwrap()
        );
        line_stream.send("QUIT :Bye".to_string()).await.unwrap();
        quit_test_server(main_state, handle).await;
    }

    #[tokio::test]
    async fn test_pass_after_registration() {
        let (main_state, handle, port) = run_test_server(MainConfig::default()).await;

        let mut line_stream = login_to_test_and_skip(port, "mati", "mat", "MatiSzpaki").await;
        line_stream.send("PASS secret".to_string()).await.unwrap();
        assert_eq!(
            ":irc.irc 462 mati :You may not reregister".to_string(),
            line_stream.next().await.unwrap().unwrap()
        );
        line_stream.send("USER m 8 * :M".to_string()).await.unwrap();
        assert_eq!(
            ":irc.irc 462 mati :You may not reregister".to_string(),
            line_stream.next().await.unwrap().unwrap()
        );
        line_stream.send("QUIT :Bye".to_string()).await.unwrap();
        quit_test_server(main_state, handle).await;
    }

    #[tokio::test]
    async fn test_command_before_registration() {
        let (main_state, handle, port) = run_test_server(MainConfig::default()).await;

        let mut line_stream = connect_to_test(port).await;
        line_stream
            .send("PRIVMSG mati :hello".to_string())
            .await
            .unwrap();
        assert_eq!(
            ":irc.irc 451 * :You have not registered".to_string(),
            line_stream.next().await.unwrap().unwrap()
        );
        line_stream.send("QUIT :Bye".to_string()).await.unwrap();
        quit_test_server(main_state, handle).await;
    }

    #[tokio::test]
    async fn test_nick_change() {
        let (main_state, handle, port) = run_test_server(MainConfig::default()).await;

        let mut line_stream = login_to_test_and_skip(port, "mati", "mat", "MatiSzpaki").await;
        line_stream.send("NICK newmati".to_string()).await.unwrap();
        assert_eq!(
            ":mati!~mat@127.0.0.1 NICK newmati".to_string(),
            line_stream.next().await.unwrap().unwrap()
        );
        // old nickname is free again
        let mut line_stream2 = login_to_test(port, "mati", "mat2", "SecondMati").await;
        assert_eq!(
            ":irc.irc 001 mati :Welcome to the IRCnetwork \
                Network, mati!~mat2@127.0.0.1"
                .to_string(),
            line_stream2.next().await.unwrap().unwrap()
        );

        line_stream.send("QUIT :Bye".to_string()).await.unwrap();
        line_stream2.send("QUIT :Bye".to_string()).await.unwrap();
        quit_test_server(main_state, handle).await;
    }

    #[tokio::test]
    async fn test_quit_broadcast() {
        let (main_state, handle, port) = run_test_server(MainConfig::default()).await;

        let mut line_stream = login_to_test_and_skip(port, "mati", "mat", "MatiSzpaki").await;
        let mut line_stream2 = login_to_test_and_skip(port, "greg", "gregg", "Gregory").await;
        line_stream.send("JOIN #hall".to_string()).await.unwrap();
        for _ in 0..3 {
            line_stream.next().await.unwrap().unwrap();
        }
        line_stream2.send("JOIN #hall".to_string()).await.unwrap();
        for _ in 0..3 {
            line_stream2.next().await.unwrap().unwrap();
        }
        // skip greg's join seen by mati
        line_stream.next().await.unwrap().unwrap();

        line_stream2
            .send("QUIT :See you".to_string())
            .await
            .unwrap();
        assert_eq!(
            ":irc.irc ERROR :Closing connection".to_string(),
            line_stream2.next().await.unwrap().unwrap()
        );
        assert_eq!(
            ":greg!~gregg@127.0.0.1 QUIT :See you".to_string(),
            line_stream.next().await.unwrap().unwrap()
        );

        line_stream.send("QUIT :Bye".to_string()).await.unwrap();
        quit_test_server(main_state, handle).await;
    }
}
