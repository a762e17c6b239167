// mod.rs - main state
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

use chrono::prelude::*;
use futures::SinkExt;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::ops::Drop;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_stream::StreamExt;
use tokio_util::codec::{Framed, LinesCodecError};
use tracing::*;

use crate::command::*;
use crate::config::*;
use crate::reply::*;
use crate::utils::*;

use Reply::*;

#[derive(Debug)]
pub(crate) struct User {
    hostname: String,
    sender: UnboundedSender<String>,
    name: String,
    realname: String,
    nick: String,
    source: String, // IRC source for mask matching
    away: Option<String>,
    channels: HashSet<String>,
    invited_to: HashSet<String>, // channels with an outstanding invite
    last_activity: u64,
    signon: u64,
    history_entry: NickHistoryEntry,
}

impl User {
    fn new(user_state: &ConnUserState, sender: UnboundedSender<String>) -> User {
        let now_ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        User {
            hostname: user_state.hostname.clone(),
            sender,
            name: user_state.name.as_ref().unwrap().clone(),
            realname: user_state.realname.as_ref().unwrap().clone(),
            nick: user_state.nick.as_ref().unwrap().clone(),
            source: user_state.source.clone(),
            away: None,
            channels: HashSet::new(),
            invited_to: HashSet::new(),
            last_activity: now_ts,
            signon: now_ts,
            history_entry: NickHistoryEntry {
                username: user_state.name.as_ref().unwrap().clone(),
                hostname: user_state.hostname.clone(),
                realname: user_state.realname.as_ref().unwrap().clone(),
                signon: now_ts,
            },
        }
    }

    // update nick - mainly source
    fn update_nick(&mut self, user_state: &ConnUserState) {
        if let Some(ref nick) = user_state.nick {
            self.nick = nick.clone();
        }
        self.source = user_state.source.clone();
    }

    fn send_message(&self, msg: &Message<'_>, source: &str) -> Result<(), SendError<String>> {
        self.sender.send(msg.to_string_with_source(source))
    }

    fn send_msg_display<T: fmt::Display>(
        &self,
        source: &str,
        t: T,
    ) -> Result<(), SendError<String>> {
        self.sender.send(format!(":{} {}", source, t))
    }
}

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub(crate) struct ChannelUserModes {
    operator: bool,
}

impl ChannelUserModes {
    fn new_for_created_channel() -> Self {
        ChannelUserModes { operator: true }
    }

    fn prefix(&self) -> String {
        if self.operator {
            "@".to_string()
        } else {
            String::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChannelTopic {
    topic: String,
    nick: String,
    set_time: u64,
}

impl ChannelTopic {
    fn new_with_nick(topic: String, nick: String) -> Self {
        ChannelTopic {
            topic,
            nick,
            set_time: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ChannelModes {
    key: Option<String>,
    client_limit: Option<i32>,
    invite_only: bool,
    protected_topic: bool,
}

impl fmt::Display for ChannelModes {
    // compose mode string from currently set flags, arguments appended at end
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("+")?;
        if self.invite_only {
            f.write_str("i")?;
        }
        if self.protected_topic {
            f.write_str("t")?;
        }
        if self.key.is_some() {
            f.write_str("k")?;
        }
        if self.client_limit.is_some() {
            f.write_str("l")?;
        }
        if let Some(ref key) = self.key {
            write!(f, " {}", key)?;
        }
        if let Some(limit) = self.client_limit {
            write!(f, " {}", limit)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Channel {
    name: String,
    topic: Option<ChannelTopic>,
    modes: ChannelModes,
    users: HashMap<String, ChannelUserModes>,
    creation_time: u64,
}

impl Channel {
    fn new(name: String, user_nick: String) -> Channel {
        let mut users = HashMap::new();
        users.insert(user_nick, ChannelUserModes::new_for_created_channel());
        Channel {
            name,
            topic: None,
            modes: ChannelModes::default(),
            users,
            creation_time: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs(),
        }
    }

    fn add_user(&mut self, user_nick: &String) {
        self.users
            .insert(user_nick.clone(), ChannelUserModes::default());
    }

    fn rename_user(&mut self, old_nick: &String, nick: String) {
        let oldchumode = self.users.remove(old_nick).unwrap();
        self.users.insert(nick, oldchumode);
    }

    fn remove_user(&mut self, nick: &str) {
        self.users.remove(nick);
    }

    fn add_operator(&mut self, nick: &str) {
        self.users.get_mut(nick).unwrap().operator = true;
    }

    fn remove_operator(&mut self, nick: &str) {
        self.users.get_mut(nick).unwrap().operator = false;
    }

    fn is_operator(&self, nick: &str) -> bool {
        self.users.get(nick).map_or(false, |chum| chum.operator)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct NickHistoryEntry {
    username: String,
    hostname: String,
    realname: String,
    signon: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConnUserState {
    hostname: String,
    name: Option<String>,
    realname: Option<String>,
    nick: Option<String>,
    source: String, // IRC source for mask matching
    password_verified: bool,
    registered: bool,
}

impl ConnUserState {
    fn new(ip_addr: IpAddr) -> ConnUserState {
        let mut source = "@".to_string();
        source.push_str(&ip_addr.to_string());
        ConnUserState {
            hostname: ip_addr.to_string(),
            name: None,
            realname: None,
            nick: None,
            source,
            password_verified: false,
            registered: false,
        }
    }

    pub(crate) fn client_name(&self) -> &str {
        if let Some(ref n) = self.nick {
            n
        } else if let Some(ref n) = self.name {
            n
        } else {
            "*"
        }
    }

    fn update_source(&mut self) {
        let mut s = String::new();
        // generate source - nick!~username@host
        if let Some(ref nick) = self.nick {
            s.push_str(nick);
            s.push('!');
        }
        if let Some(ref name) = self.name {
            s.push('~'); // username not verified by ident
            s.push_str(name);
        }
        s.push('@');
        s.push_str(&self.hostname);
        self.source = s;
    }

    fn set_name(&mut self, name: String) {
        self.name = Some(name);
        self.update_source();
    }

    fn set_nick(&mut self, nick: String) {
        self.nick = Some(nick);
        self.update_source();
    }
}

#[derive(Debug)]
pub(crate) struct ConnState {
    stream: Framed<TcpStream, IRCLinesCodec>,
    sender: Option<UnboundedSender<String>>,
    receiver: UnboundedReceiver<String>,
    // sender and receiver used by the ping task
    ping_sender: Option<UnboundedSender<()>>,
    ping_receiver: UnboundedReceiver<()>,
    // timeout_sender - sent by pong_client_timeout when pong never came
    timeout_sender: Arc<UnboundedSender<()>>,
    timeout_receiver: UnboundedReceiver<()>,
    pong_notifier: Option<oneshot::Sender<()>>,

    user_state: ConnUserState,

    quit: Arc<AtomicI32>,
    conns_count: Arc<AtomicUsize>,
}

impl ConnState {
    fn new(
        ip_addr: IpAddr,
        stream: Framed<TcpStream, IRCLinesCodec>,
        conns_count: Arc<AtomicUsize>,
    ) -> ConnState {
        let (sender, receiver) = unbounded_channel();
        let (ping_sender, ping_receiver) = unbounded_channel();
        let (timeout_sender, timeout_receiver) = unbounded_channel();
        ConnState {
            stream,
            sender: Some(sender),
            receiver,
            user_state: ConnUserState::new(ip_addr),
            ping_sender: Some(ping_sender),
            ping_receiver,
            timeout_sender: Arc::new(timeout_sender),
            timeout_receiver,
            pong_notifier: None,
            quit: Arc::new(AtomicI32::new(0)),
            conns_count,
        }
    }

    pub(crate) fn is_quit(&self) -> bool {
        self.quit.load(Ordering::SeqCst) != 0
    }

    fn run_ping_waker(&mut self, config: &MainConfig) {
        if self.ping_sender.is_some() {
            tokio::spawn(ping_client_waker(
                Duration::from_secs(config.ping_timeout),
                self.quit.clone(),
                self.ping_sender.take().unwrap(),
            ));
        }
    }

    // run pong timeout process - sends timeout after pong_timeout seconds.
    fn run_pong_timeout(&mut self, config: &MainConfig) {
        let (pong_notifier, pong_receiver) = oneshot::channel();
        self.pong_notifier = Some(pong_notifier);
        tokio::spawn(pong_client_timeout(
            time::timeout(Duration::from_secs(config.pong_timeout), pong_receiver),
            self.quit.clone(),
            self.timeout_sender.clone(),
        ));
    }
}

impl Drop for ConnState {
    fn drop(&mut self) {
        self.conns_count.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn ping_client_waker(d: Duration, quit: Arc<AtomicI32>, sender: UnboundedSender<()>) {
    time::sleep(d).await;
    let mut intv = time::interval(d);
    while quit.load(Ordering::SeqCst) == 0 {
        intv.tick().await;
        if sender.send(()).is_err() {
            break;
        }
    }
}

async fn pong_client_timeout(
    tmo: time::Timeout<oneshot::Receiver<()>>,
    quit: Arc<AtomicI32>,
    sender: Arc<UnboundedSender<()>>,
) {
    if tmo.await.is_err() {
        // do not send if client already quits from IRC server.
        if quit.load(Ordering::SeqCst) == 0 {
            let _ = sender.send(());
        }
    }
}

pub(crate) struct VolatileState {
    users: HashMap<String, User>,
    channels: HashMap<String, Channel>,
    nick_histories: HashMap<String, Vec<NickHistoryEntry>>,
    quit_sender: Option<oneshot::Sender<String>>,
    quit_receiver: Option<oneshot::Receiver<String>>,
}

impl VolatileState {
    fn new() -> VolatileState {
        let (quit_sender, quit_receiver) = oneshot::channel();
        VolatileState {
            users: HashMap::new(),
            channels: HashMap::new(),
            nick_histories: HashMap::new(),
            quit_sender: Some(quit_sender),
            quit_receiver: Some(quit_receiver),
        }
    }

    fn add_user(&mut self, user: User) {
        self.users.insert(user.nick.clone(), user);
    }

    // remove user from server state. empty channels are destroyed.
    fn remove_user(&mut self, nick: &str) {
        if let Some(user) = self.users.remove(nick) {
            for chname in &user.channels {
                let empty = if let Some(channel) = self.channels.get_mut(chname) {
                    channel.remove_user(nick);
                    channel.users.is_empty()
                } else {
                    false
                };
                if empty {
                    self.channels.remove(chname);
                }
            }
            self.insert_to_nick_history(&nick.to_string(), user.history_entry.clone());
        }
    }

    fn insert_to_nick_history(&mut self, old_nick: &String, nhe: NickHistoryEntry) {
        self.nick_histories
            .entry(old_nick.to_string())
            .or_insert_with(Vec::new)
            .push(nhe);
    }
}

pub(crate) struct MainState {
    config: MainConfig,
    conns_count: Arc<AtomicUsize>,
    state: RwLock<VolatileState>,
    created: String,
}

impl MainState {
    pub(crate) fn new_from_config(config: MainConfig) -> MainState {
        MainState {
            config,
            state: RwLock::new(VolatileState::new()),
            conns_count: Arc::new(AtomicUsize::new(0)),
            created: Local::now().to_rfc2822(),
        }
    }

    pub(crate) fn register_conn_state(
        &self,
        ip_addr: IpAddr,
        stream: Framed<TcpStream, IRCLinesCodec>,
    ) -> Option<ConnState> {
        if let Some(max_conns) = self.config.max_connections {
            if self.conns_count.fetch_add(1, Ordering::SeqCst) < max_conns {
                Some(ConnState::new(ip_addr, stream, self.conns_count.clone()))
            } else {
                self.conns_count.fetch_sub(1, Ordering::SeqCst);
                error!("Too many connections");
                None
            }
        } else {
            self.conns_count.fetch_add(1, Ordering::SeqCst);
            Some(ConnState::new(ip_addr, stream, self.conns_count.clone()))
        }
    }

    pub(crate) async fn remove_user(&self, conn_state: &ConnState) {
        if let Some(ref nick) = conn_state.user_state.nick {
            let mut state = self.state.write().await;
            state.remove_user(nick);
        }
    }

    pub(crate) async fn process(&self, conn_state: &mut ConnState) -> Result<(), String> {
        // use conversion error to string to avoid problems with thread safety
        let res = self
            .process_internal(conn_state)
            .await
            .map_err(|e| e.to_string());
        SinkExt::<String>::flush(&mut conn_state.stream)
            .await
            .map_err(|e| e.to_string())?;
        res
    }

    pub(crate) async fn get_quit_receiver(&self) -> oneshot::Receiver<String> {
        let mut state = self.state.write().await;
        state.quit_receiver.take().unwrap()
    }

    async fn process_internal(&self, conn_state: &mut ConnState) -> Result<(), Box<dyn Error>> {
        tokio::select! {
            Some(msg) = conn_state.receiver.recv() => {
                conn_state.stream.feed(msg).await?;
                Ok(())
            },
            Some(_) = conn_state.ping_receiver.recv() => {
                self.feed_msg(&mut conn_state.stream,
                        format!("PING :{}", self.config.name)).await?;
                conn_state.run_pong_timeout(&self.config);
                Ok(())
            }
            Some(_) = conn_state.timeout_receiver.recv() => {
                self.feed_msg(&mut conn_state.stream,
                        "ERROR :Pong timeout, connection will be closed.").await?;
                conn_state.quit.store(1, Ordering::SeqCst);
                Ok(())
            }
            msg_str_res = conn_state.stream.next() => {
                let msg = match msg_str_res {
                    Some(Ok(ref msg_str)) => {
                        match Message::from_shared_str(msg_str) {
                            Ok(msg) => msg,
                            Err(MessageError::Empty) => {
                                // empty lines are silently skipped
                                return Ok(());
                            }
                            Err(e) => {
                                self.feed_msg(&mut conn_state.stream,
                                        format!("ERROR :{}", e)).await?;
                                return Err(Box::new(e));
                            }
                        }
                    }
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        let client = conn_state.user_state.client_name();
                        self.feed_msg(&mut conn_state.stream,
                                    ErrInputTooLong417{ client }).await?;
                        return Ok(())
                    },
                    Some(Err(e)) => return Err(Box::new(e)),
                    // end of stream - connection closed by peer
                    None => {
                        conn_state.quit.store(1, Ordering::SeqCst);
                        return Ok(())
                    }
                };

                let cmd = match Command::from_message(&msg) {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        use crate::command::CommandError::*;
                        let client = conn_state.user_state.client_name();
                        match e {
                            UnknownCommand(ref cmd_name) => {
                                self.feed_msg(&mut conn_state.stream,
                                        ErrUnknownCommand421{ client,
                                        command: cmd_name.as_str() }).await?;
                            }
                            NeedMoreParams(command) => {
                                self.feed_msg(&mut conn_state.stream,
                                        ErrNeedMoreParams461{ client,
                                        command: command.name }).await?;
                            }
                            UnknownSubcommand(_, _)|ParameterDoesntMatch(_, _)|
                                    WrongParameter(_, _) => {
                                self.feed_msg(&mut conn_state.stream,
                                        format!("ERROR :{}", e)).await?;
                            }
                        }
                        return Err(Box::new(e));
                    }
                };

                use crate::command::Command::*;
                // registration gate: unregistered clients are handled by the
                // authentication commands only.
                match cmd {
                    CAP{ .. } | PASS{ .. } | NICK{ .. } | USER{ .. } | QUIT{ .. } => {},
                    _ => {
                        if !conn_state.user_state.registered {
                            self.feed_msg(&mut conn_state.stream, ErrNotRegistered451{
                                        client: conn_state.user_state.client_name() }).await?;
                            return Ok(())
                        }
                    }
                }

                match cmd {
                    CAP{ subcommand, caps } =>
                        self.process_cap(conn_state, subcommand, caps).await,
                    PASS{ password } =>
                        self.process_pass(conn_state, password).await,
                    NICK{ nickname } =>
                        self.process_nick(conn_state, nickname, &msg).await,
                    USER{ username, hostname, servername, realname } =>
                        self.process_user(conn_state, username, hostname,
                                servername, realname).await,
                    PING{ token } => self.process_ping(conn_state, token).await,
                    PONG{ token } => self.process_pong(conn_state, token).await,
                    QUIT{ reason } => self.process_quit(conn_state, reason).await,
                    JOIN{ channels, keys } =>
                        self.process_join(conn_state, channels, keys).await,
                    PART{ channels, reason } =>
                        self.process_part(conn_state, channels, reason).await,
                    TOPIC{ channel, topic } =>
                        self.process_topic(conn_state, channel, topic, &msg).await,
                    INVITE{ nickname, channel } =>
                        self.process_invite(conn_state, nickname, channel, &msg).await,
                    KICK{ channel, users, comment } =>
                        self.process_kick(conn_state, channel, users, comment).await,
                    MODE{ target, modestring, mode_args } =>
                        self.process_mode(conn_state, target, modestring,
                                mode_args).await,
                    PRIVMSG{ targets, text } =>
                        self.process_privmsg(conn_state, targets, text).await,
                    WHO{ mask } => self.process_who(conn_state, mask).await,
                    WHOIS{ nickmasks } =>
                        self.process_whois(conn_state, nickmasks).await,
                    WHOWAS{ nickname, count } =>
                        self.process_whowas(conn_state, nickname, count).await,
                    AWAY{ text } =>
                        self.process_away(conn_state, text).await,
                }
            },
        }
    }

    async fn feed_msg<T: fmt::Display>(
        &self,
        stream: &mut Framed<TcpStream, IRCLinesCodec>,
        t: T,
    ) -> Result<(), LinesCodecError> {
        stream.feed(format!(":{} {}", self.config.name, t)).await
    }

    async fn feed_msg_source<T: fmt::Display>(
        &self,
        stream: &mut Framed<TcpStream, IRCLinesCodec>,
        source: &str,
        t: T,
    ) -> Result<(), LinesCodecError> {
        stream.feed(format!(":{} {}", source, t)).await
    }
}

pub(crate) async fn user_state_process(
    main_state: Arc<MainState>,
    stream: TcpStream,
    addr: SocketAddr,
) {
    let line_stream = Framed::new(stream, IRCLinesCodec::new_with_max_length(2000));
    if let Some(mut conn_state) = main_state.register_conn_state(addr.ip(), line_stream) {
        while !conn_state.is_quit() {
            if let Err(e) = main_state.process(&mut conn_state).await {
                error!("Error for {}: {}", conn_state.user_state.source, e);
            }
        }
        main_state.remove_user(&conn_state).await;
    }
}

pub(crate) async fn run_server(
    config: MainConfig,
) -> Result<(Arc<MainState>, JoinHandle<()>), Box<dyn Error>> {
    let listener = TcpListener::bind((config.listen, config.port)).await?;
    info!("Server listening on {}:{}", config.listen, config.port);
    let main_state = Arc::new(MainState::new_from_config(config));
    let main_state_to_return = main_state.clone();
    let handle = tokio::spawn(async move {
        let mut quit_receiver = main_state.get_quit_receiver().await;
        let mut do_quit = false;
        while !do_quit {
            tokio::select! {
                res = listener.accept() => {
                    match res {
                        Ok((stream, addr)) => {
                            tokio::spawn(user_state_process(
                                        main_state.clone(), stream, addr)); }
                        Err(e) => { error!("Accept connection error: {}", e); }
                    };
                }
                Ok(msg) = &mut quit_receiver => {
                    info!("Server quit: {}", msg);
                    do_quit = true;
                }
            };
        }
    });
    Ok((main_state_to_return, handle))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicU16;

    static PORT_COUNTER: AtomicU16 = AtomicU16::new(7888);

    pub(crate) async fn run_test_server(
        mut config: MainConfig,
    ) -> (Arc<MainState>, JoinHandle<()>, u16) {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
        config.port = port;
        let (main_state, handle) = run_server(config).await.unwrap();
        (main_state, handle, port)
    }

    pub(crate) async fn quit_test_server(main_state: Arc<MainState>, handle: JoinHandle<()>) {
        main_state
            .state
            .write()
            .await
            .quit_sender
            .take()
            .unwrap()
            .send("Test".to_string())
            .unwrap();
        handle.await.unwrap();
    }

    pub(crate) async fn connect_to_test(port: u16) -> Framed<TcpStream, IRCLinesCodec> {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        Framed::new(stream, IRCLinesCodec::new())
    }

    pub(crate) async fn login_to_test(
        port: u16,
        nick: &str,
        name: &str,
        realname: &str,
    ) -> Framed<TcpStream, IRCLinesCodec> {
        let mut line_stream = connect_to_test(port).await;
        line_stream.send(format!("NICK {}", nick)).await.unwrap();
        line_stream
            .send(format!("USER {} 8 * :{}", name, realname))
            .await
            .unwrap();
        line_stream
    }

    // login and skip welcome burst (001-004)
    pub(crate) async fn login_to_test_and_skip(
        port: u16,
        nick: &str,
        name: &str,
        realname: &str,
    ) -> Framed<TcpStream, IRCLinesCodec> {
        let mut line_stream = login_to_test(port, nick, name, realname).await;
        for _ in 0..4 {
            line_stream.next().await.unwrap().unwrap();
        }
        line_stream
    }

    #[test]
    fn test_channel_user_modes_prefix() {
        assert_eq!("@", ChannelUserModes { operator: true }.prefix());
        assert_eq!("", ChannelUserModes { operator: false }.prefix());
    }

    #[test]
    fn test_channel_modes_to_string() {
        let mut chm = ChannelModes::default();
        assert_eq!("+", chm.to_string());
        chm.invite_only = true;
        chm.protected_topic = true;
        assert_eq!("+it", chm.to_string());
        chm.key = Some("secret".to_string());
        assert_eq!("+itk secret", chm.to_string());
        chm.client_limit = Some(10);
        assert_eq!("+itkl secret 10", chm.to_string());
        chm.invite_only = false;
        chm.protected_topic = false;
        chm.key = None;
        assert_eq!("+l 10", chm.to_string());
    }

    #[test]
    fn test_channel_new_add_remove_user() {
        let mut channel = Channel::new("#bobby".to_string(), "dizzy".to_string());
        assert_eq!(
            Channel {
                name: "#bobby".to_string(),
                topic: None,
                modes: ChannelModes::default(),
                users: [(
                    "dizzy".to_string(),
                    ChannelUserModes::new_for_created_channel()
                )]
                .into(),
                creation_time: channel.creation_time
            },
            channel
        );
        assert!(channel.is_operator("dizzy"));

        channel.add_user(&"doer".to_string());
        assert!(!channel.is_operator("doer"));
        channel.add_operator("doer");
        assert!(channel.is_operator("doer"));
        channel.remove_operator("doer");
        assert!(!channel.is_operator("doer"));
        channel.remove_user("doer");
        assert!(!channel.users.contains_key("doer"));
    }

    #[test]
    fn test_channel_rename_user() {
        let mut channel = Channel::new("#bobby".to_string(), "dizzy".to_string());
        channel.rename_user(&"dizzy".to_string(), "diggy".to_string());
        assert!(channel.is_operator("diggy"));
        assert!(!channel.users.contains_key("dizzy"));
    }

    #[test]
    fn test_conn_user_state() {
        let mut cus = ConnUserState::new("192.168.1.7".parse().unwrap());
        assert_eq!(
            ConnUserState {
                hostname: "192.168.1.7".to_string(),
                name: None,
                realname: None,
                nick: None,
                source: "@192.168.1.7".to_string(),
                password_verified: false,
                registered: false
            },
            cus
        );
        assert_eq!("*", cus.client_name());
        cus.set_name("boro".to_string());
        assert_eq!("~boro@192.168.1.7", cus.source);
        assert_eq!("boro", cus.client_name());
        cus.set_nick("buru".to_string());
        assert_eq!("buru!~boro@192.168.1.7", cus.source);
        assert_eq!("buru", cus.client_name());
    }

    #[test]
    fn test_volatile_state_remove_user() {
        let mut state = VolatileState::new();
        let mut cus = ConnUserState::new("192.168.1.7".parse().unwrap());
        cus.set_name("mati".to_string());
        cus.set_nick("matix".to_string());
        cus.realname = Some("Matthew Somebody".to_string());
        let (sender, _) = unbounded_channel();
        let mut user = User::new(&cus, sender);
        user.channels.insert("#matichan".to_string());
        state.add_user(user);
        state.channels.insert(
            "#matichan".to_string(),
            Channel::new("#matichan".to_string(), "matix".to_string()),
        );

        state.remove_user("matix");
        assert!(state.users.is_empty());
        // empty channel destroyed
        assert!(state.channels.is_empty());
        // nick history recorded
        assert_eq!(1, state.nick_histories.get("matix").unwrap().len());
    }

    #[tokio::test]
    async fn test_run_server_quit() {
        let (main_state, handle, _) = run_test_server(MainConfig::default()).await;
        quit_test_server(main_state, handle).await;
    }
}

mod channel_cmds;
mod conn_cmds;
mod mode_cmds;
mod rest_cmds;
