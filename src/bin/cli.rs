//! Skirmish CLI Client
//!
//! Command-line interface for poking at a running Skirmish server.

use std::net::TcpStream;

use bytes::Bytes;
use clap::{Args as ClapArgs, Parser, Subcommand};
use skirmish::protocol::admin::{AdminAnswer, AdminRequest};
use skirmish::protocol::updater::{UpdaterAnswer, UpdaterRequest};
use skirmish::protocol::user::{
    GameCommand, GameCommandAnswer, LaunchMatchAnswer, LoadingAnswer, LoadingProgress,
    QuickMatchAnswer, UserAnswer, UserRequest,
};
use skirmish::protocol::{read_frame, ConnectStatus, SystemNotice};
use skirmish::{Result, SkirmishError};

/// Skirmish CLI
#[derive(Parser, Debug)]
#[command(name = "skirmish-cli")]
#[command(about = "CLI for the Skirmish duel server")]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Protocol version to announce
    #[arg(short, long, default_value = "1")]
    protocol_version: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in as a player and wait for a quick match opponent
    QuickMatch {
        #[arg(long, default_value = "7000")]
        port: u16,

        login: String,

        password: String,

        /// Accept the launch, load, send the actions and leave
        #[arg(long)]
        play: bool,

        /// Action sent once the game started, repeatable
        #[arg(long = "action")]
        actions: Vec<String>,
    },

    /// Show server counters (admin)
    Stats {
        #[arg(long, default_value = "7001")]
        port: u16,

        #[arg(long, default_value = "admin")]
        login: String,

        #[arg(long, default_value = "admin")]
        password: String,
    },

    /// List connected users (admin)
    Users {
        #[arg(long, default_value = "7001")]
        port: u16,

        #[arg(long, default_value = "admin")]
        login: String,

        #[arg(long, default_value = "admin")]
        password: String,
    },

    /// Schedule a server shutdown (admin)
    Shutdown {
        /// Seconds before the server stops
        seconds: i32,

        #[arg(long, default_value = "7001")]
        port: u16,

        #[arg(long, default_value = "admin")]
        login: String,

        #[arg(long, default_value = "admin")]
        password: String,
    },

    /// Ban users for a number of days, 0 meaning until unbanned (admin)
    Ban {
        #[arg(long, default_value = "0")]
        days: i32,

        #[arg(required = true)]
        logins: Vec<String>,

        #[command(flatten)]
        admin: AdminLogin,
    },

    /// Lift the ban of users (admin)
    Unban {
        #[arg(required = true)]
        logins: Vec<String>,

        #[command(flatten)]
        admin: AdminLogin,
    },

    /// Lock user accounts for maintenance (admin)
    Lock {
        #[arg(required = true)]
        logins: Vec<String>,

        #[command(flatten)]
        admin: AdminLogin,
    },

    /// Unlock user accounts (admin)
    Unlock {
        #[arg(required = true)]
        logins: Vec<String>,

        #[command(flatten)]
        admin: AdminLogin,
    },

    /// Send a message to logged users (admin)
    Message {
        text: String,

        /// Send to every logged user instead of the listed ones
        #[arg(long)]
        all: bool,

        logins: Vec<String>,

        #[command(flatten)]
        admin: AdminLogin,
    },

    /// Check the protocol version against the server (updater)
    CheckVersion {
        #[arg(long, default_value = "7002")]
        port: u16,
    },
}

#[derive(ClapArgs, Debug)]
struct AdminLogin {
    #[arg(long, default_value = "7001")]
    port: u16,

    #[arg(long, default_value = "admin")]
    login: String,

    #[arg(long, default_value = "admin")]
    password: String,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    match &args.command {
        Commands::QuickMatch {
            port,
            login,
            password,
            play,
            actions,
        } => {
            let mut stream = TcpStream::connect((args.host.as_str(), *port))?;
            let request = UserRequest::Connect { version: args.protocol_version };
            match user_round_trip(&mut stream, &request)? {
                UserAnswer::Connect { status: ConnectStatus::Ok, seconds_before_shutdown } => {
                    if seconds_before_shutdown >= 0 {
                        println!("Server shuts down in {}s", seconds_before_shutdown);
                    }
                }
                other => return Err(unexpected(other)),
            }

            let request = UserRequest::Login {
                login: login.clone(),
                password: password.clone(),
            };
            println!("{:?}", user_round_trip(&mut stream, &request)?);
            println!("{:?}", user_round_trip(&mut stream, &UserRequest::QuickMatch)?);

            wait_for(&mut stream, |answer| {
                matches!(answer, UserAnswer::QuickMatch(QuickMatchAnswer::OpponentFound { .. }))
            })?;
            if *play {
                play_match(&mut stream, actions)?;
            }
            Ok(())
        }
        Commands::Stats { port, login, password } => {
            let mut stream = admin_session(args, *port, login, password)?;
            println!("{:?}", admin_round_trip(&mut stream, &AdminRequest::ServerStats)?);
            Ok(())
        }
        Commands::Users { port, login, password } => {
            let mut stream = admin_session(args, *port, login, password)?;
            match admin_round_trip(&mut stream, &AdminRequest::ConnectedUsersInfos)? {
                AdminAnswer::ConnectedUsersInfos(users) => {
                    for user in users {
                        println!(
                            "{:>5}  {:<20}  {}",
                            user.session_id,
                            user.login.as_deref().unwrap_or("-"),
                            user.quick_match
                        );
                    }
                    Ok(())
                }
                other => Err(unexpected(other)),
            }
        }
        Commands::Shutdown { seconds, port, login, password } => {
            let mut stream = admin_session(args, *port, login, password)?;
            let request = AdminRequest::ShutdownServer { seconds: *seconds };
            println!("{:?}", admin_round_trip(&mut stream, &request)?);
            Ok(())
        }
        Commands::Ban { days, logins, admin } => moderate(
            args,
            admin,
            AdminRequest::BanUsers {
                days: *days,
                logins: logins.clone(),
            },
        ),
        Commands::Unban { logins, admin } => moderate(
            args,
            admin,
            AdminRequest::UnbanUsers { logins: logins.clone() },
        ),
        Commands::Lock { logins, admin } => moderate(
            args,
            admin,
            AdminRequest::LockUsers { logins: logins.clone() },
        ),
        Commands::Unlock { logins, admin } => moderate(
            args,
            admin,
            AdminRequest::UnlockUsers { logins: logins.clone() },
        ),
        Commands::Message { text, all, logins, admin } => {
            if !*all && logins.is_empty() {
                return Err(SkirmishError::Config(
                    "give at least one login or --all".to_string(),
                ));
            }
            let mut stream = admin_session(args, admin.port, &admin.login, &admin.password)?;
            let request = AdminRequest::SendMessageToUsers {
                text: text.clone(),
                for_all_users: *all,
                logins: logins.clone(),
            };
            match admin_round_trip(&mut stream, &request)? {
                AdminAnswer::SendMessageToUsers { delivered } => {
                    println!("Delivered to {} users", delivered);
                    Ok(())
                }
                other => Err(unexpected(other)),
            }
        }
        Commands::CheckVersion { port } => {
            let mut stream = TcpStream::connect((args.host.as_str(), *port))?;
            let request = UpdaterRequest::Connect { version: args.protocol_version };
            std::io::Write::write_all(&mut stream, &request.encode()?)?;
            let (message_type, payload) = read_non_notice(&mut stream)?;
            println!("{:?}", UpdaterAnswer::decode(message_type, payload)?);
            Ok(())
        }
    }
}

/// Run one moderation request and print the per-login outcome
fn moderate(args: &Args, admin: &AdminLogin, request: AdminRequest) -> Result<()> {
    let mut stream = admin_session(args, admin.port, &admin.login, &admin.password)?;
    match admin_round_trip(&mut stream, &request)? {
        AdminAnswer::BanUsers(results)
        | AdminAnswer::UnbanUsers(results)
        | AdminAnswer::LockUsers(results)
        | AdminAnswer::UnlockUsers(results) => {
            for result in results {
                let outcome = if result.applied { "done" } else { "unknown login" };
                println!("{:<20}  {}", result.login, outcome);
            }
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

/// Accept, load, act and leave; stops early if the match goes away
fn play_match(stream: &mut TcpStream, actions: &[String]) -> Result<()> {
    send_user(stream, &UserRequest::LaunchMatch { accept: true })?;
    let answer = wait_for(stream, |answer| matches!(answer, UserAnswer::LaunchMatch(_)))?;
    if !matches!(answer, UserAnswer::LaunchMatch(LaunchMatchAnswer::Launch { .. })) {
        return Ok(());
    }

    send_user(
        stream,
        &UserRequest::Loading {
            progress: LoadingProgress::Finished,
        },
    )?;
    let answer = wait_for(stream, |answer| {
        matches!(
            answer,
            UserAnswer::GameCommand(GameCommandAnswer::GameStart)
                | UserAnswer::Loading(LoadingAnswer::OpponentDropped)
        )
    })?;
    if answer != UserAnswer::GameCommand(GameCommandAnswer::GameStart) {
        return Ok(());
    }

    for action in actions {
        let command = GameCommand::Action(Bytes::copy_from_slice(action.as_bytes()));
        send_user(stream, &UserRequest::GameCommand(command))?;
    }
    send_user(stream, &UserRequest::GameCommand(GameCommand::LeaveGame))
}

/// Print answers until one satisfies `done`, which is returned
fn wait_for(stream: &mut TcpStream, done: impl Fn(&UserAnswer) -> bool) -> Result<UserAnswer> {
    loop {
        let answer = read_user_answer(stream)?;
        println!("{:?}", answer);
        if done(&answer) {
            return Ok(answer);
        }
    }
}

fn send_user(stream: &mut TcpStream, request: &UserRequest) -> Result<()> {
    std::io::Write::write_all(stream, &request.encode()?)?;
    Ok(())
}

fn admin_session(args: &Args, port: u16, login: &str, password: &str) -> Result<TcpStream> {
    let mut stream = TcpStream::connect((args.host.as_str(), port))?;
    let request = AdminRequest::Connect { version: args.protocol_version };
    match admin_round_trip(&mut stream, &request)? {
        AdminAnswer::Connect { status: ConnectStatus::Ok } => {}
        other => return Err(unexpected(other)),
    }

    let request = AdminRequest::Login {
        login: login.to_string(),
        password: password.to_string(),
    };
    match admin_round_trip(&mut stream, &request)? {
        AdminAnswer::Login { accepted: true } => Ok(stream),
        other => Err(unexpected(other)),
    }
}

fn user_round_trip(stream: &mut TcpStream, request: &UserRequest) -> Result<UserAnswer> {
    send_user(stream, request)?;
    read_user_answer(stream)
}

fn read_user_answer(stream: &mut TcpStream) -> Result<UserAnswer> {
    let (message_type, payload) = read_non_notice(stream)?;
    UserAnswer::decode(message_type, payload)
}

fn admin_round_trip(stream: &mut TcpStream, request: &AdminRequest) -> Result<AdminAnswer> {
    std::io::Write::write_all(stream, &request.encode()?)?;
    let (message_type, payload) = read_non_notice(stream)?;
    AdminAnswer::decode(message_type, payload)
}

/// Next frame that is not a notice; admin messages are printed, any other
/// notice ends the session
fn read_non_notice(stream: &mut TcpStream) -> Result<(i32, Bytes)> {
    loop {
        let (message_type, payload) = read_frame(stream)?;
        if !SystemNotice::is_notice(message_type) {
            return Ok((message_type, payload));
        }
        match SystemNotice::decode(message_type, payload)? {
            SystemNotice::AdminMessage { text } => println!("[admin] {}", text),
            notice => {
                return Err(SkirmishError::Transport(format!("server sent {:?}", notice)));
            }
        }
    }
}

fn unexpected(answer: impl std::fmt::Debug) -> SkirmishError {
    SkirmishError::UnexpectedMessage(format!("{:?}", answer))
}
