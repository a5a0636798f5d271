pub mod api;
pub mod chat;
pub mod cli;
pub mod error;
pub mod models;
pub mod reminders;
pub mod session;
pub mod storage;
pub mod store;

use chrono::{ NaiveTime, TimeZone, Utc };
use futures::stream::{ BoxStream, StreamExt };
use log::info;
use std::error::Error;
use std::sync::Arc;

use api::ApiClient;
use chat::ChatService;
use cli::{ Args, Command, ReminderCommand };
use models::health::{ StatisticsPeriod, StatisticsQuery };
use models::{ Message, RoomListEntry };
use reminders::ReminderBook;
use session::Session;

type BoxError = Box<dyn Error + Send + Sync>;

fn print_rooms(rows: &[RoomListEntry]) {
    if rows.is_empty() {
        println!("(no conversations)");
    }
    for row in rows {
        let unread = if row.unread_count > 0 { format!(" [{}]", row.unread_count) } else { String::new() };
        println!(
            "{}  {}{}  {}",
            row.room.id,
            row.title(),
            unread,
            row.room.last_message.as_deref().unwrap_or("")
        );
    }
}

fn print_messages(messages: &[Message]) {
    for m in messages {
        println!("[{}] {}: {}", m.timestamp.format("%Y-%m-%d %H:%M:%S"), m.sender_id, m.message);
    }
}

/// Prints every emission until the stream ends or Ctrl-C.
async fn follow<T>(mut stream: BoxStream<'static, T>, mut print: impl FnMut(T)) -> Result<(), BoxError> {
    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(item) => print(item),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn first<T>(mut stream: BoxStream<'static, T>) -> Option<T> {
    stream.next().await
}

pub async fn run(args: Args) -> Result<(), BoxError> {
    if args.debug {
        info!("--- Core Configuration ---");
        info!("API Base URL: {}", args.api_base_url);
        info!("Local Storage Type: {}", args.storage_type);
        info!("Local Storage URL: {}", args.storage_redis_url);
        info!("Chat Store Type: {}", args.chat_store_type);
        info!("Chat Store URL: {}", args.chat_store_url);
        info!("Chat Store Prefix: {}", args.chat_store_prefix);
        info!("-------------------------");
    }

    let api = ApiClient::from_args(&args);
    let session = Session::new(storage::initialize_local_store(&args).await?);

    match args.command.clone() {
        Command::Login { username, password } => {
            let user = session.login(&api, &username, &password).await?;
            println!("Logged in as {} ({}, {})", user.display_name(), user.id, user.role);
            return Ok(());
        }
        Command::Logout => {
            session.logout().await?;
            println!("Logged out");
            return Ok(());
        }
        Command::Reminders { action } => {
            return run_reminders(session, action.unwrap_or(ReminderCommand::List)).await;
        }
        Command::Settings { toggle } => {
            let settings = match toggle {
                Some(key) => reminders::toggle_notification_setting(&session, &key).await?,
                None => reminders::load_notification_settings(&session).await?,
            };
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        Command::Stats { period, week, month, year } => {
            let token = session.require_token().await?;
            let period: StatisticsPeriod = period.parse()?;
            let query = StatisticsQuery {
                week,
                month,
                year,
                ..Default::default()
            };
            let stats = api.my_statistics(&token, period, &query).await?;
            println!("{}", serde_json::to_string_pretty(&stats.data)?);
            return Ok(());
        }
        Command::Contacts => {
            let token = session.require_token().await?;
            let role = session.role().await?.unwrap_or_default();
            for contact in api.chat_contacts(&token, role).await? {
                println!("{}  {} ({})", contact.id, contact.display_name(), contact.role);
            }
            return Ok(());
        }
        _ => {}
    }

    let store = store::initialize_chat_store(&args).await?;
    let chat = ChatService::new(session, store, Arc::new(api));
    let me = chat.current_user_id().await?;

    match args.command {
        Command::Whoami => {
            match chat.session().cached_profile().await? {
                Some(profile) => println!("{} ({}, {})", profile.display_name(), me, profile.role),
                None => println!("{}", me),
            }
        }
        Command::Rooms { watch } => {
            let rooms = chat.user_rooms(&me).await?;
            if watch {
                follow(rooms, |rows| {
                    println!("---");
                    print_rooms(&rows);
                }).await?;
            } else if let Some(rows) = first(rooms).await {
                print_rooms(&rows);
            }
        }
        Command::Open { user_id } => {
            println!("{}", chat.find_or_create_direct_room(&me, &user_id).await?);
        }
        Command::Send { room_id, text } => {
            let sent = chat.send_message(&room_id, &me, &text).await?;
            println!("Sent {} at {}", sent.id, sent.timestamp);
        }
        Command::Messages { room_id, watch } => {
            let messages = chat.messages(&room_id).await?;
            if watch {
                follow(messages, |snapshot| print_messages(&snapshot)).await?;
            } else if let Some(snapshot) = first(messages).await {
                print_messages(&snapshot);
            }
        }
        Command::Read { room_id } => {
            let at = chat.mark_read(&room_id, &me).await?;
            println!("Read up to {}", at);
        }
        Command::Unread { room_id, watch } => {
            if watch {
                follow(chat.unread_counts(&room_id, &me).await?, |count| println!("{}", count)).await?;
            } else {
                println!("{}", chat.unread_count(&room_id, &me).await?);
            }
        }
        _ => {}
    }

    Ok(())
}

async fn run_reminders(session: Session, action: ReminderCommand) -> Result<(), BoxError> {
    let book = ReminderBook::new(session);
    match action {
        ReminderCommand::List => {
            for r in book.list().await? {
                let state = if r.enabled { "on" } else { "off" };
                println!("{}  {}  {}  {}", r.id, r.time.format("%H:%M"), state, r.action);
            }
        }
        ReminderCommand::Add { time, action } => {
            let now = Utc::now();
            let at = NaiveTime::parse_from_str(&time, "%H:%M")?;
            let selected = Utc.from_utc_datetime(&now.date_naive().and_time(at));
            let reminder = book.add(selected, &action, now).await?;
            println!("Reminder {} set for {}", reminder.id, reminder.time);
        }
        ReminderCommand::Toggle { id } => {
            match book.toggle(&id).await? {
                Some(r) => println!("{} is now {}", r.id, if r.enabled { "on" } else { "off" }),
                None => println!("No reminder {}", id),
            }
        }
        ReminderCommand::Remove { id } => {
            if book.remove(&id).await? {
                println!("Removed {}", id);
            } else {
                println!("No reminder {}", id);
            }
        }
    }
    Ok(())
}
