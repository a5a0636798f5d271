use clap::{ Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Backend API Args ---
    /// Base URL of the healthcare REST backend (e.g., https://api.example.com/)
    #[arg(long, env = "API_BASE_URL", default_value = "http://127.0.0.1:8000/")]
    pub api_base_url: String,

    /// OAuth2 client id used for the password grant
    #[arg(long, env = "OAUTH_CLIENT_ID", default_value = "")]
    pub oauth_client_id: String,

    /// OAuth2 client secret used for the password grant
    #[arg(long, env = "OAUTH_CLIENT_SECRET", default_value = "")]
    pub oauth_client_secret: String,

    // --- Local Storage Args ---
    /// Device-local key/value storage type (memory, redis)
    #[arg(long, env = "STORAGE_TYPE", default_value = "redis")]
    pub storage_type: String,

    /// Redis URL for local storage (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "STORAGE_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub storage_redis_url: String,

    /// Prefix for local storage keys in Redis.
    #[arg(long, env = "STORAGE_REDIS_PREFIX", default_value = "local:")]
    pub storage_redis_prefix: String,

    // --- Chat Store Args ---
    /// Realtime chat store type (memory, redis)
    #[arg(long, env = "CHAT_STORE_TYPE", default_value = "redis")]
    pub chat_store_type: String,

    /// Chat store endpoint (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "CHAT_STORE_URL", default_value = "redis://127.0.0.1:6379")]
    pub chat_store_url: String,

    /// Prefix for chat keys and channels in Redis.
    #[arg(long, env = "CHAT_STORE_PREFIX", default_value = "chat:")]
    pub chat_store_prefix: String,

    /// Log the resolved configuration on startup
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in with username and password
    Login {
        username: String,
        #[arg(long, env = "PASSWORD")]
        password: String,
    },
    /// Forget the stored token and identity
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List people you can chat with
    Contacts,
    /// List your conversations
    Rooms {
        /// Keep printing the list as it changes
        #[arg(long)]
        watch: bool,
    },
    /// Open (or create) the direct conversation with a user
    Open { user_id: String },
    /// Send a text message to a room
    Send { room_id: String, text: String },
    /// Print a room's messages
    Messages {
        room_id: String,
        #[arg(long)]
        watch: bool,
    },
    /// Mark a room as read up to now
    Read { room_id: String },
    /// Show the unread count of a room
    Unread {
        room_id: String,
        #[arg(long)]
        watch: bool,
    },
    /// Manage daily reminders
    Reminders {
        #[command(subcommand)]
        action: Option<ReminderCommand>,
    },
    /// Show or toggle notification settings
    Settings {
        /// Setting key to flip (e.g., waterReminder)
        #[arg(long)]
        toggle: Option<String>,
    },
    /// Personal health statistics
    Stats {
        /// weekly, monthly or yearly
        #[arg(long, default_value = "weekly")]
        period: String,
        /// Week selector, e.g. 2025-W07
        #[arg(long)]
        week: Option<String>,
        /// Month selector, e.g. 2025-02
        #[arg(long)]
        month: Option<String>,
        /// Year selector, e.g. 2025
        #[arg(long)]
        year: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ReminderCommand {
    /// List reminders
    List,
    /// Add a reminder at HH:MM (UTC)
    Add { time: String, action: String },
    /// Enable or disable a reminder
    Toggle { id: String },
    /// Delete a reminder
    Remove { id: String },
}
