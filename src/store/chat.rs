use super::Store;
use crate::error::PersistenceError;
use crate::models::{ChatMessage, TIMESTAMP_FORMAT};
use chrono::Local;
use rand::seq::SliceRandom;

const ANIMALS: &[&str] = &[
    "Lion", "Tiger", "Bear", "Eagle", "Falcon", "Raven", "Dolphin", "Bronco", "Bengal", "Jaguar",
    "Panther", "Ram", "Colt", "Bison", "Wolf", "Fox", "Hawk", "Shark",
];

// Suffixes double as CSS colour names in the chat widget
const COLORS: &[&str] = &[
    "Red", "Blue", "Green", "Orange", "Purple", "Teal", "Crimson", "Navy", "Gold", "Maroon",
    "Olive", "Coral",
];

/// Random "Animal-Color" handle for a new chatter
pub fn generate_username() -> String {
    let mut rng = rand::thread_rng();
    let animal = ANIMALS.choose(&mut rng).copied().unwrap_or("Lion");
    let color = COLORS.choose(&mut rng).copied().unwrap_or("Red");
    format!("{}-{}", animal, color)
}

impl Store {
    /// Append a message and return its id
    pub async fn append_message(
        &self,
        ip: &str,
        username: &str,
        message: &str,
    ) -> Result<i64, PersistenceError> {
        let timestamp = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        let result = sqlx::query(
            "INSERT INTO chat_messages (ip, username, message, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(ip)
        .bind(username)
        .bind(message)
        .bind(timestamp)
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn read_chat_log(&self) -> Result<Vec<ChatMessage>, PersistenceError> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT id, ip, username, message, timestamp FROM chat_messages ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(messages)
    }

    /// First username ever used from this address
    pub async fn username_by_ip(&self, ip: &str) -> Result<Option<String>, PersistenceError> {
        let username = sqlx::query_scalar(
            "SELECT username FROM chat_messages WHERE ip = ? ORDER BY id LIMIT 1",
        )
        .bind(ip)
        .fetch_optional(self.pool())
        .await?;
        Ok(username)
    }

    /// Post a message under the address's username, generating one on first use.
    /// Blank messages are ignored and return `None`.
    pub async fn post_message(
        &self,
        ip: &str,
        message: &str,
    ) -> Result<Option<ChatMessage>, PersistenceError> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(None);
        }

        let username = match self.username_by_ip(ip).await? {
            Some(name) => name,
            None => generate_username(),
        };
        let id = self.append_message(ip, &username, message).await?;

        let posted = sqlx::query_as::<_, ChatMessage>(
            "SELECT id, ip, username, message, timestamp FROM chat_messages WHERE id = ?",
        )
        .bind(id)
        .fetch_one(self.pool())
        .await?;
        Ok(Some(posted))
    }
}
