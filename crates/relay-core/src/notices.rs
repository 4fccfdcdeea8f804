//! Server-originated notification texts.
//!
//! Clients display these verbatim, so the wording is part of the wire
//! contract.

/// Sent to a connection whose requested nickname is already registered.
pub const NAME_TAKEN: &str = "Nome já em uso. Atualize a página e escolha outro.";

/// Greeting sent to a connection right after it registers.
pub fn welcome(nickname: &str) -> String {
    format!("Bem-vindo, {nickname}!")
}

/// Sent to every other open connection when `nickname` registers.
pub fn joined(nickname: &str) -> String {
    format!("{nickname} entrou no chat.")
}

/// Sent to every remaining open connection when `nickname` leaves.
pub fn left(nickname: &str) -> String {
    format!("{nickname} saiu do chat.")
}

/// Sent to a DM sender when no open connection holds `target`.
pub fn not_online(target: &str) -> String {
    format!("Usuário \"{target}\" não está online.")
}
