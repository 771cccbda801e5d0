pub mod chats;
pub mod init;
pub mod send;
