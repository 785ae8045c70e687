pub mod memory;
pub mod mongo_message_repository;
pub mod mongo_user_directory;

pub use memory::{InMemoryMessageRepository, InMemoryUserDirectory};
pub use mongo_message_repository::MongoMessageRepository;
pub use mongo_user_directory::MongoUserDirectory;
