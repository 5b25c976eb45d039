/*!
 * Translation of document blobs through a chat-completion provider.
 *
 * - `client`: the translation client and its response checks
 * - `prompts`: system prompt template and prompt hashing
 * - `usage`: token accounting for the run summary
 */

pub use self::client::{TranslatedBlob, TranslationClient};
pub use self::prompts::PromptTemplate;
pub use self::usage::TokenUsageStats;

pub mod client;
pub mod prompts;
pub mod usage;
