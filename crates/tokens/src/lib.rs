//! Token streams kept in sync with an edited document.
//!
//! A [`Tokens`] snapshot is immutable and shared. To follow an edit, hand it
//! to an [`EditableTokens`] view ([`Tokens::edit`] or [`Tokens::mutable`]
//! plus [`EditableTokens::record_edit`]), then run [`retokenize`] against the
//! new text. Only the tokens between the nearest restartable point before
//! each edit and the point where fresh output realigns with the old stream
//! are re-lexed.

mod cancel;
/// Character-count text edits used to seed pending edits.
pub mod edit;
/// Editable token views with rank/select queries.
pub mod editable;
/// Error types.
pub mod error;
/// Incremental retokenization passes.
pub mod retokenize;
/// Token, index and lexer-state types.
pub mod token;
/// The tokenizer boundary.
pub mod tokenizer;
/// Immutable token snapshots.
pub mod tokens;
mod tree;

#[cfg(test)]
mod testing;

pub use edit::TextEdit;
pub use editable::EditableTokens;
pub use error::{EditError, Result, RetokenizeError};
pub use retokenize::{DEFAULT_FULL_RELEX_THRESHOLD, RetokenizeOptions, Retokenizer, retokenize};
pub use ropey::RopeSlice;
pub use token::{CharIdx, CharLen, LexState, RawToken, Token, TokenIndex};
pub use tokenizer::Tokenizer;
pub use tokens::{Spans, TokenSpan, Tokens};
pub use tokio_util::sync::CancellationToken;
