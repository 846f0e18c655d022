//! Error types for retokenization and edit seeding.

use thiserror::Error;

use crate::token::{CharIdx, CharLen};

/// Errors that end a retokenization pass.
///
/// Apart from [`RetokenizeError::Cancelled`], every variant reports a broken
/// internal invariant: either the tokenizer is not deterministic/contiguous or
/// the token bookkeeping is wrong. None of them leave a partial result behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetokenizeError {
	/// Cancellation was requested while the pass was running.
	#[error("retokenization cancelled")]
	Cancelled,

	/// The text handed to the pass does not match the token view's length.
	#[error("text has {text} chars but the token view covers {tokens}")]
	TextLengthMismatch {
		/// Characters in the text.
		text: CharLen,
		/// Characters covered by the tokens.
		tokens: CharLen,
	},

	/// The tokenizer skipped or overlapped characters.
	#[error("tokenizer output is not contiguous: expected a token at {expected}, got one at {found}")]
	TokenGap {
		/// Offset where the next token had to start.
		expected: CharIdx,
		/// Offset where it actually started.
		found: CharIdx,
	},

	/// The tokenizer produced a token that ends before it starts.
	#[error("tokenizer produced an inverted token {start}..{end}")]
	InvertedToken {
		/// Start offset of the offending token.
		start: CharIdx,
		/// End offset of the offending token.
		end: CharIdx,
	},

	/// The tokenizer produced a token past the end of the text.
	#[error("tokenizer produced a token ending at {end}, past the end of the text ({len})")]
	TokenizerOverrun {
		/// End offset of the offending token.
		end: CharIdx,
		/// Length of the text.
		len: CharLen,
	},

	/// The replaced region and the re-lexed tokens differ in length.
	#[error("re-lexed tokens cover {produced} chars but the replaced region covers {replaced}")]
	LengthMismatch {
		/// Characters of old tokens being replaced.
		replaced: CharLen,
		/// Characters covered by the new tokens.
		produced: CharLen,
	},

	/// Token or character counts disagree after a splice.
	#[error(
		"token bookkeeping mismatch after splice: expected {expected_tokens} tokens / {expected_chars} chars, \
		 found {actual_tokens} / {actual_chars}"
	)]
	Bookkeeping {
		expected_tokens: usize,
		actual_tokens: usize,
		expected_chars: CharLen,
		actual_chars: CharLen,
	},

	/// A pending edit could not be located in the token view.
	#[error("pending edit {index} has no token")]
	MissingEdit {
		/// Ordinal of the edit.
		index: usize,
	},

	/// The view was finalized before every edit was resolved.
	#[error("{count} edits are still pending")]
	UnresolvedEdits {
		/// Number of unresolved edits.
		count: usize,
	},
}

impl RetokenizeError {
	/// Returns true for [`RetokenizeError::Cancelled`].
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}

	/// Returns true when the error reports a broken invariant rather than a
	/// cancellation. Hosts typically fall back to a full re-lex.
	pub fn is_internal(&self) -> bool {
		!self.is_cancelled()
	}
}

/// Errors raised while recording edits into a token view.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditError {
	/// The edit's start lies after its end.
	#[error("invalid edit range {start}..{end}")]
	InvalidRange { start: CharIdx, end: CharIdx },

	/// The edit reaches past the end of the tokens.
	#[error("edit ends at {end} but the tokens cover {len} chars")]
	OutOfBounds { end: CharIdx, len: CharLen },

	/// Edits in a batch must be sorted and must not overlap.
	#[error("edit at {start} overlaps or precedes the previous edit ending at {previous_end}")]
	Unordered { start: CharIdx, previous_end: CharIdx },
}

/// Result type for retokenization operations.
pub type Result<T> = std::result::Result<T, RetokenizeError>;
