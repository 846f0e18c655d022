use std::ops::Range;

use ropey::RopeSlice;

use crate::error::{Result, RetokenizeError};
use crate::token::{CharIdx, CharLen, LexState, RawToken};

/// A language lexer, seen from the retokenization engine.
///
/// Implementations must be deterministic: lexing the same text from the same
/// offset in the same state always yields the same tokens. Output must cover
/// `range` contiguously starting at `range.start`, and the first token must
/// report `state`. The iterator is consumed lazily; the engine stops pulling
/// once the new stream has realigned with the old one.
///
/// # Lexer states
///
/// [`RawToken::state`] is the state the lexer was in when the token *began*,
/// not the state it leaves behind. A token whose state is
/// [`LexState::DEFAULT`] is restartable: lexing from its start offset in the
/// default state must reproduce it and everything after it.
///
/// For a token that began in [`LexState::DEFAULT`], the state after it must
/// depend only on its type. Give a construct that leaves the lexer in another
/// state (a block comment running past the end of its line, say) an opening
/// type of its own. The engine reuses old tokens once a re-lexed token ends
/// where an old one did with the same type; if two tokens of one type could
/// leave different states behind, the reused tail would differ from a full
/// re-lex and no error would be reported.
pub trait Tokenizer<T> {
	fn tokenize<'a>(
		&'a self,
		text: RopeSlice<'a>,
		range: Range<CharIdx>,
		state: LexState,
	) -> impl Iterator<Item = RawToken<T>> + 'a;
}

/// Checks one output token: it must start at `expected`, must not end before
/// it starts and, when `len` is known, must not run past the text.
pub(crate) fn check_output<T>(token: &RawToken<T>, expected: CharIdx, len: Option<CharLen>) -> Result<()> {
	if token.start != expected {
		tracing::error!(expected, found = token.start, "retokenize.tokenizer.gap");
		return Err(RetokenizeError::TokenGap {
			expected,
			found: token.start,
		});
	}
	if token.end < token.start {
		tracing::error!(start = token.start, end = token.end, "retokenize.tokenizer.inverted");
		return Err(RetokenizeError::InvertedToken {
			start: token.start,
			end: token.end,
		});
	}
	if let Some(len) = len
		&& token.end > len
	{
		tracing::error!(end = token.end, len, "retokenize.tokenizer.overrun");
		return Err(RetokenizeError::TokenizerOverrun { end: token.end, len });
	}
	Ok(())
}
