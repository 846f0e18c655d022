//! Incremental retokenization.
//!
//! Resolves the pending edits of an [`EditableTokens`] view one at a time,
//! earliest first. For each edit the tokenizer restarts at the last
//! restartable token strictly before the edit's marker and runs until its
//! output realigns with the old tokens past the edit: same end offset, same
//! type, both restartable. The tokens in between are replaced and everything
//! after the realignment point is reused as is.
//!
//! The pass is cooperative: cancellation is checked before every edit and at
//! every step of the merge walk, and a cancelled pass leaves no partial
//! result. The snapshot the view was made from is never touched.

use ropey::RopeSlice;
use tokio_util::sync::CancellationToken;

use crate::cancel::checkpoint;
use crate::editable::EditableTokens;
use crate::error::{Result, RetokenizeError};
use crate::token::{CharIdx, CharLen, LexState, RawToken, Token, TokenIndex};
use crate::tokenizer::{Tokenizer, check_output};
use crate::tokens::Tokens;


/// Pending edits above which a pass re-lexes the whole document instead.
pub const DEFAULT_FULL_RELEX_THRESHOLD: usize = 512;

/// Tuning for a [`Retokenizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetokenizeOptions {
	/// When a view carries more pending edits than this, the pass discards it
	/// and lexes the whole text in one run. The result is the same either way.
	/// `None` always resolves edits incrementally.
	pub full_relex_threshold: Option<usize>,
}

impl Default for RetokenizeOptions {
	fn default() -> Self {
		Self {
			full_relex_threshold: Some(DEFAULT_FULL_RELEX_THRESHOLD),
		}
	}
}

/// Runs retokenization passes with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Retokenizer {
	opts: RetokenizeOptions,
}

/// Work done while resolving one edit.
#[derive(Debug, Clone, Copy, Default)]
struct Resolution {
	relexed: usize,
	consumed: usize,
}

impl Retokenizer {
	pub fn new(opts: RetokenizeOptions) -> Self {
		Self { opts }
	}

	pub fn opts(&self) -> RetokenizeOptions {
		self.opts
	}

	/// Resolves every pending edit of `view` against `text` and returns the
	/// resulting snapshot.
	///
	/// `text` is the edited document; its length must equal the view's
	/// character count. `empty_type` types the snapshot if the document ends
	/// up with no tokens.
	pub fn retokenize<T, K>(
		&self,
		mut view: EditableTokens<T>,
		text: RopeSlice<'_>,
		tokenizer: &K,
		cancel: &CancellationToken,
		empty_type: T,
	) -> Result<Tokens<T>>
	where
		T: Clone + PartialEq,
		K: Tokenizer<T>,
	{
		let text_len = text.len_chars();
		if text_len != view.char_count() {
			tracing::error!(text = text_len, tokens = view.char_count(), "retokenize.text_length_mismatch");
			return Err(RetokenizeError::TextLengthMismatch {
				text: text_len,
				tokens: view.char_count(),
			});
		}

		let edits = view.edit_count();
		if let Some(threshold) = self.opts.full_relex_threshold
			&& edits > threshold
		{
			tracing::debug!(edits, threshold, "retokenize.full_relex");
			return relex_all(text, tokenizer, cancel, empty_type);
		}

		let mut steps = 0usize;
		let mut relexed = 0usize;
		let mut resolved = 0usize;
		while view.edit_count() > 0 {
			checkpoint(cancel)?;
			let resolution = resolve_first_edit(&mut view, text, tokenizer, cancel)?;
			steps += 1;
			relexed += resolution.relexed;
			resolved += resolution.consumed;
		}
		let tokens = view.into_tokens(empty_type)?;
		tracing::debug!(edits, steps, resolved, relexed, tokens = tokens.token_count(), "retokenize.pass.done");
		Ok(tokens)
	}
}

/// Runs a pass with [`RetokenizeOptions::default`].
pub fn retokenize<T, K>(
	view: EditableTokens<T>,
	text: RopeSlice<'_>,
	tokenizer: &K,
	cancel: &CancellationToken,
	empty_type: T,
) -> Result<Tokens<T>>
where
	T: Clone + PartialEq,
	K: Tokenizer<T>,
{
	Retokenizer::default().retokenize(view, text, tokenizer, cancel, empty_type)
}

fn relex_all<T, K>(text: RopeSlice<'_>, tokenizer: &K, cancel: &CancellationToken, empty_type: T) -> Result<Tokens<T>>
where
	T: Clone,
	K: Tokenizer<T>,
{
	let text_len = text.len_chars();
	let tokens = Tokens::from_tokenizer_output(tokenizer.tokenize(text, 0..text_len, LexState::DEFAULT), empty_type, cancel)?;
	if tokens.char_count() != text_len {
		tracing::error!(text = text_len, produced = tokens.char_count(), "retokenize.full_relex.length_mismatch");
		return Err(RetokenizeError::LengthMismatch {
			replaced: text_len,
			produced: tokens.char_count(),
		});
	}
	Ok(tokens)
}

/// Re-lexes around the first pending edit and splices the result in.
fn resolve_first_edit<T, K>(
	view: &mut EditableTokens<T>,
	text: RopeSlice<'_>,
	tokenizer: &K,
	cancel: &CancellationToken,
) -> Result<Resolution>
where
	T: Clone + PartialEq,
	K: Tokenizer<T>,
{
	let Some(edited) = view.token_index_at_edit_index(0) else {
		tracing::error!(edits = view.edit_count(), "retokenize.edit.missing");
		return Err(RetokenizeError::MissingEdit { index: 0 });
	};
	let resume = match view.restartable_state_count_before(edited).checked_sub(1) {
		Some(k) => view
			.token_index_at_restartable_state_index(k)
			.unwrap_or(TokenIndex::ZERO),
		None => TokenIndex::ZERO,
	};
	let resume_offset = view.token_start(resume);
	let text_len = text.len_chars();

	let lexed = tokenizer.tokenize(text, resume_offset..text_len, LexState::DEFAULT);
	let (to, produced) = merge(view, edited, resume, resume_offset, text_len, lexed, cancel)?;

	let replaced = view.token_start(to) - resume_offset;
	let produced_len: CharLen = produced.iter().map(|t| t.len).sum();
	if replaced != produced_len {
		tracing::error!(
			%edited,
			%resume,
			%to,
			replaced,
			produced = produced_len,
			"retokenize.edit.length_mismatch"
		);
		return Err(RetokenizeError::LengthMismatch {
			replaced,
			produced: produced_len,
		});
	}

	let old_tokens = view.token_count();
	let old_chars = view.char_count();
	let relexed = produced.len();
	let consumed = view.replace_tokens(resume, to, produced);

	let expected_tokens = resume.get() + relexed + (old_tokens - to.get());
	if view.token_count() != expected_tokens || view.char_count() != old_chars {
		tracing::error!(
			expected_tokens,
			actual_tokens = view.token_count(),
			expected_chars = old_chars,
			actual_chars = view.char_count(),
			"retokenize.edit.bookkeeping"
		);
		return Err(RetokenizeError::Bookkeeping {
			expected_tokens,
			actual_tokens: view.token_count(),
			expected_chars: old_chars,
			actual_chars: view.char_count(),
		});
	}

	tracing::trace!(
		%edited,
		%resume,
		resume_offset,
		%to,
		relexed,
		consumed_edits = consumed,
		"retokenize.edit.resolved"
	);
	Ok(Resolution { relexed, consumed })
}

/// Walks old tokens from `resume` alongside freshly lexed ones until both
/// streams end at the same offset on a matching restartable token past the
/// edit.
///
/// Returns the exclusive end of the old tokens to replace and the new tokens
/// replacing them.
fn merge<T, I>(
	view: &EditableTokens<T>,
	edited: TokenIndex,
	resume: TokenIndex,
	resume_offset: CharIdx,
	text_len: CharLen,
	mut lexed: I,
	cancel: &CancellationToken,
) -> Result<(TokenIndex, Vec<Token<T>>)>
where
	T: Clone + PartialEq,
	I: Iterator<Item = RawToken<T>>,
{
	let last = TokenIndex::new(view.token_count() - 1);
	let mut old_index = resume;
	let mut old_end = view.token_end(old_index);
	let mut new_end = resume_offset;
	let mut produced = Vec::new();

	loop {
		checkpoint(cancel)?;

		if old_index < last && old_end <= new_end {
			old_index = old_index.next();
			old_end = view.token_end(old_index);
			continue;
		}

		let Some(raw) = lexed.next() else {
			return Ok((old_index.next(), produced));
		};
		check_output(&raw, new_end, Some(text_len))?;

		let token = Token::relexed(raw);
		new_end += token.len;
		let converged = new_end == old_end
			&& edited < old_index
			&& token.restartable
			&& view.is_restartable(old_index)
			&& *view.token_type(old_index) == token.ty;
		produced.push(token);
		if converged {
			return Ok((old_index.next(), produced));
		}
	}
}
