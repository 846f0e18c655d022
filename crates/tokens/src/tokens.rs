//! Immutable token snapshots.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::edit::{TextEdit, rebase_sorted};
use crate::editable::EditableTokens;
use crate::error::{EditError, Result};
use crate::token::{CharIdx, CharLen, RawToken, Token, TokenIndex};
use crate::tokenizer::check_output;
use crate::tree::{Dim, Entries, Entry, Node};

/// Pass number given to tokens produced by a whole-document run.
const FIRST_PASS: u64 = 1;

/// A persistent, immutable token sequence covering a whole document.
///
/// Cloning is `O(1)`; clones share structure. A snapshot is never modified:
/// editing goes through [`Tokens::mutable`], which hands the structure to an
/// [`EditableTokens`] without copying it, and the retokenization pass returns
/// a new snapshot.
///
/// Every empty snapshot is the distinguished instance built by
/// [`Tokens::empty`], carrying a placeholder token type.
#[derive(Clone)]
pub struct Tokens<T> {
	repr: Repr<T>,
}

#[derive(Clone)]
enum Repr<T> {
	Empty(T),
	/// Never holds an empty tree. `placeholder` types a marker recorded
	/// after every token has been removed from a view.
	Seq { root: Arc<Node<T>>, pass: u64, placeholder: T },
}

impl<T: Clone> Tokens<T> {
	/// The empty snapshot.
	pub fn empty(placeholder: T) -> Self {
		Self {
			repr: Repr::Empty(placeholder),
		}
	}

	/// Builds a snapshot from a whole-document tokenizer run.
	///
	/// Tokens must be contiguous from offset 0. Cancellation is checked before
	/// each token is taken. Every token of the result reports `edited`.
	pub fn from_tokenizer_output(
		raw: impl IntoIterator<Item = RawToken<T>>,
		empty_type: T,
		cancel: &CancellationToken,
	) -> Result<Self> {
		let mut entries = Vec::new();
		let mut offset = 0;
		for token in raw {
			crate::cancel::checkpoint(cancel)?;
			check_output(&token, offset, None)?;
			offset = token.end;
			let token = Token::relexed(token);
			entries.push(Entry {
				len: token.len,
				ty: token.ty,
				restartable: token.restartable,
				pending: false,
				pass: FIRST_PASS,
			});
		}
		Ok(Self::from_root(Node::from_entries(entries), FIRST_PASS, empty_type))
	}

	pub(crate) fn from_root(root: Arc<Node<T>>, pass: u64, empty_type: T) -> Self {
		let repr = if root.is_empty() {
			Repr::Empty(empty_type)
		} else {
			Repr::Seq {
				root,
				pass,
				placeholder: empty_type,
			}
		};
		Self { repr }
	}

	/// Hands the snapshot to an editable view in `O(1)`.
	///
	/// The view shares this snapshot's tree; splices copy only the spine they
	/// touch, so `self` stays valid and unchanged.
	pub fn mutable(&self) -> EditableTokens<T> {
		match &self.repr {
			Repr::Empty(ty) => EditableTokens::new(Node::empty(), FIRST_PASS + 1, ty.clone()),
			Repr::Seq { root, pass, placeholder } => EditableTokens::new(root.clone(), pass + 1, placeholder.clone()),
		}
	}

	/// Seeds an editable view with a batch of edits.
	///
	/// Edits are given in this snapshot's coordinates, sorted by position and
	/// non-overlapping, as a change set describes them.
	pub fn edit(&self, edits: impl IntoIterator<Item = TextEdit>) -> std::result::Result<EditableTokens<T>, EditError> {
		let mut view = self.mutable();
		for edit in rebase_sorted(edits)? {
			view.record_edit(edit)?;
		}
		Ok(view)
	}
}

impl<T> Tokens<T> {
	#[inline]
	pub fn is_empty(&self) -> bool {
		matches!(self.repr, Repr::Empty(_))
	}

	/// Placeholder type of the empty snapshot; `None` for a non-empty one.
	pub fn empty_type(&self) -> Option<&T> {
		match &self.repr {
			Repr::Empty(ty) => Some(ty),
			Repr::Seq { .. } => None,
		}
	}

	#[inline]
	pub fn token_count(&self) -> usize {
		self.root().map_or(0, |root| root.summary().tokens)
	}

	#[inline]
	pub fn char_count(&self) -> CharLen {
		self.root().map_or(0, |root| root.summary().chars)
	}

	fn root(&self) -> Option<&Node<T>> {
		match &self.repr {
			Repr::Empty(_) => None,
			Repr::Seq { root, .. } => Some(&**root),
		}
	}

	fn pass(&self) -> u64 {
		match &self.repr {
			Repr::Empty(_) => 0,
			Repr::Seq { pass, .. } => *pass,
		}
	}

	pub fn get(&self, index: TokenIndex) -> Option<TokenSpan<'_, T>> {
		let (before, entry) = self.root()?.seek(Dim::Tokens, index.get())?;
		Some(TokenSpan::new(index, before.chars, entry, self.pass()))
	}

	/// Index of the token containing character `offset`.
	///
	/// Zero-length tokens contain no character and are never returned.
	pub fn token_index_at_offset(&self, offset: CharIdx) -> Option<TokenIndex> {
		let (before, _) = self.root()?.seek(Dim::Chars, offset)?;
		Some(TokenIndex::new(before.tokens))
	}

	pub fn iter(&self) -> Spans<'_, T> {
		Spans::new(self, TokenIndex::ZERO, 0, None)
	}

	/// Tokens overlapping `range`, in order.
	pub fn spans_in(&self, range: Range<CharIdx>) -> Spans<'_, T> {
		if range.start >= range.end {
			return Spans::exhausted(self.pass());
		}
		match self.root().and_then(|root| root.seek(Dim::Chars, range.start)) {
			Some((before, _)) => Spans::new(self, TokenIndex::new(before.tokens), before.chars, Some(range.end)),
			None => Spans::exhausted(self.pass()),
		}
	}
}

impl<T: PartialEq> PartialEq for Tokens<T> {
	fn eq(&self, other: &Self) -> bool {
		match (&self.repr, &other.repr) {
			(Repr::Empty(a), Repr::Empty(b)) => a == b,
			(Repr::Seq { root: a, .. }, Repr::Seq { root: b, .. }) => {
				if Arc::ptr_eq(a, b) {
					return true;
				}
				a.summary() == b.summary()
					&& a.entries_from(0).zip(b.entries_from(0)).all(|(x, y)| {
						x.len == y.len && x.restartable == y.restartable && x.ty == y.ty
					})
			}
			_ => false,
		}
	}
}

impl<T: Eq> Eq for Tokens<T> {}

impl<T: fmt::Debug> fmt::Debug for Tokens<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.repr {
			Repr::Empty(ty) => f.debug_tuple("Tokens::Empty").field(ty).finish(),
			Repr::Seq { .. } => f.debug_list().entries(self.iter()).finish(),
		}
	}
}

/// A token of a snapshot, positioned in the text.
#[derive(Debug, PartialEq, Eq)]
pub struct TokenSpan<'a, T> {
	pub index: TokenIndex,
	pub start: CharIdx,
	pub end: CharIdx,
	pub ty: &'a T,
	pub restartable: bool,
	/// Produced by the pass that built the snapshot.
	pub edited: bool,
}

impl<T> Clone for TokenSpan<'_, T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for TokenSpan<'_, T> {}

impl<'a, T> TokenSpan<'a, T> {
	fn new(index: TokenIndex, start: CharIdx, entry: &'a Entry<T>, pass: u64) -> Self {
		Self {
			index,
			start,
			end: start + entry.len,
			ty: &entry.ty,
			restartable: entry.restartable,
			edited: entry.pass == pass,
		}
	}

	#[inline]
	pub fn len(&self) -> CharLen {
		self.end - self.start
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}

	#[inline]
	pub fn range(&self) -> Range<CharIdx> {
		self.start..self.end
	}

	/// Detaches the span from the snapshot.
	pub fn to_token(&self) -> Token<T>
	where
		T: Clone,
	{
		Token {
			len: self.len(),
			ty: self.ty.clone(),
			restartable: self.restartable,
			edited: self.edited,
		}
	}
}

/// Iterator over the spans of a snapshot.
pub struct Spans<'a, T> {
	entries: Option<Entries<'a, T>>,
	index: TokenIndex,
	offset: CharIdx,
	until: Option<CharIdx>,
	pass: u64,
}

impl<'a, T> Spans<'a, T> {
	fn new(tokens: &'a Tokens<T>, index: TokenIndex, offset: CharIdx, until: Option<CharIdx>) -> Self {
		Self {
			entries: tokens.root().map(|root| root.entries_from(index.get())),
			index,
			offset,
			until,
			pass: tokens.pass(),
		}
	}

	fn exhausted(pass: u64) -> Self {
		Self {
			entries: None,
			index: TokenIndex::ZERO,
			offset: 0,
			until: None,
			pass,
		}
	}
}

impl<'a, T> Iterator for Spans<'a, T> {
	type Item = TokenSpan<'a, T>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.until.is_some_and(|until| self.offset >= until) {
			self.entries = None;
		}
		let entry = self.entries.as_mut()?.next()?;
		let span = TokenSpan::new(self.index, self.offset, entry, self.pass);
		self.index = self.index.next();
		self.offset = span.end;
		Some(span)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::error::RetokenizeError;
	use crate::testing::{Kind, lex_all};

	#[test]
	fn empty_snapshot_is_canonical() {
		let tokens = Tokens::empty(Kind::Empty);
		assert!(tokens.is_empty());
		assert_eq!(tokens.empty_type(), Some(&Kind::Empty));
		assert_eq!(tokens.token_count(), 0);
		assert_eq!(tokens.char_count(), 0);
		assert!(tokens.get(TokenIndex::ZERO).is_none());
		assert_eq!(tokens.iter().count(), 0);

		let lexed = lex_all("");
		assert_eq!(lexed, tokens);
		assert_ne!(lexed, Tokens::empty(Kind::Word));
	}

	#[test]
	fn from_tokenizer_output_rejects_gaps() {
		let raw = vec![
			RawToken::new(0, 2, 'a', Default::default()),
			RawToken::new(3, 4, 'b', Default::default()),
		];
		let err = Tokens::from_tokenizer_output(raw, ' ', &CancellationToken::new()).unwrap_err();
		assert_eq!(err, RetokenizeError::TokenGap { expected: 2, found: 3 });
	}

	#[test]
	fn from_tokenizer_output_rejects_inverted_tokens() {
		let raw = vec![
			RawToken::new(0, 3, 'a', Default::default()),
			RawToken::new(3, 1, 'b', Default::default()),
			RawToken::new(3, 5, 'c', Default::default()),
		];
		let err = Tokens::from_tokenizer_output(raw, ' ', &CancellationToken::new()).unwrap_err();
		assert_eq!(err, RetokenizeError::InvertedToken { start: 3, end: 1 });
	}

	#[test]
	fn from_tokenizer_output_checks_cancellation() {
		let cancel = CancellationToken::new();
		cancel.cancel();
		let raw = vec![RawToken::new(0, 2, 'a', Default::default())];
		let err = Tokens::from_tokenizer_output(raw, ' ', &cancel).unwrap_err();
		assert!(err.is_cancelled());
	}

	#[test]
	fn spans_report_positions_and_edited() {
		let tokens = lex_all("let x = 42;");
		let spans: Vec<_> = tokens.iter().map(|s| (s.range(), *s.ty)).collect();
		assert_eq!(
			spans,
			vec![
				(0..3, Kind::Word),
				(3..4, Kind::Space),
				(4..5, Kind::Word),
				(5..6, Kind::Space),
				(6..7, Kind::Punct),
				(7..8, Kind::Space),
				(8..10, Kind::Number),
				(10..11, Kind::Punct),
			]
		);
		assert!(tokens.iter().all(|s| s.edited && s.restartable));
		assert_eq!(tokens.char_count(), 11);
		assert_eq!(tokens.get(TokenIndex::new(6)).map(|s| s.range()), Some(8..10));
	}

	#[test]
	fn token_index_at_offset_finds_containing_token() {
		let tokens = lex_all("ab  cd");
		assert_eq!(tokens.token_index_at_offset(0), Some(TokenIndex::new(0)));
		assert_eq!(tokens.token_index_at_offset(3), Some(TokenIndex::new(1)));
		assert_eq!(tokens.token_index_at_offset(5), Some(TokenIndex::new(2)));
		assert_eq!(tokens.token_index_at_offset(6), None);
	}

	#[test]
	fn spans_in_returns_overlapping_tokens() {
		let tokens = lex_all("one two three four");
		let words: Vec<_> = tokens.spans_in(5..9).map(|s| s.range()).collect();
		assert_eq!(words, vec![4..7, 7..8, 8..13]);
		assert_eq!(tokens.spans_in(3..3).count(), 0);
		assert_eq!(tokens.spans_in(40..50).count(), 0);
	}

	#[test]
	fn equality_ignores_edited_flag() {
		let tokens = lex_all("a b c");
		let reused = tokens.mutable().into_tokens(Kind::Empty).unwrap();
		assert!(reused.iter().all(|s| !s.edited));
		assert_eq!(reused, tokens);
	}

	#[test]
	fn edit_rebases_batch_onto_current_coordinates() {
		let tokens = lex_all("aa bb cc");
		let view = tokens
			.edit([TextEdit::insert(0, 2), TextEdit::replace(6..8, "d")])
			.unwrap();
		assert_eq!(view.edit_count(), 2);
		assert_eq!(view.char_count(), 9);
		assert_eq!(tokens.char_count(), 8);
	}
}
