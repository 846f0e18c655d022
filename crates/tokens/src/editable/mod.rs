//! Editable token views.
//!
//! A view starts as an `O(1)` copy of a [`Tokens`] snapshot and carries the
//! pending edits of one retokenization pass. An edit is recorded by merging
//! every token it touches into a single pending marker whose length already
//! reflects the new text, so the view's character count always matches the
//! edited document. Resolving an edit replaces the tokens around its marker
//! with re-lexed ones.

use std::sync::Arc;

use crate::edit::TextEdit;
use crate::error::{EditError, Result, RetokenizeError};
use crate::token::{CharIdx, CharLen, Token, TokenIndex};
use crate::tokens::Tokens;
use crate::tree::{Dim, Entry, Node, Summary};


/// A mutable working copy of a token sequence.
///
/// Shares structure with the snapshot it was made from; the snapshot is never
/// affected by changes to the view.
#[derive(Debug, Clone)]
pub struct EditableTokens<T> {
	root: Arc<Node<T>>,
	/// Pass that will own the snapshot built from this view.
	pass: u64,
	/// Type for a marker recorded into a view without tokens.
	placeholder: T,
}

impl<T: Clone> EditableTokens<T> {
	pub(crate) fn new(root: Arc<Node<T>>, pass: u64, placeholder: T) -> Self {
		Self { root, pass, placeholder }
	}

	/// Number of unresolved edits.
	#[inline]
	pub fn edit_count(&self) -> usize {
		self.root.summary().pending
	}

	#[inline]
	pub fn token_count(&self) -> usize {
		self.root.summary().tokens
	}

	#[inline]
	pub fn char_count(&self) -> CharLen {
		self.root.summary().chars
	}

	/// Index of the token holding pending edit `index`, in document order.
	pub fn token_index_at_edit_index(&self, index: usize) -> Option<TokenIndex> {
		self.root
			.seek(Dim::Pending, index)
			.map(|(before, _)| TokenIndex::new(before.tokens))
	}

	/// Number of restartable tokens strictly before `index`.
	///
	/// # Panics
	///
	/// Panics if `index` is greater than the token count.
	pub fn restartable_state_count_before(&self, index: TokenIndex) -> usize {
		self.summary_before(index).restartable
	}

	/// Index of the restartable token with ordinal `k` among restartable
	/// tokens, or `None` if there are `k` or fewer.
	pub fn token_index_at_restartable_state_index(&self, k: usize) -> Option<TokenIndex> {
		self.root
			.seek(Dim::Restartable, k)
			.map(|(before, _)| TokenIndex::new(before.tokens))
	}

	/// Start offset of token `index`. `index` may equal the token count, giving
	/// the end of the text.
	///
	/// # Panics
	///
	/// Panics if `index` is greater than the token count.
	pub fn token_start(&self, index: TokenIndex) -> CharIdx {
		self.summary_before(index).chars
	}

	/// End offset of token `index`.
	///
	/// # Panics
	///
	/// Panics if `index` is out of bounds.
	pub fn token_end(&self, index: TokenIndex) -> CharIdx {
		let (before, entry) = self.entry(index);
		before.chars + entry.len
	}

	/// # Panics
	///
	/// Panics if `index` is out of bounds.
	pub fn token_type(&self, index: TokenIndex) -> &T {
		&self.entry(index).1.ty
	}

	/// # Panics
	///
	/// Panics if `index` is out of bounds.
	pub fn is_restartable(&self, index: TokenIndex) -> bool {
		self.entry(index).1.restartable
	}

	/// Whether token `index` is the marker of an unresolved edit.
	///
	/// # Panics
	///
	/// Panics if `index` is out of bounds.
	pub fn is_pending(&self, index: TokenIndex) -> bool {
		self.entry(index).1.pending
	}

	fn entry(&self, index: TokenIndex) -> (Summary, &Entry<T>) {
		match self.root.seek(Dim::Tokens, index.get()) {
			Some(found) => found,
			None => panic!("token {index} out of bounds ({} tokens)", self.token_count()),
		}
	}

	fn summary_before(&self, index: TokenIndex) -> Summary {
		let count = self.token_count();
		assert!(index.get() <= count, "token {index} out of bounds ({count} tokens)");
		self.root.summary_before(index.get())
	}

	/// Replaces tokens `[from, to)` with `tokens` and returns how many pending
	/// edits were removed with them.
	///
	/// Tokens flagged `edited` are attributed to this view's pass; the others
	/// report `edited == false` in the finished snapshot.
	///
	/// # Panics
	///
	/// Panics if `from > to` or `to` is greater than the token count.
	pub fn replace_tokens(
		&mut self,
		from: TokenIndex,
		to: TokenIndex,
		tokens: impl IntoIterator<Item = Token<T>>,
	) -> usize {
		let count = self.token_count();
		assert!(
			from <= to && to.get() <= count,
			"invalid token range {from}..{to} ({count} tokens)"
		);
		let pending = self.edit_count();
		let pass = self.pass;
		let entries = tokens
			.into_iter()
			.map(|token| Entry {
				len: token.len,
				ty: token.ty,
				restartable: token.restartable,
				pending: false,
				pass: if token.edited { pass } else { 0 },
			})
			.collect();
		self.root = self.root.splice(from.get(), to.get(), entries);
		pending - self.edit_count()
	}

	/// Records one edit, given in the view's current coordinates.
	///
	/// Every token the edit touches is merged into a single pending marker.
	/// For a pure insertion that is the token containing the insertion point,
	/// or the last token when inserting at the end of the text.
	pub fn record_edit(&mut self, edit: TextEdit) -> std::result::Result<(), EditError> {
		edit.validate(self.char_count())?;
		if edit.removed() == 0 && edit.inserted == 0 {
			return Ok(());
		}

		let count = self.token_count();
		if count == 0 {
			let marker = self.marker(edit.inserted, self.placeholder.clone());
			self.root = Node::from_entries(vec![marker]);
			tracing::trace!(inserted = edit.inserted, "retokenize.edit.recorded.empty");
			return Ok(());
		}

		let (first, last) = if edit.removed() > 0 {
			(self.index_at_char(edit.start), self.index_at_char(edit.end - 1))
		} else if edit.start < self.char_count() {
			let at = self.index_at_char(edit.start);
			(at, at)
		} else {
			(count - 1, count - 1)
		};
		let start = self.root.summary_before(first).chars;
		let end = self.token_end(TokenIndex::new(last));
		let len = end - start - edit.removed() + edit.inserted;
		let marker = self.marker(len, self.token_type(TokenIndex::new(first)).clone());
		self.root = self.root.splice(first, last + 1, vec![marker]);
		tracing::trace!(
			start = edit.start,
			removed = edit.removed(),
			inserted = edit.inserted,
			first,
			last,
			marker_len = len,
			"retokenize.edit.recorded"
		);
		Ok(())
	}

	fn marker(&self, len: CharLen, ty: T) -> Entry<T> {
		Entry {
			len,
			ty,
			restartable: false,
			pending: true,
			pass: self.pass,
		}
	}

	/// Ordinal of the token containing character `offset`, which must lie
	/// inside the text.
	fn index_at_char(&self, offset: CharIdx) -> usize {
		match self.root.seek(Dim::Chars, offset) {
			Some((before, _)) => before.tokens,
			None => self.token_count().saturating_sub(1),
		}
	}

	/// Finishes the view as a snapshot.
	///
	/// Fails with [`RetokenizeError::UnresolvedEdits`] while edits are pending.
	/// A view without tokens yields [`Tokens::empty`] with `empty_type`.
	pub fn into_tokens(self, empty_type: T) -> Result<Tokens<T>> {
		let count = self.edit_count();
		if count > 0 {
			tracing::error!(count, tokens = self.token_count(), "retokenize.unresolved_edits");
			return Err(RetokenizeError::UnresolvedEdits { count });
		}
		Ok(Tokens::from_root(self.root, self.pass, empty_type))
	}
}
