//! Test tokenizers.

use std::cell::Cell;
use std::iter::Peekable;
use std::ops::Range;
use std::sync::{Arc, Mutex};

use ropey::{Rope, RopeSlice};
use tokio_util::sync::CancellationToken;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};

use crate::edit::TextEdit;
use crate::token::{CharIdx, LexState, RawToken};
use crate::tokenizer::Tokenizer;
use crate::tokens::Tokens;

/// Lexer state inside a block comment.
const IN_COMMENT: LexState = LexState(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Kind {
	Space,
	Word,
	Number,
	Str,
	Punct,
	/// `/* ... */` on one line.
	Comment,
	/// `/*` up to and including the end of its line.
	CommentOpen,
	/// A full line inside a block comment.
	CommentBody,
	/// The line that closes a block comment.
	CommentClose,
	/// Placeholder for empty snapshots.
	Empty,
}

/// A small C-like lexer. Block comments spanning lines produce one token per
/// line; every line after the first starts in [`IN_COMMENT`] and is not
/// restartable.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ToyLexer;

impl Tokenizer<Kind> for ToyLexer {
	fn tokenize<'a>(&'a self, text: RopeSlice<'a>, range: Range<CharIdx>, state: LexState) -> impl Iterator<Item = RawToken<Kind>> + 'a {
		Lex {
			chars: text.slice(range.start..range.end).chars().peekable(),
			pos: range.start,
			state,
		}
	}
}

struct Lex<'a> {
	chars: Peekable<ropey::iter::Chars<'a>>,
	pos: CharIdx,
	state: LexState,
}

impl Lex<'_> {
	fn bump(&mut self) -> Option<char> {
		let c = self.chars.next()?;
		self.pos += 1;
		Some(c)
	}

	fn eat_while(&mut self, f: impl Fn(char) -> bool) {
		while self.chars.peek().is_some_and(|&c| f(c)) {
			self.bump();
		}
	}

	/// Consumes comment text up to and including `*/` or a newline. Returns
	/// true when the comment was closed.
	fn comment_rest(&mut self) -> bool {
		while let Some(c) = self.bump() {
			match c {
				'*' if self.chars.peek() == Some(&'/') => {
					self.bump();
					return true;
				}
				'\n' => return false,
				_ => {}
			}
		}
		false
	}
}

impl Iterator for Lex<'_> {
	type Item = RawToken<Kind>;

	fn next(&mut self) -> Option<Self::Item> {
		let start = self.pos;
		let state = self.state;
		let c = self.bump()?;
		let ty = if state == IN_COMMENT {
			if self.comment_rest_after(c) {
				self.state = LexState::DEFAULT;
				Kind::CommentClose
			} else {
				Kind::CommentBody
			}
		} else {
			match c {
				c if c.is_whitespace() => {
					self.eat_while(char::is_whitespace);
					Kind::Space
				}
				c if c.is_alphabetic() || c == '_' => {
					self.eat_while(|c| c.is_alphabetic() || c == '_');
					Kind::Word
				}
				c if c.is_ascii_digit() => {
					self.eat_while(|c| c.is_ascii_digit());
					Kind::Number
				}
				'"' => {
					while let Some(&c) = self.chars.peek() {
						if c == '\n' {
							break;
						}
						self.bump();
						if c == '"' {
							break;
						}
					}
					Kind::Str
				}
				'/' if self.chars.peek() == Some(&'*') => {
					self.bump();
					if self.comment_rest() {
						Kind::Comment
					} else {
						self.state = IN_COMMENT;
						Kind::CommentOpen
					}
				}
				_ => Kind::Punct,
			}
		};
		Some(RawToken::new(start, self.pos, ty, state))
	}
}

impl Lex<'_> {
	/// Like [`Lex::comment_rest`] with `first` already consumed.
	fn comment_rest_after(&mut self, first: char) -> bool {
		match first {
			'*' if self.chars.peek() == Some(&'/') => {
				self.bump();
				true
			}
			'\n' => false,
			_ => self.comment_rest(),
		}
	}
}

/// Counts tokens pulled from the wrapped tokenizer.
#[derive(Debug, Default)]
pub(crate) struct Counting<K> {
	pub inner: K,
	pub pulled: Cell<usize>,
}

impl<K> Counting<K> {
	pub fn new(inner: K) -> Self {
		Self { inner, pulled: Cell::new(0) }
	}
}

impl<T, K: Tokenizer<T>> Tokenizer<T> for Counting<K> {
	fn tokenize<'a>(&'a self, text: RopeSlice<'a>, range: Range<CharIdx>, state: LexState) -> impl Iterator<Item = RawToken<T>> + 'a {
		self.inner.tokenize(text, range, state).inspect(|_| self.pulled.set(self.pulled.get() + 1))
	}
}

/// Fires a cancellation token after the wrapped tokenizer has produced
/// `after` tokens.
pub(crate) struct CancelAfter<K> {
	pub inner: K,
	pub after: usize,
	pub cancel: CancellationToken,
}

impl<T, K: Tokenizer<T>> Tokenizer<T> for CancelAfter<K> {
	fn tokenize<'a>(&'a self, text: RopeSlice<'a>, range: Range<CharIdx>, state: LexState) -> impl Iterator<Item = RawToken<T>> + 'a {
		self.inner.tokenize(text, range, state).enumerate().map(|(i, token)| {
			if i + 1 >= self.after {
				self.cancel.cancel();
			}
			token
		})
	}
}

/// Lexes a whole document with [`ToyLexer`].
pub(crate) fn lex_all(text: &str) -> Tokens<Kind> {
	let rope = Rope::from_str(text);
	lex_rope(&rope)
}

pub(crate) fn lex_rope(rope: &Rope) -> Tokens<Kind> {
	let raw = ToyLexer.tokenize(rope.slice(..), 0..rope.len_chars(), LexState::DEFAULT);
	match Tokens::from_tokenizer_output(raw, Kind::Empty, &CancellationToken::new()) {
		Ok(tokens) => tokens,
		Err(err) => panic!("toy lexer output rejected: {err}"),
	}
}

/// Applies `edit` to `rope`, inserting `text` (whose char count must match
/// `edit.inserted`).
pub(crate) fn apply(rope: &mut Rope, edit: TextEdit, text: &str) {
	assert_eq!(text.chars().count(), edit.inserted);
	rope.remove(edit.start..edit.end);
	rope.insert(edit.start, text);
}

/// Boundaries and types of a snapshot, for comparisons in assertions.
pub(crate) fn shape(tokens: &Tokens<Kind>) -> Vec<(Range<CharIdx>, Kind, bool)> {
	tokens.iter().map(|s| (s.range(), *s.ty, s.restartable)).collect()
}

/// Collects the message of every error event.
#[derive(Debug, Clone, Default)]
struct ErrorEvents(Arc<Mutex<Vec<String>>>);

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
	fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
		if field.name() == "message" {
			*self.0 = format!("{value:?}");
		}
	}
}

impl<S: Subscriber> tracing_subscriber::Layer<S> for ErrorEvents {
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		if *event.metadata().level() != Level::ERROR {
			return;
		}
		let mut message = String::new();
		event.record(&mut MessageVisitor(&mut message));
		self.0.lock().unwrap().push(message);
	}
}

/// Runs `f` and returns its result with the error events it emitted.
pub(crate) fn error_events<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
	let events = ErrorEvents::default();
	let subscriber = tracing_subscriber::registry().with(events.clone());
	let result = tracing::subscriber::with_default(subscriber, f);
	let messages = events.0.lock().unwrap().clone();
	(result, messages)
}

mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn block_comment_splits_per_line() {
		let tokens = lex_all("a /* x\ny\nz */ b");
		assert_eq!(
			shape(&tokens),
			vec![
				(0..1, Kind::Word, true),
				(1..2, Kind::Space, true),
				(2..7, Kind::CommentOpen, true),
				(7..9, Kind::CommentBody, false),
				(9..13, Kind::CommentClose, false),
				(13..14, Kind::Space, true),
				(14..15, Kind::Word, true),
			]
		);
	}

	#[test]
	fn one_line_comment_and_string() {
		let tokens = lex_all("/* c */\"s t\"x");
		assert_eq!(
			shape(&tokens),
			vec![(0..7, Kind::Comment, true), (7..12, Kind::Str, true), (12..13, Kind::Word, true)]
		);
	}

	#[test]
	fn lexes_from_mid_document() {
		let rope = Rope::from_str("ab cd");
		let raw: Vec<_> = ToyLexer.tokenize(rope.slice(..), 3..5, LexState::DEFAULT).collect();
		assert_eq!(raw, vec![RawToken::new(3, 5, Kind::Word, LexState::DEFAULT)]);
	}
}
