use std::fmt;

/// A position in the text, measured in characters (not bytes).
pub type CharIdx = usize;

/// A length or count in the text, measured in characters (not bytes).
///
/// Kept distinct from [`CharIdx`] so a length is not passed where an offset
/// is expected.
pub type CharLen = usize;

/// Ordinal position of a token within a sequence.
///
/// Not a character offset and not a restartable-boundary ordinal; the newtype
/// keeps the three apart at call sites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenIndex(usize);

impl TokenIndex {
	/// The first token of a sequence.
	pub const ZERO: Self = Self(0);

	#[inline]
	pub const fn new(index: usize) -> Self {
		Self(index)
	}

	/// Returns the raw ordinal.
	#[inline]
	pub const fn get(self) -> usize {
		self.0
	}

	/// Returns the index of the following token.
	#[inline]
	pub const fn next(self) -> Self {
		Self(self.0 + 1)
	}
}

impl From<usize> for TokenIndex {
	fn from(index: usize) -> Self {
		Self(index)
	}
}

impl fmt::Display for TokenIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Opaque lexer state reported by a tokenizer.
///
/// The state attached to a token is the state the lexer was in when that
/// token began. [`LexState::DEFAULT`] marks a point where lexing can start
/// with no knowledge of the preceding text.
///
/// See [`Tokenizer`](crate::Tokenizer#lexer-states) for the rules a
/// tokenizer's states must follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LexState(pub u32);

impl LexState {
	/// The canonical restartable state.
	pub const DEFAULT: Self = Self(0);

	#[inline]
	pub const fn is_default(self) -> bool {
		self.0 == Self::DEFAULT.0
	}
}

/// One token as produced by a [`Tokenizer`](crate::Tokenizer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken<T> {
	/// Start offset in the text (inclusive).
	pub start: CharIdx,
	/// End offset in the text (exclusive).
	pub end: CharIdx,
	/// Language-supplied category.
	pub ty: T,
	/// Lexer state at `start`.
	pub state: LexState,
}

impl<T> RawToken<T> {
	pub fn new(start: CharIdx, end: CharIdx, ty: T, state: LexState) -> Self {
		Self { start, end, ty, state }
	}

	#[inline]
	pub fn len(&self) -> CharLen {
		self.end.saturating_sub(self.start)
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// A classified span of text, positioned only by its place in a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<T> {
	/// Length in characters.
	pub len: CharLen,
	/// Semantic category, compared only by equality.
	pub ty: T,
	/// Lexing may begin at this token's start without prior context.
	pub restartable: bool,
	/// Produced by the most recent lexing pass rather than reused.
	pub edited: bool,
}

impl<T> Token<T> {
	/// Creates a reused (not edited) token.
	pub fn new(len: CharLen, ty: T, restartable: bool) -> Self {
		Self {
			len,
			ty,
			restartable,
			edited: false,
		}
	}

	/// Wraps fresh tokenizer output.
	pub fn relexed(raw: RawToken<T>) -> Self {
		Self {
			len: raw.len(),
			restartable: raw.state.is_default(),
			ty: raw.ty,
			edited: true,
		}
	}
}

impl<T> From<RawToken<T>> for Token<T> {
	fn from(raw: RawToken<T>) -> Self {
		Self::relexed(raw)
	}
}
