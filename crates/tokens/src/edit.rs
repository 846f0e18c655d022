use std::ops::Range;

use crate::error::EditError;
use crate::token::{CharIdx, CharLen};

/// A text change described by character counts only.
///
/// Replaces the range `[start, end)` with `inserted` new characters. The
/// engine never needs the inserted text itself: the tokenizer reads the
/// current document directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEdit {
	/// First replaced character.
	pub start: CharIdx,
	/// End of the replaced range (exclusive).
	pub end: CharIdx,
	/// Number of characters written in place of the range.
	pub inserted: CharLen,
}

impl TextEdit {
	pub fn new(range: Range<CharIdx>, inserted: CharLen) -> Self {
		Self {
			start: range.start,
			end: range.end,
			inserted,
		}
	}

	/// Inserts `len` characters at `at`.
	pub fn insert(at: CharIdx, len: CharLen) -> Self {
		Self::new(at..at, len)
	}

	/// Deletes `range`.
	pub fn delete(range: Range<CharIdx>) -> Self {
		Self::new(range, 0)
	}

	/// Replaces `range` with `text`, counting its characters.
	pub fn replace(range: Range<CharIdx>, text: &str) -> Self {
		Self::new(range, text.chars().count())
	}

	/// Characters removed by this edit.
	#[inline]
	pub fn removed(&self) -> CharLen {
		self.end.saturating_sub(self.start)
	}

	/// Signed change in document length.
	#[inline]
	pub fn delta(&self) -> isize {
		self.inserted as isize - self.removed() as isize
	}

	pub(crate) fn validate(&self, len: CharLen) -> Result<(), EditError> {
		if self.start > self.end {
			return Err(EditError::InvalidRange {
				start: self.start,
				end: self.end,
			});
		}
		if self.end > len {
			return Err(EditError::OutOfBounds { end: self.end, len });
		}
		Ok(())
	}
}

/// Rebases a sorted batch of edits, given in the coordinates of the original
/// text, onto the text produced by applying the earlier edits of the batch.
///
/// Edits may touch (`previous.end == next.start`) but not overlap.
pub(crate) fn rebase_sorted(edits: impl IntoIterator<Item = TextEdit>) -> Result<Vec<TextEdit>, EditError> {
	let mut out = Vec::new();
	let mut shift: isize = 0;
	let mut previous_end = 0;
	for edit in edits {
		if edit.start > edit.end {
			return Err(EditError::InvalidRange {
				start: edit.start,
				end: edit.end,
			});
		}
		if edit.start < previous_end {
			return Err(EditError::Unordered {
				start: edit.start,
				previous_end,
			});
		}
		previous_end = edit.end;
		let start = edit.start.saturating_add_signed(shift);
		out.push(TextEdit::new(start..start + edit.removed(), edit.inserted));
		shift += edit.delta();
	}
	Ok(out)
}
