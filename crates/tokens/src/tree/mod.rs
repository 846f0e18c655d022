//! Persistent B-tree of token entries.
//!
//! Nodes are immutable and shared through [`Arc`]. A splice rebuilds only the
//! spine between the cut points, so a snapshot handed to a reader stays valid
//! while a copy of its root is being edited. Every node caches a [`Summary`]
//! over four dimensions, which gives rank (prefix sum before an index) and
//! select (descent by a dimension) in `O(log n)` node visits.

use std::cmp::Ordering;
use std::ops::{Add, AddAssign};
use std::sync::Arc;

use crate::token::CharLen;


const MAX_LEAF: usize = if cfg!(test) { 4 } else { 64 };
const MIN_LEAF: usize = MAX_LEAF / 2;
const MAX_CHILDREN: usize = if cfg!(test) { 4 } else { 8 };
const MIN_CHILDREN: usize = MAX_CHILDREN / 2;

/// A token as stored in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry<T> {
	pub len: CharLen,
	pub ty: T,
	pub restartable: bool,
	/// Marker for an unresolved edit.
	pub pending: bool,
	/// Pass that produced this entry.
	pub pass: u64,
}

impl<T> Entry<T> {
	fn summary(&self) -> Summary {
		Summary {
			tokens: 1,
			chars: self.len,
			restartable: usize::from(self.restartable),
			pending: usize::from(self.pending),
		}
	}
}

/// Axis along which the tree can be searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dim {
	Tokens,
	Chars,
	Restartable,
	Pending,
}

/// Aggregated counts over a run of entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Summary {
	pub tokens: usize,
	pub chars: usize,
	pub restartable: usize,
	pub pending: usize,
}

impl Summary {
	#[inline]
	pub fn get(&self, dim: Dim) -> usize {
		match dim {
			Dim::Tokens => self.tokens,
			Dim::Chars => self.chars,
			Dim::Restartable => self.restartable,
			Dim::Pending => self.pending,
		}
	}
}

impl Add for Summary {
	type Output = Self;

	fn add(mut self, rhs: Self) -> Self {
		self += rhs;
		self
	}
}

impl AddAssign for Summary {
	fn add_assign(&mut self, rhs: Self) {
		self.tokens += rhs.tokens;
		self.chars += rhs.chars;
		self.restartable += rhs.restartable;
		self.pending += rhs.pending;
	}
}

#[derive(Debug)]
enum Body<T> {
	Leaf(Vec<Entry<T>>),
	Branch(Vec<Arc<Node<T>>>),
}

/// A tree node. Leaves sit at height 0; every child of a branch has the
/// branch's height minus one.
#[derive(Debug)]
pub(crate) struct Node<T> {
	height: usize,
	summary: Summary,
	body: Body<T>,
}

impl<T: Clone> Node<T> {
	pub fn empty() -> Arc<Self> {
		Self::leaf(Vec::new())
	}

	fn leaf(entries: Vec<Entry<T>>) -> Arc<Self> {
		let summary = entries.iter().fold(Summary::default(), |acc, e| acc + e.summary());
		Arc::new(Self {
			height: 0,
			summary,
			body: Body::Leaf(entries),
		})
	}

	fn branch(children: Vec<Arc<Self>>) -> Arc<Self> {
		debug_assert!(!children.is_empty());
		let height = children[0].height + 1;
		debug_assert!(children.iter().all(|c| c.height + 1 == height), "mixed child heights");
		let summary = children.iter().fold(Summary::default(), |acc, c| acc + c.summary);
		Arc::new(Self {
			height,
			summary,
			body: Body::Branch(children),
		})
	}

	/// Builds a balanced tree holding `entries` in order.
	pub fn from_entries(entries: Vec<Entry<T>>) -> Arc<Self> {
		if entries.len() <= MAX_LEAF {
			return Self::leaf(entries);
		}
		let mut level: Vec<Arc<Self>> = split_even(entries, MAX_LEAF).into_iter().map(Self::leaf).collect();
		while level.len() > 1 {
			level = split_even(level, MAX_CHILDREN).into_iter().map(Self::branch).collect();
		}
		match level.pop() {
			Some(root) => root,
			None => Self::empty(),
		}
	}

	/// Concatenates two trees, keeping them balanced.
	pub fn concat(a: Arc<Self>, b: Arc<Self>) -> Arc<Self> {
		if a.is_empty() {
			return b;
		}
		if b.is_empty() {
			return a;
		}
		let (ha, hb) = (a.height, b.height);
		match ha.cmp(&hb) {
			Ordering::Less => {
				let right = b.children();
				if ha + 1 == hb && a.is_ok_child() {
					return Self::merge_nodes(&[a], right);
				}
				let joined = Self::concat(a, right[0].clone());
				if joined.height + 1 == hb {
					Self::merge_nodes(&[joined], &right[1..])
				} else {
					Self::merge_nodes(joined.children(), &right[1..])
				}
			}
			Ordering::Equal => {
				if a.is_ok_child() && b.is_ok_child() {
					return Self::branch(vec![a, b]);
				}
				match (&a.body, &b.body) {
					(Body::Leaf(x), Body::Leaf(y)) => Self::merge_leaves(x, y),
					_ => Self::merge_nodes(a.children(), b.children()),
				}
			}
			Ordering::Greater => {
				let left = a.children();
				let last = left.len() - 1;
				if hb + 1 == ha && b.is_ok_child() {
					return Self::merge_nodes(left, &[b]);
				}
				let joined = Self::concat(left[last].clone(), b);
				if joined.height + 1 == ha {
					Self::merge_nodes(&left[..last], &[joined])
				} else {
					Self::merge_nodes(&left[..last], joined.children())
				}
			}
		}
	}

	fn merge_nodes(left: &[Arc<Self>], right: &[Arc<Self>]) -> Arc<Self> {
		let mut all = Vec::with_capacity(left.len() + right.len());
		all.extend_from_slice(left);
		all.extend_from_slice(right);
		if all.len() <= MAX_CHILDREN {
			return Self::branch(all);
		}
		let split = MAX_CHILDREN.min(all.len() - MIN_CHILDREN);
		let tail = all.split_off(split);
		Self::branch(vec![Self::branch(all), Self::branch(tail)])
	}

	fn merge_leaves(left: &[Entry<T>], right: &[Entry<T>]) -> Arc<Self> {
		let mut all = Vec::with_capacity(left.len() + right.len());
		all.extend_from_slice(left);
		all.extend_from_slice(right);
		if all.len() <= MAX_LEAF {
			return Self::leaf(all);
		}
		let tail = all.split_off(all.len() / 2);
		Self::branch(vec![Self::leaf(all), Self::leaf(tail)])
	}

	/// Returns the entries with token ordinals in `[start, end)`.
	pub fn slice(self: &Arc<Self>, start: usize, end: usize) -> Arc<Self> {
		let end = end.min(self.summary.tokens);
		if start >= end {
			return Self::empty();
		}
		if start == 0 && end == self.summary.tokens {
			return self.clone();
		}
		match &self.body {
			Body::Leaf(entries) => Self::leaf(entries[start..end].to_vec()),
			Body::Branch(children) => {
				let mut acc = Self::empty();
				let mut offset = 0;
				for child in children {
					let len = child.summary.tokens;
					let (lo, hi) = (start.max(offset), end.min(offset + len));
					if lo < hi {
						acc = Self::concat(acc, child.slice(lo - offset, hi - offset));
					}
					offset += len;
					if offset >= end {
						break;
					}
				}
				acc
			}
		}
	}

	/// Replaces the entries at ordinals `[from, to)` with `entries`.
	pub fn splice(self: &Arc<Self>, from: usize, to: usize, entries: Vec<Entry<T>>) -> Arc<Self> {
		let len = self.summary.tokens;
		let head = self.slice(0, from);
		let tail = self.slice(to, len);
		let joined = Self::concat(Self::concat(head, Self::from_entries(entries)), tail);
		joined.normalized()
	}

	/// Strips single-child branches off the top of a root.
	fn normalized(self: Arc<Self>) -> Arc<Self> {
		let mut root = self;
		loop {
			let only = match &root.body {
				Body::Branch(children) if children.len() == 1 => Some(children[0].clone()),
				_ => None,
			};
			match only {
				Some(child) => root = child,
				None => return root,
			}
		}
	}
}

impl<T> Node<T> {
	#[inline]
	pub fn summary(&self) -> Summary {
		self.summary
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.summary.tokens == 0
	}

	#[cfg(test)]
	pub fn height(&self) -> usize {
		self.height
	}

	fn children(&self) -> &[Arc<Self>] {
		match &self.body {
			Body::Branch(children) => children,
			Body::Leaf(_) => &[],
		}
	}

	fn is_ok_child(&self) -> bool {
		match &self.body {
			Body::Leaf(entries) => entries.len() >= MIN_LEAF,
			Body::Branch(children) => children.len() >= MIN_CHILDREN,
		}
	}

	/// Entries strictly before `target` along `dim` summarised, plus the entry
	/// holding unit `target` of that dimension.
	///
	/// Returns `None` when the tree holds `target` or fewer units of `dim`.
	pub fn seek(&self, dim: Dim, target: usize) -> Option<(Summary, &Entry<T>)> {
		if target >= self.summary.get(dim) {
			return None;
		}
		let mut before = Summary::default();
		let mut node = self;
		loop {
			match &node.body {
				Body::Branch(children) => {
					let mut next = None;
					for child in children {
						if before.get(dim) + child.summary.get(dim) > target {
							next = Some(child.as_ref());
							break;
						}
						before += child.summary;
					}
					node = next?;
				}
				Body::Leaf(entries) => {
					for entry in entries {
						let s = entry.summary();
						if before.get(dim) + s.get(dim) > target {
							return Some((before, entry));
						}
						before += s;
					}
					return None;
				}
			}
		}
	}

	/// Summary of the entries at ordinals `< index`.
	///
	/// `index` may equal the token count, yielding the whole tree's summary.
	pub fn summary_before(&self, index: usize) -> Summary {
		match self.seek(Dim::Tokens, index) {
			Some((before, _)) => before,
			None => self.summary,
		}
	}

	/// Iterates entries starting at ordinal `start`.
	pub fn entries_from(&self, start: usize) -> Entries<'_, T> {
		Entries::new(self, start)
	}
}

/// Splits `items` into the fewest chunks of at most `max` items, with sizes
/// differing by at most one.
fn split_even<I>(items: Vec<I>, max: usize) -> Vec<Vec<I>> {
	let n = items.len();
	let chunks = n.div_ceil(max).max(1);
	let (base, extra) = (n / chunks, n % chunks);
	let mut out = Vec::with_capacity(chunks);
	let mut iter = items.into_iter();
	for i in 0..chunks {
		let size = base + usize::from(i < extra);
		out.push(iter.by_ref().take(size).collect());
	}
	out
}

/// In-order iterator over tree entries.
pub(crate) struct Entries<'a, T> {
	stack: Vec<(&'a [Arc<Node<T>>], usize)>,
	leaf: std::slice::Iter<'a, Entry<T>>,
}

impl<'a, T> Entries<'a, T> {
	fn new(root: &'a Node<T>, start: usize) -> Self {
		let mut stack = Vec::new();
		let mut node = root;
		let mut skip = start.min(root.summary.tokens);
		loop {
			match &node.body {
				Body::Leaf(entries) => {
					return Self {
						stack,
						leaf: entries[skip.min(entries.len())..].iter(),
					};
				}
				Body::Branch(children) => {
					let mut i = 0;
					while i + 1 < children.len() && skip >= children[i].summary.tokens {
						skip -= children[i].summary.tokens;
						i += 1;
					}
					stack.push((children.as_slice(), i + 1));
					node = &*children[i];
				}
			}
		}
	}

	fn descend_leftmost(&mut self, mut node: &'a Node<T>) {
		loop {
			match &node.body {
				Body::Leaf(entries) => {
					self.leaf = entries.iter();
					return;
				}
				Body::Branch(children) => {
					self.stack.push((children.as_slice(), 1));
					node = &*children[0];
				}
			}
		}
	}
}

impl<'a, T> Iterator for Entries<'a, T> {
	type Item = &'a Entry<T>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(entry) = self.leaf.next() {
				return Some(entry);
			}
			let (children, next) = self.stack.last_mut()?;
			let children: &'a [Arc<Node<T>>] = children;
			if *next < children.len() {
				let node: &'a Node<T> = &*children[*next];
				*next += 1;
				self.descend_leftmost(node);
			} else {
				self.stack.pop();
			}
		}
	}
}
