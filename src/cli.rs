//! A small interactive-confirmation helper shared by the CLI front-ends,
//! adapted from the tree's own raw-termios prompt.

use libc::{tcgetattr, tcsetattr, termios, STDIN_FILENO, TCSANOW};
use std::io::{self, BufRead, Write};
use std::mem::MaybeUninit;

/// Shows `text`, reads a line, and returns whether it was `y` or `Y`.
pub fn confirm(text: &str) -> bool {
	let saved: termios = unsafe {
		let mut t: termios = MaybeUninit::zeroed().assume_init();
		tcgetattr(STDIN_FILENO, &mut t);
		t
	};

	print!("{text}");
	let _ = io::stdout().flush();
	let answer = io::stdin()
		.lock()
		.lines()
		.next()
		.and_then(Result::ok)
		.unwrap_or_default();

	unsafe {
		tcsetattr(STDIN_FILENO, TCSANOW, &saved);
	}

	matches!(answer.trim(), "y" | "Y")
}
