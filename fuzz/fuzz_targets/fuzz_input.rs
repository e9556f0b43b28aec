// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use visual_supports::layout::layout;
use visual_supports::unlock::cipher;
use visual_supports::visual::{derive_label, has_allowed_extension, is_allowed_mime};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    filename: &'a str,
    mime: &'a str,
    secret: &'a str,
    sealed: &'a str,
    count: u16,
}

fuzz_target!(|input: Input<'_>| {
    let _ = derive_label(input.filename);
    let _ = has_allowed_extension(input.filename);
    let _ = is_allowed_mime(input.mime);
    let _ = cipher::open(input.secret, input.sealed);

    let grid = layout(input.count as usize);
    assert!(grid.columns >= 1 && grid.rows >= 1);
});
