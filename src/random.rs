// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Random string helpers backing `randomLowercase` and reverse-callback
//! flag generation. Uses the process-global thread RNG; determinism is not
//! guaranteed.

use rand::Rng;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const LETTER_NUMBERS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn rand_from(n: usize, choices: &[u8]) -> String {
    let mut rng = rand::rng();
    (0..n)
        .map(|_| choices[rng.random_range(0..choices.len())] as char)
        .collect()
}

/// `n` characters uniformly from `[a-z]`.
pub fn rand_lowercase(n: usize) -> String {
    rand_from(n, LOWERCASE)
}

/// `n` characters uniformly from the 62-character `[0-9A-Za-z]` alphabet.
pub fn rand_letter_numbers(n: usize) -> String {
    rand_from(n, LETTER_NUMBERS)
}
