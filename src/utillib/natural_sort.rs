//! Ordering of names with embedded numbers the way humans expect it,
//! i.e. "ite2" before "ite10".

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'s> {
    Digits(&'s str),
    Text(&'s str),
}

fn chunks(s: &str) -> impl Iterator<Item = Chunk<'_>> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_digit = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != is_digit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (chunk, remainder) = rest.split_at(end);
        rest = remainder;
        Some(if is_digit {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    })
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    // Compare by value without parsing, so that arbitrarily long
    // numbers work; leading zeroes only break ties.
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        .then_with(|| a.len().cmp(&b.len()))
}

pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chunks = chunks(a);
    let mut b_chunks = chunks(b);
    loop {
        match (a_chunks.next(), b_chunks.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
                    (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
                    (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

pub fn natural_sort<S: AsRef<str>>(items: &mut [S]) {
    items.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}
